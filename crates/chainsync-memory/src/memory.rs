//! In-memory entity endpoint.
//!
//! Holds a table of entities in RAM and answers queries and live channels
//! the way the remote indexer does. All data is lost when the process exits.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use chainsync_core::endpoint::{
    ChannelHandle, DeltaBatch, EntityEndpoint, EntityPayload, EntitySubscription,
};
use chainsync_core::entity::{Entity, EntityId};
use chainsync_core::error::SyncError;
use chainsync_core::filter::compare_values;
use chainsync_core::query::{Direction, FetchOptions, OrderBy, Query};

type Delivery = Result<DeltaBatch, SyncError>;

/// One open live channel.
struct ChannelEntry {
    query: Query,
    sender: mpsc::UnboundedSender<Delivery>,
}

#[derive(Default)]
struct Inner {
    name: String,
    table: Mutex<BTreeMap<EntityId, Entity>>,
    channels: Mutex<HashMap<u64, ChannelEntry>>,
    next_channel: AtomicU64,
    query_failures: Mutex<VecDeque<SyncError>>,
    open_failures: Mutex<VecDeque<SyncError>>,
    queries: AtomicU64,
    opens: AtomicU64,
    cancels: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory indexer endpoint.
///
/// Clones share the same table and channels.
#[derive(Clone, Default)]
pub struct MemoryEndpoint {
    inner: Arc<Inner>,
}

impl MemoryEndpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                ..Inner::default()
            }),
        }
    }

    /// Upsert entities without notifying live channels.
    pub fn insert(&self, entities: impl IntoIterator<Item = Entity>) {
        let mut table = lock(&self.inner.table);
        for entity in entities {
            upsert(&mut table, &entity);
        }
    }

    /// Upsert a delta batch and deliver it to every live channel whose query
    /// matches the updated entity. Returns the number of channels notified.
    ///
    /// Sentinel records are delivered as-is and never stored.
    pub fn publish(&self, batch: Vec<Entity>) -> usize {
        let merged: Vec<(Entity, Entity)> = {
            let mut table = lock(&self.inner.table);
            batch
                .into_iter()
                .map(|delta| {
                    let current = if delta.is_sentinel() {
                        delta.clone()
                    } else {
                        upsert(&mut table, &delta)
                    };
                    (delta, current)
                })
                .collect()
        };

        let channels = lock(&self.inner.channels);
        let mut notified = 0;
        for entry in channels.values() {
            let deltas: DeltaBatch = merged
                .iter()
                .filter(|(delta, current)| delta.is_sentinel() || entry.query.matches(current))
                .map(|(delta, _)| delta.clone())
                .collect();
            if deltas.is_empty() {
                continue;
            }
            if entry.sender.send(Ok(deltas)).is_ok() {
                notified += 1;
            }
        }
        tracing::trace!(endpoint = %self.inner.name, notified, "published delta batch");
        notified
    }

    /// Deliver a keep-alive batch (a single sentinel record) to every channel.
    pub fn publish_heartbeat(&self) -> usize {
        self.broadcast(|| Ok(vec![Entity::sentinel()]))
    }

    /// Deliver an error to every live channel.
    pub fn push_channel_error(&self, error: SyncError) -> usize {
        self.broadcast(|| Err(error.clone()))
    }

    fn broadcast(&self, item: impl Fn() -> Delivery) -> usize {
        lock(&self.inner.channels)
            .values()
            .filter(|entry| entry.sender.send(item()).is_ok())
            .count()
    }

    /// Make the next one-shot query fail with `error`.
    pub fn fail_next_query(&self, error: SyncError) {
        lock(&self.inner.query_failures).push_back(error);
    }

    /// Make the next channel-open request fail with `error`.
    pub fn fail_next_open(&self, error: SyncError) {
        lock(&self.inner.open_failures).push_back(error);
    }

    /// Stored state of one entity.
    pub fn entity(&self, id: &EntityId) -> Option<Entity> {
        lock(&self.inner.table).get(id).cloned()
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        lock(&self.inner.table).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One-shot queries received (including failed ones).
    pub fn query_count(&self) -> u64 {
        self.inner.queries.load(Ordering::Relaxed)
    }

    /// Channel-open requests received (including failed ones).
    pub fn open_count(&self) -> u64 {
        self.inner.opens.load(Ordering::Relaxed)
    }

    /// Channels torn down through their handle.
    pub fn cancel_count(&self) -> u64 {
        self.inner.cancels.load(Ordering::Relaxed)
    }

    /// Number of open live channels.
    pub fn active_subscriptions(&self) -> usize {
        lock(&self.inner.channels).len()
    }
}

/// Merge `delta` into the table and return the entity's new full state.
fn upsert(table: &mut BTreeMap<EntityId, Entity>, delta: &Entity) -> Entity {
    let entity = table
        .entry(delta.entity_id.clone())
        .or_insert_with(|| Entity::new(delta.entity_id.clone()));
    entity.merge_from(delta);
    entity.clone()
}

static NULL: Value = Value::Null;

fn sort_key<'a>(entity: &'a Entity, order: &OrderBy) -> &'a Value {
    order
        .target()
        .and_then(|(namespace, model)| entity.field(namespace, model, &order.member))
        .unwrap_or(&NULL)
}

fn compare_by(a: &Entity, b: &Entity, order_by: &[OrderBy]) -> CmpOrdering {
    for order in order_by {
        let ord = compare_values(sort_key(a, order), sort_key(b, order));
        let ord = match order.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        };
        if ord != CmpOrdering::Equal {
            return ord;
        }
    }
    CmpOrdering::Equal
}

#[async_trait]
impl EntityEndpoint for MemoryEndpoint {
    async fn query(
        &self,
        query: &Query,
        options: &FetchOptions,
    ) -> Result<EntityPayload, SyncError> {
        self.inner.queries.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = lock(&self.inner.query_failures).pop_front() {
            return Err(error);
        }

        // table order (by id) breaks sort ties
        let mut matched: Vec<Entity> = lock(&self.inner.table)
            .values()
            .filter(|entity| query.matches(entity))
            .cloned()
            .collect();
        if !options.order_by.is_empty() {
            matched.sort_by(|a, b| compare_by(a, b, &options.order_by));
        }

        let offset = options.offset.unwrap_or(0) as usize;
        let limit = options.limit.map_or(usize::MAX, |l| l as usize);
        let page: Vec<Entity> = matched.into_iter().skip(offset).take(limit).collect();

        tracing::debug!(
            endpoint = %self.inner.name,
            namespace = query.namespace(),
            results = page.len(),
            "memory query"
        );
        Ok(EntityPayload::Many(page))
    }

    async fn subscribe(&self, query: &Query) -> Result<EntitySubscription, SyncError> {
        self.inner.opens.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = lock(&self.inner.open_failures).pop_front() {
            return Err(error);
        }

        let id = self.inner.next_channel.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.inner.channels).insert(
            id,
            ChannelEntry {
                query: query.clone(),
                sender: tx,
            },
        );

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let handle = ChannelHandle::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.channels).remove(&id);
                inner.cancels.fetch_add(1, Ordering::Relaxed);
            }
        });

        let updates = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed();

        tracing::debug!(endpoint = %self.inner.name, channel = id, "channel opened");
        Ok(EntitySubscription { handle, updates })
    }

    fn name(&self) -> &str {
        &self.inner.name
    }
}
