//! The `EntityEndpoint` trait — the remote indexer as seen by the sync layer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::SyncError;
use crate::query::{FetchOptions, Query};

/// One delivery from a live channel.
pub type DeltaBatch = Vec<Entity>;

/// Stream of deliveries from a live channel, in delivery order.
pub type UpdateStream = BoxStream<'static, Result<DeltaBatch, SyncError>>;

// ─── EntityPayload ───────────────────────────────────────────────────────────

/// Raw one-shot response: singleton-shaped queries may answer with one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityPayload {
    Many(Vec<Entity>),
    One(Entity),
}

impl EntityPayload {
    /// Normalize into a list.
    pub fn into_vec(self) -> Vec<Entity> {
        match self {
            Self::Many(v) => v,
            Self::One(e) => vec![e],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Many(v) => v.len(),
            Self::One(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── ChannelHandle ───────────────────────────────────────────────────────────

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

type TeardownFn = Box<dyn FnOnce() + Send>;

struct HandleInner {
    id: u64,
    cancelled: AtomicBool,
    teardown: Mutex<Option<TeardownFn>>,
}

/// Cancellable handle to one open live channel.
///
/// `cancel()` invalidates the handle immediately and runs the endpoint's
/// teardown hook once; further calls are no-ops. Clones share state.
#[derive(Clone)]
pub struct ChannelHandle {
    inner: Arc<HandleInner>,
}

impl ChannelHandle {
    /// Handle whose cancellation runs `teardown` (e.g. an unsubscribe request).
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self::build(Some(Box::new(teardown)))
    }

    /// Handle with no teardown hook.
    pub fn detached() -> Self {
        Self::build(None)
    }

    fn build(teardown: Option<TeardownFn>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
                cancelled: AtomicBool::new(false),
                teardown: Mutex::new(teardown),
            }),
        }
    }

    /// Process-unique channel id (for logs).
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Cancel the channel. Returns `true` only for the call that actually cancelled it.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        let teardown = self
            .inner
            .teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(teardown) = teardown {
            teardown();
        }
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("id", &self.inner.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// An open live channel: its handle plus the stream of deliveries.
pub struct EntitySubscription {
    pub handle: ChannelHandle,
    pub updates: UpdateStream,
}

impl std::fmt::Debug for EntitySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySubscription")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

// ─── EntityEndpoint ──────────────────────────────────────────────────────────

/// The remote indexing service.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn EntityEndpoint>`.
#[async_trait]
pub trait EntityEndpoint: Send + Sync + 'static {
    /// Run a one-shot query.
    async fn query(
        &self,
        query: &Query,
        options: &FetchOptions,
    ) -> Result<EntityPayload, SyncError>;

    /// Open a live channel for `query`.
    ///
    /// The returned stream ends (or stops yielding) once the handle is cancelled.
    async fn subscribe(&self, query: &Query) -> Result<EntitySubscription, SyncError>;

    /// Endpoint identifier (URL or name), for diagnostics.
    fn name(&self) -> &str;
}
