//! Live subscription lifecycle.
//!
//! A [`SubscriptionManager`] owns at most one open channel. Any change of its
//! inputs (enabled flag, query value, endpoint) tears the channel down before a
//! new one is requested. Deliveries are merged into the shared [`EntityStore`]
//! and mirrored into a per-manager list of [`EntityView`]s.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::endpoint::{ChannelHandle, EntityEndpoint, UpdateStream};
use crate::config::SyncConfig;
use crate::entity::{Entity, EntityView};
use crate::error::SyncError;
use crate::query::Query;
use crate::store::EntityStore;

/// Lifecycle phase of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionPhase {
    /// No channel; the published list is `None`.
    Disabled,
    /// Channel-open request in flight.
    Opening,
    /// Channel open and handle held.
    Subscribed,
}

impl std::fmt::Display for SubscriptionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Opening => write!(f, "opening"),
            Self::Subscribed => write!(f, "subscribed"),
        }
    }
}

/// Observable state of a [`SubscriptionManager`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionState {
    /// Records of the latest non-sentinel batch, projected to the namespace.
    pub entities: Option<Vec<EntityView>>,
    pub is_subscribed: bool,
    pub phase: SubscriptionPhase,
}

impl Default for SubscriptionState {
    fn default() -> Self {
        Self {
            entities: None,
            is_subscribed: false,
            phase: SubscriptionPhase::Disabled,
        }
    }
}

/// Apply one delta batch.
///
/// Empty batches and batches led by the sentinel record are dropped and
/// return `None`. Otherwise every record is merged into `store` and the batch
/// itself (not a re-read of the store) is returned projected to `namespace`.
pub fn apply_batch(
    store: &EntityStore,
    namespace: &str,
    batch: &[Entity],
) -> Option<Vec<EntityView>> {
    match batch.first() {
        None => {
            tracing::debug!("dropping empty delta batch");
            return None;
        }
        Some(first) if first.is_sentinel() => {
            tracing::debug!("dropping heartbeat delta batch");
            return None;
        }
        Some(_) => {}
    }
    store.merge_batch(batch);
    Some(batch.iter().map(|e| e.view(namespace)).collect())
}

struct ActiveChannel {
    handle: ChannelHandle,
    pump: JoinHandle<()>,
}

/// Owns one live channel and mirrors its deliveries.
///
/// Many managers may share one store; each keeps its own handle and list.
pub struct SubscriptionManager {
    endpoint: Arc<dyn EntityEndpoint>,
    store: Arc<EntityStore>,
    namespace: String,
    /// Inputs of the last `sync` call that ran to completion.
    current: Option<(Query, bool)>,
    active: Option<ActiveChannel>,
    state: Arc<watch::Sender<SubscriptionState>>,
    /// Held by a pump while it applies a batch and by teardown while it cancels.
    apply_gate: Arc<Mutex<()>>,
}

impl SubscriptionManager {
    pub fn new(
        endpoint: Arc<dyn EntityEndpoint>,
        store: Arc<EntityStore>,
        namespace: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(SubscriptionState::default());
        Self {
            endpoint,
            store,
            namespace: namespace.into(),
            current: None,
            active: None,
            state: Arc::new(state),
            apply_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Create a manager for the namespace of `config`.
    pub fn from_config(
        endpoint: Arc<dyn EntityEndpoint>,
        store: Arc<EntityStore>,
        config: &SyncConfig,
    ) -> Self {
        Self::new(endpoint, store, config.namespace.clone())
    }

    pub fn state(&self) -> SubscriptionState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.borrow().is_subscribed
    }

    pub fn entities(&self) -> Option<Vec<EntityView>> {
        self.state.borrow().entities.clone()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Reconcile the channel with `(query, enabled)`.
    ///
    /// Unchanged inputs are a no-op. Changed inputs cancel the held channel
    /// (exactly once) and, when enabled, open a new one. Disabling clears the
    /// published list.
    ///
    /// # Errors
    /// Returns the endpoint error if the channel cannot be opened; the manager
    /// is left disabled and the next `sync` retries.
    ///
    /// # Cancel safety
    /// Inputs are recorded only once the call completes. If the future is
    /// dropped while the channel is opening, the manager is left disabled and
    /// the next `sync` with the same inputs opens again.
    pub async fn sync(&mut self, query: &Query, enabled: bool) -> Result<(), SyncError> {
        if let Some((q, e)) = &self.current {
            if *e == enabled && q == query {
                return Ok(());
            }
        }
        self.current = None;
        self.teardown();

        if enabled {
            self.open(query.clone()).await?;
        } else {
            self.state.send_modify(|s| s.entities = None);
        }
        self.current = Some((query.clone(), enabled));
        Ok(())
    }

    /// Swap the endpoint. The held channel is torn down and reopened against
    /// the new endpoint with the current inputs.
    pub async fn set_endpoint(&mut self, endpoint: Arc<dyn EntityEndpoint>) -> Result<(), SyncError> {
        if same_endpoint(&self.endpoint, &endpoint) {
            return Ok(());
        }
        self.endpoint = endpoint;
        match self.current.take() {
            Some((query, enabled)) => self.sync(&query, enabled).await,
            None => Ok(()),
        }
    }

    /// Tear down the channel and forget the inputs.
    pub fn close(&mut self) {
        self.teardown();
        self.current = None;
    }

    async fn open(&mut self, query: Query) -> Result<(), SyncError> {
        self.state.send_modify(|s| s.phase = SubscriptionPhase::Opening);
        let opening = OpeningGuard {
            state: &self.state,
            armed: true,
        };

        let subscription = match self.endpoint.subscribe(&query).await {
            Ok(sub) => sub,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    endpoint = self.endpoint.name(),
                    namespace = %self.namespace,
                    "failed to open entity channel"
                );
                return Err(e);
            }
        };
        // nothing below awaits: the handle is stored before control returns
        opening.disarm();

        let handle = subscription.handle;
        let pump = tokio::spawn(pump(
            subscription.updates,
            handle.clone(),
            Arc::clone(&self.store),
            self.namespace.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.apply_gate),
        ));
        tracing::info!(
            channel = handle.id(),
            endpoint = self.endpoint.name(),
            models = ?query.model_names().collect::<Vec<_>>(),
            "entity channel open"
        );
        self.active = Some(ActiveChannel { handle, pump });
        self.state.send_modify(|s| {
            s.is_subscribed = true;
            s.phase = SubscriptionPhase::Subscribed;
        });
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel(&self.apply_gate);
            tracing::info!(channel = active.handle.id(), "entity channel closed");
        }
        self.state.send_modify(|s| {
            s.is_subscribed = false;
            s.phase = SubscriptionPhase::Disabled;
        });
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel(&self.apply_gate);
        }
    }
}

impl ActiveChannel {
    /// Cancel the handle and stop the pump. Once this returns no batch of
    /// this channel is merged into the store.
    fn cancel(&self, gate: &Mutex<()>) {
        {
            let _applying = lock_gate(gate);
            self.handle.cancel();
        }
        self.pump.abort();
    }
}

/// Puts the manager back to `Disabled` unless the open completes.
struct OpeningGuard<'a> {
    state: &'a watch::Sender<SubscriptionState>,
    armed: bool,
}

impl OpeningGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.state.send_modify(|s| {
            s.is_subscribed = false;
            s.phase = SubscriptionPhase::Disabled;
        });
    }
}

fn lock_gate(gate: &Mutex<()>) -> MutexGuard<'_, ()> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

fn same_endpoint(a: &Arc<dyn EntityEndpoint>, b: &Arc<dyn EntityEndpoint>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Drain one channel in delivery order.
async fn pump(
    mut updates: UpdateStream,
    handle: ChannelHandle,
    store: Arc<EntityStore>,
    namespace: String,
    state: Arc<watch::Sender<SubscriptionState>>,
    gate: Arc<Mutex<()>>,
) {
    while let Some(item) = updates.next().await {
        if handle.is_cancelled() {
            break;
        }
        let batch = match item {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(channel = handle.id(), error = %e, "entity channel delivered an error");
                continue;
            }
        };
        {
            let _applying = lock_gate(&gate);
            if handle.is_cancelled() {
                break;
            }
            let Some(views) = apply_batch(&store, &namespace, &batch) else {
                continue;
            };
            tracing::debug!(channel = handle.id(), count = views.len(), "applied delta batch");
            state.send_modify(|s| s.entities = Some(views));
        }
    }
    tracing::debug!(channel = handle.id(), "entity channel stream ended");
}
