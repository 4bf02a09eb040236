//! One-shot query execution with loading/error state.

use std::sync::Arc;

use tokio::sync::watch;

use crate::endpoint::EntityEndpoint;
use crate::entity::Entity;
use crate::error::SyncError;
use crate::query::{FetchOptions, Query};

/// Observable state of a [`FetchExecutor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchState {
    /// Last successful result; `None` until a query has succeeded once.
    pub entities: Option<Vec<Entity>>,
    /// `true` from issue until the response or error arrives.
    pub is_loading: bool,
    /// Error of the most recent attempt; cleared by the next success.
    pub error: Option<SyncError>,
}

impl FetchState {
    /// First record of the result, for singleton-shaped queries.
    pub fn first(&self) -> Option<&Entity> {
        self.entities.as_ref()?.first()
    }
}

/// A query plus its options; the identity used to decide whether to re-issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    pub query: Query,
    pub options: FetchOptions,
}

/// Issues a query once per distinct request value and tracks its state.
///
/// The result is surfaced as returned by the endpoint; it is not merged into
/// the shared entity store.
pub struct FetchExecutor {
    endpoint: Arc<dyn EntityEndpoint>,
    request: Option<FetchRequest>,
    state: watch::Sender<FetchState>,
}

impl FetchExecutor {
    pub fn new(endpoint: Arc<dyn EntityEndpoint>) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self {
            endpoint,
            request: None,
            state,
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> FetchState {
        self.state.borrow().clone()
    }

    /// Follow state changes (loading transitions included).
    pub fn watch(&self) -> watch::Receiver<FetchState> {
        self.state.subscribe()
    }

    /// The last request whose response (or error) arrived, if any.
    pub fn request(&self) -> Option<&FetchRequest> {
        self.request.as_ref()
    }

    /// Issue `query` unless an equal request was already issued.
    ///
    /// Equality is by value: rebuilding an identical query is not a new request.
    ///
    /// # Cancel safety
    /// The request is recorded only once its response arrives. Dropping the
    /// future mid-flight clears `is_loading` and the next `execute` with the
    /// same request issues it again.
    pub async fn execute(&mut self, query: Query, options: FetchOptions) -> FetchState {
        let request = FetchRequest { query, options };
        if self.request.as_ref() == Some(&request) {
            return self.state();
        }
        let state = self.issue(&request).await;
        self.request = Some(request);
        state
    }

    /// Re-issue the last request. A no-op before the first `execute`.
    pub async fn refetch(&mut self) -> FetchState {
        match self.request.clone() {
            Some(request) => self.issue(&request).await,
            None => self.state(),
        }
    }

    async fn issue(&self, request: &FetchRequest) -> FetchState {
        self.state.send_modify(|s| s.is_loading = true);
        tracing::debug!(
            endpoint = self.endpoint.name(),
            namespace = request.query.namespace(),
            limit = ?request.options.limit,
            offset = ?request.options.offset,
            "issuing entity query"
        );

        let in_flight = LoadingGuard {
            state: &self.state,
            armed: true,
        };
        let result = self.endpoint.query(&request.query, &request.options).await;
        in_flight.disarm();

        self.state.send_modify(|s| {
            s.is_loading = false;
            match result {
                Ok(payload) => {
                    let entities = payload.into_vec();
                    tracing::debug!(count = entities.len(), "entity query complete");
                    s.entities = Some(entities);
                    s.error = None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, endpoint = self.endpoint.name(), "entity query failed");
                    // keep stale entities
                    s.error = Some(e);
                }
            }
        });
        self.state()
    }
}

/// Clears `is_loading` if the query future is dropped before it resolves.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<FetchState>,
    armed: bool,
}

impl LoadingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("entity query abandoned");
            self.state.send_modify(|s| s.is_loading = false);
        }
    }
}
