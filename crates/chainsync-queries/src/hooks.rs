//! One-shot domain queries.
//!
//! Each hook memoizes its query on the dependency values it is given, so
//! calling `fetch` again with equal arguments issues nothing.

use std::sync::Arc;

use tokio::sync::watch;

use chainsync_core::config::SyncConfig;
use chainsync_core::endpoint::EntityEndpoint;
use chainsync_core::entity::Entity;
use chainsync_core::error::SyncError;
use chainsync_core::fetch::{FetchExecutor, FetchState};
use chainsync_core::ids::IdInput;
use chainsync_core::memo::Memo;
use chainsync_core::query::{FetchOptions, Query};

use crate::filters;

// ─── FetchHook ────────────────────────────────────────────────────────────────

/// A [`FetchExecutor`] whose query is memoized on dependency values `D`.
pub struct FetchHook<D> {
    config: SyncConfig,
    query: Memo<D, Query>,
    executor: FetchExecutor,
}

impl<D: PartialEq> FetchHook<D> {
    /// Hook over `namespace` with an open schema.
    pub fn new(endpoint: Arc<dyn EntityEndpoint>, namespace: impl Into<String>) -> Self {
        Self::from_config(endpoint, &SyncConfig::new(namespace))
    }

    /// Hook whose queries are checked against the schema in `config`.
    pub fn from_config(endpoint: Arc<dyn EntityEndpoint>, config: &SyncConfig) -> Self {
        Self {
            config: config.clone(),
            query: Memo::new(),
            executor: FetchExecutor::new(endpoint),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Build (or reuse) the query for `deps` and execute it with `options`.
    ///
    /// # Errors
    /// Only query construction fails here (bad identifiers, or models the
    /// configured schema does not know); remote errors land in
    /// [`FetchState::error`].
    pub async fn run(
        &mut self,
        deps: D,
        build: impl FnOnce(&str, &D) -> Result<Query, SyncError>,
        options: FetchOptions,
    ) -> Result<FetchState, SyncError> {
        let config = &self.config;
        let query = self
            .query
            .try_get_or_compute(deps, |d| {
                tracing::debug!(namespace = %config.namespace, "building query");
                let query = build(&config.namespace, d)?;
                config.validate_query(&query)?;
                Ok::<Query, SyncError>(query)
            })?
            .clone();
        Ok(self.executor.execute(query, options).await)
    }

    pub async fn refetch(&mut self) -> FetchState {
        self.executor.refetch().await
    }

    pub fn state(&self) -> FetchState {
        self.executor.state()
    }

    pub fn watch(&self) -> watch::Receiver<FetchState> {
        self.executor.watch()
    }

    /// How many times the query was (re)built.
    pub fn query_builds(&self) -> u64 {
        self.query.recomputations()
    }
}

macro_rules! fetch_hook_accessors {
    ($($hook:ident),+ $(,)?) => {$(
        impl $hook {
            /// Hook whose queries are checked against the schema in `config`.
            pub fn from_config(endpoint: Arc<dyn EntityEndpoint>, config: &SyncConfig) -> Self {
                Self(FetchHook::from_config(endpoint, config))
            }

            /// Re-issue the last query.
            pub async fn refetch(&mut self) -> FetchState {
                self.0.refetch().await
            }

            pub fn state(&self) -> FetchState {
                self.0.state()
            }

            pub fn watch(&self) -> watch::Receiver<FetchState> {
                self.0.watch()
            }

            pub fn query_builds(&self) -> u64 {
                self.0.query_builds()
            }
        }
    )+};
}

fetch_hook_accessors!(
    TokensQuery,
    TournamentCountsQuery,
    PrizeCountsQuery,
    UpcomingTournamentsQuery,
    LiveTournamentsQuery,
    TournamentDetailsQuery,
    TournamentDetailsInListQuery,
);

// ─── Listings ─────────────────────────────────────────────────────────────────

/// Every token.
pub struct TokensQuery(FetchHook<()>);

impl TokensQuery {
    pub fn new(endpoint: Arc<dyn EntityEndpoint>, namespace: impl Into<String>) -> Self {
        Self(FetchHook::new(endpoint, namespace))
    }

    pub async fn fetch(&mut self) -> Result<FetchState, SyncError> {
        self.0
            .run((), |ns, _| Ok(filters::tokens(ns)), FetchOptions::new())
            .await
    }
}

/// Tournaments starting after a given time, ascending by start.
pub struct UpcomingTournamentsQuery(FetchHook<IdInput>);

impl UpcomingTournamentsQuery {
    pub fn new(endpoint: Arc<dyn EntityEndpoint>, namespace: impl Into<String>) -> Self {
        Self(FetchHook::new(endpoint, namespace))
    }

    pub async fn fetch(
        &mut self,
        current_time: impl Into<IdInput>,
        limit: u32,
        offset: u32,
    ) -> Result<FetchState, SyncError> {
        let options = filters::by_schedule_start(self.0.namespace(), limit, offset);
        self.0
            .run(current_time.into(), filters::upcoming_tournaments, options)
            .await
    }
}

/// Tournaments in progress at a given time, ascending by start.
pub struct LiveTournamentsQuery(FetchHook<IdInput>);

impl LiveTournamentsQuery {
    pub fn new(endpoint: Arc<dyn EntityEndpoint>, namespace: impl Into<String>) -> Self {
        Self(FetchHook::new(endpoint, namespace))
    }

    pub async fn fetch(
        &mut self,
        current_time: impl Into<IdInput>,
        limit: u32,
        offset: u32,
    ) -> Result<FetchState, SyncError> {
        let options = filters::by_schedule_start(self.0.namespace(), limit, offset);
        self.0
            .run(current_time.into(), filters::live_tournaments, options)
            .await
    }
}

// ─── Metrics ──────────────────────────────────────────────────────────────────

/// Platform-wide tournament counters stored under one key.
pub struct TournamentCountsQuery(FetchHook<IdInput>);

impl TournamentCountsQuery {
    pub fn new(endpoint: Arc<dyn EntityEndpoint>, namespace: impl Into<String>) -> Self {
        Self(FetchHook::new(endpoint, namespace))
    }

    pub async fn fetch(&mut self, key: impl Into<IdInput>) -> Result<FetchState, SyncError> {
        self.0
            .run(key.into(), filters::tournament_counts, FetchOptions::new())
            .await
    }

    /// The metrics record, if one was returned.
    pub fn entity(&self) -> Option<Entity> {
        self.0.state().first().cloned()
    }
}

/// Prize counters stored under one key.
pub struct PrizeCountsQuery(FetchHook<IdInput>);

impl PrizeCountsQuery {
    pub fn new(endpoint: Arc<dyn EntityEndpoint>, namespace: impl Into<String>) -> Self {
        Self(FetchHook::new(endpoint, namespace))
    }

    pub async fn fetch(&mut self, key: impl Into<IdInput>) -> Result<FetchState, SyncError> {
        self.0
            .run(key.into(), filters::prize_counts, FetchOptions::new())
            .await
    }

    pub fn entity(&self) -> Option<Entity> {
        self.0.state().first().cloned()
    }
}

// ─── Details ──────────────────────────────────────────────────────────────────

/// One tournament and its prizes.
pub struct TournamentDetailsQuery(FetchHook<IdInput>);

impl TournamentDetailsQuery {
    pub fn new(endpoint: Arc<dyn EntityEndpoint>, namespace: impl Into<String>) -> Self {
        Self(FetchHook::new(endpoint, namespace))
    }

    pub async fn fetch(&mut self, tournament_id: impl Into<IdInput>) -> Result<FetchState, SyncError> {
        self.0
            .run(tournament_id.into(), filters::tournament_details, FetchOptions::new())
            .await
    }
}

/// Prizes of a batch of tournaments.
pub struct TournamentDetailsInListQuery(FetchHook<Vec<IdInput>>);

impl TournamentDetailsInListQuery {
    pub fn new(endpoint: Arc<dyn EntityEndpoint>, namespace: impl Into<String>) -> Self {
        Self(FetchHook::new(endpoint, namespace))
    }

    pub async fn fetch<I, T>(&mut self, tournament_ids: I) -> Result<FetchState, SyncError>
    where
        I: IntoIterator<Item = T>,
        T: Into<IdInput>,
    {
        let ids: Vec<IdInput> = tournament_ids.into_iter().map(Into::into).collect();
        self.0
            .run(
                ids,
                |ns, ids| filters::tournament_details_in_list(ns, ids),
                FetchOptions::new(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsync_memory::MemoryEndpoint;

    const NS: &str = "budokan";

    #[tokio::test]
    async fn equal_time_reuses_query_and_skips_io() {
        let ep = MemoryEndpoint::new("mem");
        let mut hook = UpcomingTournamentsQuery::new(Arc::new(ep.clone()), NS);

        hook.fetch(100u64, 10, 0).await.unwrap();
        // different input, same padded value
        hook.fetch("0x64", 10, 0).await.unwrap();
        assert_eq!(ep.query_count(), 1);
        assert_eq!(hook.query_builds(), 2);

        hook.fetch("0x64", 10, 0).await.unwrap();
        assert_eq!(hook.query_builds(), 2);
        assert_eq!(ep.query_count(), 1);

        // next page, same query
        hook.fetch("0x64", 10, 10).await.unwrap();
        assert_eq!(hook.query_builds(), 2);
        assert_eq!(ep.query_count(), 2);
    }

    #[tokio::test]
    async fn refetch_reissues() {
        let ep = MemoryEndpoint::new("mem");
        let mut hook = TokensQuery::new(Arc::new(ep.clone()), NS);
        hook.fetch().await.unwrap();
        hook.fetch().await.unwrap();
        hook.refetch().await;
        assert_eq!(ep.query_count(), 2);
        assert_eq!(hook.query_builds(), 1);
    }

    #[tokio::test]
    async fn invalid_key_issues_nothing() {
        let ep = MemoryEndpoint::new("mem");
        let mut hook = TournamentCountsQuery::new(Arc::new(ep.clone()), NS);
        assert!(hook.fetch("not-a-number").await.is_err());
        assert_eq!(ep.query_count(), 0);
        assert!(hook.entity().is_none());
    }

    #[tokio::test]
    async fn models_outside_the_schema_are_rejected_before_io() {
        let ep = MemoryEndpoint::new("mem");
        let config = SyncConfig::new(NS).with_models([crate::models::TOURNAMENT]);

        let mut tokens = TokensQuery::from_config(Arc::new(ep.clone()), &config);
        let err = tokens.fetch().await.unwrap_err();
        assert!(matches!(err, SyncError::UnknownModel { ref model, .. } if model == "Token"));
        assert_eq!(ep.query_count(), 0);
        // a rejected build is not memoized
        assert!(tokens.fetch().await.is_err());
        assert_eq!(tokens.query_builds(), 0);

        let mut upcoming = UpcomingTournamentsQuery::from_config(Arc::new(ep.clone()), &config);
        let state = upcoming.fetch(100u64, 10, 0).await.unwrap();
        assert!(state.error.is_none());
        assert_eq!(ep.query_count(), 1);
    }

    #[tokio::test]
    async fn batched_ids_memoize_by_value() {
        let ep = MemoryEndpoint::new("mem");
        let mut hook = TournamentDetailsInListQuery::new(Arc::new(ep.clone()), NS);
        hook.fetch([1u64, 2]).await.unwrap();
        hook.fetch(vec![1u64, 2]).await.unwrap();
        assert_eq!(hook.query_builds(), 1);
        assert_eq!(ep.query_count(), 1);
    }
}
