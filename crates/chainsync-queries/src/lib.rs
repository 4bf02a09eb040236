//! chainsync-queries — domain queries over the ChainSync core.
//!
//! Each hook pairs a memoized query with a [`chainsync_core::FetchExecutor`]
//! (one-shot) or a [`chainsync_core::SubscriptionManager`] (live):
//!
//! | Hook | Kind |
//! |---|---|
//! | [`TokensQuery`] | all `Token` records |
//! | [`TournamentCountsQuery`] | `PlatformMetrics` by key |
//! | [`PrizeCountsQuery`] | `PrizeMetrics` by key |
//! | [`UpcomingTournamentsQuery`] | tournaments starting after a time |
//! | [`LiveTournamentsQuery`] | tournaments running at a time |
//! | [`TournamentDetailsQuery`] | one tournament and its prizes |
//! | [`TournamentDetailsInListQuery`] | prizes of many tournaments |
//! | [`TournamentsSubscription`] | live `Tournament` updates |
//! | [`TokensSubscription`] | live `Token` updates |
//!
//! # Quick start
//! ```rust,no_run
//! use std::sync::Arc;
//! use chainsync_core::EntityEndpoint;
//! use chainsync_queries::UpcomingTournamentsQuery;
//!
//! # async fn run(endpoint: Arc<dyn EntityEndpoint>) -> Result<(), chainsync_core::SyncError> {
//! let mut upcoming = UpcomingTournamentsQuery::new(endpoint, "budokan_1_0_7");
//! let state = upcoming.fetch(1_700_000_000u64, 10, 0).await?;
//! println!("{} upcoming", state.entities.map_or(0, |e| e.len()));
//! # Ok(())
//! # }
//! ```

pub mod filters;
pub mod hooks;
pub mod models;
pub mod subscriptions;

pub use hooks::{
    FetchHook, LiveTournamentsQuery, PrizeCountsQuery, TokensQuery, TournamentCountsQuery,
    TournamentDetailsInListQuery, TournamentDetailsQuery, UpcomingTournamentsQuery,
};
pub use subscriptions::{TokensSubscription, TournamentsSubscription};
