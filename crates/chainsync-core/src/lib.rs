//! chainsync-core — client-side synchronization layer for entity indexers.
//!
//! # Overview
//!
//! The indexer exposes namespaced entities (records made of named model
//! sub-records) through one-shot queries and live subscriptions. This crate
//! defines:
//!
//! - [`ids`]: fixed-width identifier normalization
//! - [`Filter`] / [`QueryBuilder`]: declarative filters and namespaced queries
//! - [`EntityStore`]: the process-wide, merge-only entity map
//! - [`EntityEndpoint`]: the async trait every remote endpoint implements
//! - [`FetchExecutor`]: one-shot queries with loading/error state
//! - [`SubscriptionManager`]: live channel lifecycle and delta merging
//! - [`SyncError`]: structured error type
//!
//! ```text
//! QueryBuilder ──► FetchExecutor ────────► EntityEndpoint::query
//!              └─► SubscriptionManager ──► EntityEndpoint::subscribe
//!                        │ deltas
//!                        ▼
//!                   EntityStore (shared)
//! ```

pub mod config;
pub mod endpoint;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod ids;
pub mod logging;
pub mod memo;
pub mod query;
pub mod store;
pub mod subscription;

pub use config::SyncConfig;
pub use endpoint::{
    ChannelHandle, DeltaBatch, EntityEndpoint, EntityPayload, EntitySubscription, UpdateStream,
};
pub use entity::{Entity, EntityId, EntityView, SENTINEL_ENTITY_ID};
pub use error::SyncError;
pub use fetch::{FetchExecutor, FetchRequest, FetchState};
pub use filter::{Filter, Scalar};
pub use ids::normalize_id;
pub use logging::{init_tracing, LogConfig};
pub use memo::Memo;
pub use query::{Direction, FetchOptions, OrderBy, Query, QueryBuilder};
pub use store::EntityStore;
pub use subscription::{SubscriptionManager, SubscriptionPhase, SubscriptionState};
