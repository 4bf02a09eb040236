//! chainsync-memory — in-memory entity indexer for ChainSync.
//!
//! [`MemoryEndpoint`] implements [`chainsync_core::EntityEndpoint`] over a
//! table held in RAM. It answers one-shot queries (filter, sort, paginate)
//! and pushes published deltas to matching live channels. Useful for tests
//! and local development without a running indexer.

pub mod memory;

pub use memory::MemoryEndpoint;
