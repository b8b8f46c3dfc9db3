//! Reference in-memory [`StorageEngine`](nornicdb_api::StorageEngine)
//! implementation.
//!
//! This is deliberately not a durable engine: no WAL, no page store, no
//! crash recovery. Durability is an explicit non-goal of the query
//! engine's specification -- this crate exists to give the query engine
//! something real to run against, and to document the contract a durable
//! engine would need to satisfy.

mod engine;
mod schema;
mod txn;

pub use engine::MemoryEngine;
pub use schema::MemorySchemaCatalog;
