//! Storage module for persisting collected records
//!
//! This module owns the JSON record store, including:
//! - Loading an existing store, or setting aside a malformed one
//! - Identifier-based deduplication
//! - Atomic whole-document writes after every append
//! - Store statistics

mod dedup_store;
mod error;
mod record;

pub use dedup_store::{DedupStore, SharedStore, StoreStats};
pub use error::{StorageError, StorageResult};
pub use record::{Fields, PersistedStore, Record, StoreMetadata, RESERVED_KEYS};
