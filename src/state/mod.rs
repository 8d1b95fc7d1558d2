//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `CollectionState`: the stage a collection has reached (discovering, paginating, fetching pages, ...)

mod collection_state;

pub use collection_state::CollectionState;
