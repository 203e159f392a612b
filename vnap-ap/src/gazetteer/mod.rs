//! Gazetteer storage and retrieval
//!
//! A versioned in-memory snapshot of the administrative hierarchy behind an
//! abstract ranked-search contract. The candidate builder depends only on
//! `search(query, filter, limit)`; the engine behind it is swappable.

mod index;
mod snapshot;

pub use index::{GazetteerIndex, IndexSettings, ScoredUnit, SearchFilter};
pub use snapshot::Snapshot;
