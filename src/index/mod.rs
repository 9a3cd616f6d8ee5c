//! The inverted hash index.
//!
//! [`FingerprintIndex`] is the storage seam: an in-memory backend
//! ([`memory::MemoryIndex`]) for throughput and a SQLite-backed backend
//! ([`sqlite::SqliteIndex`]) for durability. Both honor the same six
//! operations and the same atomicity contract — the only observable
//! difference is whether state survives a process restart.
//!
//! Upsert semantics on a re-`store()` of an existing `track_id` are
//! delete-then-insert, implemented identically by both backends.

pub mod memory;
pub mod sqlite;

use crate::error::Result;
use crate::hashing::Fingerprint;
use crate::metadata::{TrackId, TrackMetadata};

pub use memory::MemoryIndex;
pub use sqlite::SqliteIndex;

/// Aggregate counters returned by `stats()`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct IndexStats {
    pub n_tracks: usize,
    pub n_hash_entries: usize,
    pub n_unique_hashes: usize,
    pub backend_tag: &'static str,
}

/// The storage seam every backend implements identically.
///
/// Implementations MUST uphold: a reader that observes any hash of a
/// track via `query` must also be able to observe that track's metadata
/// via `metadata`. None of these operations panic on absent keys; they
/// return `Ok(None)`/`Ok(vec![])`.
pub trait FingerprintIndex: Send + Sync {
    /// Atomically replaces any existing entries for `track_id` with
    /// `metadata` and `hashes` (delete-then-insert upsert semantics).
    fn store(&self, track_id: &TrackId, metadata: TrackMetadata, hashes: &[Fingerprint]) -> Result<()>;

    /// All `(track_id, t_anchor)` occurrences of `hash`, across all
    /// indexed tracks. Empty when absent.
    fn query(&self, hash: u32) -> Result<Vec<(TrackId, u32)>>;

    /// The metadata record for `track_id`, or `None` if it isn't indexed.
    fn metadata(&self, track_id: &TrackId) -> Result<Option<TrackMetadata>>;

    /// Removes all entries for `track_id`. Idempotent: deleting an absent
    /// track is not an error.
    fn delete(&self, track_id: &TrackId) -> Result<()>;

    /// Aggregate counters over the whole index.
    fn stats(&self) -> Result<IndexStats>;

    /// Empties the index.
    fn clear(&self) -> Result<()>;

    /// Metadata for every indexed track (backs `GET /songs`).
    fn all_tracks(&self) -> Result<Vec<TrackMetadata>>;
}
