//! Track identifiers and metadata records.
//!
//! A strongly-typed record carrying the fields every backend agrees on,
//! plus an extension map so unknown fields still round-trip through the
//! SQLite backend's JSON column.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identifier for an indexed track, unique across the index.
///
/// Backed by `Arc<str>` rather than `String` so it is cheap to clone into
/// every hash record emitted for a track (tens of thousands per song).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(Arc<str>);

impl TrackId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        TrackId(id.into())
    }

    /// A fresh, randomly-generated id, for callers that don't supply one.
    pub fn generate() -> Self {
        TrackId(uuid::Uuid::new_v4().to_string().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        TrackId(Arc::from(s))
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        TrackId(Arc::from(s.as_str()))
    }
}

/// Metadata record for one indexed track.
///
/// `extra` preserves fields the caller supplied that this crate doesn't
/// otherwise model (album, genre, external ids, ...) — the SQLite backend
/// round-trips it as JSON alongside the typed columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub track_id: TrackId,
    pub title: String,
    pub artist: String,
    pub filepath: String,
    pub duration_sec: f64,
    pub num_peaks: usize,
    pub num_hashes: usize,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, Value>,
}

impl TrackMetadata {
    pub fn new(track_id: TrackId, filepath: impl Into<String>) -> Self {
        TrackMetadata {
            track_id,
            title: String::new(),
            artist: String::new(),
            filepath: filepath.into(),
            duration_sec: 0.0,
            num_peaks: 0,
            num_hashes: 0,
            extra: HashMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }
}
