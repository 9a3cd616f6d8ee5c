//! In-memory backend: a hash map from hash to a growable occurrence list,
//! guarded by a single `RwLock` so concurrent readers never block each
//! other and a writer's two-map update is atomic to them.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{FingerprintIndex, IndexStats};
use crate::error::Result;
use crate::hashing::Fingerprint;
use crate::metadata::{TrackId, TrackMetadata};

#[derive(Default)]
struct State {
    hash_map: HashMap<u32, Vec<(TrackId, u32)>>,
    metadata: HashMap<TrackId, TrackMetadata>,
    n_hash_entries: usize,
}

/// Fast, non-durable index backend.
pub struct MemoryIndex {
    state: RwLock<State>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        MemoryIndex {
            state: RwLock::new(State::default()),
        }
    }

    /// Removes all hash entries belonging to `track_id`, without touching
    /// `metadata`. Caller holds the write lock.
    fn remove_track_hashes(state: &mut State, track_id: &TrackId) {
        let mut removed = 0usize;
        state.hash_map.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|(tid, _)| tid != track_id);
            removed += before - entries.len();
            !entries.is_empty()
        });
        state.n_hash_entries -= removed;
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintIndex for MemoryIndex {
    fn store(&self, track_id: &TrackId, metadata: TrackMetadata, hashes: &[Fingerprint]) -> Result<()> {
        let mut state = self.state.write().expect("memory index lock poisoned");
        Self::remove_track_hashes(&mut state, track_id);

        for fp in hashes {
            state
                .hash_map
                .entry(fp.hash)
                .or_default()
                .push((track_id.clone(), fp.t_anchor));
        }
        state.n_hash_entries += hashes.len();
        state.metadata.insert(track_id.clone(), metadata);

        tracing::debug!(%track_id, n_hashes = hashes.len(), "stored track in memory index");
        Ok(())
    }

    fn query(&self, hash: u32) -> Result<Vec<(TrackId, u32)>> {
        let state = self.state.read().expect("memory index lock poisoned");
        Ok(state.hash_map.get(&hash).cloned().unwrap_or_default())
    }

    fn metadata(&self, track_id: &TrackId) -> Result<Option<TrackMetadata>> {
        let state = self.state.read().expect("memory index lock poisoned");
        Ok(state.metadata.get(track_id).cloned())
    }

    fn delete(&self, track_id: &TrackId) -> Result<()> {
        let mut state = self.state.write().expect("memory index lock poisoned");
        Self::remove_track_hashes(&mut state, track_id);
        state.metadata.remove(track_id);
        Ok(())
    }

    fn stats(&self) -> Result<IndexStats> {
        let state = self.state.read().expect("memory index lock poisoned");
        Ok(IndexStats {
            n_tracks: state.metadata.len(),
            n_hash_entries: state.n_hash_entries,
            n_unique_hashes: state.hash_map.len(),
            backend_tag: "memory",
        })
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.state.write().expect("memory index lock poisoned");
        state.hash_map.clear();
        state.metadata.clear();
        state.n_hash_entries = 0;
        Ok(())
    }

    fn all_tracks(&self) -> Result<Vec<TrackMetadata>> {
        let state = self.state.read().expect("memory index lock poisoned");
        Ok(state.metadata.values().cloned().collect())
    }
}
