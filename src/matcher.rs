//! Alignment matcher.
//!
//! Looks up every hash produced from a query clip, votes on the
//! `(track_id, offset)` pair each occurrence implies, and reports the
//! track(s) whose best-voted offset accounts for the largest share of the
//! query's own hashes, ranked as a confidence-scored top-k so callers can
//! see alternates.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::Result;
use crate::hashing::Fingerprint;
use crate::index::FingerprintIndex;
use crate::metadata::TrackId;

/// One candidate match, ranked by `confidence` descending.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub track_id: TrackId,
    /// `votes / query_hash_count`, in `[0.0, 1.0]`.
    pub confidence: f64,
    /// `t_index - t_query` for the winning alignment, in STFT frames.
    pub offset: i64,
    /// Number of query hashes that landed on the winning offset.
    pub votes: usize,
}

/// Matches `query_hashes` (produced by [`crate::hashing::create_hashes`] on
/// the query clip) against `index`, returning up to `top_k` candidates
/// ordered by confidence descending, ties broken by `track_id` ascending
/// for determinism.
///
/// Returns an empty vec, not an error, if `query_hashes` is empty or no
/// hash has any occurrence in `index`.
pub fn match_query(
    index: &dyn FingerprintIndex,
    query_hashes: &[Fingerprint],
    top_k: usize,
) -> Result<Vec<MatchCandidate>> {
    if query_hashes.is_empty() {
        tracing::debug!("match_query: no query hashes");
        return Ok(Vec::new());
    }

    // offset = t_index_anchor - t_query_anchor; a true match clusters its
    // occurrences on one dominant offset regardless of where in the
    // original track the query clip was taken from.
    let mut histogram: HashMap<(TrackId, i64), usize> = HashMap::new();
    for qfp in query_hashes {
        for (track_id, t_index) in index.query(qfp.hash)? {
            let offset = t_index as i64 - qfp.t_anchor as i64;
            *histogram.entry((track_id, offset)).or_insert(0) += 1;
        }
    }

    let mut best_per_track: HashMap<TrackId, (i64, usize)> = HashMap::new();
    for ((track_id, offset), votes) in histogram {
        best_per_track
            .entry(track_id)
            .and_modify(|best| {
                if votes > best.1 || (votes == best.1 && offset < best.0) {
                    *best = (offset, votes);
                }
            })
            .or_insert((offset, votes));
    }

    let n_query = query_hashes.len() as f64;
    let mut candidates: Vec<MatchCandidate> = best_per_track
        .into_iter()
        .map(|(track_id, (offset, votes))| MatchCandidate {
            track_id,
            confidence: votes as f64 / n_query,
            offset,
            votes,
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.track_id.as_str().cmp(b.track_id.as_str()))
    });
    candidates.truncate(top_k);

    tracing::debug!(n_candidates = candidates.len(), "match_query done");
    Ok(candidates)
}
