//! Hash generator: turns peak pairs into combinatorial hashes.
//!
//! Pairs each peak (the anchor) with up to `fan_value` successor peaks and
//! packs each pair into a 32-bit combinatorial hash. Hash identity is a
//! byte-for-byte contract: bits 31..20 hold the anchor's frequency bin
//! (clamped to 12 bits), bits 19..10 hold the target's frequency bin
//! (truncated to 10 bits — intentional, it shrinks hash cardinality and
//! stays symmetric between indexing and querying), bits 9..0 hold `Δt`
//! (1..=1023). Pairs with `Δt <= 0` or `Δt > 1023` are dropped before they
//! ever reach storage.

use crate::peaks::Peak;

const ANCHOR_FREQ_BITS: u32 = 12;
const TARGET_FREQ_BITS: u32 = 10;
const DELTA_T_BITS: u32 = 10;

const ANCHOR_FREQ_MASK: u32 = (1 << ANCHOR_FREQ_BITS) - 1;
const TARGET_FREQ_MASK: u32 = (1 << TARGET_FREQ_BITS) - 1;
const DELTA_T_MASK: u32 = (1 << DELTA_T_BITS) - 1;

/// A single emitted hash, not yet attached to a track. [`crate::index`]
/// attaches the `track_id` at store time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub hash: u32,
    pub t_anchor: u32,
}

/// Packs `(anchor_freq, target_freq, delta_t)` into the 32-bit hash
/// layout described above. `delta_t` must already satisfy
/// `0 < delta_t <= 1023`; callers
/// (here, and the matcher's test fixtures) that violate this invariant get
/// a value with the low bits silently wrapped, which is why
/// [`create_hashes`] validates the range before calling this.
pub fn pack_hash(anchor_freq: u16, target_freq: u16, delta_t: u16) -> u32 {
    let f1 = (anchor_freq as u32) & ANCHOR_FREQ_MASK;
    let f2 = (target_freq as u32) & TARGET_FREQ_MASK;
    let dt = (delta_t as u32) & DELTA_T_MASK;
    (f1 << 20) | (f2 << 10) | dt
}

/// Decodes a packed hash back into `(anchor_freq, target_freq, delta_t)`;
/// the inverse of [`pack_hash`].
pub fn unpack_hash(hash: u32) -> (u16, u16, u16) {
    let anchor_freq = ((hash >> 20) & ANCHOR_FREQ_MASK) as u16;
    let target_freq = ((hash >> 10) & TARGET_FREQ_MASK) as u16;
    let delta_t = (hash & DELTA_T_MASK) as u16;
    (anchor_freq, target_freq, delta_t)
}

/// Generates hash records from an ordered peak list.
///
/// `peaks` MUST already be sorted by ascending `t` (the contract
/// [`crate::peaks::find_peaks`] provides). For each anchor, the next
/// `fan_value` peaks in the list are tried as targets; a pair is skipped
/// (not counted against the fan budget) when `Δt` falls outside
/// `(0, 1023]`.
pub fn create_hashes(peaks: &[Peak], fan_value: usize) -> Vec<Fingerprint> {
    if peaks.len() < 2 {
        tracing::debug!(n_peaks = peaks.len(), "create_hashes: not enough peaks to pair");
        return Vec::new();
    }

    let mut fingerprints = Vec::new();

    for i in 0..peaks.len() {
        let anchor = &peaks[i];
        let end = (i + 1 + fan_value).min(peaks.len());

        for target in &peaks[i + 1..end] {
            let delta_t = target.t as i64 - anchor.t as i64;
            if delta_t <= 0 || delta_t > 1023 {
                continue;
            }

            let hash = pack_hash(anchor.f, target.f, delta_t as u16);
            fingerprints.push(Fingerprint {
                hash,
                t_anchor: anchor.t,
            });
        }
    }

    tracing::debug!(n_peaks = peaks.len(), n_hashes = fingerprints.len(), "create_hashes done");
    fingerprints
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_layout_matches_worked_example() {
        let peaks = [
            Peak { t: 0, f: 100, a: 1.0 },
            Peak { t: 5, f: 150, a: 1.0 },
        ];
        let hashes = create_hashes(&peaks, 1);
        assert_eq!(hashes.len(), 1);
        // (100 << 20) | (150 << 10) | 5
        assert_eq!(hashes[0].hash, (100u32 << 20) | (150u32 << 10) | 5);
        assert_eq!(hashes[0].t_anchor, 0);
    }

    #[test]
    fn round_trip_bit_field() {
        for &(f1, f2, dt) in &[(0u16, 0u16, 1u16), (4095, 1023, 1023), (1, 1, 1), (2048, 512, 500)] {
            let packed = pack_hash(f1, f2, dt);
            assert_eq!(unpack_hash(packed), (f1, f2, dt));
        }
    }

    #[test]
    fn zero_delta_t_is_dropped() {
        let peaks = [Peak { t: 5, f: 1, a: 1.0 }, Peak { t: 5, f: 2, a: 1.0 }];
        assert!(create_hashes(&peaks, 5).is_empty());
    }

    #[test]
    fn delta_t_over_1023_is_dropped() {
        let peaks = [Peak { t: 0, f: 1, a: 1.0 }, Peak { t: 1024, f: 2, a: 1.0 }];
        assert!(create_hashes(&peaks, 5).is_empty());
    }

    #[test]
    fn fan_value_bounds_pairs_per_anchor() {
        let mut peaks = vec![Peak { t: 0, f: 0, a: 1.0 }];
        for t in 1..=10u32 {
            peaks.push(Peak { t, f: t as u16, a: 1.0 });
        }
        let hashes = create_hashes(&peaks, 3);
        let from_first_anchor = hashes.iter().filter(|h| h.t_anchor == 0).count();
        assert_eq!(from_first_anchor, 3);
    }

    #[test]
    fn fewer_than_two_peaks_yields_no_hashes() {
        assert!(create_hashes(&[], 5).is_empty());
        assert!(create_hashes(&[Peak { t: 0, f: 0, a: 1.0 }], 5).is_empty());
    }
}
