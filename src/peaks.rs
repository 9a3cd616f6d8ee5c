//! Peak picker: finds sparse time-frequency landmarks.
//!
//! Finds sparse time-frequency landmarks: cells whose `log1p` magnitude is
//! both a local maximum over a square neighborhood and above an amplitude
//! floor. Edge handling clips the neighborhood window at the spectrogram's
//! boundary rather than reflecting or wrapping — this must stay identical
//! between indexing and querying, never which one is "more correct".

/// A time-frequency landmark, named rather than a positional tuple so the
/// fields read at call sites.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Frame index, `t in [0, T)`.
    pub t: u32,
    /// Frequency bin index, `f in [0, F)`.
    pub f: u16,
    /// Raw (pre-log) magnitude at `(t, f)`.
    pub a: f32,
}

/// Finds peaks in `spectrogram` (indexed `[t][f]`), returning them sorted
/// stably by ascending frame index.
///
/// `neighborhood_size` is the square structural element's side (default
/// 20); `min_amplitude` is the pre-log1p amplitude floor (default 10.0).
pub fn find_peaks(spectrogram: &[Vec<f32>], neighborhood_size: usize, min_amplitude: f32) -> Vec<Peak> {
    if spectrogram.is_empty() || spectrogram[0].is_empty() {
        tracing::debug!("find_peaks: empty spectrogram");
        return Vec::new();
    }

    let num_frames = spectrogram.len();
    let num_bins = spectrogram[0].len();
    let radius = (neighborhood_size / 2).max(1);
    let log_floor = min_amplitude.max(0.0).ln_1p();

    tracing::trace!(num_frames, num_bins, neighborhood_size, min_amplitude, "scanning for peaks");

    let mut peaks = Vec::new();

    for t in 0..num_frames {
        let t_start = t.saturating_sub(radius);
        let t_end = (t + radius + 1).min(num_frames);

        for f in 0..num_bins {
            let l = spectrogram[t][f].ln_1p();
            if l <= log_floor {
                continue;
            }

            let f_start = f.saturating_sub(radius);
            let f_end = (f + radius + 1).min(num_bins);

            let mut local_max = true;
            'scan: for nt in t_start..t_end {
                for nf in f_start..f_end {
                    if spectrogram[nt][nf].ln_1p() > l {
                        local_max = false;
                        break 'scan;
                    }
                }
            }

            if local_max {
                peaks.push(Peak {
                    t: t as u32,
                    f: f as u16,
                    a: spectrogram[t][f],
                });
            }
        }
    }

    tracing::debug!(n_peaks = peaks.len(), "find_peaks done");
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_spectrogram(t: usize, f: usize, value: f32) -> Vec<Vec<f32>> {
        vec![vec![value; f]; t]
    }

    #[test]
    fn empty_spectrogram_yields_no_peaks() {
        assert!(find_peaks(&[], 20, 10.0).is_empty());
    }

    #[test]
    fn below_floor_yields_no_peaks() {
        let s = flat_spectrogram(5, 5, 1.0);
        assert!(find_peaks(&s, 3, 10.0).is_empty());
    }

    #[test]
    fn single_spike_is_found() {
        let mut s = flat_spectrogram(10, 10, 0.0);
        s[5][5] = 1000.0;
        let peaks = find_peaks(&s, 3, 10.0);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].t, 5);
        assert_eq!(peaks[0].f, 5);
    }

    #[test]
    fn peaks_are_sorted_by_time() {
        let mut s = flat_spectrogram(10, 10, 0.0);
        s[8][1] = 1000.0;
        s[2][1] = 1000.0;
        let peaks = find_peaks(&s, 1, 10.0);
        for w in peaks.windows(2) {
            assert!(w[0].t <= w[1].t);
        }
    }

    #[test]
    fn uniform_plateau_above_floor_is_all_accepted() {
        let s = flat_spectrogram(4, 4, 1000.0);
        let peaks = find_peaks(&s, 3, 10.0);
        assert_eq!(peaks.len(), 16);
    }
}
