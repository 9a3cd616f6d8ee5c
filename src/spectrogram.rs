//! Spectrogram builder.
//!
//! Turns a mono sample stream into a magnitude spectrogram via a centered
//! short-time Fourier transform: frame `t` is windowed (Hann) around
//! sample `t * hop_length`, with reflection padding at the signal's edges
//! so frame 0 is centered at sample 0 (the same convention as
//! `librosa.stft(..., center=True)`).

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// A magnitude spectrogram, `frames[t][f]`, `t` in `[0, T)`, `f` in
/// `[0, F)` with `F = n_fft / 2 + 1`.
pub type Spectrogram = Vec<Vec<f32>>;

fn hann_window(window_size: usize) -> Vec<f32> {
    let mut window = Vec::with_capacity(window_size);
    if window_size == 0 {
        return window;
    }
    if window_size == 1 {
        window.push(1.0);
        return window;
    }
    for i in 0..window_size {
        window.push(0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (window_size - 1) as f32).cos()));
    }
    window
}

/// Maps a (possibly out-of-range) sample index into `[0, len)` using
/// reflect boundary handling (no edge repeat): `-1 -> 1`, `-2 -> 2`,
/// `len -> len - 2`, etc. Must be used identically for indexing and
/// querying.
fn reflect_index(idx: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let len = len as isize;
    let period = 2 * (len - 1);
    let mut i = idx % period;
    if i < 0 {
        i += period;
    }
    if i >= len {
        i = period - i;
    }
    i as usize
}

/// Builds the magnitude spectrogram for `samples` under `(n_fft, hop)`.
///
/// Returns a spectrogram with `T = 0` for empty or sub-`n_fft` input,
/// never an error.
pub fn create_spectrogram(samples: &[f32], n_fft: usize, hop: usize) -> Spectrogram {
    if samples.is_empty() || samples.len() < n_fft || n_fft == 0 || hop == 0 {
        tracing::debug!(n_samples = samples.len(), n_fft, hop, "spectrogram: too few samples, T=0");
        return Vec::new();
    }

    let diff = samples.len() - n_fft;
    let num_frames = diff.div_ceil(hop) + 1;

    tracing::trace!(n_samples = samples.len(), n_fft, hop, num_frames, "building spectrogram");

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = hann_window(n_fft);
    let half = (n_fft / 2) as isize;

    let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); n_fft];
    let mut spectrogram: Spectrogram = Vec::with_capacity(num_frames);
    let num_bins = n_fft / 2 + 1;

    for t in 0..num_frames {
        let center = (t * hop) as isize;
        for (j, slot) in buffer.iter_mut().enumerate() {
            let sample_idx = center - half + j as isize;
            let idx = reflect_index(sample_idx, samples.len());
            *slot = Complex::new(samples[idx] * window[j], 0.0);
        }

        fft.process(&mut buffer);

        let mut magnitudes: Vec<f32> = Vec::with_capacity(num_bins);
        for bin in buffer.iter().take(num_bins) {
            magnitudes.push(bin.norm());
        }
        spectrogram.push(magnitudes);
    }

    spectrogram
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_zero_frames() {
        let s = create_spectrogram(&[], 2048, 512);
        assert!(s.is_empty());
    }

    #[test]
    fn sub_window_input_yields_zero_frames() {
        let samples = vec![0.0_f32; 100];
        let s = create_spectrogram(&samples, 2048, 512);
        assert!(s.is_empty());
    }

    #[test]
    fn frame_shape_matches_contract() {
        let samples = vec![0.1_f32; 11_025 * 3];
        let s = create_spectrogram(&samples, 2048, 512);
        assert!(!s.is_empty());
        assert_eq!(s[0].len(), 2048 / 2 + 1);
        let diff = samples.len() - 2048;
        let expected_t = diff.div_ceil(512) + 1;
        assert_eq!(s.len(), expected_t);
    }

    #[test]
    fn sine_tone_peaks_at_expected_bin() {
        let sr = 11_025.0_f32;
        let freq = 1000.0_f32;
        let n = 11_025;
        let samples: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr).sin())
            .collect();
        let s = create_spectrogram(&samples, 2048, 512);
        let mid_frame = &s[s.len() / 2];
        let (peak_bin, _) = mid_frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        let expected_bin = (freq * 2048.0 / sr).round() as usize;
        assert!((peak_bin as isize - expected_bin as isize).abs() <= 2);
    }

    #[test]
    fn reflect_index_mirrors_without_repeating_edge() {
        assert_eq!(reflect_index(-1, 10), 1);
        assert_eq!(reflect_index(-2, 10), 2);
        assert_eq!(reflect_index(10, 10), 8);
        assert_eq!(reflect_index(0, 10), 0);
    }
}
