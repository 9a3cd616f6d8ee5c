//! External collaborator: audio decode, mixdown and resample.
//!
//! Decodes a file, mixes it down to mono, and resamples any mismatched
//! source rate with `rubato`, since every downstream DSP stage assumes a
//! fixed sample rate.

use std::fs::File;
use std::path::Path;

use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{FingerprintError, Result};

/// Decodes `path`, mixes every channel down to mono, and resamples to
/// `target_sample_rate`. Returns the peak-normalized sample buffer ready
/// for [`crate::spectrogram::create_spectrogram`].
pub fn load_audio_file(path: &Path, target_sample_rate: u32) -> Result<Vec<f32>> {
    let (samples, source_rate) = decode_to_mono(path)?;
    let resampled = if source_rate == target_sample_rate {
        samples
    } else {
        resample(&samples, source_rate, target_sample_rate)?
    };
    Ok(normalize_peak(resampled))
}

/// Decodes `path` and mixes it down to mono, returning the samples
/// alongside the source sample rate (no resampling yet).
fn decode_to_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let src = File::open(path).map_err(|e| FingerprintError::Decode(format!("opening {}: {e}", path.display())))?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| FingerprintError::Decode(format!("probing {}: {e}", path.display())))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .ok_or_else(|| FingerprintError::Decode("no compatible audio track found".into()))?;

    let track_id = track.id;
    let source_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| FingerprintError::Decode("track has no sample rate".into()))?;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .map_err(|e| FingerprintError::Decode(format!("building decoder: {e}")))?;

    let mut mono = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                let params = format
                    .tracks()
                    .iter()
                    .find(|t| t.id == track_id)
                    .map(|t| &t.codec_params)
                    .ok_or_else(|| FingerprintError::Decode("track disappeared after reset".into()))?;
                decoder = symphonia::default::get_codecs()
                    .make(params, &dec_opts)
                    .map_err(|e| FingerprintError::Decode(format!("remaking decoder after reset: {e}")))?;
                continue;
            }
            Err(err) => return Err(FingerprintError::Decode(format!("reading packet: {err}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);

                let channels = spec.channels.count().max(1);
                let interleaved = buf.samples();
                mono.reserve(interleaved.len() / channels);
                for frame in interleaved.chunks_exact(channels) {
                    let sum: f32 = frame.iter().sum();
                    mono.push(sum / channels as f32);
                }
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::warn!(error = %msg, "dropping corrupt packet");
            }
            Err(err) => return Err(FingerprintError::Decode(format!("decoding: {err}"))),
        }
    }

    Ok((mono, source_rate))
}

fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| FingerprintError::Decode(format!("building resampler: {e}")))?;

    let output = resampler
        .process(&[samples.to_vec()], None)
        .map_err(|e| FingerprintError::Decode(format!("resampling: {e}")))?;

    Ok(output.into_iter().next().unwrap_or_default())
}

fn normalize_peak(mut samples: Vec<f32>) -> Vec<f32> {
    let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    if peak > 0.0 {
        let scale = 1.0 / peak;
        for s in samples.iter_mut() {
            *s *= scale;
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_peak_scales_to_unit_amplitude() {
        let out = normalize_peak(vec![0.0, 0.25, -0.5, 0.1]);
        assert!((out.iter().fold(0.0f32, |a, &s| a.max(s.abs())) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_peak_handles_silence() {
        let out = normalize_peak(vec![0.0, 0.0, 0.0]);
        assert_eq!(out, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn resample_identity_ratio_is_near_lossless() {
        let samples: Vec<f32> = (0..4096).map(|i| (i as f32 * 0.01).sin()).collect();
        let out = resample(&samples, 11_025, 11_025).unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn resample_empty_input_yields_empty_output() {
        let out = resample(&[], 44_100, 11_025).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let err = load_audio_file(Path::new("/nonexistent/path/does-not-exist.wav"), 11_025).unwrap_err();
        assert!(matches!(err, FingerprintError::Decode(_)));
    }
}
