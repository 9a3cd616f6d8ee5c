//! Deployment configuration.
//!
//! All indexed tracks and all queries against a given index MUST share the
//! DSP parameters (`sample_rate`, `n_fft`, `hop_length`,
//! `peak_neighborhood_size`, `min_amplitude`, `fan_value`). They participate
//! implicitly in hash identity, so the SQLite backend persists them on
//! first use and refuses to open against a mismatched config
//! (`FingerprintError::ParameterMismatch`).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FingerprintError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageType {
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "tabular-local")]
    TabularLocal,
    #[serde(rename = "tabular-remote")]
    TabularRemote,
}

impl Default for StorageType {
    fn default() -> Self {
        StorageType::Memory
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target sample rate audio is decoded/resampled to. Fixed across an
    /// index's lifetime.
    pub sample_rate: u32,
    /// STFT window size.
    pub n_fft: usize,
    /// STFT hop size.
    pub hop_length: usize,
    /// Square neighborhood side used by the peak picker's max filter.
    pub peak_neighborhood_size: usize,
    /// Amplitude floor (pre-log1p) a candidate peak must exceed.
    pub min_amplitude: f32,
    /// Number of successor peaks each anchor is paired with.
    pub fan_value: usize,
    /// Selects the index backend.
    pub storage_type: StorageType,
    /// Path to the SQLite database file, when `storage_type` is tabular.
    pub sqlite_path: String,
    /// Extensions accepted by the upload validator, without the leading dot.
    pub allowed_extensions: Vec<String>,
    /// Maximum accepted upload size, in bytes.
    pub max_content_length: u64,
    /// Number of workers used by the batch indexing orchestrator.
    pub index_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sample_rate: 11_025,
            n_fft: 2048,
            hop_length: 512,
            peak_neighborhood_size: 20,
            min_amplitude: 10.0,
            fan_value: 5,
            storage_type: StorageType::Memory,
            sqlite_path: "sivana.sqlite".to_string(),
            allowed_extensions: vec![
                "mp3".into(),
                "wav".into(),
                "flac".into(),
                "m4a".into(),
                "ogg".into(),
            ],
            max_content_length: 16 * 1024 * 1024,
            index_workers: 4,
        }
    }
}

impl Config {
    /// Loads a config from a TOML file, falling back to defaults for any
    /// field the file doesn't set. Environment variables of the form
    /// `SIVANA_<FIELD_NAME_UPPER>` override file values; this is meant to
    /// be layered under `clap`'s own `env` attributes at the CLI boundary.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .map_err(|e| FingerprintError::Validation(format!("reading config {}: {e}", p.display())))?;
                toml::from_str(&text)
                    .map_err(|e| FingerprintError::Validation(format!("parsing config {}: {e}", p.display())))?
            }
            None => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SIVANA_SAMPLE_RATE") {
            if let Ok(v) = v.parse() {
                self.sample_rate = v;
            }
        }
        if let Ok(v) = std::env::var("SIVANA_N_FFT") {
            if let Ok(v) = v.parse() {
                self.n_fft = v;
            }
        }
        if let Ok(v) = std::env::var("SIVANA_HOP_LENGTH") {
            if let Ok(v) = v.parse() {
                self.hop_length = v;
            }
        }
        if let Ok(v) = std::env::var("SIVANA_SQLITE_PATH") {
            self.sqlite_path = v;
        }
    }

    /// The fingerprint-identity-relevant subset of the config, used by the
    /// SQLite backend to detect a parameter mismatch on reopen.
    pub fn dsp_fingerprint(&self) -> DspParams {
        DspParams {
            sample_rate: self.sample_rate,
            n_fft: self.n_fft,
            hop_length: self.hop_length,
            peak_neighborhood_size: self.peak_neighborhood_size,
            min_amplitude_bits: self.min_amplitude.to_bits(),
            fan_value: self.fan_value,
        }
    }
}

/// The parameters that participate implicitly in hash identity. Two
/// indexes (or an index and a query) with different `DspParams` cannot be
/// compared meaningfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DspParams {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub peak_neighborhood_size: usize,
    pub min_amplitude_bits: u32,
    pub fan_value: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.sample_rate, 11_025);
        assert_eq!(c.n_fft, 2048);
        assert_eq!(c.hop_length, 512);
        assert_eq!(c.peak_neighborhood_size, 20);
        assert_eq!(c.fan_value, 5);
    }

    #[test]
    fn dsp_fingerprint_is_stable_for_equal_configs() {
        let a = Config::default();
        let b = Config::default();
        assert_eq!(a.dsp_fingerprint(), b.dsp_fingerprint());
    }
}
