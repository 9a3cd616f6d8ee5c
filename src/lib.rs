//! Landmark-based acoustic fingerprinting and identification engine.
//!
//! Pipeline: `audio` decodes and resamples a clip, `spectrogram` turns it
//! into a time-frequency matrix, `peaks` picks sparse landmarks from it,
//! `hashing` turns pairs of landmarks into combinatorial hashes, `index`
//! stores and looks those hashes up, and `matcher` turns a query clip's
//! hashes into ranked track candidates. `indexer` batches this over a
//! directory of files; `server` exposes it over HTTP.

pub mod audio;
pub mod config;
pub mod error;
pub mod hashing;
pub mod index;
pub mod indexer;
pub mod matcher;
pub mod metadata;
pub mod peaks;
pub mod server;
pub mod spectrogram;

pub use config::Config;
pub use error::{FingerprintError, Result};
pub use hashing::{create_hashes, Fingerprint};
pub use index::{FingerprintIndex, IndexStats, MemoryIndex, SqliteIndex};
pub use indexer::{index_directory, discover_audio_files, IndexSummary, ProgressSink};
pub use matcher::{match_query, MatchCandidate};
pub use metadata::{TrackId, TrackMetadata};
pub use peaks::{find_peaks, Peak};
pub use spectrogram::create_spectrogram;

use std::sync::Arc;

/// Runs the full A→B→C pipeline on a clip's decoded samples, grounded on
/// `Config`'s DSP parameters.
pub fn fingerprint_samples(config: &Config, samples: &[f32]) -> Vec<Fingerprint> {
    let spectrogram = create_spectrogram(samples, config.n_fft, config.hop_length);
    let peaks = find_peaks(&spectrogram, config.peak_neighborhood_size, config.min_amplitude);
    create_hashes(&peaks, config.fan_value)
}

/// Builds the configured index backend behind a shared, thread-safe
/// handle, per `config.storage_type`.
pub fn open_index(config: &Config) -> Result<Arc<dyn FingerprintIndex>> {
    match config.storage_type {
        config::StorageType::Memory => Ok(Arc::new(MemoryIndex::new())),
        config::StorageType::TabularLocal | config::StorageType::TabularRemote => {
            let path = std::path::Path::new(&config.sqlite_path);
            Ok(Arc::new(SqliteIndex::open(path, config.dsp_fingerprint())?))
        }
    }
}
