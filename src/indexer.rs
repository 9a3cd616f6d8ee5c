//! Batch indexing orchestrator.
//!
//! A bounded pool of worker threads pulls file paths off a job channel and
//! reports outcomes on a result channel. Each worker runs the full
//! A→B→C→store pipeline for one file; a decode failure on one file never
//! aborts the batch.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::audio;
use crate::config::Config;
use crate::error::Result;
use crate::hashing::create_hashes;
use crate::index::FingerprintIndex;
use crate::metadata::{TrackId, TrackMetadata};
use crate::peaks::find_peaks;
use crate::spectrogram::create_spectrogram;

/// A progress notification emitted after each file finishes, successfully
/// or not.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub estimated_remaining: Option<Duration>,
    pub items_per_sec: f64,
}

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: Progress);
}

/// Logs each notification at `info` via `tracing`, replacing the Python
/// original's console progress bar.
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_progress(&self, progress: Progress) {
        tracing::info!(
            current = progress.current,
            total = progress.total,
            items_per_sec = progress.items_per_sec,
            "indexing progress"
        );
    }
}

/// Outcome of indexing a single file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub track_id: Option<TrackId>,
    pub error: Option<String>,
}

/// Aggregate result of an `index_directory` call.
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<FileOutcome>,
}

/// Recursively walks `dir`, returning every file whose extension (matched
/// case-insensitively, without the leading dot) is in `allowed_extensions`.
pub fn discover_audio_files(dir: &Path, allowed_extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        let entries = std::fs::read_dir(&current).map_err(|e| {
            crate::error::FingerprintError::Validation(format!("reading directory {}: {e}", current.display()))
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| crate::error::FingerprintError::Validation(e.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let matches_extension = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| allowed_extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
                .unwrap_or(false);
            if matches_extension {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

/// Derives `(artist, title)` from an `"Artist - Title.ext"` filename
/// convention, falling back to `(None, stem)` when the separator is
/// absent.
pub fn derive_artist_title(path: &Path) -> (Option<String>, String) {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("unknown").to_string();
    match stem.split_once(" - ") {
        Some((artist, title)) => (Some(artist.trim().to_string()), title.trim().to_string()),
        None => (None, stem),
    }
}

/// Indexes every audio file discovered under `dir` into `index`, using
/// `config.index_workers` worker threads. Returns a summary covering
/// every file, whether it succeeded or not; never returns early on a
/// single file's failure.
pub fn index_directory(
    dir: &Path,
    config: &Config,
    index: Arc<dyn FingerprintIndex>,
    progress: Option<Arc<dyn ProgressSink>>,
) -> Result<IndexSummary> {
    let files = discover_audio_files(dir, &config.allowed_extensions)?;
    let total = files.len();

    let (job_tx, job_rx) = mpsc::channel::<PathBuf>();
    let job_rx = Arc::new(Mutex::new(job_rx));
    let (result_tx, result_rx) = mpsc::channel::<FileOutcome>();

    for path in files {
        job_tx.send(path).expect("job receiver dropped before send");
    }
    drop(job_tx);

    let n_workers = config.index_workers.max(1).min(total.max(1));
    let mut handles = Vec::with_capacity(n_workers);

    for _ in 0..n_workers {
        let job_rx = Arc::clone(&job_rx);
        let result_tx = result_tx.clone();
        let index = Arc::clone(&index);
        let sample_rate = config.sample_rate;
        let n_fft = config.n_fft;
        let hop_length = config.hop_length;
        let peak_neighborhood_size = config.peak_neighborhood_size;
        let min_amplitude = config.min_amplitude;
        let fan_value = config.fan_value;

        let handle = thread::spawn(move || loop {
            let path = {
                let rx = job_rx.lock().expect("job receiver lock poisoned");
                rx.recv()
            };
            let path = match path {
                Ok(path) => path,
                Err(_) => break,
            };

            let outcome = index_one_file(
                &path,
                sample_rate,
                n_fft,
                hop_length,
                peak_neighborhood_size,
                min_amplitude,
                fan_value,
                index.as_ref(),
            );
            let _ = result_tx.send(outcome);
        });
        handles.push(handle);
    }
    drop(result_tx);

    let start = Instant::now();
    let mut outcomes = Vec::with_capacity(total);
    let mut succeeded = 0;
    let mut failed = 0;

    for (i, outcome) in result_rx.iter().enumerate() {
        if outcome.error.is_some() {
            failed += 1;
        } else {
            succeeded += 1;
        }
        if let Some(sink) = &progress {
            let elapsed = start.elapsed();
            let current = i + 1;
            let items_per_sec = current as f64 / elapsed.as_secs_f64().max(1e-9);
            let estimated_remaining = if items_per_sec > 0.0 {
                Some(Duration::from_secs_f64((total - current) as f64 / items_per_sec))
            } else {
                None
            };
            sink.on_progress(Progress {
                current,
                total,
                elapsed,
                estimated_remaining,
                items_per_sec,
            });
        }
        outcomes.push(outcome);
    }

    for handle in handles {
        let _ = handle.join();
    }

    tracing::info!(total, succeeded, failed, "index_directory done");
    Ok(IndexSummary { total, succeeded, failed, outcomes })
}

#[allow(clippy::too_many_arguments)]
fn index_one_file(
    path: &Path,
    sample_rate: u32,
    n_fft: usize,
    hop_length: usize,
    peak_neighborhood_size: usize,
    min_amplitude: f32,
    fan_value: usize,
    index: &dyn FingerprintIndex,
) -> FileOutcome {
    let result = (|| -> Result<TrackId> {
        let samples = audio::load_audio_file(path, sample_rate)?;
        let duration_sec = samples.len() as f64 / sample_rate as f64;
        let spectrogram = create_spectrogram(&samples, n_fft, hop_length);
        let peaks = find_peaks(&spectrogram, peak_neighborhood_size, min_amplitude);
        let hashes = create_hashes(&peaks, fan_value);

        let track_id = TrackId::generate();
        let (artist, title) = derive_artist_title(path);
        let mut metadata = TrackMetadata::new(track_id.clone(), path.to_string_lossy().to_string());
        metadata.duration_sec = duration_sec;
        metadata.num_peaks = peaks.len();
        metadata.num_hashes = hashes.len();
        metadata.title = title;
        if let Some(artist) = artist {
            metadata.artist = artist;
        }

        index.store(&track_id, metadata, &hashes)?;
        Ok(track_id)
    })();

    match result {
        Ok(track_id) => FileOutcome { path: path.to_path_buf(), track_id: Some(track_id), error: None },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to index file");
            FileOutcome { path: path.to_path_buf(), track_id: None, error: Some(e.to_string()) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_audio_files_filters_by_extension_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.wav"), b"").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"").unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("c.mp3"), b"").unwrap();

        let allowed = vec!["wav".to_string(), "mp3".to_string()];
        let files = discover_audio_files(dir.path(), &allowed).unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn derive_artist_title_splits_on_dash() {
        let (artist, title) = derive_artist_title(Path::new("Daft Punk - One More Time.mp3"));
        assert_eq!(artist.as_deref(), Some("Daft Punk"));
        assert_eq!(title, "One More Time");
    }

    #[test]
    fn derive_artist_title_falls_back_to_stem() {
        let (artist, title) = derive_artist_title(Path::new("track01.mp3"));
        assert_eq!(artist, None);
        assert_eq!(title, "track01");
    }

    #[test]
    fn index_directory_handles_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let index: Arc<dyn FingerprintIndex> = Arc::new(crate::index::MemoryIndex::new());
        let summary = index_directory(dir.path(), &config, index, None).unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn index_directory_reports_decode_failures_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("not-really-audio.wav"), b"not a real wav file").unwrap();
        let config = Config::default();
        let index: Arc<dyn FingerprintIndex> = Arc::new(crate::index::MemoryIndex::new());
        let summary = index_directory(dir.path(), &config, index, None).unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.outcomes[0].error.is_some());
    }
}
