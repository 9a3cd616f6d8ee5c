//! HTTP surface.
//!
//! Built on `axum`. All CPU-bound work (decode, A→B→C, the batch
//! orchestrator) runs inside `spawn_blocking` so the async runtime's
//! worker threads are never tied up running DSP.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Multipart, Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::FingerprintError;
use crate::index::FingerprintIndex;
use crate::indexer::{index_directory, TracingProgressSink};
use crate::matcher::match_query;
use crate::metadata::TrackId;

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<dyn FingerprintIndex>,
    pub config: Arc<Config>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/search", post(search))
        .route("/songs", get(list_songs))
        .route("/songs/{id}", get(get_song))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .route("/index", post(index_route))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

impl IntoResponse for FingerprintError {
    fn into_response(self) -> Response {
        let status = match &self {
            FingerprintError::Validation(_) => StatusCode::BAD_REQUEST,
            FingerprintError::ParameterMismatch(_) => StatusCode::CONFLICT,
            FingerprintError::Decode(_) | FingerprintError::Storage(_) | FingerprintError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(json!({ "error": self.to_string(), "status": status.as_u16() }));
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct SearchMatch {
    track_id: String,
    confidence: f64,
    title: String,
    artist: String,
    duration: f64,
    filepath: String,
}

#[derive(Serialize)]
struct SearchResponse {
    matches: Vec<SearchMatch>,
    query_duration_sec: f64,
    processing_time_ms: f64,
    found: bool,
}

async fn search(State(state): State<AppState>, mut multipart: Multipart) -> Result<Json<SearchResponse>, FingerprintError> {
    let started = std::time::Instant::now();

    let mut field_bytes: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| FingerprintError::Validation(format!("reading multipart body: {e}")))?
    {
        if field.name() == Some("audio") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| FingerprintError::Validation(format!("reading upload: {e}")))?;
            field_bytes = Some((filename, bytes.to_vec()));
            break;
        }
    }

    let (filename, bytes) = field_bytes.ok_or_else(|| FingerprintError::Validation("missing \"audio\" field".into()))?;
    validate_upload(&state.config, &filename, bytes.len() as u64)?;

    let config = Arc::clone(&state.config);
    let index = Arc::clone(&state.index);
    let (matches, query_duration_sec) = tokio::task::spawn_blocking(move || -> Result<_, FingerprintError> {
        let suffix = std::path::Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let mut tmp = tempfile::Builder::new()
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| FingerprintError::Internal(format!("creating temp file: {e}")))?;
        std::io::Write::write_all(&mut tmp, &bytes)
            .map_err(|e| FingerprintError::Internal(format!("writing temp file: {e}")))?;

        let samples = crate::audio::load_audio_file(tmp.path(), config.sample_rate)?;
        let query_duration_sec = samples.len() as f64 / config.sample_rate as f64;
        let query_hashes = crate::fingerprint_samples(&config, &samples);
        let candidates = match_query(index.as_ref(), &query_hashes, 10)?;

        let mut matches = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if let Some(meta) = index.metadata(&candidate.track_id)? {
                matches.push(SearchMatch {
                    track_id: candidate.track_id.to_string(),
                    confidence: round_to(candidate.confidence, 4),
                    title: meta.title,
                    artist: meta.artist,
                    duration: meta.duration_sec,
                    filepath: meta.filepath,
                });
            }
        }
        Ok((matches, query_duration_sec))
    })
    .await
    .map_err(|e| FingerprintError::Internal(format!("search task panicked: {e}")))??;

    let found = !matches.is_empty();
    Ok(Json(SearchResponse {
        matches,
        query_duration_sec: round_to(query_duration_sec, 2),
        processing_time_ms: round_to(started.elapsed().as_secs_f64() * 1000.0, 2),
        found,
    }))
}

fn validate_upload(config: &Config, filename: &str, size: u64) -> Result<(), FingerprintError> {
    if size == 0 {
        return Err(FingerprintError::Validation("empty upload".into()));
    }
    if size > config.max_content_length {
        return Err(FingerprintError::Validation(format!(
            "upload of {size} bytes exceeds limit of {}",
            config.max_content_length
        )));
    }
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| FingerprintError::Validation("upload has no file extension".into()))?;
    if !config.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)) {
        return Err(FingerprintError::Validation(format!("extension \"{ext}\" is not allowed")));
    }
    Ok(())
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[derive(Serialize)]
struct SongsResponse {
    songs: Vec<crate::metadata::TrackMetadata>,
    count: usize,
}

async fn list_songs(State(state): State<AppState>) -> Result<Json<SongsResponse>, FingerprintError> {
    let songs = state.index.all_tracks()?;
    let count = songs.len();
    Ok(Json(SongsResponse { songs, count }))
}

async fn get_song(State(state): State<AppState>, AxumPath(id): AxumPath<String>) -> Response {
    match state.index.metadata(&TrackId::from(id)) {
        Ok(Some(meta)) => Json(meta).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({ "error": "track not found" }))).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn stats(State(state): State<AppState>) -> Result<Json<crate::index::IndexStats>, FingerprintError> {
    Ok(Json(state.index.stats()?))
}

async fn health() -> Json<serde_json::Value> {
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    Json(json!({ "status": "healthy", "timestamp": timestamp }))
}

#[derive(Deserialize)]
struct IndexRequest {
    directory_path: String,
}

#[derive(Serialize)]
struct IndexResponse {
    total: usize,
    succeeded: usize,
    failed: usize,
}

async fn index_route(
    State(state): State<AppState>,
    Json(req): Json<IndexRequest>,
) -> Result<(StatusCode, Json<IndexResponse>), FingerprintError> {
    let path = std::path::PathBuf::from(&req.directory_path);
    if !path.is_dir() {
        return Err(FingerprintError::Validation(format!("{} is not a directory", req.directory_path)));
    }

    let config = Arc::clone(&state.config);
    let index = Arc::clone(&state.index);
    let summary = tokio::task::spawn_blocking(move || {
        index_directory(&path, &config, index, Some(Arc::new(TracingProgressSink)))
    })
    .await
    .map_err(|e| FingerprintError::Internal(format!("index task panicked: {e}")))??;

    Ok((
        StatusCode::ACCEPTED,
        Json(IndexResponse { total: summary.total, succeeded: summary.succeeded, failed: summary.failed }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;

    fn test_state() -> AppState {
        AppState { index: Arc::new(MemoryIndex::new()), config: Arc::new(Config::default()) }
    }

    #[test]
    fn validate_upload_rejects_disallowed_extension() {
        let config = Config::default();
        let err = validate_upload(&config, "clip.exe", 1024).unwrap_err();
        assert!(matches!(err, FingerprintError::Validation(_)));
    }

    #[test]
    fn validate_upload_rejects_oversize() {
        let mut config = Config::default();
        config.max_content_length = 10;
        let err = validate_upload(&config, "clip.wav", 100).unwrap_err();
        assert!(matches!(err, FingerprintError::Validation(_)));
    }

    #[test]
    fn validate_upload_rejects_empty() {
        let config = Config::default();
        let err = validate_upload(&config, "clip.wav", 0).unwrap_err();
        assert!(matches!(err, FingerprintError::Validation(_)));
    }

    #[test]
    fn validate_upload_accepts_allowed_extension() {
        let config = Config::default();
        assert!(validate_upload(&config, "clip.wav", 1024).is_ok());
    }

    #[test]
    fn round_to_rounds_expected_decimals() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(12.3456, 2), 12.35);
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let body = health().await;
        assert_eq!(body.0["status"], "healthy");
    }

    #[tokio::test]
    async fn list_songs_reports_empty_index() {
        let state = test_state();
        let resp = list_songs(State(state)).await.unwrap();
        assert_eq!(resp.0.count, 0);
    }
}
