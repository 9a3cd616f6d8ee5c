//! Unified error taxonomy for the fingerprinting core.
//!
//! DSP stages (spectrogram/peaks/hashing) never raise their own error
//! variants; they either return a (possibly empty) result or let a decode
//! error bubble up from [`crate::audio`]. Everything that can fail at
//! runtime funnels through [`FingerprintError`] so the HTTP surface can map
//! it to a status code in one place.

use thiserror::Error;

/// Errors surfaced by the core and its adapters.
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// Audio could not be decoded (unsupported container, corrupt file).
    #[error("failed to decode audio: {0}")]
    Decode(String),

    /// The caller used fingerprinting parameters that do not match the
    /// index's persisted parameters (see `Config` and the SQLite backend's
    /// `params` table).
    #[error("parameter mismatch: {0}")]
    ParameterMismatch(String),

    /// A storage backend failed (I/O, connection loss).
    #[error("storage error: {0}")]
    Storage(String),

    /// Request-level input failed validation (empty upload, oversize, bad
    /// extension, missing field).
    #[error("validation error: {0}")]
    Validation(String),

    /// A programming invariant was violated (hash bit overflow, negative
    /// Δt reaching storage). These should never occur in practice; they
    /// are kept as a distinct variant so tests can assert they are never
    /// constructed.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for FingerprintError {
    fn from(e: rusqlite::Error) -> Self {
        FingerprintError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FingerprintError>;
