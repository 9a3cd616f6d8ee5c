//! SQLite-backed durable index.
//!
//! Two tables, `songs` and `fingerprints`, with a secondary index on
//! `hash`, plus a third, single-row `params` table that persists the DSP
//! parameters a track was indexed under — opening an existing database
//! with a different `Config` is rejected with
//! `FingerprintError::ParameterMismatch` rather than silently producing
//! low-confidence matches later.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::{FingerprintIndex, IndexStats};
use crate::config::DspParams;
use crate::error::{FingerprintError, Result};
use crate::hashing::Fingerprint;
use crate::metadata::{TrackId, TrackMetadata};

pub struct SqliteIndex {
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Opens (creating if absent) a SQLite database at `path`, bound to
    /// `dsp`. Fails with [`FingerprintError::ParameterMismatch`] if the
    /// file was previously populated under different DSP parameters.
    pub fn open(path: &Path, dsp: DspParams) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        Self::init_schema(&conn)?;
        Self::check_or_store_params(&conn, dsp)?;
        Ok(SqliteIndex { conn: Mutex::new(conn) })
    }

    /// An index backed by a private, file-less in-memory SQLite
    /// connection — used by tests that want the tabular code path
    /// without touching disk.
    pub fn open_in_memory(dsp: DspParams) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Self::check_or_store_params(&conn, dsp)?;
        Ok(SqliteIndex { conn: Mutex::new(conn) })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "BEGIN;
             CREATE TABLE IF NOT EXISTS songs (
                 track_id TEXT PRIMARY KEY,
                 title TEXT,
                 artist TEXT,
                 filepath TEXT,
                 duration REAL,
                 metadata TEXT
             );
             CREATE TABLE IF NOT EXISTS fingerprints (
                 hash INTEGER NOT NULL,
                 track_id TEXT NOT NULL,
                 t_anchor INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_fingerprints_hash ON fingerprints (hash);
             CREATE INDEX IF NOT EXISTS idx_fingerprints_track_id ON fingerprints (track_id);
             CREATE TABLE IF NOT EXISTS params (
                 id INTEGER PRIMARY KEY CHECK (id = 0),
                 sample_rate INTEGER NOT NULL,
                 n_fft INTEGER NOT NULL,
                 hop_length INTEGER NOT NULL,
                 peak_neighborhood_size INTEGER NOT NULL,
                 min_amplitude_bits INTEGER NOT NULL,
                 fan_value INTEGER NOT NULL
             );
             COMMIT;",
        )?;
        Ok(())
    }

    fn check_or_store_params(conn: &Connection, dsp: DspParams) -> Result<()> {
        let existing: Option<(u32, i64, i64, i64, u32, i64)> = conn
            .query_row(
                "SELECT sample_rate, n_fft, hop_length, peak_neighborhood_size, min_amplitude_bits, fan_value FROM params WHERE id = 0",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        match existing {
            None => {
                conn.execute(
                    "INSERT INTO params (id, sample_rate, n_fft, hop_length, peak_neighborhood_size, min_amplitude_bits, fan_value)
                     VALUES (0, ?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        dsp.sample_rate,
                        dsp.n_fft as i64,
                        dsp.hop_length as i64,
                        dsp.peak_neighborhood_size as i64,
                        dsp.min_amplitude_bits,
                        dsp.fan_value as i64,
                    ],
                )?;
                Ok(())
            }
            Some((sr, n_fft, hop, nbhd, amp_bits, fan)) => {
                let stored = DspParams {
                    sample_rate: sr,
                    n_fft: n_fft as usize,
                    hop_length: hop as usize,
                    peak_neighborhood_size: nbhd as usize,
                    min_amplitude_bits: amp_bits,
                    fan_value: fan as usize,
                };
                if stored != dsp {
                    return Err(FingerprintError::ParameterMismatch(format!(
                        "index was built with {stored:?}, but this config is {dsp:?}"
                    )));
                }
                Ok(())
            }
        }
    }
}

impl FingerprintIndex for SqliteIndex {
    fn store(&self, track_id: &TrackId, metadata: TrackMetadata, hashes: &[Fingerprint]) -> Result<()> {
        let mut conn = self.conn.lock().expect("sqlite index lock poisoned");
        let tx = conn.transaction()?;

        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| FingerprintError::Internal(format!("serializing metadata: {e}")))?;

        tx.execute(
            "INSERT INTO songs (track_id, title, artist, filepath, duration, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(track_id) DO UPDATE SET
                 title = excluded.title,
                 artist = excluded.artist,
                 filepath = excluded.filepath,
                 duration = excluded.duration,
                 metadata = excluded.metadata",
            params![
                track_id.as_str(),
                metadata.title,
                metadata.artist,
                metadata.filepath,
                metadata.duration_sec,
                metadata_json,
            ],
        )?;

        tx.execute("DELETE FROM fingerprints WHERE track_id = ?1", params![track_id.as_str()])?;

        {
            let mut stmt = tx.prepare("INSERT INTO fingerprints (hash, track_id, t_anchor) VALUES (?1, ?2, ?3)")?;
            for fp in hashes {
                stmt.execute(params![fp.hash, track_id.as_str(), fp.t_anchor])?;
            }
        }

        tx.commit()?;
        tracing::debug!(%track_id, n_hashes = hashes.len(), "stored track in sqlite index");
        Ok(())
    }

    fn query(&self, hash: u32) -> Result<Vec<(TrackId, u32)>> {
        let conn = self.conn.lock().expect("sqlite index lock poisoned");
        let mut stmt = conn.prepare("SELECT track_id, t_anchor FROM fingerprints WHERE hash = ?1")?;
        let rows = stmt.query_map(params![hash], |row| {
            let track_id: String = row.get(0)?;
            let t_anchor: i64 = row.get(1)?;
            Ok((TrackId::from(track_id), t_anchor as u32))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn metadata(&self, track_id: &TrackId) -> Result<Option<TrackMetadata>> {
        let conn = self.conn.lock().expect("sqlite index lock poisoned");
        let metadata_json: Option<String> = conn
            .query_row(
                "SELECT metadata FROM songs WHERE track_id = ?1",
                params![track_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match metadata_json {
            Some(json) => {
                let meta = serde_json::from_str(&json)
                    .map_err(|e| FingerprintError::Internal(format!("deserializing metadata: {e}")))?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, track_id: &TrackId) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite index lock poisoned");
        conn.execute("DELETE FROM fingerprints WHERE track_id = ?1", params![track_id.as_str()])?;
        conn.execute("DELETE FROM songs WHERE track_id = ?1", params![track_id.as_str()])?;
        Ok(())
    }

    fn stats(&self) -> Result<IndexStats> {
        let conn = self.conn.lock().expect("sqlite index lock poisoned");
        let n_tracks: i64 = conn.query_row("SELECT COUNT(*) FROM songs", [], |r| r.get(0))?;
        let n_hash_entries: i64 = conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |r| r.get(0))?;
        let n_unique_hashes: i64 = conn.query_row("SELECT COUNT(DISTINCT hash) FROM fingerprints", [], |r| r.get(0))?;
        Ok(IndexStats {
            n_tracks: n_tracks as usize,
            n_hash_entries: n_hash_entries as usize,
            n_unique_hashes: n_unique_hashes as usize,
            backend_tag: "tabular",
        })
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite index lock poisoned");
        conn.execute("DELETE FROM fingerprints", [])?;
        conn.execute("DELETE FROM songs", [])?;
        Ok(())
    }

    fn all_tracks(&self) -> Result<Vec<TrackMetadata>> {
        let conn = self.conn.lock().expect("sqlite index lock poisoned");
        let mut stmt = conn.prepare("SELECT metadata FROM songs")?;
        let rows = stmt.query_map([], |row| {
            let json: String = row.get(0)?;
            Ok(json)
        })?;
        let mut out = Vec::new();
        for row in rows {
            let json = row?;
            let meta = serde_json::from_str(&json)
                .map_err(|e| FingerprintError::Internal(format!("deserializing metadata: {e}")))?;
            out.push(meta);
        }
        Ok(out)
    }
}
