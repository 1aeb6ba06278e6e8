//! Version-tagged JSON snapshot of the assignment cache.
//!
//! ```json
//! { "version": 1, "app_version": "0.1.0", "saved_at": "...", "assignments": [...] }
//! ```
//!
//! The version is read on its own before the rest of the document, so a snapshot
//! written by an incompatible build is rejected instead of half parsed.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use fleetr_common::attachment::Attachment;

use crate::ports::SnapshotStore;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

#[derive(Deserialize)]
struct Header {
    version: u32,
}

#[derive(Serialize, Deserialize)]
struct Document {
    version: u32,
    app_version: String,
    saved_at: DateTime<Utc>,
    assignments: Vec<Attachment>,
}

/// Snapshot kept in a single file. Writes go through a sibling temporary file and
/// a rename so a crash never leaves a truncated snapshot behind.
#[derive(Debug, Clone)]
pub struct JsonSnapshotFile {
    path: PathBuf,
}

impl JsonSnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> SnapshotError {
        SnapshotError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Encodes `assignments` as a current-version snapshot document.
pub fn encode(assignments: &[Attachment]) -> Result<Vec<u8>, SnapshotError> {
    let document = Document {
        version: SNAPSHOT_VERSION,
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        saved_at: Utc::now(),
        assignments: assignments.to_vec(),
    };
    Ok(serde_json::to_vec_pretty(&document)?)
}

/// Decodes a snapshot document, rejecting any version but the current one.
pub fn decode(bytes: &[u8]) -> Result<Vec<Attachment>, SnapshotError> {
    let header: Header = serde_json::from_slice(bytes)?;
    if header.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found: header.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    let document: Document = serde_json::from_slice(bytes)?;
    debug!(
        "decoded snapshot written by {} at {}",
        document.app_version, document.saved_at
    );
    Ok(document.assignments)
}

#[async_trait]
impl SnapshotStore for JsonSnapshotFile {
    async fn save(&self, assignments: &[Attachment]) -> Result<(), SnapshotError> {
        let bytes: Vec<u8> = encode(assignments)?;
        let tmp: PathBuf = self.path.with_extension("tmp");

        tokio::fs::write(&tmp, bytes).await.map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Vec<Attachment>>, SnapshotError> {
        let bytes: Vec<u8> = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        decode(&bytes).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetr_common::network::address::parse_ipv4;

    fn assignments() -> Vec<Attachment> {
        vec![
            Attachment::new("12", parse_ipv4("100.64.0.10").unwrap()).with_remote_id("1"),
            Attachment::new("13", parse_ipv4("100.64.0.11/30").unwrap()),
        ]
    }

    #[tokio::test]
    async fn missing_file_is_no_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonSnapshotFile::new(dir.path().join("cache.json"));

        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saved_snapshot_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonSnapshotFile::new(dir.path().join("cache.json"));

        file.save(&assignments()).await.unwrap();
        let loaded = file.load().await.unwrap().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].remote_id.as_deref(), Some("1"));
        assert_eq!(loaded[1].address().prefix(), 30);
        assert!(!dir.path().join("cache.tmp").exists());
    }

    #[test]
    fn other_versions_are_rejected() {
        let bytes = br#"{ "version": 7, "assignments": "whatever" }"#;

        match decode(bytes) {
            Err(SnapshotError::UnsupportedVersion { found, expected }) => {
                assert_eq!(found, 7);
                assert_eq!(expected, SNAPSHOT_VERSION);
            }
            other => panic!("expected version error, got {other:?}"),
        }
    }

    #[test]
    fn garbage_is_a_json_error() {
        assert!(matches!(decode(b"not json"), Err(SnapshotError::Json(_))));
    }
}
