// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-session upload storage.
//
// Layout under the data directory:
//
//   uploads/<session-short>/<sanitized-name>
//   converted/<job-id>/<converted>.pdf
//
// Converted artifacts live in their own per-job directory so the original
// and the intermediate can be cleaned up independently.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use printgate_core::error::{PrintgateError, Result};
use printgate_core::types::{JobId, SessionId};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::sanitize::{numbered_variant, sanitize_filename};

/// Upper bound on `name-N.ext` attempts before giving up.
const MAX_DEDUP_ATTEMPTS: u32 = 10_000;

/// A file written to a session's upload directory.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub original_filename: String,
    pub sanitized_filename: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Hex SHA-256 of the stored bytes.
    pub sha256: String,
}

/// Owns the upload and conversion directories.
#[derive(Debug, Clone)]
pub struct UploadStore {
    uploads_root: PathBuf,
    converted_root: PathBuf,
    max_upload_bytes: u64,
}

impl UploadStore {
    pub fn new(
        uploads_root: impl Into<PathBuf>,
        converted_root: impl Into<PathBuf>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            uploads_root: uploads_root.into(),
            converted_root: converted_root.into(),
            max_upload_bytes,
        }
    }

    pub fn session_dir(&self, session: &SessionId) -> PathBuf {
        self.uploads_root.join(session.short())
    }

    /// Work directory for one job's converted output.
    pub fn conversion_dir(&self, job: &JobId) -> PathBuf {
        self.converted_root.join(job.to_string())
    }

    /// Sanitize `original_filename` and write `bytes` under a name no other
    /// file in the session's directory uses.
    ///
    /// Nothing is left on disk when this fails.
    #[instrument(skip(self, bytes), fields(session = %session, size = bytes.len()))]
    pub async fn store(
        &self,
        session: &SessionId,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<StoredUpload> {
        let size = bytes.len() as u64;
        if size > self.max_upload_bytes {
            return Err(PrintgateError::UploadTooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        let dir = self.session_dir(session);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error("create upload directory", &dir, e))?;

        let sanitized = sanitize_filename(original_filename);
        let (name, path, mut file) = create_unique(&dir, &sanitized).await?;

        let written = async {
            file.write_all(bytes).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            drop(file);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(storage_error("write upload", &path, e));
        }

        let sha256 = hex::encode(Sha256::digest(bytes));
        info!(file = %name, bytes = size, "stored upload");

        Ok(StoredUpload {
            original_filename: original_filename.to_string(),
            sanitized_filename: name,
            path,
            size_bytes: size,
            sha256,
        })
    }

    /// Delete a job's stored file. A file that is already gone is fine.
    pub async fn remove_file(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "removed file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove file"),
        }
    }

    /// Delete a job's conversion work directory, if any.
    pub async fn remove_conversion_dir(&self, job: &JobId) {
        let dir = self.conversion_dir(job);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(dir = %dir.display(), "removed conversion directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %dir.display(), error = %e, "failed to remove conversion directory"),
        }
    }

    /// Delete everything a session uploaded.
    #[instrument(skip(self), fields(session = %session))]
    pub async fn purge_session(&self, session: &SessionId) -> Result<()> {
        let dir = self.session_dir(session);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!("purged session uploads");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("purge session directory", &dir, e)),
        }
    }
}

/// Claim `name`, then `name-1`, `name-2`... with exclusive create so two
/// concurrent uploads can never end up sharing a path.
async fn create_unique(dir: &Path, sanitized: &str) -> Result<(String, PathBuf, tokio::fs::File)> {
    for attempt in 0..MAX_DEDUP_ATTEMPTS {
        let name = if attempt == 0 {
            sanitized.to_string()
        } else {
            numbered_variant(sanitized, attempt)
        };
        let path = dir.join(&name);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((name, path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(storage_error("create upload", &path, e)),
        }
    }
    Err(PrintgateError::Storage(format!(
        "no free name for {sanitized} in {}",
        dir.display()
    )))
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> PrintgateError {
    PrintgateError::Storage(format!("{action} {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path, limit: u64) -> UploadStore {
        UploadStore::new(dir.join("uploads"), dir.join("converted"), limit)
    }

    #[tokio::test]
    async fn stores_sanitized_and_hashed() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path(), 1024);
        let session = SessionId::new("alice");

        let upload = store
            .store(&session, "../Quarterly Report.PDF", b"%PDF-1.4")
            .await
            .expect("store");

        assert_eq!(upload.sanitized_filename, "Quarterly-Report.pdf");
        assert_eq!(upload.original_filename, "../Quarterly Report.PDF");
        assert!(upload.path.starts_with(store.session_dir(&session)));
        assert_eq!(std::fs::read(&upload.path).unwrap(), b"%PDF-1.4");
        assert_eq!(upload.sha256.len(), 64);
        assert_eq!(upload.size_bytes, 8);
    }

    #[tokio::test]
    async fn duplicate_names_get_numbered() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path(), 1024);
        let session = SessionId::new("alice");

        let names: Vec<String> = {
            let mut names = Vec::new();
            for _ in 0..3 {
                let upload = store.store(&session, "notes.txt", b"hi").await.unwrap();
                names.push(upload.sanitized_filename);
            }
            names
        };
        assert_eq!(names, ["notes.txt", "notes-1.txt", "notes-2.txt"]);
    }

    #[tokio::test]
    async fn sessions_do_not_share_directories() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path(), 1024);
        let a = store.store(&SessionId::new("a"), "x.txt", b"a").await.unwrap();
        let b = store.store(&SessionId::new("b"), "x.txt", b"b").await.unwrap();
        assert_eq!(a.sanitized_filename, "x.txt");
        assert_eq!(b.sanitized_filename, "x.txt");
        assert_ne!(a.path, b.path);
    }

    #[tokio::test]
    async fn oversized_upload_writes_nothing() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path(), 4);
        let session = SessionId::new("alice");
        let err = store.store(&session, "big.pdf", b"12345").await.unwrap_err();
        assert!(matches!(err, PrintgateError::UploadTooLarge { size: 5, limit: 4 }));
        assert!(!store.session_dir(&session).exists());
    }

    #[tokio::test]
    async fn purge_and_remove_are_idempotent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = store_in(tmp.path(), 1024);
        let session = SessionId::new("alice");
        let upload = store.store(&session, "a.pdf", b"x").await.unwrap();

        store.remove_file(&upload.path).await;
        store.remove_file(&upload.path).await;
        assert!(!upload.path.exists());

        store.purge_session(&session).await.unwrap();
        store.purge_session(&session).await.unwrap();
        assert!(!store.session_dir(&session).exists());

        store.remove_conversion_dir(&JobId::new()).await;
    }
}
