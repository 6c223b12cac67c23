//! Waiting entries as JSON files on local disk.
//!
//! One file per draft key under `<root>/<namespace>/`. Files are written to
//! `.tmp` first and then renamed over the target so a crash never leaves a
//! truncated entry behind.

use crate::model::ResourceKey;
use crate::resolution::store::{CleanupStatistics, StoreError, UnresolvedReferenceStore, WaitingEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileReferenceStore {
    dir: PathBuf,
}

impl FileReferenceStore {
    /// Opens (and creates if needed) the namespace directory under `root`.
    pub async fn open(root: impl AsRef<Path>, namespace: &str) -> Result<Self, StoreError> {
        let dir = root.as_ref().join(namespace);
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys may hold any character, so file names are hex-encoded.
    fn path_for(&self, draft_key: &ResourceKey) -> PathBuf {
        let raw = draft_key.to_string();
        let mut name = String::with_capacity(raw.len() * 2 + EXTENSION.len() + 1);
        for byte in raw.bytes() {
            let _ = write!(name, "{byte:02x}");
        }
        name.push('.');
        name.push_str(EXTENSION);
        self.dir.join(name)
    }

    async fn read(path: &Path) -> Result<Option<WaitingEntry>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl UnresolvedReferenceStore for FileReferenceStore {
    #[instrument(skip(self, entry), fields(missing = entry.missing_keys.len()))]
    async fn save(&self, entry: WaitingEntry) -> Result<(), StoreError> {
        let draft_key = entry.validate()?;
        let path = self.path_for(&draft_key);
        // Concurrent saves of one key each get their own temp file.
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        let bytes = serde_json::to_vec_pretty(&entry)?;
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;

        debug!(key = %draft_key, path = %path.display(), "Waiting entry saved");
        Ok(())
    }

    async fn fetch(&self, draft_key: &ResourceKey) -> Result<Option<WaitingEntry>, StoreError> {
        Self::read(&self.path_for(draft_key)).await
    }

    #[instrument(skip(self))]
    async fn fetch_all_waiting_on(&self, key: &ResourceKey) -> Result<Vec<WaitingEntry>, StoreError> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(file) = dir.next_entry().await? {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match Self::read(&path).await {
                Ok(Some(entry)) if entry.missing_keys.contains(key) => entries.push(entry),
                Ok(_) => {}
                Err(StoreError::Json(e)) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable waiting entry");
                }
                Err(e) => return Err(e),
            }
        }
        // Directory order is platform-dependent.
        entries.sort_by(|a, b| a.draft.key.cmp(&b.draft.key));
        debug!(found = entries.len(), "Fetched waiting entries");
        Ok(entries)
    }

    async fn delete(&self, draft_key: &ResourceKey) -> Result<Option<WaitingEntry>, StoreError> {
        let path = self.path_for(draft_key);
        let Some(entry) = Self::read(&path).await? else {
            return Ok(None);
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(Some(entry)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<CleanupStatistics, StoreError> {
        let mut stats = CleanupStatistics::default();
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(file) = dir.next_entry().await? {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let entry = match Self::read(&path).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Unreadable waiting entry");
                    stats.failed += 1;
                    continue;
                }
            };
            if entry.last_modified >= older_than {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => stats.deleted += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not delete waiting entry");
                    stats.failed += 1;
                }
            }
        }
        info!(deleted = stats.deleted, failed = stats.failed, "Waiting entries cleaned up");
        Ok(stats)
    }
}
