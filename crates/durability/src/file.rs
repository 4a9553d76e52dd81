//! Directory-backed storage medium
//!
//! Each key is one file inside the medium's directory. File names are the
//! hex encoding of the key bytes plus a `.json` suffix, so any key string maps
//! to a valid, distinct file name.
//!
//! # Write protocol
//!
//! `set` writes to a uniquely named temp file in the same directory, syncs
//! it, then renames it over the target. A reader sees either the previous
//! value or the new one, never a torn write. Overlapping `set`s on one key
//! each use their own temp file; the last rename wins.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use relaycache_core::{CacheError, Result};
use tokio::io::AsyncWriteExt;

use crate::medium::StorageMedium;

const VALUE_SUFFIX: &str = "json";
const TEMP_SUFFIX: &str = "tmp";

/// Storage medium persisting each key as a file in one directory
#[derive(Debug)]
pub struct FileMedium {
    dir: PathBuf,
    temp_counter: AtomicU64,
}

impl FileMedium {
    /// Open a medium rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            temp_counter: AtomicU64::new(0),
        })
    }

    /// Directory holding the value files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", encode_key(key), VALUE_SUFFIX))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            "{}.{}.{}.{}",
            encode_key(key),
            std::process::id(),
            n,
            TEMP_SUFFIX
        ))
    }
}

fn encode_key(key: &str) -> String {
    key.bytes().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait]
impl StorageMedium for FileMedium {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::storage(key, e.to_string())),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let target = self.path_for(key);
        let temp = self.temp_path_for(key);

        let written = async {
            let mut file = tokio::fs::File::create(&temp).await?;
            file.write_all(value.as_bytes()).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&temp, &target).await
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&temp).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        target: "relaycache::storage",
                        path = %temp.display(),
                        error = %cleanup,
                        "Failed to remove temp file after aborted write"
                    );
                }
            }
            return Err(CacheError::storage(key, e.to_string()));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::storage(key, e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileMedium) {
        let temp_dir = TempDir::new().unwrap();
        let medium = FileMedium::open(temp_dir.path().join("cache")).unwrap();
        (temp_dir, medium)
    }

    #[test]
    fn test_open_creates_directory() {
        let (_dir, medium) = setup();
        assert!(medium.dir().is_dir());
    }

    #[test]
    fn test_key_encoding_is_filename_safe() {
        let (_dir, medium) = setup();
        let path = medium.path_for("../__Relay/Cache__");
        assert_eq!(path.parent(), Some(medium.dir()));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '.'));
        assert_ne!(medium.path_for("a"), medium.path_for("b"));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (_dir, medium) = setup();
        assert!(medium.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let (_dir, medium) = setup();
        medium.set("k", "first".to_string()).await.unwrap();
        medium.set("k", "second".to_string()).await.unwrap();
        assert_eq!(medium.get("k").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_set_leaves_no_temp_files() {
        let (_dir, medium) = setup();
        medium.set("k", "v".to_string()).await.unwrap();
        let names: Vec<String> = std::fs::read_dir(medium.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".json"));
    }

    #[tokio::test]
    async fn test_remove() {
        let (_dir, medium) = setup();
        medium.set("k", "v".to_string()).await.unwrap();
        medium.remove("k").await.unwrap();
        assert!(medium.get("k").await.unwrap().is_none());
        // Removing again is fine
        medium.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let medium = FileMedium::open(temp_dir.path()).unwrap();
            medium.set("k", "persisted".to_string()).await.unwrap();
        }
        let medium = FileMedium::open(temp_dir.path()).unwrap();
        assert_eq!(medium.get("k").await.unwrap().as_deref(), Some("persisted"));
    }

    #[tokio::test]
    async fn test_set_into_missing_directory_fails() {
        let (dir, medium) = setup();
        std::fs::remove_dir_all(dir.path().join("cache")).unwrap();
        let err = medium.set("k", "v".to_string()).await.unwrap_err();
        assert!(matches!(err, CacheError::Storage { .. }));
    }
}
