//! Content-addressed store for raw fetched bytes
//!
//! Every blob lives at `<root>/<sha256-hex>`. Blobs are immutable: a write
//! lands in a temporary file first and is then linked into place, so a reader
//! never sees a partially written blob and an existing blob is never replaced.

use crate::storage::{StorageError, StorageResult};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const TEMP_PREFIX: &str = ".tmp-";

/// Computes the content hash of `bytes` (lowercase hex SHA-256)
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn is_content_hash(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// A directory of blobs named by the hash of their bytes
#[derive(Debug)]
pub struct ContentStore {
    root: PathBuf,
    temp_counter: AtomicU64,
}

impl ContentStore {
    /// Opens the store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            temp_counter: AtomicU64::new(0),
        })
    }

    fn blob_path(&self, hash: &str) -> StorageResult<PathBuf> {
        if !is_content_hash(hash) {
            return Err(StorageError::InvalidHash(hash.to_string()));
        }
        Ok(self.root.join(hash))
    }

    /// Stores `bytes` and returns their content hash
    ///
    /// Storing bytes that are already present performs no write.
    pub fn put(&self, bytes: &[u8]) -> StorageResult<String> {
        let hash = hash_bytes(bytes);
        let path = self.blob_path(&hash)?;

        if path.exists() {
            tracing::trace!("Content {} already stored", hash);
            return Ok(hash);
        }

        let temp_path = self.root.join(format!(
            "{}{}-{}-{}",
            TEMP_PREFIX,
            &hash[..16],
            std::process::id(),
            self.temp_counter.fetch_add(1, Ordering::Relaxed)
        ));

        let written = write_new_file(&temp_path, bytes)
            .and_then(|()| place_blob(&temp_path, &path, |from, to| fs::hard_link(from, to)));
        let _ = fs::remove_file(&temp_path);
        written?;

        tracing::trace!("Stored {} bytes as {}", bytes.len(), hash);
        Ok(hash)
    }

    /// Reads the blob stored under `hash`
    ///
    /// # Returns
    ///
    /// * `Ok(Some(bytes))` - The stored bytes, verified against `hash`
    /// * `Ok(None)` - Nothing is stored under `hash`
    /// * `Err(StorageError::Corrupt)` - The stored bytes no longer match `hash`
    pub fn get(&self, hash: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.blob_path(hash)?;

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let actual = hash_bytes(&bytes);
        if actual != hash {
            return Err(StorageError::Corrupt {
                expected: hash.to_string(),
                actual,
            });
        }

        Ok(Some(bytes))
    }

    /// Number of stored blobs
    pub fn len(&self) -> StorageResult<usize> {
        let mut count = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_name().to_str().is_some_and(is_content_hash) {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Moves a finished temp file to its blob path without replacing a blob
///
/// Hard links give create-only semantics. Filesystems without them get a
/// rename when the blob is still absent; a racing writer can only have stored
/// the same bytes.
fn place_blob(
    temp_path: &Path,
    path: &Path,
    link: impl FnOnce(&Path, &Path) -> std::io::Result<()>,
) -> std::io::Result<()> {
    match link(temp_path, path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) if matches!(e.kind(), ErrorKind::Unsupported | ErrorKind::PermissionDenied) => {
            tracing::debug!("Hard link unavailable ({}), renaming into place", e);
            if path.exists() {
                Ok(())
            } else {
                fs::rename(temp_path, path)
            }
        }
        Err(e) => Err(e),
    }
}

fn write_new_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
