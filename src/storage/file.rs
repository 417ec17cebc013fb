//! File-backed blob storage.

use super::BlobStore;
use crate::error::{Result, StoreError};
use fs2::FileExt;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for blob files.
const BLOB_MAGIC: &[u8; 4] = b"RGB\0";

/// Current blob format version.
const BLOB_VERSION: u8 = 1;

const BLOB_EXTENSION: &str = "blob";

/// Blob storage in a directory, one file per key.
///
/// File layout: magic, version byte, payload length (u64 LE), payload,
/// CRC32 of the payload (u32 LE). Writes go to a temporary file which is
/// synced and then renamed over the previous blob. The directory is locked
/// for as long as the storage is open.
pub struct FileBlobStore {
    /// Base directory for blobs.
    path: PathBuf,

    /// Lock file for exclusive access.
    _lock_file: File,
}

impl FileBlobStore {
    /// Open (creating if needed) the blob directory at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let lock_file = Self::acquire_lock(&path)?;

        Ok(Self {
            path,
            _lock_file: lock_file,
        })
    }

    /// Base directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }

    /// Get the full path for a key, refusing names that could escape the directory.
    fn blob_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(StoreError::InvalidOperation(format!(
                "Invalid storage key: {:?}",
                key
            )));
        }
        Ok(self.path.join(format!("{}.{}", key, BLOB_EXTENSION)))
    }

    fn read_blob(file: &mut File) -> Result<Vec<u8>> {
        // Read and verify magic
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != BLOB_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid blob magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != BLOB_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported blob version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes);
        if len > file.metadata()?.len() {
            return Err(StoreError::InvalidFormat("Blob length exceeds file size".into()));
        }

        let mut content = vec![0u8; len as usize];
        file.read_exact(&mut content)?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        let computed_checksum = crc32fast::hash(&content);

        if stored_checksum != computed_checksum {
            return Err(StoreError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        Ok(content)
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let blob_path = self.blob_path(key)?;
        let mut file = match File::open(&blob_path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match Self::read_blob(&mut file) {
            Ok(content) => Ok(Some(content)),
            Err(StoreError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => Err(
                StoreError::InvalidFormat(format!("Truncated blob: {}", blob_path.display())),
            ),
            Err(e) => Err(e),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let blob_path = self.blob_path(key)?;
        let tmp_path = blob_path.with_extension(format!("{}.tmp", BLOB_EXTENSION));

        {
            let mut file = File::create(&tmp_path)?;

            file.write_all(BLOB_MAGIC)?;
            file.write_all(&[BLOB_VERSION])?;
            file.write_all(&(value.len() as u64).to_le_bytes())?;
            file.write_all(value)?;
            file.write_all(&crc32fast::hash(value).to_le_bytes())?;

            file.sync_all()?;
        }

        fs::rename(&tmp_path, &blob_path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let blob_path = self.blob_path(key)?;
        match fs::remove_file(&blob_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
