//! Key-value blob storage for persisted store state.
//!
//! A blob store maps a key to one opaque byte blob. `put` replaces the
//! whole blob atomically: readers see either the old or the new value,
//! never a mix.

mod file;
mod memory;

pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;

use crate::error::Result;

/// Storage backend holding whole-value blobs by key.
pub trait BlobStore: Send {
    /// Read the blob stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the blob stored under `key`.
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`. Returns whether it existed.
    fn remove(&self, key: &str) -> Result<bool>;
}
