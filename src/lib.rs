//! # Registrar
//!
//! An in-memory student record store with field validation, unique keys,
//! search/filter/sort/pagination, bulk selection, statistics, JSON
//! import/export and blob persistence.
//!
//! ## Core Concepts
//!
//! - **Records**: Students keyed by a generated id, with unique `studentId` and `email`
//! - **View**: Search term, gender filter and sort, paged over the matching records
//! - **Selection**: Records marked for bulk delete and export
//! - **Storage**: The whole collection persisted as one JSON blob under a key
//!
//! ## Example
//!
//! ```ignore
//! use registrar::{FileBlobStore, StoreConfig, StudentInput, StudentStore};
//!
//! let storage = FileBlobStore::open("./data")?;
//! let mut store = StudentStore::open(StoreConfig::default(), storage)?;
//!
//! let student = store.create(
//!     &StudentInput::new("SV010", "Phạm Minh Đức", "duc@example.com", "Nam")
//!         .with_gpa(3.4),
//! )?;
//!
//! store.set_search_term("đức");
//! assert_eq!(store.page()[0].id, student.id);
//!
//! let json = store.export_all()?;
//! ```

mod document;
pub mod error;
pub mod events;
pub mod query;
pub mod samples;
pub mod storage;
pub mod store;
pub mod types;
pub mod validation;

// Re-exports
pub use document::FORMAT_VERSION;
pub use error::{ImportIssue, ImportProblem, Result, StoreError};
pub use events::{
    DropReason, EventBus, RecordSummary, StoreEvent, SubscriptionHandle, SubscriptionId,
};
pub use query::{Pagination, QueryState, SortKey, SortOrder};
pub use storage::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use store::{
    KeyConflict, PersistPolicy, StoreConfig, StoreConfigBuilder, StudentStore, ValidationOutcome,
    DEFAULT_STORAGE_KEY,
};
pub use types::*;
pub use validation::{Field, Violation};
