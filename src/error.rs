//! Error types for the student store.

use crate::types::{KeyField, RecordId};
use crate::validation::Violation;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation failed: {}", join(.0, "; "))]
    Validation(Vec<Violation>),

    #[error("Duplicate {field}: {value} is already in use")]
    DuplicateKey { field: KeyField, value: String },

    #[error("Record not found: {0}")]
    NotFound(RecordId),

    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("Import rejected, no records were added:\n{}", join(.0, "\n"))]
    ImportRejected(Vec<ImportIssue>),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid storage format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Storage is locked by another process")]
    Locked,
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

/// A problem with one entry of an import batch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImportIssue {
    /// Zero-based position of the entry in the batch.
    pub index: usize,
    pub problem: ImportProblem,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportProblem {
    /// The entry is not a record object.
    Unreadable { reason: String },
    /// The entry breaks field rules.
    Invalid { violations: Vec<Violation> },
    /// The entry reuses a key held by an existing record or an earlier entry.
    Duplicate { field: KeyField, value: String },
}

impl fmt::Display for ImportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record {}: ", self.index + 1)?;
        match &self.problem {
            ImportProblem::Unreadable { reason } => write!(f, "unreadable entry ({})", reason),
            ImportProblem::Invalid { violations } => write!(f, "{}", join(violations, ", ")),
            ImportProblem::Duplicate { field, value } => {
                write!(f, "{} {} already exists", field, value)
            }
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
