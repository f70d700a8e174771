//! Storage module for harvested artifacts
//!
//! This module handles the on-disk artifact store, including:
//! - Writing artifacts and their metadata records
//! - Indexing which repositories are already cached (used to seed deduplication)
//! - Reading artifacts back for downstream analysis

mod disk;

pub use disk::DiskStore;

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed metadata in {path}: {message}")]
    Metadata { path: String, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
