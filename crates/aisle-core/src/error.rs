//! Crate-level errors
//!
//! Every failure the library reports is an [`Error`], and every `Error`
//! classifies into one [`ErrorKind`] so callers can pick a message without
//! matching on the underlying source.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::archive::ArchiveError;
use crate::document::DocumentError;
use crate::storage::StorageError;

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No permission to read or write the chosen file
    AccessDenied,
    /// The file exists but its bytes could not be obtained
    Unreadable,
    /// Bytes were obtained but are not a valid archive
    NotDecodable,
    /// A lookup by id found nothing where something was required
    NotFound,
    /// The store could not complete a commit or query
    PersistenceFailure,
    /// The operation would break an invariant and was refused
    Rejected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::AccessDenied => "access denied",
            ErrorKind::Unreadable => "unreadable",
            ErrorKind::NotDecodable => "not decodable",
            ErrorKind::NotFound => "not found",
            ErrorKind::PersistenceFailure => "persistence failure",
            ErrorKind::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Why an operation was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("a name is required")]
    EmptyName,

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("the Unknown Location cannot be deleted")]
    SentinelDeletion,

    #[error("location {0} still owns items")]
    LocationInUse(Uuid),

    #[error("new order must list every location except Unknown Location exactly once")]
    InvalidReorder,
}

/// Errors reported by the aisle library
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("item {0} not found")]
    ItemNotFound(Uuid),

    #[error("location {0} not found")]
    LocationNotFound(Uuid),

    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Storage(StorageError::PermissionDenied { .. }) => ErrorKind::AccessDenied,
            Error::Storage(StorageError::InvalidSharedDocument { .. }) => ErrorKind::NotDecodable,
            Error::Storage(_) => ErrorKind::PersistenceFailure,
            Error::Archive(e) => e.kind(),
            Error::ItemNotFound(_) | Error::LocationNotFound(_) => ErrorKind::NotFound,
            Error::Rejected(_) => ErrorKind::Rejected,
        }
    }
}

impl From<DocumentError> for Error {
    fn from(e: DocumentError) -> Self {
        Error::Storage(StorageError::Document(e))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(StorageError::Database(e))
    }
}

/// Result type for library operations
pub type Result<T> = std::result::Result<T, Error>;
