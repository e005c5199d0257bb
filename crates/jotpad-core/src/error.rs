//! Error types for jotpad.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using jotpad's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for jotpad operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Note not found
    #[error("Note not found: {0}")]
    NoteNotFound(Uuid),

    /// A note with this id already exists
    #[error("Duplicate note id: {0}")]
    DuplicateId(Uuid),

    /// Attachment store operation failed
    #[error("Attachment error: {0}")]
    Attachment(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the two "referenced id does not exist" variants.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::NoteNotFound(_))
    }
}
