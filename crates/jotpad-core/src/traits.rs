//! Core traits for jotpad abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Note, UpdateNoteFields};

/// Repository for note CRUD operations against the row store of record.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a fully formed note.
    ///
    /// Fails with `Error::DuplicateId` if the id already exists (should not
    /// occur with server-generated ids).
    async fn create(&self, note: &Note) -> Result<()>;

    /// Return all notes ordered by `updated_at` descending, snapshot at
    /// call time.
    async fn list_all(&self) -> Result<Vec<Note>>;

    /// Fetch a note by id, or `Error::NoteNotFound`.
    async fn get_by_id(&self, id: Uuid) -> Result<Note>;

    /// Apply merged field values to an existing row.
    ///
    /// Fails with `Error::NoteNotFound` if the row does not exist.
    async fn update(&self, id: Uuid, fields: UpdateNoteFields) -> Result<()>;

    /// Remove the row, or `Error::NoteNotFound` if absent.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// Store for attachment file bytes, keyed by generated stored names.
///
/// The store knows nothing about notes; the owning note's `filename` column
/// is the sole link between a row and a stored file.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Persist `data` under a freshly generated, collision-resistant stored
    /// name derived from the client's original filename. Returns the stored
    /// name.
    async fn put(&self, original_filename: &str, data: &[u8]) -> Result<String>;

    /// Delete a stored file. Deleting a name that no longer exists is
    /// success, not failure, so reclaim paths stay idempotent.
    async fn delete(&self, stored_name: &str) -> Result<()>;

    /// Check whether a stored name currently holds a file.
    async fn exists(&self, stored_name: &str) -> Result<bool>;
}
