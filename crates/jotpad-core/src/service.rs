//! Note orchestration: keeps the row store and the attachment store in sync.
//!
//! Every mutation that touches both resources is ordered so that the row
//! never points at a missing file. A crash mid-operation can orphan at most
//! one unreferenced file, which is the accepted failure mode (there is no
//! orphan-tracking table; the note row is the sole pointer).

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    CreateNoteRequest, Note, UpdateNoteFields, UpdateNoteRequest, DEFAULT_TITLE,
};
use crate::traits::{AttachmentStore, NoteRepository};

/// Transport-independent implementation of the five note operations.
#[derive(Clone)]
pub struct NoteService {
    repo: Arc<dyn NoteRepository>,
    store: Arc<dyn AttachmentStore>,
}

/// "Truthy value wins": treat `None` and `""` the same, keeping `fallback`.
fn merge_field(supplied: Option<String>, fallback: String) -> String {
    match supplied {
        Some(value) if !value.is_empty() => value,
        _ => fallback,
    }
}

impl NoteService {
    pub fn new(repo: Arc<dyn NoteRepository>, store: Arc<dyn AttachmentStore>) -> Self {
        Self { repo, store }
    }

    /// All notes, most recently touched first.
    pub async fn list(&self) -> Result<Vec<Note>> {
        self.repo.list_all().await
    }

    /// A single note by id.
    pub async fn get(&self, id: Uuid) -> Result<Note> {
        self.repo.get_by_id(id).await
    }

    /// Create a note, persisting the attachment bytes (if any) first.
    ///
    /// If the row insert fails after the file was written, the file is
    /// removed best-effort before the error surfaces, so a failed create
    /// does not leak storage.
    pub async fn create(&self, req: CreateNoteRequest) -> Result<Note> {
        let filename = match &req.attachment {
            Some(upload) => Some(self.store.put(&upload.original_filename, &upload.data).await?),
            None => None,
        };

        let now = Utc::now();
        let note = Note {
            id: Uuid::now_v7(),
            title: merge_field(req.title, DEFAULT_TITLE.to_string()),
            content: req.content.unwrap_or_default(),
            filename,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.repo.create(&note).await {
            if let Some(stored_name) = &note.filename {
                self.reclaim(stored_name, note.id).await;
            }
            return Err(err);
        }

        Ok(note)
    }

    /// Update a note; supplied non-empty fields replace, the rest keep
    /// their previous values.
    ///
    /// Attachment replacement ordering: write the new file, repoint the row,
    /// then reclaim the old file. The old file is only deleted once the row
    /// no longer references it; if the row update fails, the new file is
    /// removed best-effort instead.
    pub async fn update(&self, id: Uuid, req: UpdateNoteRequest) -> Result<Note> {
        let existing = self.repo.get_by_id(id).await?;

        let new_stored = match &req.attachment {
            Some(upload) => Some(self.store.put(&upload.original_filename, &upload.data).await?),
            None => None,
        };

        let fields = UpdateNoteFields {
            title: merge_field(req.title, existing.title),
            content: merge_field(req.content, existing.content),
            filename: new_stored.clone().or_else(|| existing.filename.clone()),
            updated_at: Utc::now(),
        };

        if let Err(err) = self.repo.update(id, fields.clone()).await {
            if let Some(stored_name) = &new_stored {
                self.reclaim(stored_name, id).await;
            }
            return Err(err);
        }

        // The row now points at the new file; the previous one is
        // unreferenced and must go, otherwise storage leaks.
        if new_stored.is_some() {
            if let Some(old_name) = &existing.filename {
                self.reclaim(old_name, id).await;
            }
        }

        Ok(Note {
            id,
            title: fields.title,
            content: fields.content,
            filename: fields.filename,
            created_at: existing.created_at,
            updated_at: fields.updated_at,
        })
    }

    /// Delete a note and reclaim its attachment file, if any.
    ///
    /// A file that is already gone counts as reclaimed; the row delete still
    /// surfaces `NoteNotFound` when a racing delete got there first.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let existing = self.repo.get_by_id(id).await?;

        if let Some(stored_name) = &existing.filename {
            self.store.delete(stored_name).await?;
        }

        self.repo.delete(id).await
    }

    /// Best-effort file removal on compensation paths. The primary error is
    /// already on its way out (or the state transition already committed),
    /// so a failed cleanup is logged, never surfaced.
    async fn reclaim(&self, stored_name: &str, note_id: Uuid) {
        if let Err(err) = self.store.delete(stored_name).await {
            warn!(
                subsystem = "service",
                op = "reclaim",
                note_id = %note_id,
                stored_name = %stored_name,
                error = %err,
                "Failed to remove unreferenced attachment file"
            );
        }
    }
}
