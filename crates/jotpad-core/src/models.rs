//! Core data models for jotpad.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title applied when a create request carries none.
pub const DEFAULT_TITLE: &str = "Untitled";

/// A note with its optional single attachment pointer.
///
/// `filename` is the stored name of the attachment file, not the
/// client-supplied original name. The row does not own the file's bytes but
/// is the sole pointer to it: whoever clears or reassigns `filename` must
/// reclaim the previously pointed-to file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An uploaded file, as received from the client.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    /// Client-provided filename; embedded into the generated stored name.
    pub original_filename: String,
    pub data: Vec<u8>,
}

/// Request for creating a note.
///
/// Absent or empty `title`/`content` receive defaults; this mirrors the
/// API's permissive "truthy value wins" semantics.
#[derive(Debug, Clone, Default)]
pub struct CreateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub attachment: Option<AttachmentUpload>,
}

/// Request for updating a note.
///
/// Absent or empty `title`/`content` keep the previous values. An explicit
/// empty string therefore cannot clear a field; this quirk is part of the
/// observed API contract.
#[derive(Debug, Clone, Default)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub attachment: Option<AttachmentUpload>,
}

/// Fully merged field values written by a repository `update`.
///
/// The service resolves the partial-update semantics before calling the
/// repository, so the row write is a plain full-field update.
#[derive(Debug, Clone)]
pub struct UpdateNoteFields {
    pub title: String,
    pub content: String,
    pub filename: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_serialization_round_trip() {
        let note = Note {
            id: Uuid::now_v7(),
            title: "Shopping".to_string(),
            content: "milk, eggs".to_string(),
            filename: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&note).unwrap();
        let parsed: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, note);
    }

    #[test]
    fn test_note_null_filename_serializes_as_null() {
        let note = Note {
            id: Uuid::nil(),
            title: DEFAULT_TITLE.to_string(),
            content: String::new(),
            filename: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let value = serde_json::to_value(&note).unwrap();
        assert!(value["filename"].is_null());
        assert_eq!(value["title"], "Untitled");
    }

    #[test]
    fn test_create_note_request_default() {
        let req = CreateNoteRequest::default();
        assert!(req.title.is_none());
        assert!(req.content.is_none());
        assert!(req.attachment.is_none());
    }
}
