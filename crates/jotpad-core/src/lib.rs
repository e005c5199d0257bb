//! # jotpad-core
//!
//! Core types, traits, and the note orchestration service for jotpad.
//!
//! The `NoteService` here is the heart of the system: it coordinates the
//! persistent row store (`NoteRepository`) with the filesystem-backed
//! attachment store (`AttachmentStore`) so that an attachment's lifecycle
//! always follows its owning note's lifecycle.

pub mod error;
pub mod memory;
pub mod models;
pub mod service;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use memory::{MemoryAttachmentStore, MemoryNoteRepository};
pub use models::{
    AttachmentUpload, CreateNoteRequest, Note, UpdateNoteFields, UpdateNoteRequest, DEFAULT_TITLE,
};
pub use service::NoteService;
pub use traits::{AttachmentStore, NoteRepository};
