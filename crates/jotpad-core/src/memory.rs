//! In-memory trait implementations.
//!
//! Used by the service and API tests; also handy as a throwaway backend for
//! experiments. Both types are plain mutex-guarded maps and record enough
//! call accounting for tests to assert "the store was never touched".

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Note, UpdateNoteFields};
use crate::traits::{AttachmentStore, NoteRepository};

/// In-memory `NoteRepository`.
#[derive(Default)]
pub struct MemoryNoteRepository {
    notes: Mutex<HashMap<Uuid, Note>>,
    fail_next_create: AtomicBool,
}

impl MemoryNoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create` call fail with a generic storage error, for
    /// exercising compensation paths.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl NoteRepository for MemoryNoteRepository {
    async fn create(&self, note: &Note) -> Result<()> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolClosed));
        }
        let mut notes = self.notes.lock().unwrap();
        if notes.contains_key(&note.id) {
            return Err(Error::DuplicateId(note.id));
        }
        notes.insert(note.id, note.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Note>> {
        let notes = self.notes.lock().unwrap();
        let mut all: Vec<Note> = notes.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Note> {
        let notes = self.notes.lock().unwrap();
        notes.get(&id).cloned().ok_or(Error::NoteNotFound(id))
    }

    async fn update(&self, id: Uuid, fields: UpdateNoteFields) -> Result<()> {
        let mut notes = self.notes.lock().unwrap();
        let note = notes.get_mut(&id).ok_or(Error::NoteNotFound(id))?;
        note.title = fields.title;
        note.content = fields.content;
        note.filename = fields.filename;
        note.updated_at = fields.updated_at;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut notes = self.notes.lock().unwrap();
        notes.remove(&id).ok_or(Error::NoteNotFound(id))?;
        Ok(())
    }
}

/// In-memory `AttachmentStore`.
#[derive(Default)]
pub struct MemoryAttachmentStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    counter: AtomicUsize,
    put_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, stored_name: &str) -> bool {
        self.files.lock().unwrap().contains_key(stored_name)
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn put(&self, original_filename: &str, data: &[u8]) -> Result<String> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let stored_name = format!("mem-{}-{}", n, original_filename);
        self.files
            .lock()
            .unwrap()
            .insert(stored_name.clone(), data.to_vec());
        Ok(stored_name)
    }

    async fn delete(&self, stored_name: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        // Absent entries are fine: reclaim is idempotent.
        self.files.lock().unwrap().remove(stored_name);
        Ok(())
    }

    async fn exists(&self, stored_name: &str) -> Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(stored_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_note() -> Note {
        let now = Utc::now();
        Note {
            id: Uuid::now_v7(),
            title: "t".into(),
            content: "c".into(),
            filename: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_repository_duplicate_id() {
        let repo = MemoryNoteRepository::new();
        let note = sample_note();
        repo.create(&note).await.unwrap();

        let err = repo.create(&note).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateId(id) if id == note.id));
    }

    #[tokio::test]
    async fn test_store_round_trip_and_idempotent_delete() {
        let store = MemoryAttachmentStore::new();

        let name = store.put("a.txt", b"hello").await.unwrap();
        assert!(store.exists(&name).await.unwrap());

        store.delete(&name).await.unwrap();
        assert!(!store.exists(&name).await.unwrap());

        // Second delete of the same name is still success.
        store.delete(&name).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_names_are_unique_per_put() {
        let store = MemoryAttachmentStore::new();
        let a = store.put("same.txt", b"1").await.unwrap();
        let b = store.put("same.txt", b"2").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.file_count(), 2);
    }
}
