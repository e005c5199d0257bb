//! Note repository implementation.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use jotpad_core::{Error, Note, NoteRepository, Result, UpdateNoteFields};

/// PostgreSQL implementation of NoteRepository.
pub struct PgNoteRepository {
    pool: PgPool,
}

impl PgNoteRepository {
    /// Create a new PgNoteRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map a database row to a Note.
fn note_from_row(row: &sqlx::postgres::PgRow) -> Note {
    Note {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        filename: row.get("filename"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn create(&self, note: &Note) -> Result<()> {
        let result = sqlx::query(
            r#"INSERT INTO note (id, title, content, filename, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(note.id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(&note.filename)
        .bind(note.created_at)
        .bind(note.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(Error::DuplicateId(note.id))
            }
            Err(err) => Err(Error::Database(err)),
        }
    }

    async fn list_all(&self) -> Result<Vec<Note>> {
        let rows = sqlx::query(
            r#"SELECT id, title, content, filename, created_at, updated_at
               FROM note
               ORDER BY updated_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(note_from_row).collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Note> {
        let row = sqlx::query(
            r#"SELECT id, title, content, filename, created_at, updated_at
               FROM note
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NoteNotFound(id))?;

        Ok(note_from_row(&row))
    }

    async fn update(&self, id: Uuid, fields: UpdateNoteFields) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE note
               SET title = $2, content = $3, filename = $4, updated_at = $5
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(&fields.title)
        .bind(&fields.content)
        .bind(&fields.filename)
        .bind(fields.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM note WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }
        Ok(())
    }
}
