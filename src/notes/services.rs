use super::models::Note;
use crate::common::{generate_note_id, ApiError};
use sqlx::SqlitePool;

pub struct NotesService {
    db: SqlitePool,
}

impl NotesService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Notes owned by the user, newest first.
    pub async fn list_notes(&self, user_id: &str) -> Result<Vec<Note>, ApiError> {
        let notes = sqlx::query_as::<_, Note>(
            r#"
            SELECT id, user_id, content, created_at
            FROM notes
            WHERE user_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::DatabaseError)?;

        Ok(notes)
    }

    pub async fn create_note(
        &self,
        user_id: &str,
        content: &str,
        created_at: i64,
    ) -> Result<Note, ApiError> {
        let note = Note {
            id: generate_note_id(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            created_at,
        };

        sqlx::query("INSERT INTO notes (id, user_id, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(&note.id)
            .bind(&note.user_id)
            .bind(&note.content)
            .bind(note.created_at)
            .execute(&self.db)
            .await
            .map_err(ApiError::DatabaseError)?;

        Ok(note)
    }

    /// Deletes only when the note belongs to the user. Foreign and missing
    /// notes look the same to the caller.
    pub async fn delete_note(&self, user_id: &str, note_id: &str) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ? AND user_id = ?")
            .bind(note_id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(ApiError::DatabaseError)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Note not found".to_string()));
        }

        Ok(())
    }
}
