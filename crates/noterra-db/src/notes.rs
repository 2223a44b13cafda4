//! Note repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use noterra_core::{
    new_v7, CreateNoteRequest, Error, Note, NoteRepository, Result, UpdateNoteRequest,
};

/// PostgreSQL implementation of NoteRepository.
#[derive(Clone)]
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    /// Create a new PgNoteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

pub(crate) fn note_from_row(row: &PgRow) -> Note {
    Note {
        id: row.get("id"),
        owner_id: row.get("user_id"),
        title: row.get("title"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const NOTE_COLUMNS: &str = "id, user_id, title, content, created_at, updated_at";

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn insert(&self, owner_id: Uuid, req: CreateNoteRequest) -> Result<Note> {
        let id = new_v7();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO note (id, user_id, title, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)"#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&req.title)
        .bind(&req.content)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Note {
            id,
            owner_id,
            title: req.title,
            content: req.content,
            created_at: now,
            updated_at: now,
        })
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Note>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM note WHERE id = $1 AND user_id = $2",
            NOTE_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| note_from_row(&r)))
    }

    async fn fetch_many(&self, ids: &[Uuid], owner_id: Uuid) -> Result<Vec<Note>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM note WHERE id = ANY($1) AND user_id = $2 ORDER BY created_at ASC, id ASC",
            NOTE_COLUMNS
        ))
        .bind(ids)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(note_from_row).collect())
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<Note>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM note WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            NOTE_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(note_from_row).collect())
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        req: UpdateNoteRequest,
    ) -> Result<Option<Note>> {
        let row = sqlx::query(&format!(
            r#"UPDATE note
            SET title = COALESCE($3, title),
                content = COALESCE($4, content),
                updated_at = $5
            WHERE id = $1 AND user_id = $2
            RETURNING {}"#,
            NOTE_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .bind(req.title)
        .bind(req.content)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| note_from_row(&r)))
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM note WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
