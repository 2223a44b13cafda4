//! Context repository implementation.
//!
//! Contexts bundle a user's notes with a custom steering prompt. Membership
//! is validated inside the writing transaction: every referenced note must
//! belong to the context's owner, and a violation rolls the whole operation
//! back with `Error::Validation`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

use noterra_core::{
    new_v7, Context, ContextRepository, CreateContextRequest, Error, Note, Result,
    UpdateContextRequest,
};

use crate::notes::note_from_row;

/// PostgreSQL implementation of ContextRepository.
#[derive(Clone)]
pub struct PgContextRepository {
    pool: Pool<Postgres>,
}

impl PgContextRepository {
    /// Create a new PgContextRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Verify every id in `note_ids` names a note owned by `owner_id`.
    async fn assert_membership(
        tx: &mut Transaction<'_, Postgres>,
        note_ids: &[Uuid],
        owner_id: Uuid,
    ) -> Result<()> {
        if note_ids.is_empty() {
            return Ok(());
        }
        let distinct: HashSet<Uuid> = note_ids.iter().copied().collect();
        let owned: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM note WHERE id = ANY($1) AND user_id = $2")
                .bind(note_ids)
                .bind(owner_id)
                .fetch_one(&mut **tx)
                .await
                .map_err(Error::Database)?;

        if owned as usize != distinct.len() {
            return Err(Error::Validation(
                "some notes do not belong to the context owner".to_string(),
            ));
        }
        Ok(())
    }

    /// Replace the membership set, preserving the request order as the
    /// stored order.
    async fn replace_members(
        tx: &mut Transaction<'_, Postgres>,
        context_id: Uuid,
        note_ids: &[Uuid],
    ) -> Result<()> {
        sqlx::query("DELETE FROM ai_context_note WHERE context_id = $1")
            .bind(context_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        for (position, note_id) in note_ids.iter().enumerate() {
            sqlx::query(
                r#"INSERT INTO ai_context_note (context_id, note_id, position)
                VALUES ($1, $2, $3)
                ON CONFLICT (context_id, note_id) DO NOTHING"#,
            )
            .bind(context_id)
            .bind(note_id)
            .bind(position as i32)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(())
    }

    /// Member notes of a context in stored (position) order.
    async fn member_notes(&self, context_id: Uuid) -> Result<Vec<Note>> {
        let rows = sqlx::query(
            r#"SELECT n.id, n.user_id, n.title, n.content, n.created_at, n.updated_at
            FROM ai_context_note m
            JOIN note n ON n.id = m.note_id
            WHERE m.context_id = $1
            ORDER BY m.position ASC"#,
        )
        .bind(context_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(note_from_row).collect())
    }
}

#[async_trait]
impl ContextRepository for PgContextRepository {
    async fn insert(&self, owner_id: Uuid, req: CreateContextRequest) -> Result<Context> {
        let id = new_v7();
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        Self::assert_membership(&mut tx, &req.note_ids, owner_id).await?;

        sqlx::query(
            r#"INSERT INTO ai_context (id, user_id, title, prompt, created_at)
            VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&req.title)
        .bind(&req.prompt)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        Self::replace_members(&mut tx, id, &req.note_ids).await?;

        tx.commit().await.map_err(Error::Database)?;

        let notes = self.member_notes(id).await?;
        Ok(Context {
            id,
            owner_id,
            title: req.title,
            prompt: req.prompt,
            notes,
            created_at: now,
        })
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Context>> {
        let row = sqlx::query(
            "SELECT id, user_id, title, prompt, created_at FROM ai_context WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let notes = self.member_notes(id).await?;
        Ok(Some(Context {
            id: row.get("id"),
            owner_id: row.get("user_id"),
            title: row.get("title"),
            prompt: row.get("prompt"),
            notes,
            created_at: row.get("created_at"),
        }))
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<Context>> {
        let rows = sqlx::query(
            r#"SELECT id, user_id, title, prompt, created_at
            FROM ai_context
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC"#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut contexts = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.get("id");
            let notes = self.member_notes(id).await?;
            contexts.push(Context {
                id,
                owner_id: row.get("user_id"),
                title: row.get("title"),
                prompt: row.get("prompt"),
                notes,
                created_at: row.get("created_at"),
            });
        }
        Ok(contexts)
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        req: UpdateContextRequest,
    ) -> Result<Option<Context>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM ai_context WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(owner_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?;

        if exists.is_none() {
            return Ok(None);
        }

        sqlx::query(
            r#"UPDATE ai_context
            SET title = COALESCE($3, title),
                prompt = COALESCE($4, prompt)
            WHERE id = $1 AND user_id = $2"#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(req.title)
        .bind(req.prompt)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if let Some(note_ids) = &req.note_ids {
            Self::assert_membership(&mut tx, note_ids, owner_id).await?;
            Self::replace_members(&mut tx, id, note_ids).await?;
        }

        tx.commit().await.map_err(Error::Database)?;

        self.fetch(id, owner_id).await
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM ai_context WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
