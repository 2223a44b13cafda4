//! Chat and message repository implementation.
//!
//! Turns only ever append messages; edits and deletes exist for the owner's
//! curation of past history. Read order is `created_at` ascending with the
//! UUIDv7 id as tie-break, so same-millisecond messages keep insertion order.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use noterra_core::{
    new_v7, Chat, ChatRepository, CreateChatRequest, Error, Message, MessageRole, Result,
    UpdateChatRequest,
};

/// PostgreSQL implementation of ChatRepository.
#[derive(Clone)]
pub struct PgChatRepository {
    pool: Pool<Postgres>,
}

impl PgChatRepository {
    /// Create a new PgChatRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Reject bindings to contexts the owner does not hold.
    async fn assert_context_owned(&self, context_id: Uuid, owner_id: Uuid) -> Result<()> {
        let owned: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM ai_context WHERE id = $1 AND user_id = $2")
                .bind(context_id)
                .bind(owner_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        if owned.is_none() {
            return Err(Error::Validation(
                "context does not belong to the chat owner".to_string(),
            ));
        }
        Ok(())
    }
}

fn chat_from_row(row: &PgRow) -> Chat {
    Chat {
        id: row.get("id"),
        owner_id: row.get("user_id"),
        title: row.get("title"),
        context_id: row.get("context_id"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn message_from_row(row: &PgRow) -> Result<Message> {
    let role_str: String = row.get("role");
    let role = MessageRole::parse(&role_str)
        .ok_or_else(|| Error::Internal(format!("unknown message role in store: {}", role_str)))?;

    Ok(Message {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        role,
        content: row.get("content"),
        created_at: row.get("created_at"),
    })
}

const CHAT_COLUMNS: &str = "id, user_id, title, context_id, is_active, created_at, updated_at";

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn insert(&self, owner_id: Uuid, req: CreateChatRequest) -> Result<Chat> {
        if let Some(context_id) = req.context_id {
            self.assert_context_owned(context_id, owner_id).await?;
        }

        let id = new_v7();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO chat (id, user_id, title, context_id, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, true, $5, $5)"#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&req.title)
        .bind(req.context_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Chat {
            id,
            owner_id,
            title: req.title,
            context_id: req.context_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Chat>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM chat WHERE id = $1 AND user_id = $2 AND is_active = true",
            CHAT_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| chat_from_row(&r)))
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<Chat>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {} FROM chat
            WHERE user_id = $1 AND is_active = true
            ORDER BY updated_at DESC, id DESC"#,
            CHAT_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(chat_from_row).collect())
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        req: UpdateChatRequest,
    ) -> Result<Option<Chat>> {
        // Rebinding is a three-way choice: absent = keep, null = unbind,
        // id = validate ownership then bind.
        if let Some(Some(context_id)) = req.context_id {
            self.assert_context_owned(context_id, owner_id).await?;
        }

        let row = match req.context_id {
            Some(new_binding) => sqlx::query(&format!(
                r#"UPDATE chat
                SET title = COALESCE($3, title), context_id = $4, updated_at = $5
                WHERE id = $1 AND user_id = $2 AND is_active = true
                RETURNING {}"#,
                CHAT_COLUMNS
            ))
            .bind(id)
            .bind(owner_id)
            .bind(req.title)
            .bind(new_binding)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?,
            None => sqlx::query(&format!(
                r#"UPDATE chat
                SET title = COALESCE($3, title), updated_at = $4
                WHERE id = $1 AND user_id = $2 AND is_active = true
                RETURNING {}"#,
                CHAT_COLUMNS
            ))
            .bind(id)
            .bind(owner_id)
            .bind(req.title)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?,
        };

        Ok(row.map(|r| chat_from_row(&r)))
    }

    async fn touch(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE chat SET updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn messages(&self, chat_id: Uuid) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            r#"SELECT id, chat_id, role, content, created_at
            FROM message
            WHERE chat_id = $1
            ORDER BY created_at ASC, id ASC"#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(message_from_row).collect()
    }

    async fn messages_page(&self, chat_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            r#"SELECT id, chat_id, role, content, created_at
            FROM message
            WHERE chat_id = $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3"#,
        )
        .bind(chat_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(message_from_row).collect()
    }

    async fn count_messages(&self, chat_id: Uuid) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM message WHERE chat_id = $1")
            .bind(chat_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn append_message(
        &self,
        chat_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> Result<Message> {
        let id = new_v7();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO message (id, chat_id, role, content, created_at)
            VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(id)
        .bind(chat_id)
        .bind(role.as_str())
        .bind(content)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Message {
            id,
            chat_id,
            role,
            content: content.to_string(),
            created_at: now,
        })
    }

    async fn update_message(
        &self,
        chat_id: Uuid,
        message_id: Uuid,
        content: &str,
    ) -> Result<Option<Message>> {
        let row = sqlx::query(
            r#"UPDATE message
            SET content = $3
            WHERE id = $1 AND chat_id = $2
            RETURNING id, chat_id, role, content, created_at"#,
        )
        .bind(message_id)
        .bind(chat_id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(message_from_row).transpose()
    }

    async fn delete_message(&self, chat_id: Uuid, message_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM message WHERE id = $1 AND chat_id = $2")
            .bind(message_id)
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
