//! API credential repository implementation.
//!
//! Tokens are stored in their unique plaintext form (the masked display rule
//! needs the token edges back) and generated with a `ntr_` prefix over 32
//! random hex-encoded bytes. Revocation deactivates, never deletes.

use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use noterra_core::{
    defaults, new_v7, ApiCredential, ApiCredentialRepository, CreateCredentialRequest, Error,
    Result,
};

/// PostgreSQL implementation of ApiCredentialRepository.
#[derive(Clone)]
pub struct PgApiCredentialRepository {
    pool: Pool<Postgres>,
}

impl PgApiCredentialRepository {
    /// Create a new PgApiCredentialRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Generate a fresh credential token: `ntr_<64 hex chars>`.
    pub(crate) fn generate_token() -> String {
        let mut bytes = vec![0u8; defaults::API_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        format!("{}{}", defaults::API_TOKEN_PREFIX, hex::encode(bytes))
    }
}

fn credential_from_row(row: &PgRow) -> ApiCredential {
    ApiCredential {
        id: row.get("id"),
        owner_id: row.get("user_id"),
        name: row.get("name"),
        token: row.get("token"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        last_used_at: row.get("last_used_at"),
        expires_at: row.get("expires_at"),
    }
}

const CREDENTIAL_COLUMNS: &str =
    "id, user_id, name, token, is_active, created_at, last_used_at, expires_at";

#[async_trait]
impl ApiCredentialRepository for PgApiCredentialRepository {
    async fn create(&self, owner_id: Uuid, req: CreateCredentialRequest) -> Result<ApiCredential> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("credential name is required".to_string()));
        }

        let id = new_v7();
        let token = Self::generate_token();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO api_key (id, user_id, name, token, is_active, created_at, expires_at)
            VALUES ($1, $2, $3, $4, true, $5, $6)"#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(name)
        .bind(&token)
        .bind(now)
        .bind(req.expires_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(ApiCredential {
            id,
            owner_id,
            name: name.to_string(),
            token,
            is_active: true,
            created_at: now,
            last_used_at: None,
            expires_at: req.expires_at,
        })
    }

    async fn find_active(&self, token: &str) -> Result<Option<ApiCredential>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM api_key WHERE token = $1 AND is_active = true",
            CREDENTIAL_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| credential_from_row(&r)))
    }

    async fn touch_last_used(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE api_key SET last_used_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<ApiCredential>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM api_key WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            CREDENTIAL_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(credential_from_row).collect())
    }

    async fn revoke(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("UPDATE api_key SET is_active = false WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(owner_id)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
