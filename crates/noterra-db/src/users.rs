//! User repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use noterra_core::{new_v7, Error, Identity, Result, UserRepository};

/// PostgreSQL user repository. Users are provisioned once and addressed by
/// id or email; identities never carry secrets.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create a user. Email uniqueness is enforced by the store.
    pub async fn create(&self, name: &str, email: &str) -> Result<Identity> {
        let id = new_v7();
        sqlx::query(
            "INSERT INTO app_user (id, name, email, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Identity {
            id,
            name: name.to_string(),
            email: email.to_string(),
        })
    }

    /// Fetch a user by id.
    pub async fn fetch(&self, id: Uuid) -> Result<Option<Identity>> {
        let row = sqlx::query("SELECT id, name, email FROM app_user WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| Identity {
            id: r.get("id"),
            name: r.get("name"),
            email: r.get("email"),
        }))
    }

    /// Fetch a user by email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let row = sqlx::query("SELECT id, name, email FROM app_user WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| Identity {
            id: r.get("id"),
            name: r.get("name"),
            email: r.get("email"),
        }))
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn identity(&self, id: Uuid) -> Result<Option<Identity>> {
        self.fetch(id).await
    }
}
