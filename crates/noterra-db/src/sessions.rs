//! Session store and provider implementation.
//!
//! Sessions back browser traffic: a random token travels in the
//! `noterra_session` cookie and only its SHA-256 hash is stored. Resolution
//! joins the session row to its user and rejects expired sessions.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use noterra_core::{defaults, new_v7, AuthHeaders, Error, Identity, Result, SessionProvider};

/// PostgreSQL session store, also the [`SessionProvider`] implementation.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: Pool<Postgres>,
}

impl PgSessionStore {
    /// Create a new PgSessionStore with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Open a session for the user with the given email, returning the
    /// identity and the raw session token. `None` when no such user exists.
    pub async fn create_for_email(&self, email: &str) -> Result<Option<(Identity, String)>> {
        let row = sqlx::query("SELECT id, name, email FROM app_user WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let identity = Identity {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
        };

        let token = Self::generate_token();
        let now = Utc::now();
        sqlx::query(
            r#"INSERT INTO session (id, user_id, token_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(new_v7())
        .bind(identity.id)
        .bind(Self::hash_token(&token))
        .bind(now)
        .bind(now + Duration::days(defaults::SESSION_TTL_DAYS))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Some((identity, token)))
    }

    /// Invalidate a session by its raw token.
    pub async fn destroy(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM session WHERE token_hash = $1")
            .bind(Self::hash_token(token))
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete all expired sessions, returning the count removed.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM session WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    async fn resolve_token(&self, token: &str) -> Result<Option<Identity>> {
        let row = sqlx::query(
            r#"SELECT u.id, u.name, u.email
            FROM session s
            JOIN app_user u ON u.id = s.user_id
            WHERE s.token_hash = $1 AND s.expires_at > $2"#,
        )
        .bind(Self::hash_token(token))
        .bind(Utc::now())
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
impl SessionProvider for PgSessionStore {
    async fn get_session(&self, headers: &AuthHeaders) -> Result<Option<Identity>> {
        let Some(token) = headers.cookie_value(defaults::SESSION_COOKIE) else {
            return Ok(None);
        };
        if token.is_empty() {
            return Ok(None);
        }
        self.resolve_token(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_is_stable_hex() {
        let h1 = PgSessionStore::hash_token("abc");
        let h2 = PgSessionStore::hash_token("abc");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_token_differs_per_input() {
        assert_ne!(
            PgSessionStore::hash_token("abc"),
            PgSessionStore::hash_token("abd")
        );
    }

    #[test]
    fn test_generate_token_shape() {
        let token = PgSessionStore::generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
