//! # noterra-db
//!
//! PostgreSQL database layer for noterra.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for all core entities, every query scoped by
//!   owner so cross-owner rows are simply invisible
//! - The session store backing browser authentication
//!
//! ## Example
//!
//! ```rust,ignore
//! use noterra_db::Database;
//! use noterra_core::{CreateNoteRequest, NoteRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/noterra").await?;
//!     let user = db.users.create("Ada", "ada@example.com").await?;
//!
//!     let note = db
//!         .notes
//!         .insert(user.id, CreateNoteRequest {
//!             title: "Hello".to_string(),
//!             content: "world".to_string(),
//!         })
//!         .await?;
//!
//!     println!("Created note: {}", note.id);
//!     Ok(())
//! }
//! ```

pub mod categories;
pub mod chats;
pub mod contexts;
pub mod credentials;
pub mod notes;
pub mod pool;
pub mod sessions;
pub mod users;

// Re-export core types
pub use noterra_core::*;

// Re-export repository implementations
pub use categories::PgCategoryRepository;
pub use chats::PgChatRepository;
pub use contexts::PgContextRepository;
pub use credentials::PgApiCredentialRepository;
pub use notes::PgNoteRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use sessions::PgSessionStore;
pub use users::PgUserRepository;

/// Aggregate handle over every repository, sharing one connection pool.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// User repository.
    pub users: PgUserRepository,
    /// Note repository for CRUD operations.
    pub notes: PgNoteRepository,
    /// Category repository.
    pub categories: PgCategoryRepository,
    /// Context repository for grounding bundles.
    pub contexts: PgContextRepository,
    /// Chat and message repository.
    pub chats: PgChatRepository,
    /// API credential repository.
    pub credentials: PgApiCredentialRepository,
    /// Session store (browser authentication).
    pub sessions: PgSessionStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            users: PgUserRepository::new(pool.clone()),
            notes: PgNoteRepository::new(pool.clone()),
            categories: PgCategoryRepository::new(pool.clone()),
            contexts: PgContextRepository::new(pool.clone()),
            chats: PgChatRepository::new(pool.clone()),
            credentials: PgApiCredentialRepository::new(pool.clone()),
            sessions: PgSessionStore::new(pool.clone()),
            pool,
        }
    }

    /// Connect to the database and build the repository set.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Apply pending schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(format!("migration failed: {}", e)))?;
        Ok(())
    }
}
