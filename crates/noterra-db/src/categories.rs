//! Category repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use noterra_core::{
    new_v7, Category, CategoryRepository, CreateCategoryRequest, Error, Result,
    UpdateCategoryRequest,
};

/// PostgreSQL implementation of CategoryRepository.
#[derive(Clone)]
pub struct PgCategoryRepository {
    pool: Pool<Postgres>,
}

impl PgCategoryRepository {
    /// Create a new PgCategoryRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn category_from_row(row: &PgRow) -> Category {
    Category {
        id: row.get("id"),
        owner_id: row.get("user_id"),
        title: row.get("title"),
        weight: row.get("weight"),
        created_at: row.get("created_at"),
    }
}

const CATEGORY_COLUMNS: &str = "id, user_id, title, weight, created_at";

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn insert(&self, owner_id: Uuid, req: CreateCategoryRequest) -> Result<Category> {
        let id = new_v7();
        let now = Utc::now();

        sqlx::query(
            r#"INSERT INTO category (id, user_id, title, weight, created_at)
            VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&req.title)
        .bind(req.weight)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Category {
            id,
            owner_id,
            title: req.title,
            weight: req.weight,
            created_at: now,
        })
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM category WHERE id = $1 AND user_id = $2",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| category_from_row(&r)))
    }

    async fn list(&self, owner_id: Uuid) -> Result<Vec<Category>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM category WHERE user_id = $1 ORDER BY weight DESC, title ASC",
            CATEGORY_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(category_from_row).collect())
    }

    async fn update(
        &self,
        id: Uuid,
        owner_id: Uuid,
        req: UpdateCategoryRequest,
    ) -> Result<Option<Category>> {
        let row = sqlx::query(&format!(
            r#"UPDATE category
            SET title = COALESCE($3, title),
                weight = COALESCE($4, weight)
            WHERE id = $1 AND user_id = $2
            RETURNING {}"#,
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .bind(req.title)
        .bind(req.weight)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| category_from_row(&r)))
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM category WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
