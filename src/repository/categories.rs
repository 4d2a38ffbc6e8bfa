//! Categories repository for database operations

use sqlx::{Pool, Postgres};

use super::unique_violation;
use crate::{
    error::{AppError, AppResult},
    models::category::{Category, CategoryWithCount},
};

#[derive(Clone)]
pub struct CategoriesRepository {
    pool: Pool<Postgres>,
}

impl CategoriesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List categories with their item counts
    pub async fn list_with_counts(&self) -> AppResult<Vec<CategoryWithCount>> {
        let rows = sqlx::query_as::<_, CategoryWithCount>(
            r#"
            SELECT c.*, COUNT(i.id) AS item_count
            FROM categories c
            LEFT JOIN items i ON i.category_id = c.id
            GROUP BY c.id
            ORDER BY c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    /// Case-insensitive lookup by name
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE LOWER(name) = LOWER($1)",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    /// Create a category; a name differing only in case is a conflict
    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        color: &str,
    ) -> AppResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, description, color)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(color)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => AppError::Conflict(format!("Category '{}' already exists", name)),
            None => e.into(),
        })
    }

    /// Return the category with this name (any case), creating it if absent.
    ///
    /// The insert is guarded by the unique index on `LOWER(name)`, so
    /// concurrent callers naming the same category converge on one row.
    pub async fn find_or_create(
        &self,
        name: &str,
        description: &str,
        color: &str,
    ) -> AppResult<(Category, bool)> {
        let inserted = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, description, color)
            VALUES ($1, $2, $3)
            ON CONFLICT ((LOWER(name))) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(color)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(category) = inserted {
            return Ok((category, true));
        }

        let existing = self.find_by_name(name).await?.ok_or_else(|| {
            AppError::Internal(format!("Category '{}' vanished after conflicting insert", name))
        })?;
        Ok((existing, false))
    }
}
