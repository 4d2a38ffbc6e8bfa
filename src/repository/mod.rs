//! Repository layer for database operations

pub mod categories;
pub mod items;
pub mod loans;
pub mod members;
pub mod packing_lists;

use sqlx::{Pool, Postgres};

use crate::error::AppResult;

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub categories: categories::CategoriesRepository,
    pub items: items::ItemsRepository,
    pub members: members::MembersRepository,
    pub loans: loans::LoansRepository,
    pub packing_lists: packing_lists::PackingListsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            categories: categories::CategoriesRepository::new(pool.clone()),
            items: items::ItemsRepository::new(pool.clone()),
            members: members::MembersRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            packing_lists: packing_lists::PackingListsRepository::new(pool.clone()),
            pool,
        }
    }

    /// Round-trip to the database
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Name of the unique constraint a write violated, if that is why it failed
pub(crate) fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}
