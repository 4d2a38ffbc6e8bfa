//! Packing lists repository for database operations

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::packing_list::{
        AddPackingListEntry, CreatePackingList, PackingList, PackingListEntry, PackingListSummary,
        UpdatePackingList, UpdatePackingListEntry,
    },
};

const ENTRY_SELECT: &str = r#"
    SELECT e.id, e.packing_list_id, e.item_id, i.name AS item_name,
           e.quantity, e.notes, e.is_packed
    FROM packing_list_entries e
    JOIN items i ON i.id = e.item_id
"#;

#[derive(Clone)]
pub struct PackingListsRepository {
    pool: Pool<Postgres>,
}

impl PackingListsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List packing lists, newest first
    pub async fn list(&self) -> AppResult<Vec<PackingListSummary>> {
        let lists = sqlx::query_as::<_, PackingListSummary>(
            r#"
            SELECT p.*,
                   (SELECT COUNT(*) FROM packing_list_entries e WHERE e.packing_list_id = p.id) AS entry_count
            FROM packing_lists p
            ORDER BY p.created_at DESC, p.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(lists)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<PackingList> {
        sqlx::query_as::<_, PackingList>("SELECT * FROM packing_lists WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Packing list with id {} not found", id)))
    }

    pub async fn entries(&self, list_id: i32) -> AppResult<Vec<PackingListEntry>> {
        let query = format!("{} WHERE e.packing_list_id = $1 ORDER BY i.name, e.id", ENTRY_SELECT);
        let entries = sqlx::query_as::<_, PackingListEntry>(&query)
            .bind(list_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    pub async fn create(&self, list: &CreatePackingList) -> AppResult<PackingList> {
        let created = sqlx::query_as::<_, PackingList>(
            r#"
            INSERT INTO packing_lists (name, description, outing_date)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(list.name.trim())
        .bind(&list.description)
        .bind(list.outing_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    pub async fn update(&self, id: i32, list: &UpdatePackingList) -> AppResult<PackingList> {
        sqlx::query_as::<_, PackingList>(
            r#"
            UPDATE packing_lists SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                outing_date = COALESCE($4, outing_date),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(list.name.as_deref().map(str::trim))
        .bind(&list.description)
        .bind(list.outing_date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Packing list with id {} not found", id)))
    }

    /// Delete a list; its entries go with it
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM packing_lists WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Packing list with id {} not found", id)));
        }
        Ok(())
    }

    pub async fn add_entry(&self, list_id: i32, entry: &AddPackingListEntry) -> AppResult<PackingListEntry> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO packing_list_entries (packing_list_id, item_id, quantity, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(list_id)
        .bind(entry.item_id)
        .bind(entry.quantity.unwrap_or(1))
        .bind(&entry.notes)
        .fetch_one(&self.pool)
        .await?;
        sqlx::query("UPDATE packing_lists SET updated_at = NOW() WHERE id = $1")
            .bind(list_id)
            .execute(&self.pool)
            .await?;
        self.get_entry(list_id, id).await
    }

    pub async fn get_entry(&self, list_id: i32, entry_id: i32) -> AppResult<PackingListEntry> {
        let query = format!("{} WHERE e.packing_list_id = $1 AND e.id = $2", ENTRY_SELECT);
        sqlx::query_as::<_, PackingListEntry>(&query)
            .bind(list_id)
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Entry {} not found in packing list {}",
                    entry_id, list_id
                ))
            })
    }

    pub async fn update_entry(
        &self,
        list_id: i32,
        entry_id: i32,
        entry: &UpdatePackingListEntry,
    ) -> AppResult<PackingListEntry> {
        let result = sqlx::query(
            r#"
            UPDATE packing_list_entries SET
                quantity = COALESCE($3, quantity),
                notes = COALESCE($4, notes),
                is_packed = COALESCE($5, is_packed)
            WHERE packing_list_id = $1 AND id = $2
            "#,
        )
        .bind(list_id)
        .bind(entry_id)
        .bind(entry.quantity)
        .bind(&entry.notes)
        .bind(entry.is_packed)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Entry {} not found in packing list {}",
                entry_id, list_id
            )));
        }
        self.get_entry(list_id, entry_id).await
    }

    pub async fn remove_entry(&self, list_id: i32, entry_id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM packing_list_entries WHERE packing_list_id = $1 AND id = $2")
            .bind(list_id)
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Entry {} not found in packing list {}",
                entry_id, list_id
            )));
        }
        Ok(())
    }
}
