//! Items repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, FromRow, Pool, Postgres, QueryBuilder, Row};

use super::unique_violation;
use crate::{
    error::{AppError, AppResult},
    models::{
        category::Category,
        enums::Condition,
        item::{Item, ItemQuery, ItemSummary, UpdateItem},
        loan::{Loan, LoanDetails, OPEN_LOAN_SQL},
    },
};

/// Validated values for a new item row
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub serial_number: Option<String>,
    pub category_id: i32,
    pub condition: Condition,
    pub scan_token: String,
    pub notes: Option<String>,
}

/// Escape LIKE wildcards in user-supplied search text
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn conflict_from_constraint(constraint: &str, item: &NewItemRef<'_>) -> AppError {
    match constraint {
        "items_serial_number_key" => AppError::Conflict(format!(
            "Serial number '{}' already exists",
            item.serial_number.unwrap_or_default()
        )),
        "items_scan_token_key" => {
            AppError::Conflict(format!("Scan token '{}' already assigned", item.scan_token))
        }
        other => AppError::Conflict(format!("Unique constraint {} violated", other)),
    }
}

struct NewItemRef<'a> {
    serial_number: Option<&'a str>,
    scan_token: &'a str,
}

#[derive(Clone)]
pub struct ItemsRepository {
    pool: Pool<Postgres>,
}

impl ItemsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    // =========================================================================
    // READ
    // =========================================================================

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Get item by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Item> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    pub async fn find_by_serial_number(&self, serial_number: &str) -> AppResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE serial_number = $1")
            .bind(serial_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Whether another item already carries this serial number
    pub async fn serial_number_exists(
        &self,
        serial_number: &str,
        exclude_id: Option<i32>,
    ) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM items WHERE serial_number = $1 AND ($2::int IS NULL OR id <> $2))",
        )
        .bind(serial_number)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Tokens of deactivated items still count: tokens are never reused
    pub async fn scan_token_exists(&self, scan_token: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM items WHERE scan_token = $1)")
                .bind(scan_token)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    /// Item with its category and open loan, in a single read
    pub async fn get_with_loan_by_id(
        &self,
        id: i32,
    ) -> AppResult<(Item, Category, Option<LoanDetails>)> {
        let row = sqlx::query(&Self::with_loan_query("i.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))?;
        Self::map_with_loan(&row)
    }

    /// Resolve a scanned token to the item with its category and open loan, in a single read
    pub async fn get_with_loan_by_scan_token(
        &self,
        scan_token: &str,
    ) -> AppResult<(Item, Category, Option<LoanDetails>)> {
        let row = sqlx::query(&Self::with_loan_query("i.scan_token = $1"))
            .bind(scan_token)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No item matches scan token '{}'", scan_token))
            })?;
        Self::map_with_loan(&row)
    }

    fn with_loan_query(filter: &str) -> String {
        format!(
            r#"
            SELECT i.*,
                   c.name AS category_name, c.description AS category_description,
                   c.color AS category_color, c.created_at AS category_created_at,
                   c.updated_at AS category_updated_at,
                   l.id AS loan_id, l.member_id AS loan_member_id,
                   l.opened_at AS loan_opened_at, l.expected_return AS loan_expected_return,
                   l.condition_out AS loan_condition_out, l.checkout_notes AS loan_checkout_notes,
                   l.opened_by AS loan_opened_by, l.notification_sent AS loan_notification_sent,
                   m.name AS member_name, m.email AS member_email
            FROM items i
            JOIN categories c ON c.id = i.category_id
            LEFT JOIN loans l ON l.item_id = i.id AND {open}
            LEFT JOIN members m ON m.id = l.member_id
            WHERE {filter}
            "#,
            open = OPEN_LOAN_SQL,
            filter = filter
        )
    }

    fn map_with_loan(row: &PgRow) -> AppResult<(Item, Category, Option<LoanDetails>)> {
        let item = Item::from_row(row)?;

        let category = Category {
            id: item.category_id,
            name: row.try_get("category_name")?,
            description: row.try_get("category_description")?,
            color: row.try_get("category_color")?,
            created_at: row.try_get("category_created_at")?,
            updated_at: row.try_get("category_updated_at")?,
        };

        let loan_id: Option<i32> = row.try_get("loan_id")?;
        let active_loan = match loan_id {
            Some(loan_id) => {
                let opened_at: DateTime<Utc> = row.try_get("loan_opened_at")?;
                Some(LoanDetails {
                    loan: Loan {
                        id: loan_id,
                        item_id: item.id,
                        member_id: row.try_get("loan_member_id")?,
                        opened_at,
                        expected_return: row.try_get("loan_expected_return")?,
                        closed_at: None,
                        condition_out: row.try_get("loan_condition_out")?,
                        condition_in: None,
                        checkout_notes: row.try_get("loan_checkout_notes")?,
                        checkin_notes: None,
                        opened_by: row.try_get("loan_opened_by")?,
                        closed_by: None,
                        notification_sent: row.try_get("loan_notification_sent")?,
                    },
                    item_name: item.name.clone(),
                    member_name: row.try_get("member_name")?,
                    member_email: row.try_get("member_email")?,
                    is_overdue: false,
                })
            }
            None => None,
        };

        Ok((item, category, active_loan))
    }

    // =========================================================================
    // SEARCH
    // =========================================================================

    /// List items matching the filters, newest first
    pub async fn list(&self, query: &ItemQuery) -> AppResult<Vec<ItemSummary>> {
        let open_loan_exists = format!(
            "EXISTS (SELECT 1 FROM loans l WHERE l.item_id = i.id AND {})",
            OPEN_LOAN_SQL
        );

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            r#"
            SELECT i.*, c.name AS category_name, NOT {} AS is_available
            FROM items i
            JOIN categories c ON c.id = i.category_id
            WHERE 1=1
            "#,
            open_loan_exists
        ));

        if query.active_only.unwrap_or(true) {
            builder.push(" AND i.is_active");
        }

        if let Some(category_id) = query.category_id {
            builder.push(" AND i.category_id = ").push_bind(category_id);
        }

        if let Some(condition) = query.condition {
            builder.push(" AND i.condition = ").push_bind(condition);
        }

        if let Some(ref search) = query.search {
            let term = search.trim();
            if !term.is_empty() {
                let pattern = like_pattern(term);
                builder
                    .push(" AND (i.name ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR i.description ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR i.serial_number ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
        }

        match query.available {
            Some(true) => {
                builder.push(format!(" AND NOT {}", open_loan_exists));
            }
            Some(false) => {
                builder.push(format!(" AND {}", open_loan_exists));
            }
            None => {}
        }

        builder.push(" ORDER BY i.created_at DESC, i.id DESC");

        let items = builder
            .build_query_as::<ItemSummary>()
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// (active items, active items without an open loan)
    pub async fn count_active_and_available(&self) -> AppResult<(i64, i64)> {
        let row = sqlx::query(&format!(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (
                       WHERE NOT EXISTS (SELECT 1 FROM loans l WHERE l.item_id = i.id AND {})
                   ) AS available
            FROM items i
            WHERE i.is_active
            "#,
            OPEN_LOAN_SQL
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok((row.try_get("total")?, row.try_get("available")?))
    }

    // =========================================================================
    // CREATE
    // =========================================================================

    /// Insert a new item. Unique violations on serial number or scan token become conflicts.
    pub async fn create(&self, item: &NewItem) -> AppResult<Item> {
        let now = Utc::now();

        sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (
                name, description, serial_number, category_id, condition,
                scan_token, notes, is_active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $8)
            RETURNING *
            "#,
        )
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.serial_number)
        .bind(item.category_id)
        .bind(item.condition)
        .bind(&item.scan_token)
        .bind(&item.notes)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(constraint) => conflict_from_constraint(
                &constraint,
                &NewItemRef {
                    serial_number: item.serial_number.as_deref(),
                    scan_token: &item.scan_token,
                },
            ),
            None => e.into(),
        })
    }

    // =========================================================================
    // UPDATE
    // =========================================================================

    /// Update an existing item; absent fields keep their value. The scan token is never touched.
    pub async fn update(&self, id: i32, data: &UpdateItem) -> AppResult<Item> {
        let now = Utc::now();

        sqlx::query_as::<_, Item>(
            r#"
            UPDATE items SET
                name = COALESCE($1, name),
                description = COALESCE($2, description),
                serial_number = COALESCE($3, serial_number),
                category_id = COALESCE($4, category_id),
                condition = COALESCE($5, condition),
                notes = COALESCE($6, notes),
                is_active = COALESCE($7, is_active),
                updated_at = $8
            WHERE id = $9
            RETURNING *
            "#,
        )
        .bind(data.name.as_deref())
        .bind(data.description.as_deref())
        .bind(data.serial_number.as_deref())
        .bind(data.category_id)
        .bind(data.condition)
        .bind(data.notes.as_deref())
        .bind(data.is_active)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => AppError::Conflict(format!(
                "Serial number '{}' already exists",
                data.serial_number.as_deref().unwrap_or_default()
            )),
            None => e.into(),
        })?
        .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    /// Flip the active flag. Historical loans are left untouched.
    pub async fn set_active(&self, id: i32, active: bool) -> AppResult<Item> {
        sqlx::query_as::<_, Item>(
            "UPDATE items SET is_active = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }
}
