//! Loans repository for database operations
//!
//! The one-open-loan-per-item rule is enforced here: the insert is
//! conditioned on the absence of an open loan, and the partial unique index
//! `loans_one_open_per_item` turns any racing second insert into a
//! unique violation, reported as a conflict.

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use super::unique_violation;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::Condition,
        loan::{Loan, LoanDetails, OverdueNotice, OPEN_LOAN_SQL, OVERDUE_LOAN_SQL},
    },
};

const DETAILS_SELECT: &str = r#"
    SELECT l.id, l.item_id, l.member_id, l.opened_at, l.expected_return, l.closed_at,
           l.condition_out, l.condition_in, l.checkout_notes, l.checkin_notes,
           l.opened_by, l.closed_by, l.notification_sent,
           i.name AS item_name, m.name AS member_name, m.email AS member_email
    FROM loans l
    JOIN items i ON i.id = l.item_id
    JOIN members m ON m.id = l.member_id
"#;

pub const ITEM_ON_LOAN: &str = "item already on loan";

/// Validated values for a loan about to be opened
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub item_id: i32,
    pub member_id: i32,
    pub opened_at: DateTime<Utc>,
    pub expected_return: DateTime<Utc>,
    pub condition_out: Condition,
    pub notes: Option<String>,
    pub opened_by: String,
}

/// Values recorded when a loan is closed
#[derive(Debug, Clone)]
pub struct LoanClosing {
    pub closed_at: DateTime<Utc>,
    pub condition_in: Condition,
    pub notes: Option<String>,
    pub closed_by: String,
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    pub async fn get_details(&self, id: i32, now: DateTime<Utc>) -> AppResult<LoanDetails> {
        let query = format!("{} WHERE l.id = $1", DETAILS_SELECT);
        sqlx::query_as::<_, LoanDetails>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|d| d.at(now))
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Open a loan iff the item has no open loan at the instant of the write.
    ///
    /// Two racing calls on the same item resolve to exactly one winner; the
    /// loser gets `Conflict("item already on loan")`.
    pub async fn open(&self, loan: &NewLoan) -> AppResult<Loan> {
        let inserted = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (
                item_id, member_id, opened_at, expected_return,
                condition_out, checkout_notes, opened_by
            )
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE NOT EXISTS (
                SELECT 1 FROM loans WHERE item_id = $1 AND closed_at IS NULL
            )
            RETURNING *
            "#,
        )
        .bind(loan.item_id)
        .bind(loan.member_id)
        .bind(loan.opened_at)
        .bind(loan.expected_return)
        .bind(loan.condition_out)
        .bind(&loan.notes)
        .bind(&loan.opened_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => AppError::Conflict(ITEM_ON_LOAN.to_string()),
            None => e.into(),
        })?;

        inserted.ok_or_else(|| AppError::Conflict(ITEM_ON_LOAN.to_string()))
    }

    /// Close an open loan. Returns `None` when no open loan has this id,
    /// whether it never existed or was already closed.
    pub async fn close(&self, id: i32, closing: &LoanClosing) -> AppResult<Option<Loan>> {
        let closed = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans SET
                closed_at = GREATEST($2, opened_at),
                condition_in = $3,
                checkin_notes = $4,
                closed_by = $5,
                notification_claimed_at = NULL
            WHERE id = $1 AND closed_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(closing.closed_at)
        .bind(closing.condition_in)
        .bind(&closing.notes)
        .bind(&closing.closed_by)
        .fetch_optional(&self.pool)
        .await?;

        if closed.is_none() {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM loans WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
            tracing::debug!(loan_id = id, already_closed = exists, "Check-in matched no open loan");
        }

        Ok(closed)
    }

    // =========================================================================
    // LISTINGS
    // =========================================================================

    /// Every loan, newest first
    pub async fn list_all(&self, now: DateTime<Utc>) -> AppResult<Vec<LoanDetails>> {
        let query = format!("{} ORDER BY l.opened_at DESC, l.id DESC", DETAILS_SELECT);
        self.fetch_details(sqlx::query_as::<_, LoanDetails>(&query), now).await
    }

    /// Open loans, newest first
    pub async fn list_active(&self, now: DateTime<Utc>) -> AppResult<Vec<LoanDetails>> {
        let query = format!(
            "{} WHERE {} ORDER BY l.opened_at DESC, l.id DESC",
            DETAILS_SELECT, OPEN_LOAN_SQL
        );
        self.fetch_details(sqlx::query_as::<_, LoanDetails>(&query), now).await
    }

    /// Open loans past their expected return at `now`, most overdue first
    pub async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<LoanDetails>> {
        let query = format!(
            "{} WHERE {} ORDER BY l.expected_return ASC, l.id ASC",
            DETAILS_SELECT, OVERDUE_LOAN_SQL
        );
        self.fetch_details(sqlx::query_as::<_, LoanDetails>(&query).bind(now), now)
            .await
    }

    /// Loan history of one item, newest first
    pub async fn list_for_item(&self, item_id: i32, now: DateTime<Utc>) -> AppResult<Vec<LoanDetails>> {
        let query = format!(
            "{} WHERE l.item_id = $1 ORDER BY l.opened_at DESC, l.id DESC",
            DETAILS_SELECT
        );
        self.fetch_details(sqlx::query_as::<_, LoanDetails>(&query).bind(item_id), now)
            .await
    }

    /// Open loans held by one member, oldest due first
    pub async fn list_open_for_member(
        &self,
        member_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<LoanDetails>> {
        let query = format!(
            "{} WHERE l.member_id = $1 AND {} ORDER BY l.expected_return ASC, l.id ASC",
            DETAILS_SELECT, OPEN_LOAN_SQL
        );
        self.fetch_details(sqlx::query_as::<_, LoanDetails>(&query).bind(member_id), now)
            .await
    }

    async fn fetch_details<'q>(
        &self,
        query: sqlx::query::QueryAs<'q, Postgres, LoanDetails, sqlx::postgres::PgArguments>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<LoanDetails>> {
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|d| d.at(now)).collect())
    }

    pub async fn count_active(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM loans l WHERE {}",
            OPEN_LOAN_SQL
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn count_overdue(&self, now: DateTime<Utc>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM loans l WHERE {}",
            OVERDUE_LOAN_SQL
        ))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // =========================================================================
    // OVERDUE NOTICES
    // =========================================================================

    /// Overdue loans whose notice has not gone out, whose member has an
    /// address, and which no live claim holds.
    pub async fn pending_notices(
        &self,
        now: DateTime<Utc>,
        claims_expire_before: DateTime<Utc>,
    ) -> AppResult<Vec<OverdueNotice>> {
        let notices = sqlx::query_as::<_, OverdueNotice>(&format!(
            r#"
            SELECT l.id AS loan_id, l.expected_return,
                   i.name AS item_name, m.name AS member_name, m.email AS member_email
            FROM loans l
            JOIN items i ON i.id = l.item_id
            JOIN members m ON m.id = l.member_id
            WHERE {}
              AND NOT l.notification_sent
              AND m.email IS NOT NULL AND m.email <> ''
              AND (l.notification_claimed_at IS NULL OR l.notification_claimed_at < $2)
            ORDER BY l.expected_return ASC, l.id ASC
            "#,
            OVERDUE_LOAN_SQL
        ))
        .bind(now)
        .bind(claims_expire_before)
        .fetch_all(&self.pool)
        .await?;
        Ok(notices)
    }

    /// Take the per-loan notice claim. Only one concurrent scan can hold it.
    pub async fn claim_notice(
        &self,
        loan_id: i32,
        now: DateTime<Utc>,
        claims_expire_before: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE loans SET notification_claimed_at = $2
            WHERE id = $1
              AND closed_at IS NULL
              AND NOT notification_sent
              AND (notification_claimed_at IS NULL OR notification_claimed_at < $3)
            "#,
        )
        .bind(loan_id)
        .bind(now)
        .bind(claims_expire_before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Set the notification flag; it is only ever set once
    pub async fn mark_notified(&self, loan_id: i32) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE loans SET notification_sent = TRUE, notification_claimed_at = NULL
            WHERE id = $1 AND NOT notification_sent
            "#,
        )
        .bind(loan_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn release_notice_claim(&self, loan_id: i32) -> AppResult<()> {
        sqlx::query(
            "UPDATE loans SET notification_claimed_at = NULL WHERE id = $1 AND NOT notification_sent",
        )
        .bind(loan_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
