//! Members repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres};

use super::unique_violation;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::MemberRole,
        loan::OPEN_LOAN_SQL,
        member::{Member, MemberWithLoans},
    },
};

/// Validated values for a new member row
#[derive(Debug, Clone)]
pub struct NewMember {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: MemberRole,
}

#[derive(Clone)]
pub struct MembersRepository {
    pool: Pool<Postgres>,
}

impl MembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(member)
    }

    /// Get member by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Member> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(member)
    }

    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM members WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// List members ordered by name, with their open loan counts
    pub async fn list(&self, active_only: bool) -> AppResult<Vec<MemberWithLoans>> {
        let members = sqlx::query_as::<_, MemberWithLoans>(&format!(
            r#"
            SELECT m.*,
                   (SELECT COUNT(*) FROM loans l WHERE l.member_id = m.id AND {}) AS open_loan_count
            FROM members m
            WHERE ($1 = FALSE OR m.is_active)
            ORDER BY m.name, m.id
            "#,
            OPEN_LOAN_SQL
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    pub async fn count_active(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members WHERE is_active")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Insert a new member. A unique violation on email becomes a conflict.
    pub async fn create(&self, member: &NewMember) -> AppResult<Member> {
        let now = Utc::now();

        sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO members (name, email, phone, role, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, $5, $5)
            RETURNING *
            "#,
        )
        .bind(&member.name)
        .bind(&member.email)
        .bind(&member.phone)
        .bind(member.role)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => AppError::Conflict(format!(
                "Email '{}' already exists",
                member.email.as_deref().unwrap_or_default()
            )),
            None => e.into(),
        })
    }

    /// Flip the active flag. Historical loans are left untouched.
    pub async fn set_active(&self, id: i32, active: bool) -> AppResult<Member> {
        sqlx::query_as::<_, Member>(
            "UPDATE members SET is_active = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }
}
