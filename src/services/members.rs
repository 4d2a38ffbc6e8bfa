//! Membership registry service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        member::{CreateMember, Member, MemberWithLoans},
        non_blank,
    },
    repository::{members::NewMember, Repository},
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_members(&self, active_only: bool) -> AppResult<Vec<MemberWithLoans>> {
        self.repository.members.list(active_only).await
    }

    pub async fn get_member(&self, id: i32) -> AppResult<Member> {
        self.repository.members.get_by_id(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<Member>> {
        self.repository.members.find_by_email(email.trim()).await
    }

    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        self.repository.members.email_exists(email.trim()).await
    }

    /// Create a member from a direct request
    pub async fn create_member(&self, data: CreateMember) -> AppResult<Member> {
        let data = CreateMember {
            email: non_blank(data.email),
            ..data
        };
        data.validate()?;

        let name = non_blank(Some(data.name))
            .ok_or_else(|| AppError::Validation("Name is required".to_string()))?;
        if let Some(email) = &data.email {
            if self.email_exists(email).await? {
                return Err(AppError::Conflict(format!("Email '{}' already exists", email)));
            }
        }

        self.register_member(NewMember {
            name,
            email: data.email,
            phone: non_blank(data.phone),
            role: data.role.unwrap_or_default(),
        })
        .await
    }

    /// Persist an already-normalised member
    pub async fn register_member(&self, member: NewMember) -> AppResult<Member> {
        let member = self.repository.members.create(&member).await?;
        tracing::info!(member_id = member.id, role = %member.role, "Member registered");
        Ok(member)
    }

    /// Soft-delete: open and past loans keep referencing the member
    pub async fn deactivate_member(&self, id: i32) -> AppResult<Member> {
        let member = self.repository.members.set_active(id, false).await?;
        tracing::info!(member_id = member.id, "Member deactivated");
        Ok(member)
    }
}
