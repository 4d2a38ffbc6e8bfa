//! Checkout ledger service
//!
//! Per item the ledger is either AVAILABLE (no open loan) or ON_LOAN
//! (exactly one open loan). Checkout and check-in are the only transitions.

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        loan::{CloseLoan, CreateLoan, LoanDetails, LoanFilter},
        non_blank,
    },
    repository::{
        loans::{LoanClosing, NewLoan},
        Repository,
    },
};

/// Reject checkout requests that must never reach the store
pub fn validate_checkout(
    expected_return: DateTime<Utc>,
    opened_at: DateTime<Utc>,
    actor: &str,
) -> AppResult<()> {
    if actor.trim().is_empty() {
        return Err(AppError::Validation("Checked out by is required".to_string()));
    }
    if expected_return <= opened_at {
        return Err(AppError::Validation(
            "Expected return must be after the checkout time".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
}

impl LoansService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Open a loan for an available item
    pub async fn checkout(&self, request: CreateLoan) -> AppResult<LoanDetails> {
        let now = Utc::now();
        validate_checkout(request.expected_return, now, &request.actor)?;

        let item = self
            .repository
            .items
            .find_by_id(request.item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", request.item_id)))?;
        if !item.is_active {
            return Err(AppError::Validation(format!(
                "Item '{}' is deactivated",
                item.name
            )));
        }

        let member = self
            .repository
            .members
            .find_by_id(request.member_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Member with id {} not found", request.member_id))
            })?;
        if !member.is_active {
            return Err(AppError::Validation(format!(
                "Member '{}' is deactivated",
                member.name
            )));
        }

        let opened = self
            .repository
            .loans
            .open(&NewLoan {
                item_id: item.id,
                member_id: member.id,
                opened_at: now,
                expected_return: request.expected_return,
                condition_out: request.condition_out,
                notes: non_blank(request.notes),
                opened_by: request.actor.trim().to_string(),
            })
            .await;

        let loan = match opened {
            Ok(loan) => loan,
            Err(e) => {
                if e.is_conflict() {
                    tracing::info!(item_id = item.id, member_id = member.id, "Checkout refused: item already on loan");
                }
                return Err(e);
            }
        };

        tracing::info!(
            loan_id = loan.id,
            item_id = loan.item_id,
            member_id = loan.member_id,
            expected_return = %loan.expected_return,
            "Item checked out"
        );
        self.repository.loans.get_details(loan.id, now).await
    }

    /// Close an open loan. Unknown and already-closed ids are both `NotFound`.
    pub async fn check_in(&self, loan_id: i32, request: CloseLoan) -> AppResult<LoanDetails> {
        if request.actor.trim().is_empty() {
            return Err(AppError::Validation("Checked in by is required".to_string()));
        }

        let now = Utc::now();
        let closing = LoanClosing {
            closed_at: now,
            condition_in: request.condition_in,
            notes: non_blank(request.notes),
            closed_by: request.actor.trim().to_string(),
        };

        let loan = self
            .repository
            .loans
            .close(loan_id, &closing)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No open loan with id {}", loan_id)))?;

        tracing::info!(
            loan_id = loan.id,
            item_id = loan.item_id,
            condition_in = %closing.condition_in,
            "Item checked in"
        );
        self.repository.loans.get_details(loan.id, now).await
    }

    pub async fn get_loan(&self, id: i32) -> AppResult<LoanDetails> {
        self.repository.loans.get_details(id, Utc::now()).await
    }

    pub async fn list_loans(&self, filter: LoanFilter) -> AppResult<Vec<LoanDetails>> {
        let now = Utc::now();
        match filter {
            LoanFilter::All => self.repository.loans.list_all(now).await,
            LoanFilter::Active => self.repository.loans.list_active(now).await,
            LoanFilter::Overdue => self.repository.loans.list_overdue(now).await,
        }
    }

    pub async fn list_active(&self) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.list_active(Utc::now()).await
    }

    /// Overdue loans as of `now`
    pub async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.list_overdue(now).await
    }

    /// Loan history for one item, newest first
    pub async fn list_item_history(&self, item_id: i32) -> AppResult<Vec<LoanDetails>> {
        self.repository.items.get_by_id(item_id).await?;
        self.repository.loans.list_for_item(item_id, Utc::now()).await
    }

    /// Loans a member currently holds
    pub async fn list_member_loans(&self, member_id: i32) -> AppResult<Vec<LoanDetails>> {
        self.repository.members.get_by_id(member_id).await?;
        self.repository
            .loans
            .list_open_for_member(member_id, Utc::now())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expected_return_must_be_in_the_future() {
        let now = Utc::now();
        assert!(validate_checkout(now + Duration::days(7), now, "desk").is_ok());
        assert!(validate_checkout(now + Duration::seconds(1), now, "desk").is_ok());

        let same_instant = validate_checkout(now, now, "desk");
        assert!(matches!(same_instant, Err(AppError::Validation(_))));

        let in_the_past = validate_checkout(now - Duration::hours(1), now, "desk");
        assert!(matches!(in_the_past, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_actor_is_required() {
        let now = Utc::now();
        let err = validate_checkout(now + Duration::days(1), now, "  ").unwrap_err();
        assert_eq!(err.detail(), "Checked out by is required");
    }
}
