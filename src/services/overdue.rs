//! Overdue scanner
//!
//! Each pending notice is claimed, sent, then flagged. A claim is a short
//! lease on the loan row so overlapping scans do not notify twice; the
//! `notification_sent` flag is only set after the sender confirmed delivery.
//! A crash between delivery and flag write can still produce a duplicate.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::OverdueNotice,
    repository::{loans::LoansRepository, Repository},
};

/// How long a claim keeps other scans away from a loan
pub const CLAIM_LEASE_MINUTES: i64 = 15;

/// Due dates in notices read like `07 March 2026`
pub const DUE_DATE_FORMAT: &str = "%d %B %Y";

/// Outbound notification collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        address: &str,
        item_name: &str,
        member_name: &str,
        due_date_text: &str,
    ) -> AppResult<()>;
}

/// Loan-side bookkeeping of overdue notices
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NoticeLedger: Send + Sync {
    async fn pending_notices(
        &self,
        now: DateTime<Utc>,
        claims_expire_before: DateTime<Utc>,
    ) -> AppResult<Vec<OverdueNotice>>;
    async fn claim(
        &self,
        loan_id: i32,
        now: DateTime<Utc>,
        claims_expire_before: DateTime<Utc>,
    ) -> AppResult<bool>;
    async fn mark_notified(&self, loan_id: i32) -> AppResult<bool>;
    async fn release(&self, loan_id: i32) -> AppResult<()>;
}

#[async_trait]
impl NoticeLedger for LoansRepository {
    async fn pending_notices(
        &self,
        now: DateTime<Utc>,
        claims_expire_before: DateTime<Utc>,
    ) -> AppResult<Vec<OverdueNotice>> {
        LoansRepository::pending_notices(self, now, claims_expire_before).await
    }

    async fn claim(
        &self,
        loan_id: i32,
        now: DateTime<Utc>,
        claims_expire_before: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.claim_notice(loan_id, now, claims_expire_before).await
    }

    async fn mark_notified(&self, loan_id: i32) -> AppResult<bool> {
        LoansRepository::mark_notified(self, loan_id).await
    }

    async fn release(&self, loan_id: i32) -> AppResult<()> {
        self.release_notice_claim(loan_id).await
    }
}

/// Outcome of one scan
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScanSummary {
    /// Overdue loans waiting for a notice when the scan started
    pub candidates: usize,
    pub notified: usize,
    pub failed: usize,
    /// Loans another scan claimed first
    pub skipped: usize,
}

/// Notify every overdue member once. Per-loan failures are counted and logged, never raised.
pub async fn scan_and_notify<L, N>(ledger: &L, notifier: &N, now: DateTime<Utc>) -> AppResult<ScanSummary>
where
    L: NoticeLedger + ?Sized,
    N: Notifier + ?Sized,
{
    let claims_expire_before = now - Duration::minutes(CLAIM_LEASE_MINUTES);
    let notices = ledger.pending_notices(now, claims_expire_before).await?;
    let mut summary = ScanSummary {
        candidates: notices.len(),
        ..ScanSummary::default()
    };

    for notice in notices {
        match ledger.claim(notice.loan_id, now, claims_expire_before).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(loan_id = notice.loan_id, "Notice claimed elsewhere, skipping");
                summary.skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(loan_id = notice.loan_id, error = %e, "Could not claim overdue notice");
                summary.failed += 1;
                continue;
            }
        }

        let due_date = notice.expected_return.format(DUE_DATE_FORMAT).to_string();
        let sent = notifier
            .send(&notice.member_email, &notice.item_name, &notice.member_name, &due_date)
            .await;

        match sent {
            Ok(()) => {
                summary.notified += 1;
                if let Err(e) = ledger.mark_notified(notice.loan_id).await {
                    tracing::error!(
                        loan_id = notice.loan_id,
                        error = %e,
                        "Notice sent but flag not persisted; a later scan may send it again"
                    );
                } else {
                    tracing::info!(loan_id = notice.loan_id, to = %notice.member_email, "Overdue notice sent");
                }
            }
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(loan_id = notice.loan_id, to = %notice.member_email, error = %e, "Overdue notice failed");
                if let Err(e) = ledger.release(notice.loan_id).await {
                    tracing::warn!(loan_id = notice.loan_id, error = %e, "Could not release notice claim");
                }
            }
        }
    }

    tracing::info!(
        candidates = summary.candidates,
        notified = summary.notified,
        failed = summary.failed,
        skipped = summary.skipped,
        "Overdue scan finished"
    );
    Ok(summary)
}

#[derive(Clone)]
pub struct OverdueService {
    repository: Repository,
    notifier: Arc<dyn Notifier>,
}

impl OverdueService {
    pub fn new(repository: Repository, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    pub async fn scan_and_notify(&self) -> AppResult<ScanSummary> {
        scan_and_notify(&self.repository.loans, self.notifier.as_ref(), Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use chrono::TimeZone;
    use mockall::predicate::eq;

    fn notice(loan_id: i32, member_email: &str) -> OverdueNotice {
        OverdueNotice {
            loan_id,
            expected_return: Utc.with_ymd_and_hms(2026, 3, 7, 17, 0, 0).unwrap(),
            item_name: format!("Item {}", loan_id),
            member_name: format!("Member {}", loan_id),
            member_email: member_email.to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 9, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_notifies_each_pending_loan_once_and_flags_it() {
        let mut ledger = MockNoticeLedger::new();
        ledger
            .expect_pending_notices()
            .times(1)
            .returning(|_, _| Ok(vec![notice(1, "a@example.org"), notice(2, "b@example.org")]));
        ledger.expect_claim().times(2).returning(|_, _, _| Ok(true));
        ledger
            .expect_mark_notified()
            .with(eq(1))
            .times(1)
            .returning(|_| Ok(true));
        ledger
            .expect_mark_notified()
            .with(eq(2))
            .times(1)
            .returning(|_| Ok(true));
        ledger.expect_release().times(0);

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|address: &str, item: &str, member: &str, due: &str| {
                address == "a@example.org" && item == "Item 1" && member == "Member 1" && due == "07 March 2026"
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        notifier
            .expect_send()
            .withf(|address: &str, _: &str, _: &str, _: &str| address == "b@example.org")
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let summary = scan_and_notify(&ledger, &notifier, now()).await.unwrap();

        assert_eq!(
            summary,
            ScanSummary {
                candidates: 2,
                notified: 2,
                failed: 0,
                skipped: 0
            }
        );
    }

    #[tokio::test]
    async fn test_failed_send_releases_claim_and_continues() {
        let mut ledger = MockNoticeLedger::new();
        ledger
            .expect_pending_notices()
            .returning(|_, _| Ok(vec![notice(1, "down@example.org"), notice(2, "ok@example.org")]));
        ledger.expect_claim().returning(|_, _, _| Ok(true));
        ledger
            .expect_release()
            .with(eq(1))
            .times(1)
            .returning(|_| Ok(()));
        ledger
            .expect_mark_notified()
            .with(eq(2))
            .times(1)
            .returning(|_| Ok(true));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_send()
            .withf(|address: &str, _: &str, _: &str, _: &str| address == "down@example.org")
            .returning(|_, _, _, _| Err(AppError::Notification("connection refused".to_string())));
        notifier
            .expect_send()
            .withf(|address: &str, _: &str, _: &str, _: &str| address == "ok@example.org")
            .returning(|_, _, _, _| Ok(()));

        let summary = scan_and_notify(&ledger, &notifier, now()).await.unwrap();

        assert_eq!(summary.notified, 1);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_loan_claimed_by_another_scan_is_skipped() {
        let mut ledger = MockNoticeLedger::new();
        ledger
            .expect_pending_notices()
            .returning(|_, _| Ok(vec![notice(5, "c@example.org")]));
        ledger.expect_claim().returning(|_, _, _| Ok(false));
        ledger.expect_mark_notified().times(0);

        let mut notifier = MockNotifier::new();
        notifier.expect_send().times(0);

        let summary = scan_and_notify(&ledger, &notifier, now()).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.notified, 0);
    }

    #[tokio::test]
    async fn test_claim_lease_window() {
        let mut ledger = MockNoticeLedger::new();
        let expected_cutoff = now() - Duration::minutes(CLAIM_LEASE_MINUTES);
        ledger
            .expect_pending_notices()
            .with(eq(now()), eq(expected_cutoff))
            .times(1)
            .returning(|_, _| Ok(Vec::new()));

        let notifier = MockNotifier::new();
        let summary = scan_and_notify(&ledger, &notifier, now()).await.unwrap();

        assert_eq!(summary, ScanSummary::default());
    }
}
