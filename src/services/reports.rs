//! Report aggregator: tabular exports and dashboard figures
//!
//! Overdue rows are selected with the same predicate the ledger listings use.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        item::{ItemQuery, ItemSummary},
        loan::{days_overdue, LoanDetails},
        report::{DashboardStats, Export, ExportKind},
    },
    repository::Repository,
};

const ITEM_HEADERS: [&str; 7] = [
    "Name",
    "Description",
    "Serial Number",
    "Category",
    "Condition",
    "Scan Token",
    "Notes",
];

const HISTORY_HEADERS: [&str; 8] = [
    "Item Name",
    "Member Name",
    "Checked Out",
    "Expected Return",
    "Checked In",
    "Condition Out",
    "Condition In",
    "Status",
];

const OVERDUE_HEADERS: [&str; 6] = [
    "Item Name",
    "Member Name",
    "Member Email",
    "Checked Out",
    "Expected Return",
    "Days Overdue",
];

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

/// Active item inventory with the category name flattened in
pub fn items_export(items: &[ItemSummary]) -> Export {
    let rows = items
        .iter()
        .filter(|summary| summary.item.is_active)
        .map(|summary| {
            let item = &summary.item;
            vec![
                item.name.clone(),
                text(&item.description),
                text(&item.serial_number),
                summary.category_name.clone(),
                item.condition.to_string(),
                item.scan_token.clone(),
                text(&item.notes),
            ]
        })
        .collect();

    Export {
        kind: ExportKind::Items,
        headers: ITEM_HEADERS.to_vec(),
        rows,
    }
}

/// Full loan history with the computed status
pub fn history_export(loans: &[LoanDetails]) -> Export {
    let rows = loans
        .iter()
        .map(|details| {
            let loan = &details.loan;
            vec![
                details.item_name.clone(),
                details.member_name.clone(),
                timestamp(loan.opened_at),
                timestamp(loan.expected_return),
                loan.closed_at.map(timestamp).unwrap_or_default(),
                loan.condition_out.to_string(),
                loan.condition_in.map(|c| c.to_string()).unwrap_or_default(),
                loan.status().to_string(),
            ]
        })
        .collect();

    Export {
        kind: ExportKind::Checkouts,
        headers: HISTORY_HEADERS.to_vec(),
        rows,
    }
}

/// Loans overdue at `now`, with whole days overdue
pub fn overdue_export(loans: &[LoanDetails], now: DateTime<Utc>) -> Export {
    let rows = loans
        .iter()
        .filter(|details| details.loan.is_overdue_at(now))
        .map(|details| {
            let loan = &details.loan;
            vec![
                details.item_name.clone(),
                details.member_name.clone(),
                text(&details.member_email),
                timestamp(loan.opened_at),
                timestamp(loan.expected_return),
                days_overdue(loan.expected_return, now).to_string(),
            ]
        })
        .collect();

    Export {
        kind: ExportKind::Overdue,
        headers: OVERDUE_HEADERS.to_vec(),
        rows,
    }
}

/// Render an export as CSV: every field quoted, embedded quotes doubled
pub fn render_csv(export: &Export) -> AppResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(&export.headers)
        .map_err(|e| AppError::Internal(format!("CSV write error: {}", e)))?;
    for row in &export.rows {
        writer
            .write_record(row)
            .map_err(|e| AppError::Internal(format!("CSV write error: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV write error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV is not UTF-8: {}", e)))
}

#[derive(Clone)]
pub struct ReportsService {
    repository: Repository,
}

impl ReportsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn export(&self, kind: ExportKind) -> AppResult<Export> {
        let now = Utc::now();
        let export = match kind {
            ExportKind::Items => {
                let query = ItemQuery {
                    active_only: Some(true),
                    ..ItemQuery::default()
                };
                items_export(&self.repository.items.list(&query).await?)
            }
            ExportKind::Checkouts => history_export(&self.repository.loans.list_all(now).await?),
            ExportKind::Overdue => {
                overdue_export(&self.repository.loans.list_overdue(now).await?, now)
            }
        };

        tracing::debug!(kind = ?kind, rows = export.rows.len(), "Export built");
        Ok(export)
    }

    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let now = Utc::now();
        let (total_items, available_items) =
            self.repository.items.count_active_and_available().await?;

        Ok(DashboardStats {
            total_items,
            available_items,
            checked_out_items: total_items - available_items,
            overdue_items: self.repository.loans.count_overdue(now).await?,
            total_members: self.repository.members.count_active().await?,
            active_loans: self.repository.loans.list_active(now).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        enums::Condition,
        item::Item,
        loan::{is_overdue, Loan},
    };
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    fn loan(id: i32, opened_at: DateTime<Utc>, expected_return: DateTime<Utc>) -> LoanDetails {
        LoanDetails {
            loan: Loan {
                id,
                item_id: id,
                member_id: 1,
                opened_at,
                expected_return,
                closed_at: None,
                condition_out: Condition::Good,
                condition_in: None,
                checkout_notes: None,
                checkin_notes: None,
                opened_by: "desk".to_string(),
                closed_by: None,
                notification_sent: false,
            },
            item_name: format!("Item {}", id),
            member_name: "Alice".to_string(),
            member_email: Some("alice@example.org".to_string()),
            is_overdue: false,
        }
    }

    #[test]
    fn test_render_csv_quotes_every_field() {
        let export = Export {
            kind: ExportKind::Items,
            headers: vec!["Name", "Notes"],
            rows: vec![vec!["Tent, 4p".to_string(), "says \"hi\"".to_string()]],
        };

        let csv = render_csv(&export).unwrap();

        assert_eq!(csv, "\"Name\",\"Notes\"\n\"Tent, 4p\",\"says \"\"hi\"\"\"\n");
    }

    #[test]
    fn test_history_export_status_and_conditions() {
        let mut returned = loan(1, at(1, 9), at(8, 9));
        returned.loan.closed_at = Some(at(5, 10));
        returned.loan.condition_in = Some(Condition::Fair);
        let active = loan(2, at(6, 9), at(13, 9));

        let export = history_export(&[active, returned]);

        assert_eq!(export.headers.len(), 8);
        assert_eq!(export.rows[0][4], "");
        assert_eq!(export.rows[0][7], "Active");
        assert_eq!(export.rows[1][2], "2026-03-01T09:00:00Z");
        assert_eq!(export.rows[1][4], "2026-03-05T10:00:00Z");
        assert_eq!(export.rows[1][5], "GOOD");
        assert_eq!(export.rows[1][6], "FAIR");
        assert_eq!(export.rows[1][7], "Returned");
        assert_eq!(export.filename(), "checkout_history.csv");
    }

    #[test]
    fn test_overdue_export_agrees_with_ledger_predicate() {
        let now = at(11, 12);
        let loans = vec![
            loan(1, at(1, 9), at(10, 12)),
            loan(2, at(1, 9), at(11, 12)),
            loan(3, at(1, 9), at(20, 12)),
        ];

        let export = overdue_export(&loans, now);

        let expected: Vec<String> = loans
            .iter()
            .filter(|l| is_overdue(l.loan.closed_at, l.loan.expected_return, now))
            .map(|l| l.item_name.clone())
            .collect();
        let exported: Vec<String> = export.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(exported, expected);
        assert_eq!(export.rows[0][5], "1");
        assert_eq!(export.rows[0][2], "alice@example.org");
    }

    #[test]
    fn test_days_overdue_column_floors() {
        let due = at(10, 12);
        let loans = vec![loan(1, at(1, 9), due)];

        let export = overdue_export(&loans, due + Duration::hours(71));

        assert_eq!(export.rows[0][5], "2");
    }

    #[test]
    fn test_items_export_skips_inactive_items() {
        let item = |id: i32, active: bool| ItemSummary {
            item: Item {
                id,
                name: format!("Item {}", id),
                description: None,
                serial_number: Some(format!("SN-{}", id)),
                category_id: 1,
                condition: Condition::Excellent,
                scan_token: format!("QMTOKEN{:05}", id),
                notes: None,
                is_active: active,
                created_at: at(1, 9),
                updated_at: at(1, 9),
            },
            category_name: "Camping".to_string(),
            is_available: true,
        };

        let export = items_export(&[item(1, true), item(2, false)]);

        assert_eq!(export.rows.len(), 1);
        assert_eq!(
            export.rows[0],
            vec!["Item 1", "", "SN-1", "Camping", "EXCELLENT", "QMTOKEN00001", ""]
        );
    }
}
