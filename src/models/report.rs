//! Export and dashboard report models

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::loan::LoanDetails;

/// Available tabular exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    /// Active items with their category
    #[default]
    Items,
    /// Every loan, newest first
    Checkouts,
    /// Open loans past their expected return
    Overdue,
}

impl ExportKind {
    pub fn filename(&self) -> &'static str {
        match self {
            ExportKind::Items => "inventory_items.csv",
            ExportKind::Checkouts => "checkout_history.csv",
            ExportKind::Overdue => "overdue_items.csv",
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ExportQuery {
    /// items (default), checkouts or overdue
    #[serde(rename = "type")]
    pub kind: Option<ExportKind>,
}

/// A rendered export: header row plus one row per entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub kind: ExportKind,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl Export {
    pub fn filename(&self) -> &'static str {
        self.kind.filename()
    }
}

/// Dashboard figures
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub total_items: i64,
    pub available_items: i64,
    pub checked_out_items: i64,
    pub overdue_items: i64,
    pub total_members: i64,
    /// Open loans, newest first
    pub active_loans: Vec<LoanDetails>,
}
