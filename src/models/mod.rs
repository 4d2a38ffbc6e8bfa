//! Data models for Quartermaster

pub mod category;
pub mod enums;
pub mod import_report;
pub mod item;
pub mod loan;
pub mod member;
pub mod packing_list;
pub mod report;

// Re-export commonly used types
pub use category::Category;
pub use enums::{Condition, MemberRole};
pub use import_report::{ImportKind, ImportReport, RawRow};
pub use item::{Item, ItemDetails, ItemSummary};
pub use loan::{Loan, LoanDetails};
pub use member::Member;

/// Trim a free-text value; blank strings count as absent
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(Some(" SN-1 ".to_string())), Some("SN-1".to_string()));
    }
}
