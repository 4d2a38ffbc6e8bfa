//! Bulk reconciler: merges externally supplied item and member rows into the registries.
//!
//! Rows are handled one at a time, in input order. A failing row is recorded in
//! the report and never aborts the batch; only unreadable or empty input does.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    error::{AppError, AppResult},
    models::{
        category::Category,
        enums::{Condition, MemberRole},
        import_report::{ImportKind, ImportReport, RawRow, HEADER_OFFSET},
        item::Item,
        member::Member,
        non_blank,
    },
    repository::members::NewMember,
};

use super::{
    catalog::{CatalogService, ItemDraft},
    members::MembersService,
};

/// Registry operations the reconciler needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImportTarget: Send + Sync {
    async fn serial_number_exists(&self, serial_number: &str) -> AppResult<bool>;
    async fn email_exists(&self, email: &str) -> AppResult<bool>;
    async fn find_or_create_category(&self, name: &str) -> AppResult<Category>;
    async fn create_item(&self, draft: ItemDraft) -> AppResult<Item>;
    async fn create_member(&self, member: NewMember) -> AppResult<Member>;
}

/// The live item and membership registries
#[derive(Clone)]
pub struct Registries {
    catalog: CatalogService,
    members: MembersService,
}

impl Registries {
    pub fn new(catalog: CatalogService, members: MembersService) -> Self {
        Self { catalog, members }
    }
}

#[async_trait]
impl ImportTarget for Registries {
    async fn serial_number_exists(&self, serial_number: &str) -> AppResult<bool> {
        self.catalog.serial_number_exists(serial_number).await
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        self.members.email_exists(email).await
    }

    async fn find_or_create_category(&self, name: &str) -> AppResult<Category> {
        self.catalog.find_or_create_category(name).await
    }

    async fn create_item(&self, draft: ItemDraft) -> AppResult<Item> {
        self.catalog.register_item(draft).await
    }

    async fn create_member(&self, member: NewMember) -> AppResult<Member> {
        self.members.register_member(member).await
    }
}

// =============================================================================
// ROW SCHEMAS
// =============================================================================

struct Column {
    key: &'static str,
    required: bool,
}

const ITEM_COLUMNS: &[Column] = &[
    Column { key: "name", required: true },
    Column { key: "category", required: true },
    Column { key: "description", required: false },
    Column { key: "serialNumber", required: false },
    Column { key: "condition", required: false },
    Column { key: "notes", required: false },
];

const MEMBER_COLUMNS: &[Column] = &[
    Column { key: "name", required: true },
    Column { key: "email", required: false },
    Column { key: "phone", required: false },
    Column { key: "role", required: false },
];

fn columns(kind: ImportKind) -> &'static [Column] {
    match kind {
        ImportKind::Items => ITEM_COLUMNS,
        ImportKind::Members => MEMBER_COLUMNS,
    }
}

/// `Serial Number`, `serial_number` and `serialNumber` all fold to `serialnumber`
fn fold_column_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// A row reduced to the known columns of its kind; blank values are absent
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SchemaRow {
    values: HashMap<&'static str, String>,
}

impl SchemaRow {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// First required column with no value
    fn missing_required(&self, kind: ImportKind) -> Option<&'static str> {
        columns(kind)
            .iter()
            .find(|c| c.required && !self.values.contains_key(c.key))
            .map(|c| c.key)
    }
}

/// Map raw rows onto the column set of `kind`.
///
/// Returns the normalised rows and one warning per unknown column.
pub fn apply_schema(kind: ImportKind, rows: Vec<RawRow>) -> (Vec<SchemaRow>, Vec<String>) {
    let known: HashMap<String, &'static str> = columns(kind)
        .iter()
        .map(|c| (fold_column_name(c.key), c.key))
        .collect();
    let mut unknown: Vec<String> = Vec::new();

    let rows = rows
        .into_iter()
        .map(|raw| {
            let mut row = SchemaRow::default();
            for (column, value) in raw {
                match known.get(&fold_column_name(&column)) {
                    Some(key) => {
                        if let Some(value) = non_blank(value) {
                            row.values.entry(*key).or_insert(value);
                        }
                    }
                    None => {
                        if !unknown.contains(&column) {
                            unknown.push(column);
                        }
                    }
                }
            }
            row
        })
        .collect();

    let warnings = unknown
        .into_iter()
        .map(|column| format!("Ignored unknown column '{}'", column))
        .collect();
    (rows, warnings)
}

// =============================================================================
// CSV INPUT
// =============================================================================

/// Decode CSV text (header line required) into raw rows.
///
/// Fields are trimmed and empty lines are skipped; a record of blank fields is
/// kept so its row number holds. Any decoding failure makes the whole input unreadable.
pub fn decode_csv(input: &[u8]) -> AppResult<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::Transport(format!("Cannot read CSV header: {}", e)))?
        .clone();
    if headers.iter().all(str::is_empty) {
        return Err(AppError::Transport("CSV header line is missing".to_string()));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            AppError::Transport(format!(
                "CSV parse error at line {}: {}",
                index + HEADER_OFFSET,
                e
            ))
        })?;

        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(column, value)| (column.to_string(), Some(value.to_string())))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

// =============================================================================
// RECONCILIATION
// =============================================================================

fn check_batch_size(rows: usize, max_rows: usize) -> AppResult<()> {
    if rows == 0 {
        return Err(AppError::Validation("No rows to import".to_string()));
    }
    if rows > max_rows {
        return Err(AppError::Validation(format!(
            "Import is limited to {} rows, got {}",
            max_rows, rows
        )));
    }
    Ok(())
}

fn missing_field(key: &str) -> AppError {
    AppError::Validation(format!("Missing required field '{}'", key))
}

/// Import item rows against `target`
pub async fn import_items<T: ImportTarget + ?Sized>(
    target: &T,
    rows: Vec<RawRow>,
    max_rows: usize,
) -> AppResult<ImportReport<Item>> {
    check_batch_size(rows.len(), max_rows)?;
    let (rows, warnings) = apply_schema(ImportKind::Items, rows);
    let mut report = ImportReport {
        warnings,
        ..ImportReport::default()
    };

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + HEADER_OFFSET;
        match import_item_row(target, row).await {
            Ok(item) => report.record_success(item),
            Err(e) => {
                tracing::warn!(row = row_number, error = %e, "Item row rejected");
                report.record_failure(row_number, e.detail());
            }
        }
    }

    tracing::info!(
        success = report.success,
        failed = report.failed,
        "Item import finished"
    );
    Ok(report)
}

async fn import_item_row<T: ImportTarget + ?Sized>(target: &T, row: &SchemaRow) -> AppResult<Item> {
    if let Some(key) = row.missing_required(ImportKind::Items) {
        return Err(missing_field(key));
    }
    let name = row.get("name").ok_or_else(|| missing_field("name"))?;
    let category_name = row.get("category").ok_or_else(|| missing_field("category"))?;

    let serial_number = row.get("serialNumber").map(str::to_string);
    if let Some(serial) = &serial_number {
        if target.serial_number_exists(serial).await? {
            return Err(AppError::Conflict(format!(
                "Serial number '{}' already exists",
                serial
            )));
        }
    }

    let condition = Condition::coerce(row.get("condition"));
    let category = target.find_or_create_category(category_name).await?;

    target
        .create_item(ItemDraft {
            name: name.to_string(),
            description: row.get("description").map(str::to_string),
            serial_number,
            category_id: category.id,
            condition,
            notes: row.get("notes").map(str::to_string),
        })
        .await
}

/// Import member rows against `target`
pub async fn import_members<T: ImportTarget + ?Sized>(
    target: &T,
    rows: Vec<RawRow>,
    max_rows: usize,
) -> AppResult<ImportReport<Member>> {
    check_batch_size(rows.len(), max_rows)?;
    let (rows, warnings) = apply_schema(ImportKind::Members, rows);
    let mut report = ImportReport {
        warnings,
        ..ImportReport::default()
    };

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + HEADER_OFFSET;
        match import_member_row(target, row).await {
            Ok(member) => report.record_success(member),
            Err(e) => {
                tracing::warn!(row = row_number, error = %e, "Member row rejected");
                report.record_failure(row_number, e.detail());
            }
        }
    }

    tracing::info!(
        success = report.success,
        failed = report.failed,
        "Member import finished"
    );
    Ok(report)
}

async fn import_member_row<T: ImportTarget + ?Sized>(
    target: &T,
    row: &SchemaRow,
) -> AppResult<Member> {
    if let Some(key) = row.missing_required(ImportKind::Members) {
        return Err(missing_field(key));
    }
    let name = row.get("name").ok_or_else(|| missing_field("name"))?;

    let email = row.get("email").map(str::to_string);
    if let Some(email) = &email {
        if target.email_exists(email).await? {
            return Err(AppError::Conflict(format!("Email '{}' already exists", email)));
        }
    }

    target
        .create_member(NewMember {
            name: name.to_string(),
            email,
            phone: row.get("phone").map(str::to_string),
            role: MemberRole::coerce(row.get("role")),
        })
        .await
}

/// Import entry points bound to the live registries
#[derive(Clone)]
pub struct ImportService {
    registries: Registries,
    max_rows: usize,
}

impl ImportService {
    pub fn new(registries: Registries, max_rows: usize) -> Self {
        Self {
            registries,
            max_rows,
        }
    }

    pub async fn import_items(&self, rows: Vec<RawRow>) -> AppResult<ImportReport<Item>> {
        import_items(&self.registries, rows, self.max_rows).await
    }

    pub async fn import_members(&self, rows: Vec<RawRow>) -> AppResult<ImportReport<Member>> {
        import_members(&self.registries, rows, self.max_rows).await
    }

    pub async fn import_items_csv(&self, input: &[u8]) -> AppResult<ImportReport<Item>> {
        self.import_items(decode_csv(input)?).await
    }

    pub async fn import_members_csv(&self, input: &[u8]) -> AppResult<ImportReport<Member>> {
        self.import_members(decode_csv(input)?).await
    }
}
