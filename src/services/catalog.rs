//! Item registry and category management service

use chrono::Utc;
use rand::Rng;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        category::{
            Category, CategoryWithCount, CreateCategory, AUTO_CREATED_DESCRIPTION,
            DEFAULT_CATEGORY_COLOR,
        },
        enums::Condition,
        item::{scan_url, CreateItem, Item, ItemDetails, ItemQuery, ItemSummary, UpdateItem},
        loan::LoanDetails,
        non_blank,
    },
    repository::{items::NewItem, Repository},
};

const SCAN_TOKEN_PREFIX: &str = "QM";
const SCAN_TOKEN_LENGTH: usize = 10;
const SCAN_TOKEN_ATTEMPTS: usize = 8;
const SCAN_TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a candidate scan token (`QM` + 10 uppercase alphanumerics)
pub fn generate_scan_token() -> String {
    let mut rng = rand::thread_rng();
    let body: String = (0..SCAN_TOKEN_LENGTH)
        .map(|_| SCAN_TOKEN_ALPHABET[rng.gen_range(0..SCAN_TOKEN_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", SCAN_TOKEN_PREFIX, body)
}

/// Field values of an item about to be registered, already normalised
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    pub name: String,
    pub description: Option<String>,
    pub serial_number: Option<String>,
    pub category_id: i32,
    pub condition: Condition,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    public_url: String,
}

impl CatalogService {
    pub fn new(repository: Repository, public_url: String) -> Self {
        Self {
            repository,
            public_url,
        }
    }

    // =========================================================================
    // CATEGORIES
    // =========================================================================

    pub async fn list_categories(&self) -> AppResult<Vec<CategoryWithCount>> {
        self.repository.categories.list_with_counts().await
    }

    /// Create a category explicitly; a name already taken in any case is a conflict
    pub async fn create_category(&self, data: CreateCategory) -> AppResult<Category> {
        data.validate()?;
        let name = non_blank(Some(data.name))
            .ok_or_else(|| AppError::Validation("Name is required".to_string()))?;
        let description = non_blank(data.description);
        let color = non_blank(data.color).unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string());

        let category = self
            .repository
            .categories
            .create(&name, description.as_deref(), &color)
            .await?;
        tracing::info!(category_id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    /// Idempotent lookup-or-insert by case-insensitive name
    pub async fn find_or_create_category(&self, name: &str) -> AppResult<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Category name is required".to_string()));
        }

        let (category, created) = self
            .repository
            .categories
            .find_or_create(name, AUTO_CREATED_DESCRIPTION, DEFAULT_CATEGORY_COLOR)
            .await?;
        if created {
            tracing::info!(category_id = category.id, name = %category.name, "Category auto-created");
        }
        Ok(category)
    }

    // =========================================================================
    // ITEMS
    // =========================================================================

    pub async fn list_items(&self, query: &ItemQuery) -> AppResult<Vec<ItemSummary>> {
        self.repository.items.list(query).await
    }

    /// Item with category, availability, open loan and scan URL
    pub async fn get_item(&self, id: i32) -> AppResult<ItemDetails> {
        let parts = self.repository.items.get_with_loan_by_id(id).await?;
        Ok(self.details(parts))
    }

    /// Resolve a scanned token in one read
    pub async fn get_item_by_scan_token(&self, token: &str) -> AppResult<ItemDetails> {
        let parts = self
            .repository
            .items
            .get_with_loan_by_scan_token(token.trim())
            .await?;
        Ok(self.details(parts))
    }

    pub async fn serial_number_exists(&self, serial_number: &str) -> AppResult<bool> {
        self.repository
            .items
            .serial_number_exists(serial_number, None)
            .await
    }

    /// Create an item from a direct request
    pub async fn create_item(&self, data: CreateItem) -> AppResult<Item> {
        data.validate()?;
        let name = non_blank(Some(data.name))
            .ok_or_else(|| AppError::Validation("Name is required".to_string()))?;
        self.ensure_category(data.category_id).await?;

        let serial_number = non_blank(data.serial_number);
        if let Some(serial) = &serial_number {
            if self.serial_number_exists(serial).await? {
                return Err(AppError::Conflict(format!(
                    "Serial number '{}' already exists",
                    serial
                )));
            }
        }

        self.register_item(ItemDraft {
            name,
            description: non_blank(data.description),
            serial_number,
            category_id: data.category_id,
            condition: data.condition.unwrap_or_default(),
            notes: non_blank(data.notes),
        })
        .await
    }

    /// Assign a fresh scan token and persist the draft
    pub async fn register_item(&self, draft: ItemDraft) -> AppResult<Item> {
        let scan_token = self.allocate_scan_token().await?;
        let item = self
            .repository
            .items
            .create(&NewItem {
                name: draft.name,
                description: draft.description,
                serial_number: draft.serial_number,
                category_id: draft.category_id,
                condition: draft.condition,
                scan_token,
                notes: draft.notes,
            })
            .await?;

        tracing::info!(item_id = item.id, scan_token = %item.scan_token, "Item registered");
        Ok(item)
    }

    /// Partial update; the same uniqueness and category rules as creation apply
    pub async fn update_item(&self, id: i32, mut data: UpdateItem) -> AppResult<Item> {
        data.validate()?;
        self.repository.items.get_by_id(id).await?;

        if let Some(name) = data.name.take() {
            let name = non_blank(Some(name))
                .ok_or_else(|| AppError::Validation("Name cannot be empty".to_string()))?;
            data.name = Some(name);
        }
        if let Some(category_id) = data.category_id {
            self.ensure_category(category_id).await?;
        }
        data.serial_number = non_blank(data.serial_number);
        if let Some(serial) = &data.serial_number {
            if self
                .repository
                .items
                .serial_number_exists(serial, Some(id))
                .await?
            {
                return Err(AppError::Conflict(format!(
                    "Serial number '{}' already exists",
                    serial
                )));
            }
        }

        let item = self.repository.items.update(id, &data).await?;
        tracing::info!(item_id = item.id, "Item updated");
        Ok(item)
    }

    /// Soft-delete: the item and its loan history stay in place
    pub async fn deactivate_item(&self, id: i32) -> AppResult<Item> {
        let item = self.repository.items.set_active(id, false).await?;
        tracing::info!(item_id = item.id, "Item deactivated");
        Ok(item)
    }

    async fn ensure_category(&self, category_id: i32) -> AppResult<Category> {
        self.repository
            .categories
            .find_by_id(category_id)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!("Category with id {} does not exist", category_id))
            })
    }

    /// Draw tokens until one is unused. Deactivated items keep theirs.
    async fn allocate_scan_token(&self) -> AppResult<String> {
        for _ in 0..SCAN_TOKEN_ATTEMPTS {
            let candidate = generate_scan_token();
            if !self.repository.items.scan_token_exists(&candidate).await? {
                return Ok(candidate);
            }
            tracing::debug!(token = %candidate, "Scan token collision, drawing again");
        }
        Err(AppError::Internal(
            "Could not allocate a unique scan token".to_string(),
        ))
    }

    fn details(&self, (item, category, active_loan): (Item, Category, Option<LoanDetails>)) -> ItemDetails {
        let now = Utc::now();
        let scan_url = scan_url(&self.public_url, &item.scan_token);
        ItemDetails {
            is_available: active_loan.is_none(),
            active_loan: active_loan.map(|loan| loan.at(now)),
            category,
            scan_url,
            item,
        }
    }
}
