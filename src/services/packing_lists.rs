//! Packing lists service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::packing_list::{
        AddPackingListEntry, CreatePackingList, PackingList, PackingListDetails, PackingListEntry,
        PackingListSummary, UpdatePackingList, UpdatePackingListEntry,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct PackingListsService {
    repository: Repository,
}

impl PackingListsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<PackingListSummary>> {
        self.repository.packing_lists.list().await
    }

    pub async fn get(&self, id: i32) -> AppResult<PackingListDetails> {
        let list = self.repository.packing_lists.get_by_id(id).await?;
        let entries = self.repository.packing_lists.entries(id).await?;
        Ok(PackingListDetails { list, entries })
    }

    pub async fn create(&self, data: CreatePackingList) -> AppResult<PackingList> {
        data.validate()?;
        if data.name.trim().is_empty() {
            return Err(AppError::Validation("Name is required".to_string()));
        }
        let list = self.repository.packing_lists.create(&data).await?;
        tracing::info!(packing_list_id = list.id, "Packing list created");
        Ok(list)
    }

    pub async fn update(&self, id: i32, data: UpdatePackingList) -> AppResult<PackingList> {
        data.validate()?;
        if data.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::Validation("Name cannot be empty".to_string()));
        }
        self.repository.packing_lists.update(id, &data).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.packing_lists.delete(id).await?;
        tracing::info!(packing_list_id = id, "Packing list deleted");
        Ok(())
    }

    /// Add an item to a list; the list and the item must both exist
    pub async fn add_entry(&self, list_id: i32, data: AddPackingListEntry) -> AppResult<PackingListEntry> {
        data.validate()?;
        self.repository.packing_lists.get_by_id(list_id).await?;
        self.repository.items.get_by_id(data.item_id).await?;
        self.repository.packing_lists.add_entry(list_id, &data).await
    }

    pub async fn update_entry(
        &self,
        list_id: i32,
        entry_id: i32,
        data: UpdatePackingListEntry,
    ) -> AppResult<PackingListEntry> {
        data.validate()?;
        self.repository
            .packing_lists
            .update_entry(list_id, entry_id, &data)
            .await
    }

    pub async fn remove_entry(&self, list_id: i32, entry_id: i32) -> AppResult<()> {
        self.repository
            .packing_lists
            .remove_entry(list_id, entry_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    /// Never connects: every case below fails before the first query
    fn service() -> PackingListsService {
        let pool = PgPool::connect_lazy("postgres://localhost/quartermaster").unwrap();
        PackingListsService::new(Repository::new(pool))
    }

    #[tokio::test]
    async fn test_zero_quantity_entry_is_a_validation_error() {
        let err = service()
            .add_entry(
                1,
                AddPackingListEntry {
                    item_id: 1,
                    quantity: Some(0),
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service()
            .update_entry(
                1,
                1,
                UpdatePackingListEntry {
                    quantity: Some(0),
                    ..UpdatePackingListEntry::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_blank_list_name_is_rejected() {
        let err = service()
            .create(CreatePackingList {
                name: "   ".to_string(),
                description: None,
                outing_date: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
