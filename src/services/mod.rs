//! Business logic services

pub mod catalog;
pub mod email;
pub mod import;
pub mod loans;
pub mod members;
pub mod overdue;
pub mod packing_lists;
pub mod reports;

use std::sync::Arc;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub loans: loans::LoansService,
    pub import: import::ImportService,
    pub overdue: overdue::OverdueService,
    pub reports: reports::ReportsService,
    pub packing_lists: packing_lists::PackingListsService,
    pub email: email::EmailService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let catalog =
            catalog::CatalogService::new(repository.clone(), config.server.public_url.clone());
        let members = members::MembersService::new(repository.clone());
        let email = email::EmailService::new(config.email.clone());

        Self {
            import: import::ImportService::new(
                import::Registries::new(catalog.clone(), members.clone()),
                config.import.max_rows,
            ),
            overdue: overdue::OverdueService::new(repository.clone(), Arc::new(email.clone())),
            loans: loans::LoansService::new(repository.clone()),
            reports: reports::ReportsService::new(repository.clone()),
            packing_lists: packing_lists::PackingListsService::new(repository.clone()),
            repository,
            catalog,
            members,
            email,
        }
    }
}
