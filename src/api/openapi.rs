//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    categories, health, import, items, loans, members, notifications, packing_lists, reports,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Quartermaster API",
        version = "0.4.0",
        description = "Equipment lending ledger REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Categories
        categories::list_categories,
        categories::create_category,
        // Items
        items::list_items,
        items::get_item,
        items::get_item_by_scan_token,
        items::create_item,
        items::update_item,
        items::deactivate_item,
        items::list_item_loans,
        // Members
        members::list_members,
        members::get_member,
        members::create_member,
        members::deactivate_member,
        members::list_member_loans,
        // Loans
        loans::list_loans,
        loans::get_loan,
        loans::checkout,
        loans::check_in,
        // Import
        import::import_items,
        import::import_items_csv,
        import::import_members,
        import::import_members_csv,
        // Reports
        reports::export,
        reports::dashboard,
        // Notifications
        notifications::scan_overdue,
        // Packing lists
        packing_lists::list_packing_lists,
        packing_lists::get_packing_list,
        packing_lists::create_packing_list,
        packing_lists::update_packing_list,
        packing_lists::delete_packing_list,
        packing_lists::add_entry,
        packing_lists::update_entry,
        packing_lists::remove_entry,
    ),
    components(
        schemas(
            // Enums
            crate::models::enums::Condition,
            crate::models::enums::MemberRole,
            // Categories
            crate::models::category::Category,
            crate::models::category::CategoryWithCount,
            crate::models::category::CreateCategory,
            // Items
            crate::models::item::Item,
            crate::models::item::ItemSummary,
            crate::models::item::ItemDetails,
            crate::models::item::CreateItem,
            crate::models::item::UpdateItem,
            // Members
            crate::models::member::Member,
            crate::models::member::MemberWithLoans,
            crate::models::member::CreateMember,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanFilter,
            crate::models::loan::CreateLoan,
            crate::models::loan::CloseLoan,
            // Import
            crate::models::import_report::ImportKind,
            crate::models::import_report::ItemImportReport,
            crate::models::import_report::MemberImportReport,
            import::CsvUpload,
            // Reports
            crate::models::report::ExportKind,
            crate::models::report::DashboardStats,
            crate::services::overdue::ScanSummary,
            // Packing lists
            crate::models::packing_list::PackingList,
            crate::models::packing_list::PackingListSummary,
            crate::models::packing_list::PackingListEntry,
            crate::models::packing_list::PackingListDetails,
            crate::models::packing_list::CreatePackingList,
            crate::models::packing_list::UpdatePackingList,
            crate::models::packing_list::AddPackingListEntry,
            crate::models::packing_list::UpdatePackingListEntry,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "categories", description = "Item categories"),
        (name = "items", description = "Item registry"),
        (name = "members", description = "Membership registry"),
        (name = "loans", description = "Checkout ledger"),
        (name = "import", description = "Bulk import of items and members"),
        (name = "reports", description = "CSV exports and dashboard"),
        (name = "notifications", description = "Overdue notices"),
        (name = "packing-lists", description = "Outing packing lists")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
