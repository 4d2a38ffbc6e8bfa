//! API handlers for Quartermaster REST endpoints

pub mod categories;
pub mod health;
pub mod import;
pub mod items;
pub mod loans;
pub mod members;
pub mod notifications;
pub mod openapi;
pub mod packing_lists;
pub mod reports;
