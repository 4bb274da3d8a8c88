//! Schema migrations and the catalog view for the voice-work catalog database.

pub mod config;
pub mod database;
pub mod errors;
pub mod version;

pub use database::catalog::{get_catalog_work, list_catalog_works, CatalogFilter};
pub use database::migration::{
    ensure_history_table, ensure_insert_time_column, ensure_schema, ensure_series_id_column,
    ensure_series_table, migrate,
};
pub use errors::HvcError;
pub use version::current_version;
