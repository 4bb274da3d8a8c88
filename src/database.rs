use rusqlite::Connection;
use tracing::info;

use crate::{database::migration::migrate, errors::HvcError, version::{check_compatible, current_version}};

pub mod catalog;
pub mod catalog_view;
pub mod db_loader;
pub mod introspect;
pub mod migration;
pub mod queries;
pub mod tables;
pub mod types;

/// Startup entry point: refuses databases from a newer build (when asked to),
/// then migrates to the current schema.
pub fn init(conn: &Connection, check_version: bool) -> Result<(), HvcError> {
    if check_version {
        check_compatible(conn)?;
    }
    migrate(conn)?;
    info!("Database schema is at version {}", current_version());
    Ok(())
}
