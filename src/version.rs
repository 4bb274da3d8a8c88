use std::fmt::Display;

use rusqlite::Connection;
use tracing::warn;

use crate::database::introspect::table_exists;
use crate::database::tables::DB_MIGRATION_NAME;
use crate::errors::HvcError;

/// Schema generation of this build.
pub const DB_VERSION: &str = "20210502081522";

/// Opaque token naming a schema generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaVersion(&'static str);

impl SchemaVersion {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn current_version() -> SchemaVersion {
    SchemaVersion(DB_VERSION)
}

/// Newest schema version found in the migration ledger, if any step was recorded.
pub fn recorded_version(conn: &Connection) -> Result<Option<String>, HvcError> {
    if !table_exists(conn, DB_MIGRATION_NAME)? {
        return Ok(None);
    }
    let version: Option<String> = conn.query_row(
        &format!("SELECT MAX(db_version) FROM {DB_MIGRATION_NAME}"),
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Refuses databases migrated by a newer build. Older or unversioned ones are
/// fine, the runner upgrades them.
pub fn check_compatible(conn: &Connection) -> Result<(), HvcError> {
    let binary = current_version();
    match recorded_version(conn)? {
        Some(database) if database.as_str() > binary.as_str() => {
            warn!("Database schema {database} is newer than {binary}");
            Err(HvcError::VersionMismatch {
                database,
                binary: binary.to_string(),
            })
        }
        _ => Ok(()),
    }
}
