use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::errors::HvcError;

pub fn open_db(path: &Path) -> Result<Connection, HvcError> {
    debug!("Opening database {}", path.display());
    let conn = Connection::open(path)?;

    // SQLite disables foreign keys by default; cascades depend on them
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    Ok(conn)
}
