use rusqlite::{params, Connection};

use crate::errors::HvcError;

fn object_exists(conn: &Connection, kind: &str, name: &str) -> Result<bool, HvcError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
        params![kind, name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, HvcError> {
    object_exists(conn, "table", table)
}

pub fn view_exists(conn: &Connection, view: &str) -> Result<bool, HvcError> {
    object_exists(conn, "view", view)
}

/// Column names of `table` in declaration order. Empty when the table is absent.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, HvcError> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns: Vec<String> = stmt
        .query_map(params![table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, HvcError> {
    Ok(table_columns(conn, table)?.iter().any(|c| c == column))
}

/// Every schema object as `(type, name, sql)`, sorted by name. Used to compare
/// two databases structurally.
pub fn schema_snapshot(conn: &Connection) -> Result<Vec<(String, String, Option<String>)>, HvcError> {
    let mut stmt = conn.prepare(
        "SELECT type, name, sql FROM sqlite_master
         WHERE name NOT LIKE 'sqlite_%'
         ORDER BY type, name",
    )?;
    let objects: Vec<(String, String, Option<String>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(objects)
}
