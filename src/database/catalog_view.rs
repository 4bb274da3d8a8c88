//! Definition of the `staticMetadata` view.
//!
//! The view flattens a work, its circle and optional series into one row, then
//! folds the work's voice actors and tags into two JSON collections:
//!
//! 1. base projection: `t_work` joined to `t_circle` (inner) and `t_series` (outer)
//! 2. voice actors: inner join through `r_va_work`, grouped by work id, so works
//!    without any voice actor are not part of the view
//! 3. tags: outer join through `r_tag_work`, grouped by work id, so works without
//!    tags stay with an empty `tags` array
//!
//! Only the base column list changes between schema generations. The SQL text
//! is derived from a [`ViewProjection`], never written by hand per migration.

use rusqlite::{params, Connection};
use tracing::debug;

use crate::database::introspect::{column_exists, table_columns, table_exists};
use crate::database::tables::*;
use crate::errors::HvcError;

pub const CATALOG_VIEW_NAME: &str = "staticMetadata";

// Work columns the view never exposes as scalars (or emits itself up front)
const HIDDEN_WORK_COLUMNS: &[&str] = &["id", "title", "circle_id", "root_folder", "dir"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewProjection {
    /// Scalar `t_work` columns carried after `id`, `title` and `circle_id`.
    pub work_columns: Vec<String>,
    /// `t_series` exists and can be joined.
    pub has_series_table: bool,
}

impl ViewProjection {
    /// Reads the column set from the live schema.
    pub fn introspect(conn: &Connection) -> Result<Self, HvcError> {
        let work_columns = table_columns(conn, DB_WORK_NAME)?
            .into_iter()
            .filter(|c| !HIDDEN_WORK_COLUMNS.contains(&c.as_str()))
            .collect();
        Ok(Self {
            work_columns,
            has_series_table: table_exists(conn, DB_SERIES_NAME)?,
        })
    }

    fn has_series_id(&self) -> bool {
        self.work_columns.iter().any(|c| c == "series_id")
    }

    fn joins_series(&self) -> bool {
        self.has_series_table && self.has_series_id()
    }
}

fn base_projection_sql(projection: &ViewProjection) -> String {
    let series_id = if projection.has_series_id() { "t_work.series_id" } else { "NULL" };
    let series_name = if projection.joins_series() { "t_series.name" } else { "NULL" };

    let mut select = vec![
        "t_work.id".to_string(),
        "t_work.title".to_string(),
        "t_work.circle_id".to_string(),
        "t_circle.name".to_string(),
        format!("{series_name} AS series_name"),
        "json_object('id', t_work.circle_id, 'name', t_circle.name) AS circleObj".to_string(),
        format!("json_object('id', {series_id}, 'name', {series_name}) AS seriesObj"),
    ];
    select.extend(projection.work_columns.iter().map(|c| format!("t_work.\"{c}\"")));

    let mut sql = format!(
        "SELECT {}
        FROM {DB_WORK_NAME}
        JOIN {DB_CIRCLE_NAME} ON t_circle.id = t_work.circle_id",
        select.join(",\n          ")
    );
    if projection.joins_series() {
        sql.push_str(&format!(
            "\n        LEFT JOIN {DB_SERIES_NAME} ON t_series.id = t_work.series_id"
        ));
    }
    sql
}

/// Full `CREATE VIEW` statement for `projection`.
pub fn catalog_view_sql(projection: &ViewProjection) -> String {
    format!(
        "CREATE VIEW {CATALOG_VIEW_NAME} AS
    SELECT baseQueryWithVA.*,
      json_object('tags', json_group_array(json_object('id', t_tag.id, 'name', t_tag.name) ORDER BY t_tag.id)
        FILTER (WHERE t_tag.id IS NOT NULL)) AS tagObj
    FROM (
      SELECT baseQuery.*,
        json_object('vas', json_group_array(json_object('id', t_va.id, 'name', t_va.name) ORDER BY t_va.id)) AS vaObj
      FROM (
        {base}
      ) AS baseQuery
      JOIN {DB_VA_WORK_NAME} ON r_va_work.work_id = baseQuery.id
      JOIN {DB_VA_NAME} ON t_va.id = r_va_work.va_id
      GROUP BY baseQuery.id
    ) AS baseQueryWithVA
    LEFT JOIN {DB_TAG_WORK_NAME} ON r_tag_work.work_id = baseQueryWithVA.id
    LEFT JOIN {DB_TAG_NAME} ON t_tag.id = r_tag_work.tag_id
    GROUP BY baseQueryWithVA.id",
        base = base_projection_sql(projection)
    )
}

/// Drops the current view (if any) and recreates it for `projection`.
pub fn redefine_catalog_view(conn: &Connection, projection: &ViewProjection) -> Result<(), HvcError> {
    debug!(
        "Redefining {CATALOG_VIEW_NAME} with columns [{}], series join: {}",
        projection.work_columns.join(", "),
        projection.has_series_table
    );
    conn.execute(&format!("DROP VIEW IF EXISTS {CATALOG_VIEW_NAME}"), [])?;
    conn.execute(&catalog_view_sql(projection), [])?;
    Ok(())
}

/// Adds `column` to `table`, then rebuilds the view over the new column set.
pub fn add_column_and_refresh_view(
    conn: &Connection,
    table: &str,
    column: &ColumnDef,
) -> Result<(), HvcError> {
    if column_exists(conn, table, column.name)? {
        return Err(HvcError::AlreadyExists(format!("column {table}.{}", column.name)));
    }
    conn.execute(&column.add_column_sql(table), [])?;
    redefine_catalog_view(conn, &ViewProjection::introspect(conn)?)
}

/// Stored SQL of the view, if it exists.
pub fn catalog_view_definition(conn: &Connection) -> Result<Option<String>, HvcError> {
    let mut stmt = conn.prepare("SELECT sql FROM sqlite_master WHERE type = 'view' AND name = ?1")?;
    let mut rows = stmt.query(params![CATALOG_VIEW_NAME])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}
