use std::fmt::Display;

use rusqlite::{params, Connection};
use tracing::{debug, error, info};

use crate::database::catalog_view::{add_column_and_refresh_view, redefine_catalog_view, ViewProjection};
use crate::database::introspect::{column_exists, table_exists};
use crate::database::tables::*;
use crate::errors::HvcError;
use crate::version::current_version;

/// Structure a step needs before it can run.
#[derive(Debug, Clone, Copy)]
pub enum Prerequisite {
    Table(&'static str),
    Column(&'static str, &'static str),
}

impl Prerequisite {
    fn is_met(&self, conn: &Connection) -> Result<bool, HvcError> {
        match self {
            Prerequisite::Table(table) => table_exists(conn, table),
            Prerequisite::Column(table, column) => column_exists(conn, table, column),
        }
    }
}

impl Display for Prerequisite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prerequisite::Table(table) => write!(f, "table {table}"),
            Prerequisite::Column(table, column) => write!(f, "column {table}.{column}"),
        }
    }
}

/// Structure whose presence means the step has already taken effect.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Table(&'a str),
    Column(&'a str, &'a str),
}

impl Target<'_> {
    fn exists(&self, conn: &Connection) -> Result<bool, HvcError> {
        match self {
            Target::Table(table) => table_exists(conn, table),
            Target::Column(table, column) => column_exists(conn, table, column),
        }
    }

    /// Whether an "already exists" message is about this target rather than
    /// some other object the step touches.
    fn named_in(&self, msg: &str) -> bool {
        let msg = msg.replace(['"', '\'', '`'], "");
        match self {
            Target::Table(table) => msg.contains(&format!("table {table} already exists")),
            Target::Column(_, column) => {
                (msg.starts_with("duplicate column name") && msg.trim_end().ends_with(&format!(" {column}")))
                    || msg.ends_with(&format!(".{column}"))
            }
        }
    }
}

impl Display for Target<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Table(table) => write!(f, "Table {table}"),
            Target::Column(table, column) => write!(f, "Column {table}.{column}"),
        }
    }
}

pub struct MigrationStep {
    pub id: &'static str,
    pub target: Target<'static>,
    pub prerequisites: &'static [Prerequisite],
    pub apply: fn(&Connection) -> Result<(), HvcError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    /// Target found in the live schema; the ledger now records it.
    AlreadyPresent,
    /// Ledger already had the step.
    AlreadyRecorded,
}

fn create_initial_schema(conn: &Connection) -> Result<(), HvcError> {
    for table in BASE_TABLES {
        table.create(conn)?;
    }
    redefine_catalog_view(conn, &ViewProjection::introspect(conn)?)
}

fn create_history_table(conn: &Connection) -> Result<(), HvcError> {
    HISTORY_TABLE.create(conn)
}

fn add_insert_time_to_work(conn: &Connection) -> Result<(), HvcError> {
    add_column_and_refresh_view(conn, DB_WORK_NAME, &WORK_INSERT_TIME_COLUMN)
}

fn add_series_id_to_work(conn: &Connection) -> Result<(), HvcError> {
    add_column_and_refresh_view(conn, DB_WORK_NAME, &WORK_SERIES_ID_COLUMN)
}

fn create_series_table(conn: &Connection) -> Result<(), HvcError> {
    SERIES_TABLE.create(conn)?;
    redefine_catalog_view(conn, &ViewProjection::introspect(conn)?)
}

pub const INITIAL_SCHEMA: MigrationStep = MigrationStep {
    id: "initial_schema",
    target: Target::Table(DB_CIRCLE_NAME),
    prerequisites: &[],
    apply: create_initial_schema,
};

pub const HISTORY_TABLE_STEP: MigrationStep = MigrationStep {
    id: "history_table",
    target: Target::Table(DB_HISTORY_NAME),
    prerequisites: &[Prerequisite::Table(DB_USER_NAME), Prerequisite::Table(DB_WORK_NAME)],
    apply: create_history_table,
};

pub const WORK_INSERT_TIME_STEP: MigrationStep = MigrationStep {
    id: "work_insert_time",
    target: Target::Column(DB_WORK_NAME, "insert_time"),
    prerequisites: &[Prerequisite::Table(DB_WORK_NAME)],
    apply: add_insert_time_to_work,
};

pub const WORK_SERIES_ID_STEP: MigrationStep = MigrationStep {
    id: "work_series_id",
    target: Target::Column(DB_WORK_NAME, "series_id"),
    prerequisites: &[Prerequisite::Table(DB_WORK_NAME)],
    apply: add_series_id_to_work,
};

pub const SERIES_TABLE_STEP: MigrationStep = MigrationStep {
    id: "series_table",
    target: Target::Table(DB_SERIES_NAME),
    prerequisites: &[Prerequisite::Column(DB_WORK_NAME, "series_id")],
    apply: create_series_table,
};

/// Every step in the order it was introduced. Later steps may rely on
/// structure created by earlier ones; the runner never reorders them.
pub const MIGRATIONS: &[&MigrationStep] = &[
    &INITIAL_SCHEMA,
    &HISTORY_TABLE_STEP,
    &WORK_INSERT_TIME_STEP,
    &WORK_SERIES_ID_STEP,
    &SERIES_TABLE_STEP,
];

/// Runs `apply` in a transaction. An "already exists" failure rolls the
/// transaction back; it counts as success only when it names `target` and
/// `target` is present once the rollback is done. Anything else is returned.
fn apply_guarded<F>(conn: &Connection, target: Target<'_>, apply: F) -> Result<StepOutcome, HvcError>
where
    F: FnOnce(&Connection) -> Result<(), HvcError>,
{
    let tx = conn.unchecked_transaction()?;
    match apply(&*tx) {
        Ok(()) => {
            tx.commit()?;
            Ok(StepOutcome::Applied)
        }
        Err(HvcError::AlreadyExists(msg)) => {
            tx.rollback()?;
            if target.named_in(&msg) && target.exists(conn)? {
                info!("{target} already exists ({msg}), keeping it");
                Ok(StepOutcome::AlreadyPresent)
            } else {
                error!("{target} could not be created: {msg}");
                Err(HvcError::AlreadyExists(msg))
            }
        }
        Err(e) => Err(e),
    }
}

/// Creates `table` through `create` unless it is already there.
pub fn ensure_optional_table<F>(conn: &Connection, table: &str, create: F) -> Result<StepOutcome, HvcError>
where
    F: FnOnce(&Connection) -> Result<(), HvcError>,
{
    if table_exists(conn, table)? {
        info!("Table {table} already exists");
        return Ok(StepOutcome::AlreadyPresent);
    }
    apply_guarded(conn, Target::Table(table), create)
}

/// Adds `table.column` through `add` unless it is already there. `add` is
/// expected to rebuild the catalog view after altering the table.
pub fn ensure_optional_column<F>(
    conn: &Connection,
    table: &str,
    column: &str,
    add: F,
) -> Result<StepOutcome, HvcError>
where
    F: FnOnce(&Connection) -> Result<(), HvcError>,
{
    if column_exists(conn, table, column)? {
        info!("Column {table}.{column} already exists");
        return Ok(StepOutcome::AlreadyPresent);
    }
    apply_guarded(conn, Target::Column(table, column), add)
}

fn ensure_ledger(conn: &Connection) -> Result<(), HvcError> {
    if !table_exists(conn, DB_MIGRATION_NAME)? {
        MIGRATION_TABLE.create(conn)?;
    }
    Ok(())
}

fn is_recorded(conn: &Connection, step: &str) -> Result<bool, HvcError> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {DB_MIGRATION_NAME} WHERE step = ?1"),
        params![step],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn record(conn: &Connection, step: &str) -> Result<(), HvcError> {
    conn.execute(
        &format!("INSERT OR IGNORE INTO {DB_MIGRATION_NAME} (step, db_version) VALUES (?1, ?2)"),
        params![step, current_version().as_str()],
    )?;
    Ok(())
}

fn apply_step(conn: &Connection, step: &MigrationStep) -> Result<(), HvcError> {
    for prerequisite in step.prerequisites {
        if !prerequisite.is_met(conn)? {
            return Err(HvcError::PrerequisiteMissing {
                step: step.id,
                missing: prerequisite.to_string(),
            });
        }
    }
    (step.apply)(conn)?;
    record(conn, step.id)
}

/// Brings one step into effect: skipped when the ledger has it, recorded
/// without changes when its target already exists, applied otherwise.
pub fn run_step(conn: &Connection, step: &MigrationStep) -> Result<StepOutcome, HvcError> {
    ensure_ledger(conn)?;
    if is_recorded(conn, step.id)? {
        debug!("Migration {} already applied", step.id);
        return Ok(StepOutcome::AlreadyRecorded);
    }

    let outcome = match step.target {
        Target::Table(table) => ensure_optional_table(conn, table, |tx| apply_step(tx, step))?,
        Target::Column(table, column) => {
            ensure_optional_column(conn, table, column, |tx| apply_step(tx, step))?
        }
    };

    match outcome {
        StepOutcome::Applied => info!("Applied migration {}", step.id),
        _ => record(conn, step.id)?,
    }
    Ok(outcome)
}

pub fn ensure_schema(conn: &Connection) -> Result<StepOutcome, HvcError> {
    run_step(conn, &INITIAL_SCHEMA)
}

pub fn ensure_history_table(conn: &Connection) -> Result<StepOutcome, HvcError> {
    run_step(conn, &HISTORY_TABLE_STEP)
}

pub fn ensure_insert_time_column(conn: &Connection) -> Result<StepOutcome, HvcError> {
    run_step(conn, &WORK_INSERT_TIME_STEP)
}

pub fn ensure_series_id_column(conn: &Connection) -> Result<StepOutcome, HvcError> {
    run_step(conn, &WORK_SERIES_ID_STEP)
}

pub fn ensure_series_table(conn: &Connection) -> Result<StepOutcome, HvcError> {
    run_step(conn, &SERIES_TABLE_STEP)
}

/// Migrates the database to the latest schema.
///
/// Must run once at startup before any other query traffic; two runners on the
/// same database at once are not supported. Safe to call on every start.
pub fn migrate(conn: &Connection) -> Result<(), HvcError> {
    for step in MIGRATIONS {
        run_step(conn, step)?;
    }
    Ok(())
}

/// Ledger rows as `(step, db_version, applied_at)` in application order.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<(String, String, String)>, HvcError> {
    if !table_exists(conn, DB_MIGRATION_NAME)? {
        return Ok(vec![]);
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT step, db_version, applied_at FROM {DB_MIGRATION_NAME} ORDER BY rowid"
    ))?;
    let rows: Vec<(String, String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
