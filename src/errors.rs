use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HvcError {
    /// Table, column or view targeted for creation is already there.
    #[error("Already exists : {0}")]
    AlreadyExists(String),

    #[error("Migration step '{step}' requires {missing}, which is absent")]
    PrerequisiteMissing { step: &'static str, missing: String },

    #[error("Constraint violation : {0}")]
    ConstraintViolation(String),

    #[error("SQLite error : {0}")]
    Sqlite(rusqlite::Error),

    #[error("Database was written by schema version {database}, this build knows {binary}")]
    VersionMismatch { database: String, binary: String },

    #[error("Unknown review progress : {0}")]
    UnknownProgress(String),

    #[error("Configuration error : {0}")]
    Config(String),

    #[error("IO error : {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error : {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operating System is not supported : {0}")]
    UnsupportedOS(String),

    #[error("Could not get env value : {0}")]
    UnavailableEnvVariable(String),

    #[error("Could not create path : {0}")]
    PathCreationFailed(String),
}

impl HvcError {
    /// Sorts an engine error into the migration taxonomy.
    ///
    /// Statement preparation failures (DDL on an existing table, duplicate
    /// columns) surface as `SqlInputError`; step failures as `SqliteFailure`.
    pub fn classify(err: rusqlite::Error) -> Self {
        let (code, msg) = match &err {
            rusqlite::Error::SqliteFailure(ffi, msg) => {
                (ffi.code, msg.clone().unwrap_or_else(|| ffi.to_string()))
            }
            rusqlite::Error::SqlInputError { error, msg, .. } => (error.code, msg.clone()),
            _ => return HvcError::Sqlite(err),
        };
        if code == ErrorCode::ConstraintViolation {
            return HvcError::ConstraintViolation(msg);
        }
        if msg.contains("already exists") || msg.starts_with("duplicate column name") {
            return HvcError::AlreadyExists(msg);
        }
        HvcError::Sqlite(err)
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, HvcError::AlreadyExists(_))
    }
}

impl From<rusqlite::Error> for HvcError {
    fn from(value: rusqlite::Error) -> Self {
        Self::classify(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_classify_already_exists() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE a (id INTEGER)", []).unwrap();
        let err: HvcError = conn.execute("CREATE TABLE a (id INTEGER)", []).unwrap_err().into();
        assert!(err.is_already_exists());

        let err: HvcError = conn
            .execute("ALTER TABLE a ADD COLUMN id INTEGER", [])
            .unwrap_err()
            .into();
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_classify_keeps_engine_message() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE a (id INTEGER)", []).unwrap();
        let err: HvcError = conn
            .execute("ALTER TABLE a ADD COLUMN id INTEGER", [])
            .unwrap_err()
            .into();
        match err {
            HvcError::AlreadyExists(msg) => assert!(msg.contains("duplicate column name")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_classify_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE a (id INTEGER PRIMARY KEY)", []).unwrap();
        conn.execute("INSERT INTO a VALUES (1)", []).unwrap();
        let err: HvcError = conn.execute("INSERT INTO a VALUES (1)", []).unwrap_err().into();
        assert!(matches!(err, HvcError::ConstraintViolation(_)));
    }

    #[test]
    fn test_classify_other_errors_stay_fatal() {
        let conn = Connection::open_in_memory().unwrap();
        let err: HvcError = conn.execute("SELECT * FROM missing", []).unwrap_err().into();
        assert!(matches!(err, HvcError::Sqlite(_)));
    }
}
