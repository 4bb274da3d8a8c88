use rusqlite::Connection;

use crate::errors::HvcError;

pub const DB_CIRCLE_NAME: &str = "t_circle";
pub const DB_WORK_NAME: &str = "t_work";
pub const DB_TAG_NAME: &str = "t_tag";
pub const DB_VA_NAME: &str = "t_va";
pub const DB_TAG_WORK_NAME: &str = "r_tag_work";
pub const DB_VA_WORK_NAME: &str = "r_va_work";
pub const DB_USER_NAME: &str = "t_user";
pub const DB_REVIEW_NAME: &str = "t_review";
pub const DB_HISTORY_NAME: &str = "t_history";
pub const DB_SERIES_NAME: &str = "t_series";
pub const DB_MIGRATION_NAME: &str = "t_migration";

macro_rules! column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            #[allow(unused_mut)]
            let mut column = ColumnDef {
                name: $name,
                sql_type: $sql_type,
                non_null: false,
                default_value: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Text,
    Float,
    Boolean,
    Timestamp,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Text => "TEXT",
            SqlType::Float => "FLOAT",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Timestamp => "TIMESTAMP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Removing the parent prunes the child rows.
    Cascade,
    /// Removing a referenced parent fails.
    Restrict,
}

impl DeletePolicy {
    pub fn as_sql(&self) -> &'static str {
        match self {
            DeletePolicy::Cascade => "CASCADE",
            DeletePolicy::Restrict => "RESTRICT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub non_null: bool,
    pub default_value: Option<&'static str>,
}

impl ColumnDef {
    fn definition(&self) -> String {
        let mut sql = format!("\"{}\" {}", self.name, self.sql_type.as_sql());
        if self.non_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default_value) = self.default_value {
            sql.push_str(&format!(" DEFAULT {default_value}"));
        }
        sql
    }

    /// `ALTER TABLE` statement adding this column to `table`.
    pub fn add_column_sql(&self, table: &str) -> String {
        format!("ALTER TABLE {table} ADD COLUMN {}", self.definition())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub column: &'static str,
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
    pub on_delete: DeletePolicy,
    pub on_update_cascade: bool,
}

#[derive(Debug)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub primary_key: &'static [&'static str],
    pub foreign_keys: &'static [ForeignKey],
    pub unique_constraints: &'static [&'static [&'static str]],
    pub indices: &'static [(&'static str, &'static [&'static str])],
}

impl Table {
    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(|c| c.definition()).collect();

        if !self.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        for unique in self.unique_constraints {
            parts.push(format!("UNIQUE ({})", unique.join(", ")));
        }
        for fk in self.foreign_keys {
            let mut clause = format!(
                "FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {}",
                fk.column,
                fk.foreign_table,
                fk.foreign_column,
                fk.on_delete.as_sql()
            );
            if fk.on_update_cascade {
                clause.push_str(" ON UPDATE CASCADE");
            }
            parts.push(clause);
        }

        format!("CREATE TABLE {} ({})", self.name, parts.join(", "))
    }

    pub fn index_sql(&self) -> Vec<String> {
        self.indices
            .iter()
            .map(|(index_name, columns)| {
                format!("CREATE INDEX {index_name} ON {}({})", self.name, columns.join(", "))
            })
            .collect()
    }

    /// Creates the table and its indices. An existing table surfaces as
    /// `HvcError::AlreadyExists`.
    pub fn create(&self, conn: &Connection) -> Result<(), HvcError> {
        conn.execute(&self.create_sql(), [])?;
        for sql in self.index_sql() {
            conn.execute(&sql, [])?;
        }
        Ok(())
    }

    pub fn delete_policy_for(&self, column: &str) -> Option<DeletePolicy> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.column == column)
            .map(|fk| fk.on_delete)
    }
}

pub const CIRCLE_TABLE: Table = Table {
    name: DB_CIRCLE_NAME,
    columns: &[
        column!("id", SqlType::Integer),
        column!("name", SqlType::Text, non_null = true),
    ],
    primary_key: &["id"],
    foreign_keys: &[],
    unique_constraints: &[],
    indices: &[],
};

pub const WORK_TABLE: Table = Table {
    name: DB_WORK_NAME,
    columns: &[
        column!("id", SqlType::Integer),
        column!("root_folder", SqlType::Text, non_null = true),
        column!("dir", SqlType::Text, non_null = true),
        column!("title", SqlType::Text, non_null = true),
        column!("circle_id", SqlType::Integer, non_null = true),
        column!("nsfw", SqlType::Boolean),
        column!("release", SqlType::Text), // YYYY-MM-DD
        column!("dl_count", SqlType::Integer),
        column!("price", SqlType::Integer),
        column!("review_count", SqlType::Integer),
        column!("rate_count", SqlType::Integer),
        column!("rate_average_2dp", SqlType::Float),
        column!("rate_count_detail", SqlType::Text), // JSON
        column!("rank", SqlType::Text),              // JSON
    ],
    primary_key: &["id"],
    foreign_keys: &[ForeignKey {
        column: "circle_id",
        foreign_table: DB_CIRCLE_NAME,
        foreign_column: "id",
        on_delete: DeletePolicy::Restrict,
        on_update_cascade: false,
    }],
    unique_constraints: &[],
    indices: &[(
        "t_work_index",
        &["circle_id", "release", "dl_count", "review_count", "price", "rate_average_2dp"],
    )],
};

pub const TAG_TABLE: Table = Table {
    name: DB_TAG_NAME,
    columns: &[
        column!("id", SqlType::Integer),
        column!("name", SqlType::Text, non_null = true),
    ],
    primary_key: &["id"],
    foreign_keys: &[],
    unique_constraints: &[],
    indices: &[],
};

pub const VA_TABLE: Table = Table {
    name: DB_VA_NAME,
    columns: &[
        column!("id", SqlType::Text), // UUID v5 of the name
        column!("name", SqlType::Text, non_null = true),
    ],
    primary_key: &["id"],
    foreign_keys: &[],
    unique_constraints: &[],
    indices: &[],
};

pub const TAG_WORK_TABLE: Table = Table {
    name: DB_TAG_WORK_NAME,
    columns: &[
        column!("tag_id", SqlType::Integer),
        column!("work_id", SqlType::Integer),
    ],
    primary_key: &["tag_id", "work_id"],
    foreign_keys: &[
        ForeignKey {
            column: "tag_id",
            foreign_table: DB_TAG_NAME,
            foreign_column: "id",
            on_delete: DeletePolicy::Restrict,
            on_update_cascade: false,
        },
        ForeignKey {
            column: "work_id",
            foreign_table: DB_WORK_NAME,
            foreign_column: "id",
            on_delete: DeletePolicy::Restrict,
            on_update_cascade: false,
        },
    ],
    unique_constraints: &[],
    indices: &[],
};

pub const VA_WORK_TABLE: Table = Table {
    name: DB_VA_WORK_NAME,
    columns: &[
        column!("va_id", SqlType::Text),
        column!("work_id", SqlType::Integer),
    ],
    primary_key: &["va_id", "work_id"],
    foreign_keys: &[
        ForeignKey {
            column: "va_id",
            foreign_table: DB_VA_NAME,
            foreign_column: "id",
            on_delete: DeletePolicy::Cascade,
            on_update_cascade: true,
        },
        ForeignKey {
            column: "work_id",
            foreign_table: DB_WORK_NAME,
            foreign_column: "id",
            on_delete: DeletePolicy::Cascade,
            on_update_cascade: true,
        },
    ],
    unique_constraints: &[],
    indices: &[],
};

pub const USER_TABLE: Table = Table {
    name: DB_USER_NAME,
    columns: &[
        column!("name", SqlType::Text, non_null = true),
        column!("password", SqlType::Text, non_null = true),
        column!("group", SqlType::Text, non_null = true), // user, admin, guest
    ],
    primary_key: &["name"],
    foreign_keys: &[],
    unique_constraints: &[],
    indices: &[],
};

pub const REVIEW_TABLE: Table = Table {
    name: DB_REVIEW_NAME,
    columns: &[
        column!("user_name", SqlType::Text, non_null = true),
        column!("work_id", SqlType::Integer, non_null = true),
        column!("rating", SqlType::Integer), // 1-5
        column!("review_text", SqlType::Text),
        column!("created_at", SqlType::Timestamp, non_null = true, default_value = Some("CURRENT_TIMESTAMP")),
        column!("updated_at", SqlType::Timestamp, non_null = true, default_value = Some("CURRENT_TIMESTAMP")),
        column!("progress", SqlType::Text),
    ],
    primary_key: &["user_name", "work_id"],
    foreign_keys: &[
        ForeignKey {
            column: "user_name",
            foreign_table: DB_USER_NAME,
            foreign_column: "name",
            on_delete: DeletePolicy::Cascade,
            on_update_cascade: false,
        },
        ForeignKey {
            column: "work_id",
            foreign_table: DB_WORK_NAME,
            foreign_column: "id",
            on_delete: DeletePolicy::Cascade,
            on_update_cascade: false,
        },
    ],
    unique_constraints: &[],
    indices: &[],
};

pub const HISTORY_TABLE: Table = Table {
    name: DB_HISTORY_NAME,
    columns: &[
        column!("id", SqlType::Integer),
        column!("user_name", SqlType::Text, non_null = true),
        column!("work_id", SqlType::Integer, non_null = true),
        column!("file_index", SqlType::Integer, non_null = true),
        column!("file_name", SqlType::Text),
        column!("play_time", SqlType::Integer),  // seconds
        column!("total_time", SqlType::Integer), // seconds
        column!("created_at", SqlType::Timestamp, non_null = true, default_value = Some("CURRENT_TIMESTAMP")),
        column!("updated_at", SqlType::Timestamp, non_null = true, default_value = Some("CURRENT_TIMESTAMP")),
    ],
    primary_key: &["id"],
    foreign_keys: &[
        ForeignKey {
            column: "user_name",
            foreign_table: DB_USER_NAME,
            foreign_column: "name",
            on_delete: DeletePolicy::Cascade,
            on_update_cascade: false,
        },
        ForeignKey {
            column: "work_id",
            foreign_table: DB_WORK_NAME,
            foreign_column: "id",
            on_delete: DeletePolicy::Cascade,
            on_update_cascade: false,
        },
    ],
    unique_constraints: &[&["user_name", "work_id", "file_index"]],
    indices: &[],
};

pub const SERIES_TABLE: Table = Table {
    name: DB_SERIES_NAME,
    columns: &[
        column!("id", SqlType::Integer),
        column!("name", SqlType::Text),
    ],
    primary_key: &["id"],
    foreign_keys: &[],
    unique_constraints: &[],
    indices: &[],
};

// Append-only record of applied migration steps
pub const MIGRATION_TABLE: Table = Table {
    name: DB_MIGRATION_NAME,
    columns: &[
        column!("step", SqlType::Text, non_null = true),
        column!("db_version", SqlType::Text, non_null = true),
        column!("applied_at", SqlType::Timestamp, non_null = true, default_value = Some("(datetime('now'))")),
    ],
    primary_key: &["step"],
    foreign_keys: &[],
    unique_constraints: &[],
    indices: &[],
};

/// Tables created by the initial schema step, parents before children.
pub const BASE_TABLES: &[&Table] = &[
    &CIRCLE_TABLE,
    &WORK_TABLE,
    &TAG_TABLE,
    &VA_TABLE,
    &TAG_WORK_TABLE,
    &VA_WORK_TABLE,
    &USER_TABLE,
    &REVIEW_TABLE,
];

// Columns added to t_work after the initial schema
pub const WORK_INSERT_TIME_COLUMN: ColumnDef =
    column!("insert_time", SqlType::Timestamp, default_value = Some("NULL"));
pub const WORK_SERIES_ID_COLUMN: ColumnDef =
    column!("series_id", SqlType::Integer, default_value = Some("NULL"));
