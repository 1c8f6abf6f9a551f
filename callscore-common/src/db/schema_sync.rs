//! Declarative schema synchronization
//!
//! Tables are created with `CREATE TABLE IF NOT EXISTS`, which never touches
//! a table that already exists. Databases created by older builds therefore
//! lack columns added later (`analysis_intent`, `original_call_id`,
//! `call_date`, ...). This module compares the expected column list of a
//! table with `PRAGMA table_info` and adds what is missing.
//!
//! Only additive changes are applied. Type or constraint differences are
//! logged and left for a manual migration.

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

/// Column definition with the constraints `ALTER TABLE ADD COLUMN` can express
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub sql_type: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            default_value: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Column as reported by `PRAGMA table_info`
#[derive(Debug, Clone)]
pub struct ActualColumn {
    pub cid: i64,
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub pk: bool,
}

/// Difference between expected and actual schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDrift {
    /// Column missing from database (auto-fixable)
    MissingColumn { table: String, column: ColumnDefinition },
    /// Column type differs (manual migration required)
    TypeMismatch { table: String, column: String, expected: String, actual: String },
}

/// Expected schema for one table
pub trait TableSchema {
    fn table_name() -> &'static str;

    fn expected_columns() -> Vec<ColumnDefinition>;
}

/// Read the actual columns of `table_name`, ordered by position
pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
    let query = format!("PRAGMA table_info({})", table_name);
    let rows = sqlx::query(&query).fetch_all(pool).await?;

    let mut columns: Vec<ActualColumn> = rows
        .iter()
        .map(|row| ActualColumn {
            cid: row.get("cid"),
            name: row.get("name"),
            type_name: row.get("type"),
            not_null: row.get::<i64, _>("notnull") != 0,
            pk: row.get::<i64, _>("pk") != 0,
        })
        .collect();
    columns.sort_by_key(|c| c.cid);

    Ok(columns)
}

pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
    )
    .bind(table_name)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Compare expected and actual columns
pub fn compare(table_name: &str, expected: &[ColumnDefinition], actual: &[ActualColumn]) -> Vec<SchemaDrift> {
    let mut drift = Vec::new();

    for column in expected {
        match actual.iter().find(|c| c.name.eq_ignore_ascii_case(&column.name)) {
            Some(found) if !types_compatible(&column.sql_type, &found.type_name) => {
                drift.push(SchemaDrift::TypeMismatch {
                    table: table_name.to_string(),
                    column: column.name.clone(),
                    expected: column.sql_type.clone(),
                    actual: found.type_name.clone(),
                });
            }
            Some(_) => {}
            None => drift.push(SchemaDrift::MissingColumn {
                table: table_name.to_string(),
                column: column.clone(),
            }),
        }
    }

    drift
}

/// SQLite type affinity comparison
fn types_compatible(expected: &str, actual: &str) -> bool {
    let affinity = |t: &str| {
        let t = t.to_uppercase();
        if t.contains("INT") {
            "INTEGER"
        } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
            "TEXT"
        } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
            "REAL"
        } else if t.is_empty() || t.contains("BLOB") {
            "BLOB"
        } else {
            "NUMERIC"
        }
    };
    affinity(expected) == affinity(actual)
}

/// Detect drift for `T` and add every missing column.
///
/// Returns the number of columns added.
pub async fn sync_table<T: TableSchema>(pool: &SqlitePool) -> Result<usize> {
    let table_name = T::table_name();

    if !table_exists(pool, table_name).await? {
        warn!("Schema sync: table '{}' does not exist, skipping", table_name);
        return Ok(0);
    }

    let actual = introspect_table(pool, table_name).await?;
    let drift = compare(table_name, &T::expected_columns(), &actual);

    let mut added = 0;
    for change in drift {
        match change {
            SchemaDrift::MissingColumn { table, column } => {
                add_column(pool, &table, &column).await?;
                added += 1;
            }
            SchemaDrift::TypeMismatch { table, column, expected, actual } => {
                warn!(
                    "Type mismatch in {}.{}: expected '{}', found '{}'. Manual migration required.",
                    table, column, expected, actual
                );
            }
        }
    }

    if added == 0 {
        tracing::debug!("Schema up to date for '{}'", table_name);
    }

    Ok(added)
}

async fn add_column(pool: &SqlitePool, table: &str, column: &ColumnDefinition) -> Result<()> {
    let mut sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column.name, column.sql_type);

    if column.primary_key {
        warn!(
            "Cannot add PRIMARY KEY column {}.{} via ALTER TABLE; adding it without the constraint",
            table, column.name
        );
    }

    match (&column.default_value, column.not_null) {
        (Some(default), true) => sql.push_str(&format!(" NOT NULL DEFAULT {}", default)),
        (Some(default), false) => sql.push_str(&format!(" DEFAULT {}", default)),
        (None, true) => warn!(
            "Cannot add NOT NULL column {}.{} without DEFAULT; adding it as nullable",
            table, column.name
        ),
        (None, false) => {}
    }

    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => {
            info!("Added column {}.{} ({})", table, column.name, column.sql_type);
            Ok(())
        }
        // Another connection added it first
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actual(name: &str, type_name: &str) -> ActualColumn {
        ActualColumn {
            cid: 0,
            name: name.to_string(),
            type_name: type_name.to_string(),
            not_null: false,
            pk: false,
        }
    }

    #[test]
    fn test_compare_reports_missing_column() {
        let expected = vec![
            ColumnDefinition::new("id", "TEXT").primary_key(),
            ColumnDefinition::new("analysis_intent", "TEXT"),
        ];
        let drift = compare("calls", &expected, &[actual("id", "TEXT")]);
        assert_eq!(drift.len(), 1);
        assert!(matches!(
            &drift[0],
            SchemaDrift::MissingColumn { column, .. } if column.name == "analysis_intent"
        ));
    }

    #[test]
    fn test_compare_uses_type_affinity() {
        let expected = vec![
            ColumnDefinition::new("qualified", "INTEGER"),
            ColumnDefinition::new("cash_collected", "REAL"),
        ];
        let found = vec![actual("qualified", "BOOLEAN INT"), actual("cash_collected", "DOUBLE")];
        assert!(compare("calls", &expected, &found).is_empty());

        let wrong = vec![actual("qualified", "TEXT"), actual("cash_collected", "REAL")];
        assert!(matches!(
            compare("calls", &expected, &wrong)[0],
            SchemaDrift::TypeMismatch { .. }
        ));
    }
}
