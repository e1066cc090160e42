//! Database facade used by the routine loader.
//!
//! The [`RoutineDatabase`] trait lists every operation the loader performs
//! against the database, so the pipeline can run against MySQL or against
//! the in-memory implementation in [`memory`].
//!
//! Implementations share one session: `set_sql_mode` and
//! `set_character_set` must affect the statements executed afterwards.

pub mod memory;

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{CatalogParameter, CatalogRoutineInfo, RoutineKind, SchemaColumn, TableColumn};

/// A result row: column name → textual value (`None` for SQL `NULL`).
pub type Row = BTreeMap<String, Option<String>>;

/// Abstract database backend for loading stored routines.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`execute`](RoutineDatabase::execute) | Run a statement (DDL included) |
/// | [`fetch_rows`](RoutineDatabase::fetch_rows) | Run a query, return all rows |
/// | [`fetch_row`](RoutineDatabase::fetch_row) | Run a query returning at most one row |
/// | [`table_exists`](RoutineDatabase::table_exists) | Is there a non-temporary table with this name |
/// | [`describe_table`](RoutineDatabase::describe_table) | Columns of a (temporary) table |
/// | [`routine_parameters`](RoutineDatabase::routine_parameters) | Declared parameters of a routine |
/// | [`routine_info`](RoutineDatabase::routine_info) | Catalog entry of a routine |
/// | [`schema_column_types`](RoutineDatabase::schema_column_types) | All table columns of the schema |
/// | [`drop_routine`](RoutineDatabase::drop_routine) | Drop a routine if it exists |
/// | [`drop_temporary_table`](RoutineDatabase::drop_temporary_table) | Drop a temporary table |
/// | [`call_routine`](RoutineDatabase::call_routine) | Call a procedure without arguments |
/// | [`escape_string`](RoutineDatabase::escape_string) | Escape a value for a string literal |
#[async_trait]
pub trait RoutineDatabase: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<()>;

    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>>;

    async fn fetch_row(&self, sql: &str) -> Result<Option<Row>> {
        let mut rows = self.fetch_rows(sql).await?;
        if rows.len() > 1 {
            bail!("Expected at most one row, got {}", rows.len());
        }
        Ok(rows.pop())
    }

    /// Whether a non-temporary table `table` exists in the current schema.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    async fn describe_table(&self, table: &str) -> Result<Vec<TableColumn>>;

    /// Parameters of `routine` in declaration order.
    async fn routine_parameters(&self, routine: &str) -> Result<Vec<CatalogParameter>>;

    async fn routine_info(&self, routine: &str) -> Result<Option<CatalogRoutineInfo>>;

    async fn schema_column_types(&self) -> Result<Vec<SchemaColumn>>;

    async fn drop_routine(&self, kind: RoutineKind, routine: &str) -> Result<()> {
        self.execute(&format!("drop {} if exists {}", kind, quote_identifier(routine)))
            .await
    }

    async fn drop_temporary_table(&self, table: &str) -> Result<()> {
        self.execute(&format!("drop temporary table {}", quote_identifier(table)))
            .await
    }

    async fn call_routine(&self, routine: &str) -> Result<()> {
        self.execute(&format!("call {}()", quote_identifier(routine)))
            .await
    }

    async fn set_sql_mode(&self, sql_mode: &str) -> Result<()> {
        self.execute(&format!("set sql_mode = '{}'", self.escape_string(sql_mode)))
            .await
    }

    async fn set_character_set(&self, character_set: &str, collation: &str) -> Result<()> {
        self.execute(&format!(
            "set names '{}' collate '{}'",
            self.escape_string(character_set),
            self.escape_string(collation)
        ))
        .await
    }

    fn escape_string(&self, value: &str) -> String {
        escape_string(value)
    }
}

/// Escapes `value` for use inside a single-quoted MySQL string literal.
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            _ => out.push(ch),
        }
    }
    out
}

/// Quotes an identifier with backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("/srv/it's"), "/srv/it\\'s");
        assert_eq!(escape_string("C:\\psql"), "C:\\\\psql");
        assert_eq!(escape_string("a\nb"), "a\\nb");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("abc_get"), "`abc_get`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }
}
