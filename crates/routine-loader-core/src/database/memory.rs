//! In-memory [`RoutineDatabase`] implementation for tests and dry runs.
//!
//! Behaves like a single MySQL session: executing a `CREATE PROCEDURE` or
//! `CREATE FUNCTION` statement registers the routine and stamps it with the
//! session's current SQL mode, character set and collation. Declared
//! parameters, tables and the temporary tables a procedure creates when
//! called are configured up front with the `with_*` builders.
//!
//! Every statement passed to [`execute`](RoutineDatabase::execute) is
//! recorded and can be inspected with [`InMemoryDatabase::statements`].

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{
    CatalogParameter, CatalogRoutineInfo, RoutineKind, SchemaColumn, TableColumn,
};
use crate::signature::find_signature;

use super::{Row, RoutineDatabase};

/// A routine created in the in-memory database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRoutine {
    pub kind: RoutineKind,
    pub source: String,
    pub sql_mode: String,
    pub character_set_client: String,
    pub collation_connection: String,
}

#[derive(Default)]
struct State {
    statements: Vec<String>,
    calls: Vec<String>,
    sql_mode: String,
    character_set: String,
    collation: String,
    routines: BTreeMap<String, StoredRoutine>,
    parameters: BTreeMap<String, Vec<CatalogParameter>>,
    tables: BTreeMap<String, Vec<TableColumn>>,
    temporary_tables: BTreeMap<String, Vec<TableColumn>>,
    temporary_on_call: BTreeMap<String, (String, Vec<TableColumn>)>,
    schema_columns: Vec<SchemaColumn>,
    canonical_sql_mode: Option<String>,
    failing: Vec<String>,
}

/// In-memory database for testing the loader without a MySQL server.
#[derive(Default)]
pub struct InMemoryDatabase {
    state: Mutex<State>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters the catalog reports for `routine` once it is created.
    pub fn with_routine_parameters(self, routine: &str, parameters: Vec<CatalogParameter>) -> Self {
        self.lock().parameters.insert(routine.to_string(), parameters);
        self
    }

    /// A permanent table.
    pub fn with_table(self, table: &str, columns: Vec<TableColumn>) -> Self {
        self.lock().tables.insert(table.to_string(), columns);
        self
    }

    /// Calling `routine` creates temporary table `table` with `columns`.
    pub fn with_temporary_table_on_call(
        self,
        routine: &str,
        table: &str,
        columns: Vec<TableColumn>,
    ) -> Self {
        self.lock()
            .temporary_on_call
            .insert(routine.to_string(), (table.to_string(), columns));
        self
    }

    pub fn with_schema_columns(self, columns: Vec<SchemaColumn>) -> Self {
        self.lock().schema_columns = columns;
        self
    }

    /// `set sql_mode` stores `mode` instead of the requested value, the way
    /// MySQL reorders and expands the modes it is given.
    pub fn with_canonical_sql_mode(self, mode: &str) -> Self {
        self.lock().canonical_sql_mode = Some(mode.to_string());
        self
    }

    /// A routine that already exists, created under the given session settings.
    pub fn with_routine(self, name: &str, routine: StoredRoutine) -> Self {
        self.lock().routines.insert(name.to_string(), routine);
        self
    }

    /// Statements containing `fragment` fail with a database error.
    pub fn with_failing_statement(self, fragment: &str) -> Self {
        self.lock().failing.push(fragment.to_string());
        self
    }

    /// All statements executed so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// Names of the routines called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn routine(&self, name: &str) -> Option<StoredRoutine> {
        self.lock().routines.get(name).cloned()
    }

    pub fn has_temporary_table(&self, table: &str) -> bool {
        self.lock().temporary_tables.contains_key(table)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl State {
    fn check_failure(&self, sql: &str) -> Result<()> {
        if let Some(fragment) = self.failing.iter().find(|f| sql.contains(f.as_str())) {
            bail!("Statement rejected by database (matched '{}'): {}", fragment, sql);
        }
        Ok(())
    }
}

#[async_trait]
impl RoutineDatabase for InMemoryDatabase {
    async fn execute(&self, sql: &str) -> Result<()> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());
        state.check_failure(sql)?;

        if let Some(signature) = find_signature(sql) {
            if state.routines.contains_key(&signature.name) {
                bail!(
                    "{} {} already exists",
                    signature.kind.as_str().to_uppercase(),
                    signature.name
                );
            }
            let routine = StoredRoutine {
                kind: signature.kind,
                source: sql.to_string(),
                sql_mode: state.sql_mode.clone(),
                character_set_client: state.character_set.clone(),
                collation_connection: state.collation.clone(),
            };
            state.routines.insert(signature.name, routine);
        }
        Ok(())
    }

    /// Answers `select @@sql_mode`; every other query returns no rows.
    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>> {
        let mut state = self.lock();
        state.statements.push(sql.to_string());
        state.check_failure(sql)?;
        if sql.contains("@@sql_mode") {
            let mut row = Row::new();
            row.insert("sql_mode".to_string(), Some(state.sql_mode.clone()));
            return Ok(vec![row]);
        }
        Ok(Vec::new())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.lock().tables.contains_key(table))
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<TableColumn>> {
        let mut state = self.lock();
        let sql = format!("show columns from {}", table);
        state.statements.push(sql.clone());
        state.check_failure(&sql)?;
        state
            .temporary_tables
            .get(table)
            .or_else(|| state.tables.get(table))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Table '{}' doesn't exist", table))
    }

    async fn routine_parameters(&self, routine: &str) -> Result<Vec<CatalogParameter>> {
        let state = self.lock();
        if !state.routines.contains_key(routine) {
            return Ok(Vec::new());
        }
        Ok(state.parameters.get(routine).cloned().unwrap_or_default())
    }

    async fn routine_info(&self, routine: &str) -> Result<Option<CatalogRoutineInfo>> {
        let state = self.lock();
        Ok(state.routines.get(routine).map(|r| CatalogRoutineInfo {
            routine_name: routine.to_string(),
            routine_kind: r.kind,
            sql_mode: r.sql_mode.clone(),
            character_set_client: r.character_set_client.clone(),
            collation_connection: r.collation_connection.clone(),
            parameters: state.parameters.get(routine).cloned().unwrap_or_default(),
        }))
    }

    async fn schema_column_types(&self) -> Result<Vec<SchemaColumn>> {
        Ok(self.lock().schema_columns.clone())
    }

    async fn drop_routine(&self, kind: RoutineKind, routine: &str) -> Result<()> {
        let mut state = self.lock();
        let sql = format!("drop {} if exists {}", kind, routine);
        state.statements.push(sql.clone());
        state.check_failure(&sql)?;
        if state.routines.get(routine).is_some_and(|r| r.kind == kind) {
            state.routines.remove(routine);
        }
        Ok(())
    }

    async fn drop_temporary_table(&self, table: &str) -> Result<()> {
        let mut state = self.lock();
        let sql = format!("drop temporary table {}", table);
        state.statements.push(sql.clone());
        state.check_failure(&sql)?;
        if state.temporary_tables.remove(table).is_none() {
            bail!("Unknown table '{}'", table);
        }
        Ok(())
    }

    async fn call_routine(&self, routine: &str) -> Result<()> {
        let mut state = self.lock();
        let sql = format!("call {}()", routine);
        state.statements.push(sql.clone());
        state.check_failure(&sql)?;
        if !state.routines.contains_key(routine) {
            bail!("PROCEDURE {} does not exist", routine);
        }
        state.calls.push(routine.to_string());
        if let Some((table, columns)) = state.temporary_on_call.get(routine).cloned() {
            state.temporary_tables.insert(table, columns);
        }
        Ok(())
    }

    async fn set_sql_mode(&self, sql_mode: &str) -> Result<()> {
        let mut state = self.lock();
        let sql = format!("set sql_mode = '{}'", sql_mode);
        state.statements.push(sql.clone());
        state.check_failure(&sql)?;
        state.sql_mode = state
            .canonical_sql_mode
            .clone()
            .unwrap_or_else(|| sql_mode.to_string());
        Ok(())
    }

    async fn set_character_set(&self, character_set: &str, collation: &str) -> Result<()> {
        let mut state = self.lock();
        let sql = format!("set names '{}' collate '{}'", character_set, collation);
        state.statements.push(sql.clone());
        state.check_failure(&sql)?;
        state.character_set = character_set.to_string();
        state.collation = collation.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_stamps_session_settings() {
        let db = InMemoryDatabase::new();
        db.set_sql_mode("STRICT_ALL_TABLES").await.unwrap();
        db.set_character_set("utf8mb4", "utf8mb4_general_ci").await.unwrap();
        db.execute("create procedure abc_get()\nbegin\nend").await.unwrap();

        let info = db.routine_info("abc_get").await.unwrap().unwrap();
        assert_eq!(info.routine_kind, RoutineKind::Procedure);
        assert_eq!(info.sql_mode, "STRICT_ALL_TABLES");
        assert_eq!(info.character_set_client, "utf8mb4");
        assert_eq!(info.collation_connection, "utf8mb4_general_ci");
    }

    #[tokio::test]
    async fn test_create_twice_fails_until_dropped() {
        let db = InMemoryDatabase::new();
        let sql = "create function abc_f() returns int\nbegin\nreturn 1;\nend";
        db.execute(sql).await.unwrap();
        assert!(db.execute(sql).await.is_err());
        db.drop_routine(RoutineKind::Function, "abc_f").await.unwrap();
        db.execute(sql).await.unwrap();
    }

    #[tokio::test]
    async fn test_call_creates_temporary_table() {
        let db = InMemoryDatabase::new().with_temporary_table_on_call(
            "abc_load",
            "tmp_load",
            vec![TableColumn::new("id", "int(11)")],
        );
        db.execute("create procedure abc_load()\nbegin\nend").await.unwrap();
        db.call_routine("abc_load").await.unwrap();
        assert!(db.has_temporary_table("tmp_load"));
        assert!(!db.table_exists("tmp_load").await.unwrap());
        assert_eq!(db.describe_table("tmp_load").await.unwrap().len(), 1);
        db.drop_temporary_table("tmp_load").await.unwrap();
        assert!(!db.has_temporary_table("tmp_load"));
    }

    #[tokio::test]
    async fn test_canonical_sql_mode_is_read_back() {
        let db =
            InMemoryDatabase::new().with_canonical_sql_mode("ONLY_FULL_GROUP_BY,STRICT_ALL_TABLES");
        db.set_sql_mode("STRICT_ALL_TABLES,ONLY_FULL_GROUP_BY").await.unwrap();
        let row = db.fetch_row("select @@sql_mode as sql_mode").await.unwrap().unwrap();
        assert_eq!(
            row.get("sql_mode"),
            Some(&Some("ONLY_FULL_GROUP_BY,STRICT_ALL_TABLES".to_string()))
        );
    }

    #[tokio::test]
    async fn test_failing_statement() {
        let db = InMemoryDatabase::new().with_failing_statement("syntax");
        let err = db.execute("create procedure abc() syntax error").await.unwrap_err();
        assert!(err.to_string().contains("rejected"));
        assert!(db.routine("abc").is_none());
    }
}
