//! MySQL backend for the [`RoutineDatabase`] facade.
//!
//! All statements go through one connection so that `set sql_mode` and
//! `set names` apply to the `create` statement that follows them. Routine
//! sources are sent with the text protocol (`raw_sql`); `CREATE PROCEDURE`
//! cannot be prepared. Catalog columns are decoded without type checks
//! because MySQL reports several of them as `SET` or binary strings.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Executor as _, Row as _};
use tokio::sync::Mutex;

use routine_loader_core::database::{quote_identifier, Row, RoutineDatabase};
use routine_loader_core::models::{
    CatalogParameter, CatalogRoutineInfo, RoutineKind, SchemaColumn, TableColumn,
};

use crate::config::Config;
use crate::db;

pub struct MySqlDatabase {
    conn: Mutex<MySqlConnection>,
}

impl MySqlDatabase {
    pub fn new(conn: MySqlConnection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub async fn connect(config: &Config) -> Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }

    pub async fn close(self) -> Result<()> {
        self.conn.into_inner().close().await?;
        Ok(())
    }
}

fn text(row: &MySqlRow, index: usize) -> Result<Option<String>> {
    row.try_get_unchecked::<Option<String>, _>(index)
        .with_context(|| format!("Failed to decode column {}", index))
}

fn required_text(row: &MySqlRow, index: usize) -> Result<String> {
    text(row, index)?.with_context(|| format!("Unexpected NULL in column {}", index))
}

fn to_row(row: &MySqlRow) -> Result<Row> {
    let mut out = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), text(row, index)?);
    }
    Ok(out)
}

#[async_trait]
impl RoutineDatabase for MySqlDatabase {
    async fn execute(&self, sql: &str) -> Result<()> {
        let mut conn = self.conn.lock().await;
        conn.execute(sqlx::raw_sql(sql)).await?;
        Ok(())
    }

    async fn fetch_rows(&self, sql: &str) -> Result<Vec<Row>> {
        let mut conn = self.conn.lock().await;
        let rows = conn.fetch_all(sqlx::raw_sql(sql)).await?;
        rows.iter().map(to_row).collect()
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let mut conn = self.conn.lock().await;
        let row = sqlx::query(
            "select 1 from information_schema.TABLES where table_schema = database() and table_name = ?",
        )
        .bind(table)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(row.is_some())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<TableColumn>> {
        let sql = format!("show columns from {}", quote_identifier(table));
        let mut conn = self.conn.lock().await;
        let rows = conn.fetch_all(sqlx::raw_sql(&sql)).await?;

        rows.iter()
            .map(|row| {
                Ok(TableColumn {
                    field: required_text(row, 0)?,
                    column_type: required_text(row, 1)?,
                })
            })
            .collect()
    }

    async fn routine_parameters(&self, routine: &str) -> Result<Vec<CatalogParameter>> {
        let mut conn = self.conn.lock().await;
        let rows = sqlx::query(
            r#"
            select parameter_name
            ,      data_type
            ,      dtd_identifier
            ,      character_set_name
            ,      collation_name
            from   information_schema.PARAMETERS
            where  specific_schema = database()
            and    specific_name   = ?
            order by ordinal_position
            "#,
        )
        .bind(routine)
        .fetch_all(&mut *conn)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CatalogParameter {
                    parameter_name: text(row, 0)?,
                    data_type: required_text(row, 1)?,
                    dtd_identifier: required_text(row, 2)?,
                    character_set_name: text(row, 3)?,
                    collation_name: text(row, 4)?,
                })
            })
            .collect()
    }

    async fn routine_info(&self, routine: &str) -> Result<Option<CatalogRoutineInfo>> {
        let row = {
            let mut conn = self.conn.lock().await;
            sqlx::query(
                r#"
                select routine_name
                ,      routine_type
                ,      sql_mode
                ,      character_set_client
                ,      collation_connection
                from   information_schema.ROUTINES
                where  routine_schema = database()
                and    routine_name   = ?
                "#,
            )
            .bind(routine)
            .fetch_optional(&mut *conn)
            .await?
        };

        let Some(row) = row else {
            return Ok(None);
        };

        let routine_type = required_text(&row, 1)?;
        let Some(routine_kind) = RoutineKind::parse(&routine_type) else {
            bail!("Unknown routine type '{}' for {}", routine_type, routine);
        };

        Ok(Some(CatalogRoutineInfo {
            routine_name: required_text(&row, 0)?,
            routine_kind,
            sql_mode: text(&row, 2)?.unwrap_or_default(),
            character_set_client: required_text(&row, 3)?,
            collation_connection: required_text(&row, 4)?,
            parameters: self.routine_parameters(routine).await?,
        }))
    }

    async fn schema_column_types(&self) -> Result<Vec<SchemaColumn>> {
        let mut conn = self.conn.lock().await;
        let rows = sqlx::query(
            r#"
            select table_name
            ,      column_name
            ,      column_type
            ,      character_set_name
            from   information_schema.COLUMNS
            where  table_schema = database()
            order by table_name
            ,        ordinal_position
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SchemaColumn {
                    table_name: required_text(row, 0)?,
                    column_name: required_text(row, 1)?,
                    column_type: required_text(row, 2)?,
                    character_set_name: text(row, 3)?,
                })
            })
            .collect()
    }
}
