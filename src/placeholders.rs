//! Builds the placeholder map routines are resolved against.
//!
//! Two sources are merged: the `[placeholders]` constants of the config file
//! (`NAME` becomes `@NAME@`) and, unless disabled, one
//! `@TABLE.COLUMN%TYPE@` entry per column of the current schema. Constants
//! win when both define the same token.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::debug;

use routine_loader_core::database::RoutineDatabase;
use routine_loader_core::models::SchemaColumn;
use routine_loader_core::placeholder::PlaceholderMap;

use crate::config::Config;

pub async fn build_placeholder_map<D: RoutineDatabase + ?Sized>(
    db: &D,
    config: &Config,
) -> Result<PlaceholderMap> {
    let mut map = PlaceholderMap::new();

    if config.loader.column_type_placeholders {
        let columns = db
            .schema_column_types()
            .await
            .with_context(|| "Failed to read column types of the schema")?;
        map.extend(column_type_placeholders(&columns));
    }

    map.extend(constant_placeholders(&config.placeholders));

    debug!(count = map.len(), "placeholder map built");
    Ok(map)
}

/// `@TABLE.COLUMN%TYPE@` → column type, with the character set appended
/// for character columns.
pub fn column_type_placeholders(columns: &[SchemaColumn]) -> PlaceholderMap {
    columns
        .iter()
        .map(|c| {
            let token = format!("@{}.{}%TYPE@", c.table_name, c.column_name);
            let value = match c.character_set_name {
                Some(ref charset) => format!("{} character set {}", c.column_type, charset),
                None => c.column_type.clone(),
            };
            (token, value)
        })
        .collect()
}

pub fn constant_placeholders(constants: &BTreeMap<String, String>) -> PlaceholderMap {
    constants
        .iter()
        .map(|(name, value)| (format!("@{}@", name), value.clone()))
        .collect()
}
