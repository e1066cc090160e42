use anyhow::{Context, Result};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::ConnectOptions;
use std::str::FromStr;

use crate::config::Config;

/// Opens the single session all routines of a batch are loaded through.
pub async fn connect(config: &Config) -> Result<MySqlConnection> {
    let options = MySqlConnectOptions::from_str(&config.database.url)
        .with_context(|| "Invalid database.url")?;

    let conn = options
        .connect()
        .await
        .with_context(|| "Failed to connect to MySQL")?;

    Ok(conn)
}
