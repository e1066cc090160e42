//! Batch loading orchestration.
//!
//! Coordinates a full `rload load` run: placeholder map → metadata store →
//! per-routine reload decision → load pipeline → metadata store. Routines
//! are loaded one at a time through a single database session; a failing
//! routine is reported and the batch continues.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use routine_loader_core::database::RoutineDatabase;
use routine_loader_core::error::{LoaderError, LoaderResult};
use routine_loader_core::metadata::RoutineMetadata;
use routine_loader_core::models::{routine_name_from_path, SessionSettings};
use routine_loader_core::pipeline::{load_routine, LoadContext};
use routine_loader_core::placeholder::PlaceholderMap;
use routine_loader_core::reload::reload_reason;

use crate::config::Config;
use crate::metadata_store::MetadataStore;
use crate::mysql::MySqlDatabase;
use crate::placeholders::build_placeholder_map;
use crate::source::{discover_sources, read_source, source_mtime};

/// Outcome of a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub loaded: Vec<String>,
    pub unchanged: Vec<String>,
    /// Routine name and error message.
    pub failed: Vec<(String, String)>,
    /// Metadata records dropped because their source no longer exists.
    pub removed: Vec<String>,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn print_summary(&self) {
        println!("load");
        println!("  loaded: {}", self.loaded.len());
        println!("  unchanged: {}", self.unchanged.len());
        if !self.removed.is_empty() {
            println!("  removed: {}", self.removed.len());
        }
        println!("  failed: {}", self.failed.len());
        for (routine, message) in &self.failed {
            println!("    {}: {}", routine, message);
        }
        if self.has_failures() {
            println!("error");
        } else {
            println!("ok");
        }
    }
}

/// Connects to MySQL and runs a batch. With no `files`, every source under
/// `loader.source_dir` is considered.
pub async fn run_load(config: &Config, files: Vec<PathBuf>) -> Result<BatchReport> {
    let db = MySqlDatabase::connect(config).await?;
    let report = run_batch(&db, config, files).await;
    db.close().await?;
    report
}

pub async fn run_batch<D: RoutineDatabase + ?Sized>(
    db: &D,
    config: &Config,
    files: Vec<PathBuf>,
) -> Result<BatchReport> {
    let placeholders = build_placeholder_map(db, config).await?;
    let mut store = MetadataStore::load(&config.loader.metadata_path)?;
    let session = canonical_session(db, config.loader.session()).await?;

    let full = files.is_empty();
    let paths = if full {
        discover_sources(&config.loader)?
    } else {
        files
    };

    let mut report = load_sources(db, &paths, &mut store, &placeholders, &session).await;

    if full {
        let present: BTreeSet<String> = paths.iter().map(|p| routine_name_from_path(p)).collect();
        report.removed = store.retain(|name| present.contains(name));
        for name in &report.removed {
            info!(routine = %name, "Source of {} no longer exists; metadata removed", name);
        }
    }

    store.save()?;
    debug!(path = %store.path().display(), routines = store.len(), "metadata saved");
    Ok(report)
}

/// Replaces the configured SQL mode by the value the server records for it.
///
/// MySQL reorders and expands SQL modes, and the catalog stores the
/// normalized form; comparing against the configured string would force a
/// reload of every routine on every run.
pub async fn canonical_session<D: RoutineDatabase + ?Sized>(
    db: &D,
    configured: SessionSettings,
) -> Result<SessionSettings> {
    db.set_sql_mode(&configured.sql_mode)
        .await
        .with_context(|| format!("Failed to set sql_mode '{}'", configured.sql_mode))?;
    let row = db
        .fetch_row("select @@sql_mode as sql_mode")
        .await
        .with_context(|| "Failed to read back sql_mode")?;

    let sql_mode = row
        .and_then(|mut r| r.remove("sql_mode"))
        .flatten()
        .unwrap_or_else(|| configured.sql_mode.clone());
    if sql_mode != configured.sql_mode {
        debug!(configured = %configured.sql_mode, canonical = %sql_mode, "sql_mode normalized");
    }

    Ok(SessionSettings {
        sql_mode,
        ..configured
    })
}

/// Routine names defined by more than one source, with their paths.
fn duplicate_routines(paths: &[PathBuf]) -> BTreeMap<String, Vec<&Path>> {
    let mut by_name: BTreeMap<String, Vec<&Path>> = BTreeMap::new();
    for path in paths {
        by_name
            .entry(routine_name_from_path(path))
            .or_default()
            .push(path.as_path());
    }
    by_name.retain(|_, sources| sources.len() > 1);
    by_name
}

/// Loads `paths` in order, updating `store` as each routine completes.
pub async fn load_sources<D: RoutineDatabase + ?Sized>(
    db: &D,
    paths: &[PathBuf],
    store: &mut MetadataStore,
    placeholders: &PlaceholderMap,
    session: &SessionSettings,
) -> BatchReport {
    let mut report = BatchReport::default();
    let duplicates = duplicate_routines(paths);

    for (name, sources) in &duplicates {
        let listing: Vec<String> = sources.iter().map(|p| p.display().to_string()).collect();
        let message = format!(
            "Stored routine '{}' is defined by more than one source: {}",
            name,
            listing.join(", ")
        );
        error!(routine = %name, "{}", message);
        store.remove(name);
        report.failed.push((name.clone(), message));
    }

    for path in paths {
        let name = routine_name_from_path(path);
        if duplicates.contains_key(&name) {
            continue;
        }
        match load_source(db, path, store, placeholders, session).await {
            Ok(Some(metadata)) => {
                store.insert(metadata);
                report.loaded.push(name);
            }
            Ok(None) => {
                report.unchanged.push(name);
            }
            Err(e) => {
                error!(routine = %name, "{}", e);
                store.remove(&name);
                report.failed.push((name, e.to_string()));
            }
        }
    }

    report
}

/// Loads one routine if it must be reloaded; `None` when it is unchanged.
pub async fn load_source<D: RoutineDatabase + ?Sized>(
    db: &D,
    path: &Path,
    store: &MetadataStore,
    placeholders: &PlaceholderMap,
    session: &SessionSettings,
) -> LoaderResult<Option<RoutineMetadata>> {
    let name = routine_name_from_path(path);
    let mtime = source_mtime(path)?;
    let catalog = db
        .routine_info(&name)
        .await
        .map_err(|e| LoaderError::load_failed(&name, e))?;

    match reload_reason(
        store.get(&name),
        mtime,
        placeholders,
        catalog.as_ref(),
        session,
    ) {
        None => {
            debug!(routine = %name, "unchanged");
            return Ok(None);
        }
        Some(reason) => debug!(routine = %name, %reason, "reload required"),
    }

    let source = read_source(path)?;
    let ctx = LoadContext {
        placeholders,
        session,
        catalog: catalog.as_ref(),
    };

    load_routine(db, &source, &ctx).await.map(Some)
}
