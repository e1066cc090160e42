//! The per-routine load pipeline.
//!
//! ```text
//! parse_routine ──▶ load_into_database ──▶ reconcile ──▶ assemble
//!  placeholders      drop / session /       bulk insert     RoutineMetadata
//!  directives        create                 parameters
//!  signature                                doc check
//! ```
//!
//! Each stage takes the previous stage's output by reference; nothing is
//! shared between routines except the database.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::assemble::{assemble, AssemblyInput};
use crate::database::RoutineDatabase;
use crate::directives::{parse_directives, validate_return_type, Directives};
use crate::docblock::{extract_docblock, DocBlock};
use crate::error::{LoaderError, LoaderResult};
use crate::metadata::{RoutineMetadata, RoutineParameter};
use crate::models::{CatalogRoutineInfo, RoutineSource, SessionSettings};
use crate::placeholder::{
    collect_placeholders, lines_with_placeholders, substitute, MagicConstants, PlaceholderMap,
};
use crate::reconcile::{
    resolve_bulk_insert_columns, resolve_parameters, validate_parameter_docs, BulkInsertColumns,
};
use crate::signature::{extract_signature, Signature};

/// Inputs shared by all stages of one routine's load.
pub struct LoadContext<'a> {
    pub placeholders: &'a PlaceholderMap,
    pub session: &'a SessionSettings,
    /// Catalog entry of the routine before loading, if it exists.
    pub catalog: Option<&'a CatalogRoutineInfo>,
}

/// A routine source after all text-level checks passed.
#[derive(Debug, Clone)]
pub struct ParsedRoutine {
    pub name: String,
    pub signature: Signature,
    pub directives: Directives,
    /// Placeholders used by the source and their values.
    pub replace: BTreeMap<String, String>,
    pub doc: DocBlock,
}

/// Parameters and bulk insert columns as the catalog reports them.
#[derive(Debug, Clone)]
pub struct ReconciledRoutine {
    pub parameters: Vec<RoutineParameter>,
    pub bulk_insert: Option<BulkInsertColumns>,
}

/// Resolves placeholders, parses directives and the signature, and
/// validates the return type. Touches no database.
pub fn parse_routine(
    source: &RoutineSource,
    placeholders: &PlaceholderMap,
) -> LoaderResult<ParsedRoutine> {
    let name = source.routine_name();

    let resolution = collect_placeholders(&source.text, placeholders);
    if !resolution.unknown.is_empty() {
        warn!(routine = %name, "Unknown placeholder(s): {}", resolution.unknown.join(", "));
        for (line_number, line) in lines_with_placeholders(&source.text, &resolution.unknown) {
            warn!(routine = %name, "  {:>4}: {}", line_number, line);
        }
    }
    let replace = resolution.into_result()?;

    let lines = source.lines();
    let directives = parse_directives(&lines)?;
    debug!(routine = %name, directives = ?directives.to_directives(), "parsed directives");

    let signature = extract_signature(&source.text, &name)?;

    if let Some(ref return_type) = directives.return_type {
        validate_return_type(return_type)?;
    }

    let doc = extract_docblock(&lines);

    Ok(ParsedRoutine {
        name,
        signature,
        directives,
        replace,
        doc,
    })
}

/// Substitutes placeholders and magic constants, drops the previous
/// version of the routine, sets the session and creates the routine.
pub async fn load_into_database<D: RoutineDatabase + ?Sized>(
    db: &D,
    source: &RoutineSource,
    parsed: &ParsedRoutine,
    ctx: &LoadContext<'_>,
) -> LoaderResult<()> {
    let routine = parsed.name.as_str();
    let magic = magic_constants(db, source, routine);
    let sql = substitute(&source.text, &parsed.replace, Some(&magic));

    let result = async {
        if let Some(previous) = ctx.catalog {
            db.drop_routine(previous.routine_kind, routine).await?;
        }
        db.set_sql_mode(&ctx.session.sql_mode).await?;
        db.set_character_set(&ctx.session.character_set, &ctx.session.collation)
            .await?;
        db.execute(&sql).await?;
        Ok::<(), anyhow::Error>(())
    }
    .await;

    result.map_err(|e| LoaderError::load_failed(routine, e))
}

/// Reads back bulk insert columns and parameters, and checks the
/// documentation of the parameters.
pub async fn reconcile<D: RoutineDatabase + ?Sized>(
    db: &D,
    parsed: &ParsedRoutine,
) -> LoaderResult<ReconciledRoutine> {
    let bulk_insert =
        resolve_bulk_insert_columns(db, &parsed.name, &parsed.directives.designation).await?;
    let parameters =
        resolve_parameters(db, &parsed.name, &parsed.directives.extended_params).await?;
    validate_parameter_docs(&parsed.name, &parameters, &parsed.doc);

    Ok(ReconciledRoutine {
        parameters,
        bulk_insert,
    })
}

/// Runs the full pipeline for one routine source.
pub async fn load_routine<D: RoutineDatabase + ?Sized>(
    db: &D,
    source: &RoutineSource,
    ctx: &LoadContext<'_>,
) -> LoaderResult<RoutineMetadata> {
    let parsed = parse_routine(source, ctx.placeholders)?;

    info!(routine = %parsed.name, "Loading routine {}", parsed.name);
    load_into_database(db, source, &parsed, ctx).await?;

    let reconciled = reconcile(db, &parsed).await?;

    Ok(assemble(AssemblyInput {
        signature: &parsed.signature,
        directives: &parsed.directives,
        parameters: reconciled.parameters,
        bulk_insert: reconciled.bulk_insert,
        doc: &parsed.doc,
        timestamp: source.mtime,
        replace: &parsed.replace,
    }))
}

fn magic_constants<D: RoutineDatabase + ?Sized>(
    db: &D,
    source: &RoutineSource,
    routine: &str,
) -> MagicConstants {
    let dir = source
        .path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    MagicConstants {
        file: format!("'{}'", db.escape_string(&source.path.display().to_string())),
        routine: format!("'{}'", routine),
        dir: format!("'{}'", db.escape_string(&dir)),
    }
}
