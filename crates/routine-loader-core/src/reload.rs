//! Decides whether a routine source must be (re)loaded.
//!
//! Loading is skipped only when nothing that influences the loaded routine
//! has changed since the last run: the source file, the values of the
//! placeholders it uses, and the session settings it was created under.

use std::fmt;

use crate::metadata::RoutineMetadata;
use crate::models::{CatalogRoutineInfo, SessionSettings};
use crate::placeholder::PlaceholderMap;

/// The first condition that forces a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadReason {
    /// No metadata has been recorded for the routine yet.
    FirstLoad,
    SourceModified { recorded: i64, current: i64 },
    PlaceholderChanged { placeholder: String },
    /// The routine does not exist in the database.
    NotInCatalog,
    SqlModeChanged,
    CharacterSetChanged,
    CollationChanged,
}

impl fmt::Display for ReloadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadReason::FirstLoad => write!(f, "first load"),
            ReloadReason::SourceModified { recorded, current } => {
                write!(f, "source modified ({} -> {})", recorded, current)
            }
            ReloadReason::PlaceholderChanged { placeholder } => {
                write!(f, "placeholder {} changed", placeholder)
            }
            ReloadReason::NotInCatalog => write!(f, "routine not in database"),
            ReloadReason::SqlModeChanged => write!(f, "sql mode changed"),
            ReloadReason::CharacterSetChanged => write!(f, "character set changed"),
            ReloadReason::CollationChanged => write!(f, "collation changed"),
        }
    }
}

/// Returns the reason a reload is required, or `None` if the prior
/// metadata is still valid.
pub fn reload_reason(
    prior: Option<&RoutineMetadata>,
    mtime: i64,
    placeholders: &PlaceholderMap,
    catalog: Option<&CatalogRoutineInfo>,
    session: &SessionSettings,
) -> Option<ReloadReason> {
    let Some(prior) = prior else {
        return Some(ReloadReason::FirstLoad);
    };

    if prior.timestamp != mtime {
        return Some(ReloadReason::SourceModified {
            recorded: prior.timestamp,
            current: mtime,
        });
    }

    for (placeholder, old_value) in &prior.replace {
        if placeholders.get(placeholder) != Some(old_value.as_str()) {
            return Some(ReloadReason::PlaceholderChanged {
                placeholder: placeholder.clone(),
            });
        }
    }

    let Some(catalog) = catalog else {
        return Some(ReloadReason::NotInCatalog);
    };

    if catalog.sql_mode != session.sql_mode {
        return Some(ReloadReason::SqlModeChanged);
    }
    if catalog.character_set_client != session.character_set {
        return Some(ReloadReason::CharacterSetChanged);
    }
    if catalog.collation_connection != session.collation {
        return Some(ReloadReason::CollationChanged);
    }

    None
}

/// Whether the routine must be (re)loaded.
pub fn must_reload(
    prior: Option<&RoutineMetadata>,
    mtime: i64,
    placeholders: &PlaceholderMap,
    catalog: Option<&CatalogRoutineInfo>,
    session: &SessionSettings,
) -> bool {
    reload_reason(prior, mtime, placeholders, catalog, session).is_some()
}
