//! Error types for routine loading.
//!
//! Every variant is fatal to the load of the routine it was raised for.
//! Advisory findings (missing return type, undocumented parameters) are
//! logged through `tracing` instead and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for routine loading.
pub type LoaderResult<T> = Result<T, LoaderError>;

/// Errors that abort the load of a single stored routine.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Unable to read routine source: {path}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown placeholder(s) found: {}", .placeholders.join(", "))]
    UnknownPlaceholder { placeholders: Vec<String> },

    #[error("Unable to find the designation type of the stored routine")]
    MissingDesignationType,

    #[error("Expected: -- type: bulk_insert <table_name> <columns>, found: '{found}'")]
    MalformedBulkInsertDirective { found: String },

    #[error("Designation type '{kind}' does not take arguments, found: '{args}'")]
    UnexpectedDesignationArgs { kind: String, args: String },

    #[error("Unable to find the stored routine name and type")]
    SignatureNotFound,

    #[error("Stored routine name '{found}' does not correspond with filename '{expected}'")]
    NameMismatch { expected: String, found: String },

    #[error("Duplicate parameter directive for '{name}'")]
    DuplicateExtendedParam { name: String },

    #[error(
        "Line {line}: expected: -- param: <name> <type_of_list> [delimiter enclosure escape], found: '{text}'"
    )]
    MalformedParamDirective { line: usize, text: String },

    #[error("Failed to load stored routine '{routine}': {source}")]
    LoadFailed {
        routine: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Number of fields {expected} and number of columns {actual} of table '{table}' don't match")]
    ColumnCountMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("Parameter directive '{name}' does not match any parameter of the stored routine")]
    UnknownExtendedParameter { name: String },

    #[error(
        "Return type '{return_type}' must be 'mixed', 'bool', or a combination of int, double (or float), string, and null"
    )]
    InvalidReturnType { return_type: String },
}

impl LoaderError {
    /// Wraps a database facade failure for `routine`.
    pub fn load_failed(routine: &str, source: anyhow::Error) -> Self {
        LoaderError::LoadFailed {
            routine: routine.to_string(),
            source,
        }
    }
}
