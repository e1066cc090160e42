//! Core data models shared by the routine loading pipeline.
//!
//! These types describe what the database catalog reports about a routine,
//! the session settings a routine is loaded under, and the source file a
//! routine is read from.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The kind of stored routine declared by the `CREATE` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutineKind {
    Procedure,
    Function,
}

impl RoutineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutineKind::Procedure => "procedure",
            RoutineKind::Function => "function",
        }
    }

    /// Parses a routine kind case-insensitively (`PROCEDURE`, `function`, ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "procedure" => Some(RoutineKind::Procedure),
            "function" => Some(RoutineKind::Function),
            _ => None,
        }
    }
}

impl fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SQL mode, character set and collation a routine is loaded and run under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub sql_mode: String,
    pub character_set: String,
    pub collation: String,
}

/// One parameter of a stored routine as reported by the catalog.
///
/// The return value of a stored function shows up as a parameter without a
/// name; those entries are skipped by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogParameter {
    pub parameter_name: Option<String>,
    pub data_type: String,
    pub dtd_identifier: String,
    pub character_set_name: Option<String>,
    pub collation_name: Option<String>,
}

impl CatalogParameter {
    /// A named parameter; `data_type` is the leading keyword of `dtd_identifier`.
    pub fn new(name: &str, dtd_identifier: &str) -> Self {
        Self {
            parameter_name: Some(name.to_string()),
            data_type: base_type(dtd_identifier),
            dtd_identifier: dtd_identifier.to_string(),
            character_set_name: None,
            collation_name: None,
        }
    }

    /// The declared type followed by its character set and collation, e.g.
    /// `varchar(80) character set utf8mb4 collation utf8mb4_general_ci`.
    pub fn data_type_descriptor(&self) -> String {
        let mut descriptor = self.dtd_identifier.clone();
        if let Some(ref charset) = self.character_set_name {
            descriptor.push_str(" character set ");
            descriptor.push_str(charset);
        }
        if let Some(ref collation) = self.collation_name {
            descriptor.push_str(" collation ");
            descriptor.push_str(collation);
        }
        descriptor
    }
}

/// What the catalog knows about a routine that exists in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRoutineInfo {
    pub routine_name: String,
    pub routine_kind: RoutineKind,
    pub sql_mode: String,
    pub character_set_client: String,
    pub collation_connection: String,
    /// Parameters in declaration order, including the unnamed return value
    /// of functions.
    #[serde(default)]
    pub parameters: Vec<CatalogParameter>,
}

/// A column of a table as reported by `DESCRIBE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumn {
    pub field: String,
    pub column_type: String,
}

impl TableColumn {
    pub fn new(field: &str, column_type: &str) -> Self {
        Self {
            field: field.to_string(),
            column_type: column_type.to_string(),
        }
    }

    /// The column's base type keyword (`int(10) unsigned` → `int`).
    pub fn base_type(&self) -> String {
        base_type(&self.column_type)
    }
}

/// The leading word of a column type, without length, precision or
/// qualifiers.
pub fn base_type(column_type: &str) -> String {
    column_type
        .trim_start()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default()
        .to_string()
}

/// A column of a table in the current schema, used to compute
/// `@TABLE.COLUMN%TYPE@` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaColumn {
    pub table_name: String,
    pub column_name: String,
    pub column_type: String,
    pub character_set_name: Option<String>,
}

/// One annotated pseudo-SQL source file.
#[derive(Debug, Clone)]
pub struct RoutineSource {
    /// Absolute path of the source file.
    pub path: PathBuf,
    pub text: String,
    /// Last modification time in seconds since the Unix epoch.
    pub mtime: i64,
}

impl RoutineSource {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>, mtime: i64) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            mtime,
        }
    }

    /// The logical routine name: the file's base name without extension.
    pub fn routine_name(&self) -> String {
        routine_name_from_path(&self.path)
    }

    /// Source lines split on `\n`, with a trailing `\r` removed.
    pub fn lines(&self) -> Vec<&str> {
        self.text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect()
    }
}

/// Derives the routine name from a source path (`lib/psql/abc_get.psql` → `abc_get`).
pub fn routine_name_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}
