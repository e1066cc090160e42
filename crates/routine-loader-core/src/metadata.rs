//! The persisted metadata record of a stored routine.
//!
//! A [`RoutineMetadata`] is what the wrapper generator consumes and what the
//! next run reads back as prior metadata to decide whether a reload is
//! needed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::directives::ExtendedParam;
use crate::models::RoutineKind;

/// A routine parameter as declared in the catalog, with its list format if
/// a `-- param:` directive names it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineParameter {
    pub parameter_name: String,
    pub data_type: String,
    pub dtd_identifier: String,
    pub character_set_name: Option<String>,
    pub collation_name: Option<String>,
    pub data_type_descriptor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ExtendedParam>,
}

/// One parameter entry of the wrapper documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapperParameter {
    pub parameter_name: String,
    pub value_kind: String,
    pub data_type_descriptor: String,
    pub description: Option<String>,
}

/// Documentation handed to the wrapper generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapperDocBlock {
    pub short_description: String,
    pub long_description: String,
    pub parameters: Vec<WrapperParameter>,
}

/// Everything known about a loaded stored routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineMetadata {
    pub routine_name: String,
    pub routine_kind: RoutineKind,
    pub designation: String,
    #[serde(rename = "return")]
    pub return_type: Option<String>,
    pub table_name: Option<String>,
    pub parameters: Vec<RoutineParameter>,
    /// Key or index columns (`rows_with_key`, `rows_with_index`) or the
    /// directive's field list (`bulk_insert`).
    pub columns: Option<Vec<String>>,
    /// Column names of the bulk insert table.
    pub fields: Option<Vec<String>>,
    /// Base column types of the bulk insert table.
    pub column_types: Option<Vec<String>>,
    /// Modification time of the source file at load time.
    pub timestamp: i64,
    /// Placeholders used by the source and their values at load time.
    pub replace: BTreeMap<String, String>,
    pub docblock: WrapperDocBlock,
    #[serde(default)]
    pub extended_params: Vec<ExtendedParam>,
}
