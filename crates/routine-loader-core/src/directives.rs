//! Directive comments of pseudo-SQL sources.
//!
//! Directives live in `--` comments above the `begin` line of a routine:
//!
//! ```sql
//! create procedure abc_order_insert_rows(in p_tags text)
//! -- param:  p_tags csv ; " \
//! -- type:   bulk_insert tmp_order order_id,customer_id
//! begin
//! ```
//!
//! Only lines strictly before the first line equal to `begin` are
//! considered. Each directive kind is recognised by one fixed pattern.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LoaderError, LoaderResult};

static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*--\s+type:\s*(\w+)\s*(.+)?\s*$").expect("valid type directive regex")
});

static BULK_INSERT_ARGS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9_]+)\s+([a-zA-Z0-9_,]+)$").expect("valid bulk_insert regex")
});

static RETURN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*--\s+return:\s*([\w|]+)\s*$").expect("valid return directive regex")
});

static PARAM_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*--\s+param:").expect("valid param prefix regex"));

static PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*--\s+param:\s*(\w+)\s+(\w+)(?:\s+([^\s-])\s+([^\s-])\s+([^\s-]))?\s*$")
        .expect("valid param directive regex")
});

/// Return type assumed when a routine that needs one does not declare it.
pub const DEFAULT_RETURN_TYPE: &str = "mixed";

const RETURN_TYPE_KINDS: [&str; 3] = ["function", "singleton0", "singleton1"];
const RETURN_TYPE_SCALARS: [&str; 5] = ["string", "int", "float", "double", "null"];

/// The calling convention / result shape of a stored routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesignationType {
    /// `bulk_insert <table_name> <columns>`
    BulkInsert {
        table_name: String,
        columns: Vec<String>,
    },
    /// `rows_with_key <columns>`
    RowsWithKey { columns: Vec<String> },
    /// `rows_with_index <columns>`
    RowsWithIndex { columns: Vec<String> },
    /// Any designation type without arguments (`none`, `row1`, `function`, ...).
    Plain(String),
}

impl DesignationType {
    pub fn kind(&self) -> &str {
        match self {
            DesignationType::BulkInsert { .. } => "bulk_insert",
            DesignationType::RowsWithKey { .. } => "rows_with_key",
            DesignationType::RowsWithIndex { .. } => "rows_with_index",
            DesignationType::Plain(kind) => kind,
        }
    }

    pub fn table_name(&self) -> Option<&str> {
        match self {
            DesignationType::BulkInsert { table_name, .. } => Some(table_name),
            _ => None,
        }
    }

    pub fn columns(&self) -> Option<&[String]> {
        match self {
            DesignationType::BulkInsert { columns, .. }
            | DesignationType::RowsWithKey { columns }
            | DesignationType::RowsWithIndex { columns } => Some(columns),
            DesignationType::Plain(_) => None,
        }
    }

    /// Whether the routine must declare a return type (`function`,
    /// `singleton0`, `singleton1`).
    pub fn requires_return_type(&self) -> bool {
        RETURN_TYPE_KINDS.contains(&self.kind())
    }
}

/// Formatting of a parameter that receives a list packed into a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedParam {
    pub name: String,
    pub data_type: String,
    pub delimiter: char,
    pub enclosure: char,
    pub escape: char,
}

/// A single parsed directive line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    DesignationType(DesignationType),
    ReturnType(String),
    ExtendedParam(ExtendedParam),
}

/// All directives of one routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directives {
    pub designation: DesignationType,
    /// Present only for designation types that require a return type;
    /// defaults to [`DEFAULT_RETURN_TYPE`].
    pub return_type: Option<String>,
    /// Parameter directives in source order.
    pub extended_params: Vec<ExtendedParam>,
}

impl Directives {
    /// Flattens the directives into [`Directive`] values.
    pub fn to_directives(&self) -> Vec<Directive> {
        let mut out = vec![Directive::DesignationType(self.designation.clone())];
        if let Some(ref return_type) = self.return_type {
            out.push(Directive::ReturnType(return_type.clone()));
        }
        out.extend(
            self.extended_params
                .iter()
                .cloned()
                .map(Directive::ExtendedParam),
        );
        out
    }
}

/// Parses the designation type, return type and parameter directives.
pub fn parse_directives(lines: &[&str]) -> LoaderResult<Directives> {
    let header = header_lines(lines).ok_or(LoaderError::MissingDesignationType)?;

    let designation = parse_designation_type(header)?;
    let return_type = if designation.requires_return_type() {
        Some(parse_return_type(header).unwrap_or_else(|| {
            warn!("Unable to find the return type of the stored routine, assuming '{DEFAULT_RETURN_TYPE}'");
            DEFAULT_RETURN_TYPE.to_string()
        }))
    } else {
        None
    };
    let extended_params = parse_extended_params(header)?;

    Ok(Directives {
        designation,
        return_type,
        extended_params,
    })
}

/// Lines strictly before the first line equal to `begin`, or `None` if
/// there is no such line.
fn header_lines<'a, 'b>(lines: &'a [&'b str]) -> Option<&'a [&'b str]> {
    lines
        .iter()
        .position(|line| *line == "begin")
        .map(|key| &lines[..key])
}

/// The nearest `-- type:` comment above `begin`.
pub fn parse_designation_type(header: &[&str]) -> LoaderResult<DesignationType> {
    let caps = header
        .iter()
        .rev()
        .find_map(|line| TYPE_RE.captures(line))
        .ok_or(LoaderError::MissingDesignationType)?;

    let kind = caps[1].to_string();
    let raw_args = caps.get(2).map(|m| m.as_str());
    let args = raw_args.map(str::trim).filter(|args| !args.is_empty());

    match kind.as_str() {
        "bulk_insert" => {
            // Matched as written: trailing blanks are malformed.
            let args = raw_args.unwrap_or_default();
            let info = BULK_INSERT_ARGS_RE.captures(args).ok_or_else(|| {
                LoaderError::MalformedBulkInsertDirective {
                    found: args.to_string(),
                }
            })?;
            Ok(DesignationType::BulkInsert {
                table_name: info[1].to_string(),
                columns: split_columns(&info[2]),
            })
        }
        "rows_with_key" => Ok(DesignationType::RowsWithKey {
            columns: split_columns(args.unwrap_or_default()),
        }),
        "rows_with_index" => Ok(DesignationType::RowsWithIndex {
            columns: split_columns(args.unwrap_or_default()),
        }),
        _ => match args {
            Some(args) => Err(LoaderError::UnexpectedDesignationArgs {
                kind,
                args: args.to_string(),
            }),
            None => Ok(DesignationType::Plain(kind)),
        },
    }
}

/// The nearest `-- return:` comment above `begin`, if any.
pub fn parse_return_type(header: &[&str]) -> Option<String> {
    header
        .iter()
        .rev()
        .find_map(|line| RETURN_RE.captures(line))
        .map(|caps| caps[1].to_string())
}

/// All `-- param:` comments above `begin`.
pub fn parse_extended_params(header: &[&str]) -> LoaderResult<Vec<ExtendedParam>> {
    let mut params: Vec<ExtendedParam> = Vec::new();

    for (i, line) in header.iter().enumerate() {
        if !PARAM_PREFIX_RE.is_match(line) {
            continue;
        }

        let caps = PARAM_RE
            .captures(line)
            .ok_or_else(|| LoaderError::MalformedParamDirective {
                line: i + 1,
                text: line.trim().to_string(),
            })?;

        let name = caps[1].to_string();
        if params.iter().any(|p| p.name == name) {
            return Err(LoaderError::DuplicateExtendedParam { name });
        }

        let format_char = |idx: usize, default: char| {
            caps.get(idx)
                .and_then(|m| m.as_str().chars().next())
                .unwrap_or(default)
        };

        params.push(ExtendedParam {
            data_type: caps[2].to_string(),
            delimiter: format_char(3, ','),
            enclosure: format_char(4, '"'),
            escape: format_char(5, '\\'),
            name,
        });
    }

    Ok(params)
}

/// Checks a return type against the allowed forms: `mixed`, `bool`, or a
/// `|`-separated combination of `string`, `int`, `float`, `double`, `null`.
pub fn validate_return_type(return_type: &str) -> LoaderResult<()> {
    if return_type == "mixed" || return_type == "bool" {
        return Ok(());
    }

    let valid = return_type
        .split('|')
        .all(|part| RETURN_TYPE_SCALARS.contains(&part));
    if valid {
        Ok(())
    } else {
        Err(LoaderError::InvalidReturnType {
            return_type: return_type.to_string(),
        })
    }
}

fn split_columns(list: &str) -> Vec<String> {
    list.split(',').map(|c| c.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn test_bulk_insert_directive() {
        let src = "create procedure abc_order_load()\n-- type: bulk_insert orders order_id,customer_id\nbegin\nend";
        let directives = parse_directives(&lines(src)).unwrap();
        assert_eq!(
            directives.designation,
            DesignationType::BulkInsert {
                table_name: "orders".to_string(),
                columns: vec!["order_id".to_string(), "customer_id".to_string()],
            }
        );
        assert_eq!(directives.designation.table_name(), Some("orders"));
        assert_eq!(directives.return_type, None);
    }

    #[test]
    fn test_malformed_bulk_insert_directive() {
        let src = "-- type: bulk_insert orders\nbegin";
        let err = parse_directives(&lines(src)).unwrap_err();
        assert!(matches!(err, LoaderError::MalformedBulkInsertDirective { .. }));
    }

    #[test]
    fn test_bulk_insert_trailing_blanks_are_malformed() {
        let src = "-- type: bulk_insert orders order_id,customer_id   \nbegin";
        let err = parse_directives(&lines(src)).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::MalformedBulkInsertDirective { ref found } if found.ends_with("customer_id   ")
        ));
    }

    #[test]
    fn test_plain_designation_ignores_trailing_blanks() {
        let src = "-- type: none   \nbegin";
        let directives = parse_directives(&lines(src)).unwrap();
        assert_eq!(directives.designation, DesignationType::Plain("none".to_string()));
    }

    #[test]
    fn test_rows_with_key_columns() {
        let src = "-- type: rows_with_key usr_id, cmp_id\nbegin";
        let directives = parse_directives(&lines(src)).unwrap();
        assert_eq!(
            directives.designation.columns(),
            Some(&["usr_id".to_string(), "cmp_id".to_string()][..])
        );
    }

    #[test]
    fn test_missing_begin_is_missing_designation() {
        let src = "-- type: rows\nselect 1;";
        let err = parse_directives(&lines(src)).unwrap_err();
        assert!(matches!(err, LoaderError::MissingDesignationType));
    }

    #[test]
    fn test_missing_type_comment() {
        let src = "create procedure abc()\nbegin\n-- type: rows\nend";
        let err = parse_directives(&lines(src)).unwrap_err();
        assert!(matches!(err, LoaderError::MissingDesignationType));
    }

    #[test]
    fn test_unexpected_designation_args_is_fatal() {
        let src = "-- type: row1 extra stuff\nbegin";
        let err = parse_directives(&lines(src)).unwrap_err();
        match err {
            LoaderError::UnexpectedDesignationArgs { kind, args } => {
                assert_eq!(kind, "row1");
                assert_eq!(args, "extra stuff");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_nearest_type_comment_wins() {
        let src = "-- type: rows\n-- type: row0\nbegin";
        let directives = parse_directives(&lines(src)).unwrap();
        assert_eq!(directives.designation, DesignationType::Plain("row0".to_string()));
    }

    #[test]
    fn test_return_type_directive() {
        let src = "-- type: singleton1\n-- return: int|string|null\nbegin";
        let directives = parse_directives(&lines(src)).unwrap();
        assert_eq!(directives.return_type.as_deref(), Some("int|string|null"));
    }

    #[test]
    fn test_missing_return_type_defaults_to_mixed() {
        let src = "-- type: function\nbegin";
        let directives = parse_directives(&lines(src)).unwrap();
        assert_eq!(directives.return_type.as_deref(), Some(DEFAULT_RETURN_TYPE));
    }

    #[test]
    fn test_return_type_ignored_for_other_designations() {
        let src = "-- return: int\n-- type: rows\nbegin";
        let directives = parse_directives(&lines(src)).unwrap();
        assert_eq!(directives.return_type, None);
    }

    #[test]
    fn test_validate_return_type() {
        assert!(validate_return_type("int|string|null").is_ok());
        assert!(validate_return_type("mixed").is_ok());
        assert!(validate_return_type("bool").is_ok());
        assert!(validate_return_type("float|double").is_ok());
        assert!(matches!(
            validate_return_type("int|array"),
            Err(LoaderError::InvalidReturnType { .. })
        ));
        assert!(validate_return_type("bool|null").is_err());
    }

    #[test]
    fn test_param_directive_defaults() {
        let src = "-- param: tags csv\n-- type: none\nbegin";
        let directives = parse_directives(&lines(src)).unwrap();
        assert_eq!(
            directives.extended_params,
            vec![ExtendedParam {
                name: "tags".to_string(),
                data_type: "csv".to_string(),
                delimiter: ',',
                enclosure: '"',
                escape: '\\',
            }]
        );
    }

    #[test]
    fn test_param_directive_with_format() {
        let src = "-- param: p_ids list ; ' /\n-- type: none\nbegin";
        let directives = parse_directives(&lines(src)).unwrap();
        let param = &directives.extended_params[0];
        assert_eq!(param.delimiter, ';');
        assert_eq!(param.enclosure, '\'');
        assert_eq!(param.escape, '/');
    }

    #[test]
    fn test_duplicate_param_directive() {
        let src = "-- param: tags csv\n-- param: tags csv\n-- type: none\nbegin";
        let err = parse_directives(&lines(src)).unwrap_err();
        assert!(matches!(err, LoaderError::DuplicateExtendedParam { ref name } if name == "tags"));
    }

    #[test]
    fn test_malformed_param_directive() {
        let src = "-- type: none\n-- param: tags\nbegin";
        let err = parse_directives(&lines(src)).unwrap_err();
        assert!(matches!(err, LoaderError::MalformedParamDirective { line: 2, .. }));
    }

    #[test]
    fn test_param_directives_after_begin_are_ignored() {
        let src = "-- type: none\nbegin\n-- param: tags\nend";
        let directives = parse_directives(&lines(src)).unwrap();
        assert!(directives.extended_params.is_empty());
    }
}
