//! Routine kind and name from the `CREATE PROCEDURE|FUNCTION` statement.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{LoaderError, LoaderResult};
use crate::models::RoutineKind;

static SIGNATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)create\s+(procedure|function)\s+([a-zA-Z0-9_]+)")
        .expect("valid signature regex")
});

/// Kind and name of a routine as declared in its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub kind: RoutineKind,
    pub name: String,
}

/// Finds the first `create procedure|function <name>` in `source`.
pub fn find_signature(source: &str) -> Option<Signature> {
    let caps = SIGNATURE_RE.captures(source)?;
    let kind = RoutineKind::parse(&caps[1])?;
    Some(Signature {
        kind,
        name: caps[2].to_string(),
    })
}

/// Extracts the signature and checks that the declared name equals
/// `expected_name` (the base name of the source file).
pub fn extract_signature(source: &str, expected_name: &str) -> LoaderResult<Signature> {
    let signature = find_signature(source).ok_or(LoaderError::SignatureNotFound)?;
    if signature.name != expected_name {
        return Err(LoaderError::NameMismatch {
            expected: expected_name.to_string(),
            found: signature.name,
        });
    }
    Ok(signature)
}

/// Whether `line` contains a routine signature.
pub fn is_signature_line(line: &str) -> bool {
    SIGNATURE_RE.is_match(line)
}
