//! Placeholder resolution for pseudo-SQL sources.
//!
//! A placeholder is a token of the form `@NAME@` or `@TABLE.COLUMN%type@`.
//! Tokens are looked up case-insensitively in a [`PlaceholderMap`] and
//! replaced literally. Substitution runs line by line so that the magic
//! constant `__LINE__` can expand to the 1-based number of the original
//! source line; `__FILE__`, `__ROUTINE__` and `__DIR__` are constant for the
//! whole file.
//!
//! Replacement follows `strtr` semantics: at every position the longest
//! matching key wins and replaced text is never scanned again.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{LoaderError, LoaderResult};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[A-Za-z0-9_.]+(%type)?@").expect("valid placeholder regex"));

pub const MAGIC_FILE: &str = "__FILE__";
pub const MAGIC_ROUTINE: &str = "__ROUTINE__";
pub const MAGIC_DIR: &str = "__DIR__";
pub const MAGIC_LINE: &str = "__LINE__";

/// Map from upper-cased placeholder token to its replacement text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderMap {
    entries: BTreeMap<String, String>,
}

impl PlaceholderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a placeholder; the token is stored upper-cased.
    pub fn insert(&mut self, token: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(token.as_ref().to_uppercase(), value.into());
    }

    /// Case-insensitive lookup.
    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries.get(&token.to_uppercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Adds every entry of `other`, overriding existing keys.
    pub fn extend(&mut self, other: PlaceholderMap) {
        self.entries.extend(other.entries);
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for PlaceholderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = PlaceholderMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Outcome of scanning a source for placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Placeholder as written in the source → replacement text.
    pub replace: BTreeMap<String, String>,
    /// Distinct unresolved tokens, sorted.
    pub unknown: Vec<String>,
}

impl Resolution {
    /// Fails with [`LoaderError::UnknownPlaceholder`] if any token was unresolved.
    pub fn into_result(self) -> LoaderResult<BTreeMap<String, String>> {
        if self.unknown.is_empty() {
            Ok(self.replace)
        } else {
            Err(LoaderError::UnknownPlaceholder {
                placeholders: self.unknown,
            })
        }
    }
}

/// Values of the magic constants for one source file, already quoted as
/// SQL literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicConstants {
    pub file: String,
    pub routine: String,
    pub dir: String,
}

/// Returns every placeholder token occurring in `text`, in order of appearance.
pub fn find_placeholders(text: &str) -> Vec<&str> {
    PLACEHOLDER_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// Looks up every placeholder of `text` in `map`, collecting unknown tokens
/// instead of failing on the first one.
pub fn collect_placeholders(text: &str, map: &PlaceholderMap) -> Resolution {
    let mut replace = BTreeMap::new();
    let mut unknown = BTreeSet::new();

    for token in find_placeholders(text) {
        match map.get(token) {
            Some(value) => {
                replace.insert(token.to_string(), value.to_string());
            }
            None => {
                unknown.insert(token.to_string());
            }
        }
    }

    Resolution {
        replace,
        unknown: unknown.into_iter().collect(),
    }
}

/// Resolves and substitutes all placeholders of `text`.
///
/// Returns the substituted text and the sorted list of distinct unknown
/// tokens, which are left in place.
pub fn resolve(text: &str, map: &PlaceholderMap) -> (String, Vec<String>) {
    let resolution = collect_placeholders(text, map);
    let substituted = substitute(text, &resolution.replace, None);
    (substituted, resolution.unknown)
}

/// Applies `replace` (and the magic constants, if given) to every line of `text`.
pub fn substitute(
    text: &str,
    replace: &BTreeMap<String, String>,
    magic: Option<&MagicConstants>,
) -> String {
    let mut pairs: Vec<(&str, String)> = replace
        .iter()
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.as_str(), v.clone()))
        .collect();
    if let Some(magic) = magic {
        pairs.push((MAGIC_FILE, magic.file.clone()));
        pairs.push((MAGIC_ROUTINE, magic.routine.clone()));
        pairs.push((MAGIC_DIR, magic.dir.clone()));
        pairs.push((MAGIC_LINE, String::new()));
    }
    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

    text.split('\n')
        .enumerate()
        .map(|(i, line)| {
            let line_number = (i + 1).to_string();
            let line_pairs: Vec<(&str, &str)> = pairs
                .iter()
                .map(|(k, v)| {
                    if magic.is_some() && *k == MAGIC_LINE {
                        (*k, line_number.as_str())
                    } else {
                        (*k, v.as_str())
                    }
                })
                .collect();
            translate(line, &line_pairs)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Lines (1-based number and text) that reference any of `unknown`.
pub fn lines_with_placeholders<'a>(text: &'a str, unknown: &[String]) -> Vec<(usize, &'a str)> {
    text.split('\n')
        .enumerate()
        .filter(|(_, line)| unknown.iter().any(|token| line.contains(token.as_str())))
        .map(|(i, line)| (i + 1, line))
        .collect()
}

/// `pairs` must be ordered longest key first.
fn translate(line: &str, pairs: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    'scan: while !rest.is_empty() {
        for (from, to) in pairs {
            if rest.starts_with(from) {
                out.push_str(to);
                rest = &rest[from.len()..];
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            out.push(ch);
        }
        rest = chars.as_str();
    }

    out
}
