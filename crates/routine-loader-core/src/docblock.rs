//! Doc-block extraction from the leading comment of a routine source.
//!
//! ```sql
//! /**
//!  * Selects the details of an order.
//!  *
//!  * Only orders of the current company are visible.
//!  *
//!  * @param p_ord_id The ID of the order.
//!  */
//! create procedure abc_order_get_details(in p_ord_id int)
//! ```
//!
//! The first paragraph is the short description, the remaining paragraphs
//! before the first tag form the long description. `@param <name> <text>`
//! tags become [`DocParameter`]s; other tags are ignored.

use serde::{Deserialize, Serialize};

use crate::signature::is_signature_line;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocParameter {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocBlock {
    pub short_description: String,
    pub long_description: String,
    pub parameters: Vec<DocParameter>,
}

impl DocBlock {
    /// The documented description of parameter `name`, if any.
    pub fn parameter_description(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.description.as_str())
    }
}

/// Parses the `/** ... */` block among the lines preceding the signature.
pub fn extract_docblock(lines: &[&str]) -> DocBlock {
    let header: Vec<&str> = lines
        .iter()
        .take_while(|line| !is_signature_line(line))
        .copied()
        .collect();

    let Some(start) = header.iter().position(|l| l.trim_start().starts_with("/**")) else {
        return DocBlock::default();
    };

    let mut body = Vec::new();
    for line in &header[start..] {
        let trimmed = line.trim();
        let closes = trimmed.ends_with("*/");
        let text = trimmed
            .trim_start_matches("/**")
            .trim_end_matches("*/")
            .trim();
        let text = text.strip_prefix('*').unwrap_or(text).trim();
        body.push(text.to_string());
        if closes {
            break;
        }
    }

    parse_body(&body)
}

fn parse_body(body: &[String]) -> DocBlock {
    let first_tag = body
        .iter()
        .position(|l| l.starts_with('@'))
        .unwrap_or(body.len());

    let mut paragraphs: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in &body[..first_tag] {
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    let short_description = paragraphs
        .first()
        .map(|p| p.join(" "))
        .unwrap_or_default();
    let long_description = paragraphs
        .iter()
        .skip(1)
        .map(|p| p.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut tags: Vec<String> = Vec::new();
    for line in &body[first_tag..] {
        if line.starts_with('@') {
            tags.push(line.clone());
        } else if !line.is_empty() {
            if let Some(last) = tags.last_mut() {
                last.push(' ');
                last.push_str(line);
            }
        }
    }

    let parameters = tags
        .iter()
        .filter_map(|tag| {
            let rest = tag.strip_prefix("@param")?;
            if !rest.starts_with(char::is_whitespace) {
                return None;
            }
            let mut parts = rest.trim().splitn(2, char::is_whitespace);
            let name = parts.next().filter(|n| !n.is_empty())?;
            Some(DocParameter {
                name: name.to_string(),
                description: parts.next().unwrap_or_default().trim().to_string(),
            })
        })
        .collect();

    DocBlock {
        short_description,
        long_description,
        parameters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_docblock() {
        let src = "/**\n * Selects the details of an order.\n *\n * Only orders of the current company\n * are visible.\n *\n * @param p_ord_id The ID of the order.\n * @param p_cmp_id The ID of the\n *                 company.\n */\ncreate procedure abc_order_get_details(in p_ord_id int, in p_cmp_id int)\nbegin\nend";
        let lines: Vec<&str> = src.lines().collect();
        let doc = extract_docblock(&lines);
        assert_eq!(doc.short_description, "Selects the details of an order.");
        assert_eq!(
            doc.long_description,
            "Only orders of the current company\nare visible."
        );
        assert_eq!(doc.parameters.len(), 2);
        assert_eq!(doc.parameter_description("p_ord_id"), Some("The ID of the order."));
        assert_eq!(doc.parameter_description("p_cmp_id"), Some("The ID of the company."));
    }

    #[test]
    fn test_no_docblock() {
        let lines = vec!["create procedure abc()", "begin", "end"];
        assert_eq!(extract_docblock(&lines), DocBlock::default());
    }

    #[test]
    fn test_comment_after_signature_is_ignored() {
        let lines = vec!["create procedure abc()", "/** Not a doc. */", "begin"];
        assert_eq!(extract_docblock(&lines), DocBlock::default());
    }

    #[test]
    fn test_single_line_docblock() {
        let lines = vec!["/** Deletes all sessions. */", "create procedure abc_session_purge()"];
        let doc = extract_docblock(&lines);
        assert_eq!(doc.short_description, "Deletes all sessions.");
        assert!(doc.parameters.is_empty());
    }

    #[test]
    fn test_other_tags_are_ignored() {
        let lines = vec![
            "/**",
            " * Purges.",
            " *",
            " * @since 1.2",
            " * @param p_age Max age.",
            " * @parameter bogus",
            " */",
            "create procedure abc_purge(p_age int)",
        ];
        let doc = extract_docblock(&lines);
        assert_eq!(
            doc.parameters,
            vec![DocParameter {
                name: "p_age".to_string(),
                description: "Max age.".to_string()
            }]
        );
    }
}
