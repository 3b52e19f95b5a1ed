//! URI Patterns
//!
//! Parsed form of the `uri` member of an http binding: `/widgets/{id}/parts/{rest+}?kind=full`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::{BindingError, Result};

/// One `/`-separated path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    Literal(String),
    Label { name: String, greedy: bool },
}

impl Segment {
    pub fn is_label(&self) -> bool {
        matches!(self, Segment::Label { .. })
    }

    /// Label name, or the literal text.
    pub fn content(&self) -> &str {
        match self {
            Segment::Literal(text) => text,
            Segment::Label { name, .. } => name,
        }
    }
}

/// A label located inside a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelRef<'a> {
    /// 0-based position among labels only
    pub ordinal: usize,
    /// 0-based position among all path segments
    pub position: usize,
    pub name: &'a str,
    pub greedy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UriPattern {
    raw: String,
    segments: Vec<Segment>,
    /// Literal query-string entries (`?kind=full&verbose`)
    query: BTreeMap<String, Option<String>>,
}

fn is_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl UriPattern {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |detail: String| BindingError::InvalidModel(format!("uri pattern '{}': {}", raw, detail));

        let (path, query_str) = match raw.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (raw, None),
        };
        let Some(path) = path.strip_prefix('/') else {
            return Err(invalid("must start with '/'".to_string()));
        };

        let mut segments = Vec::new();
        let mut seen = HashSet::new();
        let mut greedy_seen = false;
        if !path.is_empty() {
            for part in path.split('/') {
                if part.is_empty() {
                    return Err(invalid("empty path segment".to_string()));
                }
                if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                    let (name, greedy) = match inner.strip_suffix('+') {
                        Some(name) => (name, true),
                        None => (inner, false),
                    };
                    if !is_label_name(name) {
                        return Err(invalid(format!("invalid label '{}'", inner)));
                    }
                    if !seen.insert(name.to_string()) {
                        return Err(invalid(format!("duplicate label '{}'", name)));
                    }
                    if greedy {
                        if greedy_seen {
                            return Err(invalid("more than one greedy label".to_string()));
                        }
                        greedy_seen = true;
                    }
                    segments.push(Segment::Label { name: name.to_string(), greedy });
                } else if part.contains('{') || part.contains('}') {
                    return Err(invalid(format!("label must span a whole segment: '{}'", part)));
                } else {
                    segments.push(Segment::Literal(part.to_string()));
                }
            }
        }

        let mut query = BTreeMap::new();
        if let Some(query_str) = query_str {
            for entry in query_str.split('&').filter(|e| !e.is_empty()) {
                let (key, value) = match entry.split_once('=') {
                    Some((k, v)) => (k, Some(v.to_string())),
                    None => (entry, None),
                };
                if key.contains('{') {
                    return Err(invalid("labels are not allowed in the query string".to_string()));
                }
                query.insert(key.to_string(), value);
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            query,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn query_literals(&self) -> &BTreeMap<String, Option<String>> {
        &self.query
    }

    /// Labels in path order
    pub fn labels(&self) -> impl Iterator<Item = LabelRef<'_>> {
        self.segments
            .iter()
            .enumerate()
            .filter_map(|(position, seg)| match seg {
                Segment::Label { name, greedy } => Some((position, name.as_str(), *greedy)),
                Segment::Literal(_) => None,
            })
            .enumerate()
            .map(|(ordinal, (position, name, greedy))| LabelRef {
                ordinal,
                position,
                name,
                greedy,
            })
    }

    pub fn label(&self, name: &str) -> Option<LabelRef<'_>> {
        self.labels().find(|l| l.name == name)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for UriPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for UriPattern {
    type Error = BindingError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<UriPattern> for String {
    fn from(pattern: UriPattern) -> Self {
        pattern.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_positions() {
        let pattern = UriPattern::parse("/widgets/{id}/parts/{part}").unwrap();
        let id = pattern.label("id").unwrap();
        assert_eq!((id.ordinal, id.position), (0, 1));
        let part = pattern.label("part").unwrap();
        assert_eq!((part.ordinal, part.position), (1, 3));
        assert!(pattern.label("missing").is_none());
    }

    #[test]
    fn test_greedy_and_query_literals() {
        let pattern = UriPattern::parse("/files/{path+}?download&format=raw").unwrap();
        let label = pattern.label("path").unwrap();
        assert!(label.greedy);
        assert_eq!(pattern.query_literals().get("download"), Some(&None));
        assert_eq!(
            pattern.query_literals().get("format"),
            Some(&Some("raw".to_string()))
        );
    }

    #[test]
    fn test_root_pattern_has_no_segments() {
        let pattern = UriPattern::parse("/").unwrap();
        assert!(pattern.segments().is_empty());
    }

    #[test]
    fn test_rejects_malformed_patterns() {
        assert!(UriPattern::parse("widgets").is_err());
        assert!(UriPattern::parse("/a//b").is_err());
        assert!(UriPattern::parse("/a/{id}/{id}").is_err());
        assert!(UriPattern::parse("/a/x{id}").is_err());
        assert!(UriPattern::parse("/{a+}/{b+}").is_err());
        assert!(UriPattern::parse("/a/{1bad}").is_err());
    }
}
