//! Origin Classifier
//!
//! Decides which single part of an inbound request a member is read from.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BindingError, Result};
use crate::model::{HttpTrait, MemberShape, ShapeId};

/// Closed set of request origins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OriginType {
    UriPath,
    UriQuery,
    HttpHeader,
    Payload,
    None,
}

impl OriginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UriPath => "URI_PATH",
            Self::UriQuery => "URI_QUERY",
            Self::HttpHeader => "HTTP_HEADER",
            Self::Payload => "PAYLOAD",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for OriginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a member's value comes from, with its qualifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Origin {
    UriPath {
        /// 0-based among the pattern's labels
        index: usize,
        /// 0-based among all path segments
        position: usize,
        label: String,
        greedy: bool,
    },
    UriQuery {
        name: String,
    },
    HttpHeader {
        name: String,
    },
    Payload {
        shape: ShapeId,
    },
    None,
}

impl Origin {
    pub fn origin_type(&self) -> OriginType {
        match self {
            Self::UriPath { .. } => OriginType::UriPath,
            Self::UriQuery { .. } => OriginType::UriQuery,
            Self::HttpHeader { .. } => OriginType::HttpHeader,
            Self::Payload { .. } => OriginType::Payload,
            Self::None => OriginType::None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn is_payload(&self) -> bool {
        matches!(self, Self::Payload { .. })
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UriPath { index, .. } => write!(f, "URI_PATH({})", index),
            Self::UriQuery { name } => write!(f, "URI_QUERY({})", name),
            Self::HttpHeader { name } => write!(f, "HTTP_HEADER({})", name),
            Self::Payload { shape } => write!(f, "PAYLOAD({})", shape),
            Self::None => f.write_str("NONE"),
        }
    }
}

/// Classify one input member against the operation's http binding.
///
/// Priority is payload, then label, then query, then header. A member carrying
/// more than one origin annotation is a binding conflict.
pub fn classify(member: &MemberShape, http: &HttpTrait) -> Result<Origin> {
    let traits = &member.traits;
    if traits.origin_annotation_count() > 1 {
        return Err(BindingError::conflict(
            &member.id,
            "member carries more than one of httpPayload, httpLabel, httpQuery, httpHeader",
        ));
    }

    if traits.http_payload {
        return Ok(Origin::Payload {
            shape: member.target.clone(),
        });
    }

    if traits.http_label {
        let label = http.uri.label(&member.name).ok_or_else(|| {
            BindingError::inconsistent(
                &member.id,
                format!("httpLabel member has no matching label in '{}'", http.uri),
            )
        })?;
        return Ok(Origin::UriPath {
            index: label.ordinal,
            position: label.position,
            label: label.name.to_string(),
            greedy: label.greedy,
        });
    }

    if let Some(name) = &traits.http_query {
        return Ok(Origin::UriQuery { name: name.clone() });
    }

    if let Some(name) = &traits.http_header {
        return Ok(Origin::HttpHeader { name: name.clone() });
    }

    Ok(Origin::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Traits, UriPattern};

    fn http(uri: &str) -> HttpTrait {
        HttpTrait {
            method: "GET".to_string(),
            uri: UriPattern::parse(uri).unwrap(),
            code: 200,
        }
    }

    fn member(name: &str, traits: Traits) -> MemberShape {
        MemberShape {
            id: ShapeId::parse("ex#Input").unwrap().with_member(name),
            name: name.to_string(),
            target: ShapeId::parse("smithy.api#String").unwrap(),
            traits,
        }
    }

    #[test]
    fn test_label_uses_label_ordinal() {
        let traits = Traits {
            http_label: true,
            ..Default::default()
        };
        let origin = classify(&member("part", traits), &http("/widgets/{id}/parts/{part}")).unwrap();
        assert_eq!(
            origin,
            Origin::UriPath {
                index: 1,
                position: 3,
                label: "part".to_string(),
                greedy: false
            }
        );
        assert_eq!(origin.to_string(), "URI_PATH(1)");
    }

    #[test]
    fn test_header_uses_wire_name() {
        let traits = Traits {
            http_header: Some("X-Request-Id".to_string()),
            ..Default::default()
        };
        let origin = classify(&member("requestId", traits), &http("/")).unwrap();
        assert_eq!(origin, Origin::HttpHeader { name: "X-Request-Id".to_string() });
    }

    #[test]
    fn test_query_and_header_conflict() {
        let traits = Traits {
            http_query: Some("q".to_string()),
            http_header: Some("X-Q".to_string()),
            ..Default::default()
        };
        let err = classify(&member("q", traits), &http("/")).unwrap_err();
        assert!(matches!(err, BindingError::BindingConflict { .. }));
    }

    #[test]
    fn test_label_without_segment_is_inconsistent() {
        let traits = Traits {
            http_label: true,
            ..Default::default()
        };
        let err = classify(&member("id", traits), &http("/widgets")).unwrap_err();
        assert!(matches!(err, BindingError::InconsistentSchema { .. }));
    }

    #[test]
    fn test_unannotated_member_is_none() {
        let origin = classify(&member("body", Traits::default()), &http("/")).unwrap();
        assert!(origin.is_none());
        assert_eq!(origin.origin_type(), OriginType::None);
    }
}
