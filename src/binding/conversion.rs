//! Type Conversion Resolver
//!
//! Maps a member's target kind to the chain that turns the raw request
//! string (or body) into the semantic value. Kinds without a rule for the
//! member's origin fail here, at assembly time.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::origin::Origin;
use crate::error::{BindingError, Result};
use crate::model::{MemberShape, Model, RangeTrait, Shape, ShapeId, ShapeType, TimestampFormat};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "conversion", rename_all = "kebab-case")]
pub enum ConversionChain {
    Identity,
    CastToNumeric { kind: ShapeType },
    ParseBigInteger,
    ParseBigDecimal,
    ParseTimestamp { format: TimestampFormat },
    ParseBoolean,
    /// Wrap the raw string in a model-defined type
    Construct { target: ShapeId },
    EnumConstant { target: ShapeId },
    IntEnum { target: ShapeId },
    Split {
        set: bool,
        delimiter: String,
        element: Box<ConversionChain>,
        #[serde(skip_serializing_if = "Option::is_none")]
        wrapper: Option<ShapeId>,
    },
    /// Whole-body decode into the payload shape
    Deserialize { target: ShapeId },
}

impl fmt::Display for ConversionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("identity"),
            Self::CastToNumeric { kind } => write!(f, "cast-to-{}", kind),
            Self::ParseBigInteger => f.write_str("parse-big-integer"),
            Self::ParseBigDecimal => f.write_str("parse-big-decimal"),
            Self::ParseTimestamp { format } => {
                let name = match format {
                    TimestampFormat::DateTime => "date-time",
                    TimestampFormat::HttpDate => "http-date",
                    TimestampFormat::EpochSeconds => "epoch-seconds",
                };
                write!(f, "parse-timestamp({})", name)
            }
            Self::ParseBoolean => f.write_str("parse-boolean"),
            Self::Construct { target } => write!(f, "construct({})", target),
            Self::EnumConstant { target } => write!(f, "enum-constant({})", target),
            Self::IntEnum { target } => write!(f, "int-enum({})", target),
            Self::Split {
                set,
                delimiter,
                element,
                ..
            } => write!(
                f,
                "split-to-{}({:?}, {})",
                if *set { "set" } else { "list" },
                delimiter,
                element
            ),
            Self::Deserialize { target } => write!(f, "deserialize({})", target),
        }
    }
}

/// Advisory range metadata for numeric query parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryRange {
    pub allow_negative: bool,
    pub allow_decimal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeTrait>,
}

pub struct ConversionResolver<'a> {
    model: &'a Model,
    delimiter: &'a str,
}

impl<'a> ConversionResolver<'a> {
    pub fn new(model: &'a Model, delimiter: &'a str) -> Self {
        Self { model, delimiter }
    }

    pub fn resolve(&self, member: &MemberShape, target: &Shape, origin: &Origin) -> Result<ConversionChain> {
        let unsupported = || BindingError::UnsupportedConversion {
            shape: member.id.clone(),
            kind: target.shape_type,
            origin: origin.origin_type().to_string(),
        };

        match origin {
            Origin::None => Err(unsupported()),
            Origin::Payload { shape } => Ok(ConversionChain::Deserialize { target: shape.clone() }),
            Origin::UriPath { .. } if target.shape_type.is_collection() => Err(unsupported()),
            Origin::UriPath { .. } | Origin::UriQuery { .. } | Origin::HttpHeader { .. } => {
                if target.shape_type.is_collection() {
                    return self.resolve_collection(member, target, origin);
                }
                let format = timestamp_format(member, target, origin);
                scalar_chain(target, format).ok_or_else(unsupported)
            }
        }
    }

    fn resolve_collection(&self, member: &MemberShape, target: &Shape, origin: &Origin) -> Result<ConversionChain> {
        let element_member = target.member("member").ok_or_else(|| {
            BindingError::inconsistent(&target.id, "collection without a member")
        })?;
        let element = self.model.target_of(element_member)?;
        if element.shape_type.is_collection() || element.shape_type == ShapeType::Map {
            return Err(BindingError::UnsupportedConversion {
                shape: member.id.clone(),
                kind: element.shape_type,
                origin: format!("{} (nested collection)", origin.origin_type()),
            });
        }

        let format = timestamp_format(element_member, element, origin);
        let element_chain = scalar_chain(element, format).ok_or_else(|| BindingError::UnsupportedConversion {
            shape: member.id.clone(),
            kind: element.shape_type,
            origin: origin.origin_type().to_string(),
        })?;

        Ok(ConversionChain::Split {
            set: target.shape_type == ShapeType::Set || target.traits.unique_items,
            delimiter: self.delimiter.to_string(),
            element: Box::new(element_chain),
            wrapper: (!target.id.is_prelude()).then(|| target.id.clone()),
        })
    }

    /// Range metadata for a numeric query parameter; `None` for anything else.
    pub fn query_range(&self, member: &MemberShape, target: &Shape, origin: &Origin) -> Option<QueryRange> {
        if !matches!(origin, Origin::UriQuery { .. }) || !target.shape_type.is_numeric() {
            return None;
        }
        let range = member.traits.range.or(target.traits.range);
        Some(QueryRange {
            allow_negative: range.map(|r| r.allows_negative()).unwrap_or(true),
            allow_decimal: target.shape_type.is_floating_family() || target.shape_type == ShapeType::BigDecimal,
            range,
        })
    }
}

/// Header timestamps default to http-date, everything else to date-time.
fn timestamp_format(member: &MemberShape, target: &Shape, origin: &Origin) -> TimestampFormat {
    member
        .traits
        .timestamp_format
        .or(target.traits.timestamp_format)
        .unwrap_or(match origin {
            Origin::HttpHeader { .. } => TimestampFormat::HttpDate,
            _ => TimestampFormat::DateTime,
        })
}

fn scalar_chain(target: &Shape, format: TimestampFormat) -> Option<ConversionChain> {
    let chain = match target.shape_type {
        ShapeType::Byte
        | ShapeType::Short
        | ShapeType::Integer
        | ShapeType::Long
        | ShapeType::Float
        | ShapeType::Double => ConversionChain::CastToNumeric {
            kind: target.shape_type,
        },
        ShapeType::String if target.id.is_prelude() => ConversionChain::Identity,
        ShapeType::String => ConversionChain::Construct {
            target: target.id.clone(),
        },
        ShapeType::BigInteger => ConversionChain::ParseBigInteger,
        ShapeType::BigDecimal => ConversionChain::ParseBigDecimal,
        ShapeType::Boolean => ConversionChain::ParseBoolean,
        ShapeType::Timestamp => ConversionChain::ParseTimestamp { format },
        ShapeType::Enum => ConversionChain::EnumConstant {
            target: target.id.clone(),
        },
        ShapeType::IntEnum => ConversionChain::IntEnum {
            target: target.id.clone(),
        },
        ShapeType::Blob
        | ShapeType::Document
        | ShapeType::List
        | ShapeType::Set
        | ShapeType::Map
        | ShapeType::Structure
        | ShapeType::Union
        | ShapeType::Member
        | ShapeType::Service
        | ShapeType::Resource
        | ShapeType::Operation => return None,
    };
    Some(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Traits;
    use serde_json::json;

    fn model() -> Model {
        Model::from_json(&json!({
            "smithy": "2.0",
            "shapes": {
                "ex#Tags": { "type": "list", "member": { "target": "smithy.api#String" } },
                "ex#Ids": {
                    "type": "list",
                    "member": { "target": "smithy.api#Long" },
                    "traits": { "smithy.api#uniqueItems": {} }
                },
                "ex#Matrix": { "type": "list", "member": { "target": "ex#Tags" } },
                "ex#Name": { "type": "string" },
                "ex#Attrs": {
                    "type": "map",
                    "key": { "target": "smithy.api#String" },
                    "value": { "target": "smithy.api#String" }
                }
            }
        }))
        .unwrap()
    }

    fn member(target: &str, traits: Traits) -> MemberShape {
        MemberShape {
            id: ShapeId::parse("ex#Input$field").unwrap(),
            name: "field".to_string(),
            target: ShapeId::parse(target).unwrap(),
            traits,
        }
    }

    fn query() -> Origin {
        Origin::UriQuery { name: "field".to_string() }
    }

    fn resolve(model: &Model, target: &str, origin: &Origin) -> Result<ConversionChain> {
        let m = member(target, Traits::default());
        let shape = model.expect_shape(&m.target).unwrap();
        ConversionResolver::new(model, ",").resolve(&m, shape, origin)
    }

    #[test]
    fn test_scalar_chains() {
        let model = model();
        assert_eq!(resolve(&model, "smithy.api#String", &query()).unwrap(), ConversionChain::Identity);
        assert_eq!(
            resolve(&model, "ex#Name", &query()).unwrap(),
            ConversionChain::Construct { target: ShapeId::parse("ex#Name").unwrap() }
        );
        assert_eq!(
            resolve(&model, "smithy.api#Integer", &query()).unwrap(),
            ConversionChain::CastToNumeric { kind: ShapeType::Integer }
        );
        assert_eq!(
            resolve(&model, "smithy.api#BigDecimal", &query()).unwrap(),
            ConversionChain::ParseBigDecimal
        );
    }

    #[test]
    fn test_timestamp_format_depends_on_origin() {
        let model = model();
        let header = Origin::HttpHeader { name: "If-Modified-Since".to_string() };
        assert_eq!(
            resolve(&model, "smithy.api#Timestamp", &header).unwrap(),
            ConversionChain::ParseTimestamp { format: TimestampFormat::HttpDate }
        );
        assert_eq!(
            resolve(&model, "smithy.api#Timestamp", &query()).unwrap(),
            ConversionChain::ParseTimestamp { format: TimestampFormat::DateTime }
        );
    }

    #[test]
    fn test_collections_split() {
        let model = model();
        let tags = resolve(&model, "ex#Tags", &query()).unwrap();
        assert_eq!(
            tags,
            ConversionChain::Split {
                set: false,
                delimiter: ",".to_string(),
                element: Box::new(ConversionChain::Identity),
                wrapper: Some(ShapeId::parse("ex#Tags").unwrap()),
            }
        );
        match resolve(&model, "ex#Ids", &query()).unwrap() {
            ConversionChain::Split { set, element, .. } => {
                assert!(set);
                assert_eq!(*element, ConversionChain::CastToNumeric { kind: ShapeType::Long });
            }
            other => panic!("unexpected chain {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_kinds_fail_fast() {
        let model = model();
        assert!(matches!(
            resolve(&model, "ex#Attrs", &query()),
            Err(BindingError::UnsupportedConversion { kind: ShapeType::Map, .. })
        ));
        assert!(matches!(
            resolve(&model, "ex#Matrix", &query()),
            Err(BindingError::UnsupportedConversion { kind: ShapeType::List, .. })
        ));
        let path = Origin::UriPath { index: 0, position: 1, label: "field".to_string(), greedy: false };
        assert!(resolve(&model, "ex#Tags", &path).is_err());
        assert!(resolve(&model, "smithy.api#Blob", &query()).is_err());
    }

    #[test]
    fn test_payload_deserializes_anything() {
        let model = model();
        let payload = Origin::Payload { shape: ShapeId::parse("ex#Attrs").unwrap() };
        assert_eq!(
            resolve(&model, "ex#Attrs", &payload).unwrap(),
            ConversionChain::Deserialize { target: ShapeId::parse("ex#Attrs").unwrap() }
        );
    }

    #[test]
    fn test_query_range_metadata() {
        let model = model();
        let resolver = ConversionResolver::new(&model, ",");
        let integer = model.expect_shape(&ShapeId::parse("smithy.api#Integer").unwrap()).unwrap();

        let open = resolver
            .query_range(&member("smithy.api#Integer", Traits::default()), integer, &query())
            .unwrap();
        assert!(open.allow_negative);
        assert!(!open.allow_decimal);

        let bounded = Traits {
            range: Some(RangeTrait { min: Some(1.0), max: Some(100.0) }),
            ..Default::default()
        };
        let bounded = resolver
            .query_range(&member("smithy.api#Integer", bounded), integer, &query())
            .unwrap();
        assert!(!bounded.allow_negative);

        let header = Origin::HttpHeader { name: "X-Count".to_string() };
        assert!(resolver
            .query_range(&member("smithy.api#Integer", Traits::default()), integer, &header)
            .is_none());
    }
}
