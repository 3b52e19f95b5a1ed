//! Declaration Policy Selector
//!
//! Chooses between failing on absence, substituting a default literal, or
//! yielding no value. A default always wins over `required`.

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{BindingError, Result};
use crate::model::{MemberShape, Shape, ShapeType};

/// A default value, already coerced to the target's kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum DefaultLiteral {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    BigInteger(String),
    BigDecimal(String),
    EnumConstant { member: String, value: String },
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for DefaultLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{:?}", s),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Float(n) => write!(f, "{}", n),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::BigInteger(s) | Self::BigDecimal(s) => f.write_str(s),
            Self::EnumConstant { member, .. } => f.write_str(member),
            Self::Timestamp(ts) => f.write_str(&ts.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeclarationPolicy {
    /// Absence raises `failure`
    RequiredOrFail { failure: String },
    WithDefault(DefaultLiteral),
    Nullable,
}

impl DeclarationPolicy {
    /// Whether the declared value can be absent at runtime
    pub fn is_nullable(&self) -> bool {
        matches!(self, Self::Nullable)
    }
}

impl fmt::Display for DeclarationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequiredOrFail { failure } => write!(f, "REQUIRED_OR_FAIL({})", failure),
            Self::WithDefault(literal) => write!(f, "WITH_DEFAULT({})", literal),
            Self::Nullable => f.write_str("NULLABLE"),
        }
    }
}

/// Effective default of a member. An explicit `null` on the member cancels a
/// default declared on its target.
pub fn effective_default<'a>(member: &'a MemberShape, target: &'a Shape) -> Option<&'a Value> {
    match &member.traits.default {
        Some(Value::Null) => None,
        Some(value) => Some(value),
        None => target.traits.default.as_ref().filter(|v| !v.is_null()),
    }
}

pub fn select_policy(member: &MemberShape, target: &Shape, failure: &str) -> Result<DeclarationPolicy> {
    if let Some(value) = effective_default(member, target) {
        return Ok(DeclarationPolicy::WithDefault(default_literal(member, target, value)?));
    }
    if member.traits.required {
        return Ok(DeclarationPolicy::RequiredOrFail {
            failure: failure.to_string(),
        });
    }
    Ok(DeclarationPolicy::Nullable)
}

fn big_integer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[-+]?\d+$").expect("big integer pattern is a valid regex"))
}

fn big_decimal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[-+]?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?$").expect("big decimal pattern is a valid regex")
    })
}

/// Coerce a raw default into a literal of the target's kind.
pub fn default_literal(member: &MemberShape, target: &Shape, value: &Value) -> Result<DefaultLiteral> {
    let invalid = |message: String| BindingError::InvalidDefault {
        shape: member.id.clone(),
        message,
    };
    let expected = |what: &str| invalid(format!("expected {} but found {}", what, value));

    match target.shape_type {
        ShapeType::String => value
            .as_str()
            .map(|s| DefaultLiteral::String(s.to_string()))
            .ok_or_else(|| expected("a string")),
        ShapeType::Boolean => value
            .as_bool()
            .map(DefaultLiteral::Boolean)
            .ok_or_else(|| expected("a boolean")),
        ShapeType::Byte | ShapeType::Short | ShapeType::Integer | ShapeType::Long => {
            let n = value.as_i64().ok_or_else(|| expected("an integer"))?;
            let (min, max) = match target.shape_type {
                ShapeType::Byte => (i8::MIN as i64, i8::MAX as i64),
                ShapeType::Short => (i16::MIN as i64, i16::MAX as i64),
                ShapeType::Integer => (i32::MIN as i64, i32::MAX as i64),
                _ => (i64::MIN, i64::MAX),
            };
            if n < min || n > max {
                return Err(invalid(format!("{} is out of range for {}", n, target.shape_type)));
            }
            Ok(DefaultLiteral::Integer(n))
        }
        ShapeType::Float | ShapeType::Double => value
            .as_f64()
            .map(DefaultLiteral::Float)
            .ok_or_else(|| expected("a number")),
        ShapeType::BigInteger => {
            let text = numeric_text(value).ok_or_else(|| expected("an integer"))?;
            if !big_integer_pattern().is_match(&text) {
                return Err(expected("an integer"));
            }
            Ok(DefaultLiteral::BigInteger(text))
        }
        ShapeType::BigDecimal => {
            let text = numeric_text(value).ok_or_else(|| expected("a decimal"))?;
            if !big_decimal_pattern().is_match(&text) {
                return Err(expected("a decimal"));
            }
            Ok(DefaultLiteral::BigDecimal(text))
        }
        ShapeType::Enum => {
            let raw = value.as_str().ok_or_else(|| expected("an enum value"))?;
            let constant = target
                .members
                .iter()
                .find(|m| match &m.traits.enum_value {
                    Some(Value::String(v)) => v == raw,
                    _ => m.name == raw,
                })
                .ok_or_else(|| invalid(format!("'{}' is not a value of {}", raw, target.id)))?;
            Ok(DefaultLiteral::EnumConstant {
                member: constant.name.clone(),
                value: raw.to_string(),
            })
        }
        ShapeType::Timestamp => parse_timestamp(value)
            .map(DefaultLiteral::Timestamp)
            .ok_or_else(|| expected("an RFC 3339 date-time or epoch seconds")),
        other => Err(BindingError::UnsupportedDefault {
            shape: member.id.clone(),
            kind: other,
        }),
    }
}

fn numeric_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.trim().to_string()),
        _ => None,
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                return Utc.timestamp_opt(secs, 0).single();
            }
            let secs = n.as_f64()?;
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1_000_000_000.0).round() as u32;
            Utc.timestamp_opt(whole as i64, nanos).single()
        }
        _ => None,
    }
}

/// Whether the member always has a value once declared
pub fn required_or_has_default(member: &MemberShape, target: &Shape) -> bool {
    member.traits.required || effective_default(member, target).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ShapeId, Traits};
    use serde_json::json;

    fn member(traits: Traits) -> MemberShape {
        MemberShape {
            id: ShapeId::parse("ex#Input$field").unwrap(),
            name: "field".to_string(),
            target: ShapeId::parse("smithy.api#Integer").unwrap(),
            traits,
        }
    }

    fn scalar(shape_type: ShapeType) -> Shape {
        Shape::new(ShapeId::parse("ex#Target").unwrap(), shape_type)
    }

    #[test]
    fn test_default_beats_required() {
        let traits = Traits {
            required: true,
            default: Some(json!(20)),
            ..Default::default()
        };
        let policy = select_policy(&member(traits), &scalar(ShapeType::Integer), "Invalid").unwrap();
        assert_eq!(policy, DeclarationPolicy::WithDefault(DefaultLiteral::Integer(20)));
    }

    #[test]
    fn test_required_and_nullable() {
        let required = Traits {
            required: true,
            ..Default::default()
        };
        let policy = select_policy(&member(required), &scalar(ShapeType::String), "Invalid").unwrap();
        assert_eq!(
            policy,
            DeclarationPolicy::RequiredOrFail {
                failure: "Invalid".to_string()
            }
        );
        let policy = select_policy(&member(Traits::default()), &scalar(ShapeType::String), "Invalid").unwrap();
        assert!(policy.is_nullable());
    }

    #[test]
    fn test_target_default_and_null_override() {
        let mut target = scalar(ShapeType::Boolean);
        target.traits.default = Some(json!(false));
        let policy = select_policy(&member(Traits::default()), &target, "Invalid").unwrap();
        assert_eq!(policy, DeclarationPolicy::WithDefault(DefaultLiteral::Boolean(false)));

        let cancelled = Traits {
            default: Some(Value::Null),
            ..Default::default()
        };
        let policy = select_policy(&member(cancelled), &target, "Invalid").unwrap();
        assert!(policy.is_nullable());
    }

    #[test]
    fn test_literal_coercion() {
        let m = member(Traits::default());
        assert!(matches!(
            default_literal(&m, &scalar(ShapeType::Byte), &json!(300)),
            Err(BindingError::InvalidDefault { .. })
        ));
        assert_eq!(
            default_literal(&m, &scalar(ShapeType::BigDecimal), &json!("12.50")).unwrap(),
            DefaultLiteral::BigDecimal("12.50".to_string())
        );
        let ts = default_literal(&m, &scalar(ShapeType::Timestamp), &json!("2020-01-02T03:04:05Z")).unwrap();
        assert_eq!(ts, DefaultLiteral::Timestamp(Utc.timestamp_opt(1577934245, 0).unwrap()));
        let epoch = default_literal(&m, &scalar(ShapeType::Timestamp), &json!(0)).unwrap();
        assert_eq!(epoch, DefaultLiteral::Timestamp(Utc.timestamp_opt(0, 0).unwrap()));
    }

    #[test]
    fn test_enum_default_maps_to_constant() {
        let mut target = scalar(ShapeType::Enum);
        let mut small = MemberShape {
            id: target.id.with_member("SMALL"),
            name: "SMALL".to_string(),
            target: ShapeId::parse("smithy.api#Unit").unwrap(),
            traits: Traits::default(),
        };
        small.traits.enum_value = Some(json!("small"));
        target.members.push(small);

        let m = member(Traits::default());
        assert_eq!(
            default_literal(&m, &target, &json!("small")).unwrap(),
            DefaultLiteral::EnumConstant {
                member: "SMALL".to_string(),
                value: "small".to_string()
            }
        );
        assert!(default_literal(&m, &target, &json!("huge")).is_err());
    }

    #[test]
    fn test_collection_default_is_unsupported() {
        let err = default_literal(&member(Traits::default()), &scalar(ShapeType::List), &json!([])).unwrap_err();
        assert!(matches!(err, BindingError::UnsupportedDefault { kind: ShapeType::List, .. }));
    }
}
