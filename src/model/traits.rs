//! Typed Traits
//!
//! Decodes the trait map of a shape or member into the handful of traits the
//! binding engine reasons about. Anything else is kept raw in `other`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::uri::UriPattern;
use super::ShapeId;
use crate::error::{BindingError, Result};

pub const HTTP: &str = "smithy.api#http";
pub const HTTP_LABEL: &str = "smithy.api#httpLabel";
pub const HTTP_QUERY: &str = "smithy.api#httpQuery";
pub const HTTP_HEADER: &str = "smithy.api#httpHeader";
pub const HTTP_PAYLOAD: &str = "smithy.api#httpPayload";
pub const REQUIRED: &str = "smithy.api#required";
pub const DEFAULT: &str = "smithy.api#default";
pub const RANGE: &str = "smithy.api#range";
pub const UNIQUE_ITEMS: &str = "smithy.api#uniqueItems";
pub const ENUM_VALUE: &str = "smithy.api#enumValue";
pub const TIMESTAMP_FORMAT: &str = "smithy.api#timestampFormat";

/// Which trait marks an authenticated operation, and what it defaults to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthTraitConfig {
    pub trait_id: String,
    pub default_mechanism: String,
    pub default_payload: String,
}

impl Default for AuthTraitConfig {
    fn default() -> Self {
        Self {
            trait_id: "smithy.extensions#authenticated".to_string(),
            default_mechanism: "basic".to_string(),
            default_payload: "smithy.api#String".to_string(),
        }
    }
}

/// `@http(method, uri, code)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpTrait {
    pub method: String,
    pub uri: UriPattern,
    pub code: u16,
}

/// `@range(min, max)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeTrait {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl RangeTrait {
    /// Negatives are permitted unless a non-negative minimum is declared.
    pub fn allows_negative(&self) -> bool {
        match self.min {
            None => true,
            Some(min) => min < 0.0,
        }
    }
}

/// `@timestampFormat`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampFormat {
    DateTime,
    HttpDate,
    EpochSeconds,
}

/// Authentication requirement attached to an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedTrait {
    pub mechanism: String,
    pub optional: bool,
    pub payload: ShapeId,
}

/// Decoded traits of a shape or member
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Traits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpTrait>,
    #[serde(default)]
    pub http_label: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_header: Option<String>,
    #[serde(default)]
    pub http_payload: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeTrait>,
    #[serde(default)]
    pub unique_items: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_format: Option<TimestampFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticated: Option<AuthenticatedTrait>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub other: BTreeMap<String, Value>,
}

impl Traits {
    /// Decode a raw JSON AST trait map owned by `owner`.
    pub fn decode(owner: &ShapeId, raw: &Map<String, Value>, auth: &AuthTraitConfig) -> Result<Self> {
        let invalid = |trait_id: &str, detail: &str| {
            BindingError::InvalidModel(format!("{} on {}: {}", trait_id, owner, detail))
        };

        let mut traits = Traits::default();
        for (trait_id, value) in raw {
            match trait_id.as_str() {
                HTTP => traits.http = Some(decode_http(value).map_err(|e| invalid(HTTP, &e))?),
                HTTP_LABEL => traits.http_label = true,
                HTTP_QUERY => {
                    let name = value
                        .as_str()
                        .ok_or_else(|| invalid(HTTP_QUERY, "expected a parameter name"))?;
                    traits.http_query = Some(name.to_string());
                }
                HTTP_HEADER => {
                    let name = value
                        .as_str()
                        .ok_or_else(|| invalid(HTTP_HEADER, "expected a header name"))?;
                    traits.http_header = Some(name.to_string());
                }
                HTTP_PAYLOAD => traits.http_payload = true,
                REQUIRED => traits.required = true,
                DEFAULT => traits.default = Some(value.clone()),
                RANGE => {
                    let range: RangeTrait = serde_json::from_value(value.clone())
                        .map_err(|e| invalid(RANGE, &e.to_string()))?;
                    traits.range = Some(range);
                }
                UNIQUE_ITEMS => traits.unique_items = true,
                ENUM_VALUE => traits.enum_value = Some(value.clone()),
                TIMESTAMP_FORMAT => {
                    let format: TimestampFormat = serde_json::from_value(value.clone())
                        .map_err(|e| invalid(TIMESTAMP_FORMAT, &e.to_string()))?;
                    traits.timestamp_format = Some(format);
                }
                id if id == auth.trait_id => {
                    traits.authenticated =
                        Some(decode_authenticated(value, auth).map_err(|e| invalid(id, &e))?);
                }
                _ => {
                    traits.other.insert(trait_id.clone(), value.clone());
                }
            }
        }
        Ok(traits)
    }

    /// Number of request-origin annotations present.
    pub fn origin_annotation_count(&self) -> usize {
        [
            self.http_payload,
            self.http_label,
            self.http_query.is_some(),
            self.http_header.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

fn decode_http(value: &Value) -> std::result::Result<HttpTrait, String> {
    let obj = value.as_object().ok_or("expected an object")?;
    let method = obj
        .get("method")
        .and_then(|v| v.as_str())
        .ok_or("missing method")?
        .to_uppercase();
    let uri = obj
        .get("uri")
        .and_then(|v| v.as_str())
        .ok_or("missing uri")?;
    let code = match obj.get("code").and_then(|v| v.as_u64()) {
        Some(raw) => u16::try_from(raw).map_err(|_| format!("code {} is out of range", raw))?,
        None => 200,
    };
    let uri = UriPattern::parse(uri).map_err(|e| e.to_string())?;
    Ok(HttpTrait { method, uri, code })
}

// null, "mechanism", or { mechanism, optional, payload }
fn decode_authenticated(
    value: &Value,
    auth: &AuthTraitConfig,
) -> std::result::Result<AuthenticatedTrait, String> {
    let default_payload = || ShapeId::parse(&auth.default_payload).map_err(|e| e.to_string());
    match value {
        Value::Null => Ok(AuthenticatedTrait {
            mechanism: auth.default_mechanism.clone(),
            optional: false,
            payload: default_payload()?,
        }),
        Value::Object(obj) if obj.is_empty() => Ok(AuthenticatedTrait {
            mechanism: auth.default_mechanism.clone(),
            optional: false,
            payload: default_payload()?,
        }),
        Value::String(mechanism) => Ok(AuthenticatedTrait {
            mechanism: mechanism.clone(),
            optional: false,
            payload: default_payload()?,
        }),
        Value::Object(obj) => {
            let mechanism = obj
                .get("mechanism")
                .and_then(|v| v.as_str())
                .map(String::from)
                .unwrap_or_else(|| auth.default_mechanism.clone());
            let optional = obj.get("optional").and_then(|v| v.as_bool()).unwrap_or(false);
            let payload = match obj.get("payload").and_then(|v| v.as_str()) {
                Some(raw) => ShapeId::parse(raw).map_err(|e| e.to_string())?,
                None => default_payload()?,
            };
            Ok(AuthenticatedTrait {
                mechanism,
                optional,
                payload,
            })
        }
        _ => Err("takes either a single string, an object or nothing".to_string()),
    }
}
