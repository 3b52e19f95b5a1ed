//! Schema Model
//!
//! Immutable, in-memory view of a loaded interface model: shape ids, shape
//! kinds, ordered members and typed traits. Built once by the loader and
//! shared (behind an `Arc`) by the graph cache and the binding engine.
//!
//! The model is the Shape Index: a flat map from [`ShapeId`] to [`Shape`].
//! Member shapes are not stored separately; they live inside their parent
//! and are addressed with `namespace#Parent$member` ids.

pub mod loader;
pub mod traits;
pub mod uri;

pub use loader::{LoadConfig, PRELUDE_NAMESPACE};
pub use traits::{
    AuthenticatedTrait, HttpTrait, RangeTrait, TimestampFormat, Traits,
};
pub use uri::{Segment, UriPattern};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{BindingError, Result};

// =============================================================================
// Shape Id
// =============================================================================

fn shape_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)#([A-Za-z_][A-Za-z0-9_]*)(?:\$([A-Za-z_][A-Za-z0-9_]*))?$",
        )
        .expect("shape id pattern is a valid regex")
    })
}

/// Absolute shape identifier: `namespace#Name` or `namespace#Name$member`.
///
/// Ordering is by namespace, then name, then member, which keeps every
/// member sorted directly after its parent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShapeId {
    namespace: String,
    name: String,
    member: Option<String>,
}

impl ShapeId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            member: None,
        }
    }

    /// Parse an absolute shape id.
    pub fn parse(raw: &str) -> Result<Self> {
        let caps = shape_id_pattern()
            .captures(raw)
            .ok_or_else(|| BindingError::InvalidShapeId(raw.to_string()))?;
        Ok(Self {
            namespace: caps[1].to_string(),
            name: caps[2].to_string(),
            member: caps.get(3).map(|m| m.as_str().to_string()),
        })
    }

    /// Resolve a possibly-relative reference against a default namespace.
    pub fn resolve(raw: &str, default_namespace: &str) -> Result<Self> {
        if raw.contains('#') {
            Self::parse(raw)
        } else {
            Self::parse(&format!("{}#{}", default_namespace, raw))
        }
    }

    pub fn with_member(&self, member: impl Into<String>) -> Self {
        Self {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            member: Some(member.into()),
        }
    }

    /// The id of the shape that owns this member (or `self` for non-members).
    pub fn without_member(&self) -> Self {
        Self::new(self.namespace.clone(), self.name.clone())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self) -> Option<&str> {
        self.member.as_deref()
    }

    pub fn is_member(&self) -> bool {
        self.member.is_some()
    }

    /// Shapes from the built-in prelude namespace.
    pub fn is_prelude(&self) -> bool {
        self.namespace == PRELUDE_NAMESPACE
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.namespace, self.name)?;
        if let Some(member) = &self.member {
            write!(f, "${}", member)?;
        }
        Ok(())
    }
}

impl FromStr for ShapeId {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShapeId {
    type Error = BindingError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ShapeId> for String {
    fn from(id: ShapeId) -> Self {
        id.to_string()
    }
}

// =============================================================================
// Shape Type
// =============================================================================

/// Closed set of shape kinds a model can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeType {
    Blob,
    Boolean,
    String,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    Timestamp,
    Document,
    Enum,
    IntEnum,
    List,
    Set,
    Map,
    Structure,
    Union,
    Member,
    Service,
    Resource,
    Operation,
}

impl ShapeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::BigInteger => "bigInteger",
            Self::BigDecimal => "bigDecimal",
            Self::Timestamp => "timestamp",
            Self::Document => "document",
            Self::Enum => "enum",
            Self::IntEnum => "intEnum",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
            Self::Structure => "structure",
            Self::Union => "union",
            Self::Member => "member",
            Self::Service => "service",
            Self::Resource => "resource",
            Self::Operation => "operation",
        }
    }

    pub fn is_integer_family(&self) -> bool {
        matches!(self, Self::Byte | Self::Short | Self::Integer | Self::Long)
    }

    pub fn is_floating_family(&self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer_family()
            || self.is_floating_family()
            || matches!(self, Self::BigInteger | Self::BigDecimal)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List | Self::Set)
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShapeType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("unknown shape type '{}'", s))
    }
}

// =============================================================================
// Shapes
// =============================================================================

/// A named member of an aggregate shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberShape {
    pub id: ShapeId,
    pub name: String,
    pub target: ShapeId,
    #[serde(default)]
    pub traits: Traits,
}

/// Lifecycle operation bindings of a resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceLifecycle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<ShapeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<ShapeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<ShapeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<ShapeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<ShapeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list: Option<ShapeId>,
}

impl ResourceLifecycle {
    /// Bound lifecycle operations in expansion order.
    pub fn iter(&self) -> impl Iterator<Item = &ShapeId> {
        [
            &self.put,
            &self.create,
            &self.read,
            &self.update,
            &self.delete,
            &self.list,
        ]
        .into_iter()
        .flatten()
    }
}

/// A top-level shape in the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub shape_type: ShapeType,
    /// Members in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberShape>,
    #[serde(default)]
    pub traits: Traits,
    /// Operations bound to a service, or instance operations of a resource
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<ShapeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collection_operations: Vec<ShapeId>,
    /// Resources introduced by a service or resource
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ShapeId>,
    #[serde(default)]
    pub lifecycle: ResourceLifecycle,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub identifiers: BTreeMap<String, ShapeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<ShapeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ShapeId>,
    /// Errors declared by an operation or a service
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ShapeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mixins: Vec<ShapeId>,
}

impl Shape {
    pub fn new(id: ShapeId, shape_type: ShapeType) -> Self {
        Self {
            id,
            shape_type,
            members: Vec::new(),
            traits: Traits::default(),
            operations: Vec::new(),
            collection_operations: Vec::new(),
            resources: Vec::new(),
            lifecycle: ResourceLifecycle::default(),
            identifiers: BTreeMap::new(),
            input: None,
            output: None,
            errors: Vec::new(),
            mixins: Vec::new(),
        }
    }

    pub fn member(&self, name: &str) -> Option<&MemberShape> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Every operation bound to a resource: lifecycle first, then instance
    /// and collection operations. Duplicates are kept; callers dedupe.
    pub fn all_resource_operations(&self) -> impl Iterator<Item = &ShapeId> {
        self.lifecycle
            .iter()
            .chain(self.operations.iter())
            .chain(self.collection_operations.iter())
    }

    pub fn is_service(&self) -> bool {
        self.shape_type == ShapeType::Service
    }

    pub fn is_operation(&self) -> bool {
        self.shape_type == ShapeType::Operation
    }

    /// `smithy.api#Unit` stands for "no input/output".
    pub fn is_unit(&self) -> bool {
        self.id.is_prelude() && self.id.name() == "Unit"
    }
}

// =============================================================================
// Model (Shape Index)
// =============================================================================

/// Loaded model, indexed by shape id.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub(crate) shapes: BTreeMap<ShapeId, Shape>,
    /// SHA-256 over every loaded document, for cache diagnostics
    pub bundle_hash: String,
}

impl Model {
    /// Parse a single JSON AST document (prelude included).
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        loader::load_from_values(std::slice::from_ref(json))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(content)?;
        Self::from_json(&json)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        loader::load_from_files(&[path.to_path_buf()])
    }

    /// Load and merge every model document under a directory
    pub fn from_directory(dir: &Path) -> Result<Self> {
        loader::load_from_directory(dir, &LoadConfig::default())
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn get(&self, id: &ShapeId) -> Option<&Shape> {
        if id.is_member() {
            return None;
        }
        self.shapes.get(id)
    }

    pub fn contains(&self, id: &ShapeId) -> bool {
        match id.member() {
            Some(_) => self.get_member(id).is_some(),
            None => self.shapes.contains_key(id),
        }
    }

    pub fn expect_shape(&self, id: &ShapeId) -> Result<&Shape> {
        self.get(id)
            .ok_or_else(|| BindingError::UnknownShape(id.clone()))
    }

    /// Expect a shape of a given type.
    pub fn expect_shape_of(&self, id: &ShapeId, shape_type: ShapeType) -> Result<&Shape> {
        let shape = self.expect_shape(id)?;
        if shape.shape_type != shape_type {
            return Err(BindingError::InconsistentSchema {
                shape: id.clone(),
                message: format!("expected a {} but found a {}", shape_type, shape.shape_type),
            });
        }
        Ok(shape)
    }

    pub fn get_member(&self, id: &ShapeId) -> Option<&MemberShape> {
        let name = id.member()?;
        self.shapes.get(&id.without_member())?.member(name)
    }

    pub fn expect_member(&self, id: &ShapeId) -> Result<&MemberShape> {
        self.get_member(id)
            .ok_or_else(|| BindingError::UnknownShape(id.clone()))
    }

    /// Target shape of a member.
    pub fn target_of(&self, member: &MemberShape) -> Result<&Shape> {
        self.expect_shape(&member.target)
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.values()
    }

    pub fn shapes_of_type(&self, shape_type: ShapeType) -> impl Iterator<Item = &Shape> {
        self.shapes.values().filter(move |s| s.shape_type == shape_type)
    }

    /// Services in id order
    pub fn services(&self) -> impl Iterator<Item = &Shape> {
        self.shapes_of_type(ShapeType::Service)
    }

    pub fn operations(&self) -> impl Iterator<Item = &Shape> {
        self.shapes_of_type(ShapeType::Operation)
    }

    /// Fuzzy search over non-prelude shape names
    pub fn search(&self, query: &str, limit: usize) -> Vec<(i64, &ShapeId)> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        let matcher = SkimMatcherV2::default();
        let mut results: Vec<(i64, &ShapeId)> = self
            .shapes
            .values()
            .filter(|s| !s.id.is_prelude())
            .filter_map(|s| {
                matcher
                    .fuzzy_match(s.id.name(), query)
                    .map(|score| (score, &s.id))
            })
            .collect();

        results.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        results.truncate(limit);
        results
    }
}
