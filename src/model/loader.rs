//! Model Loading
//!
//! Loads JSON AST model documents from the filesystem or from memory, merges
//! their shapes with the prelude, and checks that every reference resolves.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::traits::{AuthTraitConfig, Traits};
use super::{MemberShape, Model, Shape, ShapeId, ShapeType};
use crate::error::{BindingError, Result};

pub const PRELUDE_NAMESPACE: &str = "smithy.api";

/// Configuration for model loading
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Skip documents matching these path prefixes
    pub skip_prefixes: Vec<String>,
    /// Only load documents matching these path prefixes
    pub include_prefixes: Vec<String>,
    /// How the authentication trait is recognised
    pub auth: AuthTraitConfig,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: vec![
                "target/".to_string(),
                ".git/".to_string(),
                "node_modules/".to_string(),
                "build/".to_string(),
            ],
            include_prefixes: Vec::new(),
            auth: AuthTraitConfig::default(),
        }
    }
}

/// Load every `*.json` model document under a directory
pub fn load_from_directory(dir: &Path, config: &LoadConfig) -> Result<Model> {
    load_from_paths(&[dir.to_path_buf()], config)
}

/// Load specific model files with the default configuration
pub fn load_from_files(paths: &[PathBuf]) -> Result<Model> {
    load_from_paths(paths, &LoadConfig::default())
}

/// Load a mix of model files and directories into one model
pub fn load_from_paths(paths: &[PathBuf], config: &LoadConfig) -> Result<Model> {
    let mut hasher = Sha256::new();
    let mut documents = Vec::new();

    for root in paths {
        let files = if root.is_dir() {
            directory_files(root, config)
        } else {
            vec![root.clone()]
        };
        for path in files {
            let content = fs::read_to_string(&path)?;
            hasher.update(content.as_bytes());
            let json: Value = serde_json::from_str(&content).map_err(|e| {
                BindingError::InvalidModel(format!("failed to parse JSON in {}: {}", path.display(), e))
            })?;
            debug!(path = %path.display(), "loaded model document");
            documents.push(json);
        }
    }

    let bundle_hash = format!("{:x}", hasher.finalize());
    build_model(&documents, config, bundle_hash)
}

/// `*.json` files under `dir` that pass the prefix filters, sorted
fn directory_files(dir: &Path, config: &LoadConfig) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file())
        .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
        .filter(|path| {
            let relative = path
                .strip_prefix(dir)
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_else(|_| path.to_string_lossy().to_string());
            let included = config.include_prefixes.is_empty()
                || config.include_prefixes.iter().any(|p| relative.starts_with(p));
            included && !config.skip_prefixes.iter().any(|p| relative.starts_with(p))
        })
        .collect();
    // WalkDir order is filesystem dependent
    paths.sort();
    paths
}

/// Load already-parsed documents with the default configuration
pub fn load_from_values(documents: &[Value]) -> Result<Model> {
    load_with_config(documents, &LoadConfig::default())
}

pub fn load_with_config(documents: &[Value], config: &LoadConfig) -> Result<Model> {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(serde_json::to_vec(doc)?);
    }
    let bundle_hash = format!("{:x}", hasher.finalize());
    build_model(documents, config, bundle_hash)
}

fn build_model(documents: &[Value], config: &LoadConfig, bundle_hash: String) -> Result<Model> {
    let mut shapes: BTreeMap<ShapeId, Shape> = prelude()
        .into_iter()
        .map(|s| (s.id.clone(), s))
        .collect();
    let mut applies: Vec<(ShapeId, Traits)> = Vec::new();

    for doc in documents {
        let Some(doc_shapes) = doc.get("shapes").and_then(|v| v.as_object()) else {
            return Err(BindingError::InvalidModel(
                "model document has no 'shapes' object".to_string(),
            ));
        };

        for (raw_id, body) in doc_shapes {
            let id = ShapeId::parse(raw_id)?;
            let body = body.as_object().ok_or_else(|| {
                BindingError::InvalidModel(format!("shape {} is not an object", id))
            })?;

            if body.get("type").and_then(|t| t.as_str()) == Some("apply") {
                let traits = decode_traits(&id, body, &config.auth)?;
                applies.push((id, traits));
                continue;
            }

            let shape = parse_shape(&id, body, &config.auth)?;
            if shapes.contains_key(&id) && !id.is_prelude() {
                return Err(BindingError::InvalidModel(format!("duplicate shape {}", id)));
            }
            shapes.insert(id, shape);
        }
    }

    // members inherited from a mixin only exist once mixins are flattened
    let (inherited, direct): (Vec<_>, Vec<_>) = applies
        .into_iter()
        .partition(|(id, _)| targets_missing_member(&shapes, id));
    for (id, traits) in direct {
        apply_traits(&mut shapes, &id, traits)?;
    }
    flatten_mixins(&mut shapes)?;
    for (id, traits) in inherited {
        apply_traits(&mut shapes, &id, traits)?;
    }

    let model = Model { shapes, bundle_hash };
    validate_references(&model)?;
    Ok(model)
}

fn decode_traits(owner: &ShapeId, body: &Map<String, Value>, auth: &AuthTraitConfig) -> Result<Traits> {
    match body.get("traits") {
        Some(Value::Object(raw)) => Traits::decode(owner, raw, auth),
        Some(_) => Err(BindingError::InvalidModel(format!("traits of {} must be an object", owner))),
        None => Ok(Traits::default()),
    }
}

fn reference(owner: &ShapeId, value: &Value) -> Result<ShapeId> {
    let target = value
        .get("target")
        .and_then(|t| t.as_str())
        .ok_or_else(|| BindingError::InvalidModel(format!("{}: reference without a target", owner)))?;
    ShapeId::parse(target)
}

fn optional_reference(owner: &ShapeId, body: &Map<String, Value>, key: &str) -> Result<Option<ShapeId>> {
    body.get(key).map(|v| reference(owner, v)).transpose()
}

fn references(owner: &ShapeId, body: &Map<String, Value>, key: &str) -> Result<Vec<ShapeId>> {
    match body.get(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(|v| reference(owner, v)).collect(),
        Some(_) => Err(BindingError::InvalidModel(format!("{}: '{}' must be an array", owner, key))),
    }
}

fn parse_member(parent: &ShapeId, name: &str, body: &Value, auth: &AuthTraitConfig) -> Result<MemberShape> {
    let id = parent.with_member(name);
    let obj = body
        .as_object()
        .ok_or_else(|| BindingError::InvalidModel(format!("member {} is not an object", id)))?;
    Ok(MemberShape {
        target: reference(&id, body)?,
        traits: decode_traits(&id, obj, auth)?,
        name: name.to_string(),
        id,
    })
}

fn parse_shape(id: &ShapeId, body: &Map<String, Value>, auth: &AuthTraitConfig) -> Result<Shape> {
    let type_name = body
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| BindingError::InvalidModel(format!("shape {} has no type", id)))?;
    let shape_type: ShapeType = type_name
        .parse()
        .map_err(|e: String| BindingError::InvalidModel(format!("{}: {}", id, e)))?;

    let mut shape = Shape::new(id.clone(), shape_type);
    shape.traits = decode_traits(id, body, auth)?;

    match shape_type {
        ShapeType::List | ShapeType::Set => {
            if let Some(member) = body.get("member") {
                shape.members.push(parse_member(id, "member", member, auth)?);
            }
        }
        ShapeType::Map => {
            for key in ["key", "value"] {
                if let Some(member) = body.get(key) {
                    shape.members.push(parse_member(id, key, member, auth)?);
                }
            }
        }
        _ => {
            if let Some(members) = body.get("members").and_then(|m| m.as_object()) {
                for (name, member) in members {
                    shape.members.push(parse_member(id, name, member, auth)?);
                }
            }
        }
    }

    shape.mixins = references(id, body, "mixins")?;

    match shape_type {
        ShapeType::Service => {
            shape.operations = references(id, body, "operations")?;
            shape.resources = references(id, body, "resources")?;
            shape.errors = references(id, body, "errors")?;
        }
        ShapeType::Resource => {
            shape.lifecycle.put = optional_reference(id, body, "put")?;
            shape.lifecycle.create = optional_reference(id, body, "create")?;
            shape.lifecycle.read = optional_reference(id, body, "read")?;
            shape.lifecycle.update = optional_reference(id, body, "update")?;
            shape.lifecycle.delete = optional_reference(id, body, "delete")?;
            shape.lifecycle.list = optional_reference(id, body, "list")?;
            shape.operations = references(id, body, "operations")?;
            shape.collection_operations = references(id, body, "collectionOperations")?;
            shape.resources = references(id, body, "resources")?;
            if let Some(identifiers) = body.get("identifiers").and_then(|v| v.as_object()) {
                for (name, target) in identifiers {
                    shape.identifiers.insert(name.clone(), reference(id, target)?);
                }
            }
        }
        ShapeType::Operation => {
            shape.input = optional_reference(id, body, "input")?;
            shape.output = optional_reference(id, body, "output")?;
            shape.errors = references(id, body, "errors")?;
        }
        _ => {}
    }

    Ok(shape)
}

// `apply` statements may target a shape or one of its members.
fn apply_traits(shapes: &mut BTreeMap<ShapeId, Shape>, id: &ShapeId, traits: Traits) -> Result<()> {
    let parent = shapes
        .get_mut(&id.without_member())
        .ok_or_else(|| BindingError::UnknownShape(id.clone()))?;
    let target = match id.member() {
        Some(name) => {
            &mut parent
                .members
                .iter_mut()
                .find(|m| m.name == name)
                .ok_or_else(|| BindingError::UnknownShape(id.clone()))?
                .traits
        }
        None => &mut parent.traits,
    };
    merge_traits(target, traits);
    Ok(())
}

fn targets_missing_member(shapes: &BTreeMap<ShapeId, Shape>, id: &ShapeId) -> bool {
    let (Some(name), Some(parent)) = (id.member(), shapes.get(&id.without_member())) else {
        return false;
    };
    parent.member(name).is_none() && !parent.mixins.is_empty()
}

/// Copy mixin members into every shape that uses mixins.
///
/// Inherited members come first, in mixin order, followed by the shape's own.
/// A member the shape redeclares keeps its inherited position and layers its
/// traits over the inherited ones.
fn flatten_mixins(shapes: &mut BTreeMap<ShapeId, Shape>) -> Result<()> {
    let users: Vec<ShapeId> = shapes
        .values()
        .filter(|s| !s.mixins.is_empty())
        .map(|s| s.id.clone())
        .collect();

    let mut resolved = BTreeMap::new();
    for id in &users {
        resolved_members(shapes, id, &mut BTreeSet::new(), &mut resolved)?;
    }
    for id in users {
        if let (Some(members), Some(shape)) = (resolved.remove(&id), shapes.get_mut(&id)) {
            debug!(shape = %id, members = members.len(), "flattened mixin members");
            shape.members = members;
        }
    }
    Ok(())
}

fn resolved_members(
    shapes: &BTreeMap<ShapeId, Shape>,
    id: &ShapeId,
    visiting: &mut BTreeSet<ShapeId>,
    resolved: &mut BTreeMap<ShapeId, Vec<MemberShape>>,
) -> Result<Vec<MemberShape>> {
    if let Some(members) = resolved.get(id) {
        return Ok(members.clone());
    }
    if !visiting.insert(id.clone()) {
        return Err(BindingError::InvalidModel(format!("mixin cycle through {}", id)));
    }
    let shape = shapes
        .get(id)
        .ok_or_else(|| BindingError::UnknownShape(id.clone()))?;

    let mut members: Vec<MemberShape> = Vec::new();
    for mixin in &shape.mixins {
        for inherited in resolved_members(shapes, mixin, visiting, resolved)? {
            let member = MemberShape {
                id: id.with_member(inherited.name.clone()),
                ..inherited
            };
            match members.iter_mut().find(|m| m.name == member.name) {
                Some(existing) => *existing = member,
                None => members.push(member),
            }
        }
    }
    for own in &shape.members {
        match members.iter_mut().find(|m| m.name == own.name) {
            Some(existing) => {
                existing.target = own.target.clone();
                merge_traits(&mut existing.traits, own.traits.clone());
            }
            None => members.push(own.clone()),
        }
    }

    visiting.remove(id);
    resolved.insert(id.clone(), members.clone());
    Ok(members)
}

fn merge_traits(into: &mut Traits, from: Traits) {
    into.http = from.http.or(into.http.take());
    into.http_label |= from.http_label;
    into.http_query = from.http_query.or(into.http_query.take());
    into.http_header = from.http_header.or(into.http_header.take());
    into.http_payload |= from.http_payload;
    into.required |= from.required;
    into.default = from.default.or(into.default.take());
    into.range = from.range.or(into.range.take());
    into.unique_items |= from.unique_items;
    into.enum_value = from.enum_value.or(into.enum_value.take());
    into.timestamp_format = from.timestamp_format.or(into.timestamp_format.take());
    into.authenticated = from.authenticated.or(into.authenticated.take());
    into.other.extend(from.other);
}

fn validate_references(model: &Model) -> Result<()> {
    for shape in model.shapes.values() {
        let member_targets = shape.members.iter().map(|m| &m.target);
        let refs = member_targets
            .chain(shape.operations.iter())
            .chain(shape.collection_operations.iter())
            .chain(shape.resources.iter())
            .chain(shape.lifecycle.iter())
            .chain(shape.identifiers.values())
            .chain(shape.input.iter())
            .chain(shape.output.iter())
            .chain(shape.errors.iter())
            .chain(shape.mixins.iter());
        for target in refs {
            if !model.shapes.contains_key(target) {
                return Err(BindingError::UnknownShape(target.clone()));
            }
        }
    }
    Ok(())
}

/// Built-in scalar shapes every model can target
fn prelude() -> Vec<Shape> {
    let simple = [
        ("Blob", ShapeType::Blob),
        ("Boolean", ShapeType::Boolean),
        ("String", ShapeType::String),
        ("Byte", ShapeType::Byte),
        ("Short", ShapeType::Short),
        ("Integer", ShapeType::Integer),
        ("Long", ShapeType::Long),
        ("Float", ShapeType::Float),
        ("Double", ShapeType::Double),
        ("BigInteger", ShapeType::BigInteger),
        ("BigDecimal", ShapeType::BigDecimal),
        ("Timestamp", ShapeType::Timestamp),
        ("Document", ShapeType::Document),
        ("Unit", ShapeType::Structure),
    ];
    let primitives = [
        ("PrimitiveBoolean", ShapeType::Boolean, Value::Bool(false)),
        ("PrimitiveByte", ShapeType::Byte, Value::from(0)),
        ("PrimitiveShort", ShapeType::Short, Value::from(0)),
        ("PrimitiveInteger", ShapeType::Integer, Value::from(0)),
        ("PrimitiveLong", ShapeType::Long, Value::from(0)),
        ("PrimitiveFloat", ShapeType::Float, Value::from(0)),
        ("PrimitiveDouble", ShapeType::Double, Value::from(0)),
    ];

    let mut shapes: Vec<Shape> = simple
        .into_iter()
        .map(|(name, ty)| Shape::new(ShapeId::new(PRELUDE_NAMESPACE, name), ty))
        .collect();
    for (name, ty, default) in primitives {
        let mut shape = Shape::new(ShapeId::new(PRELUDE_NAMESPACE, name), ty);
        shape.traits.default = Some(default);
        shapes.push(shape);
    }
    shapes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn widgets() -> Value {
        json!({
            "smithy": "2.0",
            "shapes": {
                "ex#GetWidgetInput": {
                    "type": "structure",
                    "members": {
                        "zeta": { "target": "smithy.api#String" },
                        "alpha": { "target": "smithy.api#Integer" }
                    }
                },
                "ex#Tags": {
                    "type": "list",
                    "member": { "target": "smithy.api#String" }
                },
                "ex#GetWidgetInput$alpha": {
                    "type": "apply",
                    "traits": { "smithy.api#required": {} }
                }
            }
        })
    }

    #[test]
    fn test_members_keep_declaration_order() {
        let model = load_from_values(&[widgets()]).unwrap();
        let input = model.expect_shape(&ShapeId::parse("ex#GetWidgetInput").unwrap()).unwrap();
        let names: Vec<&str> = input.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_apply_merges_member_traits() {
        let model = load_from_values(&[widgets()]).unwrap();
        let alpha = model
            .expect_member(&ShapeId::parse("ex#GetWidgetInput$alpha").unwrap())
            .unwrap();
        assert!(alpha.traits.required);
    }

    #[test]
    fn test_prelude_is_present() {
        let model = load_from_values(&[widgets()]).unwrap();
        let prim = model
            .expect_shape(&ShapeId::parse("smithy.api#PrimitiveInteger").unwrap())
            .unwrap();
        assert_eq!(prim.traits.default, Some(json!(0)));
        let list = model.expect_shape(&ShapeId::parse("ex#Tags").unwrap()).unwrap();
        assert_eq!(list.members[0].id.to_string(), "ex#Tags$member");
    }

    fn paged() -> Value {
        json!({
            "shapes": {
                "ex#PageSize": {
                    "type": "structure",
                    "members": {
                        "limit": {
                            "target": "smithy.api#Integer",
                            "traits": { "smithy.api#httpQuery": "limit", "smithy.api#default": 20 }
                        }
                    },
                    "traits": { "smithy.api#mixin": {} }
                },
                "ex#Paging": {
                    "type": "structure",
                    "mixins": [{ "target": "ex#PageSize" }],
                    "members": {
                        "nextToken": {
                            "target": "smithy.api#String",
                            "traits": { "smithy.api#httpQuery": "nextToken" }
                        }
                    },
                    "traits": { "smithy.api#mixin": {} }
                },
                "ex#ListInput": {
                    "type": "structure",
                    "mixins": [{ "target": "ex#Paging" }],
                    "members": {
                        "prefix": {
                            "target": "smithy.api#String",
                            "traits": { "smithy.api#httpQuery": "prefix" }
                        },
                        "limit": {
                            "target": "smithy.api#Integer",
                            "traits": { "smithy.api#range": { "min": 1, "max": 50 } }
                        }
                    }
                },
                "ex#ListInput$nextToken": {
                    "type": "apply",
                    "traits": { "smithy.api#required": {} }
                }
            }
        })
    }

    #[test]
    fn test_mixin_members_are_flattened() {
        let model = load_from_values(&[paged()]).unwrap();
        let input = model.expect_shape(&ShapeId::parse("ex#ListInput").unwrap()).unwrap();
        let names: Vec<&str> = input.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["limit", "nextToken", "prefix"]);
        assert_eq!(input.mixins, vec![ShapeId::parse("ex#Paging").unwrap()]);

        // redeclared member keeps the inherited binding and adds its own constraint
        let limit = model.expect_member(&ShapeId::parse("ex#ListInput$limit").unwrap()).unwrap();
        assert_eq!(limit.traits.http_query.as_deref(), Some("limit"));
        assert_eq!(limit.traits.default, Some(json!(20)));
        assert_eq!(limit.traits.range.as_ref().and_then(|r| r.max), Some(50.0));

        let token = model
            .expect_member(&ShapeId::parse("ex#ListInput$nextToken").unwrap())
            .unwrap();
        assert!(token.traits.required);

        // the mixin itself is untouched by its users
        let paging = model.expect_shape(&ShapeId::parse("ex#Paging").unwrap()).unwrap();
        assert_eq!(paging.members[0].id.to_string(), "ex#Paging$limit");
        assert!(!paging.members[1].traits.required);
    }

    #[test]
    fn test_mixin_cycle_is_invalid_model() {
        let doc = json!({
            "shapes": {
                "ex#A": { "type": "structure", "mixins": [{ "target": "ex#B" }], "members": {} },
                "ex#B": { "type": "structure", "mixins": [{ "target": "ex#A" }], "members": {} }
            }
        });
        let err = load_from_values(&[doc]).unwrap_err();
        assert!(matches!(err, BindingError::InvalidModel(_)));
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        let doc = json!({
            "shapes": {
                "ex#A": { "type": "structure", "members": { "b": { "target": "ex#Missing" } } }
            }
        });
        let err = load_from_values(&[doc]).unwrap_err();
        assert!(matches!(err, BindingError::UnknownShape(id) if id.name() == "Missing"));
    }

    #[test]
    fn test_directory_load_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), widgets().to_string()).unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("target/ignored.json"), "not json").unwrap();

        let first = load_from_directory(dir.path(), &LoadConfig::default()).unwrap();
        let second = load_from_directory(dir.path(), &LoadConfig::default()).unwrap();
        assert_eq!(first.bundle_hash, second.bundle_hash);
        assert!(first.contains(&ShapeId::parse("ex#Tags").unwrap()));
    }
}
