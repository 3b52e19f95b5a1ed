//! Relation Tags
//!
//! The closed taxonomy of shape-to-shape relationships, and the edge tagger
//! that assigns one to a parent/child pair.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{MemberShape, Shape, ShapeId, ShapeType};

/// Typed classification of a graph edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationTag {
    ResourceForService,
    ResourceForResource,
    OperationForService,
    OperationForResource,
    PutOperationForResource,
    CreateOperationForResource,
    ReadOperationForResource,
    UpdateOperationForResource,
    DeleteOperationForResource,
    ListOperationForResource,
    InputForOperation,
    OutputForOperation,
    ErrorForOperation,
    MixinOfStructure,
    MemberOfShape,
    TargetOfMember,
}

/// Lifecycle classification of an operation edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Crudl {
    Create,
    Read,
    Update,
    Delete,
    List,
    Other,
}

impl RelationTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceForService => "resource-for-service",
            Self::ResourceForResource => "resource-for-resource",
            Self::OperationForService => "operation-for-service",
            Self::OperationForResource => "operation-for-resource",
            Self::PutOperationForResource => "put-operation-for-resource",
            Self::CreateOperationForResource => "create-operation-for-resource",
            Self::ReadOperationForResource => "read-operation-for-resource",
            Self::UpdateOperationForResource => "update-operation-for-resource",
            Self::DeleteOperationForResource => "delete-operation-for-resource",
            Self::ListOperationForResource => "list-operation-for-resource",
            Self::InputForOperation => "input-for-operation",
            Self::OutputForOperation => "output-for-operation",
            Self::ErrorForOperation => "error-for-operation",
            Self::MixinOfStructure => "mixin-of-structure",
            Self::MemberOfShape => "member-of-shape",
            Self::TargetOfMember => "target-of-member",
        }
    }

    /// Put counts as a create.
    pub fn crudl(&self) -> Crudl {
        match self {
            Self::PutOperationForResource | Self::CreateOperationForResource => Crudl::Create,
            Self::ReadOperationForResource => Crudl::Read,
            Self::UpdateOperationForResource => Crudl::Update,
            Self::DeleteOperationForResource => Crudl::Delete,
            Self::ListOperationForResource => Crudl::List,
            _ => Crudl::Other,
        }
    }

    /// Whether this tag binds an operation to a resource
    pub fn is_resource_operation(&self) -> bool {
        matches!(
            self,
            Self::OperationForResource
                | Self::PutOperationForResource
                | Self::CreateOperationForResource
                | Self::ReadOperationForResource
                | Self::UpdateOperationForResource
                | Self::DeleteOperationForResource
                | Self::ListOperationForResource
        )
    }
}

impl fmt::Display for RelationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parent side of an edge being tagged
#[derive(Debug, Clone, Copy)]
pub enum EdgeSource<'a> {
    Shape(&'a Shape),
    Member(&'a MemberShape),
}

/// Tag for a resource-to-operation edge; lifecycle slots win over the
/// generic instance/collection lists.
pub fn operation_relation(resource: &Shape, operation: &ShapeId) -> Option<RelationTag> {
    let lifecycle = &resource.lifecycle;
    let slots = [
        (&lifecycle.put, RelationTag::PutOperationForResource),
        (&lifecycle.create, RelationTag::CreateOperationForResource),
        (&lifecycle.read, RelationTag::ReadOperationForResource),
        (&lifecycle.update, RelationTag::UpdateOperationForResource),
        (&lifecycle.delete, RelationTag::DeleteOperationForResource),
        (&lifecycle.list, RelationTag::ListOperationForResource),
    ];
    if let Some((_, tag)) = slots.iter().find(|(slot, _)| slot.as_ref() == Some(operation)) {
        return Some(*tag);
    }
    if resource.operations.contains(operation) || resource.collection_operations.contains(operation) {
        return Some(RelationTag::OperationForResource);
    }
    None
}

/// Assign the relation between `source` and one of its direct references.
///
/// Returns `None` when `child` is not referenced by `source` at all.
pub fn tag_edge(source: EdgeSource<'_>, child: &ShapeId) -> Option<RelationTag> {
    let shape = match source {
        EdgeSource::Member(member) => {
            return (&member.target == child).then_some(RelationTag::TargetOfMember);
        }
        EdgeSource::Shape(shape) => shape,
    };

    if child.is_member() && child.without_member() == shape.id {
        return shape
            .member(child.member().unwrap_or_default())
            .map(|_| RelationTag::MemberOfShape);
    }

    match shape.shape_type {
        ShapeType::Service => {
            if shape.resources.contains(child) {
                Some(RelationTag::ResourceForService)
            } else if shape.operations.contains(child) {
                Some(RelationTag::OperationForService)
            } else {
                None
            }
        }
        ShapeType::Resource => {
            if shape.resources.contains(child) {
                Some(RelationTag::ResourceForResource)
            } else {
                operation_relation(shape, child)
            }
        }
        ShapeType::Operation => {
            if shape.input.as_ref() == Some(child) {
                Some(RelationTag::InputForOperation)
            } else if shape.output.as_ref() == Some(child) {
                Some(RelationTag::OutputForOperation)
            } else if shape.errors.contains(child) {
                Some(RelationTag::ErrorForOperation)
            } else {
                None
            }
        }
        _ => shape
            .mixins
            .contains(child)
            .then_some(RelationTag::MixinOfStructure),
    }
}
