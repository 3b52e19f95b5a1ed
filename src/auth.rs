//! Auth Binding Coordinator
//!
//! Operations carrying the authentication trait receive an extra, orthogonal
//! input: the authenticated payload. This module groups operations by
//! payload shape and mechanism so binding registration can decide between
//! nullable and non-null injection, and produces the per-operation
//! declaration layered onto an [`InputPlan`](crate::binding::InputPlan).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::binding::DeclarationPolicy;
use crate::error::{BindingError, Result};
use crate::graph::ResourceGraph;
use crate::model::{Model, Shape, ShapeId};

/// The authenticated input of one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthDeclaration {
    pub mechanism: String,
    pub payload: ShapeId,
    pub optional: bool,
    pub policy: DeclarationPolicy,
}

/// Authentication requirements across a set of operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSummary {
    /// Lower-cased mechanism names
    pub mechanisms: BTreeSet<String>,
    pub payload_operations: BTreeMap<ShapeId, BTreeSet<ShapeId>>,
    /// Payloads at least one operation treats as optional
    pub optional_payloads: BTreeSet<ShapeId>,
}

impl AuthSummary {
    pub fn is_empty(&self) -> bool {
        self.mechanisms.is_empty()
    }

    pub fn has_optional(&self) -> bool {
        !self.optional_payloads.is_empty()
    }

    pub fn is_optional(&self, payload: &ShapeId) -> bool {
        self.optional_payloads.contains(payload)
    }

    pub fn payload_types(&self) -> impl Iterator<Item = &ShapeId> {
        self.payload_operations.keys()
    }
}

pub struct AuthBindingCoordinator<'a> {
    model: &'a Model,
    failure: &'a str,
}

impl<'a> AuthBindingCoordinator<'a> {
    /// `failure` is the failure kind raised when mandatory auth is absent
    pub fn new(model: &'a Model, failure: &'a str) -> Self {
        Self { model, failure }
    }

    /// Declaration for an authenticated operation, `None` otherwise.
    pub fn auth_declaration(&self, operation: &Shape) -> Result<Option<AuthDeclaration>> {
        let Some(auth) = &operation.traits.authenticated else {
            return Ok(None);
        };
        if !self.model.contains(&auth.payload) {
            return Err(BindingError::inconsistent(
                &operation.id,
                format!("authentication payload {} is not in the model", auth.payload),
            ));
        }
        let policy = if auth.optional {
            DeclarationPolicy::Nullable
        } else {
            DeclarationPolicy::RequiredOrFail {
                failure: self.failure.to_string(),
            }
        };
        Ok(Some(AuthDeclaration {
            mechanism: auth.mechanism.to_lowercase(),
            payload: auth.payload.clone(),
            optional: auth.optional,
            policy,
        }))
    }

    pub fn collect<'s>(&self, operations: impl IntoIterator<Item = &'s Shape>) -> Result<AuthSummary> {
        let mut summary = AuthSummary::default();
        for operation in operations {
            let Some(decl) = self.auth_declaration(operation)? else {
                continue;
            };
            debug!(operation = %operation.id, mechanism = %decl.mechanism, payload = %decl.payload, "authenticated operation");
            summary.mechanisms.insert(decl.mechanism);
            if decl.optional {
                summary.optional_payloads.insert(decl.payload.clone());
            }
            summary
                .payload_operations
                .entry(decl.payload)
                .or_default()
                .insert(operation.id.clone());
        }
        Ok(summary)
    }

    /// Collect over every operation reachable from the graph's service
    pub fn collect_for_service(&self, graph: &ResourceGraph) -> Result<AuthSummary> {
        self.collect(graph.operations())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn model() -> Arc<Model> {
        Arc::new(
            Model::from_json(&json!({
                "smithy": "2.0",
                "shapes": {
                    "ex#Blog": {
                        "type": "service",
                        "operations": [
                            { "target": "ex#ReadPost" },
                            { "target": "ex#WritePost" },
                            { "target": "ex#DeletePost" },
                            { "target": "ex#Health" }
                        ]
                    },
                    "ex#User": { "type": "structure", "members": { "name": { "target": "smithy.api#String" } } },
                    "ex#ReadPost": {
                        "type": "operation",
                        "traits": { "smithy.extensions#authenticated": { "mechanism": "Bearer", "optional": true, "payload": "ex#User" } }
                    },
                    "ex#WritePost": {
                        "type": "operation",
                        "traits": { "smithy.extensions#authenticated": { "mechanism": "bearer", "payload": "ex#User" } }
                    },
                    "ex#DeletePost": {
                        "type": "operation",
                        "traits": { "smithy.extensions#authenticated": null }
                    },
                    "ex#Health": { "type": "operation" }
                }
            }))
            .unwrap(),
        )
    }

    fn id(raw: &str) -> ShapeId {
        ShapeId::parse(raw).unwrap()
    }

    #[test]
    fn test_collect_groups_by_payload() {
        let model = model();
        let graph = ResourceGraph::build(Arc::clone(&model), &id("ex#Blog")).unwrap();
        let summary = AuthBindingCoordinator::new(&model, "InvalidInputException")
            .collect_for_service(&graph)
            .unwrap();

        assert_eq!(
            summary.mechanisms,
            ["basic", "bearer"].iter().map(|s| s.to_string()).collect::<BTreeSet<String>>()
        );
        let user_ops = &summary.payload_operations[&id("ex#User")];
        assert_eq!(user_ops.len(), 2);
        assert!(summary.is_optional(&id("ex#User")));
        assert!(!summary.is_optional(&id("smithy.api#String")));
        assert!(summary.payload_operations[&id("smithy.api#String")].contains(&id("ex#DeletePost")));
    }

    #[test]
    fn test_declaration_policy_follows_optionality() {
        let model = model();
        let coordinator = AuthBindingCoordinator::new(&model, "Unauthorized");

        let read = coordinator
            .auth_declaration(model.expect_shape(&id("ex#ReadPost")).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(read.policy, DeclarationPolicy::Nullable);
        assert_eq!(read.mechanism, "bearer");

        let delete = coordinator
            .auth_declaration(model.expect_shape(&id("ex#DeletePost")).unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(
            delete.policy,
            DeclarationPolicy::RequiredOrFail {
                failure: "Unauthorized".to_string()
            }
        );

        let health = model.expect_shape(&id("ex#Health")).unwrap();
        assert!(coordinator.auth_declaration(health).unwrap().is_none());
    }
}
