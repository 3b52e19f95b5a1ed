//! Declaration Plan Assembler
//!
//! Runs origin classification, policy selection and conversion resolution
//! over an operation's input members, in declaration order, and decides
//! whether the body is the whole input.

use tracing::{debug, info, warn};

use super::conversion::ConversionResolver;
use super::origin::{classify, Origin};
use super::plan::{DeclarationPlan, InputPlan, SemanticType};
use super::policy::{required_or_has_default, select_policy};
use crate::auth::AuthBindingCoordinator;
use crate::config::BindingsConfig;
use crate::error::{BindingError, Result};
use crate::graph::ResourceGraph;
use crate::model::{HttpTrait, Shape, ShapeId, ShapeType, UriPattern};

pub struct PlanAssembler<'a> {
    graph: &'a ResourceGraph,
    config: &'a BindingsConfig,
}

impl<'a> PlanAssembler<'a> {
    pub fn new(graph: &'a ResourceGraph, config: &'a BindingsConfig) -> Self {
        Self { graph, config }
    }

    /// Plans for every operation in the graph, in id order
    pub fn assemble_all(&self) -> Result<Vec<InputPlan>> {
        self.graph
            .operations()
            .into_iter()
            .map(|op| self.assemble(&op.id))
            .collect()
    }

    pub fn assemble(&self, operation_id: &ShapeId) -> Result<InputPlan> {
        let model = self.graph.model();
        let operation = self.graph.shape(operation_id).ok_or_else(|| {
            BindingError::inconsistent(
                operation_id,
                format!("operation is not part of the {} graph", self.graph.service()),
            )
        })?;
        if !operation.is_operation() {
            return Err(BindingError::inconsistent(
                operation_id,
                format!("expected an operation but found a {}", operation.shape_type),
            ));
        }

        let input = match &operation.input {
            Some(id) => Some(model.expect_shape(id)?).filter(|s| !s.is_unit()),
            None => None,
        };
        let (http, inferred_http) = self.http_binding(operation, input.is_some())?;
        let auth = AuthBindingCoordinator::new(model, &self.config.validation_failure)
            .auth_declaration(operation)?;

        let Some(input) = input else {
            if let Some(label) = http.uri.labels().next() {
                return Err(BindingError::inconsistent(
                    operation_id,
                    format!("uri label '{}' but the operation has no input", label.name),
                ));
            }
            debug!(operation = %operation_id, "operation has no input");
            return Ok(InputPlan {
                operation: operation_id.clone(),
                input: None,
                http,
                inferred_http,
                declarations: Vec::new(),
                is_whole_payload: false,
                auth,
            });
        };

        let declarations = self.declarations(input, &http)?;
        let is_whole_payload = declarations.is_empty();
        info!(
            operation = %operation_id,
            members = declarations.len(),
            whole_payload = is_whole_payload,
            "assembled input plan"
        );

        Ok(InputPlan {
            operation: operation_id.clone(),
            input: Some(input.id.clone()),
            http,
            inferred_http,
            declarations,
            is_whole_payload,
            auth,
        })
    }

    /// Declared http binding, or `POST /Name` with input and `GET /Name` without.
    fn http_binding(&self, operation: &Shape, has_input: bool) -> Result<(HttpTrait, bool)> {
        if let Some(http) = &operation.traits.http {
            return Ok((http.clone(), false));
        }
        if !self.config.infer_http {
            return Err(BindingError::inconsistent(&operation.id, "operation has no http binding"));
        }
        let method = if has_input { "POST" } else { "GET" };
        let uri = UriPattern::parse(&format!("/{}", operation.id.name()))?;
        warn!(operation = %operation.id, method, uri = %uri, "synthesized http binding");
        Ok((
            HttpTrait {
                method: method.to_string(),
                uri,
                code: 200,
            },
            true,
        ))
    }

    fn declarations(&self, input: &Shape, http: &HttpTrait) -> Result<Vec<DeclarationPlan>> {
        if input.shape_type != ShapeType::Structure {
            return Err(BindingError::inconsistent(
                &input.id,
                format!("operation input must be a structure, found a {}", input.shape_type),
            ));
        }
        let model = self.graph.model();
        let resolver = ConversionResolver::new(model, &self.config.list_delimiter);

        let mut plans = Vec::new();
        let mut unbound = Vec::new();
        for member in &input.members {
            let origin = classify(member, http)?;
            if origin.is_none() {
                unbound.push(member.name.as_str());
                continue;
            }

            let target = model.target_of(member)?;
            let policy = select_policy(member, target, &self.config.validation_failure)?;
            let conversion = resolver.resolve(member, target, &origin)?;
            let query_range = resolver.query_range(member, target, &origin);
            debug!(
                member = %member.id,
                origin = %origin,
                policy = %policy,
                conversion = %conversion,
                "selected binding strategy"
            );

            plans.push(DeclarationPlan {
                member: member.name.clone(),
                member_id: member.id.clone(),
                semantic_type: SemanticType {
                    shape: target.id.clone(),
                    kind: target.shape_type,
                    nullable: !required_or_has_default(member, target),
                },
                origin,
                policy,
                conversion,
                query_range,
            });
        }

        check_payload_consistency(input, &plans, &unbound)?;
        check_labels_bound(input, http, &plans)?;
        Ok(plans)
    }
}

/// At most one payload member, and a payload member only alongside members
/// that are individually bound.
fn check_payload_consistency(input: &Shape, plans: &[DeclarationPlan], unbound: &[&str]) -> Result<()> {
    let payloads: Vec<&str> = plans
        .iter()
        .filter(|p| p.origin.is_payload())
        .map(|p| p.member.as_str())
        .collect();
    if payloads.len() > 1 {
        return Err(BindingError::conflict(
            &input.id,
            format!("more than one httpPayload member: {}", payloads.join(", ")),
        ));
    }
    if let (Some(payload), false) = (payloads.first(), unbound.is_empty()) {
        return Err(BindingError::conflict(
            &input.id,
            format!(
                "httpPayload member '{}' leaves members without an origin: {}",
                payload,
                unbound.join(", ")
            ),
        ));
    }
    Ok(())
}

/// Every label in the pattern needs a member bound to it.
fn check_labels_bound(input: &Shape, http: &HttpTrait, plans: &[DeclarationPlan]) -> Result<()> {
    for label in http.uri.labels() {
        let bound = plans
            .iter()
            .any(|p| matches!(&p.origin, Origin::UriPath { label: name, .. } if name == label.name));
        if !bound {
            return Err(BindingError::inconsistent(
                &input.id,
                format!("uri label '{}' in '{}' has no httpLabel member", label.name, http.uri),
            ));
        }
    }
    Ok(())
}
