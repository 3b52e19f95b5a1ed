//! Declaration and input plans handed to the emitter.

use serde::{Deserialize, Serialize};

use super::conversion::{ConversionChain, QueryRange};
use super::origin::Origin;
use super::policy::DeclarationPolicy;
use crate::auth::AuthDeclaration;
use crate::model::{HttpTrait, ShapeId, ShapeType};

/// The semantic type a declaration produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticType {
    pub shape: ShapeId,
    pub kind: ShapeType,
    /// False when the member is required or defaulted
    pub nullable: bool,
}

/// How one input member is obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationPlan {
    pub member: String,
    pub member_id: ShapeId,
    pub origin: Origin,
    pub policy: DeclarationPolicy,
    pub conversion: ConversionChain,
    pub semantic_type: SemanticType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_range: Option<QueryRange>,
}

/// Aggregate range metadata over every numeric query parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericQueryParameters {
    pub names: Vec<String>,
    pub allow_decimal: bool,
    pub allow_negative: bool,
}

/// Per-operation input binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPlan {
    pub operation: ShapeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<ShapeId>,
    pub http: HttpTrait,
    /// The http binding was synthesized, not declared
    pub inferred_http: bool,
    pub declarations: Vec<DeclarationPlan>,
    /// No member is individually bound; the body is the whole input
    pub is_whole_payload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthDeclaration>,
}

impl InputPlan {
    pub fn declaration(&self, member: &str) -> Option<&DeclarationPlan> {
        self.declarations.iter().find(|d| d.member == member)
    }

    /// Shape decoded from the request body, if any
    pub fn payload_type(&self) -> Option<&ShapeId> {
        if let Some(shape) = self.declarations.iter().find_map(|d| match &d.origin {
            Origin::Payload { shape } => Some(shape),
            _ => None,
        }) {
            return Some(shape);
        }
        if self.is_whole_payload {
            return self.input.as_ref();
        }
        None
    }

    pub fn consumes_payload(&self) -> bool {
        self.payload_type().is_some()
    }

    /// True when the input is nothing but a body: either whole-payload, or a
    /// single payload-bound member.
    pub fn entire_input_is_payload(&self) -> bool {
        match self.declarations.as_slice() {
            [] => self.is_whole_payload,
            [only] => only.origin.is_payload(),
            _ => false,
        }
    }

    pub fn numeric_query_parameters(&self) -> Option<NumericQueryParameters> {
        let mut names = Vec::new();
        let mut allow_decimal = false;
        let mut allow_negative = false;
        for decl in &self.declarations {
            let (Origin::UriQuery { name }, Some(range)) = (&decl.origin, &decl.query_range) else {
                continue;
            };
            names.push(name.clone());
            allow_decimal |= range.allow_decimal;
            allow_negative |= range.allow_negative;
        }
        if names.is_empty() {
            return None;
        }
        Some(NumericQueryParameters {
            names,
            allow_decimal,
            allow_negative,
        })
    }
}
