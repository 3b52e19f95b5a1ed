//! Shape Bindings
//!
//! Code-generation front end for interface models expressed as a JSON AST of
//! services, resources, operations and data shapes. Two subsystems do the
//! work; rendering source text is left to an emitter.
//!
//! ## Features
//!
//! - **Relationship Graph**: per-service petgraph index of every tagged
//!   shape-to-shape edge, with closure and relation queries
//! - **Graph Cache**: one graph per service per run, built at most once
//! - **Binding Synthesis**: origin, policy and conversion for each input member
//! - **Auth Binding**: authenticated payloads grouped by shape and optionality
//!
//! ## Architecture
//!
//! ```text
//! Model (shape index)
//!   └── GraphCache ──► ResourceGraph (per service)
//!                          └── PlanAssembler
//!                                ├── classify          → Origin
//!                                ├── select_policy     → DeclarationPolicy
//!                                ├── ConversionResolver → ConversionChain
//!                                └── AuthBindingCoordinator
//!                          ═► InputPlan (per operation)
//! ```

pub mod auth;
pub mod binding;
pub mod config;
pub mod error;
pub mod graph;
pub mod model;

pub use auth::{AuthBindingCoordinator, AuthDeclaration, AuthSummary};
pub use binding::{
    ConversionChain, DeclarationPlan, DeclarationPolicy, DefaultLiteral, InputPlan, Origin,
    OriginType, PlanAssembler,
};
pub use config::PlannerConfig;
pub use error::{BindingError, Result};
pub use graph::{GraphCache, RelationTag, ResourceGraph};
pub use model::{Model, Shape, ShapeId, ShapeType};
