//! Binding-Strategy Synthesis
//!
//! For every input member of an operation, decides where its value comes
//! from ([`Origin`]), what happens when it is absent ([`DeclarationPolicy`])
//! and how the raw value becomes the semantic one ([`ConversionChain`]).
//! [`PlanAssembler`] composes the three into an [`InputPlan`].
//!
//! Plans are built fresh per operation and are not cached.

pub mod assembler;
pub mod conversion;
pub mod origin;
pub mod plan;
pub mod policy;

pub use assembler::PlanAssembler;
pub use conversion::{ConversionChain, ConversionResolver, QueryRange};
pub use origin::{classify, Origin, OriginType};
pub use plan::{DeclarationPlan, InputPlan, NumericQueryParameters, SemanticType};
pub use policy::{select_policy, DeclarationPolicy, DefaultLiteral};
