//! Error types for model loading, graph queries and binding synthesis

use thiserror::Error;

use crate::model::{ShapeId, ShapeType};

/// Result type for binding operations
pub type Result<T> = std::result::Result<T, BindingError>;

/// Binding engine errors
///
/// Every variant is fatal for the shape being processed. Callers surface the
/// message together with [`BindingError::shape`] to the schema author.
#[derive(Error, Debug)]
pub enum BindingError {
    #[error("Inconsistent schema at {shape}: {message}")]
    InconsistentSchema { shape: ShapeId, message: String },

    #[error("Unsupported conversion for {shape}: {kind} cannot be bound from {origin}")]
    UnsupportedConversion {
        shape: ShapeId,
        kind: ShapeType,
        origin: String,
    },

    #[error("Unsupported default for {shape}: no literal rule for {kind}")]
    UnsupportedDefault { shape: ShapeId, kind: ShapeType },

    #[error("Invalid default for {shape}: {message}")]
    InvalidDefault { shape: ShapeId, message: String },

    #[error("Binding conflict at {shape}: {message}")]
    BindingConflict { shape: ShapeId, message: String },

    #[error("Unknown shape: {0}")]
    UnknownShape(ShapeId),

    #[error("Invalid shape id: {0}")]
    InvalidShapeId(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BindingError {
    /// The offending shape, when the error is tied to one
    pub fn shape(&self) -> Option<&ShapeId> {
        match self {
            Self::InconsistentSchema { shape, .. }
            | Self::UnsupportedConversion { shape, .. }
            | Self::UnsupportedDefault { shape, .. }
            | Self::InvalidDefault { shape, .. }
            | Self::BindingConflict { shape, .. }
            | Self::UnknownShape(shape) => Some(shape),
            Self::InvalidShapeId(_) | Self::InvalidModel(_) | Self::Io(_) | Self::Json(_) => None,
        }
    }

    pub(crate) fn inconsistent(shape: &ShapeId, message: impl Into<String>) -> Self {
        Self::InconsistentSchema {
            shape: shape.clone(),
            message: message.into(),
        }
    }

    pub(crate) fn conflict(shape: &ShapeId, message: impl Into<String>) -> Self {
        Self::BindingConflict {
            shape: shape.clone(),
            message: message.into(),
        }
    }
}
