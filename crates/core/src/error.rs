//! # Error Types
//!
//! Every error in this workspace is a logic or configuration defect, never a
//! transient condition: a shape wired wrongly, a backward pass issued without
//! its forward pass, or a value that left the finite reals. None of them is
//! retried inside the core. They surface through `?` up to the layer boundary
//! where the caller decides what to do.

use thiserror::Error;

use crate::shape::Shape;

/// Errors raised by cells, layers and the tensor operations beneath them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// Dimensions disagree at an operation boundary.
    #[error("Shape mismatch in {op}: expected {expected}, got {got}")]
    ShapeMismatch {
        op: &'static str,
        expected: Shape,
        got: Shape,
    },

    /// `backward` was called on a unit with no cached forward state.
    #[error("Backward called on {unit} without a preceding forward")]
    UninitializedState { unit: String },

    /// A NaN or infinite value reached a forward/backward boundary.
    #[error("Non-finite value {value} at index {index} in {context}")]
    NumericInvariantViolation {
        context: String,
        index: usize,
        value: f64,
    },

    /// A configuration value is out of its valid range.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// An operation that needs at least one row received none.
    #[error("Empty sequence passed to {op}")]
    EmptySequence { op: &'static str },

    /// A parallel worker task stopped before replying.
    #[error("Worker for {unit} stopped")]
    WorkerStopped { unit: String },
}

impl CoreError {
    /// Shorthand for a vector length mismatch.
    pub fn vector_mismatch(op: &'static str, expected: usize, got: usize) -> Self {
        CoreError::ShapeMismatch {
            op,
            expected: Shape::vector(expected),
            got: Shape::vector(got),
        }
    }

    /// Shorthand for an invalid configuration.
    pub fn config(reason: impl Into<String>) -> Self {
        CoreError::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, CoreError>;
