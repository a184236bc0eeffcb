//! Error types for expression evaluation and the tape.

use thiserror::Error;

use crate::shape::Shape;

/// Errors raised synchronously by the call that triggers them.
///
/// Numeric domain problems (log of a negative number, asin outside [-1, 1])
/// are not errors: they flow through as NaN/inf like any IEEE-754 arithmetic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdError {
    /// Operand dimensions cannot be combined (only rank-0 operands expand).
    #[error("shape mismatch: {left} is not compatible with {right}")]
    ShapeMismatch { left: Shape, right: Shape },

    /// `push_entry` was given a different number of operands and coefficients.
    #[error("tape entry has {operands} operands but {coefficients} coefficients")]
    CoefficientCountMismatch { operands: usize, coefficients: usize },

    /// Flat data does not fill the requested dimensions.
    #[error("data length mismatch: expected {expected} elements, got {actual}")]
    DataLength { expected: usize, actual: usize },

    /// Axis outside the array's rank.
    #[error("axis {axis} out of range for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },

    /// Slice range out of bounds.
    #[error("slice {start}..{end} out of bounds for axis {axis} with length {len}")]
    InvalidSlice {
        axis: usize,
        start: usize,
        end: usize,
        len: usize,
    },

    /// Slice step of zero.
    #[error("slice step must be positive")]
    InvalidStep,

    /// An expression asserted `noalias` but overlaps the destination.
    #[error("noalias assertion violated: `{expression}` overlaps the destination")]
    AliasViolation { expression: String },
}
