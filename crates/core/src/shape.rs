//! # Shapes
//!
//! A forward or backward call is only defined when the shapes line up:
//! `W.cols == len(x)`, `W.rows == len(B)`, `len(error) == output_dim`, and one
//! row per unrolled time step.
//!
//! Layer sizes and unroll lengths come from configuration, so shapes are
//! runtime values. A mismatch is reported as
//! [`CoreError::ShapeMismatch`](crate::CoreError::ShapeMismatch) with both
//! sides attached.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dimension sizes, outermost first.
///
/// `[n]` is a vector, `[rows, cols]` a matrix, and `t` time steps of
/// length-`n` rows are `[t, n]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape {
    pub dims: Vec<usize>,
}

impl Shape {
    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    /// `steps` rows of `width` elements each.
    pub fn sequence(steps: usize, width: usize) -> Self {
        Self::matrix(steps, width)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", d)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Shape::vector(10).to_string(), "[10]");
        assert_eq!(Shape::matrix(3, 4).to_string(), "[3, 4]");
        assert_eq!(Shape { dims: vec![] }.to_string(), "[]");
    }

    #[test]
    fn test_sequence_is_row_major() {
        assert_eq!(Shape::sequence(5, 2), Shape::matrix(5, 2));
        assert_ne!(Shape::sequence(5, 2), Shape::matrix(2, 5));
    }
}
