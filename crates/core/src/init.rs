//! # Weight Initialisers
//!
//! An [`Init`] is a generator `(size, index) -> Vector` invoked once when a
//! weight tensor is built. Random strategies draw from a caller-supplied
//! [`Rng`], so a seeded `StdRng` gives reproducible networks.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::shape::Shape;
use crate::tensor::{Matrix, Vector};

/// How to fill a weight row or bias vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum Init {
    /// Every element equals the constant.
    Constant(f64),
    /// Uniform in `[min, max)`.
    Uniform { min: f64, max: f64 },
    /// Uniform in `[min / sqrt(size), max / sqrt(size))`.
    ///
    /// Keeps the variance of `W·x` roughly independent of fan-in, which
    /// matters for recurrent weights applied once per time step.
    ScaledUniform { min: f64, max: f64 },
    /// Row `index` is taken verbatim. Used to load known weights.
    Explicit(Vec<Vector>),
}

impl Init {
    /// Generate a vector of `size` elements for row `index`.
    pub fn vector<R: Rng + ?Sized>(&self, size: usize, index: usize, rng: &mut R) -> Result<Vector> {
        match self {
            Init::Constant(v) => Ok(Vector::full(size, *v)),
            Init::Uniform { min, max } => Ok(uniform(size, *min, *max, rng)),
            Init::ScaledUniform { min, max } => {
                let scale = (size.max(1) as f64).sqrt();
                Ok(uniform(size, min / scale, max / scale, rng))
            }
            Init::Explicit(rows) => {
                let row = rows.get(index).ok_or(CoreError::ShapeMismatch {
                    op: "explicit init",
                    expected: Shape::sequence(index + 1, size),
                    got: Shape::sequence(rows.len(), size),
                })?;
                row.expect_len("explicit init", size)?;
                Ok(row.clone())
            }
        }
    }

    /// Generate a `rows × cols` matrix; row `i` is `self.vector(cols, i)`.
    pub fn matrix<R: Rng + ?Sized>(&self, rows: usize, cols: usize, rng: &mut R) -> Result<Matrix> {
        let rows = (0..rows)
            .map(|i| self.vector(cols, i, &mut *rng))
            .collect::<Result<Vec<_>>>()?;
        let m = Matrix::from_rows(&rows)?;
        if m.cols() != cols {
            // from_rows of zero rows reports zero columns
            return Ok(Matrix::zeros(m.rows(), cols));
        }
        Ok(m)
    }

    /// Reject empty ranges and non-finite constants.
    pub fn validate(&self) -> Result<()> {
        match self {
            Init::Constant(v) if !v.is_finite() => Err(CoreError::config("constant init must be finite")),
            Init::Uniform { min, max } | Init::ScaledUniform { min, max } if !(min < max) => {
                Err(CoreError::config(format!("uniform init needs min < max, got [{}, {})", min, max)))
            }
            _ => Ok(()),
        }
    }
}

fn uniform<R: Rng + ?Sized>(size: usize, min: f64, max: f64, rng: &mut R) -> Vector {
    (0..size).map(|_| rng.gen_range(min..max)).collect()
}
