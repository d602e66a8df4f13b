//! # Weights and Identity
//!
//! [`Weights`] is one weight matrix and its bias: `W` is `output × input`
//! and `B` has one entry per output. [`Meta`] names the unit that owns a set
//! of weights so snapshots can be keyed and sorted.

use std::fmt;

use bptt_core::{CoreError, Init, Matrix, Result, Shape, Vector};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub w: Matrix,
    pub b: Vector,
}

impl Weights {
    /// Draw `W` from `w_init` and `B` from `b_init`.
    pub fn new<R: Rng + ?Sized>(
        input_dim: usize,
        output_dim: usize,
        w_init: &Init,
        b_init: &Init,
        rng: &mut R,
    ) -> Result<Self> {
        let w = w_init.matrix(output_dim, input_dim, rng)?;
        let b = b_init.vector(output_dim, 0, rng)?;
        Self::from_parts(w, b)
    }

    /// Wrap an existing matrix and bias, checking `W.rows == len(B)`.
    pub fn from_parts(w: Matrix, b: Vector) -> Result<Self> {
        let weights = Self { w, b };
        weights.validate()?;
        Ok(weights)
    }

    pub fn zeros(input_dim: usize, output_dim: usize) -> Self {
        Self {
            w: Matrix::zeros(output_dim, input_dim),
            b: Vector::zeros(output_dim),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.w.cols()
    }

    pub fn output_dim(&self) -> usize {
        self.w.rows()
    }

    pub fn validate(&self) -> Result<()> {
        if self.w.rows() != self.b.len() {
            return Err(CoreError::ShapeMismatch {
                op: "weights",
                expected: Shape::vector(self.w.rows()),
                got: self.b.shape(),
            });
        }
        Ok(())
    }

    /// Fail unless this is an `input → output` tensor with a matching bias.
    pub fn expect_dims(&self, op: &'static str, input: usize, output: usize) -> Result<()> {
        if self.w.rows() != output || self.w.cols() != input {
            return Err(CoreError::ShapeMismatch {
                op,
                expected: Shape::matrix(output, input),
                got: self.w.shape(),
            });
        }
        self.validate()
    }

    /// `W·x + B`.
    pub fn affine(&self, x: &Vector) -> Result<Vector> {
        self.w.mul_vec(x)?.add(&self.b)
    }
}

/// Identity of one unit: its layer, its position in the layer and a name.
///
/// Ordered by layer, then index, then id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Meta {
    pub layer: usize,
    pub index: usize,
    pub id: String,
}

impl Meta {
    pub fn new(layer: usize, index: usize) -> Self {
        Self {
            layer,
            index,
            id: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

impl fmt::Display for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}:{}", self.layer, self.index)
        } else {
            write!(f, "{}:{}:{}", self.layer, self.index, self.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_weights_dimensions() {
        let mut rng = StdRng::seed_from_u64(3);
        let w = Weights::new(
            3,
            2,
            &Init::Uniform { min: -1.0, max: 1.0 },
            &Init::Constant(0.0),
            &mut rng,
        )
        .unwrap();
        assert_eq!(w.input_dim(), 3);
        assert_eq!(w.output_dim(), 2);
        assert_eq!(w.b, Vector::zeros(2));
    }

    #[test]
    fn test_from_parts_rejects_bias_mismatch() {
        let err = Weights::from_parts(Matrix::zeros(2, 3), Vector::zeros(3)).unwrap_err();
        assert!(matches!(err, CoreError::ShapeMismatch { op: "weights", .. }));
    }

    #[test]
    fn test_expect_dims() {
        let w = Weights::zeros(3, 2);
        assert!(w.expect_dims("dense", 3, 2).is_ok());
        let err = w.expect_dims("dense", 2, 3).unwrap_err();
        assert_eq!(
            err,
            CoreError::ShapeMismatch {
                op: "dense",
                expected: Shape::matrix(3, 2),
                got: Shape::matrix(2, 3),
            }
        );
    }

    #[test]
    fn test_affine() {
        let w = Weights::from_parts(
            Matrix::from_rows(&[Vector::from([1.0, 2.0])]).unwrap(),
            Vector::from([0.5]),
        )
        .unwrap();
        assert_eq!(w.affine(&Vector::from([1.0, 1.0])).unwrap(), Vector::from([3.5]));
    }

    #[test]
    fn test_meta_ordering() {
        let mut metas = vec![
            Meta::new(1, 0),
            Meta::new(0, 2),
            Meta::new(0, 1).with_id("output"),
            Meta::new(0, 1).with_id("hidden"),
        ];
        metas.sort();
        assert_eq!(metas[0].id, "hidden");
        assert_eq!(metas[2].index, 2);
        assert_eq!(metas[3].layer, 1);
        assert_eq!(metas[1].to_string(), "0:1:output");
    }
}
