//! # Softmax Layer
//!
//! A layer without weights: forward normalises the whole vector, backward
//! applies the softmax Jacobian to the incoming error.
//!
//! Put it after a dense layer trained with a difference or squared loss.
//! For cross-entropy use a `SoftCell`, whose incoming error already skips
//! the Jacobian.

use bptt_core::{CoreError, Result, Vector};
use bptt_diff::{softmax, softmax_backward};

use crate::layer::Layer;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone)]
pub struct SoftmaxLayer {
    dim: usize,
    output: Option<Vector>,
}

impl SoftmaxLayer {
    pub fn new(dim: usize) -> Self {
        Self { dim, output: None }
    }
}

impl Layer for SoftmaxLayer {
    fn forward(&mut self, x: &Vector) -> Result<Vector> {
        x.expect_len("softmax forward", self.dim)?;
        let y = softmax(x);
        y.check("softmax output")?;
        self.output = Some(y.clone());
        Ok(y)
    }

    fn backward(&mut self, error: &Vector) -> Result<Vector> {
        error.expect_len("softmax backward", self.dim)?;
        let y = self.output.take().ok_or_else(|| CoreError::UninitializedState {
            unit: "softmax layer".to_string(),
        })?;
        softmax_backward(&y, error)
    }

    fn input_dim(&self) -> usize {
        self.dim
    }

    fn output_dim(&self) -> usize {
        self.dim
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new()
    }
}
