//! # Binary Gate Operators
//!
//! Small two-input operators used to wire LSTM gates. Every operator has a
//! forward that combines two vectors into one and a backward that splits one
//! incoming gradient into one gradient per operand.
//!
//! | Op | Forward | Backward |
//! |----|---------|----------|
//! | [`StackOp`] | concat(a, b) | split the gradient at `len(a)` |
//! | [`MulOp`] | a ⊙ b | (d ⊙ b, d ⊙ a) |
//! | [`AddOp`] | a + b | gradient flows to both |

use bptt_core::{CoreError, Result, Vector};

pub trait BiOp {
    fn forward(&mut self, a: &Vector, b: &Vector) -> Result<Vector>;

    /// Gradients with respect to `(a, b)` of the last forward.
    fn backward(&self, d: &Vector) -> Result<(Vector, Vector)>;
}

fn uninitialized(op: &str) -> CoreError {
    CoreError::UninitializedState {
        unit: op.to_string(),
    }
}

/// Concatenation; remembers where to split on the way back.
#[derive(Debug, Clone, Default)]
pub struct StackOp {
    split: Option<usize>,
}

impl StackOp {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BiOp for StackOp {
    fn forward(&mut self, a: &Vector, b: &Vector) -> Result<Vector> {
        self.split = Some(a.len());
        Ok(a.concat(b))
    }

    fn backward(&self, d: &Vector) -> Result<(Vector, Vector)> {
        let at = self.split.ok_or_else(|| uninitialized("stack op"))?;
        d.split_at(at)
    }
}

/// Element-wise product; caches both operands.
#[derive(Debug, Clone, Default)]
pub struct MulOp {
    operands: Option<(Vector, Vector)>,
}

impl MulOp {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BiOp for MulOp {
    fn forward(&mut self, a: &Vector, b: &Vector) -> Result<Vector> {
        let product = a.hadamard(b)?;
        self.operands = Some((a.clone(), b.clone()));
        Ok(product)
    }

    fn backward(&self, d: &Vector) -> Result<(Vector, Vector)> {
        let (a, b) = self.operands.as_ref().ok_or_else(|| uninitialized("mul op"))?;
        Ok((d.hadamard(b)?, d.hadamard(a)?))
    }
}

/// Element-wise sum.
#[derive(Debug, Clone, Default)]
pub struct AddOp {
    dim: Option<usize>,
}

impl AddOp {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BiOp for AddOp {
    fn forward(&mut self, a: &Vector, b: &Vector) -> Result<Vector> {
        let sum = a.add(b)?;
        self.dim = Some(sum.len());
        Ok(sum)
    }

    fn backward(&self, d: &Vector) -> Result<(Vector, Vector)> {
        let dim = self.dim.ok_or_else(|| uninitialized("add op"))?;
        d.expect_len("add op backward", dim)?;
        Ok((d.clone(), d.clone()))
    }
}
