//! # Cells
//!
//! A cell is the smallest stateful unit: it owns (or borrows) one
//! [`Weights`], remembers its last input and output, and exposes a
//! `forward` / `backward` pair.
//!
//! | Cell | Forward | Local gradient | Updates |
//! |------|---------|----------------|---------|
//! | [`ActivationCell`] | act(W·x + B) | error ⊙ act'(y) | in place, SGD |
//! | [`WeightCell`] | W·x + B | error | in place, SGD |
//! | [`SoftCell`] | softmax(W·x + B) | error | in place, SGD |
//! | [`NoOpCell`] | x | error | nothing |
//! | [`TiedCell`] | act(W·x + B), W borrowed | error ⊙ act'(y) | accumulates into a [`Delta`] |
//!
//! `backward` consumes the memory written by `forward`, so every backward
//! must be preceded by its own forward; otherwise it fails with
//! [`CoreError::UninitializedState`].

use bptt_core::{CoreError, Result, Vector};
use tracing::trace;

use crate::activation::softmax;
use crate::module::{Activation, Learning, Module};
use crate::optim::{Delta, Sgd};
use crate::weights::{Meta, Weights};

/// Input and output cached by the most recent forward.
#[derive(Debug, Clone, PartialEq)]
pub struct Memory {
    pub input: Vector,
    pub output: Vector,
}

/// The forward/backward contract shared by every owning cell.
pub trait Cell: Send {
    fn forward(&mut self, x: &Vector) -> Result<Vector>;

    /// Consume the cached forward state, update weights and return the
    /// error for the previous layer (`len == input_dim`).
    fn backward(&mut self, error: &Vector) -> Result<Vector>;

    fn input_dim(&self) -> usize;
    fn output_dim(&self) -> usize;

    /// `None` for cells without learnable state.
    fn weights(&self) -> Option<&Weights>;

    fn meta(&self) -> &Meta;
}

fn take_memory(memory: &mut Option<Memory>, meta: &Meta) -> Result<Memory> {
    memory.take().ok_or_else(|| CoreError::UninitializedState {
        unit: meta.to_string(),
    })
}

/// Weights followed by a scalar activation.
#[derive(Debug, Clone)]
pub struct ActivationCell<M: Module> {
    weights: Weights,
    module: M,
    meta: Meta,
    memory: Option<Memory>,
}

impl<M: Module> ActivationCell<M> {
    pub fn new(weights: Weights, module: M, meta: Meta) -> Result<Self> {
        weights.validate()?;
        Ok(Self {
            weights,
            module,
            meta,
            memory: None,
        })
    }

    /// A single-output unit over `weights.input_dim()` inputs.
    pub fn perceptron(weights: Weights, module: M, meta: Meta) -> Result<Self> {
        if weights.output_dim() != 1 {
            return Err(CoreError::vector_mismatch("perceptron", 1, weights.output_dim()));
        }
        Self::new(weights, module, meta)
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn memory(&self) -> Option<&Memory> {
        self.memory.as_ref()
    }
}

impl<M: Module + Send> Cell for ActivationCell<M> {
    fn forward(&mut self, x: &Vector) -> Result<Vector> {
        x.expect_len("cell forward", self.input_dim())?;
        let y = self.module.apply_vector(&self.weights.affine(x)?);
        y.check(&format!("cell {} output", self.meta))?;
        trace!(cell = %self.meta, ?y, "forward");
        self.memory = Some(Memory {
            input: x.clone(),
            output: y.clone(),
        });
        Ok(y)
    }

    fn backward(&mut self, error: &Vector) -> Result<Vector> {
        error.expect_len("cell backward", self.output_dim())?;
        let memory = take_memory(&mut self.memory, &self.meta)?;

        let grad = error.zip_map(&memory.output, "cell backward", |e, y| {
            self.module.gradient(e, self.module.derivative(y))
        })?;
        let propagated = self.weights.w.transpose_mul_vec(&grad)?;
        propagated.check(&format!("cell {} propagated error", self.meta))?;

        Sgd::from_learning(&self.module).step(&mut self.weights, &grad, &memory.input)?;
        trace!(cell = %self.meta, ?grad, "backward");
        Ok(propagated)
    }

    fn input_dim(&self) -> usize {
        self.weights.input_dim()
    }

    fn output_dim(&self) -> usize {
        self.weights.output_dim()
    }

    fn weights(&self) -> Option<&Weights> {
        Some(&self.weights)
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }
}

/// Weights only: `W·x + B` with no activation.
///
/// The module still supplies learning rates and the descent rule; its
/// activation is never applied.
#[derive(Debug, Clone)]
pub struct WeightCell<M: Module> {
    weights: Weights,
    module: M,
    meta: Meta,
    memory: Option<Memory>,
}

impl<M: Module> WeightCell<M> {
    pub fn new(weights: Weights, module: M, meta: Meta) -> Result<Self> {
        weights.validate()?;
        Ok(Self {
            weights,
            module,
            meta,
            memory: None,
        })
    }
}

impl<M: Module + Send> Cell for WeightCell<M> {
    fn forward(&mut self, x: &Vector) -> Result<Vector> {
        x.expect_len("weight cell forward", self.input_dim())?;
        let z = self.weights.affine(x)?;
        z.check(&format!("cell {} output", self.meta))?;
        self.memory = Some(Memory {
            input: x.clone(),
            output: z.clone(),
        });
        Ok(z)
    }

    fn backward(&mut self, error: &Vector) -> Result<Vector> {
        error.expect_len("weight cell backward", self.output_dim())?;
        let memory = take_memory(&mut self.memory, &self.meta)?;

        let grad = error.map(|e| self.module.gradient(e, 1.0));
        let propagated = self.weights.w.transpose_mul_vec(&grad)?;
        propagated.check(&format!("cell {} propagated error", self.meta))?;

        Sgd::from_learning(&self.module).step(&mut self.weights, &grad, &memory.input)?;
        Ok(propagated)
    }

    fn input_dim(&self) -> usize {
        self.weights.input_dim()
    }

    fn output_dim(&self) -> usize {
        self.weights.output_dim()
    }

    fn weights(&self) -> Option<&Weights> {
        Some(&self.weights)
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }
}

/// Weights followed by a softmax over the whole output.
///
/// Meant to be trained with cross-entropy: the incoming error is already
/// the gradient with respect to the pre-softmax sum, so backward applies no
/// activation derivative.
#[derive(Debug, Clone)]
pub struct SoftCell<L: Learning> {
    weights: Weights,
    rate: L,
    meta: Meta,
    memory: Option<Memory>,
}

impl<L: Learning> SoftCell<L> {
    pub fn new(weights: Weights, rate: L, meta: Meta) -> Result<Self> {
        weights.validate()?;
        Ok(Self {
            weights,
            rate,
            meta,
            memory: None,
        })
    }
}

impl<L: Learning + Send> Cell for SoftCell<L> {
    fn forward(&mut self, x: &Vector) -> Result<Vector> {
        x.expect_len("soft cell forward", self.input_dim())?;
        let y = softmax(&self.weights.affine(x)?);
        y.check(&format!("cell {} output", self.meta))?;
        self.memory = Some(Memory {
            input: x.clone(),
            output: y.clone(),
        });
        Ok(y)
    }

    fn backward(&mut self, error: &Vector) -> Result<Vector> {
        error.expect_len("soft cell backward", self.output_dim())?;
        let memory = take_memory(&mut self.memory, &self.meta)?;

        let propagated = self.weights.w.transpose_mul_vec(error)?;
        propagated.check(&format!("cell {} propagated error", self.meta))?;

        Sgd::from_learning(&self.rate).step(&mut self.weights, error, &memory.input)?;
        Ok(propagated)
    }

    fn input_dim(&self) -> usize {
        self.weights.input_dim()
    }

    fn output_dim(&self) -> usize {
        self.weights.output_dim()
    }

    fn weights(&self) -> Option<&Weights> {
        Some(&self.weights)
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }
}

/// Identity pass-through of a fixed width.
#[derive(Debug, Clone)]
pub struct NoOpCell {
    dim: usize,
    meta: Meta,
    memory: Option<Memory>,
}

impl NoOpCell {
    pub fn new(dim: usize, meta: Meta) -> Self {
        Self {
            dim,
            meta,
            memory: None,
        }
    }
}

impl Cell for NoOpCell {
    fn forward(&mut self, x: &Vector) -> Result<Vector> {
        x.expect_len("noop forward", self.dim)?;
        self.memory = Some(Memory {
            input: x.clone(),
            output: x.clone(),
        });
        Ok(x.clone())
    }

    fn backward(&mut self, error: &Vector) -> Result<Vector> {
        error.expect_len("noop backward", self.dim)?;
        take_memory(&mut self.memory, &self.meta)?;
        Ok(error.clone())
    }

    fn input_dim(&self) -> usize {
        self.dim
    }

    fn output_dim(&self) -> usize {
        self.dim
    }

    fn weights(&self) -> Option<&Weights> {
        None
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }
}

/// One time step's instance of a shared weight tensor.
///
/// The weights are passed in on every call rather than stored, so any
/// number of steps can read the same tensor. Backward adds its outer
/// product into a caller-owned [`Delta`] instead of updating.
#[derive(Debug, Clone)]
pub struct TiedCell<A: Activation> {
    activation: A,
    memory: Option<Memory>,
}

impl<A: Activation> TiedCell<A> {
    pub fn new(activation: A) -> Self {
        Self {
            activation,
            memory: None,
        }
    }

    pub fn forward(&mut self, weights: &Weights, x: &Vector) -> Result<Vector> {
        x.expect_len("tied cell forward", weights.input_dim())?;
        let y = self.activation.apply_vector(&weights.affine(x)?);
        self.memory = Some(Memory {
            input: x.clone(),
            output: y.clone(),
        });
        Ok(y)
    }

    /// Accumulate `(error ⊙ act'(y)) ⊗ x` into `delta` and return
    /// `Wᵀ · (error ⊙ act'(y))`.
    pub fn backward(&mut self, weights: &Weights, delta: &mut Delta, error: &Vector) -> Result<Vector> {
        error.expect_len("tied cell backward", weights.output_dim())?;
        let memory = self.memory.take().ok_or_else(|| CoreError::UninitializedState {
            unit: "tied cell".to_string(),
        })?;

        let grad = error.zip_map(&memory.output, "tied cell backward", |e, y| {
            e * self.activation.derivative(y)
        })?;
        delta.accumulate(&grad, &memory.input)?;
        weights.w.transpose_mul_vec(&grad)
    }

    /// Output of the last forward, if it has not been consumed.
    pub fn output(&self) -> Option<&Vector> {
        self.memory.as_ref().map(|m| &m.output)
    }
}
