//! # Optimisation
//!
//! Two update rules share this module:
//!
//! - [`Sgd`]: the in-place step a feed-forward cell applies during its own
//!   backward call, `W += lr_w · (grad ⊗ x)`, `B += lr_b · grad`
//! - Adagrad through [`Parameter::adagrad`]: the single update a recurrent
//!   layer applies after accumulating and clipping a whole BPTT pass
//!
//! ## Adagrad
//!
//! For a tensor `W` with clipped delta `dW` and running sum of squares `mW`:
//!
//! ```text
//! mW ← mW + dW²
//! W  ← W - lr · dW / sqrt(mW + ε)
//! ```
//!
//! `mW` persists across passes and never decreases, so the effective step
//! shrinks as training goes on. `dW` is reset at the start of every pass.

use bptt_core::{CoreError, Matrix, Result, Vector};
use serde::{Deserialize, Serialize};

use crate::module::{Learning, LearningRate};
use crate::weights::Weights;

/// Keeps the first Adagrad step finite.
pub const ADAGRAD_EPSILON: f64 = 1e-8;

/// Element-wise clip bounds for weight deltas and bias deltas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub weights: f64,
    pub biases: f64,
}

impl Clip {
    pub fn new(weights: f64, biases: f64) -> Self {
        Self { weights, biases }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.weights >= 0.0 && self.biases >= 0.0) {
            return Err(CoreError::config(format!(
                "clip bounds must be non-negative, got weights={} biases={}",
                self.weights, self.biases
            )));
        }
        Ok(())
    }
}

impl Default for Clip {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// Gradient accumulated over one backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub dw: Matrix,
    pub db: Vector,
}

impl Delta {
    pub fn zeros_like(weights: &Weights) -> Self {
        Self {
            dw: Matrix::zeros(weights.output_dim(), weights.input_dim()),
            db: Vector::zeros(weights.output_dim()),
        }
    }

    /// `dW += grad ⊗ input`, `dB += grad`.
    pub fn accumulate(&mut self, grad: &Vector, input: &Vector) -> Result<()> {
        self.accumulate_weights(grad, input)?;
        self.db.add_assign(grad)
    }

    /// `dW += grad ⊗ input` only; the bias delta is left alone.
    pub fn accumulate_weights(&mut self, grad: &Vector, input: &Vector) -> Result<()> {
        self.dw.add_assign(&grad.outer(input))
    }

    pub fn clip(&mut self, clip: &Clip) {
        self.dw = self.dw.clip(clip.weights);
        self.db = self.db.clip(clip.biases);
    }

    pub fn max_abs(&self) -> f64 {
        self.dw.max_abs().max(self.db.max_abs())
    }

    pub fn reset(&mut self) {
        self.dw.fill(0.0);
        self.db = Vector::zeros(self.db.len());
    }
}

/// Persistent running sum of squared deltas.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub mw: Matrix,
    pub mb: Vector,
}

impl Accumulator {
    pub fn zeros_like(weights: &Weights) -> Self {
        Self {
            mw: Matrix::zeros(weights.output_dim(), weights.input_dim()),
            mb: Vector::zeros(weights.output_dim()),
        }
    }
}

/// One weight tensor together with its optimiser state.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub weights: Weights,
    pub delta: Delta,
    pub memory: Accumulator,
}

impl Parameter {
    pub fn new(weights: Weights) -> Self {
        Self {
            delta: Delta::zeros_like(&weights),
            memory: Accumulator::zeros_like(&weights),
            weights,
        }
    }

    /// Zero the per-pass delta. The accumulator is kept.
    pub fn reset(&mut self) {
        self.delta.reset();
    }

    pub fn clip(&mut self, clip: &Clip) {
        self.delta.clip(clip);
    }

    /// Apply the current delta with the Adagrad rule.
    pub fn adagrad(&mut self, rate: &LearningRate) -> Result<()> {
        self.memory
            .mw
            .add_assign(&self.delta.dw.map(|d| d * d))?;
        self.memory.mb.add_assign(&self.delta.db.map(|d| d * d))?;

        let step_w = self
            .delta
            .dw
            .zip_map(&self.memory.mw, "adagrad", |d, m| {
                -rate.weights * d / (m + ADAGRAD_EPSILON).sqrt()
            })?;
        let step_b = self
            .delta
            .db
            .zip_map(&self.memory.mb, "adagrad", |d, m| {
                -rate.biases * d / (m + ADAGRAD_EPSILON).sqrt()
            })?;

        self.weights.w.add_assign(&step_w)?;
        self.weights.b.add_assign(&step_b)?;
        self.weights.w.check("adagrad weights")?;
        self.weights.b.check("adagrad biases")
    }
}

/// Plain gradient step with separate weight and bias rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    pub weight_rate: f64,
    pub bias_rate: f64,
}

impl Sgd {
    pub fn new(weight_rate: f64, bias_rate: f64) -> Self {
        Self {
            weight_rate,
            bias_rate,
        }
    }

    pub fn from_learning<L: Learning + ?Sized>(learning: &L) -> Self {
        Self::new(learning.weight_rate(), learning.bias_rate())
    }

    /// `W += lr_w · (grad ⊗ input)`, `B += lr_b · grad`, in place.
    ///
    /// `grad` is built from `expected - output`, so adding moves the output
    /// toward the target.
    pub fn step(&self, weights: &mut Weights, grad: &Vector, input: &Vector) -> Result<()> {
        weights
            .w
            .add_assign(&grad.outer(input).scale(self.weight_rate))?;
        weights.b.add_assign(&grad.scale(self.bias_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn weights_2x1() -> Weights {
        Weights::from_parts(
            Matrix::from_rows(&[Vector::from([1.0]), Vector::from([2.0])]).unwrap(),
            Vector::from([0.0, 0.0]),
        )
        .unwrap()
    }

    #[test]
    fn test_sgd_step() {
        let mut w = weights_2x1();
        let sgd = Sgd::new(1.0, 0.5);
        sgd.step(&mut w, &Vector::from([0.1, -0.2]), &Vector::from([2.0]))
            .unwrap();

        // W = [1, 2] + [0.2, -0.4]; B = [0.05, -0.1]
        assert_relative_eq!(w.w.get(0, 0), 1.2);
        assert_relative_eq!(w.w.get(1, 0), 1.6);
        assert_relative_eq!(w.b[1], -0.1);
    }

    #[test]
    fn test_delta_accumulates_and_clips() {
        let mut d = Delta::zeros_like(&weights_2x1());
        d.accumulate(&Vector::from([1.0, -3.0]), &Vector::from([2.0]))
            .unwrap();
        d.accumulate(&Vector::from([1.0, 0.0]), &Vector::from([2.0]))
            .unwrap();

        assert_relative_eq!(d.dw.get(0, 0), 4.0);
        assert_relative_eq!(d.db[1], -3.0);

        d.clip(&Clip::new(1.5, 0.5));
        assert_relative_eq!(d.dw.get(0, 0), 1.5);
        assert_relative_eq!(d.dw.get(1, 0), -1.5);
        assert_relative_eq!(d.db[0], 0.5);
        assert_relative_eq!(d.db[1], -0.5);

        d.reset();
        assert_eq!(d.max_abs(), 0.0);
    }

    #[test]
    fn test_accumulate_weights_leaves_bias() {
        let mut d = Delta::zeros_like(&weights_2x1());
        d.accumulate_weights(&Vector::from([1.0, 1.0]), &Vector::from([1.0]))
            .unwrap();
        assert_eq!(d.db, Vector::zeros(2));
        assert_relative_eq!(d.dw.get(1, 0), 1.0);
    }

    #[test]
    fn test_adagrad_first_step_is_rate_times_sign() {
        let mut p = Parameter::new(weights_2x1());
        p.delta.dw = Matrix::from_rows(&[Vector::from([0.5]), Vector::from([-2.0])]).unwrap();

        p.adagrad(&LearningRate::uniform(0.1)).unwrap();

        // d / sqrt(d² + ε) ≈ sign(d)
        assert_relative_eq!(p.weights.w.get(0, 0), 0.9, epsilon = 1e-6);
        assert_relative_eq!(p.weights.w.get(1, 0), 2.1, epsilon = 1e-6);
        // zero bias delta leaves the bias untouched
        assert_eq!(p.weights.b, Vector::zeros(2));
    }

    #[test]
    fn test_adagrad_memory_persists_across_reset() {
        let mut p = Parameter::new(weights_2x1());
        let rate = LearningRate::uniform(0.1);

        p.delta.dw = Matrix::from_rows(&[Vector::from([1.0]), Vector::from([1.0])]).unwrap();
        p.adagrad(&rate).unwrap();
        let after_one = p.weights.w.get(0, 0);

        p.reset();
        assert_eq!(p.delta.max_abs(), 0.0);
        assert_relative_eq!(p.memory.mw.get(0, 0), 1.0);

        p.delta.dw = Matrix::from_rows(&[Vector::from([1.0]), Vector::from([1.0])]).unwrap();
        p.adagrad(&rate).unwrap();
        let second_step = after_one - p.weights.w.get(0, 0);

        // second step is lr / sqrt(2)
        assert_relative_eq!(second_step, 0.1 / 2f64.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_clip_validate() {
        assert!(Clip::new(-1.0, 1.0).validate().is_err());
        assert!(Clip::default().validate().is_ok());
    }
}
