//! # Vanilla RNN Layer
//!
//! One neuron definition unrolled over a fixed number of time steps:
//!
//! ```text
//! h_t = act(Wxh·x_t + Bh + Whh·h_{t-1})
//! y_t = Why·h_t + By            (optionally softmax)
//! ```
//!
//! The three tensors are owned by the layer and read by every step. A
//! forward pass records one [`Step`] per time step; the backward pass walks
//! them in reverse, accumulates one delta per tensor, clips, and applies a
//! single Adagrad update.
//!
//! `Whh` has a bias slot for shape uniformity; it never receives a gradient
//! and stays at zero.

use bptt_core::{CoreError, Result, Sequence, Shape, Vector};
use bptt_diff::{softmax, Activation, Delta, Meta, Parameter, Weights};
use rand::Rng;
use tracing::{debug, trace};

use crate::config::RnnConfig;
use crate::recurrent::RecurrentLayer;
use crate::snapshot::Snapshot;

/// The shared tensors of one RNN layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RnnParams {
    /// `Wxh` (`hidden × input`) and `Bh`.
    pub input: Parameter,
    /// `Whh` (`hidden × hidden`), bias held at zero.
    pub hidden: Parameter,
    /// `Why` (`output × hidden`) and `By`.
    pub output: Parameter,
}

/// Values cached by one forward time step.
#[derive(Debug, Clone)]
struct Step {
    x: Vector,
    h_prev: Vector,
    h: Vector,
    y: Vector,
}

#[derive(Debug, Clone)]
pub struct RnnLayer {
    config: RnnConfig,
    params: RnnParams,
    steps: Vec<Step>,
    passes: usize,
}

impl RnnLayer {
    pub fn new<R: Rng + ?Sized>(config: RnnConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let (x, h, y) = (config.input_dim, config.hidden_dim, config.output_dim);

        let input = Weights::new(x, h, &config.weights, &config.biases, rng)?;
        let mut hidden = Weights::new(h, h, &config.weights, &config.biases, rng)?;
        hidden.b = Vector::zeros(h);
        let output = Weights::new(h, y, &config.weights, &config.biases, rng)?;

        Self::from_weights(config, input, hidden, output)
    }

    /// Build from known tensors, e.g. to resume from a snapshot.
    ///
    /// Each tensor must match the configured dimensions; the hidden bias is
    /// reset to zero.
    pub fn from_weights(
        config: RnnConfig,
        input: Weights,
        mut hidden: Weights,
        output: Weights,
    ) -> Result<Self> {
        config.validate()?;
        let (x, h, y) = (config.input_dim, config.hidden_dim, config.output_dim);
        input.expect_dims("rnn input weights", x, h)?;
        hidden.expect_dims("rnn hidden weights", h, h)?;
        output.expect_dims("rnn output weights", h, y)?;
        hidden.b = Vector::zeros(h);

        Ok(Self {
            config,
            params: RnnParams {
                input: Parameter::new(input),
                hidden: Parameter::new(hidden),
                output: Parameter::new(output),
            },
            steps: Vec::new(),
            passes: 0,
        })
    }

    pub fn config(&self) -> &RnnConfig {
        &self.config
    }

    pub fn params(&self) -> &RnnParams {
        &self.params
    }

    fn meta(&self, index: usize, id: &str) -> Meta {
        Meta::new(self.config.layer, index).with_id(id)
    }

    fn check_steps(&self, op: &'static str, rows: &[Vector], width: usize) -> Result<()> {
        if rows.len() != self.config.unroll {
            return Err(CoreError::ShapeMismatch {
                op,
                expected: Shape::sequence(self.config.unroll, width),
                got: Shape::sequence(rows.len(), width),
            });
        }
        rows.iter().try_for_each(|r| r.expect_len(op, width))
    }
}

impl RecurrentLayer for RnnLayer {
    fn unroll(&self) -> usize {
        self.config.unroll
    }

    fn input_dim(&self) -> usize {
        self.config.input_dim
    }

    fn output_dim(&self) -> usize {
        self.config.output_dim
    }

    fn forward(&mut self, batch: &[Vector]) -> Result<Sequence> {
        self.check_steps("rnn forward", batch, self.config.input_dim)?;
        let act = self.config.activation;
        let p = &self.params;

        // a failed pass leaves nothing for backward to train on
        self.steps.clear();
        let mut steps = Vec::with_capacity(batch.len());
        let mut h_prev = Vector::zeros(self.config.hidden_dim);
        let mut outputs = Vec::with_capacity(batch.len());

        for (t, x) in batch.iter().enumerate() {
            let z = p.input.weights.affine(x)?.add(&p.hidden.weights.affine(&h_prev)?)?;
            let h = act.apply_vector(&z);
            h.check("rnn hidden state")?;

            let mut y = p.output.weights.affine(&h)?;
            if self.config.softmax {
                y = softmax(&y);
            }
            y.check("rnn output")?;
            trace!(step = t, ?y, "rnn forward");

            outputs.push(y.clone());
            steps.push(Step {
                x: x.clone(),
                h_prev: std::mem::replace(&mut h_prev, h.clone()),
                h,
                y,
            });
        }
        self.steps = steps;
        Ok(outputs)
    }

    fn backward(&mut self, expected: &[Vector]) -> Result<Vector> {
        if self.steps.len() != self.config.unroll {
            return Err(CoreError::UninitializedState {
                unit: format!("rnn layer {}", self.config.layer),
            });
        }
        self.check_steps("rnn backward", expected, self.config.output_dim)?;
        let act = self.config.activation;
        let p = &mut self.params;

        p.input.reset();
        p.hidden.reset();
        p.output.reset();

        let mut losses = vec![0.0; self.steps.len()];
        let mut dh_next = Vector::zeros(self.config.hidden_dim);

        for (t, step) in self.steps.iter().enumerate().rev() {
            let dy = step.y.sub(&expected[t])?;
            losses[t] = dy.iter().map(|d| d.abs()).sum();

            p.output.delta.accumulate(&dy, &step.h)?;
            let dh = p.output.weights.w.transpose_mul_vec(&dy)?.add(&dh_next)?;
            let dr = dh.hadamard(&act.derivative_vector(&step.h))?;

            p.input.delta.accumulate(&dr, &step.x)?;
            p.hidden.delta.accumulate_weights(&dr, &step.h_prev)?;
            dh_next = p.hidden.weights.w.transpose_mul_vec(&dr)?;
            dh_next.check("rnn hidden error")?;
        }

        let clip = self.config.clip;
        for param in [&mut p.input, &mut p.hidden, &mut p.output] {
            param.clip(&clip);
        }
        let applied = p
            .input
            .delta
            .max_abs()
            .max(p.hidden.delta.max_abs())
            .max(p.output.delta.max_abs());
        for param in [&mut p.input, &mut p.hidden, &mut p.output] {
            param.adagrad(&self.config.rate)?;
        }

        self.steps.clear();
        self.passes += 1;
        let loss = Vector::from(losses);
        debug!(
            layer = self.config.layer,
            pass = self.passes,
            loss = loss.sum(),
            max_delta = applied,
            "rnn backward"
        );
        Ok(loss)
    }

    fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.insert(self.meta(0, "input"), self.params.input.weights.clone());
        snap.insert(self.meta(1, "hidden"), self.params.hidden.weights.clone());
        snap.insert(self.meta(2, "output"), self.params.output.weights.clone());
        snap
    }

    fn deltas(&self) -> Vec<&Delta> {
        vec![
            &self.params.input.delta,
            &self.params.hidden.delta,
            &self.params.output.delta,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bptt_diff::{Clip, LearningRate};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn column(values: &[f64]) -> Vec<Vector> {
        values.iter().map(|&v| Vector::from([v])).collect()
    }

    fn layer(config: RnnConfig) -> RnnLayer {
        RnnLayer::new(config, &mut StdRng::seed_from_u64(42)).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let mut l = layer(RnnConfig::new(2, 6, 3, 4));
        let batch = vec![Vector::from([0.1, 0.2]); 4];
        let out = l.forward(&batch).unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|y| y.len() == 3));

        let loss = l.backward(&vec![Vector::zeros(3); 4]).unwrap();
        assert_eq!(loss.len(), 4);
        assert_eq!(l.snapshot().len(), 3);
    }

    #[test]
    fn test_wrong_unroll_rejected() {
        let mut l = layer(RnnConfig::new(1, 4, 1, 5));
        let err = l.forward(&column(&[0.1, 0.2])).unwrap_err();
        assert_eq!(
            err,
            CoreError::ShapeMismatch {
                op: "rnn forward",
                expected: Shape::sequence(5, 1),
                got: Shape::sequence(2, 1),
            }
        );
    }

    #[test]
    fn test_backward_without_forward() {
        let mut l = layer(RnnConfig::new(1, 4, 1, 2));
        assert!(matches!(
            l.backward(&column(&[0.0, 0.0])),
            Err(CoreError::UninitializedState { .. })
        ));
    }

    #[test]
    fn test_failed_forward_leaves_nothing_to_train() {
        let mut l = layer(RnnConfig::new(1, 4, 1, 3));
        let before = l.params().clone();

        let err = l.forward(&column(&[0.1, f64::NAN, 0.3])).unwrap_err();
        assert!(matches!(err, CoreError::NumericInvariantViolation { .. }));
        assert!(matches!(
            l.backward(&column(&[0.0, 0.0, 0.0])),
            Err(CoreError::UninitializedState { .. })
        ));
        assert_eq!(l.params(), &before);
    }

    #[test]
    fn test_from_weights_validates() {
        let l = layer(RnnConfig::new(1, 4, 1, 3));
        let p = l.params().clone();

        let mut bad_clip = RnnConfig::new(1, 4, 1, 3);
        bad_clip.clip = Clip::new(-1.0, 1.0);
        assert!(matches!(
            RnnLayer::from_weights(
                bad_clip,
                p.input.weights.clone(),
                p.hidden.weights.clone(),
                p.output.weights.clone()
            ),
            Err(CoreError::InvalidConfig { .. })
        ));

        let wider = RnnConfig::new(1, 5, 1, 3);
        assert!(matches!(
            RnnLayer::from_weights(
                wider,
                p.input.weights.clone(),
                p.hidden.weights.clone(),
                p.output.weights.clone()
            ),
            Err(CoreError::ShapeMismatch { op: "rnn input weights", .. })
        ));

        let resumed = RnnLayer::from_weights(
            RnnConfig::new(1, 4, 1, 3),
            p.input.weights.clone(),
            p.hidden.weights.clone(),
            p.output.weights.clone(),
        )
        .unwrap();
        assert_eq!(resumed.snapshot(), l.snapshot());
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let mut config = RnnConfig::new(2, 5, 4, 3);
        config.softmax = true;
        let mut l = layer(config);
        let out = l.forward(&vec![Vector::from([0.3, -0.3]); 3]).unwrap();
        for y in out {
            assert_relative_eq!(y.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_hidden_bias_stays_zero() {
        let mut l = layer(RnnConfig::new(1, 4, 1, 3));
        for _ in 0..20 {
            l.forward(&column(&[0.1, 0.5, 0.9])).unwrap();
            l.backward(&column(&[0.9, 0.5, 0.1])).unwrap();
        }
        assert_eq!(l.params().hidden.weights.b, Vector::zeros(4));
        assert_eq!(l.params().hidden.delta.db, Vector::zeros(4));
    }

    #[test]
    fn test_deltas_within_clip() {
        let mut config = RnnConfig::new(1, 8, 1, 5);
        config.clip = Clip::new(0.05, 0.02);
        config.weights = bptt_core::Init::Uniform { min: -2.0, max: 2.0 };
        let mut l = layer(config);

        for _ in 0..10 {
            l.forward(&column(&[1.0, -1.0, 1.0, -1.0, 1.0])).unwrap();
            l.backward(&column(&[5.0, -5.0, 5.0, -5.0, 5.0])).unwrap();
            for delta in l.deltas() {
                assert!(delta.dw.max_abs() <= 0.05);
                assert!(delta.db.max_abs() <= 0.02);
            }
        }
    }

    #[test]
    fn test_zero_rate_is_idempotent() {
        let mut config = RnnConfig::new(1, 6, 1, 4);
        config.rate = LearningRate::uniform(0.0);
        let mut l = layer(config);
        let batch = column(&[0.1, 0.2, 0.3, 0.4]);
        let expected = column(&[0.4, 0.3, 0.2, 0.1]);

        let y0 = l.forward(&batch).unwrap();
        let loss0 = l.backward(&expected).unwrap();
        for _ in 0..5 {
            assert_eq!(l.forward(&batch).unwrap(), y0);
            assert_eq!(l.backward(&expected).unwrap(), loss0);
        }
    }

    #[test]
    fn test_round_trip_sequence() {
        let mut l = layer(RnnConfig::new(1, 10, 1, 5));
        let batch = column(&[0.1, 0.2, 0.3, 0.4, 0.5]);
        let expected = column(&[0.1, 0.2, 0.3, 0.2, 0.1]);

        let mut loss = Vector::zeros(5);
        for _ in 0..1000 {
            l.forward(&batch).unwrap();
            loss = l.backward(&expected).unwrap();
        }
        assert!(loss.sum() < 0.01, "loss {:?}", loss);
    }
}
