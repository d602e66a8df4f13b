//! # LSTM Layer
//!
//! Same unroll / accumulate / clip / update skeleton as the RNN layer, with
//! a gated transition per step:
//!
//! ```text
//! v   = [x_t; h_{t-1}]
//! f   = σ(Wf·v + bf)      i1 = σ(Wi·v + bi)
//! i2  = tanh(Wg·v + bg)   o  = σ(Wo·v + bo)
//! s_t = f ⊙ s_{t-1} + i1 ⊙ i2
//! c   = tanh(Ws·s_t + bs)
//! h_t = c ⊙ o
//! y_t = Wy·h_t + by       (optionally softmax)
//! ```
//!
//! Each step is wired from [`TiedCell`]s reading the layer's tensors and
//! [`BiOp`]s, so backward replays the same wiring in reverse: every binary
//! op splits one gradient into two, every tied cell adds its outer product
//! into the shared delta.

use bptt_core::{CoreError, Result, Sequence, Shape, Vector};
use bptt_diff::{
    softmax, ActivationKind, AddOp, BiOp, Delta, Meta, MulOp, Parameter, StackOp, TiedCell,
    Weights,
};
use rand::Rng;
use tracing::{debug, trace};

use crate::config::LstmConfig;
use crate::recurrent::RecurrentLayer;
use crate::snapshot::Snapshot;

/// The shared tensors of one LSTM layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LstmParams {
    pub forget: Parameter,
    pub input: Parameter,
    pub candidate: Parameter,
    pub output_gate: Parameter,
    /// `Ws`, `hidden × hidden`, applied to the cell state.
    pub state: Parameter,
    /// `Wy`, `output × hidden`.
    pub output: Parameter,
}

impl LstmParams {
    fn all_mut(&mut self) -> [&mut Parameter; 6] {
        [
            &mut self.forget,
            &mut self.input,
            &mut self.candidate,
            &mut self.output_gate,
            &mut self.state,
            &mut self.output,
        ]
    }

    fn all(&self) -> [(&'static str, &Parameter); 6] {
        [
            ("forget", &self.forget),
            ("input", &self.input),
            ("candidate", &self.candidate),
            ("output_gate", &self.output_gate),
            ("state", &self.state),
            ("output", &self.output),
        ]
    }
}

/// The wiring of one unrolled time step.
#[derive(Debug, Clone)]
struct Step {
    stack: StackOp,
    forget: TiedCell<ActivationKind>,
    input: TiedCell<ActivationKind>,
    candidate: TiedCell<ActivationKind>,
    output_gate: TiedCell<ActivationKind>,
    state: TiedCell<ActivationKind>,
    output: TiedCell<ActivationKind>,
    keep: MulOp,
    write: MulOp,
    merge: AddOp,
    expose: MulOp,
    y: Vector,
}

impl Step {
    fn new() -> Self {
        Self {
            stack: StackOp::new(),
            forget: TiedCell::new(ActivationKind::Sigmoid),
            input: TiedCell::new(ActivationKind::Sigmoid),
            candidate: TiedCell::new(ActivationKind::Tanh),
            output_gate: TiedCell::new(ActivationKind::Sigmoid),
            state: TiedCell::new(ActivationKind::Tanh),
            output: TiedCell::new(ActivationKind::Identity),
            keep: MulOp::new(),
            write: MulOp::new(),
            merge: AddOp::new(),
            expose: MulOp::new(),
            y: Vector::default(),
        }
    }

    /// Returns `(h_t, s_t)`.
    fn forward(
        &mut self,
        p: &LstmParams,
        x: &Vector,
        h_prev: &Vector,
        s_prev: &Vector,
        softmax_output: bool,
    ) -> Result<(Vector, Vector)> {
        let v = self.stack.forward(x, h_prev)?;
        let f = self.forget.forward(&p.forget.weights, &v)?;
        let i1 = self.input.forward(&p.input.weights, &v)?;
        let i2 = self.candidate.forward(&p.candidate.weights, &v)?;
        let o = self.output_gate.forward(&p.output_gate.weights, &v)?;

        let kept = self.keep.forward(&f, s_prev)?;
        let written = self.write.forward(&i1, &i2)?;
        let s = self.merge.forward(&kept, &written)?;
        s.check("lstm cell state")?;

        let c = self.state.forward(&p.state.weights, &s)?;
        let h = self.expose.forward(&c, &o)?;
        h.check("lstm hidden state")?;

        let z = self.output.forward(&p.output.weights, &h)?;
        self.y = if softmax_output { softmax(&z) } else { z };
        self.y.check("lstm output")?;
        Ok((h, s))
    }

    /// Takes `(dy, dh_next, ds_next)`, returns `(dh_prev, ds_prev)`.
    fn backward(
        &mut self,
        p: &mut LstmParams,
        dy: &Vector,
        dh_next: &Vector,
        ds_next: &Vector,
    ) -> Result<(Vector, Vector)> {
        let dh = tied_backward(&mut self.output, &mut p.output, dy)?.add(dh_next)?;
        let (dc, d_o) = self.expose.backward(&dh)?;
        let ds = tied_backward(&mut self.state, &mut p.state, &dc)?.add(ds_next)?;

        let (d_kept, d_written) = self.merge.backward(&ds)?;
        let (df, ds_prev) = self.keep.backward(&d_kept)?;
        let (di1, di2) = self.write.backward(&d_written)?;

        let mut dv = tied_backward(&mut self.forget, &mut p.forget, &df)?;
        dv.add_assign(&tied_backward(&mut self.input, &mut p.input, &di1)?)?;
        dv.add_assign(&tied_backward(&mut self.candidate, &mut p.candidate, &di2)?)?;
        dv.add_assign(&tied_backward(&mut self.output_gate, &mut p.output_gate, &d_o)?)?;

        // dx is dropped; nothing sits upstream of this layer
        let (_, dh_prev) = self.stack.backward(&dv)?;
        Ok((dh_prev, ds_prev))
    }
}

fn tied_backward(
    cell: &mut TiedCell<ActivationKind>,
    param: &mut Parameter,
    error: &Vector,
) -> Result<Vector> {
    cell.backward(&param.weights, &mut param.delta, error)
}

#[derive(Debug, Clone)]
pub struct LstmLayer {
    config: LstmConfig,
    params: LstmParams,
    steps: Vec<Step>,
    passes: usize,
}

impl LstmLayer {
    pub fn new<R: Rng + ?Sized>(config: LstmConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let (x, h, y) = (config.input_dim, config.hidden_dim, config.output_dim);
        let mut gate = |input: usize, output: usize| -> Result<Parameter> {
            Ok(Parameter::new(Weights::new(
                input,
                output,
                &config.weights,
                &config.biases,
                &mut *rng,
            )?))
        };

        let params = LstmParams {
            forget: gate(x + h, h)?,
            input: gate(x + h, h)?,
            candidate: gate(x + h, h)?,
            output_gate: gate(x + h, h)?,
            state: gate(h, h)?,
            output: gate(h, y)?,
        };
        Self::from_params(config, params)
    }

    /// Build from known tensors, e.g. to resume from a snapshot.
    ///
    /// Only the weights are kept; deltas and Adagrad memory start at zero.
    pub fn from_params(config: LstmConfig, params: LstmParams) -> Result<Self> {
        config.validate()?;
        let (x, h, y) = (config.input_dim, config.hidden_dim, config.output_dim);
        let dims = [
            (x + h, h),
            (x + h, h),
            (x + h, h),
            (x + h, h),
            (h, h),
            (h, y),
        ];
        for ((id, param), (input, output)) in params.all().into_iter().zip(dims) {
            param.weights.expect_dims(id, input, output)?;
        }

        let fresh = |param: Parameter| Parameter::new(param.weights);
        let params = LstmParams {
            forget: fresh(params.forget),
            input: fresh(params.input),
            candidate: fresh(params.candidate),
            output_gate: fresh(params.output_gate),
            state: fresh(params.state),
            output: fresh(params.output),
        };
        Ok(Self {
            config,
            params,
            steps: Vec::new(),
            passes: 0,
        })
    }

    pub fn config(&self) -> &LstmConfig {
        &self.config
    }

    pub fn params(&self) -> &LstmParams {
        &self.params
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

impl RecurrentLayer for LstmLayer {
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
        self.check_steps("lstm forward", batch, self.config.input_dim)?;

        self.steps.clear();
        let mut steps = Vec::with_capacity(batch.len());
        let mut h = Vector::zeros(self.config.hidden_dim);
        let mut s = Vector::zeros(self.config.hidden_dim);
        let mut outputs = Vec::with_capacity(batch.len());

        for (t, x) in batch.iter().enumerate() {
            let mut step = Step::new();
            (h, s) = step.forward(&self.params, x, &h, &s, self.config.softmax)?;
            trace!(step = t, y = ?step.y, "lstm forward");
            outputs.push(step.y.clone());
            steps.push(step);
        }
        self.steps = steps;
        Ok(outputs)
    }

    fn backward(&mut self, expected: &[Vector]) -> Result<Vector> {
        if self.steps.len() != self.config.unroll {
            return Err(CoreError::UninitializedState {
                unit: format!("lstm layer {}", self.config.layer),
            });
        }
        self.check_steps("lstm backward", expected, self.config.output_dim)?;

        for param in self.params.all_mut() {
            param.reset();
        }

        let mut losses = vec![0.0; self.steps.len()];
        let mut dh_next = Vector::zeros(self.config.hidden_dim);
        let mut ds_next = Vector::zeros(self.config.hidden_dim);

        for (t, step) in self.steps.iter_mut().enumerate().rev() {
            let dy = step.y.sub(&expected[t])?;
            losses[t] = dy.iter().map(|d| d.abs()).sum();
            (dh_next, ds_next) = step.backward(&mut self.params, &dy, &dh_next, &ds_next)?;
            dh_next.check("lstm hidden error")?;
            ds_next.check("lstm state error")?;
        }

        let clip = self.config.clip;
        let mut applied: f64 = 0.0;
        for param in self.params.all_mut() {
            param.clip(&clip);
            applied = applied.max(param.delta.max_abs());
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
            "lstm backward"
        );
        Ok(loss)
    }

    fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new();
        for (index, (id, param)) in self.params.all().into_iter().enumerate() {
            snap.insert(
                Meta::new(self.config.layer, index).with_id(id),
                param.weights.clone(),
            );
        }
        snap
    }

    fn deltas(&self) -> Vec<&Delta> {
        self.params.all().into_iter().map(|(_, p)| &p.delta).collect()
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

    fn layer(config: LstmConfig) -> LstmLayer {
        LstmLayer::new(config, &mut StdRng::seed_from_u64(42)).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let mut l = layer(LstmConfig::new(3, 5, 2, 4));
        let out = l.forward(&vec![Vector::from([0.1, 0.2, 0.3]); 4]).unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|y| y.len() == 2));

        let loss = l.backward(&vec![Vector::zeros(2); 4]).unwrap();
        assert_eq!(loss.len(), 4);

        let snap = l.snapshot();
        assert_eq!(snap.len(), 6);
        let forget = snap.get(&Meta::new(0, 0).with_id("forget")).unwrap();
        assert_eq!(forget.input_dim(), 8);
        assert_eq!(forget.output_dim(), 5);
    }

    #[test]
    fn test_backward_without_forward() {
        let mut l = layer(LstmConfig::new(1, 3, 1, 2));
        assert!(matches!(
            l.backward(&column(&[0.0, 0.0])),
            Err(CoreError::UninitializedState { .. })
        ));
    }

    #[test]
    fn test_failed_forward_leaves_nothing_to_train() {
        let mut l = layer(LstmConfig::new(1, 3, 1, 3));
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
    fn test_from_params_validates() {
        let l = layer(LstmConfig::new(2, 3, 1, 2));

        let mut bad_clip = LstmConfig::new(2, 3, 1, 2);
        bad_clip.clip = Clip::new(1.0, -1.0);
        assert!(matches!(
            LstmLayer::from_params(bad_clip, l.params().clone()),
            Err(CoreError::InvalidConfig { .. })
        ));

        assert!(matches!(
            LstmLayer::from_params(LstmConfig::new(1, 3, 1, 2), l.params().clone()),
            Err(CoreError::ShapeMismatch { op: "forget", .. })
        ));

        let resumed = LstmLayer::from_params(LstmConfig::new(2, 3, 1, 2), l.params().clone()).unwrap();
        assert_eq!(resumed.snapshot(), l.snapshot());
    }

    #[test]
    fn test_wrong_row_width() {
        let mut l = layer(LstmConfig::new(2, 3, 1, 2));
        assert!(matches!(
            l.forward(&column(&[0.0, 0.0])),
            Err(CoreError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let mut config = LstmConfig::new(1, 4, 3, 3);
        config.softmax = true;
        let mut l = layer(config);
        for y in l.forward(&column(&[0.5, -0.5, 0.2])).unwrap() {
            assert_relative_eq!(y.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_deltas_within_clip() {
        let mut config = LstmConfig::new(1, 6, 1, 5);
        config.clip = Clip::new(0.01, 0.03);
        let mut l = layer(config);
        for _ in 0..10 {
            l.forward(&column(&[1.0, -1.0, 1.0, -1.0, 1.0])).unwrap();
            l.backward(&column(&[5.0, -5.0, 5.0, -5.0, 5.0])).unwrap();
            for delta in l.deltas() {
                assert!(delta.dw.max_abs() <= 0.01);
                assert!(delta.db.max_abs() <= 0.03);
            }
        }
    }

    #[test]
    fn test_zero_rate_is_idempotent() {
        let mut config = LstmConfig::new(1, 4, 1, 3);
        config.rate = LearningRate::uniform(0.0);
        let mut l = layer(config);
        let batch = column(&[0.1, 0.2, 0.3]);
        let expected = column(&[0.3, 0.2, 0.1]);

        let y0 = l.forward(&batch).unwrap();
        let loss0 = l.backward(&expected).unwrap();
        for _ in 0..5 {
            assert_eq!(l.forward(&batch).unwrap(), y0);
            assert_eq!(l.backward(&expected).unwrap(), loss0);
        }
    }

    #[test]
    fn test_round_trip_sequence() {
        let mut l = layer(LstmConfig::new(1, 10, 1, 5));
        let batch = column(&[0.1, 0.2, 0.3, 0.4, 0.5]);
        let expected = column(&[0.1, 0.2, 0.3, 0.2, 0.1]);

        let mut loss = Vector::zeros(5);
        for _ in 0..1000 {
            l.forward(&batch).unwrap();
            loss = l.backward(&expected).unwrap();
        }
        assert!(loss.sum() < 0.05, "loss {:?}", loss);
    }
}
