//! # Recurrent Layers and the Streaming Driver
//!
//! [`RecurrentLayer`] is the contract shared by the RNN and LSTM layers:
//! `forward` unrolls over exactly `unroll()` rows, `backward` walks them in
//! reverse and applies one clipped update.
//!
//! [`RecurrentNetwork`] feeds a layer from a stream of vectors. It keeps two
//! windows over the stream:
//!
//! - a training window of `unroll + 1` rows, split into inputs (drop last)
//!   and expected outputs (drop first), so the layer learns to predict the
//!   next value of its own input
//! - a prediction window of `unroll` rows
//!
//! ```text
//! push(v) ─▶ Window ─▶ split ─▶ forward ─▶ backward ─▶ loss
//! ```

use bptt_core::{split_window, CoreError, Result, Sequence, Vector, Window};
use bptt_diff::{Delta, Loss};
use tracing::info;

use crate::snapshot::Snapshot;

pub trait RecurrentLayer: Send {
    /// Time steps per pass.
    fn unroll(&self) -> usize;
    fn input_dim(&self) -> usize;
    fn output_dim(&self) -> usize;

    /// Unroll over `batch` (one row per time step) from a zero state.
    fn forward(&mut self, batch: &[Vector]) -> Result<Sequence>;

    /// Backpropagate through the last forward and update the shared
    /// tensors. Returns `Σ|output_t - expected_t|` for each step `t`.
    fn backward(&mut self, expected: &[Vector]) -> Result<Vector>;

    fn snapshot(&self) -> Snapshot;

    /// The clipped deltas applied by the most recent backward.
    fn deltas(&self) -> Vec<&Delta>;
}

impl<L: RecurrentLayer + ?Sized> RecurrentLayer for Box<L> {
    fn unroll(&self) -> usize {
        (**self).unroll()
    }

    fn input_dim(&self) -> usize {
        (**self).input_dim()
    }

    fn output_dim(&self) -> usize {
        (**self).output_dim()
    }

    fn forward(&mut self, batch: &[Vector]) -> Result<Sequence> {
        (**self).forward(batch)
    }

    fn backward(&mut self, expected: &[Vector]) -> Result<Vector> {
        (**self).backward(expected)
    }

    fn snapshot(&self) -> Snapshot {
        (**self).snapshot()
    }

    fn deltas(&self) -> Vec<&Delta> {
        (**self).deltas()
    }
}

/// What one streaming training call reports.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrentTraining {
    /// One entry per unrolled step; zeros until the window fills.
    pub loss: Vector,
    /// The last output row; zeros until the window fills.
    pub output: Vector,
    /// The weights after this call's update, when tracing is enabled.
    pub snapshot: Option<Snapshot>,
}

pub struct RecurrentNetwork<L: RecurrentLayer> {
    layer: L,
    train_window: Window,
    predict_window: Window,
    loss: Option<Loss>,
    iterations: usize,
    log_interval: usize,
    tracing: bool,
}

impl<L: RecurrentLayer> RecurrentNetwork<L> {
    /// Wrap a layer whose output predicts its next input.
    pub fn new(layer: L) -> Result<Self> {
        if layer.input_dim() != layer.output_dim() {
            return Err(CoreError::vector_mismatch(
                "next-step prediction",
                layer.input_dim(),
                layer.output_dim(),
            ));
        }
        let unroll = layer.unroll();
        Ok(Self {
            train_window: Window::new(unroll + 1)?,
            predict_window: Window::new(unroll)?,
            layer,
            loss: None,
            iterations: 0,
            log_interval: 100,
            tracing: false,
        })
    }

    /// Report `loss.sequence(expected, output)` instead of the absolute error.
    pub fn with_loss(mut self, loss: Loss) -> Self {
        self.loss = Some(loss);
        self
    }

    pub fn with_log_interval(mut self, log_interval: usize) -> Self {
        self.log_interval = log_interval.max(1);
        self
    }

    /// Return a weight snapshot from every `train` call that updates.
    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }

    pub fn layer(&self) -> &L {
        &self.layer
    }

    /// Number of completed backward passes.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn snapshot(&self) -> Snapshot {
        self.layer.snapshot()
    }

    /// Push one value; train once the training window is full.
    pub fn train(&mut self, v: Vector) -> Result<RecurrentTraining> {
        v.expect_len("recurrent train", self.layer.input_dim())?;
        let Some(batch) = self.train_window.push(v) else {
            return Ok(RecurrentTraining {
                loss: Vector::zeros(self.layer.unroll()),
                output: Vector::zeros(self.layer.output_dim()),
                snapshot: None,
            });
        };

        let (inputs, expected) = split_window(&batch)?;
        let outputs = self.layer.forward(&inputs)?;
        let abs = self.layer.backward(&expected)?;
        let loss = match self.loss {
            Some(loss) => loss.sequence(&expected, &outputs)?,
            None => abs,
        };
        self.iterations += 1;

        if self.iterations % self.log_interval == 0 {
            info!(iteration = self.iterations, loss = loss.sum(), "recurrent training");
        }

        let output = last_row(&outputs)?;
        let snapshot = self.tracing.then(|| self.layer.snapshot());
        Ok(RecurrentTraining { loss, output, snapshot })
    }

    /// Push one value; predict once the prediction window is full.
    ///
    /// Returns the output row for the newest step.
    pub fn predict(&mut self, v: Vector) -> Result<Vector> {
        v.expect_len("recurrent predict", self.layer.input_dim())?;
        match self.predict_window.push(v) {
            Some(batch) => last_row(&self.layer.forward(&batch)?),
            None => Ok(Vector::zeros(self.layer.output_dim())),
        }
    }

    /// Train on an explicit `(inputs, expected)` pair without windowing.
    ///
    /// Returns the per-step absolute error before the update.
    pub fn train_sequence(&mut self, inputs: &[Vector], expected: &[Vector]) -> Result<Vector> {
        self.layer.forward(inputs)?;
        let abs = self.layer.backward(expected)?;
        self.iterations += 1;
        Ok(abs)
    }
}

fn last_row(rows: &[Vector]) -> Result<Vector> {
    rows.last()
        .cloned()
        .ok_or(CoreError::EmptySequence { op: "last row" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RnnConfig;
    use crate::rnn::RnnLayer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn network(unroll: usize) -> RecurrentNetwork<RnnLayer> {
        let layer = RnnLayer::new(
            RnnConfig::new(1, 6, 1, unroll),
            &mut StdRng::seed_from_u64(42),
        )
        .unwrap();
        RecurrentNetwork::new(layer).unwrap()
    }

    #[test]
    fn test_zeros_until_window_fills() {
        let mut net = network(3);
        for k in 0..3 {
            let t = net.train(Vector::from([k as f64 * 0.1])).unwrap();
            assert_eq!(t.loss, Vector::zeros(3));
            assert_eq!(t.output, Vector::zeros(1));
        }
        assert_eq!(net.iterations(), 0);

        net.train(Vector::from([0.3])).unwrap();
        assert_eq!(net.iterations(), 1);
    }

    #[test]
    fn test_tracing_returns_snapshot() {
        let mut quiet = network(2);
        let mut traced = network(2).with_tracing(true);
        for k in 0..2 {
            let t = traced.train(Vector::from([k as f64 * 0.1])).unwrap();
            assert!(t.snapshot.is_none());
            quiet.train(Vector::from([k as f64 * 0.1])).unwrap();
        }

        let t = traced.train(Vector::from([0.2])).unwrap();
        assert_eq!(t.snapshot, Some(traced.snapshot()));
        assert!(quiet.train(Vector::from([0.2])).unwrap().snapshot.is_none());
    }

    #[test]
    fn test_predict_needs_full_window() {
        let mut net = network(2);
        assert_eq!(net.predict(Vector::from([0.1])).unwrap(), Vector::zeros(1));
        let y = net.predict(Vector::from([0.2])).unwrap();
        assert_eq!(y.len(), 1);
    }

    #[test]
    fn test_rejects_mismatched_prediction_dims() {
        let layer = RnnLayer::new(RnnConfig::new(2, 4, 1, 3), &mut StdRng::seed_from_u64(1)).unwrap();
        assert!(RecurrentNetwork::new(layer).is_err());
    }

    #[test]
    fn test_with_loss_reports_sequence_loss() {
        let mut net = network(2).with_loss(Loss::Squared);
        let mut last = None;
        for k in 0..3 {
            last = Some(net.train(Vector::from([k as f64])).unwrap());
        }
        let t = last.unwrap();
        assert_eq!(t.loss.len(), 2);
        assert!(t.loss.iter().all(|&l| l >= 0.0));
    }

    #[test]
    fn test_boxed_layer() {
        let layer: Box<dyn RecurrentLayer> = Box::new(
            RnnLayer::new(RnnConfig::new(1, 3, 1, 2), &mut StdRng::seed_from_u64(5)).unwrap(),
        );
        let mut net = RecurrentNetwork::new(layer).unwrap();
        let loss = net
            .train_sequence(
                &[Vector::from([0.1]), Vector::from([0.2])],
                &[Vector::from([0.2]), Vector::from([0.3])],
            )
            .unwrap();
        assert_eq!(loss.len(), 2);
        assert_eq!(net.layer().unroll(), 2);
    }
}
