//! # Feed-Forward Network
//!
//! An ordered stack of [`Layer`]s plus a [`Loss`]. One `train` call is one
//! forward pass, one loss evaluation and one backward pass in reverse layer
//! order, with every cell updating itself on the way back.

use bptt_core::{CoreError, Result, Vector};
use bptt_diff::Loss;
use tracing::{debug, info};

use crate::layer::Layer;
use crate::snapshot::Snapshot;

/// What a training call reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Training {
    /// `loss.evaluate(expected, output)` before the update.
    pub loss: Vector,
    /// Present when tracing is enabled.
    pub snapshot: Option<Snapshot>,
}

pub struct Network {
    layers: Vec<Box<dyn Layer>>,
    loss: Loss,
    iterations: usize,
    tracing: bool,
    log_interval: usize,
}

impl Network {
    pub fn new(loss: Loss) -> Self {
        Self {
            layers: Vec::new(),
            loss,
            iterations: 0,
            tracing: false,
            log_interval: 100,
        }
    }

    /// Append a layer; its input must match the current output width.
    pub fn with_layer(mut self, layer: impl Layer + 'static) -> Result<Self> {
        if let Some(last) = self.layers.last() {
            if last.output_dim() != layer.input_dim() {
                return Err(CoreError::vector_mismatch(
                    "network layer chain",
                    last.output_dim(),
                    layer.input_dim(),
                ));
            }
        }
        self.layers.push(Box::new(layer));
        Ok(self)
    }

    /// Return a weight snapshot from every `train` call.
    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }

    pub fn with_log_interval(mut self, log_interval: usize) -> Self {
        self.log_interval = log_interval.max(1);
        self
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn input_dim(&self) -> Option<usize> {
        self.layers.first().map(|l| l.input_dim())
    }

    pub fn output_dim(&self) -> Option<usize> {
        self.layers.last().map(|l| l.output_dim())
    }

    fn forward(&mut self, input: &Vector) -> Result<Vector> {
        if self.layers.is_empty() {
            return Err(CoreError::config("network has no layers"));
        }
        let mut x = input.clone();
        for layer in &mut self.layers {
            x = layer.forward(&x)?;
        }
        Ok(x)
    }

    pub fn predict(&mut self, input: &Vector) -> Result<Vector> {
        self.forward(input)
    }

    pub fn train(&mut self, input: &Vector, expected: &Vector) -> Result<Training> {
        let output = self.forward(input)?;
        let loss = self.loss.evaluate(expected, &output)?;
        let mut error = self.loss.gradient(expected, &output)?;

        for layer in self.layers.iter_mut().rev() {
            error = layer.backward(&error)?;
        }
        self.iterations += 1;

        let total: f64 = loss.iter().map(|l| l.abs()).sum();
        debug!(iteration = self.iterations, loss = total, "network backward");
        if self.iterations % self.log_interval == 0 {
            info!(iteration = self.iterations, loss = total, "training");
        }

        Ok(Training {
            loss,
            snapshot: self.tracing.then(|| self.snapshot()),
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new();
        for layer in &self.layers {
            snap.extend(layer.snapshot());
        }
        snap
    }
}
