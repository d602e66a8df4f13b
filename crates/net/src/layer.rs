//! # Feed-Forward Layers
//!
//! A [`DenseLayer`] is an ordered list of cells that all read the same
//! input. Forward concatenates their outputs in unit order. Backward hands
//! each cell its slice of the error and sums what comes back: several units
//! depend on the same upstream value, so their errors add.

use bptt_core::{CoreError, Init, Result, Vector};
use bptt_diff::{ActivationCell, Cell, LearningModule, Meta, Weights};
use rand::Rng;
use tracing::trace;

use crate::snapshot::Snapshot;

/// The forward/backward contract at layer granularity.
pub trait Layer: Send {
    fn forward(&mut self, x: &Vector) -> Result<Vector>;

    /// Returns the error for the previous layer (`len == input_dim`).
    fn backward(&mut self, error: &Vector) -> Result<Vector>;

    fn input_dim(&self) -> usize;
    fn output_dim(&self) -> usize;
    fn snapshot(&self) -> Snapshot;
}

pub struct DenseLayer {
    cells: Vec<Box<dyn Cell>>,
    input_dim: usize,
    output_dim: usize,
}

impl DenseLayer {
    /// Wrap cells that share one input width.
    pub fn new(cells: Vec<Box<dyn Cell>>) -> Result<Self> {
        let input_dim = cells
            .first()
            .map(|c| c.input_dim())
            .ok_or_else(|| CoreError::config("a dense layer needs at least one cell"))?;
        for cell in &cells {
            if cell.input_dim() != input_dim {
                return Err(CoreError::vector_mismatch(
                    "dense layer",
                    input_dim,
                    cell.input_dim(),
                ));
            }
        }
        let output_dim = cells.iter().map(|c| c.output_dim()).sum();
        Ok(Self {
            cells,
            input_dim,
            output_dim,
        })
    }

    /// `units` single-output activation cells over `input_dim` inputs.
    pub fn perceptrons<R: Rng + ?Sized>(
        layer: usize,
        input_dim: usize,
        units: usize,
        module: LearningModule,
        w_init: &Init,
        b_init: &Init,
        rng: &mut R,
    ) -> Result<Self> {
        module.rate.validate()?;
        let cells = (0..units)
            .map(|i| {
                let weights = Weights::new(input_dim, 1, w_init, b_init, &mut *rng)?;
                let cell = ActivationCell::perceptron(weights, module, Meta::new(layer, i))?;
                Ok(Box::new(cell) as Box<dyn Cell>)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(cells)
    }

    pub fn cells(&self) -> &[Box<dyn Cell>] {
        &self.cells
    }
}

impl Layer for DenseLayer {
    fn forward(&mut self, x: &Vector) -> Result<Vector> {
        x.expect_len("dense forward", self.input_dim)?;
        let mut out = Vec::with_capacity(self.output_dim);
        for cell in &mut self.cells {
            out.extend_from_slice(cell.forward(x)?.as_slice());
        }
        Ok(Vector::from(out))
    }

    fn backward(&mut self, error: &Vector) -> Result<Vector> {
        error.expect_len("dense backward", self.output_dim)?;
        let mut combined = Vector::zeros(self.input_dim);
        let mut offset = 0;
        for cell in &mut self.cells {
            let width = cell.output_dim();
            let slice = Vector::from(&error.as_slice()[offset..offset + width]);
            combined.add_assign(&cell.backward(&slice)?)?;
            offset += width;
        }
        trace!(units = self.cells.len(), ?combined, "dense backward");
        Ok(combined)
    }

    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn snapshot(&self) -> Snapshot {
        let mut snap = Snapshot::new();
        for cell in &self.cells {
            if let Some(w) = cell.weights() {
                snap.insert(cell.meta().clone(), w.clone());
            }
        }
        snap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bptt_diff::{ActivationKind, LearningRate, NoOpCell};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn layer(units: usize, rate: f64) -> DenseLayer {
        let mut rng = StdRng::seed_from_u64(9);
        DenseLayer::perceptrons(
            0,
            3,
            units,
            LearningModule::new(ActivationKind::Sigmoid, LearningRate::uniform(rate)),
            &Init::Uniform { min: -1.0, max: 1.0 },
            &Init::Constant(0.0),
            &mut rng,
        )
        .unwrap()
    }

    #[test]
    fn test_dimensions() {
        let mut l = layer(4, 0.1);
        let y = l.forward(&Vector::from([0.1, 0.2, 0.3])).unwrap();
        assert_eq!(y.len(), 4);
        let back = l.backward(&Vector::zeros(4)).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(l.snapshot().len(), 4);
    }

    #[test]
    fn test_backward_sums_unit_errors() {
        let mut l = layer(2, 0.0);
        let x = Vector::from([0.5, -0.5, 1.0]);
        let y = l.forward(&x).unwrap();
        let e = Vector::from([1.0, -1.0]);
        let combined = l.backward(&e).unwrap();

        let mut expected = Vector::zeros(3);
        for (i, cell) in l.cells().iter().enumerate() {
            let w = cell.weights().unwrap();
            let g = e[i] * y[i] * (1.0 - y[i]);
            for j in 0..3 {
                expected[j] += w.w.get(0, j) * g;
            }
        }
        for j in 0..3 {
            assert_relative_eq!(combined[j], expected[j], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rejects_mixed_input_widths() {
        let cells: Vec<Box<dyn Cell>> = vec![
            Box::new(NoOpCell::new(2, Meta::new(0, 0))),
            Box::new(NoOpCell::new(3, Meta::new(0, 1))),
        ];
        assert!(DenseLayer::new(cells).is_err());
        assert!(DenseLayer::new(Vec::new()).is_err());
    }

    #[test]
    fn test_wrong_error_length() {
        let mut l = layer(2, 0.1);
        l.forward(&Vector::zeros(3)).unwrap();
        assert!(matches!(
            l.backward(&Vector::zeros(3)),
            Err(CoreError::ShapeMismatch { .. })
        ));
    }
}
