//! # Loss Functions
//!
//! A [`Loss`] reduces an `(expected, output)` pair to an error vector for
//! reporting, and to the gradient that seeds a backward pass.

use bptt_core::{CoreError, Result, Shape, Vector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    /// `e - o`
    #[default]
    Diff,
    /// `0.5 (e - o)²`
    Squared,
    /// `-e ln(o)`, for softmax outputs.
    CrossEntropy,
}

impl Loss {
    /// Per-element loss.
    pub fn evaluate(&self, expected: &Vector, output: &Vector) -> Result<Vector> {
        match self {
            Loss::Diff => expected.sub(output),
            Loss::Squared => expected.zip_map(output, "squared loss", |e, o| 0.5 * (e - o) * (e - o)),
            Loss::CrossEntropy => {
                output.expect_len("cross entropy", expected.len())?;
                // o == 1 is rejected alongside o <= 0
                if let Some(index) = output.iter().position(|&o| o <= 0.0 || o == 1.0) {
                    return Err(CoreError::NumericInvariantViolation {
                        context: "cross entropy".to_string(),
                        index,
                        value: output[index],
                    });
                }
                expected.zip_map(output, "cross entropy", |e, o| -e * o.ln())
            }
        }
    }

    /// The error handed to `Cell::backward`: `e - o` for every loss.
    ///
    /// For cross-entropy over a softmax output this is the gradient with
    /// respect to the pre-softmax sum, which is why soft cells skip their
    /// activation derivative.
    pub fn gradient(&self, expected: &Vector, output: &Vector) -> Result<Vector> {
        // independent of the variant: squared error and cross-entropy share e - o
        expected.sub(output)
    }

    /// Mean per-step loss over a sequence: `sum(evaluate(e_t, o_t)) / T`
    /// for each step `t`, returned as one entry per step.
    pub fn sequence(&self, expected: &[Vector], output: &[Vector]) -> Result<Vector> {
        if expected.is_empty() {
            return Err(CoreError::EmptySequence { op: "sequence loss" });
        }
        if expected.len() != output.len() {
            return Err(CoreError::ShapeMismatch {
                op: "sequence loss",
                expected: Shape::vector(expected.len()),
                got: Shape::vector(output.len()),
            });
        }
        let steps = expected.len() as f64;
        expected
            .iter()
            .zip(output)
            .map(|(e, o)| Ok(self.evaluate(e, o)?.sum() / steps))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_diff_and_squared() {
        let e = Vector::from([1.0, 0.0]);
        let o = Vector::from([0.5, 0.5]);

        assert_eq!(Loss::Diff.evaluate(&e, &o).unwrap(), Vector::from([0.5, -0.5]));
        assert_eq!(
            Loss::Squared.evaluate(&e, &o).unwrap(),
            Vector::from([0.125, 0.125])
        );
        assert_eq!(Loss::Squared.gradient(&e, &o).unwrap(), Vector::from([0.5, -0.5]));
    }

    #[test]
    fn test_cross_entropy() {
        let e = Vector::from([0.0, 1.0]);
        let o = Vector::from([0.25, 0.75]);
        let l = Loss::CrossEntropy.evaluate(&e, &o).unwrap();
        assert_relative_eq!(l[1], -(0.75f64).ln());
        assert_relative_eq!(l[0], 0.0);
    }

    #[test]
    fn test_cross_entropy_domain() {
        let e = Vector::from([0.0, 1.0]);
        let err = Loss::CrossEntropy
            .evaluate(&e, &Vector::from([0.0, 1.0]))
            .unwrap_err();
        assert!(matches!(err, CoreError::NumericInvariantViolation { index: 0, .. }));

        let err = Loss::CrossEntropy
            .evaluate(&e, &Vector::from([0.5, 1.0]))
            .unwrap_err();
        assert!(matches!(err, CoreError::NumericInvariantViolation { index: 1, .. }));
    }

    #[test]
    fn test_gradient_is_difference_for_every_loss() {
        let e = Vector::from([1.0, 0.0, 0.0]);
        let o = Vector::from([0.7, 0.2, 0.1]);
        let want = e.sub(&o).unwrap();
        for loss in [Loss::Diff, Loss::Squared, Loss::CrossEntropy] {
            assert_eq!(loss.gradient(&e, &o).unwrap(), want);
        }
    }

    #[test]
    fn test_sequence_loss() {
        let e = vec![Vector::from([1.0]), Vector::from([2.0])];
        let o = vec![Vector::from([0.0]), Vector::from([0.0])];
        let l = Loss::Diff.sequence(&e, &o).unwrap();
        assert_eq!(l, Vector::from([0.5, 1.0]));

        assert!(Loss::Diff.sequence(&[], &[]).is_err());
        assert!(Loss::Diff.sequence(&e, &o[..1]).is_err());
    }
}
