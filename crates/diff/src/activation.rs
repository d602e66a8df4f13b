//! # Activations
//!
//! Scalar nonlinearities applied after `W·x + B`, plus the whole-vector
//! softmax used by soft cells and softmax layers.
//!
//! | Kind | Forward | Derivative (in terms of output `y`) |
//! |------|---------|-------------------------------------|
//! | Identity | x | 1 |
//! | Sigmoid | 1 / (1 + e⁻ˣ) | y (1 - y) |
//! | Tanh | tanh x | 1 - y² |
//! | Relu | max(0, x) | y > 0 ? 1 : 0 |
//!
//! Every derivative is taken from the cached output, so a cell never needs
//! to keep its pre-activation sum around.

use bptt_core::{Result, Vector};
use serde::{Deserialize, Serialize};

use crate::module::Activation;

/// The built-in activation functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    Identity,
    Sigmoid,
    #[default]
    Tanh,
    Relu,
}

impl Activation for ActivationKind {
    fn apply(&self, x: f64) -> f64 {
        match self {
            ActivationKind::Identity => x,
            ActivationKind::Sigmoid => sigmoid(x),
            ActivationKind::Tanh => x.tanh(),
            ActivationKind::Relu => x.max(0.0),
        }
    }

    fn derivative(&self, y: f64) -> f64 {
        match self {
            ActivationKind::Identity => 1.0,
            ActivationKind::Sigmoid => y * (1.0 - y),
            ActivationKind::Tanh => 1.0 - y * y,
            ActivationKind::Relu => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Softmax over the whole vector, shifted by the maximum so large inputs
/// do not overflow.
pub fn softmax(v: &Vector) -> Vector {
    let max = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps = v.map(|x| (x - max).exp());
    let total = exps.sum();
    exps.map(|e| e / total)
}

/// Apply the softmax Jacobian `J = diag(y) - y yᵀ` to `error`.
///
/// `J` is symmetric, so `Jᵀ·e = y ⊙ e - y (y · e)`.
pub fn softmax_backward(output: &Vector, error: &Vector) -> Result<Vector> {
    let weighted = output.dot(error)?;
    output.zip_map(error, "softmax backward", |y, e| y * e - y * weighted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sigmoid_derivative_from_output() {
        let f = ActivationKind::Sigmoid;
        let y = f.apply(0.0);
        assert_relative_eq!(y, 0.5);
        assert_relative_eq!(f.derivative(y), 0.25);
    }

    #[test]
    fn test_tanh_matches_finite_difference() {
        let f = ActivationKind::Tanh;
        let x = 0.3;
        let h = 1e-6;
        let numeric = (f.apply(x + h) - f.apply(x - h)) / (2.0 * h);
        assert_relative_eq!(f.derivative(f.apply(x)), numeric, epsilon = 1e-8);
    }

    #[test]
    fn test_relu() {
        let f = ActivationKind::Relu;
        assert_eq!(f.apply(-2.0), 0.0);
        assert_eq!(f.apply(3.0), 3.0);
        assert_eq!(f.derivative(0.0), 0.0);
        assert_eq!(f.derivative(3.0), 1.0);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        for v in [
            Vector::from([1.0, 2.0, 3.0]),
            Vector::from([-50.0, 0.0, 50.0]),
            Vector::from([1000.0, 1000.0]),
            Vector::from([0.0]),
        ] {
            let y = softmax(&v);
            assert_relative_eq!(y.sum(), 1.0, epsilon = 1e-12);
            assert!(y.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_softmax_backward_matches_jacobian() {
        let y = softmax(&Vector::from([0.2, -0.4, 1.1]));
        let e = Vector::from([1.0, 0.0, -1.0]);
        let got = softmax_backward(&y, &e).unwrap();

        for i in 0..3 {
            let mut expected = 0.0;
            for j in 0..3 {
                let jac = if i == j { y[i] * (1.0 - y[i]) } else { -y[i] * y[j] };
                expected += jac * e[j];
            }
            assert_relative_eq!(got[i], expected, epsilon = 1e-12);
        }
    }
}
