//! # Learning Modules
//!
//! A cell is parameterised by three capabilities:
//!
//! - [`Activation`]: the nonlinearity and its derivative
//! - [`Learning`]: step sizes for weights and biases
//! - [`Descent`]: how an error and a derivative combine into a local gradient
//!
//! [`Module`] is the union of the three and is implemented for anything that
//! provides all of them. [`LearningModule`] bundles the built-in kinds.

use bptt_core::{CoreError, Result, Vector};
use serde::{Deserialize, Serialize};

use crate::activation::ActivationKind;

pub trait Activation {
    fn apply(&self, x: f64) -> f64;

    /// Derivative expressed in terms of the activation's output `y`.
    fn derivative(&self, y: f64) -> f64;

    fn apply_vector(&self, v: &Vector) -> Vector {
        v.map(|x| self.apply(x))
    }

    fn derivative_vector(&self, y: &Vector) -> Vector {
        y.map(|y| self.derivative(y))
    }
}

pub trait Learning {
    fn weight_rate(&self) -> f64;
    fn bias_rate(&self) -> f64;
}

pub trait Descent {
    fn gradient(&self, error: f64, derivative: f64) -> f64;
}

/// Everything a cell needs from its module.
pub trait Module: Activation + Learning + Descent {}

impl<T: Activation + Learning + Descent> Module for T {}

/// Separate step sizes for weight matrices and bias vectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningRate {
    pub weights: f64,
    pub biases: f64,
}

impl LearningRate {
    pub fn new(weights: f64, biases: f64) -> Self {
        Self { weights, biases }
    }

    /// The same rate for weights and biases.
    pub fn uniform(rate: f64) -> Self {
        Self::new(rate, rate)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.weights >= 0.0 && self.biases >= 0.0) {
            return Err(CoreError::config(format!(
                "learning rates must be non-negative, got weights={} biases={}",
                self.weights, self.biases
            )));
        }
        Ok(())
    }
}

impl Default for LearningRate {
    fn default() -> Self {
        Self::uniform(0.1)
    }
}

impl Learning for LearningRate {
    fn weight_rate(&self) -> f64 {
        self.weights
    }

    fn bias_rate(&self) -> f64 {
        self.biases
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescentKind {
    /// `error * derivative`
    #[default]
    Gradient,
    /// Always zero; the cell still propagates but never learns.
    Frozen,
}

impl Descent for DescentKind {
    fn gradient(&self, error: f64, derivative: f64) -> f64 {
        match self {
            DescentKind::Gradient => error * derivative,
            DescentKind::Frozen => 0.0,
        }
    }
}

/// Built-in activation, rates and descent rule in one value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LearningModule {
    pub activation: ActivationKind,
    pub rate: LearningRate,
    #[serde(default)]
    pub descent: DescentKind,
}

impl LearningModule {
    pub fn new(activation: ActivationKind, rate: LearningRate) -> Self {
        Self {
            activation,
            rate,
            descent: DescentKind::Gradient,
        }
    }

    pub fn frozen(activation: ActivationKind) -> Self {
        Self {
            activation,
            rate: LearningRate::uniform(0.0),
            descent: DescentKind::Frozen,
        }
    }
}

impl Activation for LearningModule {
    fn apply(&self, x: f64) -> f64 {
        self.activation.apply(x)
    }

    fn derivative(&self, y: f64) -> f64 {
        self.activation.derivative(y)
    }
}

impl Learning for LearningModule {
    fn weight_rate(&self) -> f64 {
        self.rate.weights
    }

    fn bias_rate(&self) -> f64 {
        self.rate.biases
    }
}

impl Descent for LearningModule {
    fn gradient(&self, error: f64, derivative: f64) -> f64 {
        self.descent.gradient(error, derivative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_module<M: Module>(_: &M) {}

    #[test]
    fn test_learning_module_is_module() {
        let m = LearningModule::new(ActivationKind::Sigmoid, LearningRate::new(0.5, 0.25));
        assert_module(&m);
        assert_eq!(m.weight_rate(), 0.5);
        assert_eq!(m.bias_rate(), 0.25);
        assert_eq!(m.gradient(2.0, 0.5), 1.0);
    }

    #[test]
    fn test_frozen_descent() {
        let m = LearningModule::frozen(ActivationKind::Tanh);
        assert_eq!(m.gradient(10.0, 1.0), 0.0);
    }

    #[test]
    fn test_negative_rate_rejected() {
        assert!(LearningRate::new(-0.1, 0.1).validate().is_err());
        assert!(LearningRate::new(f64::NAN, 0.1).validate().is_err());
        assert!(LearningRate::default().validate().is_ok());
    }

    #[test]
    fn test_vector_helpers() {
        let f = ActivationKind::Identity;
        let v = Vector::from([1.0, -2.0]);
        assert_eq!(f.apply_vector(&v), v);
        assert_eq!(f.derivative_vector(&v), Vector::from([1.0, 1.0]));
    }
}
