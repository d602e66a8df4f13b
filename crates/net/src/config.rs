//! # Configuration
//!
//! Serde-loadable settings for recurrent layers and the recurrent network
//! driver. Missing fields take their defaults, so a JSON config only has to
//! name what differs:
//!
//! ```json
//! { "input_dim": 1, "hidden_dim": 10, "output_dim": 1, "unroll": 5 }
//! ```
//!
//! Every constructor calls `validate()` before allocating anything.

use bptt_core::{CoreError, Init, Result};
use bptt_diff::{ActivationKind, Clip, LearningRate, Loss};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::lstm::LstmLayer;
use crate::recurrent::{RecurrentLayer, RecurrentNetwork};
use crate::rnn::RnnLayer;

fn default_weights() -> Init {
    Init::ScaledUniform {
        min: -1.0,
        max: 1.0,
    }
}

fn default_biases() -> Init {
    Init::Constant(0.0)
}

fn check_dims(dims: &[(&str, usize)]) -> Result<()> {
    for (name, value) in dims {
        if *value == 0 {
            return Err(CoreError::config(format!("{} must be at least 1", name)));
        }
    }
    Ok(())
}

/// Vanilla RNN layer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RnnConfig {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub output_dim: usize,
    /// Time steps per forward/backward pass.
    pub unroll: usize,
    /// Hidden-state nonlinearity.
    pub activation: ActivationKind,
    pub rate: LearningRate,
    pub clip: Clip,
    pub weights: Init,
    pub biases: Init,
    /// Apply softmax to each output row.
    pub softmax: bool,
    /// Layer index used in snapshot keys.
    pub layer: usize,
}

impl Default for RnnConfig {
    fn default() -> Self {
        Self {
            input_dim: 1,
            hidden_dim: 10,
            output_dim: 1,
            unroll: 5,
            activation: ActivationKind::Tanh,
            rate: LearningRate::default(),
            clip: Clip::default(),
            weights: default_weights(),
            biases: default_biases(),
            softmax: false,
            layer: 0,
        }
    }
}

impl RnnConfig {
    pub fn new(input_dim: usize, hidden_dim: usize, output_dim: usize, unroll: usize) -> Self {
        Self {
            input_dim,
            hidden_dim,
            output_dim,
            unroll,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_dims(&[
            ("input_dim", self.input_dim),
            ("hidden_dim", self.hidden_dim),
            ("output_dim", self.output_dim),
            ("unroll", self.unroll),
        ])?;
        self.rate.validate()?;
        self.clip.validate()?;
        self.weights.validate()?;
        self.biases.validate()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CoreError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// LSTM layer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LstmConfig {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub output_dim: usize,
    pub unroll: usize,
    pub rate: LearningRate,
    pub clip: Clip,
    pub weights: Init,
    pub biases: Init,
    pub softmax: bool,
    pub layer: usize,
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            input_dim: 1,
            hidden_dim: 10,
            output_dim: 1,
            unroll: 5,
            rate: LearningRate::default(),
            clip: Clip::default(),
            weights: default_weights(),
            biases: default_biases(),
            softmax: false,
            layer: 0,
        }
    }
}

impl LstmConfig {
    pub fn new(input_dim: usize, hidden_dim: usize, output_dim: usize, unroll: usize) -> Self {
        Self {
            input_dim,
            hidden_dim,
            output_dim,
            unroll,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_dims(&[
            ("input_dim", self.input_dim),
            ("hidden_dim", self.hidden_dim),
            ("output_dim", self.output_dim),
            ("unroll", self.unroll),
        ])?;
        self.rate.validate()?;
        self.clip.validate()?;
        self.weights.validate()?;
        self.biases.validate()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CoreError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Which recurrent layer a network wraps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerConfig {
    Rnn(RnnConfig),
    Lstm(LstmConfig),
}

/// A recurrent layer plus driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrentNetworkConfig {
    pub layer: LayerConfig,
    /// Reporting loss; absent means the per-step absolute error.
    #[serde(default)]
    pub loss: Option<Loss>,
    /// Training calls between `info!` progress lines.
    #[serde(default = "default_log_interval")]
    pub log_interval: usize,
}

fn default_log_interval() -> usize {
    100
}

impl RecurrentNetworkConfig {
    pub fn validate(&self) -> Result<()> {
        match &self.layer {
            LayerConfig::Rnn(c) => c.validate(),
            LayerConfig::Lstm(c) => c.validate(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CoreError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Build the configured layer and wrap it in a network.
    pub fn build<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<RecurrentNetwork<Box<dyn RecurrentLayer>>> {
        let layer: Box<dyn RecurrentLayer> = match &self.layer {
            LayerConfig::Rnn(c) => Box::new(RnnLayer::new(c.clone(), rng)?),
            LayerConfig::Lstm(c) => Box::new(LstmLayer::new(c.clone(), rng)?),
        };
        let mut network = RecurrentNetwork::new(layer)?.with_log_interval(self.log_interval);
        if let Some(loss) = self.loss {
            network = network.with_loss(loss);
        }
        Ok(network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = RnnConfig::default();
        assert_eq!(c.activation, ActivationKind::Tanh);
        assert_eq!(c.rate, LearningRate::uniform(0.1));
        assert_eq!(c.clip, Clip::new(1.0, 1.0));
        assert_eq!(c.biases, Init::Constant(0.0));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_rnn_from_json_fills_defaults() {
        let c = RnnConfig::from_json(
            r#"{ "input_dim": 2, "hidden_dim": 8, "output_dim": 3, "unroll": 4, "activation": "sigmoid" }"#,
        )
        .unwrap();
        assert_eq!(c.input_dim, 2);
        assert_eq!(c.activation, ActivationKind::Sigmoid);
        assert_eq!(c.clip, Clip::default());
    }

    #[test]
    fn test_invalid_configs() {
        assert!(RnnConfig::new(1, 0, 1, 5).validate().is_err());
        assert!(LstmConfig::new(1, 4, 1, 0).validate().is_err());

        let mut c = RnnConfig::default();
        c.clip = Clip::new(-1.0, 1.0);
        assert!(matches!(c.validate(), Err(CoreError::InvalidConfig { .. })));

        let mut c = LstmConfig::default();
        c.rate = LearningRate::new(0.1, -0.5);
        assert!(c.validate().is_err());

        assert!(RnnConfig::from_json("{ not json").is_err());
        assert!(RnnConfig::from_json(r#"{ "unroll": 0 }"#).is_err());
    }

    #[test]
    fn test_network_config_json() {
        let c = RecurrentNetworkConfig::from_json(
            r#"{ "layer": { "kind": "lstm", "hidden_dim": 4, "unroll": 3 }, "loss": "squared" }"#,
        )
        .unwrap();
        assert_eq!(c.loss, Some(Loss::Squared));
        assert_eq!(c.log_interval, 100);
        match c.layer {
            LayerConfig::Lstm(l) => {
                assert_eq!(l.hidden_dim, 4);
                assert_eq!(l.unroll, 3);
            }
            other => panic!("unexpected layer {:?}", other),
        }
    }
}
