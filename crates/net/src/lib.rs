//! # Net - Layers, Recurrence and Drivers
//!
//! This crate composes `bptt-diff` cells into trainable layers:
//!
//! - **Feed-forward**: [`DenseLayer`], [`SoftmaxLayer`] and the [`Network`] driver
//! - **Parallel**: [`ParallelLayer`], one tokio task per unit
//! - **Recurrent**: [`RnnLayer`] and [`LstmLayer`], trained by
//!   backpropagation through time with clipping and Adagrad
//! - **Streaming**: [`RecurrentNetwork`] windows a vector stream into
//!   next-step prediction batches
//! - **Inspection**: [`Snapshot`] of every learnable tensor
//! - **Configuration**: serde configs with validation
//!
//! ## Example
//!
//! ```rust
//! use bptt_core::Vector;
//! use bptt_net::{RecurrentLayer, RnnConfig, RnnLayer};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut layer = RnnLayer::new(RnnConfig::new(1, 10, 1, 5), &mut StdRng::seed_from_u64(42)).unwrap();
//! let batch: Vec<Vector> = [0.1, 0.2, 0.3, 0.4, 0.5].iter().map(|&v| Vector::from([v])).collect();
//! let expected: Vec<Vector> = [0.1, 0.2, 0.3, 0.2, 0.1].iter().map(|&v| Vector::from([v])).collect();
//!
//! let outputs = layer.forward(&batch).unwrap();
//! let loss = layer.backward(&expected).unwrap();
//! assert_eq!(outputs.len(), 5);
//! assert_eq!(loss.len(), 5);
//! ```

pub mod config;
pub mod layer;
pub mod lstm;
pub mod network;
pub mod parallel;
pub mod recurrent;
pub mod rnn;
pub mod snapshot;
pub mod softmax;

pub use config::{LayerConfig, LstmConfig, RecurrentNetworkConfig, RnnConfig};
pub use layer::{DenseLayer, Layer};
pub use lstm::{LstmLayer, LstmParams};
pub use network::{Network, Training};
pub use parallel::ParallelLayer;
pub use recurrent::{RecurrentLayer, RecurrentNetwork, RecurrentTraining};
pub use rnn::{RnnLayer, RnnParams};
pub use snapshot::Snapshot;
pub use softmax::SoftmaxLayer;
