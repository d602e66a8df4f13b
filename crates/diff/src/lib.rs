//! # Diff - Hand-Written Gradients
//!
//! This crate holds everything that knows a derivative. There is no tape and
//! no graph: each cell type writes its own backward pass.
//!
//! ## Modules
//!
//! - [`activation`]: sigmoid, tanh, ReLU, identity and softmax
//! - [`module`]: the `Activation` / `Learning` / `Descent` capabilities
//! - [`loss`]: difference, squared error and cross-entropy
//! - [`weights`]: weight tensors and unit identity
//! - [`cell`]: the stateful forward/backward units
//! - [`ops`]: stack, multiply and add operators for gate wiring
//! - [`optim`]: clipping, SGD and Adagrad state
//!
//! ## Example
//!
//! ```rust
//! use bptt_core::{Init, Vector};
//! use bptt_diff::{ActivationCell, ActivationKind, Cell, LearningModule, LearningRate, Meta, Weights};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let weights = Weights::new(2, 1, &Init::Constant(0.5), &Init::Constant(0.5), &mut rng).unwrap();
//! let module = LearningModule::new(ActivationKind::Sigmoid, LearningRate::uniform(1.0));
//! let mut cell = ActivationCell::perceptron(weights, module, Meta::new(0, 0)).unwrap();
//!
//! let y = cell.forward(&Vector::from([0.0, 1.0])).unwrap();
//! let back = cell.backward(&Vector::from([1.0 - y[0]])).unwrap();
//! assert_eq!(back.len(), 2);
//! ```

pub mod activation;
pub mod cell;
pub mod loss;
pub mod module;
pub mod ops;
pub mod optim;
pub mod weights;

// Re-export key types
pub use activation::{sigmoid, softmax, softmax_backward, ActivationKind};
pub use cell::{ActivationCell, Cell, Memory, NoOpCell, SoftCell, TiedCell, WeightCell};
pub use loss::Loss;
pub use module::{
    Activation, Descent, DescentKind, Learning, LearningModule, LearningRate, Module,
};
pub use ops::{AddOp, BiOp, MulOp, StackOp};
pub use optim::{Accumulator, Clip, Delta, Parameter, Sgd, ADAGRAD_EPSILON};
pub use weights::{Meta, Weights};
