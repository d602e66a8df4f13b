//! # Core - Values Beneath the Network
//!
//! This crate provides the pure building blocks every cell and layer uses:
//!
//! - **Shapes**: dimension descriptions carried by shape errors
//! - **Errors**: one error enum for every logic or configuration defect
//! - **Tensors**: dense `Vector` / `Matrix` values and their linear algebra
//! - **Initialisers**: seeded, pluggable weight generators
//! - **Windows**: ring buffers turning a vector stream into fixed-length sequences
//!
//! Nothing here logs, spawns, or holds shared state. The differentiable
//! pieces live in `bptt-diff`; layers and drivers live in `bptt-net`.

pub mod error;
pub mod init;
pub mod shape;
pub mod tensor;
pub mod window;

// Re-export key types at crate root for convenience
pub use error::{CoreError, Result};
pub use init::Init;
pub use shape::Shape;
pub use tensor::{sequence_abs_sum, sequence_sub, Matrix, Sequence, Vector};
pub use window::{split_window, Window};
