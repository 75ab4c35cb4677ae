//! # autodiff
//!
//! A reverse-mode automatic differentiation engine over dense `f32` tensors.
//!
//! ## Features
//!
//! - Eager forward evaluation: every op computes its value immediately and
//!   records how to push gradients back to its operands.
//! - NumPy-style broadcasting for `+ - * /`, tiled matrix multiplication via
//!   `&`, pointwise `tanh`/`exp`/`log`/`relu`, and `sum`/`mean` reductions.
//! - Iterative graph traversal, so very deep chains neither overflow the
//!   stack on `backward` nor on drop.
//! - SIMD-aligned storage for tensor data and gradients.
//!
//! ```
//! use autodiff::Tensor;
//!
//! let x = Tensor::named(vec![2.0], 1, "x")?;
//! let w = Tensor::named(vec![-3.0], 1, "w")?;
//! let y = (&x * &w)?.tanh();
//! y.backward();
//! assert!(x.grad()[0] < 0.0);
//! # Ok::<(), autodiff::TensorError>(())
//! ```

#![warn(
    clippy::perf,
    clippy::correctness,
    clippy::complexity,
    clippy::style,
    clippy::suspicious,
    // clippy::pedantic
)]
#![deny(clippy::undocumented_unsafe_blocks, clippy::cast_possible_truncation)]
#![allow(clippy::float_cmp)]

pub mod config;
pub mod error;
pub mod graph;
pub mod init;
mod memory;
pub mod node;
pub mod ops;
pub mod persist;
pub mod shape;
mod storage;
mod tensor;
mod tensorizable;

// Re-export core types for convenience.
pub use config::{ExecutorConfig, TileConfig};
pub use error::TensorError;
pub use graph::GraphExecutor;
pub use node::Node;
pub use ops::{BinaryOp, Reduction, UnaryOp};
pub use shape::Shape;
pub use tensor::Tensor;
pub use tensorizable::Tensorizable;
