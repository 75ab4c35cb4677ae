//! Differentiable operators. Each op computes its forward value eagerly and
//! installs the backward rule on the node it returns.

pub mod elementwise;
pub mod matmul;
pub mod reduce;
pub mod unary;

pub use elementwise::{BinaryOp, EPS, binary};
pub use matmul::{matmul, matmul_with};
pub use reduce::{Reduction, mean, sum};
pub use unary::{UnaryOp, greater, unary};
