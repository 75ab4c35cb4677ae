//! Broadcasting binary ops: `+ - * /`.

use std::ops::{Add, Div, Mul, Sub};

use crate::{
    error::TensorError,
    node::Node,
    shape::{Broadcast, compute_broadcast},
    tensor::Tensor,
};

/// Added to denominators so division never produces Inf/NaN.
pub const EPS: f32 = 1e-7;

/// Scalar rule of a broadcasting binary op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    fn label(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
        }
    }

    #[inline]
    pub fn forward(self, a: f32, b: f32) -> f32 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / (b + EPS),
        }
    }

    /// Contributions `(dA, dB)` of upstream gradient `g` given the forward
    /// operands.
    #[inline]
    pub fn backward(self, a: f32, b: f32, g: f32) -> (f32, f32) {
        match self {
            BinaryOp::Add => (g, g),
            BinaryOp::Sub => (g, -g),
            BinaryOp::Mul => (b * g, a * g),
            BinaryOp::Div => {
                let d = b + EPS;
                (g / d, -a / (d * d) * g)
            }
        }
    }
}

/// Walks `dims` in row-major order, calling `f(out, lhs, rhs)` with the flat
/// output index and the matching operand offsets.
pub(crate) fn for_each_broadcast(
    dims: &[usize],
    lhs: &[usize],
    rhs: &[usize],
    mut f: impl FnMut(usize, usize, usize),
) {
    let numel: usize = dims.iter().product();
    let mut coords = vec![0; dims.len()];
    let (mut a, mut b) = (0, 0);
    for k in 0..numel {
        f(k, a, b);
        for d in (0..dims.len()).rev() {
            coords[d] += 1;
            a += lhs[d];
            b += rhs[d];
            if coords[d] < dims[d] {
                break;
            }
            a -= lhs[d] * dims[d];
            b -= rhs[d] * dims[d];
            coords[d] = 0;
        }
    }
}

/// Applies `op` to `a` and `b` under broadcasting and records its backward rule.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if the shapes cannot be broadcast.
pub fn binary(op: BinaryOp, a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    let (sa, sb) = (a.shape(), b.shape());
    let Broadcast { shape, lhs, rhs } =
        compute_broadcast(&sa, &sb).map_err(|_| TensorError::mismatch(op.label(), &sa, &sb))?;

    let mut out = vec![0.0; shape.numel()];
    {
        let (da, db) = (a.data(), b.data());
        for_each_broadcast(shape.dims(), &lhs, &rhs, |k, i, j| {
            out[k] = op.forward(da[i], db[j]);
        });
    }

    let dims = shape.dims().to_vec();
    let name = format!("{}{}{}", a.name(), op.symbol(), b.name());
    let backward = move |node: &Node| {
        let prev = node.prev();
        let (a, b) = (&prev[0], &prev[1]);
        let g = node.grad();
        let mut ga = vec![0.0; a.numel()];
        let mut gb = vec![0.0; b.numel()];
        {
            let (da, db) = (a.data(), b.data());
            for_each_broadcast(&dims, &lhs, &rhs, |k, i, j| {
                let (x, y) = op.backward(da[i], db[j], g[k]);
                ga[i] += x;
                gb[j] += y;
            });
        }
        // `a` and `b` may be the same node; accumulate one side at a time
        a.node().accumulate_grad(&ga);
        b.node().accumulate_grad(&gb);
    };

    Ok(Tensor::derived(
        out,
        shape,
        vec![a.clone(), b.clone()],
        name,
        backward,
    ))
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<&Tensor> for &Tensor {
            type Output = Result<Tensor, TensorError>;

            fn $method(self, rhs: &Tensor) -> Self::Output {
                binary($op, self, rhs)
            }
        }

        impl $trait<Tensor> for Tensor {
            type Output = Result<Tensor, TensorError>;

            fn $method(self, rhs: Tensor) -> Self::Output {
                binary($op, &self, &rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(Div, div, BinaryOp::Div);
