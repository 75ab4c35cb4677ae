//! Pointwise functions and the comparison mask.

use crate::{node::Node, ops::elementwise::EPS, tensor::Tensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Tanh,
    Exp,
    Log,
    Relu,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Tanh => "tanh",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
            UnaryOp::Relu => "ReLU",
        }
    }

    #[inline]
    pub fn forward(self, x: f32) -> f32 {
        match self {
            UnaryOp::Tanh => x.tanh(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Log => (x.max(0.0) + EPS).ln(),
            UnaryOp::Relu => x.max(0.0),
        }
    }

    /// Gradient w.r.t. `x` given the forward input `x`, output `y` and
    /// upstream gradient `g`.
    #[inline]
    pub fn backward(self, x: f32, y: f32, g: f32) -> f32 {
        match self {
            UnaryOp::Tanh => (1.0 - y * y) * g,
            UnaryOp::Exp => y * g,
            UnaryOp::Log => g / (x.max(0.0) + EPS),
            // decided on the output, so x == 0 gets no gradient
            UnaryOp::Relu => {
                if y > 0.0 {
                    g
                } else {
                    0.0
                }
            }
        }
    }
}

pub fn unary(op: UnaryOp, x: &Tensor) -> Tensor {
    let out: Vec<f32> = {
        let data = x.data();
        if op == UnaryOp::Log {
            let masked = data.iter().filter(|&&v| v <= 0.0).count();
            if masked > 0 {
                log::warn!(
                    "log of {masked} non-positive value(s) in {:?} clamped to ln({EPS})",
                    x.name()
                );
            }
        }
        data.iter().map(|&v| op.forward(v)).collect()
    };

    let name = format!("{}({})", op.name(), x.name());
    let backward = move |node: &Node| {
        let prev = node.prev();
        let input = &prev[0];
        let delta: Vec<f32> = {
            let (xs, ys, gs) = (input.data(), node.data(), node.grad());
            xs.iter()
                .zip(ys.iter())
                .zip(gs.iter())
                .map(|((&x, &y), &g)| op.backward(x, y, g))
                .collect()
        };
        input.node().accumulate_grad(&delta);
    };

    Tensor::derived(out, x.shape(), vec![x.clone()], name, backward)
}

/// 0/1 mask of `x > threshold`. Gradient passes through where the mask is set,
/// whatever the threshold, so the mask acts as a straight-through gate.
pub fn greater(x: &Tensor, threshold: f32) -> Tensor {
    let out: Vec<f32> = x
        .data()
        .iter()
        .map(|&v| if v > threshold { 1.0 } else { 0.0 })
        .collect();

    let name = format!("{}>{threshold}", x.name());
    let backward = |node: &Node| {
        let prev = node.prev();
        let input = &prev[0];
        let delta: Vec<f32> = node
            .data()
            .iter()
            .zip(node.grad().iter())
            .map(|(&m, &g)| if m > 0.0 { g } else { 0.0 })
            .collect();
        input.node().accumulate_grad(&delta);
    };

    Tensor::derived(out, x.shape(), vec![x.clone()], name, backward)
}

impl Tensor {
    pub fn tanh(&self) -> Tensor {
        unary(UnaryOp::Tanh, self)
    }

    pub fn exp(&self) -> Tensor {
        unary(UnaryOp::Exp, self)
    }

    /// Natural log, with non-positive inputs clamped to `EPS`.
    pub fn log(&self) -> Tensor {
        unary(UnaryOp::Log, self)
    }

    pub fn relu(&self) -> Tensor {
        unary(UnaryOp::Relu, self)
    }

    /// See [`greater`]: the gradient follows the mask, not the threshold.
    pub fn gt(&self, threshold: f32) -> Tensor {
        greater(self, threshold)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn leaf(data: &[f32]) -> Tensor {
        Tensor::from_vec(data.to_vec(), data.len()).unwrap()
    }

    #[test]
    fn tanh_grad_uses_output() {
        let x = leaf(&[0.0, 1.0]);
        let y = x.tanh();
        y.backward();
        let t = 1.0f32.tanh();
        assert_abs_diff_eq!(y.to_vec()[1], t, epsilon = 1e-6);
        assert_abs_diff_eq!(x.grad_vec()[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(x.grad_vec()[1], 1.0 - t * t, epsilon = 1e-6);
    }

    #[test]
    fn exp_grad_is_its_value() {
        let x = leaf(&[0.0, 2.0]);
        let y = x.exp();
        y.backward();
        assert_eq!(x.grad_vec(), y.to_vec());
        assert_abs_diff_eq!(y.to_vec()[1], 2.0f32.exp(), epsilon = 1e-5);
    }

    #[test]
    fn log_is_guarded() {
        let x = leaf(&[1.0, 0.0, -2.0, 4.0]);
        let y = x.log();
        y.backward();
        let values = y.to_vec();
        assert_abs_diff_eq!(values[0], 0.0, epsilon = 1e-6);
        assert!(values.iter().all(|v| v.is_finite()));
        assert_eq!(values[1], values[2]);
        assert_abs_diff_eq!(x.grad_vec()[3], 0.25, epsilon = 1e-6);
        assert!(x.grad_vec().iter().all(|g| g.is_finite()));
    }

    #[test]
    fn relu_has_flat_spot_at_zero() {
        let x = leaf(&[-1.0, 0.0, 2.0]);
        let y = x.relu();
        y.backward();
        assert_eq!(y.to_vec(), vec![0.0, 0.0, 2.0]);
        assert_eq!(x.grad_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn greater_builds_mask() {
        let x = leaf(&[0.1, 0.7, 0.5, 0.9]);
        let m = x.gt(0.5);
        assert_eq!(m.to_vec(), vec![0.0, 1.0, 0.0, 1.0]);
        m.backward();
        assert_eq!(x.grad_vec(), vec![0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn greater_grad_follows_mask_for_any_threshold() {
        let x = leaf(&[1.0, 3.0, 2.5]);
        let m = x.gt(2.0);
        m.backward();
        assert_eq!(x.grad_vec(), vec![0.0, 1.0, 1.0]);

        let y = leaf(&[-3.0, -1.0]);
        let n = y.gt(-2.0);
        n.backward();
        assert_eq!(y.grad_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn names_describe_the_expression() {
        let x = Tensor::named(vec![1.0], 1, "x").unwrap();
        assert_eq!(x.tanh().name(), "tanh(x)");
        assert_eq!(x.relu().name(), "ReLU(x)");
    }
}
