//! `sum` and `mean`, over everything or along one axis.

use std::str::FromStr;

use crate::{error::TensorError, node::Node, shape::Shape, tensor::Tensor};

/// How a per-element result is folded, as named by loss functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    None,
    Sum,
    #[default]
    Mean,
}

impl FromStr for Reduction {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Reduction::None),
            "sum" => Ok(Reduction::Sum),
            "mean" => Ok(Reduction::Mean),
            other => Err(TensorError::invalid(
                "reduction",
                format!("unsupported reduction mode {other:?}"),
            )),
        }
    }
}

impl Reduction {
    pub fn apply(self, x: &Tensor) -> Tensor {
        match self {
            Reduction::None => x.clone(),
            Reduction::Sum => reduce(x, Axis::all(x), ReduceKind::Sum, 1.into()),
            Reduction::Mean => reduce(x, Axis::all(x), ReduceKind::Mean, 1.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReduceKind {
    Sum,
    Mean,
}

/// The input viewed as `outer × len × inner`, reducing the middle axis.
#[derive(Debug, Clone, Copy)]
struct Axis {
    outer: usize,
    len: usize,
    inner: usize,
}

impl Axis {
    fn all(x: &Tensor) -> Self {
        Axis {
            outer: 1,
            len: x.numel(),
            inner: 1,
        }
    }
}

fn resolve(
    shape: &Shape,
    dim: Option<usize>,
    keepdim: bool,
    op: &'static str,
) -> Result<(Axis, Shape), TensorError> {
    let Some(dim) = dim else {
        return Ok((
            Axis {
                outer: 1,
                len: shape.numel(),
                inner: 1,
            },
            1.into(),
        ));
    };
    let dims = shape.dims();
    if dim >= dims.len() {
        return Err(TensorError::invalid(
            op,
            format!("dim {dim} out of range for {shape}"),
        ));
    }
    let axis = Axis {
        outer: dims[..dim].iter().product(),
        len: dims[dim],
        inner: dims[dim + 1..].iter().product(),
    };
    let mut out = dims.to_vec();
    if keepdim {
        out[dim] = 1;
    } else {
        out.remove(dim);
        if out.is_empty() {
            out.push(1);
        }
    }
    Ok((axis, out.into()))
}

fn reduce(x: &Tensor, axis: Axis, kind: ReduceKind, out_shape: Shape) -> Tensor {
    let Axis { outer, len, inner } = axis;
    #[allow(clippy::cast_precision_loss)]
    let scale = match kind {
        ReduceKind::Sum => 1.0,
        ReduceKind::Mean => 1.0 / len as f32,
    };

    let mut out = vec![0.0; outer * inner];
    {
        let data = x.data();
        for o in 0..outer {
            for a in 0..len {
                let base = (o * len + a) * inner;
                for i in 0..inner {
                    out[o * inner + i] += data[base + i];
                }
            }
        }
    }
    if kind == ReduceKind::Mean {
        out.iter_mut().for_each(|v| *v *= scale);
    }

    let label = match kind {
        ReduceKind::Sum => "sum",
        ReduceKind::Mean => "mean",
    };
    let name = format!("{label}({})", x.name());
    let backward = move |node: &Node| {
        let prev = node.prev();
        let input = &prev[0];
        let mut delta = vec![0.0; outer * len * inner];
        {
            let g = node.grad();
            for o in 0..outer {
                for a in 0..len {
                    let base = (o * len + a) * inner;
                    for i in 0..inner {
                        delta[base + i] = g[o * inner + i] * scale;
                    }
                }
            }
        }
        input.node().accumulate_grad(&delta);
    };

    Tensor::derived(out, out_shape, vec![x.clone()], name, backward)
}

/// Sums every element (`dim = None`, result shape `[1]`) or along `dim`.
///
/// # Errors
/// Returns [`TensorError::InvalidArgument`] if `dim` is not an axis of `x`.
pub fn sum(x: &Tensor, dim: Option<usize>, keepdim: bool) -> Result<Tensor, TensorError> {
    let (axis, shape) = resolve(&x.shape(), dim, keepdim, "sum")?;
    Ok(reduce(x, axis, ReduceKind::Sum, shape))
}

/// Like [`sum`], divided by the number of reduced elements.
pub fn mean(x: &Tensor, dim: Option<usize>, keepdim: bool) -> Result<Tensor, TensorError> {
    let (axis, shape) = resolve(&x.shape(), dim, keepdim, "mean")?;
    Ok(reduce(x, axis, ReduceKind::Mean, shape))
}

impl Tensor {
    pub fn sum(&self, dim: Option<usize>, keepdim: bool) -> Result<Tensor, TensorError> {
        sum(self, dim, keepdim)
    }

    pub fn mean(&self, dim: Option<usize>, keepdim: bool) -> Result<Tensor, TensorError> {
        mean(self, dim, keepdim)
    }

    pub fn reduce(&self, reduction: Reduction) -> Tensor {
        reduction.apply(self)
    }
}
