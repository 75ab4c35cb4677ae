//! Shape bookkeeping: row-major strides and broadcast resolution.

use std::{fmt::Display, ops::Index};

use crate::error::TensorError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl From<(usize, usize, usize)> for Shape {
    fn from(value: (usize, usize, usize)) -> Self {
        Shape(vec![value.0, value.1, value.2])
    }
}

impl From<(usize, usize)> for Shape {
    fn from(value: (usize, usize)) -> Self {
        Shape(vec![value.0, value.1])
    }
}

impl From<usize> for Shape {
    fn from(value: usize) -> Self {
        Shape(vec![value])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(value: Vec<usize>) -> Self {
        Shape(value)
    }
}

impl From<&[usize]> for Shape {
    fn from(value: &[usize]) -> Self {
        Shape(value.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(value: [usize; N]) -> Self {
        Shape(value.to_vec())
    }
}

impl Shape {
    /// Reinterprets the shape in place. The element count must not change.
    ///
    /// # Errors
    /// Returns [`TensorError::ShapeMismatch`] if the element counts differ.
    pub fn change(&mut self, shape: impl Into<Shape>) -> Result<(), TensorError> {
        let shape = shape.into();
        if shape.try_numel() != Some(self.numel()) {
            return Err(TensorError::mismatch("view", self, &shape));
        }
        self.0 = shape.0;
        Ok(())
    }

    #[inline]
    pub fn ndims(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Element count, saturating at `usize::MAX` for shapes too large to
    /// address. No buffer can be that long, so length checks still fail.
    #[inline]
    pub fn numel(&self) -> usize {
        self.try_numel().unwrap_or(usize::MAX)
    }

    /// Element count, or `None` if the product overflows `usize`.
    pub fn try_numel(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    pub fn strides(&self) -> Vec<usize> {
        compute_strides(&self.0)
    }

    /// Maps coordinates onto a flat row-major offset.
    ///
    /// # Errors
    /// Fails if the coordinate count differs from the rank or any coordinate
    /// is out of range.
    pub fn linear_index(&self, coords: &[usize]) -> Result<usize, TensorError> {
        if coords.len() != self.ndims() {
            return Err(TensorError::invalid(
                "index",
                format!("got {} coordinates for {self}", coords.len()),
            ));
        }
        let mut offset = 0;
        for ((&c, &d), s) in coords.iter().zip(&self.0).zip(self.strides()) {
            if c >= d {
                return Err(TensorError::invalid(
                    "index",
                    format!("coordinate {c} out of range for dimension of size {d}"),
                ));
            }
            offset += c * s;
        }
        Ok(offset)
    }
}

impl Index<usize> for Shape {
    type Output = usize;

    fn index(&self, index: usize) -> &Self::Output {
        assert!(index < self.ndims());
        &self.0[index]
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Shape(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, ")")
    }
}

/// Row-major strides: the last dimension is contiguous.
pub fn compute_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; dims.len()];
    let mut acc: usize = 1;
    for (stride, &dim) in strides.iter_mut().zip(dims).rev() {
        *stride = acc;
        acc = acc.saturating_mul(dim);
    }
    strides
}

/// Result of aligning two shapes for an elementwise op.
///
/// `lhs` and `rhs` are strides into each operand's own buffer, indexed by the
/// dimensions of `shape`. A zero stride replays the same element along that
/// dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub shape: Shape,
    pub lhs: Vec<usize>,
    pub rhs: Vec<usize>,
}

/// Resolves NumPy-style broadcasting between `a` and `b`.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] when a trailing-aligned dimension
/// differs and neither side is 1.
pub fn compute_broadcast(a: &Shape, b: &Shape) -> Result<Broadcast, TensorError> {
    let rank = a.ndims().max(b.ndims());
    let pad = |s: &Shape| {
        let mut dims = vec![1; rank - s.ndims()];
        dims.extend_from_slice(s.dims());
        dims
    };
    let (da, db) = (pad(a), pad(b));
    let (sa, sb) = (compute_strides(&da), compute_strides(&db));

    let mut out = Vec::with_capacity(rank);
    let mut lhs = Vec::with_capacity(rank);
    let mut rhs = Vec::with_capacity(rank);
    for i in 0..rank {
        match (da[i], db[i]) {
            (x, y) if x == y => {
                out.push(x);
                lhs.push(sa[i]);
                rhs.push(sb[i]);
            }
            (1, y) => {
                out.push(y);
                lhs.push(0);
                rhs.push(sb[i]);
            }
            (x, 1) => {
                out.push(x);
                lhs.push(sa[i]);
                rhs.push(0);
            }
            _ => return Err(TensorError::mismatch("broadcast", a, b)),
        }
    }

    Ok(Broadcast {
        shape: Shape(out),
        lhs,
        rhs,
    })
}
