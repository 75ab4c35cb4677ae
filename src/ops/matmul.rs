//! Rank-2 matrix multiply with a cache-blocked kernel.
//!
//! The kernel walks the output in row tiles × column tiles and the reduction
//! axis in narrow inner tiles, so a block of `right` stays hot while a row
//! tile of `result` is accumulated. With the `parallel` feature each row tile
//! is handed to rayon; row tiles are disjoint slices of the output and the
//! inputs are only read, so no synchronisation is needed beyond the join at
//! the end of the call.

use std::ops::BitAnd;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{config::TileConfig, error::TensorError, node::Node, tensor::Tensor};

/// `result += op(left) · op(right)` where `op` optionally transposes.
///
/// `result` is `rows × cols`; the reduction runs over `inners`. `left` is
/// `rows × inners` (or `inners × rows` when `TL`), `right` is `inners × cols`
/// (or `cols × inners` when `TR`). All buffers are row-major.
pub(crate) fn gemm<const TL: bool, const TR: bool>(
    left: &[f32],
    right: &[f32],
    result: &mut [f32],
    rows: usize,
    cols: usize,
    inners: usize,
    tiles: TileConfig,
) {
    debug_assert_eq!(left.len(), rows * inners);
    debug_assert_eq!(right.len(), inners * cols);
    debug_assert_eq!(result.len(), rows * cols);

    let (row_tile, col_tile, inner_tile) =
        (tiles.rows.max(1), tiles.cols.max(1), tiles.inner.max(1));

    let block = |(tile, out): (usize, &mut [f32])| {
        let row_start = tile * row_tile;
        let row_count = out.len() / cols;
        for col_begin in (0..cols).step_by(col_tile) {
            let col_end = (col_begin + col_tile).min(cols);
            for inner_begin in (0..inners).step_by(inner_tile) {
                let inner_end = (inner_begin + inner_tile).min(inners);
                for r in 0..row_count {
                    let row = row_start + r;
                    let out_row = &mut out[r * cols..(r + 1) * cols];
                    for inner in inner_begin..inner_end {
                        let l = if TL {
                            left[inner * rows + row]
                        } else {
                            left[row * inners + inner]
                        };
                        for (col, o) in out_row
                            .iter_mut()
                            .enumerate()
                            .take(col_end)
                            .skip(col_begin)
                        {
                            let rv = if TR {
                                right[col * inners + inner]
                            } else {
                                right[inner * cols + col]
                            };
                            *o += l * rv;
                        }
                    }
                }
            }
        }
    };

    #[cfg(feature = "parallel")]
    result
        .par_chunks_mut(row_tile * cols)
        .enumerate()
        .for_each(block);

    #[cfg(not(feature = "parallel"))]
    result
        .chunks_mut(row_tile * cols)
        .enumerate()
        .for_each(block);
}

/// Matrix product of two rank-2 tensors using the process-wide tiling.
///
/// # Errors
/// [`TensorError::InvalidArgument`] if either operand is not rank 2,
/// [`TensorError::ShapeMismatch`] if the inner dimensions differ.
pub fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    matmul_with(a, b, TileConfig::global())
}

pub fn matmul_with(a: &Tensor, b: &Tensor, tiles: TileConfig) -> Result<Tensor, TensorError> {
    let (sa, sb) = (a.shape(), b.shape());
    if sa.ndims() != 2 || sb.ndims() != 2 {
        return Err(TensorError::invalid(
            "matmul",
            format!("expected rank-2 operands, got {sa} and {sb}"),
        ));
    }
    let (m, k, n) = (sa[0], sa[1], sb[1]);
    if sb[0] != k {
        return Err(TensorError::mismatch("matmul", &sa, &sb));
    }
    log::debug!("matmul {m}x{k} @ {k}x{n}");

    let mut out = vec![0.0; m * n];
    gemm::<false, false>(&a.data(), &b.data(), &mut out, m, n, k, tiles);

    let name = format!("{} & {}", a.name(), b.name());
    let backward = move |node: &Node| {
        let prev = node.prev();
        let (a, b) = (&prev[0], &prev[1]);
        let g = node.grad();
        let mut ga = vec![0.0; m * k];
        let mut gb = vec![0.0; k * n];
        {
            let (da, db) = (a.data(), b.data());
            // dA = dOut · Bᵗ
            gemm::<false, true>(&g, &db, &mut ga, m, k, n, tiles);
            // dB = Aᵗ · dOut
            gemm::<true, false>(&da, &g, &mut gb, k, n, m, tiles);
        }
        a.node().accumulate_grad(&ga);
        b.node().accumulate_grad(&gb);
    };

    Ok(Tensor::derived(
        out,
        (m, n).into(),
        vec![a.clone(), b.clone()],
        name,
        backward,
    ))
}

impl BitAnd<&Tensor> for &Tensor {
    type Output = Result<Tensor, TensorError>;

    fn bitand(self, rhs: &Tensor) -> Self::Output {
        matmul(self, rhs)
    }
}

impl BitAnd<Tensor> for Tensor {
    type Output = Result<Tensor, TensorError>;

    fn bitand(self, rhs: Tensor) -> Self::Output {
        matmul(&self, &rhs)
    }
}

impl Tensor {
    pub fn matmul(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        matmul(self, other)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn naive(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
        let mut out = vec![0.0; m * n];
        for i in 0..m {
            for p in 0..k {
                for j in 0..n {
                    out[i * n + j] += a[i * k + p] * b[p * n + j];
                }
            }
        }
        out
    }

    fn ramp(len: usize, scale: f32) -> Vec<f32> {
        (0..len).map(|i| ((i % 7) as f32 - 3.0) * scale).collect()
    }

    #[test]
    fn row_vector_times_matrix() {
        let a = Tensor::from_vec(vec![1.0, 2.0], (1, 2)).unwrap();
        let b = Tensor::from_vec(vec![8.0, 6.0, 4.0, 2.0], (2, 2)).unwrap();
        let c = (&a & &b).unwrap();
        assert_eq!(c.shape().dims(), &[1, 2]);
        assert_eq!(c.to_vec(), vec![16.0, 10.0]);

        c.backward();
        assert_eq!(a.grad_vec(), vec![14.0, 6.0]);
        assert_eq!(b.grad_vec(), vec![1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn tiling_does_not_change_the_product() {
        let (m, k, n) = (37, 53, 29);
        let (a, b) = (ramp(m * k, 0.5), ramp(k * n, 0.25));
        let expected = naive(&a, &b, m, k, n);
        for tiles in [
            TileConfig::default(),
            TileConfig { rows: 4, cols: 8, inner: 3 },
            TileConfig { rows: 1, cols: 1, inner: 1 },
            TileConfig { rows: 0, cols: 0, inner: 0 },
        ] {
            let mut out = vec![0.0; m * n];
            gemm::<false, false>(&a, &b, &mut out, m, n, k, tiles);
            for (x, y) in out.iter().zip(&expected) {
                assert_abs_diff_eq!(x, y, epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn transposed_variants_match_explicit_transpose() {
        let (rows, cols, inners) = (5, 4, 3);
        let left_t = ramp(inners * rows, 1.0); // inners × rows
        let right = ramp(inners * cols, 0.5);
        let mut left = vec![0.0; rows * inners];
        for i in 0..inners {
            for r in 0..rows {
                left[r * inners + i] = left_t[i * rows + r];
            }
        }
        let expected = naive(&left, &right, rows, inners, cols);
        let mut out = vec![0.0; rows * cols];
        gemm::<true, false>(&left_t, &right, &mut out, rows, cols, inners, TileConfig::default());
        assert_eq!(out, expected);

        let mut right_t = vec![0.0; cols * inners];
        for i in 0..inners {
            for c in 0..cols {
                right_t[c * inners + i] = right[i * cols + c];
            }
        }
        let mut out = vec![0.0; rows * cols];
        gemm::<false, true>(&left, &right_t, &mut out, rows, cols, inners, TileConfig::default());
        assert_eq!(out, expected);
    }

    #[test]
    fn gradients_match_closed_form_on_rectangular_inputs() {
        let a = Tensor::from_vec(ramp(6, 1.0), (2, 3)).unwrap();
        let b = Tensor::from_vec(ramp(12, 0.5), (3, 4)).unwrap();
        let c = matmul_with(&a, &b, TileConfig { rows: 1, cols: 2, inner: 2 }).unwrap();
        c.backward();

        // with a ones seed, dA[i,p] = Σ_j B[p,j] and dB[p,j] = Σ_i A[i,p]
        let (da, db) = (a.to_vec(), b.to_vec());
        for i in 0..2 {
            for p in 0..3 {
                let row_sum: f32 = db[p * 4..p * 4 + 4].iter().sum();
                assert_abs_diff_eq!(a.grad_vec()[i * 3 + p], row_sum, epsilon = 1e-5);
            }
        }
        for p in 0..3 {
            let col_sum = da[p] + da[3 + p];
            for j in 0..4 {
                assert_abs_diff_eq!(b.grad_vec()[p * 4 + j], col_sum, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn square_self_product_accumulates_both_adjoints() {
        let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], (2, 2)).unwrap();
        let y = (&x & &x).unwrap();
        assert_eq!(y.to_vec(), vec![7.0, 10.0, 15.0, 22.0]);
        y.backward();
        // dX = 1·Xᵗ + Xᵗ·1
        assert_eq!(x.grad_vec(), vec![7.0, 11.0, 9.0, 13.0]);
    }

    #[test]
    fn rejects_bad_ranks_and_inner_dims() {
        let v = Tensor::from_vec(vec![1.0, 2.0], 2).unwrap();
        let m = Tensor::from_vec(vec![1.0; 6], (3, 2)).unwrap();
        assert!(matches!(
            matmul(&v, &m).unwrap_err(),
            TensorError::InvalidArgument { .. }
        ));
        assert!(matches!(
            matmul(&m, &m).unwrap_err(),
            TensorError::ShapeMismatch { .. }
        ));
    }
}
