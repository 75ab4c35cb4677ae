//! Leaf constructors: constant fills, one-hot vectors, random initialisation
//! and stacking.

use rand::{Rng, distributions::Uniform};
use rand_distr::StandardNormal;

use crate::{error::TensorError, shape::Shape, storage::Storage, tensor::Tensor};

fn checked(shape: impl Into<Shape>, op: &'static str) -> Result<Shape, TensorError> {
    let shape = shape.into();
    match shape.try_numel() {
        Some(0) => Err(TensorError::invalid(op, format!("{shape} has no elements"))),
        Some(_) => Ok(shape),
        None => Err(TensorError::invalid(op, format!("{shape} is too large"))),
    }
}

pub fn full(shape: impl Into<Shape>, value: f32) -> Result<Tensor, TensorError> {
    let shape = checked(shape, "full")?;
    let storage = Storage::filled_with(shape.numel(), value);
    Ok(Tensor::from_storage(storage, shape, "full".into(), false))
}

pub fn zeros(shape: impl Into<Shape>) -> Result<Tensor, TensorError> {
    let shape = checked(shape, "zeros")?;
    let storage = Storage::zeroed(shape.numel());
    Ok(Tensor::from_storage(storage, shape, "zeros".into(), false))
}

pub fn zeros_like(tensor: &Tensor) -> Tensor {
    let shape = tensor.shape();
    let storage = Storage::zeroed(shape.numel());
    Tensor::from_storage(storage, shape, "zeros".into(), false)
}

pub fn ones(shape: impl Into<Shape>) -> Result<Tensor, TensorError> {
    let shape = checked(shape, "ones")?;
    let storage = Storage::filled_with(shape.numel(), 1.0);
    Ok(Tensor::from_storage(storage, shape, "ones".into(), false))
}

/// A `[classes]` vector with a single 1.0 at `index`.
pub fn one_hot(index: usize, classes: usize) -> Result<Tensor, TensorError> {
    if index >= classes {
        return Err(TensorError::invalid(
            "one_hot",
            format!("index {index} out of range for {classes} classes"),
        ));
    }
    let mut data = vec![0.0; classes];
    data[index] = 1.0;
    Tensor::with_options(data, classes, "one_hot", false)
}

/// Samples uniformly from `[low, high)` with the thread-local generator.
pub fn uniform(shape: impl Into<Shape>, low: f32, high: f32) -> Result<Tensor, TensorError> {
    uniform_with(&mut rand::thread_rng(), shape, low, high)
}

pub fn uniform_with<R: Rng + ?Sized>(
    rng: &mut R,
    shape: impl Into<Shape>,
    low: f32,
    high: f32,
) -> Result<Tensor, TensorError> {
    let shape = checked(shape, "uniform")?;
    if !low.is_finite() || !high.is_finite() || low >= high {
        return Err(TensorError::invalid(
            "uniform",
            format!("empty range [{low}, {high})"),
        ));
    }
    let dist = Uniform::new(low, high);
    let data: Vec<f32> = (0..shape.numel()).map(|_| rng.sample(dist)).collect();
    Tensor::with_options(data, shape, "uniform", false)
}

/// Samples from the standard normal distribution.
pub fn randn(shape: impl Into<Shape>) -> Result<Tensor, TensorError> {
    randn_with(&mut rand::thread_rng(), shape)
}

pub fn randn_with<R: Rng + ?Sized>(
    rng: &mut R,
    shape: impl Into<Shape>,
) -> Result<Tensor, TensorError> {
    let shape = checked(shape, "randn")?;
    let data: Vec<f32> = (0..shape.numel())
        .map(|_| rng.sample::<f32, _>(StandardNormal))
        .collect();
    Tensor::with_options(data, shape, "randn", false)
}

/// Copies equally-shaped tensors into a new leaf with a leading axis of
/// length `tensors.len()`. The result is not connected to the inputs.
pub fn stack(tensors: &[&Tensor]) -> Result<Tensor, TensorError> {
    let Some(first) = tensors.first() else {
        return Err(TensorError::invalid("stack", "nothing to stack"));
    };
    let inner = first.shape();
    let mut data = Vec::with_capacity(inner.numel() * tensors.len());
    for t in tensors {
        let shape = t.shape();
        if shape != inner {
            return Err(TensorError::mismatch("stack", &inner, &shape));
        }
        data.extend_from_slice(&t.data());
    }
    let mut dims = vec![tensors.len()];
    dims.extend_from_slice(inner.dims());
    Tensor::with_options(data, dims, "stack", false)
}
