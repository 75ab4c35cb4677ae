use crate::{Tensor, error::TensorError, shape::Shape};

pub trait Tensorizable {
    /// Converts nested rows or arrays into a leaf tensor.
    ///
    /// # Errors
    /// Returns an error if the input is ragged or empty.
    fn to_tensor(self) -> Result<Tensor, TensorError>;
}

impl Tensorizable for Vec<f32> {
    fn to_tensor(self) -> Result<Tensor, TensorError> {
        let shape = Shape::from(self.len());
        Tensor::from_vec(self, shape)
    }
}

impl Tensorizable for Vec<Vec<f32>> {
    fn to_tensor(self) -> Result<Tensor, TensorError> {
        let (dim0, dim1) = (self.len(), self.first().map_or(0, Vec::len));
        if let Some(row) = self.iter().find(|x| x.len() != dim1) {
            let expected = (self.len(), dim1).into();
            let received = (self.len(), row.len()).into();
            return Err(TensorError::mismatch("tensorize", &expected, &received));
        }

        let buf: Vec<f32> = self.into_iter().flatten().collect();
        Tensor::from_vec(buf, (dim0, dim1))
    }
}

fn check_vec_3d(data: &[Vec<Vec<f32>>]) -> Result<Shape, TensorError> {
    if data.is_empty() {
        return Ok((0, 0, 0).into());
    }
    let planes = data.len();

    let expected_rows = data[0].len();
    let expected_columns = data[0].first().map_or(0, Vec::len);
    let expected: Shape = (planes, expected_rows, expected_columns).into();

    for plane in data {
        let actual_rows = plane.len();
        if actual_rows != expected_rows {
            let received = (planes, actual_rows, expected_columns).into();
            return Err(TensorError::mismatch("tensorize", &expected, &received));
        }

        for row in plane {
            let actual_columns = row.len();
            if actual_columns != expected_columns {
                let received = (planes, actual_rows, actual_columns).into();
                return Err(TensorError::mismatch("tensorize", &expected, &received));
            }
        }
    }

    Ok(expected)
}

impl Tensorizable for Vec<Vec<Vec<f32>>> {
    fn to_tensor(self) -> Result<Tensor, TensorError> {
        let shape = check_vec_3d(&self)?;

        let buf: Vec<_> = self
            .into_iter()
            .flat_map(|v| v.into_iter().flatten())
            .collect();

        Tensor::from_vec(buf, shape)
    }
}

impl<const N: usize> Tensorizable for [f32; N] {
    fn to_tensor(self) -> Result<Tensor, TensorError> {
        Tensor::from_vec(self.to_vec(), N)
    }
}

impl<const N0: usize, const N1: usize> Tensorizable for [[f32; N1]; N0] {
    fn to_tensor(self) -> Result<Tensor, TensorError> {
        let buf: Vec<f32> = self.into_iter().flatten().collect();
        Tensor::from_vec(buf, (N0, N1))
    }
}

impl<const N0: usize, const N1: usize, const N2: usize> Tensorizable for [[[f32; N2]; N1]; N0] {
    fn to_tensor(self) -> Result<Tensor, TensorError> {
        let buf: Vec<_> = self
            .into_iter()
            .flat_map(|v| v.into_iter().flatten())
            .collect();

        Tensor::from_vec(buf, (N0, N1, N2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_arrays_keep_row_major_order() {
        let t = Tensor::new([[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(t.shape().dims(), &[2, 3]);
        assert_eq!(t.get(&[1, 1]).unwrap(), 5.0);

        let t = Tensor::new([[[1.0f32, 2.0]], [[3.0, 4.0]]]).unwrap();
        assert_eq!(t.shape().dims(), &[2, 1, 2]);
        assert_eq!(t.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = Tensor::new(vec![vec![1.0f32, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { .. }));

        let err = Tensor::new(vec![vec![vec![1.0f32], vec![2.0]], vec![vec![3.0]]]).unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { .. }));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(Tensor::new(Vec::<f32>::new()).is_err());
        assert!(Tensor::new(Vec::<Vec<Vec<f32>>>::new()).is_err());
    }
}
