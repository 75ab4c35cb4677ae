use crate::shape::Shape;

#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    #[error("shape mismatch in {op}. lhs: {lhs}, rhs: {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },
    #[error("invalid argument to {op}: {why}")]
    InvalidArgument { op: &'static str, why: String },
    #[error("parameter file i/o failed")]
    Io(#[from] std::io::Error),
    #[error("malformed parameter file at line {line}: {why}")]
    Parse { line: usize, why: String },
}

impl TensorError {
    pub(crate) fn invalid(op: &'static str, why: impl Into<String>) -> Self {
        TensorError::InvalidArgument {
            op,
            why: why.into(),
        }
    }

    pub(crate) fn mismatch(op: &'static str, lhs: &Shape, rhs: &Shape) -> Self {
        TensorError::ShapeMismatch {
            op,
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        }
    }
}
