use std::{
    cell::{Ref, RefMut},
    fmt::Display,
    rc::Rc,
};

use crate::{
    config::ExecutorConfig,
    error::TensorError,
    graph::GraphExecutor,
    node::Node,
    shape::Shape,
    storage::Storage,
    tensorizable::Tensorizable,
};

/// Shared handle to a node in the computation graph.
///
/// Cloning is cheap and yields another handle to the same node; a node lives
/// as long as any handle or any downstream op still refers to it.
#[derive(Clone)]
pub struct Tensor(pub(crate) Rc<Node>);

impl Tensor {
    pub fn new(data: impl Tensorizable) -> Result<Self, TensorError> {
        data.to_tensor()
    }

    /// Creates a durable, unnamed leaf.
    ///
    /// # Errors
    /// Fails if `data.len()` differs from the element count of `shape`, or
    /// the tensor would be empty.
    pub fn from_vec(data: Vec<f32>, shape: impl Into<Shape>) -> Result<Self, TensorError> {
        Self::with_options(data, shape, "", false)
    }

    /// Creates a durable leaf carrying a debug label, e.g. a model parameter.
    pub fn named(
        data: Vec<f32>,
        shape: impl Into<Shape>,
        name: impl Into<String>,
    ) -> Result<Self, TensorError> {
        Self::with_options(data, shape, name, false)
    }

    pub fn with_options(
        data: Vec<f32>,
        shape: impl Into<Shape>,
        name: impl Into<String>,
        ephemeral: bool,
    ) -> Result<Self, TensorError> {
        let shape = shape.into();
        check_len(&data, &shape)?;
        Ok(Self::from_storage(
            Storage::from_slice(&data),
            shape,
            name.into(),
            ephemeral,
        ))
    }

    /// Creates a derived node from an op's forward result, its operands and
    /// its backward rule. Derived nodes start out ephemeral.
    pub fn from_op(
        data: Vec<f32>,
        shape: impl Into<Shape>,
        prev: Vec<Tensor>,
        name: impl Into<String>,
        backward: impl Fn(&Node) + 'static,
    ) -> Result<Self, TensorError> {
        let shape = shape.into();
        check_len(&data, &shape)?;
        Ok(Self::derived(data, shape, prev, name.into(), backward))
    }

    pub(crate) fn from_storage(
        storage: Storage<f32>,
        shape: Shape,
        name: String,
        ephemeral: bool,
    ) -> Self {
        Tensor(Rc::new(Node::new(
            storage,
            shape,
            name,
            ephemeral,
            Vec::new(),
            None,
        )))
    }

    /// Caller guarantees `data` is non-empty and matches `shape`.
    pub(crate) fn derived(
        data: Vec<f32>,
        shape: Shape,
        prev: Vec<Tensor>,
        name: String,
        backward: impl Fn(&Node) + 'static,
    ) -> Self {
        Tensor(Rc::new(Node::new(
            Storage::from_slice(&data),
            shape,
            name,
            true,
            prev,
            Some(Box::new(backward)),
        )))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn data(&self) -> Ref<'_, [f32]> {
        self.0.data()
    }

    /// Mutable access to the values, for optimizers and loaders updating
    /// leaves between passes. Ops never write through this.
    pub fn data_mut(&self) -> RefMut<'_, [f32]> {
        self.0.data_mut()
    }

    pub fn grad(&self) -> Ref<'_, [f32]> {
        self.0.grad()
    }

    pub fn grad_mut(&self) -> RefMut<'_, [f32]> {
        self.0.grad_mut()
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.data().to_vec()
    }

    pub fn grad_vec(&self) -> Vec<f32> {
        self.grad().to_vec()
    }

    pub fn shape(&self) -> Shape {
        self.0.shape().clone()
    }

    pub fn strides(&self) -> Vec<usize> {
        self.0.shape().strides()
    }

    pub fn ndims(&self) -> usize {
        self.0.shape().ndims()
    }

    pub fn numel(&self) -> usize {
        self.0.numel()
    }

    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn prev(&self) -> Vec<Tensor> {
        self.0.prev().to_vec()
    }

    pub fn is_ephemeral(&self) -> bool {
        self.0.is_ephemeral()
    }

    /// Marks the node durable so a reclaiming backward pass keeps its edges.
    pub fn persist(&self) -> &Self {
        self.0.set_ephemeral(false);
        self
    }

    pub fn zero_grad(&self) {
        self.0.fill_grad(0.0);
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Tensor) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn id(&self) -> *const Node {
        Rc::as_ptr(&self.0)
    }

    /// Reads the element at `coords`.
    ///
    /// # Errors
    /// Fails on a rank mismatch or an out-of-range coordinate.
    pub fn get(&self, coords: &[usize]) -> Result<f32, TensorError> {
        let index = self.0.shape().linear_index(coords)?;
        Ok(self.data()[index])
    }

    pub fn set(&self, coords: &[usize], value: f32) -> Result<(), TensorError> {
        let index = self.0.shape().linear_index(coords)?;
        self.data_mut()[index] = value;
        Ok(())
    }

    /// Reinterprets the buffer under `shape` in place. Data is not moved.
    ///
    /// # Errors
    /// Returns [`TensorError::ShapeMismatch`] if the element count changes.
    pub fn view(&self, shape: impl Into<Shape>) -> Result<(), TensorError> {
        self.0.shape_mut().change(shape)
    }

    /// Seeds this node's gradient with ones and propagates it through the
    /// whole graph below it. The graph is kept and may be differentiated again.
    pub fn backward(&self) {
        GraphExecutor::default().run(self);
    }

    pub fn backward_with(&self, config: ExecutorConfig) {
        GraphExecutor::new(config).run(self);
    }

    /// Renders this node, and with `with_prev` every node below it.
    pub fn describe(&self, with_prev: bool) -> String {
        if !with_prev {
            return self.to_string();
        }
        let mut out = String::new();
        let mut stack = vec![(self.clone(), 0usize)];
        while let Some((tensor, depth)) = stack.pop() {
            let indent = "  ".repeat(depth);
            for line in tensor.to_string().lines() {
                out.push_str(&indent);
                out.push_str(line);
                out.push('\n');
            }
            for p in tensor.prev().into_iter().rev() {
                stack.push((p, depth + 1));
            }
        }
        out
    }
}

fn check_len(data: &[f32], shape: &Shape) -> Result<(), TensorError> {
    let Some(numel) = shape.try_numel() else {
        return Err(TensorError::invalid(
            "tensor",
            format!("{shape} has more elements than can be addressed"),
        ));
    };
    if data.is_empty() || numel == 0 {
        return Err(TensorError::invalid(
            "tensor",
            "empty tensors are not supported",
        ));
    }
    if data.len() != numel {
        return Err(TensorError::mismatch("tensor", &data.len().into(), shape));
    }
    Ok(())
}

const PREVIEW: usize = 10;

fn write_preview(f: &mut std::fmt::Formatter<'_>, values: &[f32]) -> std::fmt::Result {
    for v in values.iter().take(PREVIEW) {
        write!(f, "{v} ")?;
    }
    if values.len() > PREVIEW {
        write!(f, "...")?;
    }
    Ok(())
}

impl Display for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.name())?;
        write!(f, "Data: ")?;
        write_preview(f, &self.data())?;
        writeln!(f)?;
        writeln!(f, "Shape: {}", self.0.shape())?;
        write!(f, "Grad: ")?;
        write_preview(f, &self.grad())
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("name", &self.name())
            .field("shape", &*self.0.shape())
            .field("data", &&*self.data())
            .field("grad", &&*self.grad())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_checks_length() {
        let err = Tensor::from_vec(vec![1.0, 2.0, 3.0], (2, 2)).unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { .. }));
        let err = Tensor::from_vec(vec![], 0).unwrap_err();
        assert!(matches!(err, TensorError::InvalidArgument { .. }));
    }

    #[test]
    fn leaves_start_with_zero_grad() {
        let t = Tensor::named(vec![1.0, 2.0], 2, "w").unwrap();
        assert_eq!(t.name(), "w");
        assert_eq!(t.grad_vec(), vec![0.0, 0.0]);
        assert!(!t.is_ephemeral());
        assert!(t.prev().is_empty());
    }

    #[test]
    fn get_and_set_use_strides() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], (2, 3)).unwrap();
        assert_eq!(t.strides(), vec![3, 1]);
        assert_eq!(t.get(&[1, 0]).unwrap(), 4.0);
        t.set(&[0, 2], 9.0).unwrap();
        assert_eq!(t.to_vec(), vec![1.0, 2.0, 9.0, 4.0, 5.0, 6.0]);
        assert!(t.get(&[2, 0]).is_err());
    }

    #[test]
    fn view_round_trip_keeps_data() {
        let t = Tensor::from_vec((0..12).map(|x| x as f32).collect(), (3, 4)).unwrap();
        let before = t.to_vec();
        t.view((2, 6)).unwrap();
        assert_eq!(t.shape().dims(), &[2, 6]);
        assert_eq!(t.get(&[1, 0]).unwrap(), 6.0);
        t.view((3, 4)).unwrap();
        assert_eq!(t.to_vec(), before);
        assert!(matches!(
            t.view(5).unwrap_err(),
            TensorError::ShapeMismatch { .. }
        ));
    }

    #[test]
    fn oversized_shapes_are_rejected() {
        let err = Tensor::from_vec(vec![1.0, 2.0], (usize::MAX / 2 + 2, 2)).unwrap_err();
        assert!(matches!(err, TensorError::InvalidArgument { op: "tensor", .. }));

        let t = Tensor::from_vec(vec![1.0, 2.0], 2).unwrap();
        let err = t.view((usize::MAX / 2 + 2, 2)).unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { op: "view", .. }));
        assert_eq!(t.shape().dims(), &[2]);
        assert_eq!(t.get(&[1]).unwrap(), 2.0);
    }

    #[test]
    fn custom_op_from_operands() {
        // y = 2x with a hand-written backward rule
        let x = Tensor::named(vec![1.0, -2.0, 3.0], 3, "x").unwrap();
        let data: Vec<f32> = x.to_vec().iter().map(|v| 2.0 * v).collect();
        let double = |node: &Node| {
            let delta: Vec<f32> = node.grad().iter().map(|g| 2.0 * g).collect();
            node.prev()[0].node().accumulate_grad(&delta);
        };
        let y = Tensor::from_op(data, 3, vec![x.clone()], "2x", double).unwrap();

        assert!(y.is_ephemeral());
        assert_eq!(y.name(), "2x");
        assert_eq!(y.to_vec(), vec![2.0, -4.0, 6.0]);
        assert!(y.prev()[0].ptr_eq(&x));

        let z = (&y * &y).unwrap().sum(None, false).unwrap();
        z.backward();
        // d(sum 4x^2)/dx = 8x
        assert_eq!(x.grad_vec(), vec![8.0, -16.0, 24.0]);

        let err = Tensor::from_op(vec![1.0; 2], 3, vec![x.clone()], "bad", double).unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { op: "tensor", .. }));
    }

    #[test]
    fn display_truncates_long_buffers() {
        let t = Tensor::named(vec![1.0; 12], 12, "ones").unwrap();
        let s = t.to_string();
        assert!(s.starts_with("ones\n"));
        assert!(s.contains("..."));
        assert!(s.contains("Shape: Shape(12)"));
    }

    #[test]
    fn persist_marks_durable() {
        let a = Tensor::from_vec(vec![1.0], 1).unwrap();
        let b = a.tanh();
        assert!(b.is_ephemeral());
        b.persist();
        assert!(!b.is_ephemeral());
    }
}
