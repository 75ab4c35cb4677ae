//! The graph vertex behind every [`Tensor`] handle.

use std::{
    cell::{Cell, Ref, RefCell, RefMut},
    rc::Rc,
};

use crate::{shape::Shape, storage::Storage, tensor::Tensor};

/// Propagates the gradient of the node it is handed into that node's operands.
///
/// The executor passes the owning node in, so closures never need to capture
/// a handle to their own output.
pub type BackwardFn = Box<dyn Fn(&Node)>;

pub struct Node {
    data: RefCell<Storage<f32>>,
    grad: RefCell<Storage<f32>>,
    shape: RefCell<Shape>,
    name: String,
    ephemeral: Cell<bool>,
    backward: RefCell<Option<BackwardFn>>,
    prev: RefCell<Vec<Tensor>>,
}

impl Node {
    /// Caller guarantees `data.len() == shape.numel()`.
    pub(crate) fn new(
        data: Storage<f32>,
        shape: Shape,
        name: String,
        ephemeral: bool,
        prev: Vec<Tensor>,
        backward: Option<BackwardFn>,
    ) -> Self {
        debug_assert!(!data.is_empty());
        debug_assert_eq!(data.len(), shape.numel());
        let grad = Storage::zeroed(data.len());
        Self {
            data: RefCell::new(data),
            grad: RefCell::new(grad),
            shape: RefCell::new(shape),
            name,
            ephemeral: Cell::new(ephemeral),
            backward: RefCell::new(backward),
            prev: RefCell::new(prev),
        }
    }

    pub fn data(&self) -> Ref<'_, [f32]> {
        Ref::map(self.data.borrow(), Storage::as_slice)
    }

    pub fn data_mut(&self) -> RefMut<'_, [f32]> {
        RefMut::map(self.data.borrow_mut(), Storage::as_mut_slice)
    }

    pub fn grad(&self) -> Ref<'_, [f32]> {
        Ref::map(self.grad.borrow(), Storage::as_slice)
    }

    pub fn grad_mut(&self) -> RefMut<'_, [f32]> {
        RefMut::map(self.grad.borrow_mut(), Storage::as_mut_slice)
    }

    pub fn shape(&self) -> Ref<'_, Shape> {
        self.shape.borrow()
    }

    pub(crate) fn shape_mut(&self) -> RefMut<'_, Shape> {
        self.shape.borrow_mut()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn numel(&self) -> usize {
        self.data.borrow().len()
    }

    /// Operands in the order the op received them.
    pub fn prev(&self) -> Ref<'_, [Tensor]> {
        Ref::map(self.prev.borrow(), Vec::as_slice)
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral.get()
    }

    pub(crate) fn set_ephemeral(&self, ephemeral: bool) {
        self.ephemeral.set(ephemeral);
    }

    pub fn has_backward(&self) -> bool {
        self.backward.borrow().is_some()
    }

    /// Adds `delta` elementwise into the gradient buffer.
    ///
    /// # Panics
    /// Panics if `delta` does not match the gradient length.
    pub fn accumulate_grad(&self, delta: &[f32]) {
        let mut grad = self.grad.borrow_mut();
        let grad = grad.as_mut_slice();
        assert_eq!(grad.len(), delta.len(), "gradient length mismatch");
        for (g, d) in grad.iter_mut().zip(delta) {
            *g += d;
        }
    }

    pub(crate) fn fill_grad(&self, value: f32) {
        self.grad.borrow_mut().fill(value);
    }

    pub(crate) fn run_backward(&self) {
        if let Some(backward) = self.backward.borrow().as_ref() {
            backward(self);
        }
    }

    /// Drops the backward closure and operand edges. Returns whether anything
    /// was released.
    pub(crate) fn release(&self) -> bool {
        let had_edges = self.backward.borrow_mut().take().is_some();
        let prev = std::mem::take(&mut *self.prev.borrow_mut());
        had_edges || !prev.is_empty()
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        // unlink iteratively so long chains don't overflow the stack
        let mut pending = std::mem::take(self.prev.get_mut());
        while let Some(tensor) = pending.pop() {
            if let Ok(mut node) = Rc::try_unwrap(tensor.0) {
                pending.append(node.prev.get_mut());
            }
        }
    }
}
