//! Provides aligned memory storage [`Storage`] for tensor data and gradients.
//! Handles allocation, deallocation, and basic access, with memory alignment.

use crate::memory::buffer::{Buffer, BufferBuilder};

/// `Storage<T>` is a fully-initialized, fixed-length memory container.
///
/// It wraps [`Buffer<T>`], which handles allocation and layout. Every element
/// in `[0, len())` is written at construction, so the safe accessors below
/// never observe uninitialized memory. The padded tail of the `Buffer` is
/// never exposed.
pub struct Storage<T: Copy> {
    /// See [`crate::memory::buffer::Buffer`].
    buffer: Buffer<T>,
}

impl<T: Copy> Storage<T> {
    /// Creates a new storage buffer and copies each element from the given slice.
    ///
    /// # Panics
    ///
    /// Panics if `slice` is empty.
    pub fn from_slice(slice: &[T]) -> Self {
        let mut buffer: Buffer<T> = BufferBuilder::new(slice.len()).build();
        // SAFETY:
        // - `buffer` holds exactly `slice.len()` logical elements.
        // - a fresh allocation cannot overlap `slice`.
        unsafe {
            std::ptr::copy_nonoverlapping(slice.as_ptr(), buffer.as_mut_ptr(), slice.len());
        }
        Self { buffer }
    }

    /// Creates a new storage buffer of `numel` elements, each set to `value`.
    pub fn filled_with(numel: usize, value: T) -> Self {
        let mut buffer: Buffer<T> = BufferBuilder::new(numel).build();
        let ptr = buffer.as_mut_ptr();
        for i in 0..numel {
            // SAFETY:
            // - `ptr + i` is within the logical region since we
            //   allocate exactly `numel` elements.
            unsafe {
                std::ptr::write(ptr.add(i), value);
            }
        }
        Self { buffer }
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.buffer.numel()
    }

    /// Always `false` in practice, since empty buffers cannot be allocated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a shared slice of all elements.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY:
        // - `self.buffer.as_ptr()` is a valid non-null, aligned pointer to
        //   allocated memory.
        // - all `numel` elements were written at construction.
        unsafe { std::slice::from_raw_parts(self.buffer.as_ptr(), self.len()) }
    }

    /// Returns a mutable slice of all elements.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len();
        // SAFETY:
        // - `self.buffer.as_mut_ptr()` is a valid non-null, aligned pointer to
        //   allocated memory.
        // - all `numel` elements were written at construction.
        unsafe { std::slice::from_raw_parts_mut(self.buffer.as_mut_ptr(), len) }
    }

    /// Overwrites every element with `value`, keeping the allocation.
    pub fn fill(&mut self, value: T) {
        self.as_mut_slice().fill(value);
    }
}

impl Storage<f32> {
    /// Creates a zero-filled `f32` storage straight from a zeroed allocation.
    pub fn zeroed(numel: usize) -> Self {
        let buffer: Buffer<f32> = BufferBuilder::new(numel).zeroed().build();
        Self { buffer }
    }
}

impl<T: Copy> Clone for Storage<T> {
    fn clone(&self) -> Self {
        Self::from_slice(self.as_slice())
    }
}

impl<T: Copy + std::fmt::Debug> std::fmt::Debug for Storage<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}
