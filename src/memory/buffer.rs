use std::{alloc::Layout, marker::PhantomData, ptr::NonNull};

use crate::memory::policy::{AlignmentStrategy, InitStrategy, SimdAlignment, Uninitialized, Zeroed};

/// Raw, aligned heap storage for elements of type `T`.
///
/// Owns the allocated memory and handles deallocation.
///
/// Alignment follows the chosen [`AlignmentStrategy`], by default 32 bytes
/// on `x86_64` with AVX2 and 16 bytes on `aarch64` with NEON.
///
/// # Note
///
/// `Buffer` only releases the allocation. It will **NOT** drop the `T`s
/// written into it, so it is only used for `Copy` element types.
#[derive(Debug)]
pub struct Buffer<T> {
    /// Pointer to start of allocation.
    ptr: NonNull<T>,
    /// Number of elements originally requested (`numel`).
    numel: usize,
    /// Full layout used during allocation (includes padding).
    layout: Layout,
}

/// Builder for constructing a [`Buffer`] with custom settings.
///
/// The init and alignment policies are carried in the type, so a builder
/// costs nothing at runtime.
pub struct BufferBuilder<I, A>
where
    A: AlignmentStrategy,
    I: InitStrategy,
{
    numel: usize,
    _marker: PhantomData<(A, I)>,
}

impl BufferBuilder<Uninitialized, SimdAlignment> {
    pub fn new(numel: usize) -> Self {
        Self {
            numel,
            _marker: PhantomData,
        }
    }
}

impl<I: InitStrategy, A: AlignmentStrategy> BufferBuilder<I, A> {
    /// The buffer will be allocated with all bytes set to zero.
    #[must_use]
    pub fn zeroed(self) -> BufferBuilder<Zeroed, A> {
        BufferBuilder::<Zeroed, A> {
            numel: self.numel,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn build<T>(self) -> Buffer<T> {
        Buffer::with_alignment::<I, A>(self.numel)
    }
}

impl<T> Buffer<T> {
    /// # Panics
    ///
    /// Panics if `T` is a Zero-Sized Type, `numel` is 0, or the allocation fails.
    fn with_alignment<I: InitStrategy, Align: AlignmentStrategy>(numel: usize) -> Self {
        assert!((std::mem::size_of::<T>() != 0), "ZSTs are not supported.");
        assert!(
            (numel != 0),
            "zero-sized buffers (numel=0) are not supported."
        );

        let align = Align::alignment::<T>();
        let size = self::utils::align_to::<T>(numel, align);
        let layout = Layout::from_size_align(size, align).unwrap_or_else(|_| {
            panic!("layout creation should have valid alignment: {align} and length: {numel}")
        });

        // SAFETY:
        // - `numel != 0` and `T` is not a ZST, so `size` is non-zero.
        let ptr = unsafe { I::allocate(layout) }
            .unwrap_or_else(|| std::alloc::handle_alloc_error(layout));

        self::utils::zero_trailing_bytes::<T>(ptr.as_ptr(), numel, size);

        Buffer {
            ptr: ptr.cast(),
            layout,
            numel,
        }
    }

    /// Returns the internal pointer to the underlying memory.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Returns a mutable internal pointer to the underlying memory
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Return the underlying layout: [`std::alloc::Layout`]
    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Returns the number of elements originally requested (logical length).
    #[inline]
    pub fn numel(&self) -> usize {
        self.numel
    }
}

impl<T> Drop for Buffer<T> {
    /// Deallocates the buffer. Does **not** drop any `T`s.
    fn drop(&mut self) {
        // SAFETY:
        // - `self.ptr` is not modified from the original allocation
        // - `self.layout()` is the same layout used for the original allocation
        unsafe {
            std::alloc::dealloc(self.ptr.as_ptr().cast(), self.layout());
        }
    }
}

mod utils {
    /// Returns allocation size (in bytes) for `numel` elements of `T`,
    /// rounded up to the nearest multiple of `align`.
    #[inline]
    pub fn align_to<T>(numel: usize, align: usize) -> usize {
        let tsize = std::mem::size_of::<T>();

        let size_in_bytes = numel
            .checked_mul(tsize)
            .unwrap_or_else(|| panic!("numel {numel} * tsize {tsize} overflowed."));

        (size_in_bytes + align - 1) & !(align - 1)
    }

    /// Fills trailing padding bytes with zeroes (if any).
    ///
    /// SIMD loads may read past the logical end of the buffer.
    /// Does nothing if `length * size_of::<T>() >= size`.
    #[inline]
    pub fn zero_trailing_bytes<T>(ptr: *mut u8, length: usize, size: usize) {
        let start_offset = length * std::mem::size_of::<T>();
        if start_offset >= size {
            return;
        }

        let pad_bytes = size - start_offset;

        // SAFETY:
        // - `ptr.add(start_offset)` is within allocation of `size` bytes
        unsafe {
            std::ptr::write_bytes(ptr.add(start_offset), 0, pad_bytes);
        }
    }
}
