//! Memory allocation policies for buffers.
//!
//! This module provides strategy traits that control how memory is allocated and aligned.

use std::{alloc::Layout, ptr::NonNull};

/// Strategy for initializing allocated memory.
pub trait InitStrategy {
    /// Allocates `layout` from the global allocator according to the
    /// strategy's initialization policy.
    ///
    /// Returns `None` if the allocator reports failure.
    ///
    /// # Safety
    ///
    /// `layout` must have a non-zero size.
    unsafe fn allocate(layout: Layout) -> Option<NonNull<u8>>;
}

/// Strategy for determining memory alignment requirements.
///
/// Implementations define alignment based on target architecture and SIMD
/// capabilities.
pub trait AlignmentStrategy {
    /// Returns the required memory alignment for type `T`, in bytes.
    ///
    /// Always a power of two.
    fn alignment<T>() -> usize;
}

/// SIMD-optimized alignment strategy.
///
/// Selects alignment based on target architecture and enabled
/// SIMD instruction sets:
/// - **`ARM64 with NEON`**: 16-byte alignment
/// - **`x86/x86_64 with AVX2`**: 32-byte alignment
/// - **Fallback**: `align_of::<T>()`
pub struct SimdAlignment;

/// 16-byte alignment for ARM NEON SIMD operations.
const NEON_ALIGN: usize = 16;

/// 32-byte alignment for x86 AVX2 SIMD operations.
const AVX2_ALIGN: usize = 32;

impl AlignmentStrategy for SimdAlignment {
    fn alignment<T>() -> usize {
        let ret = if cfg!(all(target_feature = "neon", target_arch = "aarch64")) {
            NEON_ALIGN
        } else if cfg!(all(
            target_feature = "avx2",
            any(target_arch = "x86", target_arch = "x86_64")
        )) {
            AVX2_ALIGN
        } else {
            std::mem::align_of::<T>()
        };
        // never below the type's own alignment
        let ret = ret.max(std::mem::align_of::<T>());
        assert!(ret.is_power_of_two());
        ret
    }
}

/// Allocates without initializing; contents are undefined until written.
pub struct Uninitialized;

impl InitStrategy for Uninitialized {
    unsafe fn allocate(layout: Layout) -> Option<NonNull<u8>> {
        // SAFETY:
        // - caller guarantees `layout` has a non-zero size.
        NonNull::new(unsafe { std::alloc::alloc(layout) })
    }
}

/// Allocates with every byte set to zero. For `f32` this is `0.0`, which is
/// what gradient buffers start from.
pub struct Zeroed;

impl InitStrategy for Zeroed {
    unsafe fn allocate(layout: Layout) -> Option<NonNull<u8>> {
        // SAFETY:
        // - caller guarantees `layout` has a non-zero size.
        NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) })
    }
}
