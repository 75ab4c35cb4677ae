//! Aligned raw allocations backing [`crate::storage::Storage`].

pub mod buffer;
pub mod policy;
