//! Fixed-capacity GPU tables.
//!
//! A [`BufferWriter`] packs `Pod` values into a CPU-side byte image that is
//! later uploaded as-is. Each element occupies one *stride*:
//!
//! ```text
//! padded (uniform blocks, stride = align_up(size_of::<T>(), alignment)):
//! ┌──────────┬─────┬──────────┬─────┬──────────┬─────┐
//! │ T[0]     │ pad │ T[1]     │ pad │ T[2]     │ pad │ ...
//! └──────────┴─────┴──────────┴─────┴──────────┴─────┘
//! 0        stride          2*stride
//!
//! packed (storage arrays, stride = size_of::<T>()):
//! ┌──────────┬──────────┬──────────┐
//! │ T[0]     │ T[1]     │ T[2]     │ ...
//! └──────────┴──────────┴──────────┘
//! ```
//!
//! The alignment for padded tables comes from
//! [`VideoDriver::min_uniform_alignment`](crate::backend::VideoDriver::min_uniform_alignment)
//! at runtime. Every site that reads an element, on the CPU or through a
//! bound offset on the GPU, must address it with [`padded_offset`] (or
//! [`BufferWriter::offset_of`]) using the same alignment.
//!
//! Writers are append-only and index-stable: an index returned by
//! [`BufferWriter::write`] stays valid until [`BufferWriter::reset`]. When the
//! table is full `write` returns `None` and the caller drops that item for the
//! current frame.

use std::marker::PhantomData;

use bytemuck::Pod;

use crate::error::{RendererError, Result};

/// Round `value` up to the next multiple of `alignment` (a power of two).
#[inline]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Stride of `T` inside a table padded to `alignment`.
#[inline]
pub const fn padded_stride<T>(alignment: u64) -> u64 {
    align_up(std::mem::size_of::<T>() as u64, alignment)
}

/// Byte offset of element `index` of a `T` table padded to `alignment`.
#[inline]
pub const fn padded_offset<T>(index: u32, alignment: u64) -> u64 {
    padded_stride::<T>(alignment) * index as u64
}

/// Append-only, fixed-capacity table of `T` stored as GPU-ready bytes.
#[derive(Debug, Clone)]
pub struct BufferWriter<T: Pod> {
    label: &'static str,
    bytes: Vec<u8>,
    stride: usize,
    capacity: u32,
    len: u32,
    high_water_mark: u32,
    _marker: PhantomData<T>,
}

impl<T: Pod> BufferWriter<T> {
    /// Create a table whose elements are padded to `alignment` bytes.
    ///
    /// Returns an error if `alignment` is not a non-zero power of two.
    pub fn padded(label: &'static str, capacity: u32, alignment: u64) -> Result<Self> {
        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(RendererError::InvalidParameter(format!(
                "{label}: uniform alignment must be a power of 2, got {alignment}"
            )));
        }
        Ok(Self::with_stride(label, capacity, padded_stride::<T>(alignment) as usize))
    }

    /// Create a tightly packed table (storage buffer array).
    pub fn packed(label: &'static str, capacity: u32) -> Self {
        Self::with_stride(label, capacity, std::mem::size_of::<T>())
    }

    fn with_stride(label: &'static str, capacity: u32, stride: usize) -> Self {
        Self {
            label,
            bytes: vec![0; stride * capacity as usize],
            stride,
            capacity,
            len: 0,
            high_water_mark: 0,
            _marker: PhantomData,
        }
    }

    /// Append `value`, returning its index, or `None` if the table is full.
    pub fn write(&mut self, value: &T) -> Option<u32> {
        if self.len >= self.capacity {
            log::trace!(
                "BufferWriter {}: full at {} elements, dropping write",
                self.label,
                self.capacity
            );
            return None;
        }

        let index = self.len;
        let start = index as usize * self.stride;
        let size = std::mem::size_of::<T>();
        self.bytes[start..start + size].copy_from_slice(bytemuck::bytes_of(value));

        self.len += 1;
        self.high_water_mark = self.high_water_mark.max(self.len);
        Some(index)
    }

    /// Read back the element at `index` through its padded offset.
    pub fn read(&self, index: u32) -> Option<T> {
        if index >= self.len {
            return None;
        }
        let start = self.offset_of(index) as usize;
        let size = std::mem::size_of::<T>();
        Some(bytemuck::pod_read_unaligned(&self.bytes[start..start + size]))
    }

    /// Byte offset of element `index`.
    #[inline]
    pub fn offset_of(&self, index: u32) -> u64 {
        self.stride as u64 * index as u64
    }

    /// Distance in bytes between consecutive elements.
    pub fn stride(&self) -> u64 {
        self.stride as u64
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    /// Number of writes that can still succeed.
    pub fn remaining(&self) -> u32 {
        self.capacity - self.len
    }

    /// Largest length reached since construction.
    pub fn high_water_mark(&self) -> u32 {
        self.high_water_mark
    }

    /// Size of the GPU buffer needed to hold a full table.
    pub fn byte_capacity(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// The written prefix of the table, ready for upload.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize * self.stride]
    }

    /// Forget all elements. Capacity and stride are kept.
    pub fn reset(&mut self) {
        self.len = 0;
    }
}
