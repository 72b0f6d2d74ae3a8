//! Ring-allocated uniform staging.
//!
//! Per-draw uniform data from every material on a device lands in one large
//! host-visible buffer. [`RingBuffer`] is the allocation arithmetic: a write
//! cursor that advances linearly in aligned steps and wraps back to zero
//! when a request does not fit at the end. [`UniformRing`] pairs that cursor
//! with the actual GPU buffer.
//!
//! Wrapping does not wait for the GPU. The capacity is sized so that many
//! frames of uniform data fit before the cursor comes back around; callers
//! that keep more frames in flight than that must size the ring up.

use std::sync::Arc;

use parking_lot::Mutex;
use static_assertions::assert_impl_all;

use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::resources::Buffer;
use crate::types::{BufferDescriptor, BufferUsage};

/// Capacity of the shared uniform ring: 32 MiB.
pub const UNIFORM_RING_SIZE: u64 = 32 * 1024 * 1024;

/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[inline]
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Linear ring allocator over a byte arena.
///
/// Pure arithmetic; owns no memory. Offsets handed out are always multiples
/// of the alignment, and a request that cannot fit between the cursor and
/// the end of the arena wraps to offset zero.
#[derive(Debug)]
pub struct RingBuffer {
    capacity: u64,
    alignment: u64,
    offset: u64,
    wrap_count: u64,
}

impl RingBuffer {
    /// Create a ring over `capacity` bytes with the given offset alignment.
    ///
    /// `alignment` must be a power of two (uniform offset alignments
    /// reported by GPUs always are).
    pub fn new(capacity: u64, alignment: u64) -> Self {
        assert!(alignment.is_power_of_two());
        Self {
            capacity,
            alignment,
            offset: 0,
            wrap_count: 0,
        }
    }

    /// Allocate `size` bytes, returning the offset of the allocation.
    ///
    /// The cursor advances by `size` rounded up to the alignment. Returns
    /// [`GraphicsError::RingCapacityExceeded`] only when a single aligned
    /// request is larger than the whole arena.
    pub fn allocate(&mut self, size: u64) -> Result<u64, GraphicsError> {
        let aligned = align_up(size, self.alignment);
        if aligned > self.capacity {
            return Err(GraphicsError::RingCapacityExceeded {
                requested: aligned,
                capacity: self.capacity,
            });
        }
        let mut offset = self.offset;
        if offset + aligned > self.capacity {
            offset = 0;
            self.wrap_count += 1;
            log::trace!(
                "Uniform ring wrapped (wrap #{}, capacity {} bytes)",
                self.wrap_count,
                self.capacity
            );
        }
        self.offset = offset + aligned;
        Ok(offset)
    }

    /// Whether `size` bytes fit without wrapping.
    pub fn can_allocate(&self, size: u64) -> bool {
        align_up(size, self.alignment) <= self.capacity - self.offset
    }

    /// Bytes consumed since the start of the arena (or the last wrap).
    pub fn used(&self) -> u64 {
        self.offset
    }

    /// Bytes left before the next wrap.
    pub fn remaining(&self) -> u64 {
        self.capacity - self.offset
    }

    /// Arena capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Offset alignment in bytes.
    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// How many times the cursor has wrapped to zero.
    pub fn wrap_count(&self) -> u64 {
        self.wrap_count
    }

    /// Move the cursor back to zero without counting a wrap.
    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

/// The shared per-device uniform staging buffer.
///
/// One `UniformRing` serves every material on a device. Materials hold an
/// `Arc` to it; the device only keeps a `Weak`, so the buffer is released
/// when the last material drops and re-created on the next material.
pub struct UniformRing {
    buffer: Arc<Buffer>,
    state: Mutex<RingBuffer>,
}

assert_impl_all!(UniformRing: Send, Sync);

impl UniformRing {
    pub(crate) fn new(device: &Arc<GraphicsDevice>) -> Result<Self, GraphicsError> {
        let alignment = device.capabilities().min_uniform_buffer_offset_alignment;
        let descriptor = BufferDescriptor::new(
            UNIFORM_RING_SIZE,
            BufferUsage::UNIFORM | BufferUsage::HOST_VISIBLE,
        )
        .with_label("shared-uniform-ring");
        let buffer = device.create_buffer(descriptor)?;
        log::debug!(
            "Created shared uniform ring: {} bytes, {} byte alignment",
            UNIFORM_RING_SIZE,
            alignment
        );
        Ok(Self {
            buffer,
            state: Mutex::new(RingBuffer::new(UNIFORM_RING_SIZE, alignment)),
        })
    }

    /// Stage `data` into the ring, returning the byte offset it landed at.
    ///
    /// The offset is a valid dynamic uniform offset: aligned to the device's
    /// minimum uniform buffer offset alignment.
    pub fn write(&self, data: &[u8]) -> Result<u64, GraphicsError> {
        let offset = self.state.lock().allocate(data.len() as u64)?;
        self.buffer.write(offset, data)?;
        Ok(offset)
    }

    /// The GPU buffer backing the ring.
    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    /// Ring capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.state.lock().capacity()
    }

    /// Offset alignment in bytes.
    pub fn alignment(&self) -> u64 {
        self.state.lock().alignment()
    }

    /// How many times the write cursor has wrapped.
    pub fn wrap_count(&self) -> u64 {
        self.state.lock().wrap_count()
    }

    /// Bytes consumed since the last wrap.
    pub fn used(&self) -> u64 {
        self.state.lock().used()
    }
}

impl Drop for UniformRing {
    fn drop(&mut self) {
        log::debug!("Destroying shared uniform ring");
    }
}

impl std::fmt::Debug for UniformRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("UniformRing")
            .field("capacity", &state.capacity())
            .field("used", &state.used())
            .field("wrap_count", &state.wrap_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::GraphicsInstance;

    fn test_device() -> Arc<GraphicsDevice> {
        let instance = GraphicsInstance::new().unwrap();
        instance.create_device().unwrap()
    }

    #[rstest::rstest]
    #[case(0, 256, 0)]
    #[case(1, 256, 256)]
    #[case(256, 256, 256)]
    #[case(257, 256, 512)]
    #[case(64, 64, 64)]
    #[case(65, 64, 128)]
    fn align_up_rounds_to_multiples(
        #[case] value: u64,
        #[case] alignment: u64,
        #[case] expected: u64,
    ) {
        assert_eq!(align_up(value, alignment), expected);
    }

    #[test]
    fn offsets_are_aligned_and_monotonic() {
        let mut ring = RingBuffer::new(4096, 256);
        assert_eq!(ring.allocate(64).unwrap(), 0);
        assert_eq!(ring.allocate(64).unwrap(), 256);
        assert_eq!(ring.allocate(300).unwrap(), 512);
        assert_eq!(ring.allocate(64).unwrap(), 1024);
        assert_eq!(ring.wrap_count(), 0);
    }

    #[test]
    fn wraps_to_zero_when_full() {
        let mut ring = RingBuffer::new(1024, 256);
        for _ in 0..4 {
            ring.allocate(256).unwrap();
        }
        assert_eq!(ring.remaining(), 0);
        assert_eq!(ring.allocate(64).unwrap(), 0);
        assert_eq!(ring.wrap_count(), 1);
    }

    #[test]
    fn wrap_discards_tail_slack() {
        let mut ring = RingBuffer::new(1024, 256);
        ring.allocate(768).unwrap();
        // 256 bytes remain but a 512 byte request must start at zero.
        assert_eq!(ring.allocate(512).unwrap(), 0);
        assert_eq!(ring.wrap_count(), 1);
        assert_eq!(ring.used(), 512);
    }

    #[test]
    fn oversized_request_fails() {
        let mut ring = RingBuffer::new(1024, 256);
        let err = ring.allocate(2048).unwrap_err();
        assert!(matches!(
            err,
            GraphicsError::RingCapacityExceeded {
                requested: 2048,
                capacity: 1024,
            }
        ));
        // The cursor is untouched by a failed request.
        assert_eq!(ring.used(), 0);
    }

    #[test]
    fn aligned_size_can_exceed_capacity() {
        let mut ring = RingBuffer::new(256, 256);
        assert!(ring.allocate(257).is_err());
        assert_eq!(ring.allocate(256).unwrap(), 0);
    }

    #[test]
    fn reset_rewinds_without_counting_a_wrap() {
        let mut ring = RingBuffer::new(1024, 256);
        ring.allocate(512).unwrap();
        ring.reset();
        assert_eq!(ring.used(), 0);
        assert_eq!(ring.wrap_count(), 0);
    }

    #[test]
    fn ring_write_round_trip() {
        let device = test_device();
        let ring = device.uniform_ring().unwrap();
        let a = ring.write(&[1u8; 64]).unwrap();
        let b = ring.write(&[2u8; 64]).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, ring.alignment());
        assert_eq!(ring.buffer().read(a, 64), vec![1u8; 64]);
        assert_eq!(ring.buffer().read(b, 64), vec![2u8; 64]);
    }

    #[test]
    fn ring_is_shared_and_released_with_last_user() {
        let device = test_device();
        assert!(!device.has_live_uniform_ring());
        let first = device.uniform_ring().unwrap();
        let second = device.uniform_ring().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        drop(first);
        assert!(device.has_live_uniform_ring());
        drop(second);
        assert!(!device.has_live_uniform_ring());
        // The next request re-creates the ring from scratch.
        let third = device.uniform_ring().unwrap();
        assert_eq!(third.used(), 0);
    }
}
