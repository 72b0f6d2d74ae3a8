//! Buffer resource.

use std::sync::Arc;

use static_assertions::assert_impl_all;

use crate::backend::GpuBuffer;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::types::BufferDescriptor;

/// A GPU buffer.
///
/// Created through [`GraphicsDevice::create_buffer`]; the backend resource
/// is released when the last `Arc<Buffer>` drops.
pub struct Buffer {
    device: Arc<GraphicsDevice>,
    descriptor: BufferDescriptor,
    gpu: GpuBuffer,
}

assert_impl_all!(Buffer: Send, Sync);

impl Buffer {
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        descriptor: BufferDescriptor,
        gpu: GpuBuffer,
    ) -> Self {
        Self {
            device,
            descriptor,
            gpu,
        }
    }

    /// The device this buffer was created on.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// The descriptor this buffer was created with.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Write `data` at `offset`.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        self.device.backend().write_buffer(&self.gpu, offset, data)
    }

    /// Read `size` bytes back from `offset`.
    pub fn read(&self, offset: u64, size: u64) -> Vec<u8> {
        self.device.backend().read_buffer(&self.gpu, offset, size)
    }

    pub(crate) fn gpu(&self) -> &GpuBuffer {
        &self.gpu
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
