//! Texture resource.

use std::sync::Arc;

use static_assertions::assert_impl_all;

use crate::backend::GpuTexture;
use crate::device::GraphicsDevice;
use crate::types::{TextureDescriptor, TextureFormat, TextureUsage};

/// A GPU texture (image plus view).
pub struct Texture {
    device: Arc<GraphicsDevice>,
    descriptor: TextureDescriptor,
    gpu: GpuTexture,
}

assert_impl_all!(Texture: Send, Sync);

impl Texture {
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        descriptor: TextureDescriptor,
        gpu: GpuTexture,
    ) -> Self {
        Self {
            device,
            descriptor,
            gpu,
        }
    }

    /// The device this texture was created on.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// The descriptor this texture was created with.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Texture format.
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    /// Whether the texture was created for subpass input reads.
    pub fn is_input_attachment(&self) -> bool {
        self.descriptor
            .usage
            .contains(TextureUsage::INPUT_ATTACHMENT)
    }

    pub(crate) fn gpu(&self) -> &GpuTexture {
        &self.gpu
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
