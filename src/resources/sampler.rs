//! Sampler resource.

use std::sync::Arc;

use static_assertions::assert_impl_all;

use crate::backend::GpuSampler;
use crate::device::GraphicsDevice;
use crate::types::SamplerDescriptor;

/// A texture sampler.
pub struct Sampler {
    device: Arc<GraphicsDevice>,
    descriptor: SamplerDescriptor,
    gpu: GpuSampler,
}

assert_impl_all!(Sampler: Send, Sync);

impl Sampler {
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        descriptor: SamplerDescriptor,
        gpu: GpuSampler,
    ) -> Self {
        Self {
            device,
            descriptor,
            gpu,
        }
    }

    /// The device this sampler was created on.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// The descriptor this sampler was created with.
    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.descriptor
    }

    #[allow(dead_code)]
    pub(crate) fn gpu(&self) -> &GpuSampler {
        &self.gpu
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
