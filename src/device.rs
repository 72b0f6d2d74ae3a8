//! Graphics device.
//!
//! The [`GraphicsDevice`] is the factory for every GPU resource in this
//! crate. It also owns the registry slot for the shared uniform ring:
//! materials on the same device stage their per-draw uniforms through one
//! ring buffer, and the device hands out `Arc`s to it on demand.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use static_assertions::assert_impl_all;

use crate::backend::GpuBackend;
use crate::command::CommandEncoder;
use crate::descriptors::DescriptorSet;
use crate::error::GraphicsError;
use crate::instance::GraphicsInstance;
use crate::materials::{Material, MaterialDescriptor};
use crate::pipeline::{
    Pipeline, PipelineCache, PipelineDescriptor, RenderPass, RenderPassDescriptor,
};
use crate::resources::{Buffer, Sampler, Texture, UniformRing};
use crate::shader::{self, Shader, ShaderDescriptor};
use crate::types::{BufferDescriptor, SamplerDescriptor, TextureDescriptor};

/// Capabilities and limits of a graphics device.
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    /// Maximum 1D/2D texture dimension.
    pub max_texture_dimension: u32,
    /// Maximum buffer size in bytes.
    pub max_buffer_size: u64,
    /// Minimum alignment for dynamic uniform buffer offsets. Ring offsets
    /// are always multiples of this.
    pub min_uniform_buffer_offset_alignment: u64,
    /// Whether compute shaders are supported.
    pub compute_shaders: bool,
}

/// A logical graphics device.
pub struct GraphicsDevice {
    instance: Arc<GraphicsInstance>,
    backend: Arc<dyn GpuBackend>,
    name: String,
    capabilities: DeviceCapabilities,
    // Weak so the ring (and its 32 MiB buffer) dies with its last material.
    uniform_ring: Mutex<Weak<UniformRing>>,
}

assert_impl_all!(GraphicsDevice: Send, Sync);

impl GraphicsDevice {
    pub(crate) fn new(instance: Arc<GraphicsInstance>, name: String) -> Arc<Self> {
        let backend = instance.backend().clone();
        let capabilities = backend.capabilities();
        log::info!(
            "Created graphics device \"{}\" on {} backend",
            name,
            backend.name()
        );
        Arc::new(Self {
            instance,
            backend,
            name,
            capabilities,
            uniform_ring: Mutex::new(Weak::new()),
        })
    }

    /// Get the parent instance.
    pub fn instance(&self) -> &Arc<GraphicsInstance> {
        &self.instance
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the device capabilities.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    pub(crate) fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Create a buffer.
    pub fn create_buffer(
        self: &Arc<Self>,
        descriptor: BufferDescriptor,
    ) -> Result<Arc<Buffer>, GraphicsError> {
        if descriptor.size > self.capabilities.max_buffer_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer size {} exceeds device limit {}",
                descriptor.size, self.capabilities.max_buffer_size
            )));
        }
        let gpu = self.backend.create_buffer(&descriptor)?;
        Ok(Arc::new(Buffer::new(self.clone(), descriptor, gpu)))
    }

    /// Create a texture.
    pub fn create_texture(
        self: &Arc<Self>,
        descriptor: TextureDescriptor,
    ) -> Result<Arc<Texture>, GraphicsError> {
        let gpu = self.backend.create_texture(&descriptor)?;
        Ok(Arc::new(Texture::new(self.clone(), descriptor, gpu)))
    }

    /// Create a sampler.
    pub fn create_sampler(
        self: &Arc<Self>,
        descriptor: SamplerDescriptor,
    ) -> Result<Arc<Sampler>, GraphicsError> {
        let gpu = self.backend.create_sampler(&descriptor)?;
        Ok(Arc::new(Sampler::new(self.clone(), descriptor, gpu)))
    }

    /// Create a shader from reflection metadata.
    ///
    /// Validates the declared parameters and derives the descriptor-set
    /// layouts and pipeline layout.
    pub fn create_shader(
        self: &Arc<Self>,
        descriptor: ShaderDescriptor,
    ) -> Result<Arc<Shader>, GraphicsError> {
        let set_layouts = shader::derive_set_layouts(&descriptor)?;
        let pipeline_layout = self.backend.create_pipeline_layout(&set_layouts)?;
        Ok(Arc::new(Shader::new(
            self.clone(),
            descriptor,
            set_layouts,
            pipeline_layout,
        )))
    }

    /// Create a render pass.
    pub fn create_render_pass(
        self: &Arc<Self>,
        descriptor: RenderPassDescriptor,
    ) -> Result<Arc<RenderPass>, GraphicsError> {
        let gpu = self.backend.create_render_pass(&descriptor)?;
        Ok(Arc::new(RenderPass::new(self.clone(), descriptor, gpu)))
    }

    /// Create a pipeline cache.
    pub fn create_pipeline_cache(self: &Arc<Self>) -> Result<Arc<PipelineCache>, GraphicsError> {
        let gpu = self.backend.create_pipeline_cache()?;
        Ok(Arc::new(PipelineCache::new(self.clone(), gpu)))
    }

    /// Build a pipeline.
    pub fn create_pipeline(
        self: &Arc<Self>,
        descriptor: PipelineDescriptor,
    ) -> Result<Arc<Pipeline>, GraphicsError> {
        let gpu = self.backend.create_pipeline(&descriptor)?;
        Ok(Arc::new(Pipeline::new(
            self.clone(),
            descriptor.label,
            descriptor.vertex_input,
            gpu,
        )))
    }

    /// Create a command encoder.
    pub fn create_command_encoder(self: &Arc<Self>) -> Result<CommandEncoder, GraphicsError> {
        let gpu = self.backend.create_command_encoder()?;
        Ok(CommandEncoder::new(self.clone(), gpu))
    }

    /// Allocate descriptor sets for a shader's layout.
    pub fn create_descriptor_set(
        self: &Arc<Self>,
        shader: Arc<Shader>,
    ) -> Result<DescriptorSet, GraphicsError> {
        DescriptorSet::new(self.clone(), shader)
    }

    /// Create a material.
    pub fn create_material(
        self: &Arc<Self>,
        descriptor: MaterialDescriptor,
    ) -> Result<Material, GraphicsError> {
        Material::new(self.clone(), descriptor)
    }

    /// Get the shared uniform ring, creating it if no material holds one.
    pub fn uniform_ring(self: &Arc<Self>) -> Result<Arc<UniformRing>, GraphicsError> {
        let mut slot = self.uniform_ring.lock();
        if let Some(ring) = slot.upgrade() {
            return Ok(ring);
        }
        let ring = Arc::new(UniformRing::new(self)?);
        *slot = Arc::downgrade(&ring);
        Ok(ring)
    }

    /// Whether any material currently holds the shared uniform ring.
    pub fn has_live_uniform_ring(&self) -> bool {
        self.uniform_ring.lock().strong_count() > 0
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("name", &self.name)
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BufferUsage;

    fn test_device() -> Arc<GraphicsDevice> {
        let instance = GraphicsInstance::new().unwrap();
        instance.create_device().unwrap()
    }

    #[test]
    fn test_device_creation() {
        let device = test_device();
        assert_eq!(device.instance().backend().name(), "dummy");
        assert!(device
            .capabilities()
            .min_uniform_buffer_offset_alignment
            .is_power_of_two());
    }

    #[test]
    fn test_buffer_size_limit() {
        let device = test_device();
        let limit = device.capabilities().max_buffer_size;
        let result = device.create_buffer(BufferDescriptor::new(limit + 1, BufferUsage::UNIFORM));
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_uniform_ring_is_per_device() {
        let instance = GraphicsInstance::new().unwrap();
        let a = instance.create_device().unwrap();
        let b = instance.create_device().unwrap();
        let ring_a = a.uniform_ring().unwrap();
        let ring_b = b.uniform_ring().unwrap();
        assert!(!Arc::ptr_eq(&ring_a, &ring_b));
    }
}
