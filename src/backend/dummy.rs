//! Dummy backend for testing without GPU hardware.
//!
//! Buffers get real host storage, descriptor sets record every write, and
//! command encoders keep the commands they were given, so tests can assert
//! on the exact bytes and offsets the material layer produced.

use parking_lot::Mutex;

use crate::backend::{
    DescriptorWrite, GpuBackend, GpuBuffer, GpuCommandEncoder, GpuDescriptorSet, GpuPipeline,
    GpuPipelineCache, GpuPipelineLayout, GpuRenderPass, GpuSampler, GpuTexture, RecordedWrite,
};
use crate::device::DeviceCapabilities;
use crate::error::GraphicsError;
use crate::pipeline::{PipelineDescriptor, RenderPassDescriptor};
use crate::shader::DescriptorSetLayoutInfo;
use crate::types::{BufferDescriptor, SamplerDescriptor, TextureDescriptor};

/// Uniform offset alignment reported by the dummy backend. Matches the most
/// common desktop `minUniformBufferOffsetAlignment`.
pub const DUMMY_UNIFORM_ALIGNMENT: u64 = 256;

/// Dummy backend implementation.
#[derive(Debug, Default)]
pub struct DummyBackend;

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities {
            max_texture_dimension: 16384,
            max_buffer_size: 1 << 30,
            min_uniform_buffer_offset_alignment: DUMMY_UNIFORM_ALIGNMENT,
            compute_shaders: true,
        }
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size must be non-zero".to_string(),
            ));
        }
        Ok(GpuBuffer::Dummy {
            size: descriptor.size,
            storage: Mutex::new(vec![0u8; descriptor.size as usize]),
        })
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<GpuTexture, GraphicsError> {
        if descriptor.extent.width == 0 || descriptor.extent.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "texture extent must be non-zero".to_string(),
            ));
        }
        Ok(GpuTexture::Dummy)
    }

    fn create_sampler(&self, _descriptor: &SamplerDescriptor) -> Result<GpuSampler, GraphicsError> {
        Ok(GpuSampler::Dummy)
    }

    fn create_pipeline_layout(
        &self,
        _set_layouts: &[DescriptorSetLayoutInfo],
    ) -> Result<GpuPipelineLayout, GraphicsError> {
        Ok(GpuPipelineLayout::Dummy)
    }

    fn allocate_descriptor_set(
        &self,
        _layout: &GpuPipelineLayout,
    ) -> Result<GpuDescriptorSet, GraphicsError> {
        Ok(GpuDescriptorSet::Dummy {
            writes: Mutex::new(Vec::new()),
        })
    }

    fn update_descriptor_set(
        &self,
        set: &GpuDescriptorSet,
        write: DescriptorWrite<'_>,
    ) -> Result<(), GraphicsError> {
        let writes = match set {
            GpuDescriptorSet::Dummy { writes } => writes,
            #[cfg(feature = "vulkan-backend")]
            _ => {
                return Err(GraphicsError::InvalidParameter(
                    "descriptor set belongs to a different backend".to_string(),
                ))
            }
        };
        let recorded = match write {
            DescriptorWrite::UniformBuffer {
                set,
                binding,
                buffer,
                offset,
                range,
            } => {
                if offset + range > buffer.size() {
                    return Err(GraphicsError::InvalidParameter(format!(
                        "uniform range {}..{} exceeds buffer size {}",
                        offset,
                        offset + range,
                        buffer.size()
                    )));
                }
                RecordedWrite::UniformBuffer {
                    set,
                    binding,
                    offset,
                    range,
                }
            }
            DescriptorWrite::Image { set, binding, .. } => RecordedWrite::Image { set, binding },
            DescriptorWrite::InputAttachment { set, binding, .. } => {
                RecordedWrite::InputAttachment { set, binding }
            }
        };
        writes.lock().push(recorded);
        Ok(())
    }

    fn create_render_pass(
        &self,
        _descriptor: &RenderPassDescriptor,
    ) -> Result<GpuRenderPass, GraphicsError> {
        Ok(GpuRenderPass::Dummy)
    }

    fn create_pipeline_cache(&self) -> Result<GpuPipelineCache, GraphicsError> {
        Ok(GpuPipelineCache::Dummy)
    }

    fn create_pipeline(
        &self,
        _descriptor: &PipelineDescriptor,
    ) -> Result<GpuPipeline, GraphicsError> {
        Ok(GpuPipeline::Dummy)
    }

    fn create_command_encoder(&self) -> Result<GpuCommandEncoder, GraphicsError> {
        Ok(GpuCommandEncoder::Dummy {
            commands: Vec::new(),
        })
    }

    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let (size, storage) = match buffer {
            GpuBuffer::Dummy { size, storage } => (size, storage),
            #[cfg(feature = "vulkan-backend")]
            _ => {
                return Err(GraphicsError::InvalidParameter(
                    "buffer belongs to a different backend".to_string(),
                ))
            }
        };
        let end = offset + data.len() as u64;
        if end > *size {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                size
            )));
        }
        storage.lock()[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: &GpuBuffer, offset: u64, size: u64) -> Vec<u8> {
        match buffer {
            GpuBuffer::Dummy { storage, .. } => {
                let storage = storage.lock();
                let start = (offset as usize).min(storage.len());
                let end = ((offset + size) as usize).min(storage.len());
                storage[start..end].to_vec()
            }
            #[cfg(feature = "vulkan-backend")]
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_round_trip() {
        let backend = DummyBackend::new();
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(
                1024,
                crate::types::BufferUsage::UNIFORM,
            ))
            .unwrap();
        backend.write_buffer(&buffer, 256, &[1, 2, 3, 4]).unwrap();
        assert_eq!(backend.read_buffer(&buffer, 256, 4), vec![1, 2, 3, 4]);
        assert_eq!(backend.read_buffer(&buffer, 0, 4), vec![0, 0, 0, 0]);
    }

    #[test]
    fn write_past_end_is_rejected() {
        let backend = DummyBackend::new();
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(
                16,
                crate::types::BufferUsage::UNIFORM,
            ))
            .unwrap();
        let result = backend.write_buffer(&buffer, 12, &[0u8; 8]);
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn zero_sized_buffer_is_rejected() {
        let backend = DummyBackend::new();
        let result =
            backend.create_buffer(&BufferDescriptor::new(0, crate::types::BufferUsage::UNIFORM));
        assert!(result.is_err());
    }

    #[test]
    fn descriptor_writes_are_recorded() {
        let backend = DummyBackend::new();
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(
                4096,
                crate::types::BufferUsage::UNIFORM,
            ))
            .unwrap();
        let set = backend
            .allocate_descriptor_set(&GpuPipelineLayout::Dummy)
            .unwrap();
        backend
            .update_descriptor_set(
                &set,
                DescriptorWrite::UniformBuffer {
                    set: 0,
                    binding: 0,
                    buffer: &buffer,
                    offset: 0,
                    range: 64,
                },
            )
            .unwrap();
        assert_eq!(set.write_count(), 1);
    }
}
