//! GPU backend abstraction layer.
//!
//! The material layer never touches a GPU API directly; everything goes
//! through the [`GpuBackend`] trait and the `Gpu*` handle enums.
//!
//! # Available Backends
//!
//! - `dummy` (always compiled): host-side backend with real byte storage so
//!   the whole uniform-staging path is observable in tests without a GPU
//! - `vulkan-backend` feature: ash-based plumbing over an externally created
//!   Vulkan device

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

pub mod dummy;

use std::sync::Arc;

#[cfg(feature = "vulkan-backend")]
use ash::vk;
#[cfg(feature = "vulkan-backend")]
use gpu_allocator::vulkan::Allocation;
use parking_lot::Mutex;

use crate::command::RecordedCommand;
use crate::device::DeviceCapabilities;
use crate::error::GraphicsError;
use crate::pipeline::{PipelineDescriptor, RenderPassDescriptor};
use crate::shader::DescriptorSetLayoutInfo;
use crate::types::{BufferDescriptor, SamplerDescriptor, TextureDescriptor};

/// Handle to a GPU buffer resource.
pub enum GpuBuffer {
    /// Dummy backend: host byte storage standing in for mapped GPU memory.
    Dummy {
        /// Buffer size in bytes.
        size: u64,
        /// Backing storage, written through [`GpuBackend::write_buffer`].
        storage: Mutex<Vec<u8>>,
    },
    /// Vulkan backend buffer, persistently mapped when host visible.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        buffer: vk::Buffer,
        allocation: Mutex<Option<Allocation>>,
        size: u64,
    },
}

impl GpuBuffer {
    /// Buffer size in bytes.
    pub fn size(&self) -> u64 {
        match self {
            Self::Dummy { size, .. } => *size,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { size, .. } => *size,
        }
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { size, .. } => f
                .debug_struct("GpuBuffer::Dummy")
                .field("size", size)
                .finish_non_exhaustive(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { buffer, size, .. } => f
                .debug_struct("GpuBuffer::Vulkan")
                .field("buffer", buffer)
                .field("size", size)
                .finish_non_exhaustive(),
        }
    }
}

/// Handle to a GPU texture resource.
pub enum GpuTexture {
    /// Dummy backend (no storage; descriptor writes only record identity).
    Dummy,
    /// Vulkan backend texture.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        image: vk::Image,
        view: vk::ImageView,
        allocation: Mutex<Option<Allocation>>,
        format: vk::Format,
        extent: vk::Extent3D,
    },
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "GpuTexture::Dummy"),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan {
                image,
                view,
                format,
                ..
            } => f
                .debug_struct("GpuTexture::Vulkan")
                .field("image", image)
                .field("view", view)
                .field("format", format)
                .finish_non_exhaustive(),
        }
    }
}

/// Handle to a GPU sampler resource.
pub enum GpuSampler {
    /// Dummy backend.
    Dummy,
    /// Vulkan backend sampler.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        sampler: vk::Sampler,
    },
}

impl std::fmt::Debug for GpuSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "GpuSampler::Dummy"),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { sampler, .. } => f
                .debug_struct("GpuSampler::Vulkan")
                .field("sampler", sampler)
                .finish_non_exhaustive(),
        }
    }
}

/// Handle to a pipeline layout (and its per-set descriptor layouts).
pub enum GpuPipelineLayout {
    /// Dummy backend.
    Dummy,
    /// Vulkan backend pipeline layout.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        layout: vk::PipelineLayout,
        set_layouts: Vec<vk::DescriptorSetLayout>,
    },
}

impl std::fmt::Debug for GpuPipelineLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "GpuPipelineLayout::Dummy"),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { layout, .. } => f
                .debug_struct("GpuPipelineLayout::Vulkan")
                .field("layout", layout)
                .finish_non_exhaustive(),
        }
    }
}

/// A descriptor write recorded by the dummy backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedWrite {
    /// Dynamic uniform-buffer descriptor write.
    UniformBuffer {
        /// Descriptor set index.
        set: u32,
        /// Binding index.
        binding: u32,
        /// Static offset recorded in the descriptor (always 0 for the ring).
        offset: u64,
        /// Bound range in bytes.
        range: u64,
    },
    /// Combined image-sampler write.
    Image {
        /// Descriptor set index.
        set: u32,
        /// Binding index.
        binding: u32,
    },
    /// Input-attachment write.
    InputAttachment {
        /// Descriptor set index.
        set: u32,
        /// Binding index.
        binding: u32,
    },
}

/// Handle to an allocated group of descriptor sets (one per set index).
pub enum GpuDescriptorSet {
    /// Dummy backend: every write is recorded for inspection.
    Dummy {
        /// Writes issued against this set, in order.
        writes: Mutex<Vec<RecordedWrite>>,
    },
    /// Vulkan backend descriptor sets.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        pool: vk::DescriptorPool,
        sets: Vec<vk::DescriptorSet>,
        writes: std::sync::atomic::AtomicUsize,
    },
}

impl GpuDescriptorSet {
    /// Number of descriptor writes issued against this set.
    pub fn write_count(&self) -> usize {
        match self {
            Self::Dummy { writes } => writes.lock().len(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { writes, .. } => writes.load(std::sync::atomic::Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for GpuDescriptorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { writes } => f
                .debug_struct("GpuDescriptorSet::Dummy")
                .field("writes", &writes.lock().len())
                .finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { sets, .. } => f
                .debug_struct("GpuDescriptorSet::Vulkan")
                .field("sets", &sets.len())
                .finish_non_exhaustive(),
        }
    }
}

/// Handle to a compiled pipeline.
pub enum GpuPipeline {
    /// Dummy backend.
    Dummy,
    /// Vulkan backend pipeline.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        pipeline: vk::Pipeline,
    },
}

impl std::fmt::Debug for GpuPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "GpuPipeline::Dummy"),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { pipeline, .. } => f
                .debug_struct("GpuPipeline::Vulkan")
                .field("pipeline", pipeline)
                .finish_non_exhaustive(),
        }
    }
}

/// Handle to a render pass.
pub enum GpuRenderPass {
    /// Dummy backend.
    Dummy,
    /// Vulkan backend render pass.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        render_pass: vk::RenderPass,
    },
}

impl std::fmt::Debug for GpuRenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "GpuRenderPass::Dummy"),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { render_pass, .. } => f
                .debug_struct("GpuRenderPass::Vulkan")
                .field("render_pass", render_pass)
                .finish_non_exhaustive(),
        }
    }
}

/// Handle to a pipeline cache.
pub enum GpuPipelineCache {
    /// Dummy backend.
    Dummy,
    /// Vulkan backend pipeline cache.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        cache: vk::PipelineCache,
    },
}

impl std::fmt::Debug for GpuPipelineCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "GpuPipelineCache::Dummy"),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { cache, .. } => f
                .debug_struct("GpuPipelineCache::Vulkan")
                .field("cache", cache)
                .finish_non_exhaustive(),
        }
    }
}

/// Handle to a command recording context.
pub enum GpuCommandEncoder {
    /// Dummy backend: commands are recorded for inspection.
    Dummy {
        /// Recorded commands, in submission order.
        commands: Vec<RecordedCommand>,
    },
    /// Vulkan backend: an externally begun command buffer.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        device: ash::Device,
        cmd: vk::CommandBuffer,
    },
}

impl std::fmt::Debug for GpuCommandEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { commands } => f
                .debug_struct("GpuCommandEncoder::Dummy")
                .field("commands", &commands.len())
                .finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { cmd, .. } => f
                .debug_struct("GpuCommandEncoder::Vulkan")
                .field("cmd", cmd)
                .finish_non_exhaustive(),
        }
    }
}

// ============================================================================
// Vulkan Resource Cleanup (Drop implementations)
// ============================================================================

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuBuffer {
    fn drop(&mut self) {
        if let GpuBuffer::Vulkan {
            device,
            buffer,
            allocation,
            ..
        } = self
        {
            // The allocation itself returns to the backend's allocator.
            let _ = allocation.lock().take();
            unsafe {
                device.destroy_buffer(*buffer, None);
            }
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuTexture {
    fn drop(&mut self) {
        if let GpuTexture::Vulkan {
            device,
            image,
            view,
            allocation,
            ..
        } = self
        {
            let _ = allocation.lock().take();
            unsafe {
                device.destroy_image_view(*view, None);
                device.destroy_image(*image, None);
            }
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuSampler {
    fn drop(&mut self) {
        if let GpuSampler::Vulkan { device, sampler } = self {
            unsafe {
                device.destroy_sampler(*sampler, None);
            }
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuPipelineLayout {
    fn drop(&mut self) {
        if let GpuPipelineLayout::Vulkan {
            device,
            layout,
            set_layouts,
        } = self
        {
            unsafe {
                for set_layout in set_layouts.drain(..) {
                    device.destroy_descriptor_set_layout(set_layout, None);
                }
                device.destroy_pipeline_layout(*layout, None);
            }
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuDescriptorSet {
    fn drop(&mut self) {
        if let GpuDescriptorSet::Vulkan {
            device,
            pool,
            sets,
            ..
        } = self
        {
            unsafe {
                let _ = device.free_descriptor_sets(*pool, sets);
            }
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuPipeline {
    fn drop(&mut self) {
        if let GpuPipeline::Vulkan { device, pipeline } = self {
            unsafe {
                device.destroy_pipeline(*pipeline, None);
            }
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuRenderPass {
    fn drop(&mut self) {
        if let GpuRenderPass::Vulkan {
            device,
            render_pass,
        } = self
        {
            unsafe {
                device.destroy_render_pass(*render_pass, None);
            }
        }
    }
}

#[cfg(feature = "vulkan-backend")]
impl Drop for GpuPipelineCache {
    fn drop(&mut self) {
        if let GpuPipelineCache::Vulkan { device, cache } = self {
            unsafe {
                device.destroy_pipeline_cache(*cache, None);
            }
        }
    }
}

/// A single descriptor write routed to the backend.
#[derive(Debug)]
pub enum DescriptorWrite<'a> {
    /// Bind a buffer region as a dynamic uniform buffer.
    UniformBuffer {
        /// Descriptor set index.
        set: u32,
        /// Binding index.
        binding: u32,
        /// The buffer to bind.
        buffer: &'a GpuBuffer,
        /// Static offset (the per-draw offset comes in at bind time).
        offset: u64,
        /// Bound range in bytes.
        range: u64,
    },
    /// Bind a texture as a combined image sampler.
    Image {
        /// Descriptor set index.
        set: u32,
        /// Binding index.
        binding: u32,
        /// The texture to bind.
        texture: &'a GpuTexture,
    },
    /// Bind a texture as a subpass input attachment.
    InputAttachment {
        /// Descriptor set index.
        set: u32,
        /// Binding index.
        binding: u32,
        /// The texture to bind.
        texture: &'a GpuTexture,
    },
}

/// GPU backend trait for abstracting different GPU APIs.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Device limits relevant to this crate (notably the minimum uniform
    /// buffer offset alignment).
    fn capabilities(&self) -> DeviceCapabilities;

    /// Create a buffer resource.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError>;

    /// Create a texture resource.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<GpuTexture, GraphicsError>;

    /// Create a sampler resource.
    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<GpuSampler, GraphicsError>;

    /// Create a pipeline layout from derived descriptor-set layouts.
    fn create_pipeline_layout(
        &self,
        set_layouts: &[DescriptorSetLayoutInfo],
    ) -> Result<GpuPipelineLayout, GraphicsError>;

    /// Allocate one descriptor set per set index of the given layout.
    fn allocate_descriptor_set(
        &self,
        layout: &GpuPipelineLayout,
    ) -> Result<GpuDescriptorSet, GraphicsError>;

    /// Issue a descriptor write.
    fn update_descriptor_set(
        &self,
        set: &GpuDescriptorSet,
        write: DescriptorWrite<'_>,
    ) -> Result<(), GraphicsError>;

    /// Create a render pass.
    fn create_render_pass(
        &self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<GpuRenderPass, GraphicsError>;

    /// Create a pipeline cache.
    fn create_pipeline_cache(&self) -> Result<GpuPipelineCache, GraphicsError>;

    /// Build a pipeline object.
    fn create_pipeline(
        &self,
        descriptor: &PipelineDescriptor,
    ) -> Result<GpuPipeline, GraphicsError>;

    /// Create a command recording context.
    ///
    /// Backends that record into externally owned command buffers reject
    /// this; their encoders are adopted instead.
    fn create_command_encoder(&self) -> Result<GpuCommandEncoder, GraphicsError>;

    /// Write data into a buffer's (conceptually mapped) memory.
    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError>;

    /// Read data back from a buffer's memory.
    fn read_buffer(&self, buffer: &GpuBuffer, offset: u64, size: u64) -> Vec<u8>;
}

/// Create the default backend.
///
/// Device and queue initialization for real GPU APIs is out of scope here,
/// so the default is always the dummy backend; a Vulkan-backed instance is
/// built explicitly from adopted handles.
pub fn create_backend() -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    log::info!("Using dummy backend");
    Ok(Arc::new(dummy::DummyBackend::new()))
}
