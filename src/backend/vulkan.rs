//! Vulkan backend via ash.
//!
//! Device and queue initialization live outside this crate: the backend is
//! constructed from an already-created `ash::Device` and records into
//! command buffers the caller has begun. Buffer memory comes from
//! gpu-allocator; host-visible allocations stay persistently mapped, which
//! is what makes ring writes a plain memcpy.

use std::ffi::CString;
use std::sync::atomic::Ordering;

use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;

use crate::backend::{
    DescriptorWrite, GpuBackend, GpuBuffer, GpuCommandEncoder, GpuDescriptorSet, GpuPipeline,
    GpuPipelineCache, GpuPipelineLayout, GpuRenderPass, GpuSampler, GpuTexture,
};
use crate::device::DeviceCapabilities;
use crate::error::GraphicsError;
use crate::pipeline::{PipelineDescriptor, RenderPassDescriptor, VertexAttributeFormat};
use crate::shader::{DescriptorType, DescriptorSetLayoutInfo, ShaderStage, ShaderStageFlags};
use crate::types::{
    AddressMode, BufferDescriptor, BufferUsage, FilterMode, SamplerDescriptor, TextureDescriptor,
    TextureFormat, TextureUsage,
};

const DESCRIPTOR_POOL_SIZE: u32 = 1024;

/// Vulkan backend over an adopted device.
pub struct VulkanBackend {
    device: ash::Device,
    allocator: Mutex<Allocator>,
    descriptor_pool: vk::DescriptorPool,
    // Fallback sampler for combined image-sampler writes.
    default_sampler: vk::Sampler,
    limits: vk::PhysicalDeviceLimits,
}

impl VulkanBackend {
    /// Create a backend from externally initialized Vulkan handles.
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
    ) -> Result<Self, GraphicsError> {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let limits = properties.limits;

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| GraphicsError::InitializationFailed(format!("allocator: {e}")))?;

        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                descriptor_count: DESCRIPTOR_POOL_SIZE,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: DESCRIPTOR_POOL_SIZE,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::INPUT_ATTACHMENT,
                descriptor_count: DESCRIPTOR_POOL_SIZE,
            },
        ];
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(DESCRIPTOR_POOL_SIZE)
            .pool_sizes(&pool_sizes);
        let descriptor_pool = unsafe { device.create_descriptor_pool(&pool_info, None) }
            .map_err(|e| GraphicsError::InitializationFailed(format!("descriptor pool: {e}")))?;

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT);
        let default_sampler = unsafe { device.create_sampler(&sampler_info, None) }
            .map_err(|e| GraphicsError::InitializationFailed(format!("default sampler: {e}")))?;

        log::info!("Created Vulkan backend over adopted device");
        Ok(Self {
            device,
            allocator: Mutex::new(allocator),
            descriptor_pool,
            default_sampler,
            limits,
        })
    }

    /// Wrap an externally begun command buffer as an encoder handle.
    pub fn adopt_command_buffer(&self, cmd: vk::CommandBuffer) -> GpuCommandEncoder {
        GpuCommandEncoder::Vulkan {
            device: self.device.clone(),
            cmd,
        }
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.default_sampler, None);
            self.device
                .destroy_descriptor_pool(self.descriptor_pool, None);
        }
    }
}

fn vk_buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::COPY_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::COPY_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    flags
}

fn vk_texture_usage(usage: TextureUsage, format: TextureFormat) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(TextureUsage::COPY_SRC) {
        flags |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsage::COPY_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(TextureUsage::TEXTURE_BINDING) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::RENDER_ATTACHMENT) {
        if format.is_depth_stencil() {
            flags |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
        } else {
            flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
        }
    }
    if usage.contains(TextureUsage::INPUT_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::INPUT_ATTACHMENT;
    }
    flags
}

fn vk_format(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8Unorm => vk::Format::R8_UNORM,
        TextureFormat::Rg8Unorm => vk::Format::R8G8_UNORM,
        TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Rgba8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::Bgra8UnormSrgb => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::Depth24PlusStencil8 => vk::Format::D24_UNORM_S8_UINT,
        TextureFormat::Depth32Float => vk::Format::D32_SFLOAT,
    }
}

fn vk_vertex_format(format: VertexAttributeFormat) -> vk::Format {
    match format {
        VertexAttributeFormat::Float => vk::Format::R32_SFLOAT,
        VertexAttributeFormat::Float2 => vk::Format::R32G32_SFLOAT,
        VertexAttributeFormat::Float3 => vk::Format::R32G32B32_SFLOAT,
        VertexAttributeFormat::Float4 => vk::Format::R32G32B32A32_SFLOAT,
        VertexAttributeFormat::Uint4 => vk::Format::R32G32B32A32_UINT,
        VertexAttributeFormat::Unorm8x4 => vk::Format::R8G8B8A8_UNORM,
    }
}

fn vk_descriptor_type(ty: DescriptorType) -> vk::DescriptorType {
    match ty {
        DescriptorType::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        DescriptorType::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        DescriptorType::InputAttachment => vk::DescriptorType::INPUT_ATTACHMENT,
    }
}

fn vk_stage_flags(stages: ShaderStageFlags) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStageFlags::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStageFlags::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stages.contains(ShaderStageFlags::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

fn vk_filter(filter: FilterMode) -> vk::Filter {
    match filter {
        FilterMode::Nearest => vk::Filter::NEAREST,
        FilterMode::Linear => vk::Filter::LINEAR,
    }
}

fn vk_address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        AddressMode::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
    }
}

fn creation_err(what: &str, e: impl std::fmt::Display) -> GraphicsError {
    GraphicsError::ResourceCreationFailed(format!("{what}: {e}"))
}

impl GpuBackend for VulkanBackend {
    fn name(&self) -> &'static str {
        "vulkan"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities {
            max_texture_dimension: self.limits.max_image_dimension2_d,
            max_buffer_size: self.limits.max_storage_buffer_range as u64,
            min_uniform_buffer_offset_alignment: self.limits.min_uniform_buffer_offset_alignment,
            compute_shaders: true,
        }
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        let info = vk::BufferCreateInfo::default()
            .size(descriptor.size)
            .usage(vk_buffer_usage(descriptor.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&info, None) }
            .map_err(|e| creation_err("buffer", e))?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let location = if descriptor.usage.contains(BufferUsage::HOST_VISIBLE) {
            MemoryLocation::CpuToGpu
        } else {
            MemoryLocation::GpuOnly
        };
        let allocation = self
            .allocator
            .lock()
            .allocate(&AllocationCreateDesc {
                name: descriptor.label.as_deref().unwrap_or("buffer"),
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                unsafe { self.device.destroy_buffer(buffer, None) };
                creation_err("buffer memory", e)
            })?;
        unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        }
        .map_err(|e| creation_err("bind buffer memory", e))?;

        Ok(GpuBuffer::Vulkan {
            device: self.device.clone(),
            buffer,
            allocation: Mutex::new(Some(allocation)),
            size: descriptor.size,
        })
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<GpuTexture, GraphicsError> {
        let format = vk_format(descriptor.format);
        let extent = vk::Extent3D {
            width: descriptor.extent.width,
            height: descriptor.extent.height,
            depth: descriptor.extent.depth,
        };
        let info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(extent)
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk_texture_usage(descriptor.usage, descriptor.format))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { self.device.create_image(&info, None) }
            .map_err(|e| creation_err("image", e))?;

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let allocation = self
            .allocator
            .lock()
            .allocate(&AllocationCreateDesc {
                name: descriptor.label.as_deref().unwrap_or("texture"),
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                unsafe { self.device.destroy_image(image, None) };
                creation_err("image memory", e)
            })?;
        unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        }
        .map_err(|e| creation_err("bind image memory", e))?;

        let aspect = if descriptor.format.is_depth_stencil() {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect)
                    .level_count(1)
                    .layer_count(1),
            );
        let view = unsafe { self.device.create_image_view(&view_info, None) }
            .map_err(|e| creation_err("image view", e))?;

        Ok(GpuTexture::Vulkan {
            device: self.device.clone(),
            image,
            view,
            allocation: Mutex::new(Some(allocation)),
            format,
            extent,
        })
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<GpuSampler, GraphicsError> {
        let info = vk::SamplerCreateInfo::default()
            .mag_filter(vk_filter(descriptor.mag_filter))
            .min_filter(vk_filter(descriptor.min_filter))
            .mipmap_mode(match descriptor.mipmap_filter {
                FilterMode::Nearest => vk::SamplerMipmapMode::NEAREST,
                FilterMode::Linear => vk::SamplerMipmapMode::LINEAR,
            })
            .address_mode_u(vk_address_mode(descriptor.address_mode_u))
            .address_mode_v(vk_address_mode(descriptor.address_mode_v))
            .address_mode_w(vk_address_mode(descriptor.address_mode_w));
        let sampler = unsafe { self.device.create_sampler(&info, None) }
            .map_err(|e| creation_err("sampler", e))?;
        Ok(GpuSampler::Vulkan {
            device: self.device.clone(),
            sampler,
        })
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[DescriptorSetLayoutInfo],
    ) -> Result<GpuPipelineLayout, GraphicsError> {
        // Set indices can be sparse; Vulkan wants one layout per index up to
        // the highest used set, so gaps become empty layouts.
        let set_count = set_layouts.last().map(|l| l.set + 1).unwrap_or(0);
        let mut vk_layouts = Vec::with_capacity(set_count as usize);
        for set in 0..set_count {
            let bindings: Vec<vk::DescriptorSetLayoutBinding> = set_layouts
                .iter()
                .find(|l| l.set == set)
                .map(|layout| {
                    layout
                        .bindings
                        .iter()
                        .map(|b| {
                            vk::DescriptorSetLayoutBinding::default()
                                .binding(b.binding)
                                .descriptor_type(vk_descriptor_type(b.descriptor_type))
                                .descriptor_count(1)
                                .stage_flags(vk_stage_flags(b.stages))
                        })
                        .collect()
                })
                .unwrap_or_default();
            let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
            let layout = unsafe { self.device.create_descriptor_set_layout(&info, None) }
                .map_err(|e| creation_err("descriptor set layout", e))?;
            vk_layouts.push(layout);
        }

        let info = vk::PipelineLayoutCreateInfo::default().set_layouts(&vk_layouts);
        let layout = unsafe { self.device.create_pipeline_layout(&info, None) }
            .map_err(|e| creation_err("pipeline layout", e))?;

        Ok(GpuPipelineLayout::Vulkan {
            device: self.device.clone(),
            layout,
            set_layouts: vk_layouts,
        })
    }

    fn allocate_descriptor_set(
        &self,
        layout: &GpuPipelineLayout,
    ) -> Result<GpuDescriptorSet, GraphicsError> {
        let GpuPipelineLayout::Vulkan { set_layouts, .. } = layout else {
            return Err(GraphicsError::InvalidParameter(
                "pipeline layout belongs to a different backend".to_string(),
            ));
        };
        let info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(set_layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&info) }
            .map_err(|e| creation_err("descriptor sets", e))?;
        Ok(GpuDescriptorSet::Vulkan {
            device: self.device.clone(),
            pool: self.descriptor_pool,
            sets,
            writes: std::sync::atomic::AtomicUsize::new(0),
        })
    }

    fn update_descriptor_set(
        &self,
        set: &GpuDescriptorSet,
        write: DescriptorWrite<'_>,
    ) -> Result<(), GraphicsError> {
        let GpuDescriptorSet::Vulkan { sets, writes, .. } = set else {
            return Err(GraphicsError::InvalidParameter(
                "descriptor set belongs to a different backend".to_string(),
            ));
        };

        match write {
            DescriptorWrite::UniformBuffer {
                set,
                binding,
                buffer,
                offset,
                range,
            } => {
                let GpuBuffer::Vulkan { buffer, .. } = buffer else {
                    return Err(GraphicsError::InvalidParameter(
                        "buffer belongs to a different backend".to_string(),
                    ));
                };
                let buffer_info = [vk::DescriptorBufferInfo {
                    buffer: *buffer,
                    offset,
                    range,
                }];
                let descriptor_write = vk::WriteDescriptorSet::default()
                    .dst_set(sets[set as usize])
                    .dst_binding(binding)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                    .buffer_info(&buffer_info);
                unsafe { self.device.update_descriptor_sets(&[descriptor_write], &[]) };
            }
            DescriptorWrite::Image {
                set,
                binding,
                texture,
            } => {
                let GpuTexture::Vulkan { view, .. } = texture else {
                    return Err(GraphicsError::InvalidParameter(
                        "texture belongs to a different backend".to_string(),
                    ));
                };
                let image_info = [vk::DescriptorImageInfo {
                    sampler: self.default_sampler,
                    image_view: *view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                }];
                let descriptor_write = vk::WriteDescriptorSet::default()
                    .dst_set(sets[set as usize])
                    .dst_binding(binding)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_info);
                unsafe { self.device.update_descriptor_sets(&[descriptor_write], &[]) };
            }
            DescriptorWrite::InputAttachment {
                set,
                binding,
                texture,
            } => {
                let GpuTexture::Vulkan { view, .. } = texture else {
                    return Err(GraphicsError::InvalidParameter(
                        "texture belongs to a different backend".to_string(),
                    ));
                };
                let image_info = [vk::DescriptorImageInfo {
                    sampler: vk::Sampler::null(),
                    image_view: *view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                }];
                let descriptor_write = vk::WriteDescriptorSet::default()
                    .dst_set(sets[set as usize])
                    .dst_binding(binding)
                    .descriptor_type(vk::DescriptorType::INPUT_ATTACHMENT)
                    .image_info(&image_info);
                unsafe { self.device.update_descriptor_sets(&[descriptor_write], &[]) };
            }
        }
        writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn create_render_pass(
        &self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<GpuRenderPass, GraphicsError> {
        let mut attachments = Vec::new();
        let mut color_refs = Vec::new();
        for format in &descriptor.color_formats {
            color_refs.push(vk::AttachmentReference {
                attachment: attachments.len() as u32,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            });
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(vk_format(*format))
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
            );
        }
        let depth_ref = descriptor.depth_format.map(|format| {
            let reference = vk::AttachmentReference {
                attachment: attachments.len() as u32,
                layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            };
            attachments.push(
                vk::AttachmentDescription::default()
                    .format(vk_format(format))
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            );
            reference
        });

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(depth_ref) = &depth_ref {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }
        let subpasses = [subpass];

        let info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses);
        let render_pass = unsafe { self.device.create_render_pass(&info, None) }
            .map_err(|e| creation_err("render pass", e))?;

        Ok(GpuRenderPass::Vulkan {
            device: self.device.clone(),
            render_pass,
        })
    }

    fn create_pipeline_cache(&self) -> Result<GpuPipelineCache, GraphicsError> {
        let info = vk::PipelineCacheCreateInfo::default();
        let cache = unsafe { self.device.create_pipeline_cache(&info, None) }
            .map_err(|e| creation_err("pipeline cache", e))?;
        Ok(GpuPipelineCache::Vulkan {
            device: self.device.clone(),
            cache,
        })
    }

    fn create_pipeline(
        &self,
        descriptor: &PipelineDescriptor,
    ) -> Result<GpuPipeline, GraphicsError> {
        let GpuPipelineLayout::Vulkan { layout, .. } = descriptor.shader.pipeline_layout() else {
            return Err(GraphicsError::InvalidParameter(
                "shader belongs to a different backend".to_string(),
            ));
        };
        let GpuRenderPass::Vulkan { render_pass, .. } = descriptor.render_pass.gpu() else {
            return Err(GraphicsError::InvalidParameter(
                "render pass belongs to a different backend".to_string(),
            ));
        };

        let destroy_modules = |modules: &[(ShaderStage, vk::ShaderModule)]| unsafe {
            for (_, module) in modules {
                self.device.destroy_shader_module(*module, None);
            }
        };

        // Any failure mid-loop must release the modules built so far.
        let mut modules = Vec::new();
        let mut entry_points = Vec::new();
        for source in descriptor.shader.sources() {
            let module = ash::util::read_spv(&mut std::io::Cursor::new(&source.code))
                .map_err(|e| creation_err("SPIR-V", e))
                .and_then(|words| {
                    let info = vk::ShaderModuleCreateInfo::default().code(&words);
                    unsafe { self.device.create_shader_module(&info, None) }
                        .map_err(|e| creation_err("shader module", e))
                });
            let module = match module {
                Ok(module) => module,
                Err(e) => {
                    destroy_modules(&modules);
                    return Err(e);
                }
            };
            let entry = match CString::new(source.entry_point.as_str()) {
                Ok(entry) => entry,
                Err(e) => {
                    unsafe { self.device.destroy_shader_module(module, None) };
                    destroy_modules(&modules);
                    return Err(creation_err("entry point", e));
                }
            };
            modules.push((source.stage, module));
            entry_points.push(entry);
        }
        if modules.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "pipeline requires shader sources".to_string(),
            ));
        }

        let stages: Vec<vk::PipelineShaderStageCreateInfo> = modules
            .iter()
            .zip(&entry_points)
            .map(|((stage, module), entry)| {
                let vk_stage = match stage {
                    ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
                    ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
                    ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
                };
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(vk_stage)
                    .module(*module)
                    .name(entry.as_c_str())
            })
            .collect();

        // Single interleaved vertex binding at slot 0.
        let bindings = [vk::VertexInputBindingDescription {
            binding: 0,
            stride: descriptor.vertex_input.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }];
        let attributes: Vec<vk::VertexInputAttributeDescription> = descriptor
            .vertex_input
            .attributes
            .iter()
            .map(|attr| vk::VertexInputAttributeDescription {
                location: attr.location,
                binding: 0,
                format: vk_vertex_format(attr.format),
                offset: attr.offset,
            })
            .collect();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST);
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);
        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(descriptor.render_pass.descriptor().depth_format.is_some())
            .depth_write_enable(descriptor.render_pass.descriptor().depth_format.is_some())
            .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL);
        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = descriptor
            .render_pass
            .descriptor()
            .color_formats
            .iter()
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::default()
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
            })
            .collect();
        let color_blend =
            vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(*layout)
            .render_pass(*render_pass);

        let vk_cache = match &descriptor.cache {
            Some(cache) => match cache.gpu() {
                GpuPipelineCache::Vulkan { cache, .. } => *cache,
                GpuPipelineCache::Dummy => vk::PipelineCache::null(),
            },
            None => vk::PipelineCache::null(),
        };

        let result = unsafe {
            self.device
                .create_graphics_pipelines(vk_cache, &[info], None)
        };
        destroy_modules(&modules);
        let pipelines = result.map_err(|(_, e)| creation_err("graphics pipeline", e))?;

        Ok(GpuPipeline::Vulkan {
            device: self.device.clone(),
            pipeline: pipelines[0],
        })
    }

    fn create_command_encoder(&self) -> Result<GpuCommandEncoder, GraphicsError> {
        Err(GraphicsError::FeatureNotSupported(
            "vulkan encoders wrap externally begun command buffers; \
             use VulkanBackend::adopt_command_buffer"
                .to_string(),
        ))
    }

    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let GpuBuffer::Vulkan {
            allocation, size, ..
        } = buffer
        else {
            return Err(GraphicsError::InvalidParameter(
                "buffer belongs to a different backend".to_string(),
            ));
        };
        if offset + data.len() as u64 > *size {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                size
            )));
        }
        let mut guard = allocation.lock();
        let mapped = guard
            .as_mut()
            .and_then(|a| a.mapped_slice_mut())
            .ok_or_else(|| {
                GraphicsError::InvalidParameter("buffer is not host visible".to_string())
            })?;
        let start = offset as usize;
        mapped[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: &GpuBuffer, offset: u64, size: u64) -> Vec<u8> {
        let GpuBuffer::Vulkan { allocation, .. } = buffer else {
            return Vec::new();
        };
        let guard = allocation.lock();
        match guard.as_ref().and_then(Allocation::mapped_slice) {
            Some(mapped) => {
                let start = (offset as usize).min(mapped.len());
                let end = ((offset + size) as usize).min(mapped.len());
                mapped[start..end].to_vec()
            }
            None => Vec::new(),
        }
    }
}
