//! Material: per-draw shader parameter binding.
//!
//! A [`Material`] owns one descriptor set for its shader and multiplexes any
//! number of draw calls per frame over it. Uniform data never gets its own
//! buffer: every write lands in the device's shared [`UniformRing`] and the
//! returned ring offset becomes that draw's dynamic descriptor offset.
//!
//! The flow per frame:
//!
//! ```text
//! material.begin_frame();
//! let slot = material.begin_object();
//! material.set_uniform(slot, "mvp", bytes_of(&mvp))?;
//! material.bind_descriptor_sets(&mut encoder, PipelineBindPoint::Graphics, slot)?;
//! encoder.draw(...);
//! material.end_object();
//! material.end_frame();
//! ```
//!
//! Dynamic offsets are positional: Vulkan consumes them in (set, binding)
//! order of the dynamic bindings, so the material assigns each uniform block
//! a dense slot index from the shader's sorted layouts and keeps one offset
//! per (draw, slot) pair.

use std::collections::HashMap;
use std::sync::Arc;

use static_assertions::assert_impl_all;

use crate::command::{CommandEncoder, PipelineBindPoint};
use crate::descriptors::DescriptorSet;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::pipeline::{
    Pipeline, PipelineCache, PipelineDescriptor, RenderPass, VertexInputLayout,
};
use crate::resources::{Texture, UniformRing};
use crate::shader::{BindingSlot, DescriptorType, Shader};

/// Descriptor for creating a material.
#[derive(Clone)]
pub struct MaterialDescriptor {
    /// The shader whose parameters the material binds.
    pub shader: Arc<Shader>,
    /// The render pass the material's pipeline targets.
    pub render_pass: Arc<RenderPass>,
    /// Optional cache for pipeline builds.
    pub pipeline_cache: Option<Arc<PipelineCache>>,
    /// Debug label.
    pub label: Option<String>,
}

impl MaterialDescriptor {
    /// Create a new material descriptor.
    pub fn new(shader: Arc<Shader>, render_pass: Arc<RenderPass>) -> Self {
        Self {
            shader,
            render_pass,
            pipeline_cache: None,
            label: None,
        }
    }

    /// Use a pipeline cache for pipeline builds.
    pub fn with_pipeline_cache(mut self, cache: Arc<PipelineCache>) -> Self {
        self.pipeline_cache = Some(cache);
        self
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Handle to one draw call's parameter slot within the current frame.
///
/// Returned by [`Material::begin_object`] and consumed by
/// [`Material::set_uniform`] and [`Material::bind_descriptor_sets`]. A slot
/// is only valid for the frame it was opened in; using it later is a
/// programming error and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawSlot {
    frame: u64,
    index: u32,
}

impl DrawSlot {
    /// Index of this draw within its frame.
    pub fn index(&self) -> u32 {
        self.index
    }
}

struct UniformEntry {
    size: u64,
    // Position of this block's offset among the dynamic offsets of one draw.
    dynamic_index: usize,
}

struct TextureEntry {
    descriptor_type: DescriptorType,
    bound: Option<Arc<Texture>>,
}

/// Binds a shader's declared parameters to per-draw state.
pub struct Material {
    device: Arc<GraphicsDevice>,
    shader: Arc<Shader>,
    render_pass: Arc<RenderPass>,
    pipeline_cache: Option<Arc<PipelineCache>>,
    label: Option<String>,
    ring: Arc<UniformRing>,
    descriptor_set: DescriptorSet,
    uniforms: HashMap<String, UniformEntry>,
    textures: HashMap<String, TextureEntry>,
    dynamic_slot_count: usize,
    // One offset per (draw, dynamic slot), laid out draw-major.
    dynamic_offsets: Vec<u32>,
    frame_serial: u64,
    frame_open: bool,
    object_count: u32,
    pipeline: Option<Arc<Pipeline>>,
}

assert_impl_all!(Material: Send, Sync);

impl Material {
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        descriptor: MaterialDescriptor,
    ) -> Result<Self, GraphicsError> {
        let MaterialDescriptor {
            shader,
            render_pass,
            pipeline_cache,
            label,
        } = descriptor;

        let ring = device.uniform_ring()?;
        let descriptor_set = DescriptorSet::new(device.clone(), shader.clone())?;

        // Dense dynamic-offset slots in ascending (set, binding) order; the
        // layouts are already sorted, so a flat scan is enough.
        let mut slot_indices: HashMap<BindingSlot, usize> = HashMap::new();
        for layout in shader.set_layouts() {
            for binding in &layout.bindings {
                if binding.descriptor_type == DescriptorType::UniformBufferDynamic {
                    let index = slot_indices.len();
                    slot_indices.insert(BindingSlot::new(layout.set, binding.binding), index);
                }
            }
        }
        let dynamic_slot_count = slot_indices.len();

        // Each block's descriptor points at the ring base with the block's
        // declared range; per-draw offsets come in at bind time.
        let mut uniforms = HashMap::new();
        for (name, info) in shader.uniform_blocks() {
            descriptor_set.write_uniform_buffer(name, ring.buffer(), 0, info.size)?;
            uniforms.insert(
                name.clone(),
                UniformEntry {
                    size: info.size,
                    dynamic_index: slot_indices[&info.slot],
                },
            );
        }

        let mut textures = HashMap::new();
        for (name, info) in shader.textures() {
            textures.insert(
                name.clone(),
                TextureEntry {
                    descriptor_type: info.descriptor_type,
                    bound: None,
                },
            );
        }

        log::debug!(
            "Created material {}: {} uniform block(s), {} texture(s)",
            label.as_deref().unwrap_or("<unlabeled>"),
            uniforms.len(),
            textures.len()
        );

        Ok(Self {
            device,
            shader,
            render_pass,
            pipeline_cache,
            label,
            ring,
            descriptor_set,
            uniforms,
            textures,
            dynamic_slot_count,
            dynamic_offsets: Vec::new(),
            frame_serial: 0,
            frame_open: false,
            object_count: 0,
            pipeline: None,
        })
    }

    /// The shader this material binds.
    pub fn shader(&self) -> &Arc<Shader> {
        &self.shader
    }

    /// The render pass this material's pipeline targets.
    pub fn render_pass(&self) -> &Arc<RenderPass> {
        &self.render_pass
    }

    /// The material label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The shared uniform ring this material stages through.
    pub fn ring(&self) -> &Arc<UniformRing> {
        &self.ring
    }

    /// The material's descriptor set.
    pub fn descriptor_set(&self) -> &DescriptorSet {
        &self.descriptor_set
    }

    /// Number of dynamic uniform slots per draw.
    pub fn dynamic_slot_count(&self) -> usize {
        self.dynamic_slot_count
    }

    /// Number of draws opened in the current frame.
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// Build (or rebuild) the material's pipeline.
    ///
    /// The vertex input layout is assembled from the shader's attribute
    /// declarations: one interleaved binding, locations and offsets in
    /// declaration order.
    pub fn prepare_pipeline(&mut self) -> Result<Arc<Pipeline>, GraphicsError> {
        let vertex_input = VertexInputLayout::from_attributes(self.shader.attributes());
        let pipeline = self.device.create_pipeline(PipelineDescriptor {
            shader: self.shader.clone(),
            render_pass: self.render_pass.clone(),
            cache: self.pipeline_cache.clone(),
            vertex_input,
            label: self.label.clone(),
        })?;
        self.pipeline = Some(pipeline.clone());
        Ok(pipeline)
    }

    /// The pipeline from the last [`prepare_pipeline`](Self::prepare_pipeline).
    pub fn pipeline(&self) -> Option<&Arc<Pipeline>> {
        self.pipeline.as_ref()
    }

    /// Open a new frame, discarding all per-draw state of the previous one.
    pub fn begin_frame(&mut self) {
        self.frame_serial += 1;
        self.frame_open = true;
        self.object_count = 0;
        self.dynamic_offsets.clear();
    }

    /// Close the current frame.
    pub fn end_frame(&mut self) {
        debug_assert!(self.frame_open, "end_frame without begin_frame");
        self.frame_open = false;
    }

    /// Open a parameter slot for the next draw call.
    ///
    /// The slot's dynamic offsets start at zero (the base of the ring) until
    /// [`set_uniform`](Self::set_uniform) stages data for them.
    pub fn begin_object(&mut self) -> DrawSlot {
        assert!(self.frame_open, "begin_object outside begin_frame/end_frame");
        let index = self.object_count;
        self.object_count += 1;
        self.dynamic_offsets
            .extend(std::iter::repeat(0).take(self.dynamic_slot_count));
        DrawSlot {
            frame: self.frame_serial,
            index,
        }
    }

    /// Close the most recently opened draw slot.
    ///
    /// Purely a readability marker today; slots stay valid until the frame
    /// ends.
    pub fn end_object(&mut self) {
        debug_assert!(self.frame_open, "end_object outside begin_frame/end_frame");
    }

    /// Stage uniform data for `slot`'s named block.
    ///
    /// `data` must match the block's declared size exactly. An unknown name
    /// or a size mismatch is a configuration mistake: it is logged and the
    /// draw keeps its previous offset, but the call still succeeds. Only
    /// ring exhaustion (a single request larger than the whole ring) or a
    /// backend write failure return an error.
    ///
    /// # Panics
    ///
    /// Panics if `slot` was not opened in the current frame.
    pub fn set_uniform(
        &mut self,
        slot: DrawSlot,
        name: &str,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        self.check_slot(slot);
        let Some(entry) = self.uniforms.get(name) else {
            log::error!(
                "Material {}: set_uniform on unknown block \"{}\"",
                self.display_name(),
                name
            );
            return Ok(());
        };
        if data.len() as u64 != entry.size {
            log::error!(
                "Material {}: uniform \"{}\" expects {} bytes, got {}",
                self.display_name(),
                name,
                entry.size,
                data.len()
            );
            return Ok(());
        }
        let offset = self.ring.write(data)?;
        let position = slot.index as usize * self.dynamic_slot_count + entry.dynamic_index;
        self.dynamic_offsets[position] = offset as u32;
        Ok(())
    }

    /// Bind a texture to the named combined image sampler.
    ///
    /// Unknown names and descriptor-type mismatches are logged and skipped.
    /// Re-binding the texture already bound is a no-op (no descriptor
    /// write).
    pub fn set_texture(&mut self, name: &str, texture: &Arc<Texture>) -> Result<(), GraphicsError> {
        self.bind_texture(name, texture, DescriptorType::CombinedImageSampler)
    }

    /// Bind a texture to the named input attachment.
    pub fn set_input_attachment(
        &mut self,
        name: &str,
        texture: &Arc<Texture>,
    ) -> Result<(), GraphicsError> {
        self.bind_texture(name, texture, DescriptorType::InputAttachment)
    }

    fn bind_texture(
        &mut self,
        name: &str,
        texture: &Arc<Texture>,
        expected: DescriptorType,
    ) -> Result<(), GraphicsError> {
        let Some(entry) = self.textures.get_mut(name) else {
            log::error!(
                "Material {}: unknown texture parameter \"{}\"",
                self.display_name(),
                name
            );
            return Ok(());
        };
        if entry.descriptor_type != expected {
            // display_name() borrows all of self while `entry` is live.
            log::error!(
                "Material {}: texture parameter \"{}\" is {:?}, bound as {:?}",
                self.label.as_deref().unwrap_or("<unlabeled>"),
                name,
                entry.descriptor_type,
                expected
            );
            return Ok(());
        }
        if let Some(bound) = &entry.bound {
            if Arc::ptr_eq(bound, texture) {
                return Ok(());
            }
        }
        match expected {
            DescriptorType::CombinedImageSampler => {
                self.descriptor_set.write_image(name, texture)?
            }
            DescriptorType::InputAttachment => {
                self.descriptor_set.write_input_attachment(name, texture)?
            }
            DescriptorType::UniformBufferDynamic => unreachable!(),
        }
        entry.bound = Some(texture.clone());
        Ok(())
    }

    /// Bind the material's descriptor sets for `slot`'s draw call.
    ///
    /// Supplies the slot's dynamic offsets positionally, in (set, binding)
    /// order of the shader's dynamic uniform bindings.
    ///
    /// # Panics
    ///
    /// Panics if `slot` was not opened in the current frame.
    pub fn bind_descriptor_sets(
        &self,
        encoder: &mut CommandEncoder,
        bind_point: PipelineBindPoint,
        slot: DrawSlot,
    ) -> Result<(), GraphicsError> {
        self.check_slot(slot);
        let start = slot.index as usize * self.dynamic_slot_count;
        let offsets = &self.dynamic_offsets[start..start + self.dynamic_slot_count];
        encoder.bind_descriptor_sets(
            self.shader.pipeline_layout(),
            self.descriptor_set.gpu(),
            bind_point,
            offsets,
        )
    }

    fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or("<unlabeled>")
    }

    fn check_slot(&self, slot: DrawSlot) {
        assert_eq!(
            slot.frame, self.frame_serial,
            "draw slot used outside the frame it was opened in"
        );
        assert!(
            slot.index < self.object_count,
            "draw slot index {} out of range ({} opened)",
            slot.index,
            self.object_count
        );
    }
}

impl Drop for Material {
    fn drop(&mut self) {
        log::trace!("Destroying material {}", self.display_name());
    }
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Material")
            .field("label", &self.label)
            .field("shader", &self.shader.label())
            .field("dynamic_slot_count", &self.dynamic_slot_count)
            .field("object_count", &self.object_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RecordedCommand;
    use crate::instance::GraphicsInstance;
    use crate::pipeline::RenderPassDescriptor;
    use crate::shader::{ShaderDescriptor, ShaderStageFlags};
    use crate::types::{TextureDescriptor, TextureFormat, TextureUsage};

    fn test_device() -> Arc<GraphicsDevice> {
        let instance = GraphicsInstance::new().unwrap();
        instance.create_device().unwrap()
    }

    fn test_render_pass(device: &Arc<GraphicsDevice>) -> Arc<RenderPass> {
        device
            .create_render_pass(
                RenderPassDescriptor::new().with_color_format(TextureFormat::Rgba8Unorm),
            )
            .unwrap()
    }

    fn mvp_shader(device: &Arc<GraphicsDevice>) -> Arc<Shader> {
        device
            .create_shader(
                ShaderDescriptor::new()
                    .with_uniform_block("mvp", 0, 0, ShaderStageFlags::VERTEX, 64)
                    .with_texture("albedo", 0, 1, ShaderStageFlags::FRAGMENT),
            )
            .unwrap()
    }

    fn mvp_material(device: &Arc<GraphicsDevice>) -> Material {
        let shader = mvp_shader(device);
        let pass = test_render_pass(device);
        device
            .create_material(MaterialDescriptor::new(shader, pass).with_label("mvp"))
            .unwrap()
    }

    #[test]
    fn test_prepare_writes_one_descriptor_per_block() {
        let device = test_device();
        let material = mvp_material(&device);
        // One dynamic uniform write; the texture stays unwritten until set.
        assert_eq!(material.descriptor_set().write_count(), 1);
        assert_eq!(material.dynamic_slot_count(), 1);
    }

    #[test]
    fn test_slot_order_follows_set_and_binding() {
        let device = test_device();
        let shader = device
            .create_shader(
                ShaderDescriptor::new()
                    // Declared out of order on purpose.
                    .with_uniform_block("lights", 1, 0, ShaderStageFlags::FRAGMENT, 64)
                    .with_uniform_block("mvp", 0, 0, ShaderStageFlags::VERTEX, 64)
                    .with_uniform_block("params", 0, 2, ShaderStageFlags::FRAGMENT, 64),
            )
            .unwrap();
        let pass = test_render_pass(&device);
        let mut material = device
            .create_material(MaterialDescriptor::new(shader, pass))
            .unwrap();
        assert_eq!(material.dynamic_slot_count(), 3);

        material.begin_frame();
        let slot = material.begin_object();
        material.set_uniform(slot, "mvp", &[1u8; 64]).unwrap();
        material.set_uniform(slot, "params", &[2u8; 64]).unwrap();
        material.set_uniform(slot, "lights", &[3u8; 64]).unwrap();
        material.end_object();

        // (0,0)=mvp, (0,2)=params, (1,0)=lights: three consecutive ring
        // allocations in exactly that order.
        let alignment = material.ring().alignment() as u32;
        assert_eq!(
            material.dynamic_offsets,
            vec![0, alignment, 2 * alignment]
        );
        material.end_frame();
    }

    #[test]
    fn test_offsets_advance_per_object() {
        let device = test_device();
        let mut material = mvp_material(&device);
        let alignment = material.ring().alignment() as u32;

        material.begin_frame();
        for i in 0..3 {
            let slot = material.begin_object();
            material
                .set_uniform(slot, "mvp", &[i as u8; 64])
                .unwrap();
            material.end_object();
        }
        material.end_frame();

        assert_eq!(material.object_count(), 3);
        assert_eq!(
            material.dynamic_offsets,
            vec![0, alignment, 2 * alignment]
        );
        // Each draw's bytes are intact at its own offset.
        let ring = material.ring();
        assert_eq!(ring.buffer().read(alignment as u64, 64), vec![1u8; 64]);
        assert_eq!(ring.buffer().read(2 * alignment as u64, 64), vec![2u8; 64]);
    }

    #[test]
    fn test_begin_frame_resets_draw_state() {
        let device = test_device();
        let mut material = mvp_material(&device);

        material.begin_frame();
        let slot = material.begin_object();
        material.set_uniform(slot, "mvp", &[7u8; 64]).unwrap();
        material.end_object();
        material.end_frame();

        material.begin_frame();
        assert_eq!(material.object_count(), 0);
        let slot = material.begin_object();
        assert_eq!(slot.index(), 0);
        material.end_frame();
    }

    #[test]
    fn test_unknown_uniform_is_logged_not_fatal() {
        let device = test_device();
        let mut material = mvp_material(&device);
        material.begin_frame();
        let slot = material.begin_object();
        let used_before = material.ring().used();
        material.set_uniform(slot, "missing", &[0u8; 64]).unwrap();
        assert_eq!(material.ring().used(), used_before);
        material.end_frame();
    }

    #[test]
    fn test_size_mismatch_is_logged_not_fatal() {
        let device = test_device();
        let mut material = mvp_material(&device);
        material.begin_frame();
        let slot = material.begin_object();
        let used_before = material.ring().used();
        material.set_uniform(slot, "mvp", &[0u8; 60]).unwrap();
        assert_eq!(material.ring().used(), used_before);
        assert_eq!(material.dynamic_offsets, vec![0]);
        material.end_frame();
    }

    #[test]
    #[should_panic(expected = "outside the frame it was opened in")]
    fn test_stale_slot_panics() {
        let device = test_device();
        let mut material = mvp_material(&device);
        material.begin_frame();
        let slot = material.begin_object();
        material.end_frame();
        material.begin_frame();
        let _ = material.set_uniform(slot, "mvp", &[0u8; 64]);
    }

    #[test]
    #[should_panic(expected = "begin_object outside")]
    fn test_begin_object_requires_open_frame() {
        let device = test_device();
        let mut material = mvp_material(&device);
        let _ = material.begin_object();
    }

    #[test]
    fn test_texture_rebind_is_deduplicated() {
        let device = test_device();
        let mut material = mvp_material(&device);
        let texture = device
            .create_texture(TextureDescriptor::new_2d(
                16,
                16,
                TextureFormat::Rgba8Unorm,
                TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap();
        let writes_before = material.descriptor_set().write_count();

        material.set_texture("albedo", &texture).unwrap();
        assert_eq!(material.descriptor_set().write_count(), writes_before + 1);
        // Same texture again: no descriptor write.
        material.set_texture("albedo", &texture).unwrap();
        assert_eq!(material.descriptor_set().write_count(), writes_before + 1);

        let other = device
            .create_texture(TextureDescriptor::new_2d(
                16,
                16,
                TextureFormat::Rgba8Unorm,
                TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap();
        material.set_texture("albedo", &other).unwrap();
        assert_eq!(material.descriptor_set().write_count(), writes_before + 2);
    }

    #[test]
    fn test_texture_type_mismatch_is_skipped() {
        let device = test_device();
        let shader = device
            .create_shader(
                ShaderDescriptor::new()
                    .with_input_attachment("depth_input", 0, 0, ShaderStageFlags::FRAGMENT),
            )
            .unwrap();
        let pass = test_render_pass(&device);
        let mut material = device
            .create_material(MaterialDescriptor::new(shader, pass))
            .unwrap();
        let texture = device
            .create_texture(TextureDescriptor::new_2d(
                16,
                16,
                TextureFormat::Depth32Float,
                TextureUsage::INPUT_ATTACHMENT,
            ))
            .unwrap();

        material.set_texture("depth_input", &texture).unwrap();
        assert_eq!(material.descriptor_set().write_count(), 0);
        material.set_input_attachment("depth_input", &texture).unwrap();
        assert_eq!(material.descriptor_set().write_count(), 1);
    }

    #[test]
    fn test_texture_mismatch_keeps_existing_binding() {
        let device = test_device();
        let shader = device
            .create_shader(
                ShaderDescriptor::new()
                    .with_texture("albedo", 0, 0, ShaderStageFlags::FRAGMENT)
                    .with_input_attachment("depth_input", 0, 1, ShaderStageFlags::FRAGMENT),
            )
            .unwrap();
        let pass = test_render_pass(&device);
        let mut material = device
            .create_material(MaterialDescriptor::new(shader, pass).with_label("gbuffer"))
            .unwrap();
        let texture = device
            .create_texture(TextureDescriptor::new_2d(
                16,
                16,
                TextureFormat::Rgba8Unorm,
                TextureUsage::TEXTURE_BINDING | TextureUsage::INPUT_ATTACHMENT,
            ))
            .unwrap();

        material.set_texture("albedo", &texture).unwrap();
        assert_eq!(material.descriptor_set().write_count(), 1);

        // Wrong kind for each name: logged and skipped, nothing rebound.
        material.set_input_attachment("albedo", &texture).unwrap();
        material.set_texture("depth_input", &texture).unwrap();
        assert_eq!(material.descriptor_set().write_count(), 1);

        // The surviving binding still de-duplicates.
        material.set_texture("albedo", &texture).unwrap();
        assert_eq!(material.descriptor_set().write_count(), 1);
    }

    #[test]
    fn test_bind_passes_positional_offsets() {
        let device = test_device();
        let mut material = mvp_material(&device);
        let alignment = material.ring().alignment() as u32;
        let mut encoder = device.create_command_encoder().unwrap();

        material.begin_frame();
        let first = material.begin_object();
        material.set_uniform(first, "mvp", &[1u8; 64]).unwrap();
        material.end_object();
        let second = material.begin_object();
        material.set_uniform(second, "mvp", &[2u8; 64]).unwrap();
        material.end_object();

        material
            .bind_descriptor_sets(&mut encoder, PipelineBindPoint::Graphics, second)
            .unwrap();
        material
            .bind_descriptor_sets(&mut encoder, PipelineBindPoint::Graphics, first)
            .unwrap();
        material.end_frame();

        assert_eq!(
            encoder.commands(),
            &[
                RecordedCommand::BindDescriptorSets {
                    bind_point: PipelineBindPoint::Graphics,
                    first_set: 0,
                    set_count: 1,
                    dynamic_offsets: vec![alignment],
                },
                RecordedCommand::BindDescriptorSets {
                    bind_point: PipelineBindPoint::Graphics,
                    first_set: 0,
                    set_count: 1,
                    dynamic_offsets: vec![0],
                },
            ]
        );
    }

    #[test]
    fn test_prepare_pipeline_uses_shader_attributes() {
        use crate::pipeline::{VertexAttributeFormat, VertexAttributeSemantic};

        let device = test_device();
        let shader = device
            .create_shader(
                ShaderDescriptor::new()
                    .with_uniform_block("mvp", 0, 0, ShaderStageFlags::VERTEX, 64)
                    .with_attribute(
                        VertexAttributeSemantic::Position,
                        VertexAttributeFormat::Float3,
                    )
                    .with_attribute(
                        VertexAttributeSemantic::TexCoord0,
                        VertexAttributeFormat::Float2,
                    ),
            )
            .unwrap();
        let pass = test_render_pass(&device);
        let mut material = device
            .create_material(MaterialDescriptor::new(shader, pass))
            .unwrap();

        assert!(material.pipeline().is_none());
        let pipeline = material.prepare_pipeline().unwrap();
        assert_eq!(pipeline.vertex_input().stride, 20);
        assert_eq!(pipeline.vertex_input().attributes[1].offset, 12);
        assert!(material.pipeline().is_some());
    }

    #[test]
    fn test_materials_share_one_ring() {
        let device = test_device();
        let a = mvp_material(&device);
        let b = mvp_material(&device);
        assert!(Arc::ptr_eq(a.ring(), b.ring()));

        drop(a);
        assert!(device.has_live_uniform_ring());
        drop(b);
        assert!(!device.has_live_uniform_ring());
    }
}
