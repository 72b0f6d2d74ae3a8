//! Shader reflection metadata.
//!
//! This crate does not compile or reflect shaders itself. A [`Shader`] is
//! built from metadata the caller already has (from offline reflection or a
//! hand-written table): named uniform blocks, textures and input attachments
//! with their (set, binding) slots, plus the vertex attribute list.
//!
//! Descriptor-set layouts are *derived* from the declared parameters by
//! sorting on (set, binding). The order is therefore deterministic and
//! independent of declaration order; dynamic-offset slot assignment in
//! [`Material`] relies on exactly this ordering.
//!
//! [`Material`]: crate::materials::Material

use std::sync::Arc;

use crate::backend::GpuPipelineLayout;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::pipeline::{VertexAttributeFormat, VertexAttributeSemantic};

bitflags::bitflags! {
    /// Shader stages that can access a binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        /// Vertex shader stage.
        const VERTEX = 1 << 0;
        /// Fragment shader stage.
        const FRAGMENT = 1 << 1;
        /// Compute shader stage.
        const COMPUTE = 1 << 2;
    }
}

/// Shader stage in the graphics pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Fragment shader.
    Fragment,
    /// Compute shader.
    Compute,
}

/// Compiled shader code for one stage (SPIR-V for the Vulkan backend).
///
/// Optional: the dummy backend never looks at it, and a metadata-only shader
/// is enough for everything except real pipeline creation.
#[derive(Debug, Clone)]
pub struct ShaderSource {
    /// The shader stage.
    pub stage: ShaderStage,
    /// Shader code (backend dependent).
    pub code: Vec<u8>,
    /// Entry point function name.
    pub entry_point: String,
}

impl ShaderSource {
    /// Create a new shader source.
    pub fn new(stage: ShaderStage, code: impl Into<Vec<u8>>, entry_point: impl Into<String>) -> Self {
        Self {
            stage,
            code: code.into(),
            entry_point: entry_point.into(),
        }
    }

    /// Create a vertex shader source.
    pub fn vertex(code: impl Into<Vec<u8>>, entry_point: impl Into<String>) -> Self {
        Self::new(ShaderStage::Vertex, code, entry_point)
    }

    /// Create a fragment shader source.
    pub fn fragment(code: impl Into<Vec<u8>>, entry_point: impl Into<String>) -> Self {
        Self::new(ShaderStage::Fragment, code, entry_point)
    }
}

/// Type of descriptor a shader parameter binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    /// Uniform buffer addressed through a per-draw dynamic offset.
    UniformBufferDynamic,
    /// Combined texture and sampler.
    CombinedImageSampler,
    /// Subpass input attachment.
    InputAttachment,
}

/// A (set, binding) address within the shader's descriptor layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingSlot {
    /// Descriptor set index.
    pub set: u32,
    /// Binding index within the set.
    pub binding: u32,
}

impl BindingSlot {
    /// Create a new binding slot.
    pub fn new(set: u32, binding: u32) -> Self {
        Self { set, binding }
    }
}

/// A shader-declared uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBlockInfo {
    /// Where the block binds.
    pub slot: BindingSlot,
    /// Stages that read the block.
    pub stages: ShaderStageFlags,
    /// Declared size of the block in bytes. Uniform writes must match it
    /// exactly; there are no partial updates.
    pub size: u64,
}

/// A shader-declared texture or input-attachment parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureParamInfo {
    /// Where the parameter binds.
    pub slot: BindingSlot,
    /// Combined image sampler or input attachment.
    pub descriptor_type: DescriptorType,
    /// Stages that read the parameter.
    pub stages: ShaderStageFlags,
}

/// One binding within a derived descriptor-set layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBinding {
    /// Binding index within the set.
    pub binding: u32,
    /// Descriptor type at this binding.
    pub descriptor_type: DescriptorType,
    /// Stage visibility.
    pub stages: ShaderStageFlags,
}

/// A derived descriptor-set layout: one set index and its bindings, sorted
/// by binding index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSetLayoutInfo {
    /// Descriptor set index.
    pub set: u32,
    /// Bindings in ascending binding order.
    pub bindings: Vec<LayoutBinding>,
}

/// A vertex attribute the shader consumes, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderAttribute {
    /// Semantic meaning of the attribute.
    pub semantic: VertexAttributeSemantic,
    /// Wire format (and byte size) of the attribute.
    pub format: VertexAttributeFormat,
}

impl ShaderAttribute {
    /// Create a new shader attribute.
    pub fn new(semantic: VertexAttributeSemantic, format: VertexAttributeFormat) -> Self {
        Self { semantic, format }
    }
}

/// Descriptor for creating a shader from reflection metadata.
#[derive(Debug, Clone, Default)]
pub struct ShaderDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Named uniform blocks.
    pub uniform_blocks: Vec<(String, UniformBlockInfo)>,
    /// Named textures and input attachments.
    pub textures: Vec<(String, TextureParamInfo)>,
    /// Vertex attributes in declaration order.
    pub attributes: Vec<ShaderAttribute>,
    /// Per-stage shader code for backends that need it.
    pub sources: Vec<ShaderSource>,
}

impl ShaderDescriptor {
    /// Create a new empty shader descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a uniform block.
    pub fn with_uniform_block(
        mut self,
        name: impl Into<String>,
        set: u32,
        binding: u32,
        stages: ShaderStageFlags,
        size: u64,
    ) -> Self {
        self.uniform_blocks.push((
            name.into(),
            UniformBlockInfo {
                slot: BindingSlot::new(set, binding),
                stages,
                size,
            },
        ));
        self
    }

    /// Declare a combined image sampler.
    pub fn with_texture(
        mut self,
        name: impl Into<String>,
        set: u32,
        binding: u32,
        stages: ShaderStageFlags,
    ) -> Self {
        self.textures.push((
            name.into(),
            TextureParamInfo {
                slot: BindingSlot::new(set, binding),
                descriptor_type: DescriptorType::CombinedImageSampler,
                stages,
            },
        ));
        self
    }

    /// Declare a subpass input attachment.
    pub fn with_input_attachment(
        mut self,
        name: impl Into<String>,
        set: u32,
        binding: u32,
        stages: ShaderStageFlags,
    ) -> Self {
        self.textures.push((
            name.into(),
            TextureParamInfo {
                slot: BindingSlot::new(set, binding),
                descriptor_type: DescriptorType::InputAttachment,
                stages,
            },
        ));
        self
    }

    /// Declare a vertex attribute. Declaration order defines the pipeline's
    /// attribute locations and packing.
    pub fn with_attribute(
        mut self,
        semantic: VertexAttributeSemantic,
        format: VertexAttributeFormat,
    ) -> Self {
        self.attributes.push(ShaderAttribute::new(semantic, format));
        self
    }

    /// Add stage code.
    pub fn with_source(mut self, source: ShaderSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A shader: validated reflection metadata plus the backend pipeline layout.
///
/// Created by [`GraphicsDevice::create_shader`] and shared across materials
/// via `Arc`.
pub struct Shader {
    device: Arc<GraphicsDevice>,
    descriptor: ShaderDescriptor,
    set_layouts: Vec<DescriptorSetLayoutInfo>,
    pipeline_layout: GpuPipelineLayout,
}

impl Shader {
    /// Create a new shader (called by GraphicsDevice).
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        descriptor: ShaderDescriptor,
        set_layouts: Vec<DescriptorSetLayoutInfo>,
        pipeline_layout: GpuPipelineLayout,
    ) -> Self {
        Self {
            device,
            descriptor,
            set_layouts,
            pipeline_layout,
        }
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Get the shader label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Declared uniform blocks.
    pub fn uniform_blocks(&self) -> &[(String, UniformBlockInfo)] {
        &self.descriptor.uniform_blocks
    }

    /// Declared textures and input attachments.
    pub fn textures(&self) -> &[(String, TextureParamInfo)] {
        &self.descriptor.textures
    }

    /// Declared vertex attributes, in declaration order.
    pub fn attributes(&self) -> &[ShaderAttribute] {
        &self.descriptor.attributes
    }

    /// Per-stage shader code, if provided.
    pub fn sources(&self) -> &[ShaderSource] {
        &self.descriptor.sources
    }

    /// Derived descriptor-set layouts, sorted by (set, binding).
    pub fn set_layouts(&self) -> &[DescriptorSetLayoutInfo] {
        &self.set_layouts
    }

    /// Backend pipeline layout handle.
    pub(crate) fn pipeline_layout(&self) -> &GpuPipelineLayout {
        &self.pipeline_layout
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("label", &self.descriptor.label)
            .field("uniform_blocks", &self.descriptor.uniform_blocks.len())
            .field("textures", &self.descriptor.textures.len())
            .field("attributes", &self.descriptor.attributes.len())
            .finish()
    }
}

// Ensure Shader is Send + Sync
static_assertions::assert_impl_all!(Shader: Send, Sync);

/// Validate a shader descriptor and derive its descriptor-set layouts.
///
/// The result groups parameters by set index and sorts bindings within each
/// set, so the layout order never depends on the order the caller declared
/// parameters in.
pub(crate) fn derive_set_layouts(
    descriptor: &ShaderDescriptor,
) -> Result<Vec<DescriptorSetLayoutInfo>, GraphicsError> {
    let mut entries: Vec<(BindingSlot, LayoutBinding)> = Vec::new();
    let mut names: Vec<&str> = Vec::new();

    for (name, info) in &descriptor.uniform_blocks {
        if info.size == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "uniform block \"{name}\" has zero size"
            )));
        }
        names.push(name);
        entries.push((
            info.slot,
            LayoutBinding {
                binding: info.slot.binding,
                descriptor_type: DescriptorType::UniformBufferDynamic,
                stages: info.stages,
            },
        ));
    }

    for (name, info) in &descriptor.textures {
        names.push(name);
        entries.push((
            info.slot,
            LayoutBinding {
                binding: info.slot.binding,
                descriptor_type: info.descriptor_type,
                stages: info.stages,
            },
        ));
    }

    names.sort_unstable();
    if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
        return Err(GraphicsError::InvalidParameter(format!(
            "duplicate shader parameter name \"{}\"",
            dup[0]
        )));
    }

    entries.sort_by_key(|(slot, _)| *slot);
    if let Some(dup) = entries.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(GraphicsError::InvalidParameter(format!(
            "duplicate shader binding (set {}, binding {})",
            dup[0].0.set, dup[0].0.binding
        )));
    }

    let mut layouts: Vec<DescriptorSetLayoutInfo> = Vec::new();
    for (slot, binding) in entries {
        match layouts.last_mut() {
            Some(layout) if layout.set == slot.set => layout.bindings.push(binding),
            _ => layouts.push(DescriptorSetLayoutInfo {
                set: slot.set,
                bindings: vec![binding],
            }),
        }
    }

    Ok(layouts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages() -> ShaderStageFlags {
        ShaderStageFlags::VERTEX | ShaderStageFlags::FRAGMENT
    }

    #[test]
    fn test_layout_derivation_is_order_independent() {
        let forward = ShaderDescriptor::new()
            .with_uniform_block("a", 0, 0, stages(), 64)
            .with_texture("t", 0, 1, stages())
            .with_uniform_block("b", 1, 0, stages(), 16);
        let shuffled = ShaderDescriptor::new()
            .with_uniform_block("b", 1, 0, stages(), 16)
            .with_texture("t", 0, 1, stages())
            .with_uniform_block("a", 0, 0, stages(), 64);

        let l1 = derive_set_layouts(&forward).unwrap();
        let l2 = derive_set_layouts(&shuffled).unwrap();
        assert_eq!(l1, l2);
        assert_eq!(l1.len(), 2);
        assert_eq!(l1[0].set, 0);
        assert_eq!(l1[0].bindings.len(), 2);
        assert_eq!(l1[1].set, 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let desc = ShaderDescriptor::new()
            .with_uniform_block("mvp", 0, 0, stages(), 64)
            .with_texture("mvp", 0, 1, stages());
        assert!(derive_set_layouts(&desc).is_err());
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let desc = ShaderDescriptor::new()
            .with_uniform_block("a", 0, 0, stages(), 64)
            .with_texture("t", 0, 0, stages());
        assert!(derive_set_layouts(&desc).is_err());
    }

    #[test]
    fn test_zero_size_block_rejected() {
        let desc = ShaderDescriptor::new().with_uniform_block("a", 0, 0, stages(), 0);
        assert!(derive_set_layouts(&desc).is_err());
    }

    #[test]
    fn test_shader_source() {
        let vs = ShaderSource::vertex(b"code".to_vec(), "vs_main");
        assert_eq!(vs.stage, ShaderStage::Vertex);
        assert_eq!(vs.entry_point, "vs_main");
    }
}
