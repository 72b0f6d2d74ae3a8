//! Pipeline construction: vertex input assembly and the pipeline, render
//! pass and pipeline cache handles a [`Material`] consumes.
//!
//! The only part of pipeline state this crate owns is the vertex input
//! layout: a material packs every shader-declared attribute into one
//! interleaved buffer at binding slot 0, with sequential locations and
//! cumulative offsets. Everything else (rasterizer, blending, multisampling)
//! is the backend's concern.
//!
//! [`Material`]: crate::materials::Material

use std::sync::Arc;

use crate::backend::{GpuPipeline, GpuPipelineCache, GpuRenderPass};
use crate::device::GraphicsDevice;
use crate::shader::{Shader, ShaderAttribute};
use crate::types::TextureFormat;

/// Semantic meaning of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeSemantic {
    /// Vertex position (typically float3).
    Position,
    /// Vertex normal (typically float3).
    Normal,
    /// Vertex tangent (typically float4, w = handedness).
    Tangent,
    /// Texture coordinates set 0 (typically float2).
    TexCoord0,
    /// Texture coordinates set 1 (typically float2).
    TexCoord1,
    /// Vertex color (typically float4 or unorm4).
    Color,
    /// Bone indices for skinning (typically uint4).
    Joints,
    /// Bone weights for skinning (typically float4).
    Weights,
}

/// Format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeFormat {
    /// Single 32-bit float.
    Float,
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
    /// Four 32-bit unsigned integers.
    Uint4,
    /// Four 8-bit unsigned integers (normalized to 0.0-1.0).
    Unorm8x4,
}

impl VertexAttributeFormat {
    /// Get the size in bytes of this format.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
            Self::Uint4 => 16,
            Self::Unorm8x4 => 4,
        }
    }
}

/// One vertex attribute within the assembled input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexInputAttribute {
    /// Shader input location.
    pub location: u32,
    /// Attribute format.
    pub format: VertexAttributeFormat,
    /// Byte offset within the vertex.
    pub offset: u32,
}

/// The assembled vertex input layout: one interleaved buffer at binding
/// slot 0.
///
/// A material cannot bind multi-buffer vertex streams; all attributes read
/// from the single binding slot in shader declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexInputLayout {
    /// Stride in bytes between consecutive vertices.
    pub stride: u32,
    /// Attributes at sequential locations 0..N-1 with cumulative offsets.
    pub attributes: Vec<VertexInputAttribute>,
}

impl VertexInputLayout {
    /// Assemble the layout from a shader's attribute list.
    ///
    /// Locations are sequential starting at 0; offsets accumulate the byte
    /// sizes of the preceding attributes; the stride is the total.
    pub fn from_attributes(attributes: &[ShaderAttribute]) -> Self {
        let mut offset = 0u32;
        let assembled = attributes
            .iter()
            .enumerate()
            .map(|(location, attr)| {
                let entry = VertexInputAttribute {
                    location: location as u32,
                    format: attr.format,
                    offset,
                };
                offset += attr.format.size();
                entry
            })
            .collect();
        Self {
            stride: offset,
            attributes: assembled,
        }
    }
}

/// Descriptor for creating a render pass.
#[derive(Debug, Clone, Default)]
pub struct RenderPassDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Color attachment formats.
    pub color_formats: Vec<TextureFormat>,
    /// Depth attachment format, if any.
    pub depth_format: Option<TextureFormat>,
}

impl RenderPassDescriptor {
    /// Create a new render pass descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a color attachment format.
    pub fn with_color_format(mut self, format: TextureFormat) -> Self {
        self.color_formats.push(format);
        self
    }

    /// Set the depth attachment format.
    pub fn with_depth_format(mut self, format: TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A render pass handle.
///
/// Render-pass contents are external to this crate; the handle only pins the
/// attachment formats a pipeline is built against.
pub struct RenderPass {
    device: Arc<GraphicsDevice>,
    descriptor: RenderPassDescriptor,
    gpu: GpuRenderPass,
}

impl RenderPass {
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        descriptor: RenderPassDescriptor,
        gpu: GpuRenderPass,
    ) -> Self {
        Self {
            device,
            descriptor,
            gpu,
        }
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Get the render pass descriptor.
    pub fn descriptor(&self) -> &RenderPassDescriptor {
        &self.descriptor
    }

    /// Get the render pass label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    pub(crate) fn gpu(&self) -> &GpuRenderPass {
        &self.gpu
    }
}

impl std::fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("label", &self.descriptor.label)
            .field("color_formats", &self.descriptor.color_formats)
            .field("depth_format", &self.descriptor.depth_format)
            .finish()
    }
}

/// A pipeline cache handle, shared across pipeline builds.
pub struct PipelineCache {
    device: Arc<GraphicsDevice>,
    gpu: GpuPipelineCache,
}

impl PipelineCache {
    pub(crate) fn new(device: Arc<GraphicsDevice>, gpu: GpuPipelineCache) -> Self {
        Self { device, gpu }
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    pub(crate) fn gpu(&self) -> &GpuPipelineCache {
        &self.gpu
    }
}

impl std::fmt::Debug for PipelineCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineCache").finish()
    }
}

/// Descriptor for building a pipeline.
#[derive(Clone)]
pub struct PipelineDescriptor {
    /// The shader providing stages and the pipeline layout.
    pub shader: Arc<Shader>,
    /// The render pass the pipeline targets.
    pub render_pass: Arc<RenderPass>,
    /// Optional pipeline cache.
    pub cache: Option<Arc<PipelineCache>>,
    /// Assembled vertex input layout.
    pub vertex_input: VertexInputLayout,
    /// Debug label.
    pub label: Option<String>,
}

/// A compiled pipeline object.
pub struct Pipeline {
    device: Arc<GraphicsDevice>,
    label: Option<String>,
    vertex_input: VertexInputLayout,
    gpu: GpuPipeline,
}

impl Pipeline {
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        label: Option<String>,
        vertex_input: VertexInputLayout,
        gpu: GpuPipeline,
    ) -> Self {
        Self {
            device,
            label,
            vertex_input,
            gpu,
        }
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Get the pipeline label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The vertex input layout the pipeline was built with.
    pub fn vertex_input(&self) -> &VertexInputLayout {
        &self.vertex_input
    }

    pub(crate) fn gpu(&self) -> &GpuPipeline {
        &self.gpu
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("label", &self.label)
            .field("stride", &self.vertex_input.stride)
            .finish()
    }
}

// Ensure the pipeline handles are Send + Sync
static_assertions::assert_impl_all!(Pipeline: Send, Sync);
static_assertions::assert_impl_all!(RenderPass: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_assembly() {
        let attrs = [
            ShaderAttribute::new(VertexAttributeSemantic::Position, VertexAttributeFormat::Float3),
            ShaderAttribute::new(VertexAttributeSemantic::Normal, VertexAttributeFormat::Float3),
            ShaderAttribute::new(
                VertexAttributeSemantic::TexCoord0,
                VertexAttributeFormat::Float2,
            ),
        ];
        let layout = VertexInputLayout::from_attributes(&attrs);

        assert_eq!(layout.stride, 12 + 12 + 8);
        assert_eq!(layout.attributes.len(), 3);
        for (i, attr) in layout.attributes.iter().enumerate() {
            assert_eq!(attr.location, i as u32);
        }
        assert_eq!(layout.attributes[0].offset, 0);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.attributes[2].offset, 24);
    }

    #[test]
    fn test_empty_attribute_list() {
        let layout = VertexInputLayout::from_attributes(&[]);
        assert_eq!(layout.stride, 0);
        assert!(layout.attributes.is_empty());
    }

    #[test]
    fn test_format_sizes() {
        assert_eq!(VertexAttributeFormat::Float.size(), 4);
        assert_eq!(VertexAttributeFormat::Float4.size(), 16);
        assert_eq!(VertexAttributeFormat::Unorm8x4.size(), 4);
    }
}
