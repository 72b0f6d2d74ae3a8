//! Descriptor sets.
//!
//! A [`DescriptorSet`] wraps the backend allocation for all set indices of
//! one shader's layout and resolves parameter names to (set, binding) slots
//! before issuing writes.

use std::sync::Arc;

use static_assertions::assert_impl_all;

use crate::backend::{DescriptorWrite, GpuDescriptorSet};
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::resources::{Buffer, Texture};
use crate::shader::{DescriptorType, Shader};

/// Descriptor sets allocated against a shader's pipeline layout.
pub struct DescriptorSet {
    device: Arc<GraphicsDevice>,
    shader: Arc<Shader>,
    gpu: GpuDescriptorSet,
}

assert_impl_all!(DescriptorSet: Send, Sync);

impl DescriptorSet {
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        shader: Arc<Shader>,
    ) -> Result<Self, GraphicsError> {
        let gpu = device
            .backend()
            .allocate_descriptor_set(shader.pipeline_layout())?;
        Ok(Self {
            device,
            shader,
            gpu,
        })
    }

    /// The shader whose layout this set was allocated for.
    pub fn shader(&self) -> &Arc<Shader> {
        &self.shader
    }

    /// Bind a buffer region to the named uniform block.
    pub fn write_uniform_buffer(
        &self,
        name: &str,
        buffer: &Buffer,
        offset: u64,
        range: u64,
    ) -> Result<(), GraphicsError> {
        let (_, info) = self
            .shader
            .uniform_blocks()
            .iter()
            .find(|(block, _)| block == name)
            .ok_or_else(|| {
                GraphicsError::InvalidParameter(format!("unknown uniform block \"{name}\""))
            })?;
        self.device.backend().update_descriptor_set(
            &self.gpu,
            DescriptorWrite::UniformBuffer {
                set: info.slot.set,
                binding: info.slot.binding,
                buffer: buffer.gpu(),
                offset,
                range,
            },
        )
    }

    /// Bind a texture to the named combined image sampler.
    pub fn write_image(&self, name: &str, texture: &Texture) -> Result<(), GraphicsError> {
        let info = self.texture_param(name, DescriptorType::CombinedImageSampler)?;
        self.device.backend().update_descriptor_set(
            &self.gpu,
            DescriptorWrite::Image {
                set: info.0,
                binding: info.1,
                texture: texture.gpu(),
            },
        )
    }

    /// Bind a texture to the named input attachment.
    pub fn write_input_attachment(
        &self,
        name: &str,
        texture: &Texture,
    ) -> Result<(), GraphicsError> {
        let info = self.texture_param(name, DescriptorType::InputAttachment)?;
        self.device.backend().update_descriptor_set(
            &self.gpu,
            DescriptorWrite::InputAttachment {
                set: info.0,
                binding: info.1,
                texture: texture.gpu(),
            },
        )
    }

    fn texture_param(
        &self,
        name: &str,
        expected: DescriptorType,
    ) -> Result<(u32, u32), GraphicsError> {
        let (_, info) = self
            .shader
            .textures()
            .iter()
            .find(|(param, _)| param == name)
            .ok_or_else(|| {
                GraphicsError::InvalidParameter(format!("unknown texture parameter \"{name}\""))
            })?;
        if info.descriptor_type != expected {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture parameter \"{name}\" is {:?}, not {expected:?}",
                info.descriptor_type
            )));
        }
        Ok((info.slot.set, info.slot.binding))
    }

    /// Number of descriptor writes issued against this set.
    pub fn write_count(&self) -> usize {
        self.gpu.write_count()
    }

    pub(crate) fn gpu(&self) -> &GpuDescriptorSet {
        &self.gpu
    }
}

impl std::fmt::Debug for DescriptorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorSet")
            .field("shader", &self.shader.label())
            .field("writes", &self.write_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::GraphicsInstance;
    use crate::shader::{ShaderDescriptor, ShaderStageFlags};
    use crate::types::{BufferDescriptor, BufferUsage, TextureDescriptor, TextureFormat, TextureUsage};

    fn test_device() -> Arc<GraphicsDevice> {
        let instance = GraphicsInstance::new().unwrap();
        instance.create_device().unwrap()
    }

    #[test]
    fn writes_resolve_names_to_slots() {
        let device = test_device();
        let shader = device
            .create_shader(
                ShaderDescriptor::new()
                    .with_uniform_block("mvp", 0, 0, ShaderStageFlags::VERTEX, 64)
                    .with_texture("albedo", 0, 1, ShaderStageFlags::FRAGMENT),
            )
            .unwrap();
        let set = DescriptorSet::new(device.clone(), shader).unwrap();
        let buffer = device
            .create_buffer(BufferDescriptor::new(4096, BufferUsage::UNIFORM))
            .unwrap();
        let texture = device
            .create_texture(TextureDescriptor::new_2d(
                4,
                4,
                TextureFormat::Rgba8Unorm,
                TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap();

        set.write_uniform_buffer("mvp", &buffer, 0, 64).unwrap();
        set.write_image("albedo", &texture).unwrap();
        assert_eq!(set.write_count(), 2);

        assert!(set.write_uniform_buffer("nope", &buffer, 0, 64).is_err());
        assert!(set.write_image("mvp", &texture).is_err());
        assert_eq!(set.write_count(), 2);
    }

    #[test]
    fn input_attachment_type_is_checked() {
        let device = test_device();
        let shader = device
            .create_shader(
                ShaderDescriptor::new()
                    .with_input_attachment("depth_input", 1, 0, ShaderStageFlags::FRAGMENT),
            )
            .unwrap();
        let set = DescriptorSet::new(device.clone(), shader).unwrap();
        let texture = device
            .create_texture(TextureDescriptor::new_2d(
                4,
                4,
                TextureFormat::Depth32Float,
                TextureUsage::INPUT_ATTACHMENT,
            ))
            .unwrap();

        set.write_input_attachment("depth_input", &texture).unwrap();
        assert!(set.write_image("depth_input", &texture).is_err());
        assert_eq!(set.write_count(), 1);
    }
}
