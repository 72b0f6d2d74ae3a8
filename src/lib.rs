//! Thin material layer over a Vulkan-style GPU backend.
//!
//! A [`Material`](materials::Material) binds the parameters a shader
//! declares (uniform blocks, textures, input attachments) to per-draw
//! values. Uniform data for every draw of every material is staged into one
//! shared ring-allocated buffer per device, and each draw addresses its
//! slice of that buffer through dynamic descriptor offsets supplied at bind
//! time. One descriptor set per material serves any number of draw calls
//! per frame.
//!
//! # Example
//!
//! ```
//! use materia_graphics::prelude::*;
//!
//! # fn main() -> Result<(), GraphicsError> {
//! let instance = GraphicsInstance::new()?;
//! let device = instance.create_device()?;
//!
//! let shader = device.create_shader(
//!     ShaderDescriptor::new()
//!         .with_uniform_block("mvp", 0, 0, ShaderStageFlags::VERTEX, 64),
//! )?;
//! let pass = device.create_render_pass(
//!     RenderPassDescriptor::new().with_color_format(TextureFormat::Rgba8Unorm),
//! )?;
//! let mut material = device.create_material(MaterialDescriptor::new(shader, pass))?;
//! let mut encoder = device.create_command_encoder()?;
//!
//! material.begin_frame();
//! let slot = material.begin_object();
//! material.set_uniform(slot, "mvp", &[0u8; 64])?;
//! material.bind_descriptor_sets(&mut encoder, PipelineBindPoint::Graphics, slot)?;
//! encoder.draw(3, 1);
//! material.end_object();
//! material.end_frame();
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod command;
pub mod descriptors;
pub mod device;
pub mod error;
pub mod instance;
pub mod materials;
pub mod pipeline;
pub mod resources;
pub mod shader;
pub mod types;

pub use command::{CommandEncoder, PipelineBindPoint};
pub use descriptors::DescriptorSet;
pub use device::{DeviceCapabilities, GraphicsDevice};
pub use error::GraphicsError;
pub use instance::GraphicsInstance;
pub use materials::{DrawSlot, Material, MaterialDescriptor};
pub use resources::{Buffer, RingBuffer, Sampler, Texture, UniformRing, UNIFORM_RING_SIZE};
pub use shader::{Shader, ShaderDescriptor, ShaderStageFlags};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics system on the default backend.
///
/// Shorthand for [`GraphicsInstance::new`].
pub fn init() -> Result<std::sync::Arc<GraphicsInstance>, GraphicsError> {
    log::info!("Initializing materia-graphics {VERSION}");
    GraphicsInstance::new()
}

/// Commonly used types, re-exported for glob import.
pub mod prelude {
    pub use crate::command::{CommandEncoder, PipelineBindPoint};
    pub use crate::device::{DeviceCapabilities, GraphicsDevice};
    pub use crate::error::GraphicsError;
    pub use crate::instance::GraphicsInstance;
    pub use crate::materials::{DrawSlot, Material, MaterialDescriptor};
    pub use crate::pipeline::{
        Pipeline, PipelineCache, RenderPass, RenderPassDescriptor, VertexAttributeFormat,
        VertexAttributeSemantic, VertexInputLayout,
    };
    pub use crate::resources::{Buffer, Sampler, Texture, UniformRing, UNIFORM_RING_SIZE};
    pub use crate::shader::{
        BindingSlot, DescriptorType, Shader, ShaderDescriptor, ShaderSource, ShaderStage,
        ShaderStageFlags,
    };
    pub use crate::types::{
        AddressMode, BufferDescriptor, BufferUsage, Extent3d, FilterMode, SamplerDescriptor,
        TextureDescriptor, TextureFormat, TextureUsage,
    };
}
