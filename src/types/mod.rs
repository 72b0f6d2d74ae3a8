//! Value types shared across the crate: resource descriptors, usage flags
//! and texture formats.

mod buffer;
mod sampler;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use sampler::{AddressMode, FilterMode, SamplerDescriptor};
pub use texture::{Extent3d, TextureDescriptor, TextureFormat, TextureUsage};
