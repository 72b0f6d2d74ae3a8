//! GPU resource wrappers.
//!
//! Thin `Arc`-friendly handles over backend resources, plus the shared
//! uniform ring that materials stage per-draw data through.

mod buffer;
mod ring_buffer;
mod sampler;
mod texture;

pub use buffer::Buffer;
pub use ring_buffer::{RingBuffer, UniformRing, UNIFORM_RING_SIZE};
pub use sampler::Sampler;
pub use texture::Texture;
