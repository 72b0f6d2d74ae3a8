//! Materials: shader parameters bound per draw call.

mod material;

pub use material::{DrawSlot, Material, MaterialDescriptor};
