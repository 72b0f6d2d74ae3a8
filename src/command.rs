//! Command recording.
//!
//! [`CommandEncoder`] is a thin recording surface: materials bind their
//! pipeline and descriptor state into it and draws are issued through it.
//! On the dummy backend every command is kept so tests can inspect exactly
//! what was bound, with which dynamic offsets, in which order.

use std::sync::Arc;

#[cfg(feature = "vulkan-backend")]
use ash::vk;

use crate::backend::{GpuCommandEncoder, GpuDescriptorSet, GpuPipelineLayout};
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::pipeline::Pipeline;

/// Where descriptor sets are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineBindPoint {
    /// Graphics pipeline.
    Graphics,
    /// Compute pipeline.
    Compute,
}

/// A command captured by the dummy backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCommand {
    /// A pipeline bind.
    BindPipeline {
        /// Label of the bound pipeline, if any.
        label: Option<String>,
    },
    /// A descriptor-set bind with its positional dynamic offsets.
    BindDescriptorSets {
        /// Graphics or compute.
        bind_point: PipelineBindPoint,
        /// First set index bound.
        first_set: u32,
        /// Number of sets bound.
        set_count: u32,
        /// Dynamic offsets, in (set, binding) order of the dynamic bindings.
        dynamic_offsets: Vec<u32>,
    },
    /// A non-indexed draw.
    Draw {
        /// Vertices per instance.
        vertex_count: u32,
        /// Instance count.
        instance_count: u32,
    },
    /// An indexed draw.
    DrawIndexed {
        /// Indices per instance.
        index_count: u32,
        /// Instance count.
        instance_count: u32,
    },
}

/// Records binding and draw commands.
pub struct CommandEncoder {
    device: Arc<GraphicsDevice>,
    gpu: GpuCommandEncoder,
}

impl CommandEncoder {
    pub(crate) fn new(device: Arc<GraphicsDevice>, gpu: GpuCommandEncoder) -> Self {
        Self { device, gpu }
    }

    /// The device this encoder records for.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Bind a pipeline.
    pub fn bind_pipeline(&mut self, pipeline: &Pipeline) {
        match &mut self.gpu {
            GpuCommandEncoder::Dummy { commands } => {
                commands.push(RecordedCommand::BindPipeline {
                    label: pipeline.label().map(str::to_string),
                });
            }
            #[cfg(feature = "vulkan-backend")]
            GpuCommandEncoder::Vulkan { device, cmd } => {
                if let crate::backend::GpuPipeline::Vulkan { pipeline, .. } = pipeline.gpu() {
                    unsafe {
                        device.cmd_bind_pipeline(*cmd, vk::PipelineBindPoint::GRAPHICS, *pipeline);
                    }
                }
            }
        }
    }

    /// Bind every descriptor set of `sets` with the given dynamic offsets.
    ///
    /// The offsets are positional: one per dynamic uniform binding, ordered
    /// by ascending (set, binding).
    pub(crate) fn bind_descriptor_sets(
        &mut self,
        layout: &GpuPipelineLayout,
        sets: &GpuDescriptorSet,
        bind_point: PipelineBindPoint,
        dynamic_offsets: &[u32],
    ) -> Result<(), GraphicsError> {
        match (&mut self.gpu, sets) {
            (GpuCommandEncoder::Dummy { commands }, GpuDescriptorSet::Dummy { .. }) => {
                commands.push(RecordedCommand::BindDescriptorSets {
                    bind_point,
                    first_set: 0,
                    set_count: 1,
                    dynamic_offsets: dynamic_offsets.to_vec(),
                });
                Ok(())
            }
            #[cfg(feature = "vulkan-backend")]
            (
                GpuCommandEncoder::Vulkan { device, cmd },
                GpuDescriptorSet::Vulkan {
                    sets: vk_sets, ..
                },
            ) => {
                let GpuPipelineLayout::Vulkan {
                    layout: vk_layout, ..
                } = layout
                else {
                    return Err(GraphicsError::InvalidParameter(
                        "pipeline layout belongs to a different backend".to_string(),
                    ));
                };
                let vk_bind_point = match bind_point {
                    PipelineBindPoint::Graphics => vk::PipelineBindPoint::GRAPHICS,
                    PipelineBindPoint::Compute => vk::PipelineBindPoint::COMPUTE,
                };
                unsafe {
                    device.cmd_bind_descriptor_sets(
                        *cmd,
                        vk_bind_point,
                        *vk_layout,
                        0,
                        vk_sets,
                        dynamic_offsets,
                    );
                }
                Ok(())
            }
            #[allow(unreachable_patterns)]
            _ => {
                let _ = layout;
                Err(GraphicsError::InvalidParameter(
                    "descriptor set belongs to a different backend".to_string(),
                ))
            }
        }
    }

    /// Record a non-indexed draw.
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        match &mut self.gpu {
            GpuCommandEncoder::Dummy { commands } => {
                commands.push(RecordedCommand::Draw {
                    vertex_count,
                    instance_count,
                });
            }
            #[cfg(feature = "vulkan-backend")]
            GpuCommandEncoder::Vulkan { device, cmd } => unsafe {
                device.cmd_draw(*cmd, vertex_count, instance_count, 0, 0);
            },
        }
    }

    /// Record an indexed draw.
    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        match &mut self.gpu {
            GpuCommandEncoder::Dummy { commands } => {
                commands.push(RecordedCommand::DrawIndexed {
                    index_count,
                    instance_count,
                });
            }
            #[cfg(feature = "vulkan-backend")]
            GpuCommandEncoder::Vulkan { device, cmd } => unsafe {
                device.cmd_draw_indexed(*cmd, index_count, instance_count, 0, 0, 0);
            },
        }
    }

    /// Commands recorded so far (dummy backend; empty otherwise).
    pub fn commands(&self) -> &[RecordedCommand] {
        match &self.gpu {
            GpuCommandEncoder::Dummy { commands } => commands,
            #[cfg(feature = "vulkan-backend")]
            GpuCommandEncoder::Vulkan { .. } => &[],
        }
    }
}

impl std::fmt::Debug for CommandEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEncoder")
            .field("gpu", &self.gpu)
            .finish()
    }
}
