//! End-to-end material flow on the dummy backend.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use materia_graphics::prelude::*;
use materia_graphics::command::RecordedCommand;

#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
struct MvpBlock {
    matrix: [[f32; 4]; 4],
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn make_device() -> Arc<GraphicsDevice> {
    init_logging();
    let instance = GraphicsInstance::new().unwrap();
    instance.create_device().unwrap()
}

fn mvp_material(device: &Arc<GraphicsDevice>) -> Material {
    let shader = device
        .create_shader(
            ShaderDescriptor::new()
                .with_uniform_block("mvp", 0, 0, ShaderStageFlags::VERTEX, 64)
                .with_texture("albedo", 0, 1, ShaderStageFlags::FRAGMENT)
                .with_attribute(
                    VertexAttributeSemantic::Position,
                    VertexAttributeFormat::Float3,
                ),
        )
        .unwrap();
    let pass = device
        .create_render_pass(
            RenderPassDescriptor::new().with_color_format(TextureFormat::Rgba8Unorm),
        )
        .unwrap();
    device
        .create_material(MaterialDescriptor::new(shader, pass).with_label("mvp"))
        .unwrap()
}

#[test]
fn two_draws_share_one_descriptor_set() {
    let device = make_device();
    let mut material = mvp_material(&device);
    let mut encoder = device.create_command_encoder().unwrap();
    let alignment = material.ring().alignment();

    let texture = device
        .create_texture(TextureDescriptor::new_2d(
            64,
            64,
            TextureFormat::Rgba8Unorm,
            TextureUsage::TEXTURE_BINDING,
        ))
        .unwrap();
    material.set_texture("albedo", &texture).unwrap();

    let near = MvpBlock {
        matrix: [[1.0; 4]; 4],
    };
    let far = MvpBlock {
        matrix: [[2.0; 4]; 4],
    };

    material.begin_frame();

    let first = material.begin_object();
    material
        .set_uniform(first, "mvp", bytemuck::bytes_of(&near))
        .unwrap();
    material
        .bind_descriptor_sets(&mut encoder, PipelineBindPoint::Graphics, first)
        .unwrap();
    encoder.draw(3, 1);
    material.end_object();

    let second = material.begin_object();
    material
        .set_uniform(second, "mvp", bytemuck::bytes_of(&far))
        .unwrap();
    material
        .bind_descriptor_sets(&mut encoder, PipelineBindPoint::Graphics, second)
        .unwrap();
    encoder.draw(3, 1);
    material.end_object();

    material.end_frame();

    // One dynamic uniform descriptor write at prepare, one image write: the
    // per-draw variation is carried entirely by the bind-time offsets.
    assert_eq!(material.descriptor_set().write_count(), 2);
    assert_eq!(
        encoder.commands(),
        &[
            RecordedCommand::BindDescriptorSets {
                bind_point: PipelineBindPoint::Graphics,
                first_set: 0,
                set_count: 1,
                dynamic_offsets: vec![0],
            },
            RecordedCommand::Draw {
                vertex_count: 3,
                instance_count: 1,
            },
            RecordedCommand::BindDescriptorSets {
                bind_point: PipelineBindPoint::Graphics,
                first_set: 0,
                set_count: 1,
                dynamic_offsets: vec![alignment as u32],
            },
            RecordedCommand::Draw {
                vertex_count: 3,
                instance_count: 1,
            },
        ]
    );

    // Both blocks are intact in the shared ring.
    let ring = material.ring();
    assert_eq!(ring.buffer().read(0, 64), bytemuck::bytes_of(&near));
    assert_eq!(ring.buffer().read(alignment, 64), bytemuck::bytes_of(&far));
}

#[test]
fn many_materials_one_ring_any_drop_order() {
    let device = make_device();
    let a = mvp_material(&device);
    let b = mvp_material(&device);
    let c = mvp_material(&device);
    assert!(Arc::ptr_eq(a.ring(), b.ring()));
    assert!(Arc::ptr_eq(b.ring(), c.ring()));

    // Drop in creation order, then out of order on a fresh generation.
    drop(a);
    drop(c);
    assert!(device.has_live_uniform_ring());
    drop(b);
    assert!(!device.has_live_uniform_ring());

    let d = mvp_material(&device);
    let e = mvp_material(&device);
    drop(e);
    assert!(device.has_live_uniform_ring());
    drop(d);
    assert!(!device.has_live_uniform_ring());
}

#[test]
fn ring_wraps_under_sustained_load() {
    let device = make_device();
    let mut material = mvp_material(&device);
    let ring = material.ring().clone();
    let per_draw = ring.alignment().max(64);
    let draws_per_wrap = ring.capacity() / per_draw;

    let data = vec![0u8; 64];
    material.begin_frame();
    for _ in 0..=draws_per_wrap {
        let slot = material.begin_object();
        material.set_uniform(slot, "mvp", &data).unwrap();
        material.end_object();
    }
    material.end_frame();

    assert_eq!(ring.wrap_count(), 1);
}

#[test]
fn oversized_uniform_write_is_fatal() {
    let device = make_device();
    let shader = device
        .create_shader(ShaderDescriptor::new().with_uniform_block(
            "huge",
            0,
            0,
            ShaderStageFlags::VERTEX,
            UNIFORM_RING_SIZE + 1,
        ))
        .unwrap();
    let pass = device
        .create_render_pass(
            RenderPassDescriptor::new().with_color_format(TextureFormat::Rgba8Unorm),
        )
        .unwrap();

    // The block's descriptor range exceeds the ring buffer, so the backend
    // range check rejects the material at creation.
    let result = device.create_material(MaterialDescriptor::new(shader, pass));
    assert!(result.is_err());
}
