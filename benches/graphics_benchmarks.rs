use criterion::{criterion_group, criterion_main, Criterion};
use materia_graphics::prelude::*;
use materia_graphics::RingBuffer;

fn bench_ring_allocate(c: &mut Criterion) {
    c.bench_function("ring_allocate_64b", |b| {
        let mut ring = RingBuffer::new(UNIFORM_RING_SIZE, 256);
        b.iter(|| ring.allocate(64).unwrap());
    });
}

fn bench_set_uniform(c: &mut Criterion) {
    let instance = GraphicsInstance::new().unwrap();
    let device = instance.create_device().unwrap();
    let shader = device
        .create_shader(
            ShaderDescriptor::new().with_uniform_block("mvp", 0, 0, ShaderStageFlags::VERTEX, 64),
        )
        .unwrap();
    let pass = device
        .create_render_pass(
            RenderPassDescriptor::new().with_color_format(TextureFormat::Rgba8Unorm),
        )
        .unwrap();
    let mut material = device
        .create_material(MaterialDescriptor::new(shader, pass))
        .unwrap();
    let data = [0u8; 64];

    c.bench_function("material_set_uniform_64b", |b| {
        b.iter(|| {
            material.begin_frame();
            let slot = material.begin_object();
            material.set_uniform(slot, "mvp", &data).unwrap();
            material.end_object();
            material.end_frame();
        });
    });
}

fn bench_bind(c: &mut Criterion) {
    let instance = GraphicsInstance::new().unwrap();
    let device = instance.create_device().unwrap();
    let shader = device
        .create_shader(
            ShaderDescriptor::new().with_uniform_block("mvp", 0, 0, ShaderStageFlags::VERTEX, 64),
        )
        .unwrap();
    let pass = device
        .create_render_pass(
            RenderPassDescriptor::new().with_color_format(TextureFormat::Rgba8Unorm),
        )
        .unwrap();
    let mut material = device
        .create_material(MaterialDescriptor::new(shader, pass))
        .unwrap();
    let mut encoder = device.create_command_encoder().unwrap();

    material.begin_frame();
    let slot = material.begin_object();
    material.set_uniform(slot, "mvp", &[0u8; 64]).unwrap();

    c.bench_function("material_bind", |b| {
        b.iter(|| {
            material
                .bind_descriptor_sets(&mut encoder, PipelineBindPoint::Graphics, slot)
                .unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_ring_allocate,
    bench_set_uniform,
    bench_bind
);
criterion_main!(benches);
