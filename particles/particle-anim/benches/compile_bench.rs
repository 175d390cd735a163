use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use glam::{Vec3, Vec4};
use particle_anim::geometry::{GeometryIdAllocator, Mesh};
use particle_anim::nodes::{
    AccelerationNode, BillboardNode, ColorNode, PositionNode, ScaleNode, VelocityNode,
};
use particle_anim::{
    AnimationRegisterCache, ColorTransform, Geometry, ParticleAnimationSet, ParticleGeometryBuilder,
    ParticlePropertiesMode, PassInfo, ShaderProfile,
};

fn create_test_set() -> ParticleAnimationSet {
    let local = ParticlePropertiesMode::LocalStatic;
    let mut set = ParticleAnimationSet::new(true, true, false);
    set.add_node(BillboardNode::new()).unwrap();
    set.add_node(PositionNode::local(local)).unwrap();
    set.add_node(VelocityNode::local(local)).unwrap();
    set.add_node(AccelerationNode::global(Vec3::new(0.0, -9.8, 0.0)))
        .unwrap();
    set.add_node(ScaleNode::local(local, false, false)).unwrap();
    set.add_node(ColorNode::global(
        true,
        true,
        ColorTransform::default(),
        ColorTransform::new(Vec4::ZERO, Vec4::ZERO),
    ))
    .unwrap();
    set.set_initializer(|properties| {
        let index = properties.index as f32;
        properties.position = Some(Vec3::new(index, 0.0, 0.0));
        properties.velocity = Some(Vec3::Y);
        properties.scale = Some(Vec4::new(1.0, 2.0, 0.0, 0.0));
    });
    set
}

fn bench_vertex_code(c: &mut Criterion) {
    let set = create_test_set();
    let pass = PassInfo {
        vertex_attributes: 2,
        vertex_constants: 4,
        need_fragment_animation: true,
        ..PassInfo::default()
    };

    c.bench_function("compile_vertex_code", |b| {
        let mut cache = AnimationRegisterCache::default();
        b.iter(|| {
            let _code = set
                .vertex_code(&mut cache, &pass, ShaderProfile::Standard, &["va0"], &["vt0"])
                .unwrap();
            set.done_code(&mut cache).unwrap();
        })
    });
}

fn bench_generate_data(c: &mut Criterion) {
    let mut ids = GeometryIdAllocator::new();
    let mut builder = ParticleGeometryBuilder::new();
    for _ in 0..10_000 {
        builder.add_particle(4);
    }
    let geometry: Arc<Geometry> = Arc::new(builder.build(&mut ids).unwrap().into());
    let mut set = create_test_set();

    c.bench_function("generate_animation_data", |b| {
        b.iter(|| {
            let mut mesh = Mesh::new(Arc::clone(&geometry));
            mesh.share_animation_geometry = false;
            set.generate_animation_data(&mut mesh).unwrap();
        })
    });
}

criterion_group!(benches, bench_vertex_code, bench_generate_data);
criterion_main!(benches);
