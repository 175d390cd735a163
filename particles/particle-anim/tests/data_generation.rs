//! Integration tests for per-particle vertex data generation

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use glam::{Vec3, Vec4};
use particle_anim::geometry::{GeometryIdAllocator, Mesh};
use particle_anim::nodes::{FollowNode, PositionNode, ScaleNode, VelocityNode};
use particle_anim::{
    AnimationError, Geometry, ParticleAnimationSet, ParticleGeometry, ParticleGeometryBuilder,
    ParticlePropertiesMode, TIME_NODE_ID,
};
use pretty_assertions::assert_eq;
use test_case::test_case;

const TIME_RECORD: [f32; 4] = [0.0, 1000.0, 1000.1, 0.001];

fn particle_geometry(
    ids: &mut GeometryIdAllocator,
    max_vertices: usize,
    particles: &[usize],
) -> Arc<Geometry> {
    let mut builder = ParticleGeometryBuilder::with_max_vertices(max_vertices);
    for &vertices in particles {
        builder.add_particle(vertices);
    }
    Arc::new(builder.build(ids).unwrap().into())
}

fn scale_set() -> ParticleAnimationSet {
    let mut set = ParticleAnimationSet::default();
    set.add_node(ScaleNode::local(ParticlePropertiesMode::LocalStatic, false, false))
        .unwrap();
    set.set_initializer(|properties| {
        let index = properties.index as f32;
        properties.scale = Some(Vec4::new(index, index + 2.0, 0.0, 0.0));
    });
    set
}

fn particles(geometry: &Geometry) -> &ParticleGeometry {
    geometry.as_particle().unwrap()
}

#[test]
fn test_three_quads_with_two_float_node() {
    let mut ids = GeometryIdAllocator::new();
    let mut mesh = Mesh::new(particle_geometry(&mut ids, 65535, &[4, 4, 4]));
    let mut set = scale_set();
    set.generate_animation_data(&mut mesh).unwrap();

    // The time node joins the record ahead of the scale node
    assert_eq!(set.total_record_stride(), 4 + 2);
    let data = mesh.animation_geometry(0).unwrap();
    assert_eq!(data.vertex_data().len(), 3 * 4 * 6);

    for vertex in 0..12 {
        let particle = (vertex / 4) as f32;
        let record = data.vertex(vertex).unwrap();
        let time = &record[..4];
        assert!(
            time.iter()
                .zip(TIME_RECORD)
                .all(|(actual, expected)| (actual - expected).abs() < 1e-4),
            "vertex {vertex}: {time:?}"
        );
        assert_eq!(&record[4..], &[particle, 2.0]);
    }
}

#[test_case(1, 1 ; "single point")]
#[test_case(3, 4 ; "quads")]
#[test_case(5, 6 ; "hexagons")]
#[test_case(40, 3 ; "many triangles split across partitions")]
fn test_every_vertex_of_a_particle_carries_its_data(count: usize, vertices: usize) {
    let mut ids = GeometryIdAllocator::new();
    let shape = vec![vertices; count];
    let geometry = particle_geometry(&mut ids, 16, &shape);
    let mut mesh = Mesh::new(Arc::clone(&geometry));
    let mut set = scale_set();
    set.generate_animation_data(&mut mesh).unwrap();

    for run in particles(&geometry).runs() {
        let data = mesh.animation_geometry(run.partition).unwrap();
        for vertex in run.first_vertex..run.first_vertex + run.num_vertices {
            assert_eq!(
                &data.vertex(vertex).unwrap()[4..],
                &[run.particle_index as f32, 2.0],
                "particle {} vertex {vertex}",
                run.particle_index
            );
        }
    }
}

#[test]
fn test_missing_initializer_allocates_nothing() {
    let mut ids = GeometryIdAllocator::new();
    let mut mesh = Mesh::new(particle_geometry(&mut ids, 65535, &[4, 4, 4]));
    let mut set = ParticleAnimationSet::default();
    set.add_node(ScaleNode::local(ParticlePropertiesMode::LocalStatic, false, false))
        .unwrap();

    assert_eq!(
        set.generate_animation_data(&mut mesh),
        Err(AnimationError::MissingInitializer)
    );
    assert!(mesh.animation_geometry(0).is_none());
}

#[test]
fn test_missing_property_names_node() {
    let mut ids = GeometryIdAllocator::new();
    let mut mesh = Mesh::new(particle_geometry(&mut ids, 65535, &[4]));
    let mut set = ParticleAnimationSet::default();
    set.add_node(VelocityNode::local(ParticlePropertiesMode::LocalStatic))
        .unwrap();
    set.set_initializer(|_| {});

    assert_eq!(
        set.generate_animation_data(&mut mesh),
        Err(AnimationError::MissingProperty {
            node: "velocity",
            property: "velocity",
        })
    );
}

#[test]
fn test_shared_generation_is_idempotent() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let mut set = ParticleAnimationSet::default();
    set.add_node(PositionNode::local(ParticlePropertiesMode::LocalStatic))
        .unwrap();
    set.set_initializer(move |properties| {
        counter.set(counter.get() + 1);
        properties.position = Some(Vec3::Y);
    });

    let mut ids = GeometryIdAllocator::new();
    let geometry = particle_geometry(&mut ids, 65535, &[4, 4, 4]);
    let mut mesh = Mesh::new(Arc::clone(&geometry));
    set.generate_animation_data(&mut mesh).unwrap();
    let first = Arc::clone(mesh.animation_geometry(0).unwrap());
    assert_eq!(calls.get(), 3);

    set.generate_animation_data(&mut mesh).unwrap();
    assert!(Arc::ptr_eq(&first, mesh.animation_geometry(0).unwrap()));
    assert_eq!(calls.get(), 3);

    // A second mesh over the same geometry reuses the buffer as well
    let mut other = Mesh::new(geometry);
    set.generate_animation_data(&mut other).unwrap();
    assert!(Arc::ptr_eq(&first, other.animation_geometry(0).unwrap()));
    assert_eq!(calls.get(), 3);
}

#[test]
fn test_unshared_mesh_regenerates() {
    let mut ids = GeometryIdAllocator::new();
    let mut mesh = Mesh::new(particle_geometry(&mut ids, 65535, &[4, 4]));
    mesh.share_animation_geometry = false;
    let mut set = scale_set();

    set.generate_animation_data(&mut mesh).unwrap();
    let first = Arc::clone(mesh.animation_geometry(0).unwrap());
    set.generate_animation_data(&mut mesh).unwrap();
    let second = mesh.animation_geometry(0).unwrap();
    assert!(!Arc::ptr_eq(&first, second));
    assert_eq!(first.vertex_data(), second.vertex_data());
}

#[test]
fn test_particle_spanning_partitions() {
    let mut ids = GeometryIdAllocator::new();
    let geometry = particle_geometry(&mut ids, 8, &[10, 4]);
    assert_eq!(particles(&geometry).partitions().len(), 2);
    let mut mesh = Mesh::new(Arc::clone(&geometry));
    let mut set = scale_set();
    set.generate_animation_data(&mut mesh).unwrap();

    let head = mesh.animation_geometry(0).unwrap();
    let tail = mesh.animation_geometry(1).unwrap();
    assert_eq!(head.num_vertices(), 8);
    assert_eq!(tail.num_vertices(), 6);
    for vertex in 0..8 {
        assert_eq!(&head.vertex(vertex).unwrap()[4..], &[0.0, 2.0]);
    }
    for vertex in 0..2 {
        assert_eq!(&tail.vertex(vertex).unwrap()[4..], &[0.0, 2.0]);
    }
    for vertex in 2..6 {
        assert_eq!(&tail.vertex(vertex).unwrap()[4..], &[1.0, 2.0]);
    }
}

#[test]
fn test_layout_change_drops_shared_buffers() {
    let mut ids = GeometryIdAllocator::new();
    let mut mesh = Mesh::new(particle_geometry(&mut ids, 65535, &[4]));
    let mut set = scale_set();
    set.generate_animation_data(&mut mesh).unwrap();
    let first = Arc::clone(mesh.animation_geometry(0).unwrap());

    // Any new node drops the set's buffers, even one without record data
    set.add_node(VelocityNode::global(Vec3::X)).unwrap();
    set.generate_animation_data(&mut mesh).unwrap();
    let second = Arc::clone(mesh.animation_geometry(0).unwrap());
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.vertex_data(), second.vertex_data());

    set.add_node(PositionNode::local(ParticlePropertiesMode::LocalStatic))
        .unwrap();
    set.set_initializer(|properties| {
        properties.scale = Some(Vec4::ONE);
        properties.position = Some(Vec3::Z);
    });
    set.generate_animation_data(&mut mesh).unwrap();
    let data = mesh.animation_geometry(0).unwrap();
    assert!(!Arc::ptr_eq(&second, data));
    assert_eq!(data.stride(), 9);
}

#[test]
fn test_invalidated_geometry_is_regenerated() {
    let mut ids = GeometryIdAllocator::new();
    let geometry = particle_geometry(&mut ids, 65535, &[4, 4]);
    let mut mesh = Mesh::new(Arc::clone(&geometry));
    let mut set = scale_set();
    set.generate_animation_data(&mut mesh).unwrap();
    let first = Arc::clone(mesh.animation_geometry(0).unwrap());

    set.invalidate_geometry(&geometry);
    let mut other = Mesh::new(geometry);
    set.generate_animation_data(&mut other).unwrap();
    assert!(!Arc::ptr_eq(&first, other.animation_geometry(0).unwrap()));
}

#[test]
fn test_replaced_mesh_geometry_starts_empty() {
    let mut ids = GeometryIdAllocator::new();
    let mut mesh = Mesh::new(particle_geometry(&mut ids, 65535, &[4]));
    let mut set = scale_set();
    set.generate_animation_data(&mut mesh).unwrap();

    mesh.set_geometry(particle_geometry(&mut ids, 65535, &[3, 3]));
    assert!(mesh.animation_geometry(0).is_none());
    set.generate_animation_data(&mut mesh).unwrap();
    assert_eq!(mesh.animation_geometry(0).unwrap().num_vertices(), 6);
}

#[test]
fn test_dynamic_values_follow_records() {
    let mut set = ParticleAnimationSet::new(true, false, false);
    let follow = set.add_node(FollowNode::new()).unwrap();
    set.set_initializer(|properties| {
        properties.start_time = properties.index as f32 * 10.0;
    });
    let mut ids = GeometryIdAllocator::new();
    let mut mesh = Mesh::new(particle_geometry(&mut ids, 65535, &[4, 4]));
    set.generate_animation_data(&mut mesh).unwrap();

    set.write_dynamic_values(&mut mesh, follow, |record, out| {
        out.copy_from_slice(&[record.index as f32, record.start_time, 0.0]);
    })
    .unwrap();

    let buffer = mesh.dynamic_buffer(0).unwrap();
    assert!(buffer.dirty);
    assert_eq!(buffer.stride(), 3);
    assert_eq!(buffer.vertex(0), Some(&[0.0, 0.0, 0.0][..]));
    assert_eq!(buffer.vertex(7), Some(&[1.0, 10.0, 0.0][..]));

    // The static buffer only carries the time node
    let data = mesh.animation_geometry(0).unwrap();
    assert_eq!(data.stride(), 4);
    assert_eq!(data.vertex(5).unwrap()[0], 10.0);
}

#[test]
fn test_dynamic_values_need_a_dynamic_node() {
    let mut set = ParticleAnimationSet::default();
    let follow = set.add_node(FollowNode::new()).unwrap();
    set.set_initializer(|_| {});
    let mut ids = GeometryIdAllocator::new();
    let mut mesh = Mesh::new(particle_geometry(&mut ids, 65535, &[4]));

    assert!(matches!(
        set.write_dynamic_values(&mut mesh, follow, |_, _| {}),
        Err(AnimationError::GeometryMismatch(_))
    ));

    set.generate_animation_data(&mut mesh).unwrap();
    assert_eq!(
        set.write_dynamic_values(&mut mesh, TIME_NODE_ID, |_, _| {}),
        Err(AnimationError::UnknownNode(TIME_NODE_ID))
    );
}
