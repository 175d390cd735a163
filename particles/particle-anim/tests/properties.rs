//! Property tests for node ordering, record layout and replication

use std::sync::Arc;

use glam::Vec3;
use particle_anim::geometry::{GeometryIdAllocator, Mesh};
use particle_anim::nodes::{
    BillboardNode, ColorNode, FollowNode, PositionNode, ScaleNode, UvAxis, UvNode, VelocityNode,
};
use particle_anim::{
    NodeId, ParticleAnimationSet, ParticleGeometryBuilder, ParticleNode, ParticlePropertiesMode,
};
use proptest::prelude::*;

const LOCAL: ParticlePropertiesMode = ParticlePropertiesMode::LocalStatic;

fn add(set: &mut ParticleAnimationSet, kind: u8) -> NodeId {
    let id = match kind {
        0 => set.add_node(PositionNode::local(LOCAL)),
        1 => set.add_node(VelocityNode::local(LOCAL)),
        2 => set.add_node(ScaleNode::local(LOCAL, false, false)),
        3 => set.add_node(BillboardNode::new()),
        4 => set.add_node(FollowNode::new()),
        5 => set.add_node(ColorNode::local(LOCAL, true, false)),
        _ => set.add_node(UvNode::local(LOCAL, UvAxis::V)),
    };
    id.unwrap()
}

/// Nodes sorted by id, i.e. by insertion order
fn by_id<'a>(nodes: impl Iterator<Item = &'a dyn ParticleNode>) -> Vec<&'a dyn ParticleNode> {
    let mut nodes: Vec<_> = nodes.collect();
    nodes.sort_by_key(|node| node.info().id());
    nodes
}

proptest! {
    #[test]
    fn test_nodes_ordered_by_priority_then_insertion(kinds in prop::collection::vec(0u8..7, 0..16)) {
        let mut set = ParticleAnimationSet::default();
        for &kind in &kinds {
            add(&mut set, kind);
        }

        let order: Vec<(i32, NodeId)> = set
            .nodes()
            .map(|node| (node.info().priority(), node.info().id()))
            .collect();
        prop_assert_eq!(order.len(), if kinds.is_empty() { 0 } else { kinds.len() + 1 });
        for pair in order.windows(2) {
            prop_assert!(pair[0] < pair[1], "{:?}", order);
        }
    }

    #[test]
    fn test_offsets_contiguous_in_insertion_order(kinds in prop::collection::vec(0u8..7, 0..16)) {
        let mut set = ParticleAnimationSet::default();
        for &kind in &kinds {
            add(&mut set, kind);
        }

        let mut expected = 0;
        for node in by_id(set.static_nodes()) {
            prop_assert_eq!(node.info().data_offset(), expected);
            expected += node.info().data_length();
        }
        prop_assert_eq!(set.total_record_stride(), expected);

        let mut expected = 0;
        for node in by_id(set.dynamic_nodes()) {
            prop_assert_eq!(node.info().dynamic_offset(), expected);
            expected += node.info().data_length();
        }
        prop_assert_eq!(set.dynamic_stride(), expected);
    }

    #[test]
    fn test_particle_data_replicated_over_runs(
        shape in prop::collection::vec(1usize..10, 1..20),
        max_vertices in 4usize..32,
    ) {
        let mut ids = GeometryIdAllocator::new();
        let mut builder = ParticleGeometryBuilder::with_max_vertices(max_vertices);
        for &vertices in &shape {
            builder.add_particle(vertices);
        }
        let geometry = builder.build(&mut ids).unwrap();
        let runs = geometry.runs().to_vec();
        let mut mesh = Mesh::new(Arc::new(geometry.into()));

        let mut set = ParticleAnimationSet::default();
        set.add_node(PositionNode::local(LOCAL)).unwrap();
        set.set_initializer(|properties| {
            properties.position = Some(Vec3::new(properties.index as f32, 1.0, -1.0));
        });
        set.generate_animation_data(&mut mesh).unwrap();

        let mut covered = vec![0usize; shape.len()];
        for run in &runs {
            let data = mesh.animation_geometry(run.partition).unwrap();
            for vertex in run.first_vertex..run.first_vertex + run.num_vertices {
                let record = data.vertex(vertex).unwrap();
                prop_assert_eq!(&record[4..], &[run.particle_index as f32, 1.0, -1.0][..]);
            }
            covered[run.particle_index] += run.num_vertices;
        }
        prop_assert_eq!(covered, shape);
    }
}
