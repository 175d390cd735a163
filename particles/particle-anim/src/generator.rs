//! Per-particle data generation
//!
//! Runs the user initializer once per particle, asks every static node for
//! its values and replicates them into the vertex records of all the
//! particle's vertices, partition by partition.

use std::sync::Arc;

use log::debug;

use crate::animation_data::{AnimationSubGeometry, DynamicParticleRecord};
use crate::error::{AnimationError, Result};
use crate::geometry::Mesh;
use crate::nodes::ParticleNode;
use crate::properties::{ParticleProperties, ParticlePropertiesMode};
use crate::set::{ParticleAnimationSet, SubGeometryKey};

impl ParticleAnimationSet {
    /// Build (or reuse) the static animation data of every partition of `mesh`
    ///
    /// With `mesh.share_animation_geometry` set, partitions this set already
    /// generated for the same layout are reused as is. Buffers are only
    /// attached to the mesh once every particle was processed, so a failure
    /// leaves the mesh and the set unchanged.
    pub fn generate_animation_data(&mut self, mesh: &mut Mesh) -> Result<()> {
        let Some(initializer) = self.initializer.as_mut() else {
            return Err(AnimationError::MissingInitializer);
        };
        let geometry = Arc::clone(mesh.geometry());
        let particles = geometry
            .as_particle()
            .ok_or(AnimationError::NotParticleGeometry)?;
        if particles.num_vertices() == 0 {
            return Err(AnimationError::EmptyGeometry);
        }

        let stride = self.total_record_stride;
        let dynamic_stride = self.dynamic_stride;
        let key = |partition| SubGeometryKey {
            partition,
            stride,
            dynamic_stride,
        };

        let mut reused = Vec::new();
        let mut fresh: Vec<Option<AnimationSubGeometry>> = Vec::new();
        for (index, partition) in particles.partitions().iter().enumerate() {
            let cached = mesh
                .share_animation_geometry
                .then(|| self.sub_geometries.get(&key(partition.id)))
                .flatten();
            match cached {
                Some(data) => {
                    reused.push((index, Arc::clone(data)));
                    fresh.push(None);
                }
                None => fresh.push(Some(AnimationSubGeometry::new(
                    partition.id,
                    partition.num_vertices,
                    stride,
                    dynamic_stride,
                ))),
            }
        }

        let generated = fresh.iter().filter(|data| data.is_some()).count();
        if generated > 0 {
            let time_active = self.time_active;
            let static_nodes: Vec<&dyn ParticleNode> = self
                .nodes
                .iter()
                .map(AsRef::as_ref)
                .filter(|node| {
                    Self::is_active(time_active, *node)
                        && node.info().mode() == ParticlePropertiesMode::LocalStatic
                })
                .collect();
            let has_dynamic = self.nodes.iter().any(|node| {
                node.info().mode() == ParticlePropertiesMode::LocalDynamic
            });
            let mut values: Vec<Vec<f32>> = static_nodes
                .iter()
                .map(|node| vec![0.0; node.info().data_length()])
                .collect();
            let mut processed = vec![0usize; fresh.len()];
            let mut properties = ParticleProperties::new(0, particles.num_particles());
            let runs = particles.runs();
            let mut cursor = 0;

            for particle in 0..particles.num_particles() {
                properties.reset(particle);
                initializer(&mut properties);
                for (node, out) in static_nodes.iter().zip(values.iter_mut()) {
                    node.generate_one_particle_property(&properties, out)?;
                }

                while let Some(run) = runs.get(cursor).filter(|run| run.particle_index == particle)
                {
                    cursor += 1;
                    let partition = particles.partitions()[run.partition];
                    let Some(data) = fresh[run.partition].as_mut() else {
                        continue;
                    };
                    if processed[run.partition] != run.first_vertex {
                        return Err(AnimationError::GeometryMismatch(format!(
                            "particle {particle} starts at vertex {} of partition {}, expected {}",
                            run.first_vertex, run.partition, processed[run.partition]
                        )));
                    }
                    for (node, out) in static_nodes.iter().zip(&values) {
                        data.replicate(
                            run.first_vertex,
                            run.num_vertices,
                            node.info().data_offset(),
                            out,
                        );
                    }
                    if has_dynamic {
                        data.push_record(DynamicParticleRecord {
                            index: particle,
                            start_time: properties.start_time,
                            duration: properties.duration,
                            delay: properties.delay,
                            partition: partition.id,
                            partition_index: run.partition,
                            first_vertex: run.first_vertex,
                            num_vertices: run.num_vertices,
                        });
                    }
                    processed[run.partition] += run.num_vertices;
                }
            }
        }

        for (index, data) in reused {
            mesh.set_animation_geometry(index, data);
        }
        for (index, data) in fresh.into_iter().enumerate() {
            let Some(data) = data else {
                continue;
            };
            let data = Arc::new(data);
            if mesh.share_animation_geometry {
                self.sub_geometries
                    .insert(key(data.partition()), Arc::clone(&data));
            }
            mesh.set_animation_geometry(index, data);
        }

        debug!(
            "Animation data for geometry {:?}: {} particle(s), stride {}, {} partition(s) generated, {} reused",
            geometry.id(),
            particles.num_particles(),
            stride,
            generated,
            particles.partitions().len() - generated
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, GeometryIdAllocator, ParticleGeometryBuilder, Partition};
    use crate::nodes::{FollowNode, PositionNode};
    use glam::Vec3;

    fn quads(ids: &mut GeometryIdAllocator, count: usize) -> Arc<Geometry> {
        let mut builder = ParticleGeometryBuilder::new();
        for _ in 0..count {
            builder.add_particle(4);
        }
        Arc::new(builder.build(ids).unwrap().into())
    }

    fn position_set() -> ParticleAnimationSet {
        let mut set = ParticleAnimationSet::default();
        set.add_node(PositionNode::local(ParticlePropertiesMode::LocalStatic))
            .unwrap();
        set.set_initializer(|properties| {
            properties.position = Some(Vec3::splat(properties.index as f32));
        });
        set
    }

    #[test]
    fn test_missing_initializer_checked_first() {
        let mut set = ParticleAnimationSet::default();
        let mut ids = GeometryIdAllocator::new();
        let mut mesh = Mesh::new(Arc::new(Geometry::Static {
            id: ids.geometry(),
            partitions: vec![],
        }));
        assert_eq!(
            set.generate_animation_data(&mut mesh),
            Err(AnimationError::MissingInitializer)
        );
    }

    #[test]
    fn test_static_geometry_rejected() {
        let mut set = position_set();
        let mut ids = GeometryIdAllocator::new();
        let mut mesh = Mesh::new(Arc::new(Geometry::Static {
            id: ids.geometry(),
            partitions: vec![Partition {
                id: ids.partition(),
                num_vertices: 3,
            }],
        }));
        assert_eq!(
            set.generate_animation_data(&mut mesh),
            Err(AnimationError::NotParticleGeometry)
        );
    }

    #[test]
    fn test_empty_geometry_rejected() {
        let mut set = position_set();
        let mut ids = GeometryIdAllocator::new();
        let mut mesh = Mesh::new(quads(&mut ids, 0));
        assert_eq!(
            set.generate_animation_data(&mut mesh),
            Err(AnimationError::EmptyGeometry)
        );
    }

    #[test]
    fn test_failure_leaves_mesh_untouched() {
        let mut set = ParticleAnimationSet::default();
        set.add_node(PositionNode::local(ParticlePropertiesMode::LocalStatic))
            .unwrap();
        set.set_initializer(|properties| {
            if properties.index < 2 {
                properties.position = Some(Vec3::ONE);
            }
        });
        let mut ids = GeometryIdAllocator::new();
        let mut mesh = Mesh::new(quads(&mut ids, 3));
        assert!(matches!(
            set.generate_animation_data(&mut mesh),
            Err(AnimationError::MissingProperty { .. })
        ));
        assert!(mesh.animation_geometry(0).is_none());
        assert!(set.sub_geometries.is_empty());
    }

    #[test]
    fn test_dynamic_records_per_run() {
        let mut set = position_set();
        set.add_node(FollowNode::new()).unwrap();
        let mut ids = GeometryIdAllocator::new();
        let mut mesh = Mesh::new(quads(&mut ids, 2));
        set.generate_animation_data(&mut mesh).unwrap();

        let data = mesh.animation_geometry(0).unwrap();
        let records: Vec<_> = data
            .dynamic_records()
            .iter()
            .map(|record| (record.index, record.first_vertex, record.num_vertices))
            .collect();
        assert_eq!(records, vec![(0, 0, 4), (1, 4, 4)]);
        assert_eq!(data.dynamic_records()[0].duration, 1000.0);
    }

    #[test]
    fn test_no_records_without_dynamic_nodes() {
        let mut set = position_set();
        let mut ids = GeometryIdAllocator::new();
        let mut mesh = Mesh::new(quads(&mut ids, 2));
        set.generate_animation_data(&mut mesh).unwrap();
        assert!(mesh.animation_geometry(0).unwrap().dynamic_records().is_empty());
    }

    #[test]
    fn test_initializer_sees_particles_without_vertices() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut ids = GeometryIdAllocator::new();
        let mut builder = ParticleGeometryBuilder::new();
        builder.add_particle(4);
        builder.add_particle(0);
        builder.add_particle(4);
        builder.add_particle(0);
        let mut mesh = Mesh::new(Arc::new(builder.build(&mut ids).unwrap().into()));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut set = position_set();
        let log = Rc::clone(&seen);
        set.set_initializer(move |properties| {
            log.borrow_mut().push((properties.index, properties.total));
            properties.position = Some(Vec3::splat(properties.index as f32));
        });
        set.generate_animation_data(&mut mesh).unwrap();

        assert_eq!(*seen.borrow(), vec![(0, 4), (1, 4), (2, 4), (3, 4)]);
        let data = mesh.animation_geometry(0).unwrap();
        // Second quad belongs to particle 2
        assert_eq!(&data.vertex(4).unwrap()[4..7], &[2.0, 2.0, 2.0]);
    }
}
