//! Particle geometry
//!
//! Just enough of a mesh model to drive particle data generation: geometry
//! is split into partitions (vertex buffers of bounded size), and particle
//! geometry additionally records which runs of vertices belong to which
//! particle.

use std::sync::Arc;

use log::trace;

use crate::animation_data::{AnimationSubGeometry, DynamicVertexBuffer};
use crate::error::{AnimationError, Result};

/// Largest vertex count one partition may hold
pub const DEFAULT_MAX_VERTICES_PER_PARTITION: usize = 65535;

/// Identity of a geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GeometryId(u32);

/// Identity of one partition, unique across geometries of one allocator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PartitionId(u32);

impl GeometryId {
    pub fn value(self) -> u32 {
        self.0
    }
}

impl PartitionId {
    pub fn value(self) -> u32 {
        self.0
    }
}

/// Hands out geometry and partition ids
///
/// Thread one allocator through every construction path that must produce
/// distinct ids.
#[derive(Debug, Default)]
pub struct GeometryIdAllocator {
    next_geometry: u32,
    next_partition: u32,
}

impl GeometryIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geometry(&mut self) -> GeometryId {
        let id = GeometryId(self.next_geometry);
        self.next_geometry += 1;
        id
    }

    pub fn partition(&mut self) -> PartitionId {
        let id = PartitionId(self.next_partition);
        self.next_partition += 1;
        id
    }
}

/// One vertex buffer of a geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub id: PartitionId,
    pub num_vertices: usize,
}

/// Contiguous vertices of one particle inside one partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleRun {
    pub particle_index: usize,
    /// Position of the partition in the geometry
    pub partition: usize,
    /// First vertex of the run inside its partition
    pub first_vertex: usize,
    pub num_vertices: usize,
}

/// Geometry whose vertices are grouped into particles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticleGeometry {
    id: GeometryId,
    partitions: Vec<Partition>,
    runs: Vec<ParticleRun>,
    num_particles: usize,
}

impl ParticleGeometry {
    /// Assemble geometry from explicit partitions and runs
    ///
    /// Runs must be in ascending particle order and, within each partition,
    /// tile the vertices front to back without gaps. `num_particles` counts
    /// particles without vertices too; it grows to cover every run.
    pub fn from_parts(
        allocator: &mut GeometryIdAllocator,
        partition_sizes: &[usize],
        runs: Vec<ParticleRun>,
        num_particles: usize,
    ) -> Result<Self> {
        let partitions: Vec<Partition> = partition_sizes
            .iter()
            .map(|&num_vertices| Partition {
                id: allocator.partition(),
                num_vertices,
            })
            .collect();

        let mut filled = vec![0usize; partitions.len()];
        let mut last_particle = 0;
        for run in &runs {
            if run.particle_index < last_particle {
                return Err(AnimationError::GeometryMismatch(format!(
                    "particle {} follows particle {}",
                    run.particle_index, last_particle
                )));
            }
            last_particle = run.particle_index;
            let partition = partitions.get(run.partition).ok_or_else(|| {
                AnimationError::GeometryMismatch(format!(
                    "particle {} points at missing partition {}",
                    run.particle_index, run.partition
                ))
            })?;
            if run.first_vertex != filled[run.partition]
                || run.first_vertex + run.num_vertices > partition.num_vertices
            {
                return Err(AnimationError::GeometryMismatch(format!(
                    "particle {} run {}..{} does not continue partition {} at vertex {}",
                    run.particle_index,
                    run.first_vertex,
                    run.first_vertex + run.num_vertices,
                    run.partition,
                    filled[run.partition]
                )));
            }
            filled[run.partition] += run.num_vertices;
        }

        let num_particles = runs
            .last()
            .map_or(num_particles, |run| num_particles.max(run.particle_index + 1));
        Ok(Self {
            id: allocator.geometry(),
            partitions,
            runs,
            num_particles,
        })
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    /// Runs in ascending particle order
    pub fn runs(&self) -> &[ParticleRun] {
        &self.runs
    }

    pub fn num_particles(&self) -> usize {
        self.num_particles
    }

    pub fn num_vertices(&self) -> usize {
        self.partitions.iter().map(|p| p.num_vertices).sum()
    }
}

/// Collects particles into partitions
#[derive(Debug)]
pub struct ParticleGeometryBuilder {
    max_vertices_per_partition: usize,
    partition_sizes: Vec<usize>,
    runs: Vec<ParticleRun>,
    next_particle: usize,
}

impl Default for ParticleGeometryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleGeometryBuilder {
    pub fn new() -> Self {
        Self::with_max_vertices(DEFAULT_MAX_VERTICES_PER_PARTITION)
    }

    pub fn with_max_vertices(max_vertices_per_partition: usize) -> Self {
        Self {
            max_vertices_per_partition: max_vertices_per_partition.max(1),
            partition_sizes: vec![0],
            runs: Vec::new(),
            next_particle: 0,
        }
    }

    /// Append a particle of `num_vertices` vertices, returning its index
    ///
    /// A particle that does not fit the current partition starts a new one;
    /// one larger than a whole partition is spread over several.
    pub fn add_particle(&mut self, num_vertices: usize) -> usize {
        let index = self.next_particle;
        let mut remaining = num_vertices;
        if self.current_size() > 0 && self.current_size() + remaining > self.max_vertices_per_partition
        {
            self.split_partition();
        }
        while remaining > 0 {
            let room = self.max_vertices_per_partition - self.current_size();
            if room == 0 {
                self.split_partition();
                continue;
            }
            let count = remaining.min(room);
            self.push_run(index, count);
            remaining -= count;
        }
        self.next_particle = index + 1;
        index
    }

    /// Append `num_vertices` more vertices of particle `particle_index` to
    /// the current partition
    ///
    /// Consecutive calls for the same particle extend it, across partitions
    /// when [`split_partition`](Self::split_partition) is called in between.
    pub fn add_run(&mut self, particle_index: usize, num_vertices: usize) -> Result<()> {
        let last = self.next_particle.checked_sub(1);
        if last.is_some_and(|last| particle_index < last) {
            return Err(AnimationError::GeometryMismatch(format!(
                "particle {particle_index} added after particle {}",
                self.next_particle - 1
            )));
        }
        if self.current_size() + num_vertices > self.max_vertices_per_partition {
            return Err(AnimationError::GeometryMismatch(format!(
                "run of {num_vertices} vertices overflows a partition of {}",
                self.max_vertices_per_partition
            )));
        }
        self.push_run(particle_index, num_vertices);
        self.next_particle = self.next_particle.max(particle_index + 1);
        Ok(())
    }

    /// Close the current partition; later runs go to a new one
    pub fn split_partition(&mut self) {
        if self.current_size() > 0 {
            self.partition_sizes.push(0);
        }
    }

    pub fn build(self, allocator: &mut GeometryIdAllocator) -> Result<ParticleGeometry> {
        let mut partition_sizes = self.partition_sizes;
        if partition_sizes.len() > 1 && partition_sizes.last() == Some(&0) {
            partition_sizes.pop();
        }
        trace!(
            "Building particle geometry: {} particles in {} partition(s)",
            self.next_particle,
            partition_sizes.len()
        );
        ParticleGeometry::from_parts(allocator, &partition_sizes, self.runs, self.next_particle)
    }

    fn current_size(&self) -> usize {
        self.partition_sizes.last().copied().unwrap_or(0)
    }

    fn push_run(&mut self, particle_index: usize, num_vertices: usize) {
        if num_vertices == 0 {
            return;
        }
        let partition = self.partition_sizes.len() - 1;
        let first_vertex = self.partition_sizes[partition];
        self.runs.push(ParticleRun {
            particle_index,
            partition,
            first_vertex,
            num_vertices,
        });
        self.partition_sizes[partition] += num_vertices;
    }
}

/// Geometry a mesh renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Geometry {
    /// Plain geometry without particle grouping
    Static {
        id: GeometryId,
        partitions: Vec<Partition>,
    },
    Particle(ParticleGeometry),
}

impl Geometry {
    pub fn id(&self) -> GeometryId {
        match self {
            Self::Static { id, .. } => *id,
            Self::Particle(geometry) => geometry.id(),
        }
    }

    pub fn partitions(&self) -> &[Partition] {
        match self {
            Self::Static { partitions, .. } => partitions,
            Self::Particle(geometry) => geometry.partitions(),
        }
    }

    pub fn as_particle(&self) -> Option<&ParticleGeometry> {
        match self {
            Self::Particle(geometry) => Some(geometry),
            Self::Static { .. } => None,
        }
    }
}

impl From<ParticleGeometry> for Geometry {
    fn from(geometry: ParticleGeometry) -> Self {
        Self::Particle(geometry)
    }
}

/// A renderable instance of a geometry
///
/// Holds the animation data generated for each partition. With
/// `share_animation_geometry` set, meshes built from the same geometry reuse
/// the data their animation set already generated.
#[derive(Debug, Clone)]
pub struct Mesh {
    geometry: Arc<Geometry>,
    pub share_animation_geometry: bool,
    animation_geometries: Vec<Option<Arc<AnimationSubGeometry>>>,
    dynamic_buffers: Vec<Option<DynamicVertexBuffer>>,
}

impl Mesh {
    pub fn new(geometry: Arc<Geometry>) -> Self {
        let partitions = geometry.partitions().len();
        Self {
            geometry,
            share_animation_geometry: true,
            animation_geometries: vec![None; partitions],
            dynamic_buffers: vec![None; partitions],
        }
    }

    pub fn geometry(&self) -> &Arc<Geometry> {
        &self.geometry
    }

    /// Swap the geometry, dropping animation data built for the old one
    pub fn set_geometry(&mut self, geometry: Arc<Geometry>) {
        let partitions = geometry.partitions().len();
        self.geometry = geometry;
        self.animation_geometries = vec![None; partitions];
        self.dynamic_buffers = vec![None; partitions];
    }

    /// Animation data of partition `index`, once generated
    pub fn animation_geometry(&self, index: usize) -> Option<&Arc<AnimationSubGeometry>> {
        self.animation_geometries.get(index)?.as_ref()
    }

    pub fn dynamic_buffer(&self, index: usize) -> Option<&DynamicVertexBuffer> {
        self.dynamic_buffers.get(index)?.as_ref()
    }

    pub(crate) fn set_animation_geometry(&mut self, index: usize, data: Arc<AnimationSubGeometry>) {
        if let Some(slot) = self.animation_geometries.get_mut(index) {
            *slot = Some(data);
        }
    }

    pub(crate) fn dynamic_buffer_slot(&mut self, index: usize) -> Option<&mut Option<DynamicVertexBuffer>> {
        self.dynamic_buffers.get_mut(index)
    }
}
