//! Generated per-vertex animation data

use crate::geometry::PartitionId;

/// Lifecycle of one particle run, kept for nodes evaluated every frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicParticleRecord {
    /// Particle index in the geometry
    pub index: usize,
    pub start_time: f32,
    pub duration: f32,
    pub delay: f32,
    /// Partition holding the run
    pub partition: PartitionId,
    /// Position of that partition in the geometry
    pub partition_index: usize,
    /// First vertex of the run inside the partition
    pub first_vertex: usize,
    pub num_vertices: usize,
}

/// Static animation data generated for one geometry partition
///
/// `vertex_data` holds `num_vertices` records of `stride` floats. Every
/// vertex of a particle carries the same values. The buffer is immutable once
/// generated; it is replaced as a whole when the layout or geometry changes.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSubGeometry {
    partition: PartitionId,
    num_vertices: usize,
    stride: usize,
    dynamic_stride: usize,
    vertex_data: Vec<f32>,
    dynamic_records: Vec<DynamicParticleRecord>,
}

impl AnimationSubGeometry {
    pub(crate) fn new(
        partition: PartitionId,
        num_vertices: usize,
        stride: usize,
        dynamic_stride: usize,
    ) -> Self {
        Self {
            partition,
            num_vertices,
            stride,
            dynamic_stride,
            vertex_data: vec![0.0; num_vertices * stride],
            dynamic_records: Vec::new(),
        }
    }

    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    /// Floats per vertex record
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Floats per vertex in the dynamic buffer built from this data
    pub fn dynamic_stride(&self) -> usize {
        self.dynamic_stride
    }

    pub fn vertex_data(&self) -> &[f32] {
        &self.vertex_data
    }

    /// Record of vertex `vertex`
    pub fn vertex(&self, vertex: usize) -> Option<&[f32]> {
        let start = vertex.checked_mul(self.stride)?;
        self.vertex_data.get(start..start + self.stride)
    }

    pub fn dynamic_records(&self) -> &[DynamicParticleRecord] {
        &self.dynamic_records
    }

    /// Write `values` at `offset` in every record of `first..first + count`
    pub(crate) fn replicate(&mut self, first: usize, count: usize, offset: usize, values: &[f32]) {
        for vertex in first..first + count {
            let start = vertex * self.stride + offset;
            self.vertex_data[start..start + values.len()].copy_from_slice(values);
        }
    }

    pub(crate) fn push_record(&mut self, record: DynamicParticleRecord) {
        self.dynamic_records.push(record);
    }
}

/// Per-frame data of the dynamic nodes for one partition
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicVertexBuffer {
    stride: usize,
    data: Vec<f32>,
    /// Set on every write, cleared by the GPU layer after upload
    pub dirty: bool,
}

impl DynamicVertexBuffer {
    pub fn new(num_vertices: usize, stride: usize) -> Self {
        Self {
            stride,
            data: vec![0.0; num_vertices * stride],
            dirty: false,
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn num_vertices(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.data.len() / self.stride
        }
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn vertex(&self, vertex: usize) -> Option<&[f32]> {
        let start = vertex.checked_mul(self.stride)?;
        self.data.get(start..start + self.stride)
    }

    pub(crate) fn replicate(&mut self, first: usize, count: usize, offset: usize, values: &[f32]) {
        for vertex in first..first + count {
            let start = vertex * self.stride + offset;
            self.data[start..start + values.len()].copy_from_slice(values);
        }
        self.dirty = true;
    }
}
