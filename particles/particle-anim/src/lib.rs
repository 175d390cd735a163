//! Particle animation compiler
//!
//! This crate turns a set of declarative animation nodes (time, velocity,
//! billboard, color, UV, ...) into two things:
//!
//! - vertex (and a little fragment) shader code for a register-machine
//!   shading language, with registers allocated from pools shared with the
//!   enclosing material pass
//! - an interleaved static vertex buffer holding every particle's baked
//!   node values, replicated across all vertices of the particle
//!
//! # Compilation
//!
//! Code generation runs in a fixed order: init code, primary block (node
//! priority below 9), position combination, post block (below 18), color
//! accumulator setup, color block, color hand-off. The
//! [`AnimationRegisterCache`] enforces that order and is reset at the start
//! of every compilation.
//!
//! ```
//! use particle_anim::nodes::{BillboardNode, VelocityNode};
//! use particle_anim::{
//!     AnimationRegisterCache, ParticleAnimationSet, ParticlePropertiesMode, PassInfo,
//!     ShaderProfile,
//! };
//!
//! let mut set = ParticleAnimationSet::new(true, true, false);
//! set.add_node(BillboardNode::new())?;
//! set.add_node(VelocityNode::local(ParticlePropertiesMode::LocalStatic))?;
//!
//! let pass = PassInfo {
//!     vertex_attributes: 2,
//!     vertex_constants: 8,
//!     ..PassInfo::default()
//! };
//! let mut cache = AnimationRegisterCache::default();
//! let vertex = set.vertex_code(&mut cache, &pass, ShaderProfile::Baseline, &["va0"], &["vt0"])?;
//! let uv = set.uv_code(&mut cache, "va1", "v0")?;
//! set.done_code(&mut cache)?;
//!
//! assert!(vertex.contains("m33"));
//! assert_eq!(uv, "mov v0, va1\n");
//! assert_eq!(cache.usage().streams, 4);
//! # Ok::<(), particle_anim::AnimationError>(())
//! ```
//!
//! # Data generation
//!
//! ```
//! use std::sync::Arc;
//!
//! use glam::Vec3;
//! use particle_anim::geometry::{GeometryIdAllocator, Mesh, ParticleGeometryBuilder};
//! use particle_anim::nodes::PositionNode;
//! use particle_anim::{ParticleAnimationSet, ParticlePropertiesMode};
//!
//! let mut ids = GeometryIdAllocator::new();
//! let mut builder = ParticleGeometryBuilder::new();
//! for _ in 0..3 {
//!     builder.add_particle(4);
//! }
//! let mut mesh = Mesh::new(Arc::new(builder.build(&mut ids)?.into()));
//!
//! let mut set = ParticleAnimationSet::default();
//! set.add_node(PositionNode::local(ParticlePropertiesMode::LocalStatic))?;
//! set.set_initializer(|properties| {
//!     properties.position = Some(Vec3::new(properties.index as f32, 0.0, 0.0));
//! });
//! set.generate_animation_data(&mut mesh)?;
//!
//! let data = mesh.animation_geometry(0).unwrap();
//! assert_eq!(data.vertex_data().len(), 3 * 4 * set.total_record_stride());
//! # Ok::<(), particle_anim::AnimationError>(())
//! ```

#[macro_use]
mod macros;

pub mod animation_data;
pub mod cache;
pub mod error;
pub mod geometry;
pub mod nodes;
pub mod profile;
pub mod properties;
pub mod register;

mod generator;
mod set;

pub use animation_data::{AnimationSubGeometry, DynamicParticleRecord, DynamicVertexBuffer};
pub use cache::{
    AnimationRegisterCache, CompilationFlags, CompilationPhase, PassInfo, PassUsage, Pool,
    SharedRegisters, StreamBinder, StreamBinding, StreamSource,
};
pub use error::{AnimationError, Result};
pub use geometry::{Geometry, Mesh, ParticleGeometry, ParticleGeometryBuilder};
pub use nodes::{FrameState, NodeId, NodeInfo, ParticleNode, SetSettings};
pub use profile::{RegisterLimits, ShaderProfile};
pub use properties::{ColorTransform, ParticleProperties, ParticlePropertiesMode};
pub use register::{RegisterKind, ShaderRegister};
pub use set::{ParticleAnimationSet, ParticleInitializer, TIME_NODE_ID};
