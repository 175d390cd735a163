//! Animation nodes
//!
//! A node is one self-contained behavior (time, velocity, billboard, color,
//! ...) that contributes shader code for its emission block and, for local
//! modes, one value-set per particle. The [`ParticleAnimationSet`] owns the
//! nodes and drives them through compilation and data generation.
//!
//! # Emission blocks
//!
//! | Priority | Block | Runs after |
//! |----------|-------|------------|
//! | `< 9` | primary | init code |
//! | `9..18` | post | position combination |
//! | `>= 18` | color | color accumulator setup |
//!
//! [`ParticleAnimationSet`]: crate::ParticleAnimationSet

mod acceleration;
mod billboard;
mod color;
mod follow;
mod position;
mod rotate_to_heading;
mod rotational_velocity;
mod scale;
mod sprite_sheet;
mod time;
mod uv;
mod velocity;

use std::fmt;

use glam::Mat3;

use crate::cache::{AnimationRegisterCache, CompilationFlags};
use crate::error::{AnimationError, Result};
use crate::properties::{ParticleProperties, ParticlePropertiesMode};

pub use acceleration::AccelerationNode;
pub use billboard::BillboardNode;
pub use color::ColorNode;
pub use follow::{FollowNode, follow_target_time};
pub use position::PositionNode;
pub use rotate_to_heading::RotateToHeadingNode;
pub use rotational_velocity::RotationalVelocityNode;
pub use scale::ScaleNode;
pub use sprite_sheet::SpriteSheetNode;
pub use time::TimeNode;
pub use uv::{UvAxis, UvNode};
pub use velocity::VelocityNode;

/// First priority of the post block
pub const POST_PRIORITY: i32 = 9;
/// First priority of the color block
pub const COLOR_PRIORITY: i32 = 18;

/// Handle of a node inside its animation set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Block of the vertex program a node emits into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmissionBlock {
    Primary,
    Post,
    Color,
}

impl EmissionBlock {
    pub fn for_priority(priority: i32) -> Self {
        if priority < POST_PRIORITY {
            Self::Primary
        } else if priority < COLOR_PRIORITY {
            Self::Post
        } else {
            Self::Color
        }
    }
}

/// Bookkeeping every node carries
///
/// Offsets are relative to one vertex record and are assigned by the set
/// when the node is added; they never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    name: &'static str,
    id: NodeId,
    priority: i32,
    mode: ParticlePropertiesMode,
    data_length: usize,
    data_offset: usize,
    dynamic_offset: usize,
}

impl NodeInfo {
    pub fn new(
        name: &'static str,
        mode: ParticlePropertiesMode,
        data_length: usize,
        priority: i32,
    ) -> Self {
        Self {
            name,
            id: NodeId::default(),
            priority,
            mode,
            data_length,
            data_offset: 0,
            dynamic_offset: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn mode(&self) -> ParticlePropertiesMode {
        self.mode
    }

    /// Floats this node stores per vertex
    pub fn data_length(&self) -> usize {
        self.data_length
    }

    /// Float offset inside the static vertex record
    pub fn data_offset(&self) -> usize {
        self.data_offset
    }

    /// Float offset inside the dynamic vertex record
    pub fn dynamic_offset(&self) -> usize {
        self.dynamic_offset
    }

    pub fn block(&self) -> EmissionBlock {
        EmissionBlock::for_priority(self.priority)
    }

    pub(crate) fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }

    pub(crate) fn set_data_offset(&mut self, offset: usize) {
        self.data_offset = offset;
    }

    pub(crate) fn set_dynamic_offset(&mut self, offset: usize) {
        self.dynamic_offset = offset;
    }
}

/// Set-level configuration nodes validate and extend when added
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SetSettings {
    /// Particles stop after their duration
    pub uses_duration: bool,
    /// Particles restart after duration (and delay)
    pub uses_looping: bool,
    /// A pause separates two loops
    pub uses_delay: bool,
    /// Flags raised by the nodes added so far
    #[cfg_attr(feature = "serde", serde(skip))]
    pub flags: CompilationFlags,
}

impl SetSettings {
    pub fn new(uses_duration: bool, uses_looping: bool, uses_delay: bool) -> Self {
        Self {
            uses_duration,
            uses_looping,
            uses_delay,
            flags: CompilationFlags::empty(),
        }
    }
}

/// Per-draw state handed to nodes writing constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    /// Animation time in seconds
    pub time: f32,
    /// Rotation from particle space into camera space
    pub camera_rotation: Mat3,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            time: 0.0,
            camera_rotation: Mat3::IDENTITY,
        }
    }
}

impl FrameState {
    pub fn at(time: f32) -> Self {
        Self {
            time,
            ..Self::default()
        }
    }
}

/// Capability interface shared by every node
pub trait ParticleNode: fmt::Debug {
    fn info(&self) -> &NodeInfo;

    fn info_mut(&mut self) -> &mut NodeInfo;

    /// Validate and extend the set configuration; called once when added
    fn process_settings(&mut self, _settings: &mut SetSettings) -> Result<()> {
        Ok(())
    }

    /// Vertex code for the node's emission block
    fn generate_vertex_code(&self, cache: &mut AnimationRegisterCache) -> Result<String>;

    /// UV code, only requested when the set has a UV node
    fn generate_uv_code(&self, _cache: &mut AnimationRegisterCache) -> Result<String> {
        Ok(String::new())
    }

    /// Fill `out` (exactly `data_length` floats) for one particle
    fn generate_one_particle_property(
        &self,
        _properties: &ParticleProperties,
        _out: &mut [f32],
    ) -> Result<()> {
        Err(AnimationError::Unimplemented {
            node: self.info().name(),
            operation: "generate_one_particle_property",
        })
    }

    /// Write per-draw constants after compilation finished
    fn write_constants(
        &self,
        _cache: &mut AnimationRegisterCache,
        _frame: &FrameState,
    ) -> Result<()> {
        Ok(())
    }
}

/// Constant register a node recorded for `slot` during compilation
pub(crate) fn constant_index(
    cache: &AnimationRegisterCache,
    info: &NodeInfo,
    slot: usize,
) -> Result<usize> {
    cache
        .register_index(info.id(), slot)
        .ok_or(AnimationError::NotCompiled)
}

pub(crate) fn missing(node: &'static str, property: &'static str) -> AnimationError {
    AnimationError::MissingProperty { node, property }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::cache::{AnimationRegisterCache, CompilationFlags, CompilationPhase, PassInfo};
    use crate::profile::ShaderProfile;

    /// Cache reset against an empty pass and advanced to `phase`
    pub fn cache_at(flags: CompilationFlags, phase: CompilationPhase) -> AnimationRegisterCache {
        let mut cache = AnimationRegisterCache::default();
        cache
            .reset(
                ShaderProfile::Baseline,
                &PassInfo::default(),
                flags,
                &["va0"],
                &["vt0"],
            )
            .unwrap();
        let mut current = CompilationPhase::Reset;
        while current != phase {
            current = current.next().unwrap();
            cache.enter(current).unwrap();
        }
        cache
    }

    /// Run the remaining phases and finish the compilation
    pub fn finish(cache: &mut AnimationRegisterCache) {
        while let Some(next) = cache.phase().next() {
            if next == CompilationPhase::Done {
                cache.done().unwrap();
                break;
            }
            cache.enter(next).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_thresholds() {
        assert_eq!(EmissionBlock::for_priority(0), EmissionBlock::Primary);
        assert_eq!(EmissionBlock::for_priority(8), EmissionBlock::Primary);
        assert_eq!(EmissionBlock::for_priority(9), EmissionBlock::Post);
        assert_eq!(EmissionBlock::for_priority(17), EmissionBlock::Post);
        assert_eq!(EmissionBlock::for_priority(18), EmissionBlock::Color);
        assert_eq!(EmissionBlock::for_priority(-3), EmissionBlock::Primary);
    }

    #[test]
    fn test_default_property_generation_is_unimplemented() {
        #[derive(Debug)]
        struct Bare(NodeInfo);

        impl ParticleNode for Bare {
            fn info(&self) -> &NodeInfo {
                &self.0
            }
            fn info_mut(&mut self) -> &mut NodeInfo {
                &mut self.0
            }
            fn generate_vertex_code(&self, _cache: &mut AnimationRegisterCache) -> Result<String> {
                Ok(String::new())
            }
        }

        let node = Bare(NodeInfo::new(
            "bare",
            ParticlePropertiesMode::LocalStatic,
            1,
            0,
        ));
        let mut out = [0.0];
        assert_eq!(
            node.generate_one_particle_property(&ParticleProperties::new(0, 1), &mut out),
            Err(AnimationError::Unimplemented {
                node: "bare",
                operation: "generate_one_particle_property",
            })
        );
    }
}
