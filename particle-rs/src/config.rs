//! Animation set descriptions
//!
//! A description is a JSON document:
//!
//! ```json
//! {
//!   "settings": { "uses_duration": true, "uses_looping": true },
//!   "pass": { "vertex_attributes": 2, "vertex_constants": 4 },
//!   "profile": "baseline",
//!   "nodes": [
//!     { "type": "billboard" },
//!     { "type": "velocity", "mode": "local_static" },
//!     { "type": "color", "start": { "multiplier": [1, 1, 1, 1], "offset": [0, 0, 0, 0] },
//!       "end": { "multiplier": [1, 0, 0, 1], "offset": [0, 0, 0, 0] } }
//!   ]
//! }
//! ```
//!
//! Nodes given explicit values (`value`, `min`/`max`, `axis`/`period`,
//! `start`/`end`, `cycle`) are global; the others read per-particle data.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use glam::Vec3;
use serde::Deserialize;

use particle_anim::nodes::{
    AccelerationNode, BillboardNode, ColorNode, FollowNode, PositionNode, RotateToHeadingNode,
    RotationalVelocityNode, ScaleNode, SpriteSheetNode, UvAxis, UvNode, VelocityNode,
};
use particle_anim::{
    ColorTransform, NodeId, ParticleAnimationSet, ParticlePropertiesMode, PassInfo, SetSettings,
    ShaderProfile,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub settings: SetSettings,
    pub pass: PassInfo,
    pub profile: ShaderProfile,
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeConfig {
    Position {
        mode: Option<ParticlePropertiesMode>,
        value: Option<Vec3>,
    },
    Velocity {
        mode: Option<ParticlePropertiesMode>,
        value: Option<Vec3>,
    },
    Acceleration {
        mode: Option<ParticlePropertiesMode>,
        value: Option<Vec3>,
    },
    Scale {
        mode: Option<ParticlePropertiesMode>,
        min: Option<f32>,
        max: Option<f32>,
        cycle: Option<f32>,
        phase: Option<f32>,
    },
    RotationalVelocity {
        mode: Option<ParticlePropertiesMode>,
        axis: Option<Vec3>,
        period: Option<f32>,
    },
    RotateToHeading,
    Billboard {
        axis: Option<Vec3>,
    },
    Follow,
    Uv {
        mode: Option<ParticlePropertiesMode>,
        #[serde(default)]
        axis: UvAxis,
        cycle: Option<f32>,
        scale: Option<f32>,
    },
    SpriteSheet {
        columns: u32,
        rows: u32,
        total_frames: Option<u32>,
        cycle: Option<f32>,
        phase: Option<f32>,
    },
    Color {
        mode: Option<ParticlePropertiesMode>,
        #[serde(default = "default_true")]
        multiplier: bool,
        #[serde(default)]
        offset: bool,
        start: Option<ColorTransform>,
        end: Option<ColorTransform>,
        cycle: Option<f32>,
        phase: Option<f32>,
    },
}

fn default_true() -> bool {
    true
}

/// Mode of a node reading per-particle data
fn local_mode(mode: Option<ParticlePropertiesMode>) -> Result<ParticlePropertiesMode> {
    match mode.unwrap_or(ParticlePropertiesMode::LocalStatic) {
        ParticlePropertiesMode::Global => bail!("global nodes need explicit values"),
        mode => Ok(mode),
    }
}

impl AnimationConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse animation set {}", path.display()))
    }

    /// Build the animation set, returning it with the ids of the configured nodes
    pub fn build_set(&self) -> Result<(ParticleAnimationSet, Vec<NodeId>)> {
        let mut set = ParticleAnimationSet::with_settings(self.settings);
        let mut ids = Vec::with_capacity(self.nodes.len());
        for (index, node) in self.nodes.iter().enumerate() {
            let id = node
                .add_to(&mut set)
                .with_context(|| format!("Invalid node {index} ({})", node.name()))?;
            ids.push(id);
        }
        Ok((set, ids))
    }
}

impl NodeConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Position { .. } => "position",
            Self::Velocity { .. } => "velocity",
            Self::Acceleration { .. } => "acceleration",
            Self::Scale { .. } => "scale",
            Self::RotationalVelocity { .. } => "rotational_velocity",
            Self::RotateToHeading => "rotate_to_heading",
            Self::Billboard { .. } => "billboard",
            Self::Follow => "follow",
            Self::Uv { .. } => "uv",
            Self::SpriteSheet { .. } => "sprite_sheet",
            Self::Color { .. } => "color",
        }
    }

    fn add_to(&self, set: &mut ParticleAnimationSet) -> Result<NodeId> {
        let id = match *self {
            Self::Position { mode, value } => match value {
                Some(value) => set.add_node(PositionNode::global(value)),
                None => set.add_node(PositionNode::local(local_mode(mode)?)),
            },
            Self::Velocity { mode, value } => match value {
                Some(value) => set.add_node(VelocityNode::global(value)),
                None => set.add_node(VelocityNode::local(local_mode(mode)?)),
            },
            Self::Acceleration { mode, value } => match value {
                Some(value) => set.add_node(AccelerationNode::global(value)),
                None => set.add_node(AccelerationNode::local(local_mode(mode)?)),
            },
            Self::Scale {
                mode,
                min,
                max,
                cycle,
                phase,
            } => match (min, max) {
                (Some(min), Some(max)) => match cycle {
                    Some(cycle) => set.add_node(ScaleNode::global_cycle(min, max, cycle, phase)),
                    None => set.add_node(ScaleNode::global(min, max)),
                },
                (None, None) => set.add_node(ScaleNode::local(
                    local_mode(mode)?,
                    cycle.is_some(),
                    phase.is_some(),
                )),
                _ => bail!("scale needs both min and max"),
            },
            Self::RotationalVelocity { mode, axis, period } => match (axis, period) {
                (Some(axis), Some(period)) => {
                    set.add_node(RotationalVelocityNode::global(axis, period))
                }
                (None, None) => set.add_node(RotationalVelocityNode::local(local_mode(mode)?)),
                _ => bail!("rotational velocity needs both axis and period"),
            },
            Self::RotateToHeading => set.add_node(RotateToHeadingNode::new()),
            Self::Billboard { axis } => set.add_node(BillboardNode::with_axis(axis)),
            Self::Follow => set.add_node(FollowNode::new()),
            Self::Uv {
                mode,
                axis,
                cycle,
                scale,
            } => match cycle {
                Some(cycle) => set.add_node(UvNode::global(axis, cycle, scale.unwrap_or(1.0))),
                None => set.add_node(UvNode::local(local_mode(mode)?, axis)),
            },
            Self::SpriteSheet {
                columns,
                rows,
                total_frames,
                cycle,
                phase,
            } => {
                let node = SpriteSheetNode::new(columns, rows, total_frames);
                match cycle {
                    Some(cycle) => set.add_node(node.with_cycle(cycle, phase)),
                    None => set.add_node(node),
                }
            }
            Self::Color {
                mode,
                multiplier,
                offset,
                start,
                end,
                cycle,
                phase,
            } => {
                let node = match (start, end) {
                    (Some(start), Some(end)) => ColorNode::global(multiplier, offset, start, end),
                    (None, None) => ColorNode::local(local_mode(mode)?, multiplier, offset),
                    _ => bail!("color needs both start and end"),
                };
                match cycle {
                    Some(cycle) => set.add_node(node.with_cycle(cycle, phase)),
                    None => set.add_node(node),
                }
            }
        };
        Ok(id?)
    }
}
