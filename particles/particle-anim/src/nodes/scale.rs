//! Uniform scale over life, or oscillating over a cycle

use std::f32::consts::PI;

use glam::Vec4;

use crate::cache::AnimationRegisterCache;
use crate::error::{AnimationError, Result};
use crate::properties::{ParticleProperties, ParticlePropertiesMode};

use super::{FrameState, NodeInfo, ParticleNode, constant_index, missing};

const SCALE: usize = 0;

/// Scale interpolated from `min` to `max`
///
/// Without a cycle the scale follows particle life linearly. With a cycle it
/// oscillates sinusoidally between the two bounds, optionally phase-shifted
/// (in degrees).
///
/// | Cycle | Phase | Stored values |
/// |-------|-------|---------------|
/// | no | - | `[min, max - min]` |
/// | yes | no | `[mid, half range, 2π / cycle]` |
/// | yes | yes | `[mid, half range, 2π / cycle, phase in radians]` |
#[derive(Debug, Clone)]
pub struct ScaleNode {
    info: NodeInfo,
    uses_cycle: bool,
    uses_phase: bool,
    min: f32,
    max: f32,
    cycle_duration: f32,
    cycle_phase: f32,
}

impl ScaleNode {
    /// Per-particle scale read from `ParticleProperties::scale`
    /// (`x` min, `y` max, `z` cycle duration, `w` phase)
    pub fn local(mode: ParticlePropertiesMode, uses_cycle: bool, uses_phase: bool) -> Self {
        Self::build(mode, uses_cycle, uses_phase, 1.0, 1.0, 1.0, 0.0)
    }

    pub fn global(min: f32, max: f32) -> Self {
        Self::build(ParticlePropertiesMode::Global, false, false, min, max, 1.0, 0.0)
    }

    pub fn global_cycle(min: f32, max: f32, cycle_duration: f32, cycle_phase: Option<f32>) -> Self {
        Self::build(
            ParticlePropertiesMode::Global,
            true,
            cycle_phase.is_some(),
            min,
            max,
            cycle_duration,
            cycle_phase.unwrap_or(0.0),
        )
    }

    fn build(
        mode: ParticlePropertiesMode,
        uses_cycle: bool,
        uses_phase: bool,
        min: f32,
        max: f32,
        cycle_duration: f32,
        cycle_phase: f32,
    ) -> Self {
        let uses_phase = uses_cycle && uses_phase;
        let data_length = match (uses_cycle, uses_phase) {
            (true, true) => 4,
            (true, false) => 3,
            _ => 2,
        };
        Self {
            info: NodeInfo::new("scale", mode, data_length, 1),
            uses_cycle,
            uses_phase,
            min,
            max,
            cycle_duration,
            cycle_phase,
        }
    }

    fn values(&self, scale: Vec4) -> Result<Vec4> {
        let [min, max, cycle, phase] = scale.to_array();
        if !self.uses_cycle {
            return Ok(Vec4::new(min, max - min, 0.0, 0.0));
        }
        if cycle <= 0.0 {
            return Err(AnimationError::InvalidProperty {
                node: self.info.name(),
                reason: format!("cycle duration must be positive, got {cycle}"),
            });
        }
        Ok(Vec4::new(
            (min + max) / 2.0,
            (max - min) / 2.0,
            2.0 * PI / cycle,
            phase * PI / 180.0,
        ))
    }
}

impl ParticleNode for ScaleNode {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn generate_vertex_code(&self, cache: &mut AnimationRegisterCache) -> Result<String> {
        let value = cache.node_value(&self.info, SCALE, 0, self.info.data_length())?;
        let shared = cache.shared()?.clone();
        let temp = cache.acquire_vertex_scalar_temp()?;
        let target = shared.scale_and_rotate_target;

        let mut code = String::new();
        if self.uses_cycle {
            emit!(code, "mul", temp, shared.vertex_time, value.z());
            if self.uses_phase {
                emit!(code, "add", temp, temp, value.w());
            }
            emit!(code, "sin", temp, temp);
            emit!(code, "mul", temp, value.y(), temp);
        } else {
            emit!(code, "mul", temp, value.y(), shared.vertex_life);
        }
        emit!(code, "add", temp, value.x(), temp);
        emit!(code, "mul", target.xyz(), target.xyz(), temp);
        cache.release_vertex_temp(temp);
        Ok(code)
    }

    fn generate_one_particle_property(
        &self,
        properties: &ParticleProperties,
        out: &mut [f32],
    ) -> Result<()> {
        let scale = properties
            .scale
            .ok_or_else(|| missing(self.info.name(), "scale"))?;
        let values = self.values(scale)?.to_array();
        out.copy_from_slice(&values[..out.len()]);
        Ok(())
    }

    fn write_constants(&self, cache: &mut AnimationRegisterCache, _frame: &FrameState) -> Result<()> {
        if self.info.mode().is_local() {
            return Ok(());
        }
        let index = constant_index(cache, &self.info, SCALE)?;
        let values = self.values(Vec4::new(
            self.min,
            self.max,
            self.cycle_duration,
            self.cycle_phase,
        ))?;
        cache.set_vertex_constant_vec4(index, values)
    }
}
