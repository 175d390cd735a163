//! Constant velocity integrated over particle time

use glam::Vec3;

use crate::cache::AnimationRegisterCache;
use crate::error::Result;
use crate::properties::{ParticleProperties, ParticlePropertiesMode};

use super::{FrameState, NodeInfo, ParticleNode, constant_index, missing};

const VELOCITY: usize = 0;

#[derive(Debug, Clone)]
pub struct VelocityNode {
    info: NodeInfo,
    velocity: Vec3,
}

impl VelocityNode {
    /// Per-particle velocity read from `ParticleProperties::velocity`
    pub fn local(mode: ParticlePropertiesMode) -> Self {
        Self {
            info: NodeInfo::new("velocity", mode, 3, 1),
            velocity: Vec3::ZERO,
        }
    }

    pub fn global(velocity: Vec3) -> Self {
        Self {
            info: NodeInfo::new("velocity", ParticlePropertiesMode::Global, 3, 1),
            velocity,
        }
    }
}

impl ParticleNode for VelocityNode {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn generate_vertex_code(&self, cache: &mut AnimationRegisterCache) -> Result<String> {
        let value = cache.node_value(&self.info, VELOCITY, 0, 3)?;
        let shared = cache.shared()?.clone();
        let distance = cache.acquire_vertex_temp()?;

        let mut code = String::new();
        emit!(code, "mul", distance.xyz(), shared.vertex_time, value.xyz());
        emit!(
            code,
            "add",
            shared.position_target.xyz(),
            distance.xyz(),
            shared.position_target.xyz()
        );
        if let Some(velocity) = shared.velocity_target {
            emit!(code, "add", velocity.xyz(), value.xyz(), velocity.xyz());
        }
        cache.release_vertex_temp(distance);
        Ok(code)
    }

    fn generate_one_particle_property(
        &self,
        properties: &ParticleProperties,
        out: &mut [f32],
    ) -> Result<()> {
        let velocity = properties
            .velocity
            .ok_or_else(|| missing(self.info.name(), "velocity"))?;
        out.copy_from_slice(&velocity.to_array());
        Ok(())
    }

    fn write_constants(&self, cache: &mut AnimationRegisterCache, _frame: &FrameState) -> Result<()> {
        if self.info.mode().is_local() {
            return Ok(());
        }
        let index = constant_index(cache, &self.info, VELOCITY)?;
        cache.set_vertex_constant_vec3(index, self.velocity, 0.0)
    }
}
