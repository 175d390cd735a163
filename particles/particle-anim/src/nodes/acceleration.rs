//! Constant acceleration: `offset += a * t^2 / 2`

use glam::Vec3;

use crate::cache::AnimationRegisterCache;
use crate::error::Result;
use crate::properties::{ParticleProperties, ParticlePropertiesMode};

use super::{FrameState, NodeInfo, ParticleNode, constant_index, missing};

const ACCELERATION: usize = 0;

/// Stores half the acceleration so the shader only multiplies by `t^2`
#[derive(Debug, Clone)]
pub struct AccelerationNode {
    info: NodeInfo,
    acceleration: Vec3,
}

impl AccelerationNode {
    pub fn local(mode: ParticlePropertiesMode) -> Self {
        Self {
            info: NodeInfo::new("acceleration", mode, 3, 1),
            acceleration: Vec3::ZERO,
        }
    }

    pub fn global(acceleration: Vec3) -> Self {
        Self {
            info: NodeInfo::new("acceleration", ParticlePropertiesMode::Global, 3, 1),
            acceleration,
        }
    }
}

impl ParticleNode for AccelerationNode {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn generate_vertex_code(&self, cache: &mut AnimationRegisterCache) -> Result<String> {
        let value = cache.node_value(&self.info, ACCELERATION, 0, 3)?;
        let shared = cache.shared()?.clone();
        let temp = cache.acquire_vertex_temp()?;

        let mut code = String::new();
        emit!(code, "mul", temp.xyz(), shared.vertex_time, value.xyz());
        if let Some(velocity) = shared.velocity_target {
            // v = a * t, the stored value being a / 2
            let doubled = cache.acquire_vertex_temp()?;
            emit!(code, "mul", doubled.xyz(), temp.xyz(), shared.vertex_two_const);
            emit!(code, "add", velocity.xyz(), doubled.xyz(), velocity.xyz());
            cache.release_vertex_temp(doubled);
        }
        emit!(code, "mul", temp.xyz(), temp.xyz(), shared.vertex_time);
        emit!(
            code,
            "add",
            shared.position_target.xyz(),
            temp.xyz(),
            shared.position_target.xyz()
        );
        cache.release_vertex_temp(temp);
        Ok(code)
    }

    fn generate_one_particle_property(
        &self,
        properties: &ParticleProperties,
        out: &mut [f32],
    ) -> Result<()> {
        let acceleration = properties
            .acceleration
            .ok_or_else(|| missing(self.info.name(), "acceleration"))?;
        out.copy_from_slice(&(acceleration * 0.5).to_array());
        Ok(())
    }

    fn write_constants(&self, cache: &mut AnimationRegisterCache, _frame: &FrameState) -> Result<()> {
        if self.info.mode().is_local() {
            return Ok(());
        }
        let index = constant_index(cache, &self.info, ACCELERATION)?;
        cache.set_vertex_constant_vec3(index, self.acceleration * 0.5, 0.0)
    }
}
