//! Spin around a fixed axis

use std::f32::consts::PI;

use glam::{Vec3, Vec4};

use crate::cache::AnimationRegisterCache;
use crate::error::{AnimationError, Result};
use crate::properties::{ParticleProperties, ParticlePropertiesMode};
use crate::register::ShaderRegister;

use super::{FrameState, NodeInfo, ParticleNode, constant_index, missing};

const ROTATIONAL_VELOCITY: usize = 0;

/// Rotates the particle vertex (and every rotation register, e.g. normals)
/// around an axis at a constant angular speed
///
/// Stores the normalized axis in `xyz` and the angular speed `2π / period`
/// in `w`. The rotation uses Rodrigues' formula:
/// `v' = v cos θ + (k × v) sin θ + k (k · v)(1 - cos θ)`.
#[derive(Debug, Clone)]
pub struct RotationalVelocityNode {
    info: NodeInfo,
    rotational_velocity: Vec4,
}

impl RotationalVelocityNode {
    /// Per-particle spin read from `ParticleProperties::rotational_velocity`
    pub fn local(mode: ParticlePropertiesMode) -> Self {
        Self {
            info: NodeInfo::new("rotational_velocity", mode, 4, 3),
            rotational_velocity: Vec4::new(0.0, 1.0, 0.0, 1.0),
        }
    }

    /// One spin for every particle: `axis`, and `period` seconds per turn
    pub fn global(axis: Vec3, period: f32) -> Self {
        Self {
            info: NodeInfo::new(
                "rotational_velocity",
                ParticlePropertiesMode::Global,
                4,
                3,
            ),
            rotational_velocity: axis.extend(period),
        }
    }

    fn values(&self, rotational_velocity: Vec4) -> Result<Vec4> {
        let axis = rotational_velocity.truncate();
        let period = rotational_velocity.w;
        if period <= 0.0 {
            return Err(AnimationError::InvalidProperty {
                node: self.info.name(),
                reason: format!("rotation period must be positive, got {period}"),
            });
        }
        let axis = axis.try_normalize().ok_or_else(|| AnimationError::InvalidProperty {
            node: self.info.name(),
            reason: "rotation axis must not be zero".to_string(),
        })?;
        Ok(axis.extend(2.0 * PI / period))
    }

    fn rotate(
        code: &mut String,
        target: ShaderRegister,
        axis: ShaderRegister,
        trig: ShaderRegister,
        one: ShaderRegister,
        cross: ShaderRegister,
        parallel: ShaderRegister,
    ) {
        emit!(code, "crs", cross.xyz(), axis.xyz(), target.xyz());
        emit!(code, "mul", cross.xyz(), cross.xyz(), trig.y());
        emit!(code, "dp3", parallel.w(), axis.xyz(), target.xyz());
        emit!(code, "sub", parallel.x(), one, trig.z());
        emit!(code, "mul", parallel.w(), parallel.w(), parallel.x());
        emit!(code, "mul", parallel.xyz(), axis.xyz(), parallel.w());
        emit!(code, "add", cross.xyz(), cross.xyz(), parallel.xyz());
        emit!(code, "mul", parallel.xyz(), target.xyz(), trig.z());
        emit!(code, "add", target.xyz(), cross.xyz(), parallel.xyz());
    }
}

impl ParticleNode for RotationalVelocityNode {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn generate_vertex_code(&self, cache: &mut AnimationRegisterCache) -> Result<String> {
        let value = cache.node_value(&self.info, ROTATIONAL_VELOCITY, 0, 4)?;
        let shared = cache.shared()?.clone();
        let trig = cache.acquire_vertex_temp()?;
        let cross = cache.acquire_vertex_temp()?;
        let parallel = cache.acquire_vertex_temp()?;

        let mut code = String::new();
        // trig.x = angle, trig.y = sin, trig.z = cos
        emit!(code, "mul", trig.x(), shared.vertex_time, value.w());
        emit!(code, "sin", trig.y(), trig.x());
        emit!(code, "cos", trig.z(), trig.x());
        let targets =
            std::iter::once(shared.scale_and_rotate_target).chain(shared.rotation_registers);
        for target in targets {
            Self::rotate(
                &mut code,
                target,
                value,
                trig,
                shared.vertex_one_const,
                cross,
                parallel,
            );
        }

        cache.release_vertex_temp(parallel);
        cache.release_vertex_temp(cross);
        cache.release_vertex_temp(trig);
        Ok(code)
    }

    fn generate_one_particle_property(
        &self,
        properties: &ParticleProperties,
        out: &mut [f32],
    ) -> Result<()> {
        let rotational_velocity = properties
            .rotational_velocity
            .ok_or_else(|| missing(self.info.name(), "rotational_velocity"))?;
        out.copy_from_slice(&self.values(rotational_velocity)?.to_array());
        Ok(())
    }

    fn write_constants(&self, cache: &mut AnimationRegisterCache, _frame: &FrameState) -> Result<()> {
        if self.info.mode().is_local() {
            return Ok(());
        }
        let index = constant_index(cache, &self.info, ROTATIONAL_VELOCITY)?;
        let values = self.values(self.rotational_velocity)?;
        cache.set_vertex_constant_vec4(index, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CompilationFlags, CompilationPhase, PassInfo};
    use crate::nodes::test_support::cache_at;
    use crate::profile::ShaderProfile;

    #[test]
    fn test_axis_is_normalized() {
        let node = RotationalVelocityNode::local(ParticlePropertiesMode::LocalStatic);
        let mut properties = ParticleProperties::new(0, 1);
        properties.rotational_velocity = Some(Vec4::new(0.0, 0.0, 3.0, 2.0));
        let mut out = [0.0; 4];
        node.generate_one_particle_property(&properties, &mut out)
            .unwrap();
        assert_eq!(out, [0.0, 0.0, 1.0, PI]);
    }

    #[test]
    fn test_zero_axis_rejected() {
        let node = RotationalVelocityNode::global(Vec3::ZERO, 1.0);
        assert!(matches!(
            node.values(node.rotational_velocity),
            Err(AnimationError::InvalidProperty { .. })
        ));
    }

    #[test]
    fn test_rotates_every_target() {
        let node = RotationalVelocityNode::global(Vec3::Y, 1.0);
        let mut cache = AnimationRegisterCache::default();
        cache
            .reset(
                ShaderProfile::Baseline,
                &PassInfo::default(),
                CompilationFlags::empty(),
                &["va0", "va1"],
                &["vt0", "vt1"],
            )
            .unwrap();
        cache.enter(CompilationPhase::Init).unwrap();
        cache.enter(CompilationPhase::Primary).unwrap();

        let code = node.generate_vertex_code(&mut cache).unwrap();
        assert!(code.contains("add vt0.xyz, "));
        assert!(code.contains("add vt1.xyz, "));
        assert_eq!(code.lines().count(), 3 + 2 * 9);
    }

    #[test]
    fn test_temps_released() {
        let node = RotationalVelocityNode::local(ParticlePropertiesMode::LocalStatic);
        let mut cache = cache_at(CompilationFlags::empty(), CompilationPhase::Primary);
        let before = cache.vertex_temps_in_use();
        node.generate_vertex_code(&mut cache).unwrap();
        assert_eq!(cache.vertex_temps_in_use(), before);
    }
}
