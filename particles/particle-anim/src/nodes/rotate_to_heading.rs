//! Orient particles along their velocity

use crate::cache::{AnimationRegisterCache, CompilationFlags};
use crate::error::{AnimationError, Result};
use crate::properties::ParticlePropertiesMode;

use super::{FrameState, NodeInfo, ParticleNode, SetSettings, constant_index};

const MATRIX: usize = 0;

/// Turns the particle so its local x axis follows the accumulated velocity
///
/// Adding this node makes the set expose velocity to every node. Billboarded
/// particles only rotate in the view plane, so the velocity is first taken
/// into camera space with a per-draw rotation constant.
#[derive(Debug, Clone)]
pub struct RotateToHeadingNode {
    info: NodeInfo,
}

impl RotateToHeadingNode {
    pub fn new() -> Self {
        Self {
            info: NodeInfo::new("rotate_to_heading", ParticlePropertiesMode::Global, 0, 3),
        }
    }
}

impl Default for RotateToHeadingNode {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleNode for RotateToHeadingNode {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn process_settings(&mut self, settings: &mut SetSettings) -> Result<()> {
        settings.flags |= CompilationFlags::NEED_VELOCITY;
        Ok(())
    }

    fn generate_vertex_code(&self, cache: &mut AnimationRegisterCache) -> Result<String> {
        let shared = cache.shared()?.clone();
        let velocity = shared
            .velocity_target
            .ok_or(AnimationError::InvalidConfiguration(
                "rotate_to_heading needs the velocity register".to_string(),
            ))?;
        let targets: Vec<_> = std::iter::once(shared.scale_and_rotate_target)
            .chain(shared.rotation_registers.iter().copied())
            .collect();
        let mut code = String::new();

        if cache.has(CompilationFlags::HAS_BILLBOARD) {
            let matrix = cache.free_vertex_constants(3)?;
            cache.set_register_index(self.info.id(), MATRIX, matrix.index);
            let heading = cache.acquire_vertex_temp()?;
            let temp = cache.acquire_vertex_temp()?;

            // heading.x = cos, heading.y = sin of the screen-space angle
            emit!(code, "m33", heading.xyz(), velocity.xyz(), matrix);
            emit!(code, "mov", heading.z(), shared.vertex_zero_const);
            emit!(code, "nrm", heading.xyz(), heading.xyz());
            for target in targets {
                emit!(code, "mul", temp.x(), target.x(), heading.x());
                emit!(code, "mul", temp.y(), target.y(), heading.y());
                emit!(code, "sub", temp.z(), temp.x(), temp.y());
                emit!(code, "mul", temp.x(), target.x(), heading.y());
                emit!(code, "mul", temp.y(), target.y(), heading.x());
                emit!(code, "add", target.y(), temp.x(), temp.y());
                emit!(code, "mov", target.x(), temp.z());
            }

            cache.release_vertex_temp(temp);
            cache.release_vertex_temp(heading);
        } else {
            let heading = cache.acquire_vertex_temp()?;
            let side = cache.acquire_vertex_temp()?;
            let up = cache.acquire_vertex_temp()?;
            let sum = cache.acquire_vertex_temp()?;
            let temp = cache.acquire_vertex_temp()?;

            // Basis (heading, up, side) built against the world up axis
            emit!(code, "nrm", heading.xyz(), velocity.xyz());
            emit!(code, "crs", side.xyz(), heading.xyz(), shared.vertex_zero_const.mask("xyx"));
            emit!(code, "nrm", side.xyz(), side.xyz());
            emit!(code, "crs", up.xyz(), side.xyz(), heading.xyz());
            for target in targets {
                emit!(code, "mul", sum.xyz(), heading.xyz(), target.x());
                emit!(code, "mul", temp.xyz(), up.xyz(), target.y());
                emit!(code, "add", sum.xyz(), sum.xyz(), temp.xyz());
                emit!(code, "mul", temp.xyz(), side.xyz(), target.z());
                emit!(code, "add", target.xyz(), sum.xyz(), temp.xyz());
            }

            for register in [temp, sum, up, side, heading] {
                cache.release_vertex_temp(register);
            }
        }
        Ok(code)
    }

    fn write_constants(&self, cache: &mut AnimationRegisterCache, frame: &FrameState) -> Result<()> {
        if !cache.has(CompilationFlags::HAS_BILLBOARD) {
            return Ok(());
        }
        let index = constant_index(cache, &self.info, MATRIX)?;
        cache.set_vertex_constant_matrix3(index, frame.camera_rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CompilationPhase;
    use crate::nodes::test_support::{cache_at, finish};
    use glam::Mat3;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_requests_velocity() {
        let mut node = RotateToHeadingNode::new();
        let mut settings = SetSettings::default();
        node.process_settings(&mut settings).unwrap();
        assert!(settings.flags.contains(CompilationFlags::NEED_VELOCITY));
    }

    #[test]
    fn test_without_velocity_register() {
        let node = RotateToHeadingNode::new();
        let mut cache = cache_at(CompilationFlags::empty(), CompilationPhase::Primary);
        assert!(matches!(
            node.generate_vertex_code(&mut cache),
            Err(AnimationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_basis_uses_up_axis() {
        let node = RotateToHeadingNode::new();
        let mut cache = cache_at(CompilationFlags::NEED_VELOCITY, CompilationPhase::Primary);
        let code = node.generate_vertex_code(&mut cache).unwrap();
        let mut lines = code.lines();
        assert_eq!(lines.next(), Some("nrm vt3.xyz, vt2.xyz"));
        assert_eq!(lines.next(), Some("crs vt4.xyz, vt3.xyz, vc0.xyx"));
        assert_eq!(code.lines().last(), Some("add vt0.xyz, vt6.xyz, vt7.xyz"));
        assert_eq!(cache.vertex_temps_in_use(), 3);
    }

    #[test]
    fn test_billboard_matrix_constant() {
        let node = RotateToHeadingNode::new();
        let mut cache = cache_at(
            CompilationFlags::NEED_VELOCITY | CompilationFlags::HAS_BILLBOARD,
            CompilationPhase::Primary,
        );
        let code = node.generate_vertex_code(&mut cache).unwrap();
        assert!(code.starts_with("m33 vt3.xyz, vt2.xyz, vc1\n"));
        assert!(code.ends_with("mov vt0.x, vt4.z\n"));

        finish(&mut cache);
        let rotation = Mat3::from_rotation_z(0.5);
        node.write_constants(
            &mut cache,
            &FrameState {
                time: 0.0,
                camera_rotation: rotation,
            },
        )
        .unwrap();
        assert_eq!(&cache.vertex_constant_data()[4..7], &rotation.row(0).to_array());
    }
}
