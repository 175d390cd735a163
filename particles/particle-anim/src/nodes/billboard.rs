//! Keep particles facing the camera

use glam::{Mat3, Vec3};

use crate::cache::{AnimationRegisterCache, CompilationFlags};
use crate::error::Result;
use crate::properties::ParticlePropertiesMode;

use super::{FrameState, NodeInfo, ParticleNode, SetSettings, constant_index};

const MATRIX: usize = 0;

/// Rotates particle vertices by the inverse camera rotation
///
/// With an axis lock the particle only turns around `axis`, facing the
/// camera as closely as the axis allows.
#[derive(Debug, Clone)]
pub struct BillboardNode {
    info: NodeInfo,
    axis: Option<Vec3>,
}

impl BillboardNode {
    pub fn new() -> Self {
        Self::with_axis(None)
    }

    pub fn with_axis(axis: Option<Vec3>) -> Self {
        Self {
            info: NodeInfo::new("billboard", ParticlePropertiesMode::Global, 0, 4),
            axis: axis.and_then(Vec3::try_normalize),
        }
    }

    pub fn axis(&self) -> Option<Vec3> {
        self.axis
    }

    /// Rotation applied to particle vertices for one camera orientation
    pub fn rotation(&self, camera_rotation: Mat3) -> Mat3 {
        let facing = camera_rotation.transpose();
        let Some(up) = self.axis else {
            return facing;
        };
        // Direction towards the camera, in particle space
        let to_camera = facing * Vec3::Z;
        let Some(right) = up.cross(to_camera).try_normalize() else {
            return facing;
        };
        let front = right.cross(up);
        Mat3::from_cols(right, up, front)
    }
}

impl Default for BillboardNode {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleNode for BillboardNode {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn process_settings(&mut self, settings: &mut SetSettings) -> Result<()> {
        settings.flags |= CompilationFlags::HAS_BILLBOARD;
        Ok(())
    }

    fn generate_vertex_code(&self, cache: &mut AnimationRegisterCache) -> Result<String> {
        let matrix = cache.free_vertex_constants(3)?;
        cache.set_register_index(self.info.id(), MATRIX, matrix.index);
        let shared = cache.shared()?.clone();
        let temp = cache.acquire_vertex_temp()?;

        let mut code = String::new();
        let targets =
            std::iter::once(shared.scale_and_rotate_target).chain(shared.rotation_registers);
        for target in targets {
            emit!(code, "m33", temp.xyz(), target.xyz(), matrix);
            emit!(code, "mov", target.xyz(), temp.xyz());
        }
        cache.release_vertex_temp(temp);
        Ok(code)
    }

    fn write_constants(&self, cache: &mut AnimationRegisterCache, frame: &FrameState) -> Result<()> {
        let index = constant_index(cache, &self.info, MATRIX)?;
        cache.set_vertex_constant_matrix3(index, self.rotation(frame.camera_rotation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CompilationPhase;
    use crate::nodes::test_support::cache_at;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_billboard_code() {
        let node = BillboardNode::new();
        let mut cache = cache_at(CompilationFlags::HAS_BILLBOARD, CompilationPhase::Primary);
        let code = node.generate_vertex_code(&mut cache).unwrap();
        assert_eq!(code, "m33 vt3.xyz, vt0.xyz, vc1\nmov vt0.xyz, vt3.xyz\n");
        assert_eq!(cache.num_used_vertex_constants(), 4);
    }

    #[test]
    fn test_sets_flag() {
        let mut node = BillboardNode::new();
        let mut settings = SetSettings::default();
        node.process_settings(&mut settings).unwrap();
        assert!(settings.flags.contains(CompilationFlags::HAS_BILLBOARD));
    }

    #[test]
    fn test_rotation_undoes_camera() {
        let node = BillboardNode::new();
        let camera = Mat3::from_rotation_y(0.7);
        let rotation = node.rotation(camera);
        let combined = camera * rotation;
        assert!(combined.abs_diff_eq(Mat3::IDENTITY, 1e-6));
    }

    #[test]
    fn test_axis_lock_keeps_axis() {
        let node = BillboardNode::with_axis(Some(Vec3::Y));
        let rotation = node.rotation(Mat3::from_rotation_y(1.2));
        // Local up stays on the locked axis
        assert!((rotation * Vec3::Y).abs_diff_eq(Vec3::Y, 1e-6));
        assert!((rotation.determinant() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_axis_lock_degenerate_view() {
        // Looking straight down the locked axis falls back to a full billboard
        let node = BillboardNode::with_axis(Some(Vec3::Z));
        let camera = Mat3::IDENTITY;
        assert_eq!(node.rotation(camera), camera.transpose());
    }
}
