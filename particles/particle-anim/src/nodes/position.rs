//! Constant offset added to the particle position

use glam::Vec3;

use crate::cache::AnimationRegisterCache;
use crate::error::Result;
use crate::properties::{ParticleProperties, ParticlePropertiesMode};

use super::{FrameState, NodeInfo, ParticleNode, constant_index, missing};

const POSITION: usize = 0;

#[derive(Debug, Clone)]
pub struct PositionNode {
    info: NodeInfo,
    position: Vec3,
}

impl PositionNode {
    /// Per-particle offsets read from `ParticleProperties::position`
    pub fn local(mode: ParticlePropertiesMode) -> Self {
        Self {
            info: NodeInfo::new("position", mode, 3, 0),
            position: Vec3::ZERO,
        }
    }

    /// One offset shared by every particle
    pub fn global(position: Vec3) -> Self {
        Self {
            info: NodeInfo::new("position", ParticlePropertiesMode::Global, 3, 0),
            position,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }
}

impl ParticleNode for PositionNode {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn generate_vertex_code(&self, cache: &mut AnimationRegisterCache) -> Result<String> {
        let value = cache.node_value(&self.info, POSITION, 0, 3)?;
        let target = cache.shared()?.position_target;
        let mut code = String::new();
        emit!(code, "add", target.xyz(), value.xyz(), target.xyz());
        Ok(code)
    }

    fn generate_one_particle_property(
        &self,
        properties: &ParticleProperties,
        out: &mut [f32],
    ) -> Result<()> {
        let position = properties
            .position
            .ok_or_else(|| missing(self.info.name(), "position"))?;
        out.copy_from_slice(&position.to_array());
        Ok(())
    }

    fn write_constants(&self, cache: &mut AnimationRegisterCache, _frame: &FrameState) -> Result<()> {
        if self.info.mode().is_local() {
            return Ok(());
        }
        let index = constant_index(cache, &self.info, POSITION)?;
        cache.set_vertex_constant_vec3(index, self.position, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CompilationFlags, CompilationPhase, StreamSource};
    use crate::error::AnimationError;
    use crate::nodes::test_support::{cache_at, finish};

    #[test]
    fn test_local_reads_stream() {
        let node = PositionNode::local(ParticlePropertiesMode::LocalStatic);
        let mut cache = cache_at(CompilationFlags::empty(), CompilationPhase::Primary);
        let code = node.generate_vertex_code(&mut cache).unwrap();
        assert_eq!(code, "add vt1.xyz, va0.xyz, vt1.xyz\n");

        let binding = cache.stream_bindings()[0];
        assert_eq!(binding.source, StreamSource::Static);
        assert_eq!(binding.components, 3);
    }

    #[test]
    fn test_global_writes_constant() {
        let node = PositionNode::global(Vec3::new(1.0, 2.0, 3.0));
        let mut cache = cache_at(CompilationFlags::empty(), CompilationPhase::Primary);
        let code = node.generate_vertex_code(&mut cache).unwrap();
        assert_eq!(code, "add vt1.xyz, vc1.xyz, vt1.xyz\n");
        finish(&mut cache);
        node.write_constants(&mut cache, &FrameState::default())
            .unwrap();
        assert_eq!(&cache.vertex_constant_data()[4..8], &[1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_missing_position() {
        let node = PositionNode::local(ParticlePropertiesMode::LocalStatic);
        let mut out = [0.0; 3];
        assert_eq!(
            node.generate_one_particle_property(&ParticleProperties::new(0, 1), &mut out),
            Err(AnimationError::MissingProperty {
                node: "position",
                property: "position",
            })
        );
    }
}
