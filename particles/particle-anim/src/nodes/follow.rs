//! Particles trailing a moving emitter

use crate::animation_data::DynamicParticleRecord;
use crate::cache::AnimationRegisterCache;
use crate::error::Result;
use crate::properties::ParticlePropertiesMode;

use super::{NodeInfo, POST_PRIORITY, ParticleNode};

const FOLLOW: usize = 0;

/// Adds a per-particle offset rewritten every frame
///
/// The offset lives in the dynamic vertex buffer; fill it through
/// `ParticleAnimationSet::write_dynamic_values`, typically with the emitter
/// position sampled at [`follow_target_time`].
#[derive(Debug, Clone)]
pub struct FollowNode {
    info: NodeInfo,
}

impl FollowNode {
    pub fn new() -> Self {
        Self {
            info: NodeInfo::new(
                "follow",
                ParticlePropertiesMode::LocalDynamic,
                3,
                POST_PRIORITY,
            ),
        }
    }
}

impl Default for FollowNode {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleNode for FollowNode {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn generate_vertex_code(&self, cache: &mut AnimationRegisterCache) -> Result<String> {
        let value = cache.bind_stream(&self.info, FOLLOW, 0, 3)?;
        let target = cache.shared()?.scale_and_rotate_target;
        let mut code = String::new();
        emit!(code, "add", target.xyz(), value.xyz(), target.xyz());
        Ok(code)
    }
}

/// Time at which a particle left the emitter during its current loop
///
/// Before the first emission the particle start time is returned. Without
/// looping (`looping == false`) the start time is always the emission time.
pub fn follow_target_time(record: &DynamicParticleRecord, now: f32, looping: bool) -> f32 {
    let period = record.duration + record.delay;
    if !looping || now <= record.start_time || period <= 0.0 {
        return record.start_time;
    }
    let loops = ((now - record.start_time) / period).floor();
    record.start_time + loops * period
}
