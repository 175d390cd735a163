//! Particle lifecycle: start time, duration, looping and delay

use crate::cache::AnimationRegisterCache;
use crate::error::{AnimationError, Result};
use crate::properties::{ParticleProperties, ParticlePropertiesMode};

use super::{FrameState, NodeInfo, ParticleNode, SetSettings, constant_index};

const TIME_STREAM: usize = 0;
const TIME_CONSTANT: usize = 1;

/// Mandatory node computing particle time and life
///
/// Stores `[start, duration, delay + duration, 1 / duration]` per vertex.
/// Before its start time a particle is collapsed to its origin; with a
/// duration and no looping it is collapsed again once the duration elapsed.
#[derive(Debug, Clone)]
pub struct TimeNode {
    info: NodeInfo,
    uses_duration: bool,
    uses_looping: bool,
    uses_delay: bool,
}

impl TimeNode {
    pub fn new(uses_duration: bool, uses_looping: bool, uses_delay: bool) -> Self {
        Self {
            info: NodeInfo::new("time", ParticlePropertiesMode::LocalStatic, 4, 0),
            uses_duration,
            uses_looping,
            uses_delay,
        }
    }

    pub fn from_settings(settings: &SetSettings) -> Self {
        Self::new(
            settings.uses_duration,
            settings.uses_looping,
            settings.uses_delay,
        )
    }
}

impl ParticleNode for TimeNode {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn generate_vertex_code(&self, cache: &mut AnimationRegisterCache) -> Result<String> {
        let stream = cache.bind_stream(&self.info, TIME_STREAM, 0, 4)?;
        let time_const = cache.free_vertex_constant()?;
        cache.set_register_index(self.info.id(), TIME_CONSTANT, time_const.index);

        let shared = cache.shared()?.clone();
        let target = shared.scale_and_rotate_target;
        let time = shared.vertex_time;
        let mut code = String::new();

        emit!(code, "sub", time, time_const, stream.x());
        // Collapse the particle until it has started
        let started = cache.acquire_vertex_scalar_temp()?;
        emit!(code, "sge", started, time, shared.vertex_zero_const);
        emit!(code, "mul", target.xyz(), target.xyz(), started);

        if self.uses_duration {
            if self.uses_looping {
                let cycle = cache.acquire_vertex_scalar_temp()?;
                if self.uses_delay {
                    emit!(code, "div", cycle, time, stream.z());
                    emit!(code, "frc", cycle, cycle);
                    emit!(code, "mul", time, cycle, stream.z());
                    emit!(code, "slt", cycle, time, stream.y());
                    emit!(code, "mul", target.xyz(), target.xyz(), cycle);
                } else {
                    emit!(code, "mul", cycle, time, stream.w());
                    emit!(code, "frc", cycle, cycle);
                    emit!(code, "mul", time, cycle, stream.y());
                }
                cache.release_vertex_temp(cycle.base());
            } else {
                let alive = cache.acquire_vertex_scalar_temp()?;
                emit!(code, "sge", alive, stream.y(), time);
                emit!(code, "mul", target.xyz(), target.xyz(), alive);
                cache.release_vertex_temp(alive.base());
            }
        }
        cache.release_vertex_temp(started.base());

        emit!(code, "mul", shared.vertex_life, time, stream.w());
        Ok(code)
    }

    fn generate_one_particle_property(
        &self,
        properties: &ParticleProperties,
        out: &mut [f32],
    ) -> Result<()> {
        if properties.duration <= 0.0 {
            return Err(AnimationError::InvalidProperty {
                node: self.info.name(),
                reason: format!(
                    "particle {} has non-positive duration {}",
                    properties.index, properties.duration
                ),
            });
        }
        out.copy_from_slice(&[
            properties.start_time,
            properties.duration,
            properties.delay + properties.duration,
            1.0 / properties.duration,
        ]);
        Ok(())
    }

    fn write_constants(&self, cache: &mut AnimationRegisterCache, frame: &FrameState) -> Result<()> {
        let index = constant_index(cache, &self.info, TIME_CONSTANT)?;
        cache.set_vertex_constant(index, [frame.time; 4])
    }
}
