//! Oscillating texture coordinate scroll

use std::f32::consts::PI;

use glam::Vec2;

use crate::cache::{AnimationRegisterCache, CompilationFlags};
use crate::error::{AnimationError, Result};
use crate::nodes::POST_PRIORITY;
use crate::properties::{ParticleProperties, ParticlePropertiesMode};
use crate::register::ShaderRegister;

use super::{FrameState, NodeInfo, ParticleNode, SetSettings, constant_index, missing};

const UV: usize = 0;

/// Texture axis the scroll moves along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UvAxis {
    #[default]
    U,
    V,
}

impl UvAxis {
    fn component(self, register: ShaderRegister) -> ShaderRegister {
        match self {
            Self::U => register.x(),
            Self::V => register.y(),
        }
    }
}

/// Stores `[2π / cycle, scale]`; the coordinate is scaled then shifted by
/// `sin(t · 2π / cycle)`
#[derive(Debug, Clone)]
pub struct UvNode {
    info: NodeInfo,
    axis: UvAxis,
    cycle: f32,
    scale: f32,
}

impl UvNode {
    /// Per-particle scroll read from `ParticleProperties::uv`
    pub fn local(mode: ParticlePropertiesMode, axis: UvAxis) -> Self {
        Self {
            info: NodeInfo::new("uv", mode, 2, POST_PRIORITY + 1),
            axis,
            cycle: 1.0,
            scale: 1.0,
        }
    }

    pub fn global(axis: UvAxis, cycle: f32, scale: f32) -> Self {
        Self {
            info: NodeInfo::new("uv", ParticlePropertiesMode::Global, 2, POST_PRIORITY + 1),
            axis,
            cycle,
            scale,
        }
    }

    fn values(&self, cycle: f32, scale: f32) -> Result<Vec2> {
        if cycle <= 0.0 {
            return Err(AnimationError::InvalidProperty {
                node: self.info.name(),
                reason: format!("cycle duration must be positive, got {cycle}"),
            });
        }
        Ok(Vec2::new(2.0 * PI / cycle, scale))
    }
}

impl ParticleNode for UvNode {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn process_settings(&mut self, settings: &mut SetSettings) -> Result<()> {
        settings.flags |= CompilationFlags::HAS_UV_NODE;
        Ok(())
    }

    fn generate_vertex_code(&self, _cache: &mut AnimationRegisterCache) -> Result<String> {
        Ok(String::new())
    }

    fn generate_uv_code(&self, cache: &mut AnimationRegisterCache) -> Result<String> {
        let mut code = String::new();
        if !cache.has(CompilationFlags::NEED_UV_ANIMATION) {
            return Ok(code);
        }
        let uv = cache.uv_registers().ok_or(AnimationError::NotCompiled)?;
        let value = cache.node_value(&self.info, UV, 0, 2)?;
        let time = cache.shared()?.vertex_time;
        let target = self.axis.component(uv.target);
        let wave = cache.acquire_vertex_scalar_temp()?;

        if self.info.mode().is_local() || (self.scale - 1.0).abs() > f32::EPSILON {
            emit!(code, "mul", target, target, value.y());
        }
        emit!(code, "mul", wave, time, value.x());
        emit!(code, "sin", wave, wave);
        emit!(code, "add", target, target, wave);
        cache.release_vertex_temp(wave);
        Ok(code)
    }

    fn generate_one_particle_property(
        &self,
        properties: &ParticleProperties,
        out: &mut [f32],
    ) -> Result<()> {
        let uv = properties.uv.ok_or_else(|| missing(self.info.name(), "uv"))?;
        out.copy_from_slice(&self.values(uv.x, uv.y)?.to_array());
        Ok(())
    }

    fn write_constants(&self, cache: &mut AnimationRegisterCache, _frame: &FrameState) -> Result<()> {
        if self.info.mode().is_local() || !cache.has(CompilationFlags::NEED_UV_ANIMATION) {
            return Ok(());
        }
        let index = constant_index(cache, &self.info, UV)?;
        let values = self.values(self.cycle, self.scale)?;
        cache.set_vertex_constant(index, [values.x, values.y, 0.0, 0.0])
    }
}
