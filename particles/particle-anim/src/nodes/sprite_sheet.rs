//! Frame-by-frame sprite sheet playback

use crate::cache::{AnimationRegisterCache, CompilationFlags};
use crate::error::{AnimationError, Result};
use crate::nodes::POST_PRIORITY;
use crate::properties::ParticlePropertiesMode;

use super::{FrameState, NodeInfo, ParticleNode, SetSettings, constant_index};

const SHEET: usize = 0;
const PHASE: usize = 1;

/// Steps texture coordinates through the cells of a sprite sheet
///
/// Frames advance over the particle life, or over a fixed cycle when one is
/// given. Without a cycle the set must use particle duration.
#[derive(Debug, Clone)]
pub struct SpriteSheetNode {
    info: NodeInfo,
    columns: u32,
    rows: u32,
    total_frames: u32,
    cycle_duration: Option<f32>,
    cycle_phase: Option<f32>,
}

impl SpriteSheetNode {
    /// Sheet of `columns` x `rows` cells, `total_frames` of them used
    /// (all cells when `None`)
    pub fn new(columns: u32, rows: u32, total_frames: Option<u32>) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        Self {
            info: NodeInfo::new(
                "sprite_sheet",
                ParticlePropertiesMode::Global,
                0,
                POST_PRIORITY + 1,
            ),
            columns,
            rows,
            total_frames: total_frames.unwrap_or(columns * rows).min(columns * rows),
            cycle_duration: None,
            cycle_phase: None,
        }
    }

    /// Loop the animation every `duration` seconds, shifted by `phase` degrees
    #[must_use]
    pub fn with_cycle(mut self, duration: f32, phase: Option<f32>) -> Self {
        self.cycle_duration = Some(duration);
        self.cycle_phase = phase;
        self
    }

    pub fn uses_cycle(&self) -> bool {
        self.cycle_duration.is_some()
    }

    /// `[u speed, u step, v step, cycle]`
    pub fn sheet_constant(&self) -> [f32; 4] {
        let u_step = 1.0 / self.columns as f32;
        let v_step = 1.0 / self.rows as f32;
        let u_total = self.total_frames as f32 / self.columns as f32;
        match self.cycle_duration {
            Some(cycle) => [u_total / cycle, u_step, v_step, cycle],
            None => [u_total, u_step, v_step, 0.0],
        }
    }

    /// Phase shift as time offset into the cycle
    pub fn phase_time(&self) -> Option<f32> {
        let cycle = self.cycle_duration?;
        self.cycle_phase.map(|phase| phase / 360.0 * cycle)
    }
}

impl ParticleNode for SpriteSheetNode {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn process_settings(&mut self, settings: &mut SetSettings) -> Result<()> {
        match self.cycle_duration {
            Some(cycle) if cycle <= 0.0 => {
                return Err(AnimationError::InvalidConfiguration(format!(
                    "sprite sheet cycle duration must be positive, got {cycle}"
                )));
            }
            None if !settings.uses_duration => {
                return Err(AnimationError::InvalidConfiguration(
                    "a sprite sheet without cycle needs an animation set using duration"
                        .to_string(),
                ));
            }
            _ => {}
        }
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
        let shared = cache.shared()?.clone();

        let sheet = cache.free_vertex_constant()?;
        cache.set_register_index(self.info.id(), SHEET, sheet.index);
        let phase = match self.phase_time() {
            Some(_) => {
                let phase = cache.free_vertex_constant()?;
                cache.set_register_index(self.info.id(), PHASE, phase.index);
                Some(phase)
            }
            None => None,
        };

        let (u_speed, u_step, v_step, cycle) = (sheet.x(), sheet.y(), sheet.z(), sheet.w());
        let temp = cache.acquire_vertex_temp()?;
        let (time, v_offset, frame, whole) = (temp.x(), temp.y(), temp.z(), temp.w());
        let (u, v) = (uv.target.x(), uv.target.y());
        let multi_row = self.rows > 1;

        emit!(code, "mul", u, u, u_step);
        if multi_row {
            emit!(code, "mul", v, v, v_step);
        }
        if self.uses_cycle() {
            match phase {
                Some(phase) => emit!(code, "add", time, shared.vertex_time, phase.x()),
                None => emit!(code, "mov", time, shared.vertex_time),
            }
            emit!(code, "div", time, time, cycle);
            emit!(code, "frc", time, time);
            emit!(code, "mul", time, time, cycle);
            emit!(code, "mul", frame, time, u_speed);
        } else {
            emit!(code, "mul", frame, shared.vertex_life, u_speed);
        }
        if multi_row {
            emit!(code, "frc", whole, frame);
            emit!(code, "sub", v_offset, frame, whole);
            emit!(code, "mul", v_offset, v_offset, v_step);
            emit!(code, "add", v, v, v_offset);
        }
        emit!(code, "div", whole, frame, u_step);
        emit!(code, "frc", frame, whole);
        emit!(code, "sub", whole, whole, frame);
        emit!(code, "mul", frame, whole, u_step);
        if multi_row {
            emit!(code, "frc", frame, frame);
        }
        emit!(code, "add", u, u, frame);
        cache.release_vertex_temp(temp);
        Ok(code)
    }

    fn write_constants(&self, cache: &mut AnimationRegisterCache, _frame: &FrameState) -> Result<()> {
        if !cache.has(CompilationFlags::NEED_UV_ANIMATION) {
            return Ok(());
        }
        let index = constant_index(cache, &self.info, SHEET)?;
        cache.set_vertex_constant(index, self.sheet_constant())?;
        if let Some(phase_time) = self.phase_time() {
            let index = constant_index(cache, &self.info, PHASE)?;
            cache.set_vertex_constant(index, [phase_time, 0.0, 0.0, 0.0])?;
        }
        Ok(())
    }
}
