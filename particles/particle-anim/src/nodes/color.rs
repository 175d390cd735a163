//! Color multiplier and offset animated over life or a cycle

use std::f32::consts::PI;

use glam::Vec4;
use log::warn;

use crate::cache::{AnimationRegisterCache, CompilationFlags};
use crate::error::{AnimationError, Result};
use crate::properties::{ColorTransform, ParticleProperties, ParticlePropertiesMode};

use super::{COLOR_PRIORITY, FrameState, NodeInfo, ParticleNode, SetSettings, constant_index, missing};

const START_MULTIPLIER: usize = 0;
const DELTA_MULTIPLIER: usize = 1;
const START_OFFSET: usize = 2;
const DELTA_OFFSET: usize = 3;
const CYCLE: usize = 4;

/// Interpolates a [`ColorTransform`] from a start to an end value
///
/// Over life the color moves linearly from start to end. With a cycle it
/// oscillates between both, so the stored start is the midpoint and the delta
/// is half the difference. Each enabled part (multiplier, offset) stores a
/// start and a delta vector, eight floats per part in local modes.
#[derive(Debug, Clone)]
pub struct ColorNode {
    info: NodeInfo,
    uses_multiplier: bool,
    uses_offset: bool,
    cycle_duration: Option<f32>,
    cycle_phase: Option<f32>,
    start: ColorTransform,
    end: ColorTransform,
}

impl ColorNode {
    /// Per-particle colors read from `ParticleProperties::color_start` and
    /// `color_end`
    pub fn local(mode: ParticlePropertiesMode, uses_multiplier: bool, uses_offset: bool) -> Self {
        Self::build(
            mode,
            uses_multiplier,
            uses_offset,
            ColorTransform::default(),
            ColorTransform::default(),
        )
    }

    pub fn global(
        uses_multiplier: bool,
        uses_offset: bool,
        start: ColorTransform,
        end: ColorTransform,
    ) -> Self {
        Self::build(
            ParticlePropertiesMode::Global,
            uses_multiplier,
            uses_offset,
            start,
            end,
        )
    }

    fn build(
        mode: ParticlePropertiesMode,
        uses_multiplier: bool,
        uses_offset: bool,
        start: ColorTransform,
        end: ColorTransform,
    ) -> Self {
        let data_length = if mode.is_local() {
            8 * (usize::from(uses_multiplier) + usize::from(uses_offset))
        } else {
            0
        };
        Self {
            info: NodeInfo::new("color", mode, data_length, COLOR_PRIORITY),
            uses_multiplier,
            uses_offset,
            cycle_duration: None,
            cycle_phase: None,
            start,
            end,
        }
    }

    /// Oscillate every `duration` seconds, shifted by `phase` degrees
    #[must_use]
    pub fn with_cycle(mut self, duration: f32, phase: Option<f32>) -> Self {
        self.cycle_duration = Some(duration);
        self.cycle_phase = phase;
        self
    }

    /// `(start, delta)` pairs for the enabled parts, multiplier first
    fn parts(&self, start: &ColorTransform, end: &ColorTransform) -> Vec<(Vec4, Vec4)> {
        let blend = |from: Vec4, to: Vec4| {
            if self.cycle_duration.is_some() {
                ((from + to) / 2.0, (from - to) / 2.0)
            } else {
                (from, to - from)
            }
        };
        let mut parts = Vec::with_capacity(2);
        if self.uses_multiplier {
            parts.push(blend(start.multiplier, end.multiplier));
        }
        if self.uses_offset {
            parts.push(blend(start.offset, end.offset));
        }
        parts
    }

    fn cycle_constant(&self) -> Option<[f32; 4]> {
        let cycle = self.cycle_duration?;
        let phase = self.cycle_phase.unwrap_or(0.0);
        Some([2.0 * PI / cycle, phase * PI / 180.0, 0.0, 0.0])
    }
}

impl ParticleNode for ColorNode {
    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn process_settings(&mut self, settings: &mut SetSettings) -> Result<()> {
        if let Some(cycle) = self.cycle_duration
            && cycle <= 0.0
        {
            return Err(AnimationError::InvalidConfiguration(format!(
                "color cycle duration must be positive, got {cycle}"
            )));
        }
        if self.uses_multiplier {
            settings.flags |= CompilationFlags::HAS_COLOR_MUL_NODE;
        }
        if self.uses_offset {
            settings.flags |= CompilationFlags::HAS_COLOR_ADD_NODE;
        }
        Ok(())
    }

    fn generate_vertex_code(&self, cache: &mut AnimationRegisterCache) -> Result<String> {
        let mut code = String::new();
        if !cache.has(CompilationFlags::NEED_FRAGMENT_ANIMATION) {
            warn!("Color node ignored: the material pass does not animate fragment color");
            return Ok(code);
        }
        let shared = cache.shared()?.clone();
        let temp = cache.acquire_vertex_temp()?;

        let factor = if self.cycle_duration.is_some() {
            let cycle = cache.free_vertex_constant()?;
            cache.set_register_index(self.info.id(), CYCLE, cycle.index);
            let wave = cache.acquire_vertex_scalar_temp()?;
            emit!(code, "mul", wave, shared.vertex_time, cycle.x());
            if self.cycle_phase.is_some() {
                emit!(code, "add", wave, wave, cycle.y());
            }
            emit!(code, "sin", wave, wave);
            Some(wave)
        } else {
            None
        };
        let blend = factor.unwrap_or(shared.vertex_life);

        let mut sub_offset = 0;
        if self.uses_multiplier {
            let target = cache.color_mul_target().ok_or(AnimationError::NotCompiled)?;
            let start = cache.node_value(&self.info, START_MULTIPLIER, sub_offset, 4)?;
            let delta = cache.node_value(&self.info, DELTA_MULTIPLIER, sub_offset + 4, 4)?;
            emit!(code, "mul", temp, delta, blend);
            emit!(code, "add", temp, temp, start);
            emit!(code, "mul", target, temp, target);
            sub_offset += 8;
        }
        if self.uses_offset {
            let target = cache.color_add_target().ok_or(AnimationError::NotCompiled)?;
            let start = cache.node_value(&self.info, START_OFFSET, sub_offset, 4)?;
            let delta = cache.node_value(&self.info, DELTA_OFFSET, sub_offset + 4, 4)?;
            emit!(code, "mul", temp, delta, blend);
            emit!(code, "add", temp, temp, start);
            emit!(code, "add", target, temp, target);
        }

        if let Some(wave) = factor {
            cache.release_vertex_temp(wave);
        }
        cache.release_vertex_temp(temp);
        Ok(code)
    }

    fn generate_one_particle_property(
        &self,
        properties: &ParticleProperties,
        out: &mut [f32],
    ) -> Result<()> {
        let start = properties
            .color_start
            .ok_or_else(|| missing(self.info.name(), "color_start"))?;
        let end = properties
            .color_end
            .ok_or_else(|| missing(self.info.name(), "color_end"))?;
        for ((start, delta), chunk) in self.parts(&start, &end).into_iter().zip(out.chunks_mut(8)) {
            chunk[..4].copy_from_slice(&start.to_array());
            chunk[4..].copy_from_slice(&delta.to_array());
        }
        Ok(())
    }

    fn write_constants(&self, cache: &mut AnimationRegisterCache, _frame: &FrameState) -> Result<()> {
        if !cache.has(CompilationFlags::NEED_FRAGMENT_ANIMATION) {
            return Ok(());
        }
        if let Some(cycle) = self.cycle_constant() {
            let index = constant_index(cache, &self.info, CYCLE)?;
            cache.set_vertex_constant(index, cycle)?;
        }
        if self.info.mode().is_local() {
            return Ok(());
        }
        let slots = [(START_MULTIPLIER, DELTA_MULTIPLIER), (START_OFFSET, DELTA_OFFSET)];
        let enabled = [self.uses_multiplier, self.uses_offset];
        let mut parts = self.parts(&self.start, &self.end).into_iter();
        for ((start_slot, delta_slot), _) in slots.into_iter().zip(enabled).filter(|(_, on)| *on) {
            let Some((start, delta)) = parts.next() else {
                break;
            };
            let index = constant_index(cache, &self.info, start_slot)?;
            cache.set_vertex_constant_vec4(index, start)?;
            let index = constant_index(cache, &self.info, delta_slot)?;
            cache.set_vertex_constant_vec4(index, delta)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CompilationPhase;
    use crate::nodes::test_support::{cache_at, finish};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn color_cache(flags: CompilationFlags) -> AnimationRegisterCache {
        let mut cache = cache_at(flags, CompilationPhase::ColorInit);
        cache.init_color_registers().unwrap();
        cache.enter(CompilationPhase::Color).unwrap();
        cache
    }

    #[test_case(true, false, 8)]
    #[test_case(false, true, 8)]
    #[test_case(true, true, 16)]
    #[test_case(false, false, 0)]
    fn test_local_data_length(mul: bool, add: bool, expected: usize) {
        let node = ColorNode::local(ParticlePropertiesMode::LocalStatic, mul, add);
        assert_eq!(node.info().data_length(), expected);
    }

    #[test]
    fn test_global_has_no_vertex_data() {
        let node = ColorNode::global(
            true,
            true,
            ColorTransform::default(),
            ColorTransform::default(),
        );
        assert_eq!(node.info().data_length(), 0);
    }

    #[test]
    fn test_multiplier_code() {
        let node = ColorNode::local(ParticlePropertiesMode::LocalStatic, true, false);
        let mut cache = color_cache(
            CompilationFlags::NEED_FRAGMENT_ANIMATION | CompilationFlags::HAS_COLOR_MUL_NODE,
        );
        let code = node.generate_vertex_code(&mut cache).unwrap();
        assert_eq!(
            code,
            "mul vt4, va1, vt2.y\n\
             add vt4, vt4, va0\n\
             mul vt3, vt4, vt3\n"
        );
        let offsets: Vec<_> = cache
            .stream_bindings()
            .iter()
            .map(|binding| binding.offset)
            .collect();
        assert_eq!(offsets, vec![0, 4]);
    }

    #[test]
    fn test_suppressed_without_fragment_animation() {
        let node = ColorNode::local(ParticlePropertiesMode::LocalStatic, true, true);
        let mut cache = color_cache(
            CompilationFlags::HAS_COLOR_MUL_NODE | CompilationFlags::HAS_COLOR_ADD_NODE,
        );
        assert_eq!(node.generate_vertex_code(&mut cache).unwrap(), "");
        assert!(cache.stream_bindings().is_empty());
    }

    #[test]
    fn test_life_property_layout() {
        let node = ColorNode::local(ParticlePropertiesMode::LocalStatic, true, true);
        let mut properties = ParticleProperties::new(0, 1);
        properties.color_start = Some(ColorTransform::new(Vec4::ONE, Vec4::ZERO));
        properties.color_end = Some(ColorTransform::new(
            Vec4::new(0.0, 0.5, 1.0, 0.0),
            Vec4::splat(0.25),
        ));
        let mut out = [0.0; 16];
        node.generate_one_particle_property(&properties, &mut out)
            .unwrap();
        assert_eq!(
            out,
            [
                1.0, 1.0, 1.0, 1.0, -1.0, -0.5, 0.0, -1.0, //
                0.0, 0.0, 0.0, 0.0, 0.25, 0.25, 0.25, 0.25,
            ]
        );
    }

    #[test]
    fn test_cycle_property_layout() {
        let node = ColorNode::local(ParticlePropertiesMode::LocalStatic, true, false)
            .with_cycle(1.0, None);
        let mut properties = ParticleProperties::new(0, 1);
        properties.color_start = Some(ColorTransform::multiply(1.0, 1.0, 1.0, 1.0));
        properties.color_end = Some(ColorTransform::multiply(0.0, 0.0, 0.0, 1.0));
        let mut out = [0.0; 8];
        node.generate_one_particle_property(&properties, &mut out)
            .unwrap();
        assert_eq!(out, [0.5, 0.5, 0.5, 1.0, 0.5, 0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_missing_end_color() {
        let node = ColorNode::local(ParticlePropertiesMode::LocalStatic, true, false);
        let mut properties = ParticleProperties::new(0, 1);
        properties.color_start = Some(ColorTransform::default());
        let mut out = [0.0; 8];
        assert_eq!(
            node.generate_one_particle_property(&properties, &mut out),
            Err(AnimationError::MissingProperty {
                node: "color",
                property: "color_end",
            })
        );
    }

    #[test]
    fn test_global_constants() {
        let node = ColorNode::global(
            false,
            true,
            ColorTransform::new(Vec4::ONE, Vec4::ZERO),
            ColorTransform::new(Vec4::ONE, Vec4::splat(0.5)),
        )
        .with_cycle(2.0, Some(90.0));
        let mut settings = SetSettings::default();
        node.clone().process_settings(&mut settings).unwrap();
        let mut cache = color_cache(settings.flags | CompilationFlags::NEED_FRAGMENT_ANIMATION);
        let code = node.generate_vertex_code(&mut cache).unwrap();
        assert!(code.starts_with("mul vt5.x, vt2.x, vc1.x\nadd vt5.x, vt5.x, vc1.y\nsin vt5.x, vt5.x\n"));

        finish(&mut cache);
        node.write_constants(&mut cache, &FrameState::default())
            .unwrap();
        let data = cache.vertex_constant_data();
        assert_eq!(data[4], PI);
        assert_eq!(&data[8..12], &[0.25; 4]);
        assert_eq!(&data[12..16], &[-0.25; 4]);
    }
}
