//! Per-particle properties filled by the user initializer

use glam::{Vec2, Vec3, Vec4};

/// Default start time given to every particle before the initializer runs
pub const DEFAULT_START_TIME: f32 = 0.0;
/// Default lifetime in seconds
pub const DEFAULT_DURATION: f32 = 1000.0;
/// Default delay between loops in seconds
pub const DEFAULT_DELAY: f32 = 0.1;

/// Where a node's per-particle value lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ParticlePropertiesMode {
    /// One value for all particles, passed as a vertex constant
    #[default]
    Global,
    /// One value per particle, baked into the interleaved vertex buffer
    LocalStatic,
    /// One value per particle, rewritten per frame into a dynamic buffer
    LocalDynamic,
}

impl ParticlePropertiesMode {
    /// Local modes read their value from an attribute stream
    pub fn is_local(self) -> bool {
        !matches!(self, Self::Global)
    }
}

/// Multiplier and offset applied to a particle color
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorTransform {
    /// RGBA multiplier
    pub multiplier: Vec4,
    /// RGBA offset in the 0.0-1.0 range
    pub offset: Vec4,
}

impl ColorTransform {
    pub fn new(multiplier: Vec4, offset: Vec4) -> Self {
        Self { multiplier, offset }
    }

    /// Pure multiplier transform
    pub fn multiply(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            multiplier: Vec4::new(r, g, b, a),
            offset: Vec4::ZERO,
        }
    }
}

impl Default for ColorTransform {
    fn default() -> Self {
        Self {
            multiplier: Vec4::ONE,
            offset: Vec4::ZERO,
        }
    }
}

/// Property set for one particle
///
/// The generator resets the lifecycle fields to their defaults and clears
/// every optional property before calling the initializer for each particle.
/// Nodes read the fields they need; a local node whose field is `None`
/// reports a missing property.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleProperties {
    /// Index of the particle being initialised
    pub index: usize,
    /// Total number of particles in the geometry
    pub total: usize,
    /// Time at which the particle starts, in seconds
    pub start_time: f32,
    /// Lifetime, in seconds
    pub duration: f32,
    /// Pause between two loops, in seconds
    pub delay: f32,
    /// Local offset position
    pub position: Option<Vec3>,
    /// Initial velocity
    pub velocity: Option<Vec3>,
    /// Constant acceleration
    pub acceleration: Option<Vec3>,
    /// Scale: x = min, y = max, z = cycle duration, w = cycle phase (degrees)
    pub scale: Option<Vec4>,
    /// Rotational velocity: xyz = axis, w = seconds per revolution
    pub rotational_velocity: Option<Vec4>,
    /// Color transform at the start of the particle life or cycle
    pub color_start: Option<ColorTransform>,
    /// Color transform at the end of the particle life or cycle
    pub color_end: Option<ColorTransform>,
    /// UV scroll: x = cycle duration, y = scale
    pub uv: Option<Vec2>,
}

impl ParticleProperties {
    pub fn new(index: usize, total: usize) -> Self {
        Self {
            index,
            total,
            start_time: DEFAULT_START_TIME,
            duration: DEFAULT_DURATION,
            delay: DEFAULT_DELAY,
            position: None,
            velocity: None,
            acceleration: None,
            scale: None,
            rotational_velocity: None,
            color_start: None,
            color_end: None,
            uv: None,
        }
    }

    /// Reset to defaults for the next particle
    pub fn reset(&mut self, index: usize) {
        *self = Self::new(index, self.total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_keeps_total() {
        let mut properties = ParticleProperties::new(0, 12);
        properties.velocity = Some(Vec3::X);
        properties.duration = 3.0;

        properties.reset(5);
        assert_eq!(properties.index, 5);
        assert_eq!(properties.total, 12);
        assert_eq!(properties.duration, DEFAULT_DURATION);
        assert_eq!(properties.velocity, None);
    }

    #[test]
    fn test_mode_locality() {
        assert!(!ParticlePropertiesMode::Global.is_local());
        assert!(ParticlePropertiesMode::LocalStatic.is_local());
        assert!(ParticlePropertiesMode::LocalDynamic.is_local());
    }
}
