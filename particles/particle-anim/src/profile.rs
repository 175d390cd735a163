//! Shading language profiles and their register budgets

use std::fmt;
use std::str::FromStr;

use crate::error::{AnimationError, Result};
use crate::register::RegisterKind;

/// Register counts available to one program under a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterLimits {
    pub vertex_attributes: usize,
    pub vertex_constants: usize,
    pub vertex_temps: usize,
    pub varyings: usize,
    pub fragment_constants: usize,
    pub fragment_temps: usize,
}

impl RegisterLimits {
    /// Limit for a register kind; outputs are singletons
    pub fn for_kind(&self, kind: RegisterKind) -> usize {
        match kind {
            RegisterKind::VertexAttribute => self.vertex_attributes,
            RegisterKind::VertexConstant => self.vertex_constants,
            RegisterKind::VertexTemp => self.vertex_temps,
            RegisterKind::Varying => self.varyings,
            RegisterKind::FragmentConstant => self.fragment_constants,
            RegisterKind::FragmentTemp => self.fragment_temps,
            RegisterKind::VertexOutput | RegisterKind::FragmentOutput => 1,
        }
    }
}

/// Target shading language profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ShaderProfile {
    /// Smallest register file, supported everywhere
    #[default]
    Baseline,
    /// Baseline temporaries with the larger constant and varying files
    BaselineExtended,
    /// Full register file
    Standard,
}

impl ShaderProfile {
    /// Register budget of this profile
    pub fn limits(self) -> RegisterLimits {
        match self {
            Self::Baseline => RegisterLimits {
                vertex_attributes: 8,
                vertex_constants: 128,
                vertex_temps: 8,
                varyings: 8,
                fragment_constants: 28,
                fragment_temps: 8,
            },
            Self::BaselineExtended => RegisterLimits {
                vertex_attributes: 8,
                vertex_constants: 250,
                vertex_temps: 8,
                varyings: 10,
                fragment_constants: 64,
                fragment_temps: 26,
            },
            Self::Standard => RegisterLimits {
                vertex_attributes: 8,
                vertex_constants: 250,
                vertex_temps: 26,
                varyings: 10,
                fragment_constants: 64,
                fragment_temps: 26,
            },
        }
    }

    /// Canonical profile identifier
    pub fn name(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::BaselineExtended => "baseline_extended",
            Self::Standard => "standard",
        }
    }
}

impl fmt::Display for ShaderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShaderProfile {
    type Err = AnimationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "baseline" => Ok(Self::Baseline),
            "baseline_extended" | "baselineextended" => Ok(Self::BaselineExtended),
            "standard" => Ok(Self::Standard),
            _ => Err(AnimationError::UnknownProfile(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("baseline", ShaderProfile::Baseline)]
    #[test_case("BASELINE_EXTENDED", ShaderProfile::BaselineExtended)]
    #[test_case("baseline-extended", ShaderProfile::BaselineExtended)]
    #[test_case("standard", ShaderProfile::Standard)]
    fn test_parse_profile(name: &str, expected: ShaderProfile) {
        assert_eq!(name.parse::<ShaderProfile>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_profile() {
        assert_eq!(
            "agal9".parse::<ShaderProfile>(),
            Err(AnimationError::UnknownProfile("agal9".to_string()))
        );
    }

    #[test]
    fn test_limits_grow_with_profile() {
        let baseline = ShaderProfile::Baseline.limits();
        let standard = ShaderProfile::Standard.limits();
        assert!(standard.vertex_constants > baseline.vertex_constants);
        assert!(standard.vertex_temps > baseline.vertex_temps);
        assert_eq!(baseline.for_kind(RegisterKind::VertexTemp), 8);
        assert_eq!(standard.for_kind(RegisterKind::Varying), 10);
    }
}
