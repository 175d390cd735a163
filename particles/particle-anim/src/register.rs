//! Shader register model
//!
//! Generated code addresses a register machine. Every register belongs to a
//! [`RegisterKind`] (its pool) and has an index inside that pool. A register
//! may be narrowed to a single component (`vt2.x`) or printed with a write
//! mask (`vt2.xyz`).
//!
//! | Prefix | Kind |
//! |--------|------|
//! | `va` | vertex attribute stream |
//! | `vc` | vertex constant |
//! | `vt` | vertex temporary |
//! | `v`  | varying |
//! | `fc` | fragment constant |
//! | `ft` | fragment temporary |
//! | `op` | vertex output |
//! | `oc` | fragment output |

use std::fmt;
use std::str::FromStr;

use crate::error::{AnimationError, Result};

/// Register pool a register lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterKind {
    /// Per-vertex attribute stream (`va`)
    VertexAttribute,
    /// Vertex program constant (`vc`)
    VertexConstant,
    /// Vertex program temporary (`vt`)
    VertexTemp,
    /// Vertex to fragment interpolant (`v`)
    Varying,
    /// Fragment program constant (`fc`)
    FragmentConstant,
    /// Fragment program temporary (`ft`)
    FragmentTemp,
    /// Vertex position output (`op`)
    VertexOutput,
    /// Fragment color output (`oc`)
    FragmentOutput,
}

impl RegisterKind {
    /// Assembly prefix of this kind
    pub fn prefix(self) -> &'static str {
        match self {
            Self::VertexAttribute => "va",
            Self::VertexConstant => "vc",
            Self::VertexTemp => "vt",
            Self::Varying => "v",
            Self::FragmentConstant => "fc",
            Self::FragmentTemp => "ft",
            Self::VertexOutput => "op",
            Self::FragmentOutput => "oc",
        }
    }

    /// Output registers are singletons and carry no index
    pub fn is_output(self) -> bool {
        matches!(self, Self::VertexOutput | Self::FragmentOutput)
    }

    // Two-letter prefixes first so that "va0" never parses as varying "a0".
    const PARSE_ORDER: [Self; 8] = [
        Self::VertexAttribute,
        Self::VertexConstant,
        Self::VertexTemp,
        Self::FragmentConstant,
        Self::FragmentTemp,
        Self::VertexOutput,
        Self::FragmentOutput,
        Self::Varying,
    ];
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::VertexAttribute => "vertex attribute",
            Self::VertexConstant => "vertex constant",
            Self::VertexTemp => "vertex temporary",
            Self::Varying => "varying",
            Self::FragmentConstant => "fragment constant",
            Self::FragmentTemp => "fragment temporary",
            Self::VertexOutput => "vertex output",
            Self::FragmentOutput => "fragment output",
        };
        f.write_str(name)
    }
}

/// A single component of a four-wide register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    X,
    Y,
    Z,
    W,
}

impl Component {
    fn from_char(c: char) -> Option<Self> {
        match c {
            'x' | 'r' => Some(Self::X),
            'y' | 'g' => Some(Self::Y),
            'z' | 'b' => Some(Self::Z),
            'w' | 'a' => Some(Self::W),
            _ => None,
        }
    }

    fn as_char(self) -> char {
        match self {
            Self::X => 'x',
            Self::Y => 'y',
            Self::Z => 'z',
            Self::W => 'w',
        }
    }
}

/// A register reference, optionally narrowed to one component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderRegister {
    /// Pool of the register
    pub kind: RegisterKind,
    /// Index inside the pool
    pub index: usize,
    /// Selected component, `None` for the full register
    pub component: Option<Component>,
}

impl ShaderRegister {
    /// Full register reference
    pub const fn new(kind: RegisterKind, index: usize) -> Self {
        Self {
            kind,
            index,
            component: None,
        }
    }

    /// The same register narrowed to `component`
    pub const fn with_component(self, component: Component) -> Self {
        Self {
            component: Some(component),
            ..self
        }
    }

    /// The full register this reference points into
    pub const fn base(self) -> Self {
        Self {
            component: None,
            ..self
        }
    }

    pub const fn x(self) -> Self {
        self.with_component(Component::X)
    }

    pub const fn y(self) -> Self {
        self.with_component(Component::Y)
    }

    pub const fn z(self) -> Self {
        self.with_component(Component::Z)
    }

    pub const fn w(self) -> Self {
        self.with_component(Component::W)
    }

    /// Print the full register with a write mask or swizzle, e.g. `vt0.xyz`
    pub const fn mask(self, mask: &'static str) -> Masked {
        Masked {
            register: self.base(),
            mask,
        }
    }

    pub const fn xy(self) -> Masked {
        self.mask("xy")
    }

    pub const fn xyz(self) -> Masked {
        self.mask("xyz")
    }
}

impl fmt::Display for ShaderRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.prefix())?;
        if !self.kind.is_output() {
            write!(f, "{}", self.index)?;
        }
        if let Some(component) = self.component {
            write!(f, ".{}", component.as_char())?;
        }
        Ok(())
    }
}

impl FromStr for ShaderRegister {
    type Err = AnimationError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AnimationError::InvalidRegister(s.to_string());
        let trimmed = s.trim();
        let (name, component) = match trimmed.split_once('.') {
            Some((name, mask)) => {
                let mut chars = mask.chars();
                let component = chars.next().and_then(Component::from_char);
                if component.is_none() || chars.next().is_some() {
                    return Err(invalid());
                }
                (name, component)
            }
            None => (trimmed, None),
        };

        let kind = RegisterKind::PARSE_ORDER
            .into_iter()
            .find(|kind| name.starts_with(kind.prefix()))
            .ok_or_else(invalid)?;
        let digits = &name[kind.prefix().len()..];

        let index = if kind.is_output() {
            if !digits.is_empty() {
                return Err(invalid());
            }
            0
        } else {
            digits.parse::<usize>().map_err(|_| invalid())?
        };

        Ok(Self {
            kind,
            index,
            component,
        })
    }
}

/// A register printed with a multi-component mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Masked {
    register: ShaderRegister,
    mask: &'static str,
}

impl fmt::Display for Masked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.register, self.mask)
    }
}
