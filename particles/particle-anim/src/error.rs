use thiserror::Error;

use crate::cache::CompilationPhase;
use crate::nodes::NodeId;
use crate::register::RegisterKind;

/// Error types for particle animation compilation and data generation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// Data generation was requested without a per-particle initializer
    #[error("no particle initializer set: call set_initializer before generating animation data")]
    MissingInitializer,

    /// The mesh geometry carries no particle description
    #[error("particle animation can only be performed on particle geometry")]
    NotParticleGeometry,

    /// The mesh geometry has no vertices at all
    #[error("particle geometry must contain at least one vertex")]
    EmptyGeometry,

    /// Particle runs disagree with the partition they point into
    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),

    /// A local node needed a property the initializer did not provide
    #[error("node {node} requires particle property '{property}' but the initializer did not set it")]
    MissingProperty {
        node: &'static str,
        property: &'static str,
    },

    /// A particle property holds a value the node cannot use
    #[error("invalid property for node {node}: {reason}")]
    InvalidProperty { node: &'static str, reason: String },

    /// A node rejected the animation set configuration
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A register pool ran out of slots
    #[error("register overflow: {kind} registers exhausted (needed {requested}, limit {limit})")]
    RegisterOverflow {
        kind: RegisterKind,
        requested: usize,
        limit: usize,
    },

    /// A register name could not be parsed
    #[error("invalid register: '{0}'")]
    InvalidRegister(String),

    /// An unknown shader profile name
    #[error("unknown shader profile: '{0}'")]
    UnknownProfile(String),

    /// Emission steps were invoked out of order
    #[error("compilation phase order violated: expected {expected:?}, got {found:?}")]
    PhaseOrder {
        expected: CompilationPhase,
        found: CompilationPhase,
    },

    /// An operation needed an active or finished compilation
    #[error("no compilation in progress")]
    NotCompiled,

    /// A constant write outside the range staged for this compilation
    #[error("constant register {0} is outside the staged constant data")]
    ConstantOutOfRange(usize),

    /// A node left a required operation unimplemented
    #[error("node {node} does not implement {operation}")]
    Unimplemented {
        node: &'static str,
        operation: &'static str,
    },

    /// A node id that does not belong to this animation set
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
}

/// Result type using AnimationError
pub type Result<T> = std::result::Result<T, AnimationError>;
