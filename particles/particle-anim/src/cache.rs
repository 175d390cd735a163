//! Register allocation for one particle animation compilation
//!
//! The [`AnimationRegisterCache`] hands out registers from the pools shared
//! with the enclosing material pass. Every pool starts at the offset the pass
//! has already consumed, so animation code never collides with the pass's own
//! shader code. The cache is reset at the start of every compilation and
//! records enough bookkeeping (register indices per node, attribute stream
//! bindings, staged constant data) for the pass to bind the compiled program
//! at draw time.

use std::collections::HashMap;

use glam::{Mat3, Vec3, Vec4};
use log::{debug, trace};

use crate::error::{AnimationError, Result};
use crate::nodes::{NodeId, NodeInfo};
use crate::profile::{RegisterLimits, ShaderProfile};
use crate::properties::ParticlePropertiesMode;
use crate::register::{RegisterKind, ShaderRegister};

bitflags::bitflags! {
    /// Cross-cutting switches read by node code generators
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CompilationFlags: u32 {
        /// A node contributes UV code
        const HAS_UV_NODE = 0x0000_0001;
        /// Velocity is accumulated for other nodes to read
        const NEED_VELOCITY = 0x0000_0002;
        /// A billboard node orients the particles
        const HAS_BILLBOARD = 0x0000_0004;
        /// A color node multiplies the shaded color
        const HAS_COLOR_MUL_NODE = 0x0000_0008;
        /// A color node offsets the shaded color
        const HAS_COLOR_ADD_NODE = 0x0000_0010;
        /// The pass feeds animated color into its fragment program
        const NEED_FRAGMENT_ANIMATION = 0x0000_0020;
        /// The pass wants animated texture coordinates
        const NEED_UV_ANIMATION = 0x0000_0040;
    }
}

/// Registers the material pass has already consumed, plus its animation needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PassInfo {
    /// Vertex constants used by the base material
    pub vertex_constants: usize,
    /// Attribute streams used by the base material
    pub vertex_attributes: usize,
    /// Varyings used by the base material
    pub varyings: usize,
    /// Fragment constants used by the base material
    pub fragment_constants: usize,
    /// The pass combines animated color in its fragment program
    pub need_fragment_animation: bool,
    /// The pass animates texture coordinates
    pub need_uv_animation: bool,
}

/// Totals consumed after a compilation, base material included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassUsage {
    pub streams: usize,
    pub vertex_constants: usize,
    pub fragment_constants: usize,
    pub varyings: usize,
}

/// The four monotonic register pools shared with the material pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pool {
    VertexAttribute,
    VertexConstant,
    FragmentConstant,
    Varying,
}

impl Pool {
    pub fn kind(self) -> RegisterKind {
        match self {
            Self::VertexAttribute => RegisterKind::VertexAttribute,
            Self::VertexConstant => RegisterKind::VertexConstant,
            Self::FragmentConstant => RegisterKind::FragmentConstant,
            Self::Varying => RegisterKind::Varying,
        }
    }
}

/// Steps of one compilation, in the only order they may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompilationPhase {
    /// No compilation has started
    Idle,
    Reset,
    Init,
    Primary,
    Combine,
    Post,
    ColorInit,
    Color,
    ColorCombine,
    Done,
    /// The last compilation aborted; only a reset is accepted
    Failed,
}

impl CompilationPhase {
    /// Phase that must follow this one
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Reset => Some(Self::Init),
            Self::Init => Some(Self::Primary),
            Self::Primary => Some(Self::Combine),
            Self::Combine => Some(Self::Post),
            Self::Post => Some(Self::ColorInit),
            Self::ColorInit => Some(Self::Color),
            Self::Color => Some(Self::ColorCombine),
            Self::ColorCombine => Some(Self::Done),
            Self::Idle | Self::Done | Self::Failed => None,
        }
    }
}

/// Buffer an attribute stream reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamSource {
    /// The interleaved static buffer
    Static,
    /// The per-frame dynamic buffer
    Dynamic,
}

/// Attribute stream the GPU layer binds before drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamBinding {
    /// Attribute register index
    pub register: usize,
    /// Node reading the stream
    pub node: NodeId,
    /// Buffer the stream reads
    pub source: StreamSource,
    /// Float offset inside one vertex record
    pub offset: usize,
    /// Number of floats read per vertex
    pub components: usize,
}

/// GPU context side of stream release
pub trait StreamBinder {
    /// Unbind the attribute stream at `index`
    fn clear_vertex_stream(&mut self, index: usize);
}

/// Registers every node may read or write, fixed at reset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedRegisters {
    /// Source position attribute
    pub position_attribute: ShaderRegister,
    /// Vertex being scaled and rotated; its w component is left untouched
    pub scale_and_rotate_target: ShaderRegister,
    /// Further targets rotated alongside the position (normals, tangents)
    pub rotation_registers: Vec<ShaderRegister>,
    /// Accumulated particle offset
    pub position_target: ShaderRegister,
    /// Accumulated velocity, present when velocity is needed
    pub velocity_target: Option<ShaderRegister>,
    /// Time since the particle started
    pub vertex_time: ShaderRegister,
    /// Fraction of the particle's life elapsed
    pub vertex_life: ShaderRegister,
    /// `{0,1,2,0}` helper constant, x component
    pub vertex_zero_const: ShaderRegister,
    pub vertex_one_const: ShaderRegister,
    pub vertex_two_const: ShaderRegister,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct ColorRegisters {
    mul_target: Option<ShaderRegister>,
    mul_varying: Option<ShaderRegister>,
    add_target: Option<ShaderRegister>,
    add_varying: Option<ShaderRegister>,
}

/// Registers used by the UV pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UvRegisters {
    /// Source UV attribute
    pub attribute: ShaderRegister,
    /// Working register the UV nodes modify
    pub target: ShaderRegister,
    /// Varying handed to the fragment program
    pub varying: ShaderRegister,
}

/// Register allocation state of one compilation
#[derive(Debug, Clone)]
pub struct AnimationRegisterCache {
    profile: ShaderProfile,
    limits: RegisterLimits,
    flags: CompilationFlags,
    phase: CompilationPhase,

    vertex_attributes_offset: usize,
    vertex_constant_offset: usize,
    varyings_offset: usize,
    fragment_constant_offset: usize,

    num_used_streams: usize,
    num_used_vertex_constants: usize,
    num_used_fragment_constants: usize,
    num_used_varyings: usize,
    vertex_temp_usage: Vec<u32>,

    shared: Option<SharedRegisters>,
    source_registers: Vec<ShaderRegister>,
    target_registers: Vec<ShaderRegister>,
    color: ColorRegisters,
    uv: Option<UvRegisters>,
    uv_code: Option<String>,

    register_indices: HashMap<(NodeId, usize), usize>,
    stream_bindings: Vec<StreamBinding>,
    vertex_constant_data: Vec<f32>,
    fragment_constant_data: Vec<f32>,
}

impl Default for AnimationRegisterCache {
    fn default() -> Self {
        Self::new(ShaderProfile::default())
    }
}

impl AnimationRegisterCache {
    pub fn new(profile: ShaderProfile) -> Self {
        Self {
            profile,
            limits: profile.limits(),
            flags: CompilationFlags::empty(),
            phase: CompilationPhase::Idle,
            vertex_attributes_offset: 0,
            vertex_constant_offset: 0,
            varyings_offset: 0,
            fragment_constant_offset: 0,
            num_used_streams: 0,
            num_used_vertex_constants: 0,
            num_used_fragment_constants: 0,
            num_used_varyings: 0,
            vertex_temp_usage: Vec::new(),
            shared: None,
            source_registers: Vec::new(),
            target_registers: Vec::new(),
            color: ColorRegisters::default(),
            uv: None,
            uv_code: None,
            register_indices: HashMap::new(),
            stream_bindings: Vec::new(),
            vertex_constant_data: Vec::new(),
            fragment_constant_data: Vec::new(),
        }
    }

    /// Start a compilation
    ///
    /// Counters return to the pass offsets, every per-compilation record is
    /// dropped and the shared registers are allocated again, so nothing from
    /// an earlier (possibly failed) compilation survives.
    ///
    /// # Arguments
    /// * `profile` - Target profile, selects the register budget
    /// * `pass` - Offsets already consumed by the material pass
    /// * `flags` - Set-level and pass-level compilation flags
    /// * `sources` - Source registers, position first
    /// * `targets` - Target temporaries matching `sources`
    pub fn reset(
        &mut self,
        profile: ShaderProfile,
        pass: &PassInfo,
        flags: CompilationFlags,
        sources: &[&str],
        targets: &[&str],
    ) -> Result<()> {
        self.phase = CompilationPhase::Failed;
        self.profile = profile;
        self.limits = profile.limits();
        self.flags = flags;

        self.vertex_attributes_offset = pass.vertex_attributes;
        self.vertex_constant_offset = pass.vertex_constants;
        self.varyings_offset = pass.varyings;
        self.fragment_constant_offset = pass.fragment_constants;
        self.num_used_streams = pass.vertex_attributes;
        self.num_used_vertex_constants = pass.vertex_constants;
        self.num_used_varyings = pass.varyings;
        self.num_used_fragment_constants = pass.fragment_constants;
        self.vertex_temp_usage = vec![0; self.limits.vertex_temps];

        self.shared = None;
        self.color = ColorRegisters::default();
        self.uv = None;
        self.uv_code = None;
        self.register_indices.clear();
        self.stream_bindings.clear();
        self.vertex_constant_data.clear();
        self.fragment_constant_data.clear();

        self.source_registers = parse_registers(sources)?;
        self.target_registers = parse_registers(targets)?;
        let (Some(&position_attribute), Some(&scale_and_rotate_target)) =
            (self.source_registers.first(), self.target_registers.first())
        else {
            return Err(AnimationError::InvalidRegister(
                "at least one source and one target register are required".to_string(),
            ));
        };
        if self.source_registers.len() != self.target_registers.len() {
            return Err(AnimationError::InvalidRegister(format!(
                "{} source registers but {} target registers",
                self.source_registers.len(),
                self.target_registers.len()
            )));
        }

        for target in self.target_registers.clone() {
            self.add_vertex_temp_usage(target)?;
        }
        let rotation_registers = self.target_registers[1..].to_vec();

        let helper = self.free_vertex_constant()?;
        let position_target = self.acquire_vertex_temp()?;

        let (velocity_target, vertex_time, vertex_life) =
            if flags.contains(CompilationFlags::NEED_VELOCITY) {
                let velocity = self.acquire_vertex_temp()?;
                (Some(velocity), velocity.w(), position_target.w())
            } else {
                let time = self.acquire_vertex_temp()?;
                (None, time.x(), time.y())
            };

        self.shared = Some(SharedRegisters {
            position_attribute,
            scale_and_rotate_target,
            rotation_registers,
            position_target,
            velocity_target,
            vertex_time,
            vertex_life,
            vertex_zero_const: helper.x(),
            vertex_one_const: helper.y(),
            vertex_two_const: helper.z(),
        });
        self.phase = CompilationPhase::Reset;

        debug!(
            "Reset register cache ({}): va offset {}, vc offset {}, v offset {}, fc offset {}, flags {:?}",
            profile,
            pass.vertex_attributes,
            pass.vertex_constants,
            pass.varyings,
            pass.fragment_constants,
            flags
        );
        Ok(())
    }

    /// Advance to the next emission phase
    pub fn enter(&mut self, phase: CompilationPhase) -> Result<()> {
        match self.phase.next() {
            Some(expected) if expected == phase => {
                trace!("Entering compilation phase {:?}", phase);
                self.phase = phase;
                Ok(())
            }
            Some(expected) => Err(AnimationError::PhaseOrder {
                expected,
                found: phase,
            }),
            None => Err(AnimationError::NotCompiled),
        }
    }

    /// Abort the running compilation
    pub fn mark_failed(&mut self) {
        self.phase = CompilationPhase::Failed;
    }

    pub fn phase(&self) -> CompilationPhase {
        self.phase
    }

    /// Whether a reset has happened and no failure followed it
    pub fn is_active(&self) -> bool {
        !matches!(
            self.phase,
            CompilationPhase::Idle | CompilationPhase::Failed
        )
    }

    pub fn profile(&self) -> ShaderProfile {
        self.profile
    }

    pub fn flags(&self) -> CompilationFlags {
        self.flags
    }

    pub fn has(&self, flag: CompilationFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Registers fixed at reset
    pub fn shared(&self) -> Result<&SharedRegisters> {
        if !self.is_active() {
            return Err(AnimationError::NotCompiled);
        }
        self.shared.as_ref().ok_or(AnimationError::NotCompiled)
    }

    /// Take `count` consecutive slots from `pool`
    pub fn allocate(&mut self, pool: Pool, count: usize) -> Result<usize> {
        let limit = self.limits.for_kind(pool.kind());
        let counter = match pool {
            Pool::VertexAttribute => &mut self.num_used_streams,
            Pool::VertexConstant => &mut self.num_used_vertex_constants,
            Pool::FragmentConstant => &mut self.num_used_fragment_constants,
            Pool::Varying => &mut self.num_used_varyings,
        };
        let index = *counter;
        let end = index + count;
        if end > limit {
            return Err(AnimationError::RegisterOverflow {
                kind: pool.kind(),
                requested: end,
                limit,
            });
        }
        *counter = end;
        trace!("Allocated {} {} register(s) at {}", count, pool.kind(), index);
        Ok(index)
    }

    pub fn free_vertex_attribute(&mut self) -> Result<ShaderRegister> {
        let index = self.allocate(Pool::VertexAttribute, 1)?;
        Ok(ShaderRegister::new(RegisterKind::VertexAttribute, index))
    }

    pub fn free_vertex_constant(&mut self) -> Result<ShaderRegister> {
        let index = self.allocate(Pool::VertexConstant, 1)?;
        Ok(ShaderRegister::new(RegisterKind::VertexConstant, index))
    }

    /// First of `count` consecutive vertex constants, e.g. for a matrix
    pub fn free_vertex_constants(&mut self, count: usize) -> Result<ShaderRegister> {
        let index = self.allocate(Pool::VertexConstant, count)?;
        Ok(ShaderRegister::new(RegisterKind::VertexConstant, index))
    }

    pub fn free_varying(&mut self) -> Result<ShaderRegister> {
        let index = self.allocate(Pool::Varying, 1)?;
        Ok(ShaderRegister::new(RegisterKind::Varying, index))
    }

    pub fn free_fragment_constant(&mut self) -> Result<ShaderRegister> {
        let index = self.allocate(Pool::FragmentConstant, 1)?;
        Ok(ShaderRegister::new(RegisterKind::FragmentConstant, index))
    }

    /// Claim the first unused vertex temporary
    pub fn acquire_vertex_temp(&mut self) -> Result<ShaderRegister> {
        let index = self
            .vertex_temp_usage
            .iter()
            .position(|&usage| usage == 0)
            .ok_or(AnimationError::RegisterOverflow {
                kind: RegisterKind::VertexTemp,
                requested: self.vertex_temp_usage.len() + 1,
                limit: self.limits.vertex_temps,
            })?;
        self.vertex_temp_usage[index] += 1;
        Ok(ShaderRegister::new(RegisterKind::VertexTemp, index))
    }

    /// Claim a temporary and hand out its x component
    pub fn acquire_vertex_scalar_temp(&mut self) -> Result<ShaderRegister> {
        Ok(self.acquire_vertex_temp()?.x())
    }

    /// Mark a temporary named by the pass as in use
    pub fn add_vertex_temp_usage(&mut self, register: ShaderRegister) -> Result<()> {
        if register.kind != RegisterKind::VertexTemp {
            return Ok(());
        }
        let limit = self.limits.vertex_temps;
        let usage = self.vertex_temp_usage.get_mut(register.index).ok_or(
            AnimationError::RegisterOverflow {
                kind: RegisterKind::VertexTemp,
                requested: register.index + 1,
                limit,
            },
        )?;
        *usage += 1;
        Ok(())
    }

    pub fn release_vertex_temp(&mut self, register: ShaderRegister) {
        if register.kind != RegisterKind::VertexTemp {
            return;
        }
        if let Some(usage) = self.vertex_temp_usage.get_mut(register.index) {
            *usage = usage.saturating_sub(1);
        }
    }

    /// Number of vertex temporaries currently claimed
    pub fn vertex_temps_in_use(&self) -> usize {
        self.vertex_temp_usage.iter().filter(|&&usage| usage > 0).count()
    }

    /// Remember which register a node parameter landed in
    pub fn set_register_index(&mut self, node: NodeId, slot: usize, index: usize) {
        self.register_indices.insert((node, slot), index);
    }

    pub fn register_index(&self, node: NodeId, slot: usize) -> Option<usize> {
        self.register_indices.get(&(node, slot)).copied()
    }

    /// Register holding a node parameter
    ///
    /// Global nodes read a vertex constant; local nodes read an attribute
    /// stream whose binding is recorded at the node's offset plus
    /// `sub_offset`.
    pub fn node_value(
        &mut self,
        info: &NodeInfo,
        slot: usize,
        sub_offset: usize,
        components: usize,
    ) -> Result<ShaderRegister> {
        match info.mode() {
            ParticlePropertiesMode::Global => {
                let register = self.free_vertex_constant()?;
                self.set_register_index(info.id(), slot, register.index);
                Ok(register)
            }
            ParticlePropertiesMode::LocalStatic | ParticlePropertiesMode::LocalDynamic => {
                self.bind_stream(info, slot, sub_offset, components)
            }
        }
    }

    /// Attribute register reading a slice of the node's vertex data
    pub fn bind_stream(
        &mut self,
        info: &NodeInfo,
        slot: usize,
        sub_offset: usize,
        components: usize,
    ) -> Result<ShaderRegister> {
        let register = self.free_vertex_attribute()?;
        self.set_register_index(info.id(), slot, register.index);
        let (source, base) = match info.mode() {
            ParticlePropertiesMode::LocalDynamic => (StreamSource::Dynamic, info.dynamic_offset()),
            _ => (StreamSource::Static, info.data_offset()),
        };
        self.stream_bindings.push(StreamBinding {
            register: register.index,
            node: info.id(),
            source,
            offset: base + sub_offset,
            components,
        });
        Ok(register)
    }

    pub fn stream_bindings(&self) -> &[StreamBinding] {
        &self.stream_bindings
    }

    /// Copy sources to targets and clear the accumulators
    pub fn init_code(&self) -> Result<String> {
        let shared = self.shared()?;
        let mut code = String::new();
        for (target, source) in self.target_registers.iter().zip(&self.source_registers) {
            emit!(code, "mov", target, source);
        }
        emit!(
            code,
            "mov",
            shared.position_target.xyz(),
            shared.vertex_zero_const
        );
        if let Some(velocity) = shared.velocity_target {
            emit!(code, "mov", velocity.xyz(), shared.vertex_zero_const);
        }
        Ok(code)
    }

    /// Fold the accumulated offset into the scaled and rotated vertex
    pub fn combination_code(&self) -> Result<String> {
        let shared = self.shared()?;
        let target = shared.scale_and_rotate_target;
        let mut code = String::new();
        emit!(
            code,
            "add",
            target.xyz(),
            target.xyz(),
            shared.position_target.xyz()
        );
        Ok(code)
    }

    /// Allocate and clear the color accumulators
    ///
    /// Accumulators only exist when the set has color nodes and the pass
    /// combines animated color in its fragment program.
    pub fn init_color_registers(&mut self) -> Result<String> {
        let shared = self.shared()?.clone();
        let mut code = String::new();
        if !self.has(CompilationFlags::NEED_FRAGMENT_ANIMATION) {
            return Ok(code);
        }
        if self.has(CompilationFlags::HAS_COLOR_MUL_NODE) {
            let target = self.acquire_vertex_temp()?;
            self.color.mul_target = Some(target);
            self.color.mul_varying = Some(self.free_varying()?);
            emit!(code, "mov", target, shared.vertex_one_const);
        }
        if self.has(CompilationFlags::HAS_COLOR_ADD_NODE) {
            let target = self.acquire_vertex_temp()?;
            self.color.add_target = Some(target);
            self.color.add_varying = Some(self.free_varying()?);
            emit!(code, "mov", target, shared.vertex_zero_const);
        }
        Ok(code)
    }

    /// Color multiplier accumulator, if allocated
    pub fn color_mul_target(&self) -> Option<ShaderRegister> {
        self.color.mul_target
    }

    /// Color offset accumulator, if allocated
    pub fn color_add_target(&self) -> Option<ShaderRegister> {
        self.color.add_target
    }

    /// Hand the color accumulators to the fragment program
    pub fn color_pass_code(&self) -> String {
        let mut code = String::new();
        if let (Some(target), Some(varying)) = (self.color.mul_target, self.color.mul_varying) {
            emit!(code, "mov", varying, target);
        }
        if let (Some(target), Some(varying)) = (self.color.add_target, self.color.add_varying) {
            emit!(code, "mov", varying, target);
        }
        code
    }

    /// Fragment code applying the animated color to `shaded_target`
    pub fn color_combination_code(&self, shaded_target: &str) -> Result<String> {
        let target: ShaderRegister = shaded_target.parse()?;
        let mut code = String::new();
        if let Some(varying) = self.color.mul_varying {
            emit!(code, "mul", target, target, varying);
        }
        if let Some(varying) = self.color.add_varying {
            emit!(code, "add", target, target, varying);
        }
        Ok(code)
    }

    /// Bind the UV registers; the working register reuses the position
    /// accumulator, which is free once the vertex code has combined it
    pub fn set_uv_source_and_target(&mut self, uv_attribute: &str, uv_varying: &str) -> Result<UvRegisters> {
        let shared = self.shared()?;
        let registers = UvRegisters {
            attribute: uv_attribute.parse()?,
            target: shared.position_target,
            varying: uv_varying.parse()?,
        };
        self.uv = Some(registers);
        Ok(registers)
    }

    pub fn uv_registers(&self) -> Option<UvRegisters> {
        self.uv
    }

    /// UV code already generated in this compilation
    ///
    /// The UV registers and node parameters stay allocated for the whole
    /// compilation, so a repeated UV pass must hand back the same text.
    /// Asking for other source or target registers once UV code exists is
    /// an error.
    pub fn emitted_uv_code(&self, uv_attribute: &str, uv_varying: &str) -> Result<Option<String>> {
        let (Some(uv), Some(code)) = (self.uv, self.uv_code.as_ref()) else {
            return Ok(None);
        };
        let attribute: ShaderRegister = uv_attribute.parse()?;
        let varying: ShaderRegister = uv_varying.parse()?;
        if uv.attribute != attribute || uv.varying != varying {
            return Err(AnimationError::InvalidConfiguration(format!(
                "UV code was already generated for {} -> {}",
                uv.attribute, uv.varying
            )));
        }
        Ok(Some(code.clone()))
    }

    /// Remember the UV code of this compilation
    pub fn store_uv_code(&mut self, code: &str) {
        self.uv_code = Some(code.to_string());
    }

    /// Finish the compilation: size the constant staging buffers and write
    /// the `{0,1,2,0}` helper constant
    pub fn done(&mut self) -> Result<()> {
        self.enter(CompilationPhase::Done)?;
        let num_vertex_constants = self.num_used_vertex_constants - self.vertex_constant_offset;
        let num_fragment_constants =
            self.num_used_fragment_constants - self.fragment_constant_offset;
        self.vertex_constant_data = vec![0.0; num_vertex_constants * 4];
        self.fragment_constant_data = vec![0.0; num_fragment_constants * 4];

        let helper = self.shared()?.vertex_zero_const.index;
        self.set_vertex_constant(helper, [0.0, 1.0, 2.0, 0.0])?;
        debug!(
            "Compilation done: {} streams, {} vertex constants, {} fragment constants, {} varyings",
            self.num_used_streams - self.vertex_attributes_offset,
            num_vertex_constants,
            num_fragment_constants,
            self.num_used_varyings - self.varyings_offset
        );
        Ok(())
    }

    pub fn set_vertex_constant(&mut self, index: usize, value: [f32; 4]) -> Result<()> {
        let start = index
            .checked_sub(self.vertex_constant_offset)
            .ok_or(AnimationError::ConstantOutOfRange(index))?
            * 4;
        let slot = self
            .vertex_constant_data
            .get_mut(start..start + 4)
            .ok_or(AnimationError::ConstantOutOfRange(index))?;
        slot.copy_from_slice(&value);
        Ok(())
    }

    pub fn set_vertex_constant_vec3(&mut self, index: usize, value: Vec3, w: f32) -> Result<()> {
        self.set_vertex_constant(index, value.extend(w).to_array())
    }

    pub fn set_vertex_constant_vec4(&mut self, index: usize, value: Vec4) -> Result<()> {
        self.set_vertex_constant(index, value.to_array())
    }

    /// Write a 3x3 matrix as three row constants, the layout `m33` reads
    pub fn set_vertex_constant_matrix3(&mut self, index: usize, matrix: Mat3) -> Result<()> {
        for row in 0..3 {
            self.set_vertex_constant_vec3(index + row, matrix.row(row), 0.0)?;
        }
        Ok(())
    }

    pub fn set_fragment_constant(&mut self, index: usize, value: [f32; 4]) -> Result<()> {
        let start = index
            .checked_sub(self.fragment_constant_offset)
            .ok_or(AnimationError::ConstantOutOfRange(index))?
            * 4;
        let slot = self
            .fragment_constant_data
            .get_mut(start..start + 4)
            .ok_or(AnimationError::ConstantOutOfRange(index))?;
        slot.copy_from_slice(&value);
        Ok(())
    }

    /// Vertex constants staged for upload, starting at the pass offset
    pub fn vertex_constant_data(&self) -> &[f32] {
        &self.vertex_constant_data
    }

    /// Fragment constants staged for upload, starting at the pass offset
    pub fn fragment_constant_data(&self) -> &[f32] {
        &self.fragment_constant_data
    }

    pub fn vertex_attributes_offset(&self) -> usize {
        self.vertex_attributes_offset
    }

    pub fn vertex_constant_offset(&self) -> usize {
        self.vertex_constant_offset
    }

    pub fn varyings_offset(&self) -> usize {
        self.varyings_offset
    }

    pub fn fragment_constant_offset(&self) -> usize {
        self.fragment_constant_offset
    }

    pub fn num_used_streams(&self) -> usize {
        self.num_used_streams
    }

    pub fn num_used_vertex_constants(&self) -> usize {
        self.num_used_vertex_constants
    }

    pub fn num_used_fragment_constants(&self) -> usize {
        self.num_used_fragment_constants
    }

    pub fn num_used_varyings(&self) -> usize {
        self.num_used_varyings
    }

    /// Totals to report back to the material pass
    pub fn usage(&self) -> PassUsage {
        PassUsage {
            streams: self.num_used_streams,
            vertex_constants: self.num_used_vertex_constants,
            fragment_constants: self.num_used_fragment_constants,
            varyings: self.num_used_varyings,
        }
    }
}

fn parse_registers(names: &[&str]) -> Result<Vec<ShaderRegister>> {
    names.iter().map(|name| name.parse()).collect()
}
