//! The particle animation set: node ordering, record layout and code emission

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::animation_data::{AnimationSubGeometry, DynamicParticleRecord, DynamicVertexBuffer};
use crate::cache::{
    AnimationRegisterCache, CompilationFlags, CompilationPhase, PassInfo, StreamBinder,
    StreamBinding,
};
use crate::error::{AnimationError, Result};
use crate::geometry::{Geometry, Mesh, PartitionId};
use crate::nodes::{
    EmissionBlock, FrameState, NodeId, ParticleNode, SetSettings, TimeNode,
};
use crate::profile::ShaderProfile;
use crate::properties::{ParticleProperties, ParticlePropertiesMode};
use crate::register::ShaderRegister;

/// Id of the mandatory time node
pub const TIME_NODE_ID: NodeId = NodeId(0);

/// Callback filling the properties of one particle before its data is generated
pub type ParticleInitializer = Box<dyn FnMut(&mut ParticleProperties)>;

/// Reuse key of generated animation data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SubGeometryKey {
    pub partition: PartitionId,
    pub stride: usize,
    pub dynamic_stride: usize,
}

/// An ordered collection of animation nodes
///
/// Nodes are kept sorted by priority; a node added with the same priority as
/// existing ones goes after them. Static offsets are handed out in insertion
/// order, so the record layout never changes for nodes already added.
///
/// The time node is created with the set but only joins the layout once the
/// first other node is added. A set without other nodes has an empty vertex
/// record.
///
/// # Examples
///
/// ```
/// use particle_anim::{
///     AnimationRegisterCache, ParticleAnimationSet, PassInfo, ShaderProfile,
///     nodes::VelocityNode, ParticlePropertiesMode,
/// };
///
/// let mut set = ParticleAnimationSet::new(true, true, false);
/// set.add_node(VelocityNode::local(ParticlePropertiesMode::LocalStatic))?;
/// assert_eq!(set.total_record_stride(), 4 + 3);
///
/// let mut cache = AnimationRegisterCache::default();
/// let pass = PassInfo { vertex_attributes: 1, vertex_constants: 4, ..PassInfo::default() };
/// let code = set.vertex_code(&mut cache, &pass, ShaderProfile::Baseline, &["va0"], &["vt0"])?;
/// assert!(code.starts_with("mov vt0, va0\n"));
/// # Ok::<(), particle_anim::AnimationError>(())
/// ```
pub struct ParticleAnimationSet {
    pub(crate) settings: SetSettings,
    pub(crate) nodes: Vec<Box<dyn ParticleNode>>,
    pub(crate) time_active: bool,
    next_id: usize,
    pub(crate) total_record_stride: usize,
    pub(crate) dynamic_stride: usize,
    pub(crate) initializer: Option<ParticleInitializer>,
    pub(crate) sub_geometries: HashMap<SubGeometryKey, Arc<AnimationSubGeometry>>,
}

impl fmt::Debug for ParticleAnimationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleAnimationSet")
            .field("settings", &self.settings)
            .field("nodes", &self.nodes)
            .field("time_active", &self.time_active)
            .field("total_record_stride", &self.total_record_stride)
            .field("dynamic_stride", &self.dynamic_stride)
            .field("has_initializer", &self.initializer.is_some())
            .field("cached_sub_geometries", &self.sub_geometries.len())
            .finish()
    }
}

impl Default for ParticleAnimationSet {
    fn default() -> Self {
        Self::with_settings(SetSettings::default())
    }
}

impl ParticleAnimationSet {
    pub fn new(uses_duration: bool, uses_looping: bool, uses_delay: bool) -> Self {
        Self::with_settings(SetSettings::new(uses_duration, uses_looping, uses_delay))
    }

    pub fn with_settings(settings: SetSettings) -> Self {
        let mut time = TimeNode::from_settings(&settings);
        time.info_mut().set_id(TIME_NODE_ID);
        Self {
            settings,
            nodes: vec![Box::new(time)],
            time_active: false,
            next_id: 1,
            total_record_stride: 0,
            dynamic_stride: 0,
            initializer: None,
            sub_geometries: HashMap::new(),
        }
    }

    /// Add a node, returning its id
    ///
    /// The node validates the set configuration first; on failure the set is
    /// left untouched. Generated animation data cached by the set is dropped,
    /// since the record layout changes.
    pub fn add_node<N: ParticleNode + 'static>(&mut self, node: N) -> Result<NodeId> {
        let mut node: Box<dyn ParticleNode> = Box::new(node);
        let mut settings = self.settings;
        node.process_settings(&mut settings)?;
        self.settings = settings;

        if !self.time_active {
            self.activate_time_node();
        }

        let id = NodeId(self.next_id);
        self.next_id += 1;
        let info = node.info_mut();
        info.set_id(id);
        match info.mode() {
            ParticlePropertiesMode::LocalStatic => {
                info.set_data_offset(self.total_record_stride);
                self.total_record_stride += info.data_length();
            }
            ParticlePropertiesMode::LocalDynamic => {
                info.set_dynamic_offset(self.dynamic_stride);
                self.dynamic_stride += info.data_length();
            }
            ParticlePropertiesMode::Global => {}
        }

        let priority = node.info().priority();
        let position = self
            .nodes
            .iter()
            .rposition(|existing| existing.info().priority() <= priority)
            .map_or(0, |index| index + 1);
        debug!(
            "Adding {} node {} (priority {}, {:?}) at position {}, record stride {}",
            node.info().name(),
            id,
            priority,
            node.info().mode(),
            position,
            self.total_record_stride
        );
        self.nodes.insert(position, node);
        self.sub_geometries.clear();
        Ok(id)
    }

    fn activate_time_node(&mut self) {
        let offset = self.total_record_stride;
        if let Some(time) = self
            .nodes
            .iter_mut()
            .find(|node| node.info().id() == TIME_NODE_ID)
        {
            let info = time.info_mut();
            info.set_data_offset(offset);
            self.total_record_stride += info.data_length();
        }
        self.time_active = true;
    }

    pub(crate) fn is_active(time_active: bool, node: &dyn ParticleNode) -> bool {
        time_active || node.info().id() != TIME_NODE_ID
    }

    /// Active nodes in emission order
    pub fn nodes(&self) -> impl Iterator<Item = &dyn ParticleNode> + '_ {
        let time_active = self.time_active;
        self.nodes
            .iter()
            .map(AsRef::as_ref)
            .filter(move |node| Self::is_active(time_active, *node))
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn ParticleNode> {
        self.nodes().find(|node| node.info().id() == id)
    }

    /// Nodes baking per-particle data into the static buffer
    pub fn static_nodes(&self) -> impl Iterator<Item = &dyn ParticleNode> + '_ {
        self.nodes()
            .filter(|node| node.info().mode() == ParticlePropertiesMode::LocalStatic)
    }

    /// Nodes whose per-particle data is rewritten every frame
    pub fn dynamic_nodes(&self) -> impl Iterator<Item = &dyn ParticleNode> + '_ {
        self.nodes()
            .filter(|node| node.info().mode() == ParticlePropertiesMode::LocalDynamic)
    }

    pub fn has_dynamic_nodes(&self) -> bool {
        self.dynamic_nodes().next().is_some()
    }

    /// Whether the time node has joined the layout
    pub fn is_time_node_active(&self) -> bool {
        self.time_active
    }

    /// Floats per vertex in the static buffer
    pub fn total_record_stride(&self) -> usize {
        self.total_record_stride
    }

    /// Floats per vertex in the dynamic buffer
    pub fn dynamic_stride(&self) -> usize {
        self.dynamic_stride
    }

    pub fn settings(&self) -> &SetSettings {
        &self.settings
    }

    pub fn flags(&self) -> CompilationFlags {
        self.settings.flags
    }

    /// Install the callback that fills particle properties during generation
    pub fn set_initializer(&mut self, initializer: impl FnMut(&mut ParticleProperties) + 'static) {
        self.initializer = Some(Box::new(initializer));
    }

    pub fn clear_initializer(&mut self) {
        self.initializer = None;
    }

    pub fn has_initializer(&self) -> bool {
        self.initializer.is_some()
    }

    /// Generate the vertex program
    ///
    /// Resets `cache` against the pass offsets and runs init, primary block,
    /// combination, post block, color init, color block and color hand-off in
    /// that order. On error the cache is left failed and no code is returned.
    ///
    /// # Arguments
    /// * `cache` - Compilation context owned by the material pass
    /// * `pass` - Registers the pass already uses and its animation needs
    /// * `profile` - Target profile
    /// * `sources` - Source registers, position first
    /// * `targets` - Matching target temporaries
    pub fn vertex_code(
        &self,
        cache: &mut AnimationRegisterCache,
        pass: &PassInfo,
        profile: ShaderProfile,
        sources: &[&str],
        targets: &[&str],
    ) -> Result<String> {
        let result = self.emit_vertex_code(cache, pass, profile, sources, targets);
        if result.is_err() {
            cache.mark_failed();
        }
        result
    }

    fn emit_vertex_code(
        &self,
        cache: &mut AnimationRegisterCache,
        pass: &PassInfo,
        profile: ShaderProfile,
        sources: &[&str],
        targets: &[&str],
    ) -> Result<String> {
        let mut flags = self.settings.flags;
        if pass.need_fragment_animation {
            flags |= CompilationFlags::NEED_FRAGMENT_ANIMATION;
        }
        if pass.need_uv_animation {
            flags |= CompilationFlags::NEED_UV_ANIMATION;
        }
        cache.reset(profile, pass, flags, sources, targets)?;

        cache.enter(CompilationPhase::Init)?;
        let mut code = cache.init_code()?;

        cache.enter(CompilationPhase::Primary)?;
        self.emit_block(cache, EmissionBlock::Primary, &mut code)?;

        cache.enter(CompilationPhase::Combine)?;
        code.push_str(&cache.combination_code()?);

        cache.enter(CompilationPhase::Post)?;
        self.emit_block(cache, EmissionBlock::Post, &mut code)?;

        cache.enter(CompilationPhase::ColorInit)?;
        code.push_str(&cache.init_color_registers()?);

        cache.enter(CompilationPhase::Color)?;
        self.emit_block(cache, EmissionBlock::Color, &mut code)?;

        cache.enter(CompilationPhase::ColorCombine)?;
        code.push_str(&cache.color_pass_code());

        debug!(
            "Generated vertex code for {} node(s): {} instruction(s)",
            self.nodes().count(),
            code.lines().count()
        );
        Ok(code)
    }

    fn emit_block(
        &self,
        cache: &mut AnimationRegisterCache,
        block: EmissionBlock,
        code: &mut String,
    ) -> Result<()> {
        for node in self.nodes().filter(|node| node.info().block() == block) {
            code.push_str(&node.generate_vertex_code(cache)?);
        }
        Ok(())
    }

    /// Generate the UV code; runs after reset and before [`done_code`](Self::done_code)
    ///
    /// Without UV nodes this is a plain copy from `uv_source` to `uv_target`.
    /// Calling it again in the same compilation returns the same code without
    /// allocating registers.
    pub fn uv_code(
        &self,
        cache: &mut AnimationRegisterCache,
        uv_source: &str,
        uv_target: &str,
    ) -> Result<String> {
        if !cache.is_active() || cache.phase() == CompilationPhase::Done {
            return Err(AnimationError::NotCompiled);
        }
        if let Some(code) = cache.emitted_uv_code(uv_source, uv_target)? {
            return Ok(code);
        }
        let result = self.emit_uv_code(cache, uv_source, uv_target);
        if result.is_err() {
            cache.mark_failed();
        }
        result
    }

    fn emit_uv_code(
        &self,
        cache: &mut AnimationRegisterCache,
        uv_source: &str,
        uv_target: &str,
    ) -> Result<String> {
        let mut code = String::new();
        if !cache.has(CompilationFlags::HAS_UV_NODE) {
            let source: ShaderRegister = uv_source.parse()?;
            let target: ShaderRegister = uv_target.parse()?;
            emit!(code, "mov", target, source);
            return Ok(code);
        }

        let uv = cache.set_uv_source_and_target(uv_source, uv_target)?;
        emit!(code, "mov", uv.target.xy(), uv.attribute);
        for node in self.nodes() {
            code.push_str(&node.generate_uv_code(cache)?);
        }
        emit!(code, "mov", uv.varying, uv.target.xy());
        cache.store_uv_code(&code);
        Ok(code)
    }

    /// Fragment code folding the animated color into `shaded_target`
    pub fn fragment_code(
        &self,
        cache: &AnimationRegisterCache,
        shaded_target: &str,
    ) -> Result<String> {
        match cache.phase() {
            CompilationPhase::ColorCombine | CompilationPhase::Done => {
                cache.color_combination_code(shaded_target)
            }
            _ => Err(AnimationError::NotCompiled),
        }
    }

    /// Finish the compilation once all code text was produced
    pub fn done_code(&self, cache: &mut AnimationRegisterCache) -> Result<()> {
        cache.done()
    }

    /// Stage per-draw constants and return the streams to bind
    pub fn activate(
        &self,
        cache: &mut AnimationRegisterCache,
        frame: &FrameState,
    ) -> Result<Vec<StreamBinding>> {
        if cache.phase() != CompilationPhase::Done {
            return Err(AnimationError::NotCompiled);
        }
        for node in self.nodes() {
            node.write_constants(cache, frame)?;
        }
        Ok(cache.stream_bindings().to_vec())
    }

    /// Release the attribute streams claimed by the animation
    pub fn deactivate(&self, cache: &AnimationRegisterCache, binder: &mut dyn StreamBinder) {
        for index in cache.vertex_attributes_offset()..cache.num_used_streams() {
            binder.clear_vertex_stream(index);
        }
    }

    /// Forget animation data generated for a replaced geometry
    pub fn invalidate_geometry(&mut self, geometry: &Geometry) {
        let partitions: Vec<PartitionId> = geometry.partitions().iter().map(|p| p.id).collect();
        let before = self.sub_geometries.len();
        self.sub_geometries
            .retain(|key, _| !partitions.contains(&key.partition));
        debug!(
            "Invalidated {} cached sub-geometr(ies) of geometry {:?}",
            before - self.sub_geometries.len(),
            geometry.id()
        );
    }

    /// Fill the dynamic data of `node` for every particle of `mesh`
    ///
    /// `fill` receives each particle record and the node's slice of one
    /// vertex record; the values are copied to every vertex of the run.
    pub fn write_dynamic_values(
        &self,
        mesh: &mut Mesh,
        node: NodeId,
        mut fill: impl FnMut(&DynamicParticleRecord, &mut [f32]),
    ) -> Result<()> {
        let info = self
            .node(node)
            .filter(|n| n.info().mode() == ParticlePropertiesMode::LocalDynamic)
            .ok_or(AnimationError::UnknownNode(node))?
            .info()
            .clone();
        let stride = self.dynamic_stride;
        let mut values = vec![0.0; info.data_length()];

        for index in 0..mesh.geometry().partitions().len() {
            let data = mesh.animation_geometry(index).cloned().ok_or_else(|| {
                AnimationError::GeometryMismatch(format!(
                    "no animation data generated for partition {index}"
                ))
            })?;
            if data.dynamic_stride() != stride {
                return Err(AnimationError::GeometryMismatch(format!(
                    "partition {index} was generated for dynamic stride {}, set uses {stride}",
                    data.dynamic_stride()
                )));
            }

            let Some(slot) = mesh.dynamic_buffer_slot(index) else {
                continue;
            };
            let stale = slot.as_ref().is_none_or(|buffer| {
                buffer.stride() != stride || buffer.num_vertices() != data.num_vertices()
            });
            if stale {
                *slot = Some(DynamicVertexBuffer::new(data.num_vertices(), stride));
            }
            let Some(buffer) = slot.as_mut() else {
                continue;
            };

            for record in data.dynamic_records() {
                values.fill(0.0);
                fill(record, &mut values);
                buffer.replicate(
                    record.first_vertex,
                    record.num_vertices,
                    info.dynamic_offset(),
                    &values,
                );
            }
        }
        Ok(())
    }
}
