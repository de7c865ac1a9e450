//! Render graph definition, build and per-frame cycle
//!
//! A frame goes through `add_pass` (declaration) → [`RenderGraph::build`]
//! (realization, alias validation, transition scheduling) →
//! [`RenderGraph::execute`] → [`RenderGraph::clear`]. Imported resources
//! outlive the clear; everything else is rebuilt every frame.

use std::sync::Arc;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::allocator::BackingAllocator;
use crate::render_graph::error::{GraphError, GraphResult};
use crate::render_graph::executor::{CompiledGraph, PassBarriers};
use crate::render_graph::garbage_bin::GarbageBin;
use crate::render_graph::pass::*;
use crate::render_graph::registry::ResourceRegistry;
use crate::render_graph::resource::*;
use crate::GraphConfig;

/// The main render graph structure
pub struct RenderGraph {
    config: GraphConfig,
    registry: ResourceRegistry,
    allocator: BackingAllocator,
    garbage_bin: Arc<GarbageBin>,
    passes: Vec<Box<dyn RenderPass>>,
    pass_nodes: Vec<PassNode>,
    next_depth: u32,
    /// Present between a successful build and the following execute.
    compiled: Option<CompiledGraph>,
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field("passes", &self.pass_nodes.len())
            .field("resources", &self.registry.len())
            .field("built", &self.compiled.is_some())
            .finish()
    }
}

impl RenderGraph {
    /// Create a graph with its own garbage bin.
    pub fn new<D: RenderDevice + ?Sized>(
        device: &mut D,
        config: GraphConfig,
    ) -> BackendResult<Self> {
        let garbage_bin = Arc::new(GarbageBin::new(config.frames_in_flight));
        Self::with_garbage_bin(device, config, garbage_bin)
    }

    /// Create a graph releasing its backings through a shared garbage bin.
    pub fn with_garbage_bin<D: RenderDevice + ?Sized>(
        device: &mut D,
        config: GraphConfig,
        garbage_bin: Arc<GarbageBin>,
    ) -> BackendResult<Self> {
        let allocator = BackingAllocator::new(device, &config)?;
        Ok(Self {
            config,
            registry: ResourceRegistry::new(),
            allocator,
            garbage_bin,
            passes: Vec::new(),
            pass_nodes: Vec::new(),
            next_depth: 0,
            compiled: None,
        })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn garbage_bin(&self) -> &Arc<GarbageBin> {
        &self.garbage_bin
    }

    // ========================================================================
    // Imported resources
    // ========================================================================

    /// Register an external texture (like a swapchain image)
    pub fn import_texture(
        &mut self,
        id: impl Into<ResourceId>,
        texture: TextureHandle,
        entry_state: ResourceState,
        exit_state: ResourceState,
    ) -> ResourceId {
        self.registry.import_texture(id, texture, entry_state, exit_state)
    }

    /// Register an external buffer
    pub fn import_buffer(
        &mut self,
        id: impl Into<ResourceId>,
        buffer: BufferHandle,
        entry_state: ResourceState,
        exit_state: ResourceState,
    ) -> ResourceId {
        self.registry.import_buffer(id, buffer, entry_state, exit_state)
    }

    pub fn change_imported_texture(&mut self, id: &ResourceId, texture: TextureHandle) {
        self.registry.change_imported_texture(id, texture);
    }

    pub fn change_imported_buffer(&mut self, id: &ResourceId, buffer: BufferHandle) {
        self.registry.change_imported_buffer(id, buffer);
    }

    /// Forget an imported resource. Its owner keeps the backing.
    pub fn free_imported(&mut self, id: &ResourceId) {
        self.registry.free_imported(id);
    }

    /// Current backing of a resource, following alias chains.
    pub fn resolve(&mut self, id: &ResourceId) -> Option<GpuResource> {
        self.registry.get(id)
    }

    // ========================================================================
    // Passes
    // ========================================================================

    /// Add a render pass at the next depth and run its setup.
    pub fn add_pass<P: RenderPass + 'static>(&mut self, pass: P) -> PassId {
        let id = PassId(self.next_depth);
        self.next_depth += 1;
        self.compiled = None;

        let name = pass.name().to_string();
        let mut boxed_pass = Box::new(pass);

        let mut accesses = Vec::new();
        {
            let mut builder = PassBuilder {
                registry: &mut self.registry,
                accesses: &mut accesses,
                depth: id.depth(),
            };
            boxed_pass.setup(&mut builder);
        }

        self.passes.push(boxed_pass);
        self.pass_nodes.push(PassNode { id, name, accesses });

        id
    }

    /// Get pass nodes (metadata)
    pub fn pass_nodes(&self) -> &[PassNode] {
        &self.pass_nodes
    }

    /// Get pass node by ID
    pub fn get_pass_node(&self, id: PassId) -> Option<&PassNode> {
        self.pass_nodes.get(id.index())
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    // ========================================================================
    // Frame cycle
    // ========================================================================

    /// Realize resources, validate aliasing and schedule transitions.
    ///
    /// On failure the graph holds no schedule and refuses to execute.
    pub fn build<D: RenderDevice + ?Sized>(&mut self, device: &mut D) -> GraphResult<()> {
        self.compiled = None;

        self.registry.realize(device, &self.allocator)?;
        self.registry.sanitize_aliasing_lifetimes()?;

        let reset_imports = self.registry.reset_imported_to_entry();
        let prologue = self.registry.declared_transitions_to_init();

        let mut pass_barriers = Vec::with_capacity(self.pass_nodes.len());
        for node in &self.pass_nodes {
            let mut barriers = PassBarriers::new();
            for access in &node.accesses {
                if let Some(transition) = self
                    .registry
                    .request_state(&access.resource, access.required_state)
                {
                    barriers.push(transition);
                }
            }
            pass_barriers.push(barriers);
        }

        let compiled = CompiledGraph::new(prologue, pass_barriers);
        log::debug!(
            "Built render graph: {} passes, {} resources, {} barriers ({} in prologue), {} imports reset",
            self.pass_nodes.len(),
            self.registry.len(),
            compiled.barrier_count(),
            compiled.prologue().len(),
            reset_imports
        );
        self.compiled = Some(compiled);
        Ok(())
    }

    /// Schedule of the last successful build, until it is executed.
    pub fn compiled(&self) -> Option<&CompiledGraph> {
        self.compiled.as_ref()
    }

    /// Record barriers and run every pass into `command_list`.
    ///
    /// Consumes the schedule: each build executes at most once.
    pub fn execute<D: RenderDevice + 'static>(
        &mut self,
        device: &mut D,
        command_list: CommandListHandle,
    ) -> GraphResult<()> {
        let compiled = self.compiled.take().ok_or(GraphError::NotBuilt)?;
        compiled.execute(
            &mut self.registry,
            &self.passes,
            &self.pass_nodes,
            device,
            command_list,
        );
        Ok(())
    }

    /// Drop all passes and graph-owned resources, keeping imports.
    ///
    /// Backings go to the garbage bin and are freed once the frames in
    /// flight have retired.
    pub fn clear(&mut self) {
        self.passes.clear();
        self.pass_nodes.clear();
        self.next_depth = 0;
        self.compiled = None;
        self.registry.clear_declared_resources(&self.garbage_bin);
    }

    /// Combined statistics of the graph's memory pools.
    pub fn memory_info<D: RenderDevice + ?Sized>(&self, device: &D) -> PoolMemoryInfo {
        self.allocator.memory_info(device)
    }

    /// Release everything the graph owns. The device must be idle.
    pub fn destroy<D: RenderDevice + ?Sized>(mut self, device: &mut D) {
        self.clear();
        self.garbage_bin.flush_all(device);
        self.allocator.destroy(device);
    }
}
