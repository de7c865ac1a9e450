//! Render pass definitions for the render graph

use std::any::Any;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::registry::ResourceRegistry;
use crate::render_graph::resource::*;

/// Position of a pass in the graph, equal to its traversal depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) u32);

impl PassId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn depth(&self) -> u32 {
        self.0
    }
}

/// How a pass touches a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Read,
    Write,
    ReadWrite,
}

impl AccessKind {
    pub fn reads(&self) -> bool {
        matches!(self, AccessKind::Read | AccessKind::ReadWrite)
    }

    pub fn writes(&self) -> bool {
        matches!(self, AccessKind::Write | AccessKind::ReadWrite)
    }
}

/// One declared access of a pass, replayed by the transition scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAccess {
    pub resource: ResourceId,
    pub kind: AccessKind,
    pub required_state: ResourceState,
}

/// Handle returned to a pass for a declared access.
///
/// Resolved to a concrete backing through [`PassExecuteContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceView {
    pub id: ResourceId,
    pub resource_type: ResourceType,
    pub access: AccessKind,
}

/// Declaration interface handed to [`RenderPass::setup`].
///
/// Every access is recorded at the pass's depth and widens the lifetimes
/// of the accessed record and its alias root right away.
pub struct PassBuilder<'a> {
    pub(crate) registry: &'a mut ResourceRegistry,
    pub(crate) accesses: &'a mut Vec<ResourceAccess>,
    pub(crate) depth: u32,
}

impl<'a> PassBuilder<'a> {
    /// Traversal depth of the pass being declared.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Read-only view of the registry, e.g. to check for carried-over imports.
    pub fn registry(&self) -> &ResourceRegistry {
        &*self.registry
    }

    /// Create a new graph-owned texture
    pub fn declare_texture(
        &mut self,
        id: impl Into<ResourceId>,
        desc: TextureDescriptor,
    ) -> ResourceId {
        self.registry.declare_texture(id, desc)
    }

    /// Create a new graph-owned buffer
    pub fn declare_buffer(
        &mut self,
        id: impl Into<ResourceId>,
        desc: BufferDescriptor,
    ) -> ResourceId {
        self.registry.declare_buffer(id, desc)
    }

    /// Wrap an externally owned texture.
    ///
    /// Imported resources survive [`RenderGraph::clear`](crate::RenderGraph::clear),
    /// so a pass importing every frame should check [`ResourceRegistry::contains`] first.
    pub fn import_texture(
        &mut self,
        id: impl Into<ResourceId>,
        texture: TextureHandle,
        entry_state: ResourceState,
        exit_state: ResourceState,
    ) -> ResourceId {
        self.registry.import_texture(id, texture, entry_state, exit_state)
    }

    /// Wrap an externally owned buffer
    pub fn import_buffer(
        &mut self,
        id: impl Into<ResourceId>,
        buffer: BufferHandle,
        entry_state: ResourceState,
        exit_state: ResourceState,
    ) -> ResourceId {
        self.registry.import_buffer(id, buffer, entry_state, exit_state)
    }

    /// Reuse the memory of `old_id`, which must not be accessed after this pass.
    pub fn alias_resource(
        &mut self,
        new_id: impl Into<ResourceId>,
        old_id: &ResourceId,
        resource_type: ResourceType,
    ) -> ResourceId {
        self.registry.alias(new_id, old_id, resource_type)
    }

    /// Reserve a name for a resource created later
    pub fn declare_proxy(&mut self, id: impl Into<ResourceId>) -> ResourceId {
        self.registry.declare_proxy(id)
    }

    /// Declare that this pass reads from a resource
    pub fn read_resource(
        &mut self,
        id: &ResourceId,
        required_state: ResourceState,
    ) -> ResourceView {
        self.access(id, AccessKind::Read, required_state)
    }

    /// Declare that this pass writes to a resource
    pub fn write_resource(
        &mut self,
        id: &ResourceId,
        required_state: ResourceState,
    ) -> ResourceView {
        self.access(id, AccessKind::Write, required_state)
    }

    /// Declare that this pass both reads and writes a resource
    pub fn read_write_resource(
        &mut self,
        id: &ResourceId,
        required_state: ResourceState,
    ) -> ResourceView {
        self.access(id, AccessKind::ReadWrite, required_state)
    }

    fn access(
        &mut self,
        id: &ResourceId,
        kind: AccessKind,
        required_state: ResourceState,
    ) -> ResourceView {
        let record = self.registry.record(id);
        assert!(
            record.kind() != ResourceVariantKind::Proxy,
            "proxy resource '{id}' cannot be accessed"
        );
        if kind == AccessKind::Read
            && record.kind() == ResourceVariantKind::Declared
            && record.usage_lifetime().is_unbounded()
        {
            log::warn!(
                "Pass at depth {} reads '{}' before anything wrote it",
                self.depth,
                id
            );
        }
        if kind.writes() && required_state.is_read_only() {
            log::warn!(
                "Pass at depth {} writes '{}' in read-only state {:?}",
                self.depth,
                id,
                required_state
            );
        }
        let resource_type = record.resource_type();

        self.registry.resolve_lifetime(id, self.depth);
        self.accesses.push(ResourceAccess {
            resource: id.clone(),
            kind,
            required_state,
        });

        ResourceView {
            id: id.clone(),
            resource_type,
            access: kind,
        }
    }
}

/// Context for executing a render pass
pub struct PassExecuteContext<'a> {
    pub device: &'a mut dyn Any,
    pub command_list: CommandListHandle,
    pub depth: u32,
    pub(crate) registry: &'a mut ResourceRegistry,
}

impl<'a> PassExecuteContext<'a> {
    /// Get device as concrete type
    pub fn device<D: RenderDevice + 'static>(&mut self) -> Option<&mut D> {
        self.device.downcast_mut::<D>()
    }

    /// Backing of a resource, following alias chains to the current root backing.
    pub fn resolve(&mut self, id: &ResourceId) -> Option<GpuResource> {
        self.registry.get(id)
    }

    /// Get the texture behind a view
    pub fn texture(&mut self, view: &ResourceView) -> Option<TextureHandle> {
        match self.resolve(&view.id)? {
            GpuResource::Texture(texture) => Some(texture),
            GpuResource::Buffer(_) => None,
        }
    }

    /// Get the buffer behind a view
    pub fn buffer(&mut self, view: &ResourceView) -> Option<BufferHandle> {
        match self.resolve(&view.id)? {
            GpuResource::Buffer(buffer) => Some(buffer),
            GpuResource::Texture(_) => None,
        }
    }
}

/// Trait for render passes
pub trait RenderPass: Send + Sync {
    /// Get the pass name for debugging
    fn name(&self) -> &str;

    /// Setup phase - declare resources and accesses
    fn setup(&mut self, builder: &mut PassBuilder);

    /// Execute phase - record commands
    fn execute(&self, ctx: &mut PassExecuteContext);
}

/// Metadata about a pass in the graph
#[derive(Debug, Clone)]
pub struct PassNode {
    pub id: PassId,
    pub name: String,
    pub accesses: Vec<ResourceAccess>,
}

impl PassNode {
    pub fn depth(&self) -> u32 {
        self.id.depth()
    }

    pub fn reads_resource(&self, resource: &ResourceId) -> bool {
        self.accesses
            .iter()
            .any(|a| &a.resource == resource && a.kind.reads())
    }

    pub fn writes_resource(&self, resource: &ResourceId) -> bool {
        self.accesses
            .iter()
            .any(|a| &a.resource == resource && a.kind.writes())
    }
}
