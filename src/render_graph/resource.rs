//! Resource records tracked by the render graph

use std::fmt;
use std::sync::Arc;

use crate::backend::types::*;
use crate::render_graph::lifetime::Lifetime;

slotmap::new_key_type! {
    /// Index of a record in the registry's resource table.
    pub struct ResourceKey;
}

/// Name of a graph resource, supplied by the pass that declares it.
///
/// Unique within one graph build. Imported resources keep their id across
/// frames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(Arc<str>);

impl ResourceId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ResourceId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl From<&ResourceId> for ResourceId {
    fn from(id: &ResourceId) -> Self {
        id.clone()
    }
}

/// Kind of memory a resource occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceType {
    #[default]
    Texture,
    Buffer,
}

/// Description of a resource the graph allocates itself
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceDesc {
    Texture(TextureDescriptor),
    Buffer(BufferDescriptor),
}

impl ResourceDesc {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceDesc::Texture(_) => ResourceType::Texture,
            ResourceDesc::Buffer(_) => ResourceType::Buffer,
        }
    }

    /// State the resource is in right after creation.
    pub fn initial_state(&self) -> ResourceState {
        match self {
            ResourceDesc::Texture(desc) => desc.initial_state,
            ResourceDesc::Buffer(desc) => desc.initial_state,
        }
    }

    pub fn size_in_bytes(&self) -> u64 {
        match self {
            ResourceDesc::Texture(desc) => desc.size_in_bytes(),
            ResourceDesc::Buffer(desc) => desc.size,
        }
    }
}

/// A resource the graph allocates and owns for one build.
#[derive(Debug, Clone)]
pub struct DeclaredResource {
    pub desc: ResourceDesc,
    pub current_state: ResourceState,
    /// Union of the usage lifetimes of this resource and its alias chain.
    pub resource_lifetime: Lifetime,
}

/// A resource owned outside the graph.
#[derive(Debug, Clone)]
pub struct ImportedResource {
    pub entry_state: ResourceState,
    pub exit_state: ResourceState,
    pub current_state: ResourceState,
    /// Conceptually unbounded; only widened for diagnostics.
    pub resource_lifetime: Lifetime,
}

/// A resource reusing the backing of an earlier one.
#[derive(Debug, Clone, Copy)]
pub struct AliasedResource {
    /// Immediate predecessor in the alias chain.
    pub parent: ResourceKey,
    /// Declared or Imported root of the chain.
    pub original: ResourceKey,
}

/// Per-resource variant state.
#[derive(Debug, Clone)]
pub enum ResourceVariant {
    Declared(DeclaredResource),
    Imported(ImportedResource),
    Aliased(AliasedResource),
    /// Reserved name without backing memory.
    Proxy,
}

/// Discriminant of [`ResourceVariant`] for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceVariantKind {
    Declared,
    Imported,
    Aliased,
    Proxy,
}

impl ResourceVariant {
    pub fn kind(&self) -> ResourceVariantKind {
        match self {
            ResourceVariant::Declared(_) => ResourceVariantKind::Declared,
            ResourceVariant::Imported(_) => ResourceVariantKind::Imported,
            ResourceVariant::Aliased(_) => ResourceVariantKind::Aliased,
            ResourceVariant::Proxy => ResourceVariantKind::Proxy,
        }
    }
}

/// One entry of the resource table.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub(crate) id: ResourceId,
    pub(crate) resource_type: ResourceType,
    pub(crate) variant: ResourceVariant,
    /// Depths at which this specific record was accessed.
    pub(crate) usage_lifetime: Lifetime,
    pub(crate) has_been_aliased: bool,
    pub(crate) backing: Option<GpuResource>,
}

impl ResourceRecord {
    pub(crate) fn new(
        id: ResourceId,
        resource_type: ResourceType,
        variant: ResourceVariant,
    ) -> Self {
        Self {
            id,
            resource_type,
            variant,
            usage_lifetime: Lifetime::UNBOUNDED,
            has_been_aliased: false,
            backing: None,
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn variant(&self) -> &ResourceVariant {
        &self.variant
    }

    pub fn kind(&self) -> ResourceVariantKind {
        self.variant.kind()
    }

    pub fn usage_lifetime(&self) -> Lifetime {
        self.usage_lifetime
    }

    pub fn has_been_aliased(&self) -> bool {
        self.has_been_aliased
    }

    /// Cached backing handle, `None` until realized.
    pub fn backing(&self) -> Option<GpuResource> {
        self.backing
    }

    /// Lifetime of the underlying memory. Only roots carry one.
    pub(crate) fn root_lifetime_mut(&mut self) -> Option<&mut Lifetime> {
        match &mut self.variant {
            ResourceVariant::Declared(declared) => Some(&mut declared.resource_lifetime),
            ResourceVariant::Imported(imported) => Some(&mut imported.resource_lifetime),
            ResourceVariant::Aliased(_) | ResourceVariant::Proxy => None,
        }
    }

    pub(crate) fn root_lifetime(&self) -> Option<Lifetime> {
        match &self.variant {
            ResourceVariant::Declared(declared) => Some(declared.resource_lifetime),
            ResourceVariant::Imported(imported) => Some(imported.resource_lifetime),
            ResourceVariant::Aliased(_) | ResourceVariant::Proxy => None,
        }
    }

    pub(crate) fn current_state_mut(&mut self) -> Option<&mut ResourceState> {
        match &mut self.variant {
            ResourceVariant::Declared(declared) => Some(&mut declared.current_state),
            ResourceVariant::Imported(imported) => Some(&mut imported.current_state),
            ResourceVariant::Aliased(_) | ResourceVariant::Proxy => None,
        }
    }
}
