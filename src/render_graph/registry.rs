//! Resource registry
//!
//! Maps resource ids to records stored in a dense table. Alias chains are
//! followed by index through the same table; every Aliased record caches the
//! key of its chain root at creation, so root lookups are O(1).
//!
//! Construction errors (duplicate ids, unknown ids, aliasing a resource
//! twice) are bugs in pass authoring and panic immediately.

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::backend::traits::{BufferHandle, TextureHandle};
use crate::backend::types::*;
use crate::render_graph::garbage_bin::{DeferredDeletion, GarbageBin};
use crate::render_graph::lifetime::Lifetime;
use crate::render_graph::resource::*;

/// Table of every resource known to one graph build.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: SlotMap<ResourceKey, ResourceRecord>,
    names: HashMap<ResourceId, ResourceKey>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Declaration
    // ========================================================================

    /// Declare a texture the graph allocates itself.
    pub fn declare_texture(
        &mut self,
        id: impl Into<ResourceId>,
        desc: TextureDescriptor,
    ) -> ResourceId {
        self.declare(id, ResourceDesc::Texture(desc))
    }

    /// Declare a buffer the graph allocates itself.
    pub fn declare_buffer(
        &mut self,
        id: impl Into<ResourceId>,
        desc: BufferDescriptor,
    ) -> ResourceId {
        self.declare(id, ResourceDesc::Buffer(desc))
    }

    /// Declare a resource the graph allocates itself.
    ///
    /// The record starts in the descriptor's initial state.
    pub fn declare(&mut self, id: impl Into<ResourceId>, desc: ResourceDesc) -> ResourceId {
        let id = id.into();
        self.assert_vacant(&id);

        let resource_type = desc.resource_type();
        let current_state = desc.initial_state();
        log::trace!("Declaring {:?} '{}' in {:?}", resource_type, id, current_state);

        self.insert(
            id,
            resource_type,
            ResourceVariant::Declared(DeclaredResource {
                desc,
                current_state,
                resource_lifetime: Lifetime::UNBOUNDED,
            }),
            None,
        )
    }

    /// Import an externally owned texture.
    pub fn import_texture(
        &mut self,
        id: impl Into<ResourceId>,
        texture: TextureHandle,
        entry_state: ResourceState,
        exit_state: ResourceState,
    ) -> ResourceId {
        self.import(id, GpuResource::Texture(texture), entry_state, exit_state)
    }

    /// Import an externally owned buffer.
    pub fn import_buffer(
        &mut self,
        id: impl Into<ResourceId>,
        buffer: BufferHandle,
        entry_state: ResourceState,
        exit_state: ResourceState,
    ) -> ResourceId {
        self.import(id, GpuResource::Buffer(buffer), entry_state, exit_state)
    }

    /// Import an externally owned resource.
    ///
    /// The graph assumes `entry_state` whenever a build starts and hands the
    /// resource back in `exit_state` once the graph has executed.
    pub fn import(
        &mut self,
        id: impl Into<ResourceId>,
        backing: GpuResource,
        entry_state: ResourceState,
        exit_state: ResourceState,
    ) -> ResourceId {
        let id = id.into();
        self.assert_vacant(&id);
        log::trace!(
            "Importing '{}' ({:?} -> {:?})",
            id,
            entry_state,
            exit_state
        );

        self.insert(
            id,
            resource_type_of(backing),
            ResourceVariant::Imported(ImportedResource {
                entry_state,
                exit_state,
                current_state: entry_state,
                resource_lifetime: Lifetime::UNBOUNDED,
            }),
            Some(backing),
        )
    }

    /// Swap the backing of an imported texture, keeping its tracked state.
    pub fn change_imported_texture(&mut self, id: &ResourceId, texture: TextureHandle) {
        self.change_imported_backing(id, GpuResource::Texture(texture));
    }

    /// Swap the backing of an imported buffer, keeping its tracked state.
    pub fn change_imported_buffer(&mut self, id: &ResourceId, buffer: BufferHandle) {
        self.change_imported_backing(id, GpuResource::Buffer(buffer));
    }

    /// Swap the backing of an imported resource, keeping its tracked state.
    ///
    /// Used for externally rotated resources such as swapchain images that
    /// keep one logical name across frames.
    pub fn change_imported_backing(&mut self, id: &ResourceId, backing: GpuResource) {
        let key = self.key(id);
        let record = self.record_mut(key);
        assert!(
            record.kind() == ResourceVariantKind::Imported,
            "resource '{id}' is {:?}, only imported resources can change backing",
            record.kind()
        );
        assert!(
            record.resource_type == resource_type_of(backing),
            "resource '{id}' is a {:?} and cannot be backed by a {:?}",
            record.resource_type,
            resource_type_of(backing)
        );
        record.backing = Some(backing);
    }

    /// Remove an imported resource entirely, e.g. when its owner revokes it.
    ///
    /// Aliases of the import share its memory and are removed with it.
    pub fn free_imported(&mut self, id: &ResourceId) {
        let key = self.key(id);
        assert!(
            self.record_at(key).kind() == ResourceVariantKind::Imported,
            "resource '{id}' is not imported and cannot be freed by id"
        );

        let mut dropped_aliases = 0usize;
        self.resources.retain(|record_key, record| match record.variant {
            ResourceVariant::Aliased(aliased) if aliased.original == key => {
                dropped_aliases += 1;
                false
            }
            _ => record_key != key,
        });
        let resources = &self.resources;
        self.names.retain(|_, key| resources.contains_key(*key));

        log::trace!(
            "Freed imported resource '{}' ({} aliases dropped)",
            id,
            dropped_aliases
        );
    }

    /// Declare `new_id` as reusing the backing of `old_id`.
    ///
    /// `old_id` may itself be an alias; the new record points at the chain's
    /// root. A resource can be aliased at most once.
    pub fn alias(
        &mut self,
        new_id: impl Into<ResourceId>,
        old_id: &ResourceId,
        resource_type: ResourceType,
    ) -> ResourceId {
        let new_id = new_id.into();
        self.assert_vacant(&new_id);
        let parent = self.key(old_id);

        let original = match &self.record_at(parent).variant {
            ResourceVariant::Declared(_) | ResourceVariant::Imported(_) => parent,
            ResourceVariant::Aliased(aliased) => aliased.original,
            ResourceVariant::Proxy => panic!("proxy resource '{old_id}' cannot be aliased"),
        };
        assert!(
            self.record_at(original).resource_type == resource_type,
            "cannot alias '{new_id}' as {:?}: '{old_id}' is backed by a {:?}",
            resource_type,
            self.record_at(original).resource_type
        );

        let parent_record = self.record_mut(parent);
        assert!(
            !parent_record.has_been_aliased,
            "resource '{old_id}' has already been aliased"
        );
        parent_record.has_been_aliased = true;

        log::trace!(
            "Aliasing '{}' onto '{}' (root '{}')",
            new_id,
            old_id,
            self.record_at(original).id
        );

        self.insert(
            new_id,
            resource_type,
            ResourceVariant::Aliased(AliasedResource { parent, original }),
            None,
        )
    }

    /// Reserve `id` without backing memory.
    pub fn declare_proxy(&mut self, id: impl Into<ResourceId>) -> ResourceId {
        let id = id.into();
        self.assert_vacant(&id);
        self.insert(id, ResourceType::Texture, ResourceVariant::Proxy, None)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Backing of `id`, `None` until realized.
    ///
    /// Aliased records re-resolve through their root on every call so a
    /// changed imported backing is observed, and refresh their cached handle.
    pub fn get(&mut self, id: &ResourceId) -> Option<GpuResource> {
        let key = self.key(id);
        let root = self.root_key(key);
        if root == key {
            return self.record_at(key).backing;
        }

        let backing = self.record_at(root).backing;
        self.record_mut(key).backing = backing;
        backing
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.names.contains_key(id)
    }

    /// Record of `id`, if it exists.
    pub fn lookup(&self, id: &ResourceId) -> Option<&ResourceRecord> {
        self.names.get(id).map(|&key| &self.resources[key])
    }

    /// Record of `id`. Panics if it does not exist.
    pub fn record(&self, id: &ResourceId) -> &ResourceRecord {
        self.record_at(self.key(id))
    }

    pub fn resource_type(&self, id: &ResourceId) -> ResourceType {
        self.record(id).resource_type
    }

    pub fn variant_kind(&self, id: &ResourceId) -> ResourceVariantKind {
        self.record(id).kind()
    }

    pub fn has_been_aliased(&self, id: &ResourceId) -> bool {
        self.record(id).has_been_aliased
    }

    /// Id of the Declared/Imported record at the root of `id`'s alias chain.
    pub fn original_of(&self, id: &ResourceId) -> &ResourceId {
        let root = self.root_key(self.key(id));
        &self.record_at(root).id
    }

    /// Id of the immediate alias parent, `None` for non-aliased records.
    pub fn parent_of(&self, id: &ResourceId) -> Option<&ResourceId> {
        match &self.record(id).variant {
            ResourceVariant::Aliased(aliased) => Some(&self.record_at(aliased.parent).id),
            _ => None,
        }
    }

    /// Usage lifetime of this specific record.
    pub fn usage_lifetime(&self, id: &ResourceId) -> Lifetime {
        self.record(id).usage_lifetime
    }

    /// Lifetime of the memory behind `id`, read from its alias-chain root.
    pub fn resource_lifetime(&self, id: &ResourceId) -> Lifetime {
        let root = self.root_key(self.key(id));
        self.record_at(root)
            .root_lifetime()
            .unwrap_or(Lifetime::UNBOUNDED)
    }

    /// Tracked state of the memory behind `id`.
    pub fn current_state(&self, id: &ResourceId) -> ResourceState {
        let root = self.root_key(self.key(id));
        match &self.record_at(root).variant {
            ResourceVariant::Declared(declared) => declared.current_state,
            ResourceVariant::Imported(imported) => imported.current_state,
            _ => panic!("resource '{id}' has no tracked state"),
        }
    }

    /// Overwrite the tracked state of the memory behind `id`.
    pub fn set_current_state(&mut self, id: &ResourceId, state: ResourceState) {
        let root = self.root_key(self.key(id));
        match self.record_mut(root).current_state_mut() {
            Some(current) => *current = state,
            None => panic!("resource '{id}' has no tracked state"),
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Ids of every record, in table order.
    pub fn iter_ids(&self) -> impl Iterator<Item = &ResourceId> + '_ {
        self.resources.values().map(|record| &record.id)
    }

    /// Records of every resource, in table order.
    pub fn records(&self) -> impl Iterator<Item = &ResourceRecord> + '_ {
        self.resources.values()
    }

    // ========================================================================
    // Frame boundary
    // ========================================================================

    /// Discard all graph-owned records and carry imported ones forward.
    ///
    /// Declared backings are handed to `bin` for deferred release; Aliased
    /// and Proxy records are dropped. Imported records survive with their
    /// lifetimes reset to the sentinel and may be aliased again.
    pub fn clear_declared_resources(&mut self, bin: &GarbageBin) {
        let mut released = 0usize;
        self.resources.retain(|_, record| match record.kind() {
            ResourceVariantKind::Imported => {
                record.usage_lifetime = Lifetime::UNBOUNDED;
                record.has_been_aliased = false;
                if let Some(lifetime) = record.root_lifetime_mut() {
                    *lifetime = Lifetime::UNBOUNDED;
                }
                true
            }
            ResourceVariantKind::Declared => {
                if let Some(backing) = record.backing {
                    bin.push_deferred_deletion(DeferredDeletion::from(backing));
                    released += 1;
                }
                false
            }
            ResourceVariantKind::Aliased | ResourceVariantKind::Proxy => false,
        });

        let resources = &self.resources;
        self.names.retain(|_, key| resources.contains_key(*key));

        log::debug!(
            "Cleared declared resources: {} backings deferred, {} imported kept",
            released,
            self.resources.len()
        );
    }

    // ========================================================================
    // Internal access
    // ========================================================================

    pub(crate) fn key(&self, id: &ResourceId) -> ResourceKey {
        match self.names.get(id) {
            Some(&key) => key,
            None => panic!("render graph resource '{id}' does not exist"),
        }
    }

    pub(crate) fn record_at(&self, key: ResourceKey) -> &ResourceRecord {
        &self.resources[key]
    }

    pub(crate) fn record_mut(&mut self, key: ResourceKey) -> &mut ResourceRecord {
        &mut self.resources[key]
    }

    /// Key of the Declared/Imported root; `key` itself for non-aliases.
    pub(crate) fn root_key(&self, key: ResourceKey) -> ResourceKey {
        match &self.resources[key].variant {
            ResourceVariant::Aliased(aliased) => aliased.original,
            _ => key,
        }
    }

    pub(crate) fn keys(&self) -> Vec<ResourceKey> {
        self.resources.keys().collect()
    }

    fn assert_vacant(&self, id: &ResourceId) {
        assert!(
            !self.names.contains_key(id),
            "render graph resource '{id}' already exists"
        );
    }

    fn insert(
        &mut self,
        id: ResourceId,
        resource_type: ResourceType,
        variant: ResourceVariant,
        backing: Option<GpuResource>,
    ) -> ResourceId {
        let mut record = ResourceRecord::new(id.clone(), resource_type, variant);
        record.backing = backing;
        let key = self.resources.insert(record);
        self.names.insert(id.clone(), key);
        id
    }
}

fn resource_type_of(backing: GpuResource) -> ResourceType {
    match backing {
        GpuResource::Texture(_) => ResourceType::Texture,
        GpuResource::Buffer(_) => ResourceType::Buffer,
    }
}
