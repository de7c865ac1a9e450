//! Realization and alias validation
//!
//! After every pass has declared its accesses, Declared records receive
//! backing memory and Aliased records pick up their root's backing. The
//! alias validation then proves each parent is finished before its alias
//! starts touching the shared memory.

use crate::backend::traits::RenderDevice;
use crate::render_graph::allocator::BackingAllocator;
use crate::render_graph::error::{GraphError, GraphResult};
use crate::render_graph::registry::ResourceRegistry;
use crate::render_graph::resource::ResourceVariant;

impl ResourceRegistry {
    /// Allocate backing for every Declared record and resolve every alias.
    ///
    /// Declared records that already carry a backing from an earlier build
    /// keep it. An allocation failure aborts realization; backings created
    /// up to that point stay on their records and are released on clear.
    pub fn realize<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        allocator: &BackingAllocator,
    ) -> GraphResult<()> {
        let keys = self.keys();
        let mut allocated = 0usize;

        for &key in &keys {
            let record = self.record_mut(key);
            if record.backing.is_some() {
                continue;
            }
            if let ResourceVariant::Declared(declared) = &record.variant {
                let backing = allocator.allocate(device, &declared.desc)?;
                record.backing = Some(backing);
                allocated += 1;
            }
        }

        for &key in &keys {
            if let ResourceVariant::Aliased(aliased) = self.record_at(key).variant {
                let backing = self.record_at(aliased.original).backing;
                self.record_mut(key).backing = backing;
            }
        }

        log::debug!(
            "Realized {} resources ({} newly allocated)",
            keys.len(),
            allocated
        );
        Ok(())
    }

    /// Check that every alias starts no earlier than the last use of any
    /// record it inherits memory from.
    ///
    /// Ancestors are walked from the immediate parent up to the root, so a
    /// never-accessed link in the middle of a chain does not hide the records
    /// above it. Each ancestor's own usage end is compared with the alias's
    /// usage start; equal depths pass. Records never accessed impose no bound.
    pub fn sanitize_aliasing_lifetimes(&self) -> GraphResult<()> {
        for record in self.records() {
            let ResourceVariant::Aliased(aliased) = record.variant else {
                continue;
            };
            let alias_usage = record.usage_lifetime;
            if alias_usage.is_unbounded() {
                continue;
            }

            let mut ancestor_key = aliased.parent;
            loop {
                let ancestor = self.record_at(ancestor_key);
                let ancestor_usage = ancestor.usage_lifetime;
                if !ancestor_usage.is_unbounded() && ancestor_usage.end > alias_usage.start {
                    return Err(GraphError::AliasingLifetimeOverlap {
                        alias: record.id.clone(),
                        parent: ancestor.id.clone(),
                        parent_end: ancestor_usage.end,
                        alias_start: alias_usage.start,
                    });
                }
                match ancestor.variant {
                    ResourceVariant::Aliased(next) => ancestor_key = next.parent,
                    _ => break,
                }
            }
        }
        Ok(())
    }
}
