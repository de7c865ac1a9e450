//! Lifetime resolution
//!
//! Every declared access widens two ranges: the usage lifetime of the
//! accessed record, and the resource lifetime of the Declared/Imported root
//! its alias chain leads to. The aliasing validation later relies on these
//! ranges to prove a parent is finished before its alias starts.

use crate::render_graph::registry::ResourceRegistry;
use crate::render_graph::resource::ResourceId;

/// Inclusive range of traversal depths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lifetime {
    pub start: u32,
    pub end: u32,
}

impl Lifetime {
    /// The `(u32::MAX, u32::MIN)` sentinel.
    ///
    /// Fresh records start here; imported resources are reset to it every
    /// frame, meaning "no bound from the graph's perspective".
    pub const UNBOUNDED: Self = Self {
        start: u32::MAX,
        end: u32::MIN,
    };

    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "lifetime start {start} after end {end}");
        Self { start, end }
    }

    /// True while no access has been recorded.
    pub fn is_unbounded(&self) -> bool {
        self.start > self.end
    }

    /// Extend the range so it includes `depth`.
    pub fn widen(&mut self, depth: u32) {
        self.start = self.start.min(depth);
        self.end = self.end.max(depth);
    }

    pub fn contains(&self, depth: u32) -> bool {
        self.start <= depth && depth <= self.end
    }

    /// Number of depths covered, 0 for the sentinel.
    pub fn span(&self) -> u32 {
        if self.is_unbounded() {
            0
        } else {
            self.end - self.start + 1
        }
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

impl ResourceRegistry {
    /// Record an access to `id` at `depth`.
    ///
    /// Widens the record's own usage lifetime and the resource lifetime of
    /// its alias-chain root. Repeated accesses at one depth are idempotent.
    pub fn resolve_lifetime(&mut self, id: &ResourceId, depth: u32) {
        let key = self.key(id);
        self.record_mut(key).usage_lifetime.widen(depth);

        let root = self.root_key(key);
        if let Some(lifetime) = self.record_mut(root).root_lifetime_mut() {
            lifetime.widen(depth);
        }
    }
}
