//! Render Graph System
//!
//! Per-frame resource management for a sequence of render passes. Passes
//! declare, import and alias resources and record their accesses; the graph
//! computes resource lifetimes, backs graph-owned resources from memory
//! pools, validates aliasing and schedules the state transitions each pass
//! needs.

pub mod aliasing;
pub mod allocator;
pub mod error;
pub mod executor;
pub mod garbage_bin;
pub mod graph;
pub mod lifetime;
pub mod pass;
pub mod registry;
pub mod resource;
pub mod transition;

pub use allocator::{BackingAllocator, PoolKind};
pub use error::{GraphError, GraphResult};
pub use executor::*;
pub use garbage_bin::{DeferredDeletion, GarbageBin};
pub use graph::*;
pub use lifetime::Lifetime;
pub use pass::*;
pub use registry::ResourceRegistry;
pub use resource::*;
pub use transition::ResourceTransition;
