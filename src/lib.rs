//! Render Graph Resources - per-frame resource management for render graphs
//!
//! Passes declare the textures and buffers they create, import and read or
//! write. Each frame the graph:
//! - computes the depth range every resource is live for
//! - backs graph-owned resources from three device memory pools
//! - lets finished resources hand their memory to later ones (aliasing)
//!   and validates that no alias starts before its parent's last use
//! - schedules the minimal set of state transitions before each pass
//! - hands imported resources back to their owners in their exit state
//!
//! Graph-owned memory is released through a [`GarbageBin`] once the frames
//! still in flight have retired.
//!
//! The device is abstracted by [`RenderDevice`]; [`DummyDevice`] is an
//! in-memory implementation used for testing.

pub mod backend;
pub mod render_graph;

pub use backend::{DummyDevice, RenderDevice};
pub use render_graph::{
    GarbageBin, GraphError, GraphResult, PassBuilder, PassExecuteContext, RenderGraph, RenderPass,
    ResourceId, ResourceRegistry, ResourceType,
};

/// Default size of each memory pool, 100 MB.
pub const DEFAULT_POOL_SIZE: u64 = 100 * 1024 * 1024;

/// Configuration for a render graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    /// Pool for textures used as color or depth-stencil attachments
    pub render_target_pool_size: u64,
    /// Pool for all other textures
    pub texture_pool_size: u64,
    /// Pool for buffers
    pub buffer_pool_size: u64,
    /// Frames a released backing is kept alive for
    pub frames_in_flight: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            render_target_pool_size: DEFAULT_POOL_SIZE,
            texture_pool_size: DEFAULT_POOL_SIZE,
            buffer_pool_size: DEFAULT_POOL_SIZE,
            frames_in_flight: render_graph::garbage_bin::DEFAULT_FRAMES_IN_FLIGHT,
        }
    }
}

impl GraphConfig {
    pub fn with_render_target_pool_size(mut self, size: u64) -> Self {
        self.render_target_pool_size = size;
        self
    }

    pub fn with_texture_pool_size(mut self, size: u64) -> Self {
        self.texture_pool_size = size;
        self
    }

    pub fn with_buffer_pool_size(mut self, size: u64) -> Self {
        self.buffer_pool_size = size;
        self
    }

    pub fn with_frames_in_flight(mut self, frames: u64) -> Self {
        self.frames_in_flight = frames;
        self
    }
}
