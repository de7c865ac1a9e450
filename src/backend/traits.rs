//! Backing device abstraction
//!
//! The render graph never talks to a graphics API directly. Memory pools,
//! textures, buffers and barriers all go through [`RenderDevice`].

use crate::backend::types::*;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create memory pool: {0}")]
    PoolCreationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Memory pool exhausted: requested {requested} bytes, {available} available")]
    PoolExhausted { requested: u64, available: u64 },
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

/// Handle to a device memory pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryPoolHandle(pub(crate) u64);

/// Handle to a command list barriers are recorded into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandListHandle(pub(crate) u64);

macro_rules! raw_handle {
    ($($name:ident),*) => {
        $(
            impl $name {
                /// Wrap a raw device handle.
                pub fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }
            }
        )*
    };
}

raw_handle!(
    BufferHandle,
    TextureHandle,
    MemoryPoolHandle,
    CommandListHandle
);

/// Device interface consumed by the render graph.
///
/// Implementations own the actual memory and command recording. The graph
/// only holds handles and never frees anything synchronously; deletions are
/// routed through [`GarbageBin`](crate::render_graph::GarbageBin).
pub trait RenderDevice {
    /// Create a memory pool that placed resources are sub-allocated from.
    fn create_memory_pool(&mut self, desc: &MemoryPoolDescriptor)
        -> BackendResult<MemoryPoolHandle>;

    /// Destroy a memory pool. All resources placed in it must already be freed.
    fn destroy_memory_pool(&mut self, pool: MemoryPoolHandle);

    /// Create a texture inside `pool`.
    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        pool: MemoryPoolHandle,
    ) -> BackendResult<TextureHandle>;

    /// Create a buffer inside `pool`.
    fn create_buffer(
        &mut self,
        desc: &BufferDescriptor,
        pool: MemoryPoolHandle,
    ) -> BackendResult<BufferHandle>;

    fn free_texture(&mut self, texture: TextureHandle);

    fn free_buffer(&mut self, buffer: BufferHandle);

    /// Record barriers into a command list.
    fn emit_barriers(&mut self, command_list: CommandListHandle, barriers: &[GpuBarrier]);

    /// Query utilization of a pool.
    fn pool_memory_info(&self, pool: MemoryPoolHandle) -> PoolMemoryInfo;
}
