//! Dummy device for testing and development.
//!
//! This device doesn't touch any GPU but keeps exact bookkeeping of what the
//! render graph asked for: pool capacities, live allocations, freed handles
//! and every barrier recorded per command list.

use std::collections::HashMap;

use crate::backend::traits::*;
use crate::backend::types::*;

#[derive(Debug, Default)]
struct DummyPool {
    capacity: u64,
    /// Live allocations keyed by raw handle.
    allocations: HashMap<u64, u64>,
}

impl DummyPool {
    fn allocated(&self) -> u64 {
        self.allocations.values().sum()
    }

    fn allocate(&mut self, raw: u64, bytes: u64) -> BackendResult<()> {
        let available = self.capacity.saturating_sub(self.allocated());
        if bytes > available {
            return Err(BackendError::PoolExhausted {
                requested: bytes,
                available,
            });
        }
        self.allocations.insert(raw, bytes);
        Ok(())
    }
}

/// In-memory [`RenderDevice`].
#[derive(Debug, Default)]
pub struct DummyDevice {
    next_handle: u64,
    pools: HashMap<MemoryPoolHandle, DummyPool>,
    /// Pool each live resource was placed in.
    placements: HashMap<u64, MemoryPoolHandle>,
    live_textures: Vec<TextureHandle>,
    live_buffers: Vec<BufferHandle>,
    freed_textures: Vec<TextureHandle>,
    freed_buffers: Vec<BufferHandle>,
    barriers: Vec<(CommandListHandle, Vec<GpuBarrier>)>,
}

impl DummyDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the device name.
    pub fn name(&self) -> &'static str {
        "Dummy"
    }

    /// Allocate a fresh command list handle.
    pub fn create_command_list(&mut self) -> CommandListHandle {
        CommandListHandle(self.allocate_raw())
    }

    /// Create a texture that lives outside any pool, as an external owner
    /// (e.g. a swapchain) would.
    pub fn create_external_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.allocate_raw());
        self.live_textures.push(handle);
        handle
    }

    /// Create a buffer that lives outside any pool.
    pub fn create_external_buffer(&mut self) -> BufferHandle {
        let handle = BufferHandle(self.allocate_raw());
        self.live_buffers.push(handle);
        handle
    }

    pub fn live_textures(&self) -> &[TextureHandle] {
        &self.live_textures
    }

    pub fn live_buffers(&self) -> &[BufferHandle] {
        &self.live_buffers
    }

    pub fn freed_textures(&self) -> &[TextureHandle] {
        &self.freed_textures
    }

    pub fn freed_buffers(&self) -> &[BufferHandle] {
        &self.freed_buffers
    }

    /// Every barrier batch recorded so far, in submission order.
    pub fn barrier_batches(&self) -> &[(CommandListHandle, Vec<GpuBarrier>)] {
        &self.barriers
    }

    /// All barriers recorded so far, flattened.
    pub fn recorded_barriers(&self) -> Vec<GpuBarrier> {
        self.barriers
            .iter()
            .flat_map(|(_, batch)| batch.iter().copied())
            .collect()
    }

    pub fn clear_barrier_log(&mut self) {
        self.barriers.clear();
    }

    fn allocate_raw(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn place(&mut self, pool: MemoryPoolHandle, bytes: u64) -> BackendResult<u64> {
        let raw = self.next_handle + 1;
        let Some(dummy_pool) = self.pools.get_mut(&pool) else {
            return Err(BackendError::OutOfMemory);
        };
        dummy_pool.allocate(raw, bytes)?;
        self.next_handle = raw;
        self.placements.insert(raw, pool);
        Ok(raw)
    }

    fn release(&mut self, raw: u64) {
        if let Some(pool) = self.placements.remove(&raw) {
            if let Some(dummy_pool) = self.pools.get_mut(&pool) {
                dummy_pool.allocations.remove(&raw);
            }
        }
    }
}

impl RenderDevice for DummyDevice {
    fn create_memory_pool(
        &mut self,
        desc: &MemoryPoolDescriptor,
    ) -> BackendResult<MemoryPoolHandle> {
        log::trace!(
            "DummyDevice: creating memory pool {:?} ({} bytes)",
            desc.label,
            desc.size
        );
        let handle = MemoryPoolHandle(self.allocate_raw());
        self.pools.insert(
            handle,
            DummyPool {
                capacity: desc.size,
                ..Default::default()
            },
        );
        Ok(handle)
    }

    fn destroy_memory_pool(&mut self, pool: MemoryPoolHandle) {
        if let Some(removed) = self.pools.remove(&pool) {
            if !removed.allocations.is_empty() {
                log::warn!(
                    "DummyDevice: destroying pool {:?} with {} live allocations",
                    pool,
                    removed.allocations.len()
                );
            }
        }
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        pool: MemoryPoolHandle,
    ) -> BackendResult<TextureHandle> {
        log::trace!(
            "DummyDevice: creating texture {:?} ({}x{}x{})",
            desc.label,
            desc.width,
            desc.height,
            desc.depth
        );
        let raw = self.place(pool, desc.size_in_bytes())?;
        let handle = TextureHandle(raw);
        self.live_textures.push(handle);
        Ok(handle)
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDescriptor,
        pool: MemoryPoolHandle,
    ) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyDevice: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        let raw = self.place(pool, desc.size)?;
        let handle = BufferHandle(raw);
        self.live_buffers.push(handle);
        Ok(handle)
    }

    fn free_texture(&mut self, texture: TextureHandle) {
        self.release(texture.0);
        self.live_textures.retain(|&t| t != texture);
        self.freed_textures.push(texture);
    }

    fn free_buffer(&mut self, buffer: BufferHandle) {
        self.release(buffer.0);
        self.live_buffers.retain(|&b| b != buffer);
        self.freed_buffers.push(buffer);
    }

    fn emit_barriers(&mut self, command_list: CommandListHandle, barriers: &[GpuBarrier]) {
        log::trace!(
            "DummyDevice: recording {} barriers into {:?}",
            barriers.len(),
            command_list
        );
        self.barriers.push((command_list, barriers.to_vec()));
    }

    fn pool_memory_info(&self, pool: MemoryPoolHandle) -> PoolMemoryInfo {
        let Some(dummy_pool) = self.pools.get(&pool) else {
            return PoolMemoryInfo::default();
        };
        PoolMemoryInfo {
            allocated_bytes: dummy_pool.allocated(),
            block_bytes: dummy_pool.capacity,
            smallest_alloc: dummy_pool.allocations.values().copied().min().unwrap_or(0),
            largest_alloc: dummy_pool.allocations.values().copied().max().unwrap_or(0),
        }
    }
}
