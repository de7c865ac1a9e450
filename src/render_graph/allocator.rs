//! Backing allocator
//!
//! Declared resources are placed in one of three device pools: attachment
//! textures (render targets and depth-stencil), every other texture, and
//! buffers. The pools are created once per graph and outlive every build.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::resource::ResourceDesc;
use crate::GraphConfig;

/// Which pool a resource is placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    RenderTarget,
    Texture,
    Buffer,
}

impl PoolKind {
    pub fn for_desc(desc: &ResourceDesc) -> Self {
        match desc {
            ResourceDesc::Texture(texture) if texture.usage.is_attachment() => {
                PoolKind::RenderTarget
            }
            ResourceDesc::Texture(_) => PoolKind::Texture,
            ResourceDesc::Buffer(_) => PoolKind::Buffer,
        }
    }
}

/// Owner of the three memory pools backing Declared resources.
#[derive(Debug)]
pub struct BackingAllocator {
    render_target_pool: MemoryPoolHandle,
    texture_pool: MemoryPoolHandle,
    buffer_pool: MemoryPoolHandle,
}

impl BackingAllocator {
    /// Create the pools sized by `config`.
    pub fn new<D: RenderDevice + ?Sized>(
        device: &mut D,
        config: &GraphConfig,
    ) -> BackendResult<Self> {
        let render_target_pool = device.create_memory_pool(&MemoryPoolDescriptor {
            label: Some("render_graph_render_targets".into()),
            size: config.render_target_pool_size,
        })?;
        let texture_pool = device.create_memory_pool(&MemoryPoolDescriptor {
            label: Some("render_graph_textures".into()),
            size: config.texture_pool_size,
        })?;
        let buffer_pool = device.create_memory_pool(&MemoryPoolDescriptor {
            label: Some("render_graph_buffers".into()),
            size: config.buffer_pool_size,
        })?;

        log::debug!(
            "Created render graph pools: {} / {} / {} bytes",
            config.render_target_pool_size,
            config.texture_pool_size,
            config.buffer_pool_size
        );

        Ok(Self {
            render_target_pool,
            texture_pool,
            buffer_pool,
        })
    }

    pub fn pool(&self, kind: PoolKind) -> MemoryPoolHandle {
        match kind {
            PoolKind::RenderTarget => self.render_target_pool,
            PoolKind::Texture => self.texture_pool,
            PoolKind::Buffer => self.buffer_pool,
        }
    }

    /// Create the backing for `desc` in its pool.
    pub fn allocate<D: RenderDevice + ?Sized>(
        &self,
        device: &mut D,
        desc: &ResourceDesc,
    ) -> BackendResult<GpuResource> {
        let pool = self.pool(PoolKind::for_desc(desc));
        let backing = match desc {
            ResourceDesc::Texture(texture) => {
                GpuResource::Texture(device.create_texture(texture, pool)?)
            }
            ResourceDesc::Buffer(buffer) => {
                GpuResource::Buffer(device.create_buffer(buffer, pool)?)
            }
        };
        log::trace!(
            "Allocated {:?} ({} bytes) from {:?}",
            backing,
            desc.size_in_bytes(),
            PoolKind::for_desc(desc)
        );
        Ok(backing)
    }

    /// Statistics of one pool.
    pub fn pool_memory_info<D: RenderDevice + ?Sized>(
        &self,
        device: &D,
        kind: PoolKind,
    ) -> PoolMemoryInfo {
        device.pool_memory_info(self.pool(kind))
    }

    /// Statistics of all three pools combined.
    pub fn memory_info<D: RenderDevice + ?Sized>(&self, device: &D) -> PoolMemoryInfo {
        let mut total = PoolMemoryInfo::default();
        for kind in [PoolKind::RenderTarget, PoolKind::Texture, PoolKind::Buffer] {
            total.accumulate(&self.pool_memory_info(device, kind));
        }
        total
    }

    /// Destroy the pools. Every backing placed in them must be freed first.
    pub fn destroy<D: RenderDevice + ?Sized>(self, device: &mut D) {
        device.destroy_memory_pool(self.render_target_pool);
        device.destroy_memory_pool(self.texture_pool);
        device.destroy_memory_pool(self.buffer_pool);
    }
}
