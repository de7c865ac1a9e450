//! Common types shared between the graph and device implementations

use bitflags::bitflags;

use crate::backend::traits::{BufferHandle, TextureHandle};

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
    Depth24PlusStencil8,
    R32Float,
    Rg32Float,
}

impl TextureFormat {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8
            | TextureFormat::R32Float => 4,
            TextureFormat::Rgba16Float | TextureFormat::Rg32Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const TEXTURE_BINDING = 1 << 2;
        const STORAGE_BINDING = 1 << 3;
        /// Color render target.
        const RENDER_ATTACHMENT = 1 << 4;
        /// Depth/stencil target.
        const DEPTH_STENCIL = 1 << 5;
    }
}

impl TextureUsage {
    /// Whether textures with this usage live in the render-target pool.
    pub fn is_attachment(&self) -> bool {
        self.intersects(Self::RENDER_ATTACHMENT | Self::DEPTH_STENCIL)
    }
}

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const INDEX = 1 << 2;
        const VERTEX = 1 << 3;
        const UNIFORM = 1 << 4;
        const STORAGE = 1 << 5;
        const INDIRECT = 1 << 6;
    }
}

bitflags! {
    /// Tracked state of a texture or buffer.
    ///
    /// Modelled after D3D12 resource states. `COMMON` is the empty set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        const COMMON = 0;
        const VERTEX_BUFFER = 1 << 0;
        const CONSTANT_BUFFER = 1 << 1;
        const INDEX_BUFFER = 1 << 2;
        const RENDER_TARGET = 1 << 3;
        const UNORDERED_ACCESS = 1 << 4;
        const DEPTH_WRITE = 1 << 5;
        const DEPTH_READ = 1 << 6;
        const NON_PIXEL_SHADER_RESOURCE = 1 << 7;
        const PIXEL_SHADER_RESOURCE = 1 << 8;
        const INDIRECT_ARGUMENT = 1 << 9;
        const COPY_DEST = 1 << 10;
        const COPY_SOURCE = 1 << 11;
        const PRESENT = 1 << 12;

        /// Readable from any shader stage.
        const SHADER_READ = Self::NON_PIXEL_SHADER_RESOURCE.bits()
            | Self::PIXEL_SHADER_RESOURCE.bits();
        const GENERIC_READ = Self::VERTEX_BUFFER.bits()
            | Self::CONSTANT_BUFFER.bits()
            | Self::INDEX_BUFFER.bits()
            | Self::SHADER_READ.bits()
            | Self::INDIRECT_ARGUMENT.bits()
            | Self::COPY_SOURCE.bits();
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::COMMON
    }
}

impl ResourceState {
    /// Whether the state only permits reads. `COMMON` permits anything.
    pub fn is_read_only(&self) -> bool {
        !self.is_empty() && Self::GENERIC_READ.union(Self::DEPTH_READ).contains(*self)
    }
}

/// Texture descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    /// State the texture is created in.
    pub initial_state: ResourceState,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            depth: 1,
            mip_levels: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            initial_state: ResourceState::COMMON,
        }
    }
}

impl TextureDescriptor {
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            width,
            height,
            format,
            usage,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    pub fn with_initial_state(mut self, state: ResourceState) -> Self {
        self.initial_state = state;
        self
    }

    /// Approximate size of the full mip chain in bytes.
    pub fn size_in_bytes(&self) -> u64 {
        let bpp = self.format.bytes_per_pixel() as u64;
        let mut total = 0u64;
        let (mut w, mut h, mut d) = (self.width.max(1), self.height.max(1), self.depth.max(1));
        for _ in 0..self.mip_levels.max(1) {
            total += w as u64 * h as u64 * d as u64 * bpp;
            w = (w / 2).max(1);
            h = (h / 2).max(1);
            d = (d / 2).max(1);
        }
        total
    }
}

/// Buffer descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
    /// State the buffer is created in.
    pub initial_state: ResourceState,
}

impl BufferDescriptor {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
            initial_state: ResourceState::COMMON,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_initial_state(mut self, state: ResourceState) -> Self {
        self.initial_state = state;
        self
    }
}

/// Memory pool descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPoolDescriptor {
    pub label: Option<String>,
    /// Capacity in bytes.
    pub size: u64,
}

/// Utilization statistics of one memory pool (or an aggregate of several).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolMemoryInfo {
    /// Bytes currently handed out to live allocations.
    pub allocated_bytes: u64,
    /// Bytes reserved by the pool's memory blocks.
    pub block_bytes: u64,
    /// Smallest live allocation, 0 when the pool is empty.
    pub smallest_alloc: u64,
    /// Largest live allocation, 0 when the pool is empty.
    pub largest_alloc: u64,
}

impl PoolMemoryInfo {
    /// Fold another pool's statistics into this one.
    pub fn accumulate(&mut self, other: &PoolMemoryInfo) {
        self.allocated_bytes += other.allocated_bytes;
        self.block_bytes += other.block_bytes;
        if other.allocated_bytes > 0 {
            self.smallest_alloc = if self.smallest_alloc == 0 {
                other.smallest_alloc
            } else {
                self.smallest_alloc.min(other.smallest_alloc)
            };
            self.largest_alloc = self.largest_alloc.max(other.largest_alloc);
        }
    }

    /// Fraction of block memory in use, in `0.0..=1.0`.
    pub fn utilization(&self) -> f32 {
        if self.block_bytes == 0 {
            0.0
        } else {
            self.allocated_bytes as f32 / self.block_bytes as f32
        }
    }
}

/// A concrete device allocation backing a graph resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuResource {
    Texture(TextureHandle),
    Buffer(BufferHandle),
}

/// Barrier instruction handed to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuBarrier {
    /// Whole-resource state transition.
    Transition {
        resource: GpuResource,
        before: ResourceState,
        after: ResourceState,
    },
}

impl GpuBarrier {
    pub fn transition(resource: GpuResource, before: ResourceState, after: ResourceState) -> Self {
        GpuBarrier::Transition {
            resource,
            before,
            after,
        }
    }
}
