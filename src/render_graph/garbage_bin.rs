//! Deferred deletion of graph-owned backings.
//!
//! GPU work runs a few frames behind the CPU, so a Declared resource's
//! backing cannot be freed when the graph is cleared: last frame's commands
//! may still reference it. Clearing hands each backing to the [`GarbageBin`]
//! instead, tagged with the frame after which it is safe to release.
//!
//! ```text
//! push (frame N)          advance_frame x frames_in_flight      free
//!   ──────────►  [ queue ordered by safe_after ]  ──────────────►  device
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::backend::traits::{BufferHandle, RenderDevice, TextureHandle};
use crate::backend::types::GpuResource;
use crate::render_graph::resource::ResourceType;

/// Default deletion horizon in frames.
pub const DEFAULT_FRAMES_IN_FLIGHT: u64 = 3;

/// A backing waiting to be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredDeletion {
    pub resource_type: ResourceType,
    pub handle: GpuResource,
}

impl DeferredDeletion {
    pub fn texture(texture: TextureHandle) -> Self {
        Self::from(GpuResource::Texture(texture))
    }

    pub fn buffer(buffer: BufferHandle) -> Self {
        Self::from(GpuResource::Buffer(buffer))
    }

    /// Release the backing immediately.
    fn release<D: RenderDevice + ?Sized>(self, device: &mut D) {
        match self.handle {
            GpuResource::Texture(texture) => device.free_texture(texture),
            GpuResource::Buffer(buffer) => device.free_buffer(buffer),
        }
    }
}

impl From<GpuResource> for DeferredDeletion {
    fn from(handle: GpuResource) -> Self {
        let resource_type = match handle {
            GpuResource::Texture(_) => ResourceType::Texture,
            GpuResource::Buffer(_) => ResourceType::Buffer,
        };
        Self {
            resource_type,
            handle,
        }
    }
}

#[derive(Debug)]
struct PendingDeletion {
    safe_after: u64,
    deletion: DeferredDeletion,
}

/// Queue of deletions keyed by the frame after which they may run.
///
/// Shared between graphs as `Arc<GarbageBin>`; all methods take `&self`.
pub struct GarbageBin {
    frames_in_flight: u64,
    current_frame: AtomicU64,
    /// Ordered by `safe_after`, since the frame counter never goes back.
    pending: Mutex<VecDeque<PendingDeletion>>,
}

impl std::fmt::Debug for GarbageBin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GarbageBin")
            .field("frames_in_flight", &self.frames_in_flight)
            .field("current_frame", &self.current_frame())
            .field("pending_count", &self.pending_count())
            .finish()
    }
}

impl Default for GarbageBin {
    fn default() -> Self {
        Self::new(DEFAULT_FRAMES_IN_FLIGHT)
    }
}

impl GarbageBin {
    pub fn new(frames_in_flight: u64) -> Self {
        Self {
            frames_in_flight,
            current_frame: AtomicU64::new(0),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn frames_in_flight(&self) -> u64 {
        self.frames_in_flight
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame.load(Ordering::Acquire)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Queue a backing for release once `frames_in_flight` frames have passed.
    pub fn push_deferred_deletion(&self, deletion: DeferredDeletion) {
        let safe_after = self.current_frame() + self.frames_in_flight;
        log::trace!(
            "Deferring deletion of {:?} until frame {}",
            deletion.handle,
            safe_after
        );
        self.pending.lock().push_back(PendingDeletion {
            safe_after,
            deletion,
        });
    }

    /// Move to the next frame and release every deletion whose horizon passed.
    ///
    /// Returns the number of backings released. The caller must guarantee the
    /// GPU finished the frame that is now `frames_in_flight` frames old.
    pub fn advance_frame<D: RenderDevice + ?Sized>(&self, device: &mut D) -> usize {
        let frame = self.current_frame.fetch_add(1, Ordering::AcqRel) + 1;

        let due: Vec<DeferredDeletion> = {
            let mut pending = self.pending.lock();
            let count = pending
                .iter()
                .take_while(|entry| entry.safe_after <= frame)
                .count();
            pending.drain(..count).map(|entry| entry.deletion).collect()
        };

        for deletion in &due {
            deletion.release(device);
        }
        if !due.is_empty() {
            log::debug!("Frame {}: released {} deferred backings", frame, due.len());
        }
        due.len()
    }

    /// Release everything immediately. Only valid once the device is idle.
    pub fn flush_all<D: RenderDevice + ?Sized>(&self, device: &mut D) -> usize {
        let due: Vec<_> = self.pending.lock().drain(..).collect();
        for entry in &due {
            entry.deletion.release(device);
        }
        due.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDevice;

    #[test]
    fn test_deletion_waits_for_horizon() {
        let mut device = DummyDevice::new();
        let texture = device.create_external_texture();
        let bin = GarbageBin::new(2);

        bin.push_deferred_deletion(DeferredDeletion::texture(texture));
        assert_eq!(bin.pending_count(), 1);

        assert_eq!(bin.advance_frame(&mut device), 0);
        assert!(device.freed_textures().is_empty());

        assert_eq!(bin.advance_frame(&mut device), 1);
        assert_eq!(device.freed_textures(), &[texture]);
        assert_eq!(bin.pending_count(), 0);
        assert_eq!(bin.current_frame(), 2);
    }

    #[test]
    fn test_later_pushes_wait_longer() {
        let mut device = DummyDevice::new();
        let first = device.create_external_buffer();
        let second = device.create_external_buffer();
        let bin = GarbageBin::new(1);

        bin.push_deferred_deletion(DeferredDeletion::buffer(first));
        bin.advance_frame(&mut device);
        bin.push_deferred_deletion(DeferredDeletion::buffer(second));

        assert_eq!(device.freed_buffers(), &[first]);
        bin.advance_frame(&mut device);
        assert_eq!(device.freed_buffers(), &[first, second]);
    }

    #[test]
    fn test_flush_all() {
        let mut device = DummyDevice::new();
        let texture = device.create_external_texture();
        let buffer = device.create_external_buffer();
        let bin = GarbageBin::default();

        bin.push_deferred_deletion(DeferredDeletion::texture(texture));
        bin.push_deferred_deletion(DeferredDeletion::buffer(buffer));

        assert_eq!(bin.flush_all(&mut device), 2);
        assert_eq!(bin.pending_count(), 0);
        assert!(device.live_textures().is_empty());
        assert!(device.live_buffers().is_empty());
    }

    #[test]
    fn test_deletion_tag_matches_handle() {
        let deletion = DeferredDeletion::from(GpuResource::Buffer(BufferHandle::from_raw(9)));
        assert_eq!(deletion.resource_type, ResourceType::Buffer);
    }
}
