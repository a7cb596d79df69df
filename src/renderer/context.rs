//! GPU context identity: the Rust-native equivalent of a "GL context" in
//! spec §4.3/§5. Every `wgpu::Device`/`wgpu::Queue` pair a caller wants
//! textures resident on gets one [`GpuContextId`]; [`TextureObject`]s keep
//! per-context cache entries keyed on it.
//!
//! [`TextureObject`]: crate::resources::texture::TextureObject

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of one GPU context (one `wgpu::Device`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuContextId(u64);

/// A GPU context: a device/queue pair plus its stable identity.
#[derive(Clone)]
pub struct GfxContext {
    pub id: GpuContextId,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GfxContext {
    #[must_use]
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let id = GpuContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
        Self { id, device, queue }
    }
}
