//! Shared test fixtures: a synthetic `VoxelSource` plus a headless GPU
//! context, mirroring the device-setup shape in the engine this crate was
//! adapted from (no surface/swapchain needed — tests only bind textures).

use std::sync::Arc;

use glam::Vec3;
use volux::{Axis, BoxUv, BoxXyz, GfxContext, RenderError, Result, SampleType, VolumeId, VoxelSource};

/// Stands up a real `wgpu::Device`/`Queue` pair for texture-upload tests.
/// Panics (test-only) if the host has no usable adapter.
pub fn gpu_context() -> GfxContext {
    let instance = wgpu::Instance::default();
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::None,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .expect("no GPU adapter available to run this test");
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: None,
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: wgpu::MemoryHints::Performance,
    }))
    .expect("failed to create wgpu device");
    GfxContext::new(Arc::new(device), Arc::new(queue))
}

/// A cubic `U8` volume whose sample at `(x, y, z)` is given by a closure,
/// standing in for a real dataset (spec §1 Non-goals: no file I/O here).
pub struct SyntheticVolume {
    pub id: VolumeId,
    pub dims: (u32, u32, u32),
    sample: Box<dyn Fn(u32, u32, u32) -> u8 + Send + Sync>,
}

impl SyntheticVolume {
    #[must_use]
    pub fn new(id: VolumeId, dims: (u32, u32, u32), sample: impl Fn(u32, u32, u32) -> u8 + Send + Sync + 'static) -> Self {
        Self { id, dims, sample: Box::new(sample) }
    }
}

impl VoxelSource for SyntheticVolume {
    fn id(&self) -> VolumeId {
        self.id
    }

    fn dims(&self) -> (u32, u32, u32) {
        self.dims
    }

    fn sample_type(&self) -> SampleType {
        SampleType::U8
    }

    fn world_bbox(&self) -> (Vec3, Vec3) {
        (Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    fn get_sub_slice(&self, axis: Axis, slice_idx: i32, box_uv: BoxUv, out: &mut [u8]) -> Result<()> {
        let (dx, dy, dz) = self.dims;
        let extent = axis.extent((dx, dy, dz));
        if slice_idx < 0 || slice_idx as u32 >= extent {
            return Err(RenderError::OutOfBounds(format!("slice {slice_idx} out of range")));
        }
        let width = box_uv.width();
        for v in 0..box_uv.height() {
            for u in 0..width {
                let uu = box_uv.umin as u32 + u;
                let vv = box_uv.vmin as u32 + v;
                let (x, y, z) = match axis {
                    Axis::X => (slice_idx as u32, vv, uu),
                    Axis::Y => (uu, slice_idx as u32, vv),
                    Axis::Z => (uu, vv, slice_idx as u32),
                };
                out[(v * width + u) as usize] = (self.sample)(x, y, z);
            }
        }
        Ok(())
    }

    fn get_sub_cube(&self, box_xyz: BoxXyz, out: &mut [u8]) -> Result<()> {
        let (w, h, d) = box_xyz.dims();
        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    let idx = ((z * h + y) * w + x) as usize;
                    out[idx] = (self.sample)(
                        box_xyz.xmin as u32 + x,
                        box_xyz.ymin as u32 + y,
                        box_xyz.zmin as u32 + z,
                    );
                }
            }
        }
        Ok(())
    }

    fn file_size(&self) -> Result<i64> {
        Err(RenderError::Unsupported("synthetic volume has no backing file".into()))
    }
}
