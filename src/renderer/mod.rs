//! The top-level render API: a process-wide render lock around the
//! [`VolumeManager`] cache (spec §5 "a process-wide mutex guards top-level
//! render entry points").

pub mod context;
pub mod manager;
pub mod probe;

use glam::Vec3;
use parking_lot::Mutex;

use crate::errors::Result;
use crate::render2d::subpage::TexturedQuad;
use crate::render3d::subcube::TexturedPolygon;
use crate::resources::texture::ensure_pow2_ge4;
use crate::resources::transfer_function::{AlphaPolicy, PaletteMode, TransferFunction};
use crate::volume::source::{Axis, VoxelSource};

pub use context::{GfxContext, GpuContextId};
pub use manager::VolumeManager;

/// Bilinear vs. nearest-neighbour sampling for newly built textures
/// (spec §4.3 "min/mag filter from current interpolation element").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}

/// Every tunable spec.md scatters through §3/§4/§6, collected into one
/// `Default`-implementing struct (SPEC_FULL §6.5).
#[derive(Debug, Clone, Copy)]
pub struct RendererSettings {
    /// The global `(tx, ty, tz)` tile triple; each must be a power of two
    /// `>= 4` (spec §3/§4.6). Invalid values passed to `Renderer::new` fall
    /// back to the default below rather than panicking.
    pub tile_size: (u32, u32, u32),
    pub max_texels: usize,
    pub max_bytes_hw: usize,
    pub interpolation: Interpolation,
    pub default_alpha_policy: AlphaPolicy,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            tile_size: (64, 64, 64),
            max_texels: 16 * 1024 * 1024,
            max_bytes_hw: 256 * 1024 * 1024,
            interpolation: Interpolation::Linear,
            default_alpha_policy: AlphaPolicy::AsIs,
        }
    }
}

/// The engine's single entry point. Wraps a [`VolumeManager`] behind a
/// `parking_lot::Mutex`: "sections inside the render are not re-entrant"
/// (spec §5) — every public method here takes the lock for its whole body.
pub struct Renderer {
    settings: RendererSettings,
    manager: Mutex<VolumeManager>,
}

impl Renderer {
    #[must_use]
    pub fn new(mut settings: RendererSettings) -> Self {
        let (tx, ty, tz) = settings.tile_size;
        let valid = [("tx", tx), ("ty", ty), ("tz", tz)]
            .into_iter()
            .all(|(name, v)| ensure_pow2_ge4(name, v).is_ok());
        if !valid {
            log::warn!(
                "RendererSettings::tile_size {:?} is not all powers of two >= 4; falling back to the default {:?}",
                settings.tile_size,
                RendererSettings::default().tile_size
            );
            settings.tile_size = RendererSettings::default().tile_size;
        }
        let manager = VolumeManager::new(settings.tile_size, settings.max_texels, settings.max_bytes_hw);
        Self { settings, manager: Mutex::new(manager) }
    }

    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Renders one axis-aligned slice, tiling the quad `origin ..
    /// origin + du + dv` across the slice's `TexPage` grid.
    #[allow(clippy::too_many_arguments)]
    pub fn render_ortho_slice(
        &self,
        ctx: &GfxContext,
        source: &dyn VoxelSource,
        axis: Axis,
        slice_idx: i32,
        origin: Vec3,
        du: Vec3,
        dv: Vec3,
        transfer_function: &TransferFunction,
        palette_mode: PaletteMode,
    ) -> Result<Vec<TexturedQuad>> {
        self.manager
            .lock()
            .render_ortho_slice(ctx, source, axis, slice_idx, origin, du, dv, transfer_function, palette_mode)
    }

    /// Renders one axis-aligned slice's texture content mapped onto an
    /// arbitrary (non-axis-aligned) world-space quad.
    #[allow(clippy::too_many_arguments)]
    pub fn render_oblique_quad(
        &self,
        ctx: &GfxContext,
        source: &dyn VoxelSource,
        axis: Axis,
        slice_idx: i32,
        corners: [Vec3; 4],
        transfer_function: &TransferFunction,
        palette_mode: PaletteMode,
    ) -> Result<Vec<TexturedQuad>> {
        self.manager
            .lock()
            .render_oblique_quad(ctx, source, axis, slice_idx, corners, transfer_function, palette_mode)
    }

    /// Renders the whole volume via the 3D-texture path.
    #[allow(clippy::too_many_arguments)]
    pub fn render_full_volume(
        &self,
        ctx: &GfxContext,
        source: &dyn VoxelSource,
        world_origin: Vec3,
        voxel_to_world: Vec3,
        view_dir: Vec3,
        num_slices: u32,
        transfer_function: &TransferFunction,
        palette_mode: PaletteMode,
    ) -> Result<Vec<TexturedPolygon>> {
        self.manager.lock().render_full_volume(
            ctx,
            source,
            world_origin,
            voxel_to_world,
            view_dir,
            num_slices,
            transfer_function,
            palette_mode,
        )
    }

    /// Changes the global tile triple (spec §4.6 page-size change rules).
    pub fn set_tile_size(&self, tx: u32, ty: u32, tz: u32) {
        self.manager.lock().set_tile_size(tx, ty, tz);
    }

    #[must_use]
    pub fn tick(&self) -> u64 {
        self.manager.lock().tick()
    }

    #[must_use]
    pub fn num_texels(&self) -> usize {
        self.manager.lock().num_texels()
    }

    #[must_use]
    pub fn num_bytes_hw(&self) -> usize {
        self.manager.lock().num_bytes_hw()
    }
}
