//! [`VolumeManager`]: the top-level cache (spec §2, §4.6) — three
//! [`SliceCache`]s (one per axis) plus a [`TexCube`] for the 3D-texture
//! path, a shared texel/byte budget, and the global LRU-eviction driver.

use glam::Vec3;

use crate::errors::Result;
use crate::render2d::slice_cache::SliceCache;
use crate::render2d::subpage::TexturedQuad;
use crate::render3d::subcube::TexturedPolygon;
use crate::render3d::texcube::TexCube;
use crate::resources::texture::ensure_pow2_ge4;
use crate::resources::transfer_function::{PaletteMode, TransferFunction};
use crate::volume::source::{Axis, VolumeId, VoxelSource};

/// Budgets and live counters for the paged voxel cache (spec §4.6:
/// `maxTexels`, `maxBytesHW`, and the running `numTexels`/`numBytesHW`
/// they're checked against).
pub struct VolumeManager {
    slices: [SliceCache; 3],
    cube: TexCube,
    tile_xyz: (u32, u32, u32),
    tick: u64,
    max_texels: usize,
    max_bytes_hw: usize,
    num_texels: usize,
    num_bytes_hw: usize,
    bound_volume: Option<VolumeId>,
}

impl VolumeManager {
    #[must_use]
    pub fn new(tile_xyz: (u32, u32, u32), max_texels: usize, max_bytes_hw: usize) -> Self {
        let slices = [
            SliceCache::new(Axis::X, Axis::X.in_plane_tile_size(tile_xyz), 0),
            SliceCache::new(Axis::Y, Axis::Y.in_plane_tile_size(tile_xyz), 0),
            SliceCache::new(Axis::Z, Axis::Z.in_plane_tile_size(tile_xyz), 0),
        ];
        Self {
            slices,
            cube: TexCube::new(tile_xyz),
            tile_xyz,
            tick: 0,
            max_texels,
            max_bytes_hw,
            num_texels: 0,
            num_bytes_hw: 0,
            bound_volume: None,
        }
    }

    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub fn num_texels(&self) -> usize {
        self.num_texels
    }

    #[must_use]
    pub fn num_bytes_hw(&self) -> usize {
        self.num_bytes_hw
    }

    #[must_use]
    pub fn tile_size(&self) -> (u32, u32, u32) {
        self.tile_xyz
    }

    /// Binds `source` as the current volume; if its identity differs from
    /// the previously bound one, every cache is invalidated (spec §3
    /// Lifecycle: "When the Volume's identity changes, the manager
    /// invalidates all three SliceCaches").
    pub fn bind_volume(&mut self, source: &dyn VoxelSource) {
        let id = source.id();
        if self.bound_volume == Some(id) {
            return;
        }
        log::debug!("volume identity changed ({:?} -> {id}); invalidating caches", self.bound_volume);
        for cache in &mut self.slices {
            cache.invalidate_volume(id);
        }
        self.cube.clear();
        self.num_texels = 0;
        self.num_bytes_hw = 0;
        self.bound_volume = Some(id);
    }

    /// Changes the global tile triple. Invalid sizes (not a power of two
    /// `>= 4`) are rejected with a logged warning and otherwise ignored,
    /// matching spec §4.6 ("otherwise the call is silently ignored").
    /// Each `SliceCache` is only invalidated if its own in-plane tile size
    /// actually changed.
    pub fn set_tile_size(&mut self, tx: u32, ty: u32, tz: u32) {
        for (name, v) in [("tx", tx), ("ty", ty), ("tz", tz)] {
            if ensure_pow2_ge4(name, v).is_err() {
                log::warn!("set_tile_size({tx},{ty},{tz}) rejected: {name}={v} is not a power of two >= 4");
                return;
            }
        }
        let new_tile = (tx, ty, tz);
        if new_tile == self.tile_xyz {
            return;
        }
        self.tile_xyz = new_tile;
        for axis in Axis::ALL {
            let cache = &mut self.slices[axis.index()];
            let new_uv = axis.in_plane_tile_size(new_tile);
            if new_uv != cache.tile_size() {
                cache.set_tile_size(new_uv);
            }
        }
        self.cube.clear();
        self.recompute_totals();
    }

    /// Rebuilds `num_texels`/`num_bytes_hw` from scratch by summing every
    /// still-resident `SubPage`/`SubCube`. Used after a page-size change,
    /// where some axes' caches survive (their in-plane tile size didn't
    /// change) while others were cleared — a full scan is simpler and no
    /// slower than threading per-axis deltas through that branch.
    fn recompute_totals(&mut self) {
        let mut texels = 0;
        let mut hw_bytes = 0;
        for cache in &self.slices {
            for (_, page) in cache.pages_iter() {
                let (t, h) = page.entries().fold((0, 0), |(t, h), sp| (t + sp.texel_count(), h + sp.hw_bytes()));
                texels += t;
                hw_bytes += h;
            }
        }
        for cube in self.cube.entries() {
            texels += cube.texel_count();
            hw_bytes += cube.hw_bytes();
        }
        self.num_texels = texels;
        self.num_bytes_hw = hw_bytes;
    }

    /// Renders one ortho-slice: gets-or-builds every tile in the slice's
    /// grid, then runs eviction down to budget (spec §4.6 steps 1-4).
    #[allow(clippy::too_many_arguments)]
    pub fn render_ortho_slice(
        &mut self,
        ctx: &crate::renderer::context::GfxContext,
        source: &dyn VoxelSource,
        axis: Axis,
        slice_idx: i32,
        origin: Vec3,
        du: Vec3,
        dv: Vec3,
        transfer_function: &TransferFunction,
        palette_mode: PaletteMode,
    ) -> Result<Vec<TexturedQuad>> {
        self.bind_volume(source);
        self.tick += 1;

        let cache = &mut self.slices[axis.index()];
        let page = cache.page_mut(slice_idx);
        let (cols, rows) = page.grid_dims(source);

        let before = page_totals(page);
        let quads = page.render_range(
            ctx,
            source,
            transfer_function,
            palette_mode,
            0..cols,
            0..rows,
            origin,
            du,
            dv,
            self.tick,
        )?;
        let after = page_totals(page);

        apply_delta(&mut self.num_texels, before.0, after.0);
        apply_delta(&mut self.num_bytes_hw, before.1, after.1);

        self.manage_pages();
        Ok(quads)
    }

    /// Like [`render_ortho_slice`](Self::render_ortho_slice), but maps the
    /// slice's tile grid onto an arbitrary world-space quad rather than a
    /// `du`/`dv`-spanned rectangle (the Renderer's oblique-quad request).
    #[allow(clippy::too_many_arguments)]
    pub fn render_oblique_quad(
        &mut self,
        ctx: &crate::renderer::context::GfxContext,
        source: &dyn VoxelSource,
        axis: Axis,
        slice_idx: i32,
        corners: [Vec3; 4],
        transfer_function: &TransferFunction,
        palette_mode: PaletteMode,
    ) -> Result<Vec<TexturedQuad>> {
        self.bind_volume(source);
        self.tick += 1;

        let cache = &mut self.slices[axis.index()];
        let page = cache.page_mut(slice_idx);

        let before = page_totals(page);
        let quads = page.render_oblique(ctx, source, transfer_function, palette_mode, corners, self.tick)?;
        let after = page_totals(page);

        apply_delta(&mut self.num_texels, before.0, after.0);
        apply_delta(&mut self.num_bytes_hw, before.1, after.1);

        self.manage_pages();
        Ok(quads)
    }

    /// Renders the whole volume via the 3D-texture path: builds every tile
    /// in the `TexCube` grid and slices each into `num_slices` view-aligned
    /// polygons (spec §4.4 SubCube). `world_origin`/`voxel_to_world` place
    /// and scale voxel coordinates into world space. A sub-cube that fails
    /// to build (`OutOfBounds`, ...) is logged and skipped entirely rather
    /// than aborting the whole render (spec §7).
    #[allow(clippy::too_many_arguments)]
    pub fn render_full_volume(
        &mut self,
        ctx: &crate::renderer::context::GfxContext,
        source: &dyn VoxelSource,
        world_origin: Vec3,
        voxel_to_world: Vec3,
        view_dir: Vec3,
        num_slices: u32,
        transfer_function: &TransferFunction,
        palette_mode: PaletteMode,
    ) -> Result<Vec<TexturedPolygon>> {
        self.bind_volume(source);
        self.tick += 1;

        let (nx, ny, nz) = self.cube.grid_dims(source);
        let before = cube_totals(&self.cube);

        let mut polys = Vec::new();
        for tz in 0..nz {
            for ty in 0..ny {
                for tx in 0..nx {
                    let cube = match self.cube.get_or_build_tile(
                        source,
                        tx,
                        ty,
                        tz,
                        world_origin,
                        voxel_to_world,
                        transfer_function,
                        palette_mode,
                        self.tick,
                    ) {
                        Ok(cube) => cube,
                        Err(err) => {
                            log::warn!("failed to build sub-cube ({tx},{ty},{tz}): {err}; skipping");
                            continue;
                        }
                    };
                    polys.extend(cube.render(ctx, view_dir, num_slices, self.tick));
                }
            }
        }

        let after = cube_totals(&self.cube);
        apply_delta(&mut self.num_texels, before.0, after.0);
        apply_delta(&mut self.num_bytes_hw, before.1, after.1);

        self.manage_pages();
        Ok(polys)
    }

    /// `free_texels`/`free_hw_bytes` combined: evicts until both budgets
    /// are satisfied, or until nothing is left to evict.
    pub fn manage_pages(&mut self) {
        self.free_texels(0);
        self.free_hw_bytes(0);
    }

    /// While `numTexels + desired > maxTexels`, evicts the globally
    /// least-recently-used tile. Gives up (rather than looping forever) once
    /// nothing remains to evict, matching spec §4.6's "silently returns if
    /// `desired > maxTexels`".
    pub fn free_texels(&mut self, desired: usize) {
        while self.num_texels + desired > self.max_texels {
            if !self.release_lru_page() {
                break;
            }
        }
    }

    pub fn free_hw_bytes(&mut self, desired: usize) {
        while self.num_bytes_hw + desired > self.max_bytes_hw {
            if !self.release_lru_page() {
                break;
            }
        }
    }

    /// Scans every live `TexPage` (all three axes) and the `TexCube`,
    /// releasing the single `SubPage`/`SubCube` with the smallest
    /// `last_use_tick` (spec §4.6 `releaseLRUPage`). Returns `false` if
    /// nothing is resident to evict.
    fn release_lru_page(&mut self) -> bool {
        let mut best_tick = u64::MAX;
        let mut best: Option<Victim> = None;

        for axis in Axis::ALL {
            for (&slice_idx, page) in self.slices[axis.index()].pages_iter_mut() {
                if let Some(t) = page.min_tick() {
                    if t < best_tick {
                        best_tick = t;
                        best = Some(Victim::Page(axis, slice_idx));
                    }
                }
            }
        }
        if let Some(t) = self.cube.min_tick() {
            if t < best_tick {
                best = Some(Victim::Cube);
            }
        }

        let freed = match best {
            Some(Victim::Page(axis, slice_idx)) => self.slices[axis.index()].evict_from(slice_idx),
            Some(Victim::Cube) => self.cube.evict_lru(),
            None => None,
        };

        match freed {
            Some((texels, hw_bytes)) => {
                self.num_texels = self.num_texels.saturating_sub(texels);
                self.num_bytes_hw = self.num_bytes_hw.saturating_sub(hw_bytes);
                log::debug!("evicted LRU tile: -{texels} texels, -{hw_bytes} hw bytes");
                true
            }
            None => false,
        }
    }
}

enum Victim {
    Page(Axis, i32),
    Cube,
}

/// Applies `after - before` to `*total`, tolerating a net decrease (a
/// volume-changed retain inside the render call can drop more than it adds).
fn apply_delta(total: &mut usize, before: usize, after: usize) {
    if after >= before {
        *total += after - before;
    } else {
        *total = total.saturating_sub(before - after);
    }
}

fn page_totals(page: &crate::render2d::texpage::TexPage) -> (usize, usize) {
    // `subpage_count` alone isn't the byte total; this walks the page's
    // entries to get exact texel/hw_bytes sums for the manager's
    // subtract-before/re-add-after accounting (spec §4.6 step 1/3).
    page.entries().fold((0, 0), |(t, h), sp| (t + sp.texel_count(), h + sp.hw_bytes()))
}

fn cube_totals(cube: &TexCube) -> (usize, usize) {
    cube.entries().fold((0, 0), |(t, h), sc| (t + sc.texel_count(), h + sc.hw_bytes()))
}
