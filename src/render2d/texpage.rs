//! [`TexPage`]: the tile grid covering one axis-aligned slice (spec §4.5).
//!
//! Per spec §3, the cache entry for one `(row, col)` cell is "a singly
//! linked list of `{transfer_function_id, SubPage, ...}`" — different
//! transfer functions applied to the same geometric tile coexist until
//! evicted. That list is represented here as `Vec<SubPage>` (§3 "added":
//! a small vec is the idiomatic stand-in for a linked list at this scale).

use glam::Vec3;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::Result;
use crate::render2d::subpage::{tf_discriminator, SubPage, TexturedQuad};
use crate::renderer::context::GfxContext;
use crate::resources::transfer_function::{PaletteMode, TransferFunction};
use crate::volume::source::{Axis, BoxUv, VoxelSource};

/// A cell's page list almost always holds exactly one entry (one transfer
/// function bound at a time); inlining that common case avoids a heap
/// allocation per tile.
type CellEntries = SmallVec<[SubPage; 1]>;

/// One axis-aligned slice, decomposed into a `(col, row)` grid of cells,
/// each holding at most one [`SubPage`] per transfer-function id
/// (invariant 4, spec §3).
pub struct TexPage {
    pub axis: Axis,
    pub slice_idx: i32,
    pub tile_size: (u32, u32),
    cells: FxHashMap<(u32, u32), CellEntries>,
}

impl TexPage {
    #[must_use]
    pub fn new(axis: Axis, slice_idx: i32, tile_size: (u32, u32)) -> Self {
        Self { axis, slice_idx, tile_size, cells: FxHashMap::default() }
    }

    /// Grid dims `(cols, rows)` for `source`'s in-plane extent at this
    /// page's `tile_size`.
    #[must_use]
    pub fn grid_dims(&self, source: &dyn VoxelSource) -> (u32, u32) {
        let (du, dv) = self.axis.in_plane_dims(source.dims());
        (du.div_ceil(self.tile_size.0), dv.div_ceil(self.tile_size.1))
    }

    /// Drops every cached tile, e.g. on a page-size change (spec §4.6) or
    /// when the bound volume's identity changes (spec §3 Lifecycle).
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Number of live `SubPage` entries across every cell (sum of per-cell
    /// list lengths), for the manager's texel/byte accounting.
    #[must_use]
    pub fn subpage_count(&self) -> usize {
        self.cells.values().map(SmallVec::len).sum()
    }

    /// Replaces the palette binding for every paletted `SubPage` in this
    /// page and drops every RGBA entry, per spec §4.5 `set_palette`: RGBA
    /// pages carry no palette reference and must be rebuilt wholesale.
    pub fn set_palette_changed(&mut self) {
        for entries in self.cells.values_mut() {
            entries.retain(SubPage::is_paletted);
        }
    }

    /// Iterates every live `SubPage` in this page, for the manager's byte
    /// accounting.
    pub fn entries(&self) -> impl Iterator<Item = &SubPage> {
        self.cells.values().flatten()
    }

    /// The smallest `last_use_tick` among every live `SubPage` in this page,
    /// or `None` if the page holds no entries.
    #[must_use]
    pub fn min_tick(&self) -> Option<u64> {
        self.cells.values().flatten().map(|p| p.last_use_tick).min()
    }

    /// Removes the least-recently-used `SubPage` in this page, returning its
    /// freed `(texel_count, hw_bytes)` for the manager's budget accounting.
    pub fn evict_lru(&mut self) -> Option<(usize, usize)> {
        let mut best: Option<((u32, u32), usize, u64)> = None;
        for (&cell, entries) in &self.cells {
            for (i, page) in entries.iter().enumerate() {
                let better = match best {
                    None => true,
                    Some((_, _, tick)) => page.last_use_tick < tick,
                };
                if better {
                    best = Some((cell, i, page.last_use_tick));
                }
            }
        }
        let (cell, idx, _) = best?;
        let entries = self.cells.get_mut(&cell)?;
        let page = entries.remove(idx);
        if entries.is_empty() {
            self.cells.remove(&cell);
        }
        Some((page.texel_count(), page.hw_bytes()))
    }

    /// Gets (building on a miss) the `SubPage` at `(col, row)` for the
    /// transfer function currently bound. Stale entries (built against a
    /// volume identity that no longer matches `source`) are dropped before
    /// the lookup — spec §4.5's **volume-changed invalidation**. An entry
    /// built against this same `TransferFunction` object but an earlier
    /// mutation is rebuilt and replaces itself in place; entries built
    /// against a genuinely *different* `TransferFunction` object are left
    /// untouched and coexist, per invariant 4/5.
    #[allow(clippy::too_many_arguments)]
    pub fn get_or_build_tile(
        &mut self,
        source: &dyn VoxelSource,
        col: u32,
        row: u32,
        transfer_function: &TransferFunction,
        palette_mode: PaletteMode,
        tick: u64,
    ) -> Result<&mut SubPage> {
        let expect = tf_discriminator(source, transfer_function);
        let expect_identity = expect.map(|(identity, _)| identity);
        let expect_node_id = expect.map(|(_, node_id)| node_id);
        let entries = self.cells.entry((col, row)).or_default();
        entries.retain(|e| e.source_id == source.id());

        if let Some(pos) = entries.iter().position(|e| e.tf_identity == expect_identity) {
            if entries[pos].tf_node_id == expect_node_id {
                return Ok(&mut entries[pos]);
            }
        }

        let box_uv = self.tile_box_uv(source, col, row);
        let page = SubPage::build(
            source,
            self.axis,
            self.slice_idx,
            col,
            row,
            box_uv,
            self.tile_size,
            transfer_function,
            palette_mode,
            tick,
        )?;

        if let Some(pos) = entries.iter().position(|e| e.tf_identity == expect_identity) {
            entries[pos] = page;
            Ok(&mut entries[pos])
        } else {
            entries.push(page);
            Ok(entries.last_mut().expect("just pushed"))
        }
    }

    fn tile_box_uv(&self, source: &dyn VoxelSource, col: u32, row: u32) -> BoxUv {
        let (du, dv) = self.axis.in_plane_dims(source.dims());
        let umin = col * self.tile_size.0;
        let vmin = row * self.tile_size.1;
        let umax = (umin + self.tile_size.0).min(du);
        let vmax = (vmin + self.tile_size.1).min(dv);
        BoxUv::new(umin as i32, umax as i32, vmin as i32, vmax as i32)
    }

    /// Renders every tile in `(col_min..col_max, row_min..row_max)`, in
    /// row-major order (spec §5 Ordering rule 1). `origin`/`du`/`dv` place
    /// tile `(0,0)`'s corner in world space and its per-tile world-space
    /// span. Tiles whose build produced an `invisible` texture are still
    /// touched (tick-stamped) but contribute a degenerate draw. A tile that
    /// fails to build (`OutOfBounds`, ...) is logged and skipped entirely
    /// rather than aborting the whole range (spec §7).
    #[allow(clippy::too_many_arguments)]
    pub fn render_range(
        &mut self,
        ctx: &GfxContext,
        source: &dyn VoxelSource,
        transfer_function: &TransferFunction,
        palette_mode: PaletteMode,
        col_range: std::ops::Range<u32>,
        row_range: std::ops::Range<u32>,
        origin: Vec3,
        du: Vec3,
        dv: Vec3,
        tick: u64,
    ) -> Result<Vec<TexturedQuad>> {
        let mut quads = Vec::with_capacity(col_range.len().saturating_mul(row_range.len()));
        for row in row_range.clone() {
            for col in col_range.clone() {
                let page = match self.get_or_build_tile(source, col, row, transfer_function, palette_mode, tick) {
                    Ok(page) => page,
                    Err(err) => {
                        log::warn!("failed to build tile (col={col}, row={row}): {err}; skipping");
                        continue;
                    }
                };
                let upper_left = origin + du * (col * self.tile_size.0) as f32 + dv * (row * self.tile_size.1) as f32;
                let span_u = du * self.tile_size.0 as f32;
                let span_v = dv * self.tile_size.1 as f32;
                quads.push(page.render(ctx, upper_left, span_u, span_v, tick));
            }
        }
        Ok(quads)
    }

    /// Renders the whole grid mapped onto an arbitrary world-space quad
    /// (the Renderer's "oblique quad" request, spec.md §2's Renderer row):
    /// each tile's world corners are bilinearly interpolated from
    /// `corners` (`[upper_left, upper_right, lower_right, lower_left]`)
    /// by its `(col, row)` position in the grid, rather than offset along
    /// fixed `du`/`dv` axes. The texture content itself is still the
    /// ordinary axis-aligned slice data — only the quad's placement in
    /// world space is oblique; no resampling of voxels occurs (spec §1
    /// Non-goals).
    pub fn render_oblique(
        &mut self,
        ctx: &GfxContext,
        source: &dyn VoxelSource,
        transfer_function: &TransferFunction,
        palette_mode: PaletteMode,
        corners: [Vec3; 4],
        tick: u64,
    ) -> Result<Vec<TexturedQuad>> {
        let (cols, rows) = self.grid_dims(source);
        let mut quads = Vec::with_capacity((cols * rows) as usize);
        for row in 0..rows {
            for col in 0..cols {
                let page = match self.get_or_build_tile(source, col, row, transfer_function, palette_mode, tick) {
                    Ok(page) => page,
                    Err(err) => {
                        log::warn!("failed to build tile (col={col}, row={row}): {err}; skipping");
                        continue;
                    }
                };
                let u0 = col as f32 / cols as f32;
                let u1 = (col + 1) as f32 / cols as f32;
                let v0 = row as f32 / rows as f32;
                let v1 = (row + 1) as f32 / rows as f32;
                let corner = |u: f32, v: f32| bilerp(corners, u, v);
                let quad = [corner(u0, v0), corner(u1, v0), corner(u1, v1), corner(u0, v1)];
                quads.push(page.render(ctx, quad[0], quad[1] - quad[0], quad[3] - quad[0], tick));
            }
        }
        Ok(quads)
    }
}

/// Bilinearly interpolates `[upper_left, upper_right, lower_right,
/// lower_left]` at parameter `(u, v) in [0,1]^2`.
fn bilerp(corners: [Vec3; 4], u: f32, v: f32) -> Vec3 {
    let top = corners[0].lerp(corners[1], u);
    let bottom = corners[3].lerp(corners[2], u);
    top.lerp(bottom, v)
}
