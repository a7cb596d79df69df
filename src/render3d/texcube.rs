//! [`TexCube`]: the whole-volume 3D tile grid (spec §4.5's 3D-texture-path
//! analogue — "grid of SubPages/SubCubes covering one axis-aligned slice or
//! the whole volume", component table spec.md §2).

use glam::Vec3;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::Result;
use crate::render2d::subpage::tf_discriminator;
use crate::render3d::subcube::SubCube;
use crate::resources::transfer_function::{PaletteMode, TransferFunction};
use crate::volume::source::{BoxXyz, VoxelSource};

type CellEntries = SmallVec<[SubCube; 1]>;

/// Grid of 3D tiles spanning the whole volume, indexed `(tx, ty, tz)`. Each
/// cell holds at most one `SubCube` per transfer-function id, mirroring
/// [`TexPage`](crate::render2d::texpage::TexPage)'s per-cell `Vec`.
pub struct TexCube {
    pub tile_size: (u32, u32, u32),
    cells: FxHashMap<(u32, u32, u32), CellEntries>,
}

impl TexCube {
    #[must_use]
    pub fn new(tile_size: (u32, u32, u32)) -> Self {
        Self { tile_size, cells: FxHashMap::default() }
    }

    /// Grid dims `(nx, ny, nz)` for `source`'s extent at this cube's tile size.
    #[must_use]
    pub fn grid_dims(&self, source: &dyn VoxelSource) -> (u32, u32, u32) {
        let (dx, dy, dz) = source.dims();
        (
            dx.div_ceil(self.tile_size.0),
            dy.div_ceil(self.tile_size.1),
            dz.div_ceil(self.tile_size.2),
        )
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    #[must_use]
    pub fn subcube_count(&self) -> usize {
        self.cells.values().map(SmallVec::len).sum()
    }

    pub fn set_palette_changed(&mut self) {
        for entries in self.cells.values_mut() {
            entries.retain(SubCube::is_paletted);
        }
    }

    /// Iterates every live `SubCube`, for the manager's byte accounting.
    pub fn entries(&self) -> impl Iterator<Item = &SubCube> {
        self.cells.values().flatten()
    }

    #[must_use]
    pub fn min_tick(&self) -> Option<u64> {
        self.cells.values().flatten().map(|c| c.last_use_tick).min()
    }

    /// Removes the least-recently-used `SubCube`, returning its freed
    /// `(texel_count, hw_bytes)`.
    pub fn evict_lru(&mut self) -> Option<(usize, usize)> {
        let mut best: Option<((u32, u32, u32), usize, u64)> = None;
        for (&cell, entries) in &self.cells {
            for (i, cube) in entries.iter().enumerate() {
                let better = match best {
                    None => true,
                    Some((_, _, tick)) => cube.last_use_tick < tick,
                };
                if better {
                    best = Some((cell, i, cube.last_use_tick));
                }
            }
        }
        let (cell, idx, _) = best?;
        let entries = self.cells.get_mut(&cell)?;
        let cube = entries.remove(idx);
        if entries.is_empty() {
            self.cells.remove(&cell);
        }
        Some((cube.texel_count(), cube.hw_bytes()))
    }

    /// Gets (building on a miss) the sub-cube at `(tx, ty, tz)`, with the
    /// same volume-changed/transfer-function-id invalidation rules as
    /// `TexPage::get_or_build_tile`.
    #[allow(clippy::too_many_arguments)]
    pub fn get_or_build_tile(
        &mut self,
        source: &dyn VoxelSource,
        tx: u32,
        ty: u32,
        tz: u32,
        world_origin: Vec3,
        voxel_to_world: Vec3,
        transfer_function: &TransferFunction,
        palette_mode: PaletteMode,
        tick: u64,
    ) -> Result<&mut SubCube> {
        let expect = tf_discriminator(source, transfer_function);
        let expect_identity = expect.map(|(identity, _)| identity);
        let expect_node_id = expect.map(|(_, node_id)| node_id);
        let entries = self.cells.entry((tx, ty, tz)).or_default();
        entries.retain(|e| e.source_id == source.id());

        if let Some(pos) = entries.iter().position(|e| e.tf_identity == expect_identity) {
            if entries[pos].tf_node_id == expect_node_id {
                return Ok(&mut entries[pos]);
            }
        }

        let (dx, dy, dz) = source.dims();
        let box_xyz = BoxXyz {
            xmin: (tx * self.tile_size.0) as i32,
            xmax: ((tx * self.tile_size.0 + self.tile_size.0).min(dx)) as i32,
            ymin: (ty * self.tile_size.1) as i32,
            ymax: ((ty * self.tile_size.1 + self.tile_size.1).min(dy)) as i32,
            zmin: (tz * self.tile_size.2) as i32,
            zmax: ((tz * self.tile_size.2 + self.tile_size.2).min(dz)) as i32,
        };
        let world_min = world_origin
            + Vec3::new(
                box_xyz.xmin as f32 * voxel_to_world.x,
                box_xyz.ymin as f32 * voxel_to_world.y,
                box_xyz.zmin as f32 * voxel_to_world.z,
            );
        // Sized by the full tile span, not `box_xyz`'s clamped voxel-space
        // extent: a boundary sub-cube's world-space box always covers one
        // whole tile, matching `TexPage::render_range`'s `span_u`/`span_v`
        // and the original 3D-texture path's sizing.
        let world_max = world_origin
            + Vec3::new(
                (tx * self.tile_size.0 + self.tile_size.0) as f32 * voxel_to_world.x,
                (ty * self.tile_size.1 + self.tile_size.1) as f32 * voxel_to_world.y,
                (tz * self.tile_size.2 + self.tile_size.2) as f32 * voxel_to_world.z,
            );

        let cube = SubCube::build(
            source,
            box_xyz,
            (tx, ty, tz),
            world_min,
            world_max,
            transfer_function,
            palette_mode,
            tick,
        )?;

        if let Some(pos) = entries.iter().position(|e| e.tf_identity == expect_identity) {
            entries[pos] = cube;
            Ok(&mut entries[pos])
        } else {
            entries.push(cube);
            Ok(entries.last_mut().expect("just pushed"))
        }
    }
}
