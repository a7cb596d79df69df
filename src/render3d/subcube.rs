//! [`SubCube`]: one 3D-texture tile (spec §4.4), the 3D-texture-path
//! analogue of [`SubPage`](crate::render2d::subpage::SubPage).

use std::sync::Arc;

use glam::Vec3;

use crate::errors::Result;
use crate::render2d::subpage::tf_discriminator;
use crate::render3d::clip::box_plane_cross_section;
use crate::renderer::context::GfxContext;
use crate::resources::texture::{self, pixels_3d, TextureKey, TextureObject};
use crate::resources::transfer_function::{PaletteMode, TransferFunction};
use crate::volume::chunk::VoxelChunk;
use crate::volume::source::{Axis, BoxXyz, VolumeId, VoxelSource};

/// A 3D-texture tile covering one axis-aligned sub-cube of the volume.
pub struct SubCube {
    pub key: TextureKey,
    pub texture: Arc<TextureObject>,
    pub world_min: Vec3,
    pub world_max: Vec3,
    pub source_id: VolumeId,
    pub tf_identity: Option<u64>,
    pub tf_node_id: Option<u64>,
    pub last_use_tick: u64,
    pub invisible: bool,
}

impl SubCube {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        source: &dyn VoxelSource,
        box_xyz: BoxXyz,
        tile_index: (u32, u32, u32),
        world_min: Vec3,
        world_max: Vec3,
        transfer_function: &TransferFunction,
        palette_mode: PaletteMode,
        tick: u64,
    ) -> Result<Self> {
        // The composite identity key (spec §3) is axis-agnostic for the 3D
        // path; `axis`/`slice_index` are fixed sentinels since a sub-cube is
        // not sliced along a single axis, and `tile_index` alone already
        // uniquely identifies the sub-region within the volume.
        let tf_key = tf_discriminator(source, transfer_function);
        let (tf_identity, tf_node_id) = match tf_key {
            Some((identity, node_id)) => (Some(identity), Some(node_id)),
            None => (None, None),
        };
        let key = TextureKey {
            source_id: source.id(),
            axis: Axis::Z,
            slice_index: -1,
            tile_index,
            palette_marker: tf_node_id,
        };

        let actual_dims = box_xyz.dims();
        let alloc = (
            texture::next_pow2_min4(actual_dims.0),
            texture::next_pow2_min4(actual_dims.1),
            texture::next_pow2_min4(actual_dims.2),
        );

        let built = texture::get_or_build(key.clone(), || {
            let chunk = VoxelChunk::build_sub_cube(source, box_xyz)?;
            let (output, invisible) = chunk.transfer(transfer_function, palette_mode)?;
            Ok((pixels_3d(output, alloc), actual_dims, invisible))
        })?;

        Ok(Self {
            key,
            invisible: built.is_invisible(),
            texture: built,
            world_min,
            world_max,
            source_id: source.id(),
            tf_identity,
            tf_node_id,
            last_use_tick: tick,
        })
    }

    #[must_use]
    pub fn sw_bytes(&self) -> usize {
        self.texture.sw_bytes()
    }

    #[must_use]
    pub fn hw_bytes(&self) -> usize {
        self.texture.hw_bytes()
    }

    #[must_use]
    pub fn is_paletted(&self) -> bool {
        self.texture.is_paletted()
    }

    /// Voxel-count footprint, the 3D analogue of `SubPage::texel_count`.
    #[must_use]
    pub fn texel_count(&self) -> usize {
        let d = self.texture.actual_dims;
        d.0 as usize * d.1 as usize * d.2 as usize
    }

    /// Binds the 3D texture and computes `num_slices` evenly spaced
    /// view-aligned cross-section polygons through this sub-cube, clipped
    /// to its bounds via [`box_plane_cross_section`]. `view_dir` need not be
    /// normalized. Slices are returned back-to-front along `view_dir`, the
    /// order 3D-texture volume rendering composites in. Each vertex carries
    /// a texture coordinate alongside its world position, spanning
    /// `[0,0,0] -> [au/tu, av/tv, aw/tw]` (spec §4.4) over `world_min ..
    /// world_max` — the 3D-texture analogue of [`SubPage::render`](crate::render2d::subpage::SubPage::render)'s
    /// `quad_uvs`. A failed upload (spec §7) never aborts the caller: this
    /// sub-cube falls back to an empty/`invisible` draw instead of
    /// propagating the error.
    pub fn render(&mut self, ctx: &GfxContext, view_dir: Vec3, num_slices: u32, tick: u64) -> Vec<TexturedPolygon> {
        self.last_use_tick = tick;
        if self.invisible || num_slices == 0 {
            return Vec::new();
        }
        if let Err(err) = self.texture.bind(ctx) {
            log::warn!("texture upload failed for sub-cube {:?}: {err}; falling back to an empty tile", self.key);
            self.invisible = true;
            return Vec::new();
        }

        let n = view_dir.normalize_or_zero();
        if n == Vec3::ZERO {
            return Vec::new();
        }
        let corners = [
            self.world_min,
            Vec3::new(self.world_max.x, self.world_min.y, self.world_min.z),
            Vec3::new(self.world_min.x, self.world_max.y, self.world_min.z),
            Vec3::new(self.world_min.x, self.world_min.y, self.world_max.z),
            Vec3::new(self.world_max.x, self.world_max.y, self.world_min.z),
            Vec3::new(self.world_max.x, self.world_min.y, self.world_max.z),
            Vec3::new(self.world_min.x, self.world_max.y, self.world_max.z),
            self.world_max,
        ];
        let (mut t_min, mut t_max) = (f32::INFINITY, f32::NEG_INFINITY);
        for c in corners {
            let t = c.dot(n);
            t_min = t_min.min(t);
            t_max = t_max.max(t);
        }

        let (tu, tv, tw) = self.texture.alloc_dims();
        let (au, av, aw) = self.texture.actual_dims;
        let max_uvw = Vec3::new(au as f32 / tu as f32, av as f32 / tv as f32, aw as f32 / tw as f32);
        let extent = (self.world_max - self.world_min).max(Vec3::splat(f32::EPSILON));

        let mut slices = Vec::with_capacity(num_slices as usize);
        for i in 0..num_slices {
            let t = t_max - (t_max - t_min) * (i as f32 + 0.5) / num_slices as f32;
            let plane_point = n * t;
            let poly = box_plane_cross_section(self.world_min, self.world_max, plane_point, n);
            if poly.len() >= 3 {
                let uvws = poly
                    .iter()
                    .map(|p| (*p - self.world_min) / extent * max_uvw)
                    .collect();
                slices.push(TexturedPolygon { positions: poly, uvws });
            }
        }
        slices
    }
}

/// One view-aligned cross-section polygon: world-space vertex positions
/// paired, in the same order, with their 3D texture coordinates.
#[derive(Debug, Clone)]
pub struct TexturedPolygon {
    pub positions: Vec<Vec3>,
    pub uvws: Vec<Vec3>,
}
