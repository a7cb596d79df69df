//! [`SubPage`]: one textured rectangle within a [`TexPage`](super::texpage::TexPage) grid.

use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::errors::Result;
use crate::renderer::context::GfxContext;
use crate::resources::texture::{self, pixels_2d, TextureKey, TextureObject};
use crate::resources::transfer_function::{PaletteMode, TransferFunction};
use crate::volume::chunk::VoxelChunk;
use crate::volume::source::{Axis, BoxUv, SampleType, VolumeId, VoxelSource};

/// A tile's dependency on the currently bound transfer function: `None` when
/// the source's raw samples are already RGBA and pass straight through
/// (`TransferFunction::transfer`'s `Rgba8` arm has no TF dependency at all);
/// otherwise `Some((identity, node_id))`, since `U8`/`U16` input is baked
/// through the TF regardless of `PaletteMode` — a `PaletteMode::Rgba` render
/// still bakes shift/offset/colour-map/opaque window into the output
/// pixels, so it's just as TF-dependent as the paletted path (invariant 2,
/// spec §3).
///
/// `identity` is stable across a `TransferFunction`'s mutations and is what
/// a cell's entry list is keyed on; `node_id` changes on every mutation and
/// is what decides whether an entry matching that identity is stale
/// (invariant 4, spec §3 — see [`TransferFunction::identity`]).
pub(crate) fn tf_discriminator(source: &dyn VoxelSource, transfer_function: &TransferFunction) -> Option<(u64, u64)> {
    (source.sample_type() != SampleType::Rgba8).then(|| (transfer_function.identity(), transfer_function.node_id()))
}

/// One tile: geometry (implicit — the caller supplies world-space span) +
/// a shared [`TextureObject`] + the palette it was built against.
pub struct SubPage {
    pub key: TextureKey,
    pub texture: Arc<TextureObject>,
    pub actual_texel_size: (u32, u32),
    /// `source.id()` at build time — used by `TexPage::get_or_build` to
    /// detect the volume-changed invalidation case (spec §4.5).
    pub source_id: VolumeId,
    /// The transfer function's stable identity this page was built
    /// against, or `None` when the source's raw samples are already RGBA
    /// (invariant 2/4, spec §3; see [`tf_discriminator`]).
    pub tf_identity: Option<u64>,
    /// The transfer function's `node_id` at build time, used to tell a
    /// fresh entry from a stale one sharing the same `tf_identity`.
    pub tf_node_id: Option<u64>,
    pub last_use_tick: u64,
    pub invisible: bool,
}

impl SubPage {
    /// Builds (or reuses, via the global texture registry) the `SubPage`
    /// for one `(axis, slice, col, row)` tile.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        source: &dyn VoxelSource,
        axis: Axis,
        slice_idx: i32,
        col: u32,
        row: u32,
        box_uv: BoxUv,
        tile_size: (u32, u32),
        transfer_function: &TransferFunction,
        palette_mode: PaletteMode,
        tick: u64,
    ) -> Result<Self> {
        let tf_key = tf_discriminator(source, transfer_function);
        let (tf_identity, tf_node_id) = match tf_key {
            Some((identity, node_id)) => (Some(identity), Some(node_id)),
            None => (None, None),
        };
        let key = TextureKey {
            source_id: source.id(),
            axis,
            slice_index: slice_idx,
            tile_index: (col, row, 0),
            palette_marker: tf_node_id,
        };

        let alloc = (texture::next_pow2_min4(tile_size.0), texture::next_pow2_min4(tile_size.1));
        let actual_texel_size = (box_uv.width(), box_uv.height());

        let built = texture::get_or_build(key.clone(), || {
            let chunk = VoxelChunk::build_sub_page(source, axis, slice_idx, box_uv)?;
            let (output, invisible) = chunk.transfer(transfer_function, palette_mode)?;
            Ok((pixels_2d(output, alloc), (actual_texel_size.0, actual_texel_size.1, 1), invisible))
        })?;

        let invisible = built.is_invisible();

        Ok(Self {
            key,
            texture: built,
            actual_texel_size,
            source_id: source.id(),
            tf_identity,
            tf_node_id,
            last_use_tick: tick,
            invisible,
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

    /// Voxel-count footprint (the `numTexels` budget unit, spec §4.6),
    /// distinct from `sw_bytes`/`hw_bytes` which count bytes.
    #[must_use]
    pub fn texel_count(&self) -> usize {
        self.actual_texel_size.0 as usize * self.actual_texel_size.1 as usize
    }

    /// Binds the texture (uploading if necessary) and emits the textured
    /// quad's four world-space corners paired with their texture
    /// coordinates, per spec §4.4. A failed upload (spec §7) never aborts
    /// the caller's render loop: this tile falls back to an empty/`invisible`
    /// draw and the quad geometry is still returned so the loop can continue.
    pub fn render(&mut self, ctx: &GfxContext, upper_left: Vec3, span_u: Vec3, span_v: Vec3, tick: u64) -> TexturedQuad {
        self.last_use_tick = tick;
        if !self.invisible {
            if let Err(err) = self.texture.bind(ctx) {
                log::warn!("texture upload failed for tile {:?}: {err}; falling back to an empty tile", self.key);
                self.invisible = true;
            }
        }
        let (tu, tv, _) = self.texture.alloc_dims();
        let (au, av) = self.actual_texel_size;
        let max_uv = Vec2::new(au as f32 / tu as f32, av as f32 / tv as f32);
        TexturedQuad { corners: quad_corners(upper_left, span_u, span_v), uvs: quad_uvs(max_uv) }
    }
}

/// A tile's quad: four world-space corners paired, in the same order, with
/// their texture coordinates.
#[derive(Debug, Clone, Copy)]
pub struct TexturedQuad {
    pub corners: [Vec3; 4],
    pub uvs: [Vec2; 4],
}

/// The four world-space corners of a tile's quad: `upper_left`, `+span_u`,
/// `+span_u+span_v`, `+span_v`.
#[must_use]
pub fn quad_corners(upper_left: Vec3, span_u: Vec3, span_v: Vec3) -> [Vec3; 4] {
    [
        upper_left,
        upper_left + span_u,
        upper_left + span_u + span_v,
        upper_left + span_v,
    ]
}

/// The four texture coordinates matching [`quad_corners`]' corner order,
/// spanning `[0,0] -> [au/tu, av/tv]` (spec §4.4) rather than the full
/// `[0,0] -> [1,1]` a boundary tile's power-of-two padding would otherwise
/// imply.
#[must_use]
pub fn quad_uvs(max_uv: Vec2) -> [Vec2; 4] {
    [
        Vec2::new(0.0, 0.0),
        Vec2::new(max_uv.x, 0.0),
        Vec2::new(max_uv.x, max_uv.y),
        Vec2::new(0.0, max_uv.y),
    ]
}
