//! GPU-ready texture objects, interned by identity key so that multiple
//! scene nodes requesting the same geometric tile with the same palette
//! share one upload (spec §4.3).

use std::collections::hash_map::Entry;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::errors::{RenderError, Result};
use crate::renderer::context::{GfxContext, GpuContextId};
use crate::resources::clut::ColorLookupTable;
use crate::resources::transfer_function::TransferOutput;
use crate::volume::source::{Axis, VolumeId};

/// Composite identity of a texture, per spec §3: two scene nodes referring
/// to the same geometric sub-region of the same volume, with the same
/// palette (or both RGBA), share one [`TextureObject`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub source_id: VolumeId,
    pub axis: Axis,
    pub slice_index: i32,
    /// `(col, row)` within the slice's tile grid (2D path), or the flat
    /// sub-cube index (3D path).
    pub tile_index: (u32, u32, u32),
    /// `Some(transfer_function.node_id())` whenever the texture's pixels
    /// depend on the bound transfer function (any `U8`/`U16` source,
    /// paletted or not), `None` when the source's raw samples are already
    /// RGBA and pass straight through untouched.
    pub palette_marker: Option<u64>,
}

/// The four upload shapes a texture can take (design note §9: this
/// replaces the base/derived GL texture class hierarchy with a tagged
/// variant).
///
/// `width`/`height`/`depth` are the power-of-two *allocation* dims (the GPU
/// texture's actual size); `data`/`indices` hold only the compact,
/// un-padded pixels for the tile's real voxel coverage. [`TextureObject::bind`]
/// pads the gap between the two out to transparent black / palette index 0
/// at upload time, matching spec §4.3.
pub enum TexturePixels {
    TwoDRgba { width: u32, height: u32, data: Vec<u8> },
    TwoDPalette { width: u32, height: u32, indices: Vec<u8>, clut: Arc<ColorLookupTable> },
    ThreeDRgba { width: u32, height: u32, depth: u32, data: Vec<u8> },
    ThreeDPalette { width: u32, height: u32, depth: u32, indices: Vec<u8>, clut: Arc<ColorLookupTable> },
}

impl TexturePixels {
    #[must_use]
    pub fn alloc_dims(&self) -> (u32, u32, u32) {
        match self {
            TexturePixels::TwoDRgba { width, height, .. }
            | TexturePixels::TwoDPalette { width, height, .. } => (*width, *height, 1),
            TexturePixels::ThreeDRgba { width, height, depth, .. }
            | TexturePixels::ThreeDPalette { width, height, depth, .. } => (*width, *height, *depth),
        }
    }

    #[must_use]
    pub fn is_paletted(&self) -> bool {
        matches!(self, TexturePixels::TwoDPalette { .. } | TexturePixels::ThreeDPalette { .. })
    }

    fn byte_len(&self) -> usize {
        match self {
            TexturePixels::TwoDRgba { data, .. } | TexturePixels::ThreeDRgba { data, .. } => data.len(),
            TexturePixels::TwoDPalette { indices, .. } | TexturePixels::ThreeDPalette { indices, .. } => {
                indices.len()
            }
        }
    }
}

/// One context's cached GPU texture for a [`TextureObject`]. Dropping this
/// drops the `wgpu::Texture`/`wgpu::TextureView`/`wgpu::Sampler`, freeing
/// the GPU resources for that context.
struct ContextEntry {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    valid: bool,
}

/// A GPU-ready image built from one [`VoxelChunk`](crate::volume::chunk::VoxelChunk)
/// transfer-function output. Owns a CPU-side copy of the pixels (so it can
/// be (re)uploaded to a newly-seen context) plus, per context that has
/// bound it, a live GPU texture.
pub struct TextureObject {
    pub key: TextureKey,
    pixels: TexturePixels,
    /// Actual voxel coverage `(au, av[, aw])`; may be smaller than the
    /// power-of-two allocation dims for boundary tiles.
    pub actual_dims: (u32, u32, u32),
    /// `true` iff every texel this texture was built from is fully
    /// transparent — the `SubPage`/`SubCube` that owns it can then skip
    /// binding and drawing it entirely (spec §4.4 "invisible" fast path).
    invisible: bool,
    per_context: Mutex<FxHashMap<GpuContextId, ContextEntry>>,
}

impl TextureObject {
    #[must_use]
    pub fn new(key: TextureKey, pixels: TexturePixels, actual_dims: (u32, u32, u32), invisible: bool) -> Self {
        Self { key, pixels, actual_dims, invisible, per_context: Mutex::new(FxHashMap::default()) }
    }

    /// See the `invisible` field doc.
    #[must_use]
    pub fn is_invisible(&self) -> bool {
        self.invisible
    }

    /// CPU-side byte footprint (invariant 1, spec §3).
    #[must_use]
    pub fn sw_bytes(&self) -> usize {
        self.pixels.byte_len()
    }

    /// GPU-side byte footprint for one uploaded copy (the allocation size,
    /// padding included, since that's what actually occupies VRAM).
    #[must_use]
    pub fn hw_bytes(&self) -> usize {
        let (w, h, d) = self.pixels.alloc_dims();
        let bpp = if self.pixels.is_paletted() { 1 } else { 4 };
        (w * h * d) as usize * bpp
    }

    #[must_use]
    pub fn is_paletted(&self) -> bool {
        self.pixels.is_paletted()
    }

    /// The power-of-two GPU allocation dims `(tu, tv[, tz])` this texture
    /// was uploaded at — the denominator in the `au/tu, av/tv` UV ratio
    /// spec §4.4 describes. `depth` is `1` for the 2D shapes.
    #[must_use]
    pub fn alloc_dims(&self) -> (u32, u32, u32) {
        self.pixels.alloc_dims()
    }

    /// The colour-lookup table this texture's index buffer was built
    /// against, if it's paletted. A caller driving the fragment-program
    /// palette path (spec §4.3 "LUMINANCE for fragment-program palette
    /// path") binds this as the second texture/uniform the shader samples;
    /// `None` for an RGBA texture, which carries no palette at all.
    #[must_use]
    pub fn clut(&self) -> Option<&ColorLookupTable> {
        match &self.pixels {
            TexturePixels::TwoDPalette { clut, .. } | TexturePixels::ThreeDPalette { clut, .. } => Some(clut),
            TexturePixels::TwoDRgba { .. } | TexturePixels::ThreeDRgba { .. } => None,
        }
    }

    /// Binds this texture for `ctx`, building (or rebuilding, if the
    /// cached entry was invalidated) the GPU texture as needed. Unused
    /// padding between `actual_dims` and the power-of-two allocation is
    /// cleared to transparent black before upload (spec §4.3), avoiding
    /// bleed under bilinear sampling.
    pub fn bind(&self, ctx: &GfxContext) -> Result<()> {
        let mut table = self.per_context.lock();
        if let Some(entry) = table.get(&ctx.id) {
            if entry.valid {
                return Ok(());
            }
        }

        let entry = self.upload(ctx)?;
        table.insert(ctx.id, entry);
        Ok(())
    }

    fn upload(&self, ctx: &GfxContext) -> Result<ContextEntry> {
        let (w, h, d) = self.pixels.alloc_dims();
        let format = if self.is_paletted() {
            wgpu::TextureFormat::R8Unorm
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };
        let dimension = if d > 1 { wgpu::TextureDimension::D3 } else { wgpu::TextureDimension::D2 };

        let limits = ctx.device.limits();
        let max_dim = if d > 1 { limits.max_texture_dimension_3d } else { limits.max_texture_dimension_2d };
        if w > max_dim || h > max_dim || d > max_dim {
            return Err(RenderError::GpuResourceExhausted(format!(
                "tile {:?} needs a {w}x{h}x{d} texture, this device's limit is {max_dim}",
                self.key
            )));
        }

        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("volux::TextureObject"),
            size: wgpu::Extent3d { width: w.max(1), height: h.max(1), depth_or_array_layers: d.max(1) },
            mip_level_count: 1,
            sample_count: 1,
            dimension,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let padded = self.padded_bytes();
        let bytes_per_pixel = if self.is_paletted() { 1 } else { 4 };
        ctx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &padded,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(w * bytes_per_pixel),
                rows_per_image: Some(h),
            },
            wgpu::Extent3d { width: w.max(1), height: h.max(1), depth_or_array_layers: d.max(1) },
        );

        let view_dimension = if d > 1 { wgpu::TextureViewDimension::D3 } else { wgpu::TextureViewDimension::D2 };
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(view_dimension),
            ..Default::default()
        });

        let address_mode = if d > 1 { wgpu::AddressMode::ClampToEdge } else { wgpu::AddressMode::ClampToEdge };
        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(ContextEntry { texture, view, sampler, valid: true })
    }

    /// Pads the pixel buffer from `actual_dims` out to the power-of-two
    /// allocation, filling unused texels with transparent black / index 0.
    fn padded_bytes(&self) -> Vec<u8> {
        let (au, av, aw) = self.actual_dims;
        let (tu, tv, tz) = self.pixels.alloc_dims();
        if (au, av, aw) == (tu, tv, tz) {
            return match &self.pixels {
                TexturePixels::TwoDRgba { data, .. } | TexturePixels::ThreeDRgba { data, .. } => data.clone(),
                TexturePixels::TwoDPalette { indices, .. } | TexturePixels::ThreeDPalette { indices, .. } => {
                    indices.clone()
                }
            };
        }

        let bpp = if self.is_paletted() { 1 } else { 4 };
        let mut out = vec![0u8; (tu * tv * tz) as usize * bpp];
        let src: &[u8] = match &self.pixels {
            TexturePixels::TwoDRgba { data, .. } | TexturePixels::ThreeDRgba { data, .. } => data,
            TexturePixels::TwoDPalette { indices, .. } | TexturePixels::ThreeDPalette { indices, .. } => indices,
        };
        for z in 0..aw {
            for y in 0..av {
                let src_row_start = ((z * av + y) * au) as usize * bpp;
                let dst_row_start = ((z * tv + y) * tu) as usize * bpp;
                let row_bytes = au as usize * bpp;
                out[dst_row_start..dst_row_start + row_bytes]
                    .copy_from_slice(&src[src_row_start..src_row_start + row_bytes]);
            }
        }
        out
    }

    /// `true` if a valid GPU texture is already cached for `ctx_id`.
    #[must_use]
    pub fn is_bound(&self, ctx_id: GpuContextId) -> bool {
        self.per_context.lock().get(&ctx_id).is_some_and(|e| e.valid)
    }

    /// Runs `f` with the bound `(view, sampler)` for `ctx_id`, if any.
    /// Callers assembling bind groups for a draw call use this after
    /// [`bind`](Self::bind) has ensured the entry exists.
    pub fn with_bound<R>(&self, ctx_id: GpuContextId, f: impl FnOnce(&wgpu::TextureView, &wgpu::Sampler) -> R) -> Option<R> {
        let table = self.per_context.lock();
        table.get(&ctx_id).filter(|e| e.valid).map(|e| f(&e.view, &e.sampler))
    }

    /// Invalidates every per-context GPU texture (e.g. on device loss).
    pub fn invalidate_all(&self) {
        for entry in self.per_context.lock().values_mut() {
            entry.valid = false;
        }
    }
}

impl std::fmt::Debug for TextureObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureObject")
            .field("key", &self.key)
            .field("actual_dims", &self.actual_dims)
            .field("sw_bytes", &self.sw_bytes())
            .finish()
    }
}

/// Process-wide interning table, mapping [`TextureKey`] to the live
/// [`TextureObject`] if one exists. Holds only weak references: the
/// `SubPage`/`SubCube` that built a texture owns the strong `Arc`, so a
/// texture disappears from the registry exactly when its last owning page
/// drops it (design note §9: "no cycles").
static REGISTRY: OnceLock<Mutex<FxHashMap<TextureKey, Weak<TextureObject>>>> = OnceLock::new();

fn registry() -> &'static Mutex<FxHashMap<TextureKey, Weak<TextureObject>>> {
    REGISTRY.get_or_init(|| Mutex::new(FxHashMap::default()))
}

/// Returns the live texture for `key`, if any scene node still holds it.
#[must_use]
pub fn lookup(key: &TextureKey) -> Option<Arc<TextureObject>> {
    registry().lock().get(key).and_then(Weak::upgrade)
}

/// Interns a freshly built texture under its key. If a concurrent caller
/// already interned one for the same key, that existing instance wins and
/// is returned instead (first writer wins, matching the source engine's
/// `instancedict` dedup).
pub fn intern(tex: TextureObject) -> Arc<TextureObject> {
    let key = tex.key.clone();
    let mut guard = registry().lock();
    match guard.entry(key) {
        Entry::Occupied(mut slot) => {
            if let Some(existing) = slot.get().upgrade() {
                return existing;
            }
            let arc = Arc::new(tex);
            slot.insert(Arc::downgrade(&arc));
            arc
        }
        Entry::Vacant(slot) => {
            let arc = Arc::new(tex);
            slot.insert(Arc::downgrade(&arc));
            arc
        }
    }
}

/// Gets-or-builds the texture for `key`, running `build` only on a miss.
pub fn get_or_build(
    key: TextureKey,
    build: impl FnOnce() -> Result<(TexturePixels, (u32, u32, u32), bool)>,
) -> Result<Arc<TextureObject>> {
    if let Some(existing) = lookup(&key) {
        return Ok(existing);
    }
    let (pixels, actual_dims, invisible) = build()?;
    Ok(intern(TextureObject::new(key, pixels, actual_dims, invisible)))
}

/// Converts a [`TransferOutput`] plus its allocation dims into the pixel
/// representation a [`TextureObject`] stores.
#[must_use]
pub fn pixels_2d(output: TransferOutput, alloc: (u32, u32)) -> TexturePixels {
    match output {
        TransferOutput::Rgba(data) => TexturePixels::TwoDRgba { width: alloc.0, height: alloc.1, data },
        TransferOutput::Paletted { indices, clut } => {
            TexturePixels::TwoDPalette { width: alloc.0, height: alloc.1, indices, clut: Arc::new(clut) }
        }
    }
}

/// 3D equivalent of [`pixels_2d`].
#[must_use]
pub fn pixels_3d(output: TransferOutput, alloc: (u32, u32, u32)) -> TexturePixels {
    match output {
        TransferOutput::Rgba(data) => {
            TexturePixels::ThreeDRgba { width: alloc.0, height: alloc.1, depth: alloc.2, data }
        }
        TransferOutput::Paletted { indices, clut } => TexturePixels::ThreeDPalette {
            width: alloc.0,
            height: alloc.1,
            depth: alloc.2,
            indices,
            clut: Arc::new(clut),
        },
    }
}

/// Rounds `v` up to the next power of two, with a floor of 4 (spec §4.6:
/// "sizes must be >= 4 and powers of two").
#[must_use]
pub fn next_pow2_min4(v: u32) -> u32 {
    v.max(4).next_power_of_two()
}

pub(crate) fn ensure_pow2_ge4(name: &str, v: u32) -> Result<()> {
    if v < 4 || !v.is_power_of_two() {
        return Err(RenderError::BadParameter(format!(
            "{name} must be a power of two >= 4, got {v}"
        )));
    }
    Ok(())
}
