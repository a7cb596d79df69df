//! End-to-end scenarios (S1-S6) and the six cross-cutting invariants.

mod common;

use glam::Vec3;
use volux::resources::{TextureKey, TextureObject, TexturePixels};
use volux::{
    Axis, BoxUv, PaletteMode, PredefinedGradient, RenderError, Renderer, RendererSettings, TransferFunction, TransferOutput,
    VoxelChunk,
};

use common::{gpu_context, SyntheticVolume};

fn grey_tf() -> TransferFunction {
    let mut tf = TransferFunction::new();
    tf.set_predef_color_map(PredefinedGradient::Grey);
    tf.remap(0, 255).unwrap();
    tf
}

fn rgba_buf(chunk: &VoxelChunk, tf: &TransferFunction) -> Vec<u8> {
    let (out, _) = chunk.transfer(tf, PaletteMode::Rgba).unwrap();
    let TransferOutput::Rgba(buf) = out else { panic!("expected rgba output") };
    buf
}

/// S1 — Basic Z-slice: every texel of slice z=3 reads back as (3,3,3,3).
#[test]
fn s1_basic_z_slice() {
    let volume = SyntheticVolume::new(1, (8, 8, 8), |_, _, z| z as u8);
    let tf = grey_tf();

    let box_uv = BoxUv::new(0, 8, 0, 8);
    let chunk = VoxelChunk::build_sub_page(&volume, Axis::Z, 3, box_uv).unwrap();
    let buf = rgba_buf(&chunk, &tf);

    for px in buf.chunks_exact(4) {
        assert_eq!(px, &[3, 3, 3, 3]);
    }
}

/// S2 — Opacity window: `reMap(2,5)` passes z=3 through but blanks z=6.
#[test]
fn s2_opacity_window() {
    let volume = SyntheticVolume::new(2, (8, 8, 8), |_, _, z| z as u8);
    let mut tf = grey_tf();
    tf.remap(2, 5).unwrap();

    let box_uv = BoxUv::new(0, 8, 0, 8);

    let in_window = VoxelChunk::build_sub_page(&volume, Axis::Z, 3, box_uv).unwrap();
    for px in rgba_buf(&in_window, &tf).chunks_exact(4) {
        assert_eq!(px, &[3, 3, 3, 3]);
    }

    let out_of_window = VoxelChunk::build_sub_page(&volume, Axis::Z, 6, box_uv).unwrap();
    for px in rgba_buf(&out_of_window, &tf).chunks_exact(4) {
        assert_eq!(px, &[0, 0, 0, 0]);
    }
}

/// S3 — LRU eviction: a budget of two tile-areas keeps only the two most
/// recently touched `SubPage`s of the four a `z=0` render builds.
#[test]
fn s3_lru_eviction() {
    let ctx = gpu_context();
    let volume = SyntheticVolume::new(3, (8, 8, 8), |x, y, _| (x + y) as u8);
    let tf = grey_tf();

    let settings = RendererSettings { tile_size: (4, 4, 4), max_texels: 2 * 4 * 4, max_bytes_hw: usize::MAX, ..RendererSettings::default() };
    let renderer = Renderer::new(settings);

    renderer
        .render_ortho_slice(&ctx, &volume, Axis::Z, 0, Vec3::new(-1.0, -1.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0), &tf, PaletteMode::Rgba)
        .unwrap();

    assert_eq!(renderer.num_texels(), 2 * 4 * 4);
}

/// S4 — Transfer-function change: re-rendering after a TF mutation replaces
/// (rather than duplicates) the slice's pages.
#[test]
fn s4_transfer_function_change_replaces_pages() {
    let ctx = gpu_context();
    let volume = SyntheticVolume::new(4, (8, 8, 8), |x, y, _| (x + y) as u8);
    let mut tf = grey_tf();

    let settings = RendererSettings { tile_size: (4, 4, 4), max_texels: usize::MAX, max_bytes_hw: usize::MAX, ..RendererSettings::default() };
    let renderer = Renderer::new(settings);

    let origin = Vec3::new(-1.0, -1.0, 0.0);
    let du = Vec3::new(2.0, 0.0, 0.0);
    let dv = Vec3::new(0.0, 2.0, 0.0);

    renderer.render_ortho_slice(&ctx, &volume, Axis::Z, 0, origin, du, dv, &tf, PaletteMode::Rgba).unwrap();
    assert_eq!(renderer.num_texels(), 4 * 4 * 4);

    tf.remap(0, 100).unwrap();
    renderer.render_ortho_slice(&ctx, &volume, Axis::Z, 0, origin, du, dv, &tf, PaletteMode::Rgba).unwrap();

    // Still exactly 4 tiles worth of texels: the old TF's pages were
    // replaced, not left resident alongside the new ones.
    assert_eq!(renderer.num_texels(), 4 * 4 * 4);
}

/// S5 — Axis consistency: a constant-valued volume reads back identically
/// whichever axis it's sliced along.
#[test]
fn s5_axis_consistency() {
    let volume = SyntheticVolume::new(5, (8, 8, 8), |_, _, _| 42u8);
    let tf = grey_tf();
    let box_uv = BoxUv::new(0, 8, 0, 8);

    let mut buffers = Vec::new();
    for axis in Axis::ALL {
        let chunk = VoxelChunk::build_sub_page(&volume, axis, 4, box_uv).unwrap();
        buffers.push(rgba_buf(&chunk, &tf));
    }
    assert_eq!(buffers[0], buffers[1]);
    assert_eq!(buffers[1], buffers[2]);
    for px in buffers[0].chunks_exact(4) {
        assert_eq!(px, &[42, 42, 42, 42]);
    }
}

/// S6 — Tile boundary crossing: each `4x4` quadrant of an `8x8` slice holds
/// exactly its own `v = x + y` sub-range, and values step by 1 across a
/// shared seam.
#[test]
fn s6_tile_boundary_crossing() {
    let volume = SyntheticVolume::new(6, (8, 8, 1), |x, y, _| (x + y) as u8);
    let tf = grey_tf();

    let tiles = [(0u32, 0u32), (4, 0), (0, 4), (4, 4)];
    let mut grids = Vec::new();
    for &(umin, vmin) in &tiles {
        let box_uv = BoxUv::new(umin as i32, (umin + 4) as i32, vmin as i32, (vmin + 4) as i32);
        let chunk = VoxelChunk::build_sub_page(&volume, Axis::Z, 0, box_uv).unwrap();
        let buf = rgba_buf(&chunk, &tf);
        for v in 0..4u32 {
            for u in 0..4u32 {
                let expected = (umin + u + vmin + v) as u8;
                let px = &buf[((v * 4 + u) * 4) as usize..][..4];
                assert_eq!(px, &[expected; 4], "tile ({umin},{vmin}) texel ({u},{v})");
            }
        }
        grids.push((umin, vmin, buf));
    }

    // Seam between the left and right tile in the bottom row: right edge of
    // tile (0,0) and left edge of tile (4,0) differ by exactly 1.
    let left = &grids[0].2;
    let right = &grids[1].2;
    for row in 0..4usize {
        let left_edge = left[(row * 4 + 3) * 4];
        let right_edge = right[row * 4 * 4];
        assert_eq!(i32::from(right_edge) - i32::from(left_edge), 1);
    }
}

/// Invariant 1: the texel budget is never exceeded after any render.
#[test]
fn invariant_texel_budget_never_exceeded() {
    let ctx = gpu_context();
    let volume = SyntheticVolume::new(10, (16, 16, 16), |x, y, z| (x ^ y ^ z) as u8);
    let tf = grey_tf();
    let max_texels = 3 * 4 * 4;
    let settings = RendererSettings { tile_size: (4, 4, 4), max_texels, max_bytes_hw: usize::MAX, ..RendererSettings::default() };
    let renderer = Renderer::new(settings);

    for slice in 0..16 {
        renderer
            .render_ortho_slice(&ctx, &volume, Axis::Z, slice, Vec3::new(-1.0, -1.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0), &tf, PaletteMode::Rgba)
            .unwrap();
        assert!(renderer.num_texels() <= max_texels, "exceeded budget after slice {slice}");
    }
}

/// Invariant 5: re-rendering the same quad is idempotent — texel count
/// doesn't grow on the second pass.
#[test]
fn invariant_idempotent_rerender() {
    let ctx = gpu_context();
    let volume = SyntheticVolume::new(11, (8, 8, 8), |x, y, _| (x + y) as u8);
    let tf = grey_tf();
    let settings = RendererSettings { tile_size: (4, 4, 4), max_texels: usize::MAX, max_bytes_hw: usize::MAX, ..RendererSettings::default() };
    let renderer = Renderer::new(settings);

    let origin = Vec3::new(-1.0, -1.0, 0.0);
    let du = Vec3::new(2.0, 0.0, 0.0);
    let dv = Vec3::new(0.0, 2.0, 0.0);

    renderer.render_ortho_slice(&ctx, &volume, Axis::Z, 0, origin, du, dv, &tf, PaletteMode::Rgba).unwrap();
    let after_first = renderer.num_texels();
    renderer.render_ortho_slice(&ctx, &volume, Axis::Z, 0, origin, du, dv, &tf, PaletteMode::Rgba).unwrap();
    assert_eq!(renderer.num_texels(), after_first);
}

/// Spec §7: a texture whose allocation exceeds the device's texture-size
/// limit fails to bind with `GpuResourceExhausted`, rather than panicking
/// or corrupting state.
#[test]
fn oversized_texture_bind_reports_gpu_resource_exhausted() {
    let ctx = gpu_context();
    let key = TextureKey { source_id: 99, axis: Axis::Z, slice_index: 0, tile_index: (0, 0, 0), palette_marker: None };
    let pixels = TexturePixels::TwoDRgba { width: 1_000_000, height: 4, data: Vec::new() };
    let texture = TextureObject::new(key, pixels, (4, 4, 1), false);

    let err = texture.bind(&ctx).unwrap_err();
    assert!(matches!(err, RenderError::GpuResourceExhausted(_)));
}
