//! The transfer function: maps raw voxel samples to RGBA, with shift/offset
//! remapping, an opaque window, and a choice of seven predefined gradients
//! or a user-supplied colour map.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::{RenderError, Result};
use crate::resources::clut::{ColorLookupTable, PredefinedGradient};
use crate::volume::source::SampleType;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

fn next_node_id() -> u64 {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Layout of the user-supplied `color_map` array, per spec §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorMapType {
    /// One float per entry: `R=G=B=A = map[i]`.
    Alpha,
    /// Two floats per entry: luminance then alpha.
    LumAlpha,
    /// Four floats per entry: R, G, B, A.
    Rgba,
}

impl ColorMapType {
    #[must_use]
    pub fn channels(self) -> usize {
        match self {
            ColorMapType::Alpha => 1,
            ColorMapType::LumAlpha => 2,
            ColorMapType::Rgba => 4,
        }
    }
}

/// How the computed alpha channel is used downstream (spec §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaPolicy {
    /// Use the alpha value exactly as resolved from the colour map.
    #[default]
    AsIs,
    /// Force any non-thresholded-out texel fully opaque (alpha = 255).
    Opaque,
    /// Collapse alpha to either 0 or 255 (transparent or fully opaque).
    Binary,
}

/// Whether [`VoxelChunk::transfer`](crate::volume::chunk::VoxelChunk::transfer)
/// should emit an RGBA buffer or a paletted index buffer + CLUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteMode {
    Rgba,
    Paletted,
}

/// The result of running a transfer function over a voxel chunk.
pub enum TransferOutput {
    Rgba(Vec<u8>),
    Paletted { indices: Vec<u8>, clut: ColorLookupTable },
}

/// Mutable transfer-function state: predefined gradient selection, optional
/// user colour map, shift/offset remap, opaque window, and alpha policy.
///
/// `node_id` changes on every mutation, the cache-invalidation hook
/// described in spec §3/§4.5/§4.7: a `TexPage`/`TexCube` that notices its
/// cached `SubPage`'s `node_id` no longer matches the current transfer
/// function's `node_id` knows to rebuild.
pub struct TransferFunction {
    /// Stable for this object's whole lifetime, unlike `node_id`. Two
    /// `SubPage`s built against the *same* `TransferFunction` object at
    /// different points in its mutation history share one cell-list slot
    /// (the later build replaces the earlier one); two `SubPage`s built
    /// against genuinely distinct `TransferFunction` objects coexist in
    /// that slot's cell (invariant 4, spec §3).
    identity: u64,
    node_id: AtomicU64,
    pub shift: i32,
    pub offset: i32,
    pub predef_color_map: PredefinedGradient,
    pub color_map_type: ColorMapType,
    pub color_map: Vec<f32>,
    pub alpha_policy: AlphaPolicy,
    opaque_lo: i32,
    opaque_hi: i32,
}

impl Default for TransferFunction {
    fn default() -> Self {
        Self {
            identity: next_node_id(),
            node_id: AtomicU64::new(next_node_id()),
            shift: 0,
            offset: 0,
            predef_color_map: PredefinedGradient::Grey,
            color_map_type: ColorMapType::Rgba,
            color_map: Vec::new(),
            alpha_policy: AlphaPolicy::AsIs,
            opaque_lo: 0,
            opaque_hi: i32::MAX,
        }
    }
}

impl TransferFunction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current invalidation-hook id. Bumped by every mutator below.
    #[must_use]
    pub fn node_id(&self) -> u64 {
        self.node_id.load(Ordering::Relaxed)
    }

    /// This object's identity, stable across every mutation. Distinguishes
    /// "this `TransferFunction` was mutated, rebuild its cached tiles in
    /// place" from "a different `TransferFunction` is now bound, keep both
    /// around" (invariant 4, spec §3).
    #[must_use]
    pub fn identity(&self) -> u64 {
        self.identity
    }

    /// Marks this transfer function as changed without otherwise mutating
    /// it, the equivalent of the source engine's `SoNode::touch()`.
    pub fn touch(&self) {
        self.node_id.store(next_node_id(), Ordering::Relaxed);
    }

    pub fn set_shift(&mut self, shift: i32) {
        self.shift = shift;
        self.touch();
    }

    pub fn set_offset(&mut self, offset: i32) {
        self.offset = offset;
        self.touch();
    }

    pub fn set_predef_color_map(&mut self, gradient: PredefinedGradient) {
        self.predef_color_map = gradient;
        self.touch();
    }

    pub fn set_color_map(&mut self, color_map_type: ColorMapType, color_map: Vec<f32>) {
        self.color_map_type = color_map_type;
        self.color_map = color_map;
        self.touch();
    }

    pub fn set_alpha_policy(&mut self, policy: AlphaPolicy) {
        self.alpha_policy = policy;
        self.touch();
    }

    /// Sets the opaque window `[lo, hi]` (closed interval, raw pre-shift
    /// sample domain). `lo > hi` is a `BadParameter` and leaves state
    /// unchanged, per spec §7.
    pub fn remap(&mut self, lo: i32, hi: i32) -> Result<()> {
        if lo > hi {
            return Err(RenderError::BadParameter(format!(
                "reMap: lo ({lo}) > hi ({hi})"
            )));
        }
        self.opaque_lo = lo;
        self.opaque_hi = hi;
        self.touch();
        Ok(())
    }

    #[must_use]
    pub fn opaque_window(&self) -> (i32, i32) {
        (self.opaque_lo, self.opaque_hi)
    }

    /// Applies `(s << shift) + offset`, saturated to `[0, 2^bits - 1]`.
    fn remapped(&self, sample: i32, bits: u32) -> i32 {
        let max = (1i64 << bits) - 1;
        let base = i64::from(sample);
        let shifted = if self.shift >= 0 {
            base << self.shift.min(62)
        } else {
            base >> (-self.shift).min(62)
        };
        (shifted + i64::from(self.offset)).clamp(0, max) as i32
    }

    fn resolve_color(&self, s_prime: i32) -> Result<[u8; 4]> {
        if self.predef_color_map != PredefinedGradient::None {
            let clut = ColorLookupTable::predefined(self.predef_color_map)
                .expect("non-None predefined gradient always has a table");
            return Ok(clut.get(s_prime as usize).unwrap_or([0, 0, 0, 0]));
        }

        let channels = self.color_map_type.channels();
        if self.color_map.len() % channels != 0 {
            return Err(RenderError::InvalidColorMapType {
                len: self.color_map.len(),
                channels,
            });
        }
        let ncols = self.color_map.len() / channels;
        if s_prime as usize >= ncols {
            return Err(RenderError::ColorMapTooSmall {
                index: s_prime as u32,
                len: ncols,
            });
        }

        let base = s_prime as usize * channels;
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Ok(match self.color_map_type {
            ColorMapType::Alpha => {
                let a = to_u8(self.color_map[base]);
                [a, a, a, a]
            }
            ColorMapType::LumAlpha => {
                let lum = to_u8(self.color_map[base]);
                let a = to_u8(self.color_map[base + 1]);
                [lum, lum, lum, a]
            }
            ColorMapType::Rgba => [
                to_u8(self.color_map[base]),
                to_u8(self.color_map[base + 1]),
                to_u8(self.color_map[base + 2]),
                to_u8(self.color_map[base + 3]),
            ],
        })
    }

    fn apply_alpha_policy(&self, mut rgba: [u8; 4]) -> [u8; 4] {
        if rgba[3] == 0 {
            return rgba;
        }
        rgba[3] = match self.alpha_policy {
            AlphaPolicy::AsIs => rgba[3],
            AlphaPolicy::Opaque => 255,
            AlphaPolicy::Binary => {
                if rgba[3] >= 128 {
                    255
                } else {
                    0
                }
            }
        };
        rgba
    }

    /// Runs this transfer function over every sample in `input`, producing
    /// an RGBA buffer (or, for `PaletteMode::Paletted`, indices + a CLUT).
    /// `invisible` is `true` iff every output alpha is zero.
    pub fn transfer(
        &self,
        input: &[u8],
        input_dtype: SampleType,
        palette_mode: PaletteMode,
    ) -> Result<(TransferOutput, bool)> {
        match input_dtype {
            SampleType::Rgba8 => {
                let invisible = input.chunks_exact(4).all(|p| p[3] == 0);
                Ok((TransferOutput::Rgba(input.to_vec()), invisible))
            }
            SampleType::U8 => self.transfer_u8(input, palette_mode),
            SampleType::U16 => Ok(self.transfer_u16_debug(input)),
        }
    }

    fn transfer_u8(&self, input: &[u8], palette_mode: PaletteMode) -> Result<(TransferOutput, bool)> {
        let count = input.len();

        if palette_mode == PaletteMode::Paletted {
            // Build a 256-entry CLUT once, then emit raw indices — this is
            // the paletted fast path spec §4.2/§4.3 describes for the
            // LUMINANCE/fragment-program palette upload route. `resolve_color`
            // already covers both the predefined-gradient and user-colour-map
            // cases, so this fires for either.
            let mut entries = vec![[0u8; 4]; 256];
            for (i, entry) in entries.iter_mut().enumerate() {
                let s_prime = self.remapped(i as i32, 8);
                *entry = if i == 0 || !self.in_opaque_window(s_prime) {
                    [0, 0, 0, 0]
                } else {
                    self.apply_alpha_policy(self.resolve_color(s_prime)?)
                };
            }
            let clut = ColorLookupTable::new(entries);
            let invisible = input.iter().all(|&s| clut.get(s as usize) == Some([0, 0, 0, 0]));
            return Ok((TransferOutput::Paletted { indices: input.to_vec(), clut }, invisible));
        }

        let mut out = vec![0u8; count * 4];
        let mut invisible = true;
        for (j, &s) in input.iter().enumerate() {
            let s_prime = self.remapped(i32::from(s), 8);
            let rgba = if s == 0 || !self.in_opaque_window(s_prime) {
                [0, 0, 0, 0]
            } else {
                self.apply_alpha_policy(self.resolve_color(s_prime)?)
            };
            if rgba[3] != 0 {
                invisible = false;
            }
            out[j * 4..j * 4 + 4].copy_from_slice(&rgba);
        }
        Ok((TransferOutput::Rgba(out), invisible))
    }

    /// U16 input has no well-defined mapping in the source engine (spec §9
    /// Open Question 1 — marked as a placeholder there too). This
    /// reproduces that documented debug mapping exactly: `R=0`, `G=low
    /// byte`, `B=high byte`, `A=255` if the sample is nonzero else `0`.
    /// Callers needing a real transfer on U16 data must pre-quantise to U8.
    fn transfer_u16_debug(&self, input: &[u8]) -> (TransferOutput, bool) {
        let samples = input.len() / 2;
        let mut out = vec![0u8; samples * 4];
        let mut invisible = true;
        for j in 0..samples {
            let lo = input[j * 2];
            let hi = input[j * 2 + 1];
            let nonzero = lo != 0 || hi != 0;
            let a = if nonzero { 255 } else { 0 };
            if a != 0 {
                invisible = false;
            }
            out[j * 4] = 0;
            out[j * 4 + 1] = lo;
            out[j * 4 + 2] = hi;
            out[j * 4 + 3] = a;
        }
        (TransferOutput::Rgba(out), invisible)
    }

    fn in_opaque_window(&self, value: i32) -> bool {
        value >= self.opaque_lo && value <= self.opaque_hi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grey_round_trip_matches_spec_property_4() {
        let mut tf = TransferFunction::new();
        tf.remap(0, 255).unwrap();
        let input: Vec<u8> = (0..=255).collect();
        let (out, _) = tf.transfer(&input, SampleType::U8, PaletteMode::Rgba).unwrap();
        let TransferOutput::Rgba(buf) = out else { panic!("expected rgba") };
        assert_eq!(&buf[0..4], &[0, 0, 0, 0]);
        for v in 1u32..=255 {
            let px = &buf[v as usize * 4..v as usize * 4 + 4];
            assert_eq!(px, &[v as u8; 4]);
        }
    }

    #[test]
    fn opacity_window_blanks_outside_range() {
        let mut tf = TransferFunction::new();
        tf.remap(2, 5).unwrap();
        let (out, _) = tf.transfer(&[3], SampleType::U8, PaletteMode::Rgba).unwrap();
        let TransferOutput::Rgba(buf) = out else { panic!() };
        assert_eq!(&buf, &[3, 3, 3, 3]);

        let (out, invisible) = tf.transfer(&[6], SampleType::U8, PaletteMode::Rgba).unwrap();
        let TransferOutput::Rgba(buf) = out else { panic!() };
        assert_eq!(&buf, &[0, 0, 0, 0]);
        assert!(invisible);
    }

    #[test]
    fn remap_rejects_lo_greater_than_hi() {
        let mut tf = TransferFunction::new();
        assert!(tf.remap(10, 5).is_err());
    }

    #[test]
    fn node_id_changes_on_every_mutation() {
        let mut tf = TransferFunction::new();
        let id0 = tf.node_id();
        tf.remap(0, 100).unwrap();
        assert_ne!(tf.node_id(), id0);
        let id1 = tf.node_id();
        tf.set_shift(1);
        assert_ne!(tf.node_id(), id1);
    }

    #[test]
    fn user_colormap_out_of_range_errors() {
        let mut tf = TransferFunction::new();
        tf.set_predef_color_map(PredefinedGradient::None);
        tf.set_color_map(ColorMapType::Alpha, vec![1.0, 1.0]);
        tf.remap(0, 255).unwrap();
        let err = tf.transfer(&[5], SampleType::U8, PaletteMode::Rgba).unwrap_err();
        assert!(matches!(err, RenderError::ColorMapTooSmall { .. }));
    }

    #[test]
    fn invalid_color_map_length_errors() {
        let mut tf = TransferFunction::new();
        tf.set_predef_color_map(PredefinedGradient::None);
        tf.set_color_map(ColorMapType::Rgba, vec![1.0, 1.0, 1.0]);
        tf.remap(0, 255).unwrap();
        let err = tf.transfer(&[1], SampleType::U8, PaletteMode::Rgba).unwrap_err();
        assert!(matches!(err, RenderError::InvalidColorMapType { .. }));
    }

    #[test]
    fn paletted_mode_builds_clut_under_default_predefined_gradient() {
        let mut tf = TransferFunction::new();
        tf.remap(0, 255).unwrap();
        let (out, _) = tf.transfer(&[0, 3, 200], SampleType::U8, PaletteMode::Paletted).unwrap();
        let TransferOutput::Paletted { indices, clut } = out else { panic!("expected paletted output") };
        assert_eq!(indices, vec![0, 3, 200]);
        assert_eq!(clut.get(0), Some([0, 0, 0, 0]));
        assert_eq!(clut.get(3), Some([3, 3, 3, 3]));
        assert_eq!(clut.get(200), Some([200, 200, 200, 200]));
    }

    #[test]
    fn rgba_input_passes_through() {
        let tf = TransferFunction::new();
        let input = [10u8, 20, 30, 255, 1, 2, 3, 0];
        let (out, invisible) = tf.transfer(&input, SampleType::Rgba8, PaletteMode::Rgba).unwrap();
        let TransferOutput::Rgba(buf) = out else { panic!() };
        assert_eq!(buf, input);
        assert!(!invisible);
    }

    #[test]
    fn u16_debug_mapping() {
        let tf = TransferFunction::new();
        let input = [0x34u8, 0x12, 0x00, 0x00];
        let (out, _) = tf.transfer(&input, SampleType::U16, PaletteMode::Rgba).unwrap();
        let TransferOutput::Rgba(buf) = out else { panic!() };
        assert_eq!(&buf[0..4], &[0, 0x34, 0x12, 255]);
        assert_eq!(&buf[4..8], &[0, 0, 0, 0]);
    }
}
