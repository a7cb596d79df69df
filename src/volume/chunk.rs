//! [`VoxelChunk`] — a CPU-resident rectangular block of raw voxel samples.
//!
//! A chunk is built by copying voxels out of a [`VoxelSource`] for one
//! sub-page or sub-cube, transfer-function'd into an RGBA or paletted pixel
//! buffer, and then dropped — per design note §9 ("the `VoxelChunk` used
//! during build is scoped"), the chunk itself never outlives one build.

use crate::errors::{RenderError, Result};
use crate::resources::transfer_function::{PaletteMode, TransferFunction, TransferOutput};
use crate::volume::source::{Axis, BoxUv, BoxXyz, SampleType, VoxelSource};

/// A rectangular block of raw voxel samples, owned by this chunk.
pub struct VoxelChunk {
    pub dims: (u32, u32, u32),
    pub unit_size: u32,
    pub sample_type: SampleType,
    data: Vec<u8>,
}

impl VoxelChunk {
    #[must_use]
    pub fn new(dims: (u32, u32, u32), sample_type: SampleType, data: Vec<u8>) -> Self {
        Self { dims, unit_size: sample_type.unit_size(), sample_type, data }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copies a 2D sub-page out of `source` for `axis`/`slice_idx`, per the
    /// coordinate mapping in spec §4.1: the chunk is always laid out in
    /// `(u, v)` order regardless of which world axes `u`/`v` correspond to.
    pub fn build_sub_page(
        source: &dyn VoxelSource,
        axis: Axis,
        slice_idx: i32,
        box_uv: BoxUv,
    ) -> Result<Self> {
        let (dx, dy, dz) = source.dims();
        let extent = axis.extent((dx, dy, dz));
        if slice_idx < 0 || slice_idx as u32 >= extent {
            return Err(RenderError::OutOfBounds(format!(
                "slice index {slice_idx} out of range [0, {extent})"
            )));
        }
        let (du, dv) = axis.in_plane_dims((dx, dy, dz));
        if box_uv.umin < 0
            || box_uv.vmin < 0
            || box_uv.umax as u32 > du
            || box_uv.vmax as u32 > dv
        {
            return Err(RenderError::OutOfBounds(format!(
                "sub-page box {box_uv:?} exceeds slice dims ({du}, {dv})"
            )));
        }

        let sample_type = source.sample_type();
        let unit_size = sample_type.unit_size();
        let width = box_uv.width();
        let height = box_uv.height();
        let mut data = vec![0u8; (width * height * unit_size) as usize];
        source.get_sub_slice(axis, slice_idx, box_uv, &mut data)?;

        Ok(Self::new((width, height, 1), sample_type, data))
    }

    /// Copies a 3D sub-cube out of `source`.
    pub fn build_sub_cube(source: &dyn VoxelSource, box_xyz: BoxXyz) -> Result<Self> {
        let (dx, dy, dz) = source.dims();
        if box_xyz.xmin < 0
            || box_xyz.ymin < 0
            || box_xyz.zmin < 0
            || box_xyz.xmax as u32 > dx
            || box_xyz.ymax as u32 > dy
            || box_xyz.zmax as u32 > dz
        {
            return Err(RenderError::OutOfBounds(format!(
                "sub-cube box {box_xyz:?} exceeds volume dims ({dx}, {dy}, {dz})"
            )));
        }

        let sample_type = source.sample_type();
        let unit_size = sample_type.unit_size();
        let dims = box_xyz.dims();
        let mut data = vec![0u8; (dims.0 * dims.1 * dims.2 * unit_size) as usize];
        source.get_sub_cube(box_xyz, &mut data)?;

        Ok(Self::new(dims, sample_type, data))
    }

    /// Applies `transfer_function` to every sample, producing either a
    /// paletted (indices + CLUT) or RGBA pixel buffer, per spec §4.2.
    /// Returns `invisible = true` iff every output alpha is zero, in which
    /// case the caller may discard the built texture entirely.
    pub fn transfer(
        &self,
        transfer_function: &TransferFunction,
        palette_mode: PaletteMode,
    ) -> Result<(TransferOutput, bool)> {
        transfer_function.transfer(&self.data, self.sample_type, palette_mode)
    }
}
