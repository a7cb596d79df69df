//! The external voxel-source contract.
//!
//! Reading voxels off disk, decoding whatever file format a dataset ships
//! in, and subsetting/resampling are all out of scope for this crate (see
//! spec §1 Non-goals). [`VoxelSource`] is the one seam a caller must
//! implement: "hand me dimensions, a sample type, and raw bytes for any
//! axis-aligned sub-region."

use glam::Vec3;

use crate::errors::Result;

/// One of the three axes a volume can be sliced along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The two dimensions, from `(Dx, Dy, Dz)`, that form a slice's in-plane
    /// `(u, v)` axes for this slicing axis: X → (z,y), Y → (x,z), Z → (x,y).
    #[must_use]
    pub fn in_plane_dims(self, dims: (u32, u32, u32)) -> (u32, u32) {
        let (dx, dy, dz) = dims;
        match self {
            Axis::X => (dz, dy),
            Axis::Y => (dx, dz),
            Axis::Z => (dx, dy),
        }
    }

    /// The extent of the volume along this slicing axis (`D_A`).
    #[must_use]
    pub fn extent(self, dims: (u32, u32, u32)) -> u32 {
        match self {
            Axis::X => dims.0,
            Axis::Y => dims.1,
            Axis::Z => dims.2,
        }
    }

    /// The `(tu, tv)` slice tile size implied by the global `(tx, ty, tz)`
    /// tile triple, using the same axis → in-plane mapping as
    /// [`in_plane_dims`](Self::in_plane_dims). This is what ties a page-size
    /// change on one component of `(tx,ty,tz)` to exactly the axes whose
    /// geometry depends on it (spec §4.6: "X-axis depends on (tz,ty), Y on
    /// (tx,tz), Z on (tx,ty)").
    #[must_use]
    pub fn in_plane_tile_size(self, tile_xyz: (u32, u32, u32)) -> (u32, u32) {
        self.in_plane_dims(tile_xyz)
    }
}

/// Raw voxel sample format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    U8,
    U16,
    Rgba8,
}

impl SampleType {
    /// Bytes occupied by one sample of this type.
    #[must_use]
    pub fn unit_size(self) -> u32 {
        match self {
            SampleType::U8 => 1,
            SampleType::U16 => 2,
            SampleType::Rgba8 => 4,
        }
    }
}

/// A rectangular `(u,v)` sub-region within a slice, in voxel coordinates.
/// Mirrors the `box_uv: i16×4` external contract (spec §6.1) but uses `i32`
/// internally to keep arithmetic simple; callers crossing the FFI-shaped
/// boundary narrow to `i16` there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxUv {
    pub umin: i32,
    pub umax: i32,
    pub vmin: i32,
    pub vmax: i32,
}

impl BoxUv {
    #[must_use]
    pub fn new(umin: i32, umax: i32, vmin: i32, vmax: i32) -> Self {
        Self { umin, umax, vmin, vmax }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        (self.umax - self.umin).max(0) as u32
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        (self.vmax - self.vmin).max(0) as u32
    }
}

/// A rectangular `(x,y,z)` sub-region within the volume, in voxel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxXyz {
    pub xmin: i32,
    pub xmax: i32,
    pub ymin: i32,
    pub ymax: i32,
    pub zmin: i32,
    pub zmax: i32,
}

impl BoxXyz {
    #[must_use]
    pub fn dims(&self) -> (u32, u32, u32) {
        (
            (self.xmax - self.xmin).max(0) as u32,
            (self.ymax - self.ymin).max(0) as u32,
            (self.zmax - self.zmin).max(0) as u32,
        )
    }
}

/// Identity of a volume, used to invalidate derived caches when the
/// underlying data changes out from under the engine (spec §3 Lifecycle).
/// A `VoxelSource` implementation bumps this whenever its content changes,
/// the same way `SoNode::touch()` bumps a node-id in the source engine.
pub type VolumeId = u64;

/// The external contract a caller implements to expose a volumetric dataset.
///
/// Everything this crate does downstream (chunking, transfer functions,
/// texture upload, caching) is driven entirely through this trait; reading
/// files, decoding formats, and resampling/subsetting volumes are the
/// caller's responsibility (spec §1 Non-goals / Out of scope).
pub trait VoxelSource: Send + Sync {
    /// Identity of the current data. Must change whenever the voxel content
    /// changes, so the engine can invalidate its per-slice caches.
    fn id(&self) -> VolumeId;

    /// Volume dimensions in voxels, `(Dx, Dy, Dz)`.
    fn dims(&self) -> (u32, u32, u32);

    /// Raw sample format.
    fn sample_type(&self) -> SampleType;

    /// World-space bounding box, `(min, max)`.
    fn world_bbox(&self) -> (Vec3, Vec3);

    /// Writes one axis-aligned 2D sub-slice's samples into `out`, in the
    /// slice's `(u, v)` row-major order. `out` must be at least
    /// `box_uv.width() * box_uv.height() * sample_type().unit_size()` bytes.
    fn get_sub_slice(&self, axis: Axis, slice_idx: i32, box_uv: BoxUv, out: &mut [u8]) -> Result<()>;

    /// Writes one axis-aligned 3D sub-cube's samples into `out`, row-major
    /// in `(x, y, z)` order within the sub-cube.
    fn get_sub_cube(&self, box_xyz: BoxXyz, out: &mut [u8]) -> Result<()>;

    /// Size of the backing data in bytes, if known (e.g. file size for a
    /// disk-backed source). `Err` if the source cannot report one.
    fn file_size(&self) -> Result<i64>;
}
