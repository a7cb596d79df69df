//! Volume Data Model
//!
//! CPU-side description of a volumetric dataset: dimensions, sample type,
//! the external [`VoxelSource`] contract a caller implements to hand voxel
//! bytes to the engine, and [`VoxelChunk`], the scratch buffer used while
//! cutting sub-pages and sub-cubes out of it.

pub mod chunk;
pub mod source;

pub use chunk::VoxelChunk;
pub use source::{Axis, BoxUv, SampleType, VolumeId, VoxelSource};
