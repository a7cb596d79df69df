//! Volux: a paged voxel cache and slice/sub-cube renderer for large
//! volumetric datasets.
//!
//! The crate owns nothing about where voxels come from or how a scene is
//! assembled — callers implement [`volume::VoxelSource`] and drive rendering
//! through a [`renderer::Renderer`]. Everything in between (tiling a slice or
//! the whole volume into power-of-two textures, applying a transfer
//! function, interning GPU textures across scene nodes, evicting the
//! least-recently-used tile when a budget is exceeded) is this crate's job.
//!
//! ```text
//! volume      — the external VoxelSource contract + VoxelChunk sample blocks
//! resources   — colour-lookup tables, the transfer function, the texture registry
//! render2d    — the ortho-slice / oblique-quad path: SubPage, TexPage, SliceCache
//! render3d    — the 3D-texture path: SubCube, TexCube, Sutherland-Hodgman clipping
//! renderer    — VolumeManager (the cache) and Renderer (the public entry point)
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::too_many_arguments
)]

pub mod errors;
pub mod render2d;
pub mod render3d;
pub mod renderer;
pub mod resources;
pub mod utils;
pub mod volume;

pub use errors::{RenderError, Result};
pub use render2d::{SliceCache, SubPage, TexPage};
pub use render3d::{SubCube, TexCube};
pub use renderer::{GfxContext, GpuContextId, Interpolation, Renderer, RendererSettings, VolumeManager};
pub use resources::{
    AlphaPolicy, ColorLookupTable, ColorMapType, PaletteMode, PredefinedGradient, TransferFunction, TransferOutput,
};
pub use volume::chunk::VoxelChunk;
pub use volume::source::{Axis, BoxUv, BoxXyz, SampleType, VolumeId, VoxelSource};
