//! The 3D-texture rendering path: sub-cubes sliced into view-aligned
//! polygons via Sutherland–Hodgman clipping (spec §4.4, §4.5, §4.6).

pub mod clip;
pub mod subcube;
pub mod texcube;

pub use clip::box_plane_cross_section;
pub use subcube::SubCube;
pub use texcube::TexCube;
