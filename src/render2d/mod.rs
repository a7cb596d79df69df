//! The 2D (ortho-slice) rendering path: a volume sliced along one axis,
//! decomposed into power-of-two tiles, each a cached [`TextureObject`]
//! (spec §4.4, §4.5, §4.6).
//!
//! [`TextureObject`]: crate::resources::texture::TextureObject

pub mod slice_cache;
pub mod subpage;
pub mod texpage;

pub use slice_cache::SliceCache;
pub use subpage::SubPage;
pub use texpage::TexPage;
