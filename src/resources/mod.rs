//! Cache-facing resource types: colour-lookup tables, the transfer
//! function, and the interned GPU texture registry.

pub mod clut;
pub mod texture;
pub mod transfer_function;

pub use clut::{ColorLookupTable, PredefinedGradient};
pub use texture::{TextureKey, TextureObject, TexturePixels};
pub use transfer_function::{AlphaPolicy, ColorMapType, PaletteMode, TransferFunction, TransferOutput};
