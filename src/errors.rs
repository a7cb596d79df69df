//! Error Types
//!
//! This module defines the error type used throughout the engine.
//!
//! # Overview
//!
//! [`RenderError`] covers every failure mode described by the cache and
//! renderer design: bad parameters, out-of-bounds sub-region requests, GPU
//! resource exhaustion, transfer-function colour-map mismatches, and the
//! handful of conditions that indicate an engine bug rather than bad input.
//!
//! # Propagation
//!
//! Errors raised while building a single tile (`OutOfBounds`,
//! `GpuResourceExhausted`) never abort an in-progress render: the caller
//! downgrades that one tile to empty and keeps going. Errors raised during
//! setup (`Unsupported`, `BadParameter`, an absent volume) abort the whole
//! render call. `InvariantViolation` indicates corrupted internal state and
//! is not expected to be recoverable.

use thiserror::Error;

/// The error type for the Volux engine.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A parameter was out of its valid range (non-power-of-two tile size,
    /// out-of-range slice index, an opaque window with `lo > hi`, ...).
    /// State is left unchanged.
    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// A requested sub-region falls outside the source volume's dimensions.
    /// Fatal for the single request; the render loop skips the tile.
    #[error("sub-region out of bounds: {0}")]
    OutOfBounds(String),

    /// A GPU texture upload failed. The owning `SubPage`/`SubCube` falls
    /// back to an empty texture so geometry still rasterises.
    #[error("GPU resource exhausted: {0}")]
    GpuResourceExhausted(String),

    /// An internal invariant was violated (corrupt linked list, null slice
    /// in a non-empty axis, ...). These indicate engine bugs.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The requested sample type is not one of `{U8, U16, Rgba8}`.
    #[error("unsupported sample type: {0}")]
    Unsupported(String),

    /// The transfer function's user colour map is too short for the
    /// (shifted, offset) sample index it was asked to resolve.
    #[error("color map too small: index {index} exceeds length {len}")]
    ColorMapTooSmall {
        /// The computed, out-of-range index.
        index: u32,
        /// The length of the user colour map.
        len: usize,
    },

    /// The user colour map's length is not evenly divisible by the channel
    /// count implied by its `ColorMapType`.
    #[error("invalid color map: length {len} not divisible by {channels} channels")]
    InvalidColorMapType {
        /// The colour map's length.
        len: usize,
        /// The channel count implied by `ColorMapType`.
        channels: usize,
    },

    /// No volume is currently bound to the manager.
    #[error("no volume bound")]
    NoVolume,
}

/// Alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;
