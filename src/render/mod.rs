//! Raster backends executing the warp fragment program.

/// Backend trait, resource handles and backend selection.
pub mod backend;
/// Software rasteriser.
pub mod cpu;
/// `wgpu` rasteriser.
#[cfg(feature = "gpu")]
pub mod gpu;
/// Warp shader source and its software twin.
pub mod shader;
