//! Warp-map data model and spherical geometry.

/// Direction ↔ equirectangular UV mapping.
pub mod geometry;
/// Per-projector warp grid.
pub mod map;
