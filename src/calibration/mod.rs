//! Node calibration descriptors and binary warp maps.

/// Text descriptor parsing.
pub mod descriptor;
/// Hostname → descriptor → warp-map resolution.
pub mod loader;
/// Binary warp-map files.
pub mod warp_file;

pub use descriptor::{NodeCalibration, ProjectorConfig, parse_descriptor};
pub use loader::{CalibrationLoader, LoadedProjector};
pub use warp_file::{read_warp_file, write_warp_file};
