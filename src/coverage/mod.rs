//! Offline coverage diagnostics over a whole dome.
//!
//! Every valid warp pixel of every projector is projected into a fixed equirectangular bucket
//! grid; the resulting [`analyzer::CoverageReport`] carries projector overlap, raw pixel density
//! and spherical-area corrected density, and [`heatmap`] turns those into images.

pub mod analyzer;
pub mod heatmap;

pub use analyzer::{CoverageAnalyzer, CoverageConfig, CoverageReport, CoverageSummary, MetricStats};
pub use heatmap::{OverlapMode, color_ramp, save_heatmaps};
