//! Warp-map driven reprojection of equirectangular video onto multi-projector domes.
//!
//! Each projector carries a calibration warp map: for every output pixel, a viewing direction
//! into the source sphere and an edge-blend alpha. A [`ProjectionTransformer`] renders one
//! projector's frame by sampling the equirectangular input along those directions, the
//! [`Compositor`] places all of a node's projector frames side by side, and the
//! [`pipeline`] driver runs that per cluster node between a decoder and an encoder.
//! [`coverage`] reports how well a set of warp maps covers the sphere.

pub mod calibration;
pub mod composite;
pub mod coverage;
pub mod decimate;
pub mod foundation;
pub mod frame;
pub mod pipeline;
pub mod render;
pub mod transform;
pub mod warp;

pub use calibration::{CalibrationLoader, NodeCalibration, ProjectorConfig};
pub use composite::{CompositeLayout, Compositor};
pub use coverage::{CoverageAnalyzer, CoverageConfig, CoverageReport, CoverageSummary, OverlapMode};
pub use decimate::{DecimationAnalyzer, DecimationConfig, DecimationResult};
pub use foundation::core::{Fps, FrameIndex, PixelFormat, Resolution};
pub use foundation::error::{DomeWarpError, DomeWarpResult};
pub use frame::Frame;
pub use pipeline::{ClusterConfig, NodePlan, NodeRunner, NodeStatus, RunStats};
pub use render::backend::{BackendKind, RasterBackend, create_backend};
pub use render::cpu::CpuRasterBackend;
#[cfg(feature = "gpu")]
pub use render::gpu::WgpuRasterBackend;
pub use transform::{ProjectionTransformer, TransformerState};
pub use warp::geometry::{direction_to_equirect_uv, equirect_uv_to_direction};
pub use warp::map::{WarpMap, WarpPixel};
