//! Node processing: cluster config, frame sources and sinks, and the per-node driver.

pub mod config;
pub mod driver;
pub mod sink;
pub mod source;

pub use config::{ClusterConfig, NodeConfig, NodePlan, NodeSettings};
pub use driver::{NodeRunner, NodeStatus, RunStats, run_cluster, run_cluster_with};
pub use sink::{EncodeConfig, FfmpegSink, FrameSink, InMemorySink};
pub use source::{FfmpegSource, FrameSource, InMemorySource};
