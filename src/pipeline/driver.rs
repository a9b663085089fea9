//! Per-node processing loop and its failure policy.
//!
//! - Missing calibration: the node falls back to pass-through and forwards frames unchanged.
//! - Zero-sized source frames are skipped with a warning.
//! - GPU initialization or transform failures abort the node; frames already handed to the
//!   sink are kept.
//! - A run of `max_empty_reads` consecutive empty reads ends the stream.

use crate::{
    calibration::loader::{CalibrationLoader, LoadedProjector},
    composite::Compositor,
    foundation::core::Resolution,
    foundation::error::{DomeWarpError, DomeWarpResult},
    frame::Frame,
    pipeline::config::{ClusterConfig, NodePlan},
    pipeline::sink::{EncodeConfig, FfmpegSink, FrameSink},
    pipeline::source::{FfmpegSource, FrameSource},
    render::backend::{BackendKind, RasterBackend, create_backend},
    transform::ProjectionTransformer,
    warp::map::WarpMap,
};

/// How a node run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Completed,
    /// No calibration: input forwarded unchanged.
    PassThrough,
    /// Stopped early; see [`RunStats::error`].
    Aborted,
}

/// Counters and outcome of one node run.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RunStats {
    pub hostname: String,
    pub status: NodeStatus,
    pub projectors: usize,
    pub decimated: Vec<Resolution>,
    pub output_size: Option<Resolution>,
    pub frames_read: u64,
    pub frames_written: u64,
    pub frames_skipped: u64,
    pub empty_reads: u64,
    pub error: Option<String>,
}

impl RunStats {
    fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_owned(),
            status: NodeStatus::Completed,
            projectors: 0,
            decimated: Vec::new(),
            output_size: None,
            frames_read: 0,
            frames_written: 0,
            frames_skipped: 0,
            empty_reads: 0,
            error: None,
        }
    }

    fn abort(&mut self, e: &DomeWarpError) {
        self.status = NodeStatus::Aborted;
        self.error = Some(e.to_string());
    }

    pub fn is_success(&self) -> bool {
        self.status != NodeStatus::Aborted
    }
}

pub type BackendFactory = fn(BackendKind) -> DomeWarpResult<Box<dyn RasterBackend>>;

/// Runs nodes one at a time; all GPU work of a node stays on the calling thread.
#[derive(Clone, Copy, Debug)]
pub struct NodeRunner {
    backend_factory: BackendFactory,
}

impl Default for NodeRunner {
    fn default() -> Self {
        Self {
            backend_factory: create_backend,
        }
    }
}

struct NodeTransform {
    pending: Vec<WarpMap>,
    transformers: Vec<ProjectionTransformer>,
    compositor: Option<Compositor>,
}

impl NodeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom backend constructor instead of [`create_backend`].
    pub fn with_backend_factory(backend_factory: BackendFactory) -> Self {
        Self { backend_factory }
    }

    /// Process one node from `source` into `sink`. Never panics on node-level failures;
    /// they are reported through [`RunStats`]. The sink is always finished.
    #[tracing::instrument(skip_all, fields(host = %plan.hostname))]
    pub fn run(
        &self,
        plan: &NodePlan,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
    ) -> RunStats {
        let mut stats = RunStats::new(&plan.hostname);
        let loader = CalibrationLoader::new(&plan.calibration_dir);

        match loader.load_projectors(&plan.hostname) {
            Ok(projectors) => self.run_warped(plan, projectors, source, sink, &mut stats),
            Err(DomeWarpError::CalibrationNotFound(msg)) => {
                tracing::warn!(reason = %msg, "no calibration, passing input through");
                stats.status = NodeStatus::PassThrough;
                if let Err(e) = pump(plan, source, sink, &mut stats, |f| Ok(f.to_tight())) {
                    stats.abort(&e);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "calibration unusable, node skipped");
                stats.abort(&e);
            }
        }

        if let Err(e) = sink.finish() {
            tracing::error!(error = %e, "failed to finalize output");
            if stats.error.is_none() {
                stats.abort(&e);
            }
        }
        stats.frames_written = sink.frames_written();
        tracing::info!(
            status = ?stats.status,
            written = stats.frames_written,
            skipped = stats.frames_skipped,
            "node finished"
        );
        stats
    }

    fn run_warped(
        &self,
        plan: &NodePlan,
        projectors: Vec<LoadedProjector>,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        stats: &mut RunStats,
    ) {
        stats.projectors = projectors.len();
        let mut backend = match (self.backend_factory)(plan.backend) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "raster backend unavailable, node aborted");
                stats.abort(&e);
                return;
            }
        };

        // Transformers are built on the first valid frame, once the input size is known.
        let mut node = NodeTransform {
            pending: projectors.into_iter().map(|p| p.warp).collect(),
            transformers: Vec::new(),
            compositor: None,
        };

        let result = pump(plan, source, sink, stats, |frame| {
            let backend = backend.as_mut();
            if node.compositor.is_none() {
                for warp in node.pending.drain(..) {
                    node.transformers.push(ProjectionTransformer::new(
                        warp,
                        frame.resolution(),
                        plan.decimation,
                    ));
                }
                for t in &mut node.transformers {
                    t.initialize(backend)?;
                }
                let compositor = Compositor::for_transformers(&node.transformers)?;
                tracing::info!(
                    backend = backend.name(),
                    projectors = node.transformers.len(),
                    output = %compositor.layout().resolution(),
                    "node transform ready"
                );
                node.compositor = Some(compositor);
            }
            let Some(compositor) = node.compositor.as_ref() else {
                return Err(DomeWarpError::transform("compositor missing"));
            };
            compositor.compose_from_transformers(backend, &mut node.transformers, frame)
        });

        stats.decimated = node
            .transformers
            .iter()
            .map(ProjectionTransformer::decimated_resolution)
            .collect();
        for t in &mut node.transformers {
            t.close(backend.as_mut());
        }
        if let Err(e) = result {
            tracing::error!(error = %e, "node aborted");
            stats.abort(&e);
        }
    }
}

/// Pull frames until end of stream, apply `process` and push the results.
fn pump(
    plan: &NodePlan,
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    stats: &mut RunStats,
    mut process: impl FnMut(&Frame) -> DomeWarpResult<Frame>,
) -> DomeWarpResult<()> {
    let mut consecutive_empty = 0u32;
    loop {
        let Some(frame) = source.next_frame()? else {
            stats.empty_reads += 1;
            consecutive_empty += 1;
            if consecutive_empty >= plan.max_empty_reads {
                tracing::debug!(consecutive_empty, "end of stream");
                return Ok(());
            }
            continue;
        };
        consecutive_empty = 0;
        stats.frames_read += 1;

        if let Err(e) = validate_frame(&frame) {
            tracing::warn!(frame = stats.frames_read - 1, error = %e, "skipping frame");
            stats.frames_skipped += 1;
            continue;
        }

        let out = process(&frame)?;
        if stats.output_size.is_none() {
            stats.output_size = Some(out.resolution());
        }
        sink.write_frame(&out)?;
    }
}

fn validate_frame(frame: &Frame) -> DomeWarpResult<()> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(DomeWarpError::frame_validation(format!(
            "decoded frame has invalid size {}",
            frame.resolution()
        )));
    }
    Ok(())
}

/// Process every node of `config` with ffmpeg input and output. A failing node never stops the
/// remaining ones.
pub fn run_cluster(config: &ClusterConfig, runner: &NodeRunner) -> Vec<RunStats> {
    run_cluster_with(config, runner, |plan| {
        let source = FfmpegSource::open(&plan.input)?;
        let sink = FfmpegSink::new(EncodeConfig {
            out_path: plan.output.clone(),
            fps: plan.fps,
            crf: plan.crf,
            overwrite: true,
        })?;
        Ok((Box::new(source), Box::new(sink)))
    })
}

type NodeIo = (Box<dyn FrameSource>, Box<dyn FrameSink>);

/// [`run_cluster`] with caller-provided I/O per node.
pub fn run_cluster_with(
    config: &ClusterConfig,
    runner: &NodeRunner,
    mut open: impl FnMut(&NodePlan) -> DomeWarpResult<NodeIo>,
) -> Vec<RunStats> {
    config
        .plans()
        .iter()
        .map(|plan| match open(plan) {
            Ok((mut source, mut sink)) => runner.run(plan, source.as_mut(), sink.as_mut()),
            Err(e) => {
                tracing::error!(host = %plan.hostname, error = %e, "failed to open node I/O");
                let mut stats = RunStats::new(&plan.hostname);
                stats.abort(&e);
                stats
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/driver.rs"]
mod tests;
