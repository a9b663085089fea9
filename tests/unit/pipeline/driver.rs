use std::path::{Path, PathBuf};

use super::*;
use crate::{
    calibration::warp_file::write_warp_file,
    decimate::DecimationConfig,
    foundation::core::PixelFormat,
    pipeline::sink::InMemorySink,
    pipeline::source::InMemorySource,
    render::backend::{Readback, TargetId, TextureId, WarpDraw},
    render::cpu::CpuRasterBackend,
    warp::map::{WarpMap, WarpPixel},
};
use glam::Vec3;

fn fixture_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("unit_driver").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn forward_map(w: u32, h: u32) -> WarpMap {
    WarpMap::filled(w, h, WarpPixel::new(Vec3::new(0.0, 0.0, -1.0), 1.0)).unwrap()
}

/// Two projectors: 4x2 and 2x2, both looking straight ahead.
fn calibrated_dir(name: &str) -> PathBuf {
    let dir = fixture_dir(name);
    write_warp_file(&dir.join("p0.bin"), &forward_map(4, 2)).unwrap();
    write_warp_file(&dir.join("p1.bin"), &forward_map(2, 2)).unwrap();
    std::fs::write(
        dir.join("node-a.txt"),
        "id 1\nfilepath C:\\calib\\p0.bin\nwidth 4\nheight 2\nactive 1\n\
         id 2\nfilepath p1.bin\nwidth 2\nheight 2\n",
    )
    .unwrap();
    dir
}

fn plan(dir: &Path) -> NodePlan {
    let mut plan = NodePlan::with_defaults("node-a", dir, "in.mp4", "out.mp4");
    plan.decimation = DecimationConfig::disabled();
    plan.max_empty_reads = 3;
    plan
}

#[test]
fn warps_composes_and_skips_bad_frames() {
    let dir = calibrated_dir("warped");
    let mut source = InMemorySource::new([
        Frame::solid_rgb(16, 8, [200, 100, 50]),
        Frame::solid_rgb(16, 8, [200, 100, 50]),
    ]);
    source.push_gap();
    source.push_frame(Frame::new(0, 8, PixelFormat::Rgb24));
    source.push_gap();
    source.push_gap();
    source.push_frame(Frame::solid_rgb(16, 8, [200, 100, 50]));
    let mut sink = InMemorySink::new();

    let stats = NodeRunner::new().run(&plan(&dir), &mut source, &mut sink);

    assert_eq!(stats.status, NodeStatus::Completed, "{:?}", stats.error);
    assert_eq!(stats.projectors, 2);
    assert_eq!(stats.frames_read, 4);
    assert_eq!(stats.frames_skipped, 1);
    assert_eq!(stats.frames_written, 3);
    assert_eq!(stats.empty_reads, 3 + 3);
    assert_eq!(stats.output_size, Some(Resolution::new(8, 2)));
    assert_eq!(stats.decimated, vec![Resolution::new(4, 2), Resolution::new(2, 2)]);
    assert!(sink.finished);
    for frame in &sink.frames {
        assert_eq!(frame.resolution(), Resolution::new(8, 2));
        assert!(frame.data().chunks_exact(3).all(|px| px == [200, 100, 50]));
    }
}

#[test]
fn missing_calibration_passes_frames_through() {
    let dir = fixture_dir("passthrough");
    let input = Frame::solid_rgb(6, 3, [1, 2, 3]);
    let mut source = InMemorySource::new([input.clone(), input.clone()]);
    let mut sink = InMemorySink::new();

    let stats = NodeRunner::new().run(&plan(&dir), &mut source, &mut sink);

    assert_eq!(stats.status, NodeStatus::PassThrough);
    assert!(stats.is_success());
    assert_eq!(sink.frames, vec![input.clone(), input]);
}

#[test]
fn unusable_calibration_aborts_without_reading() {
    let dir = fixture_dir("unusable");
    std::fs::write(dir.join("node-a.txt"), "id 0\nfilepath gone.bin\nwidth 2\nheight 2\n").unwrap();
    let mut source = InMemorySource::new([Frame::solid_rgb(4, 2, [0, 0, 0])]);
    let mut sink = InMemorySink::new();

    let stats = NodeRunner::new().run(&plan(&dir), &mut source, &mut sink);

    assert_eq!(stats.status, NodeStatus::Aborted);
    assert!(stats.error.as_deref().unwrap_or("").contains("calibration parse error"));
    assert_eq!(source.remaining(), 1);
    assert!(sink.finished);
}

fn no_backend(_: BackendKind) -> DomeWarpResult<Box<dyn RasterBackend>> {
    Err(DomeWarpError::gpu_init("no gpu adapter available"))
}

#[test]
fn backend_failure_aborts_node() {
    let dir = calibrated_dir("no_backend");
    let mut source = InMemorySource::new([Frame::solid_rgb(16, 8, [9, 9, 9])]);
    let mut sink = InMemorySink::new();

    let stats =
        NodeRunner::with_backend_factory(no_backend).run(&plan(&dir), &mut source, &mut sink);

    assert_eq!(stats.status, NodeStatus::Aborted);
    assert_eq!(stats.frames_written, 0);
    assert!(sink.finished);
}

/// CPU backend whose third draw fails.
struct FlakyBackend {
    inner: CpuRasterBackend,
    draws_left: u32,
}

impl RasterBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }
    fn create_input_texture(&mut self, size: Resolution) -> DomeWarpResult<TextureId> {
        self.inner.create_input_texture(size)
    }
    fn upload_input(&mut self, texture: TextureId, frame: &Frame) -> DomeWarpResult<()> {
        self.inner.upload_input(texture, frame)
    }
    fn create_warp_texture(&mut self, warp: &WarpMap) -> DomeWarpResult<TextureId> {
        self.inner.create_warp_texture(warp)
    }
    fn create_target(&mut self, size: Resolution) -> DomeWarpResult<TargetId> {
        self.inner.create_target(size)
    }
    fn draw_warp(&mut self, draw: &WarpDraw) -> DomeWarpResult<()> {
        if self.draws_left == 0 {
            return Err(DomeWarpError::transform("device lost"));
        }
        self.draws_left -= 1;
        self.inner.draw_warp(draw)
    }
    fn flush(&mut self) -> DomeWarpResult<()> {
        self.inner.flush()
    }
    fn read_target(&mut self, target: TargetId) -> DomeWarpResult<Readback> {
        self.inner.read_target(target)
    }
    fn release_texture(&mut self, texture: TextureId) {
        self.inner.release_texture(texture)
    }
    fn release_target(&mut self, target: TargetId) {
        self.inner.release_target(target)
    }
    fn live_resources(&self) -> usize {
        self.inner.live_resources()
    }
}

fn flaky(_: BackendKind) -> DomeWarpResult<Box<dyn RasterBackend>> {
    Ok(Box::new(FlakyBackend {
        inner: CpuRasterBackend::new(),
        // Two projectors: one frame costs two draws.
        draws_left: 4,
    }))
}

#[test]
fn transform_failure_keeps_written_frames() {
    let dir = calibrated_dir("flaky");
    let mut source = InMemorySource::new((0..5).map(|_| Frame::solid_rgb(16, 8, [5, 5, 5])));
    let mut sink = InMemorySink::new();

    let stats = NodeRunner::with_backend_factory(flaky).run(&plan(&dir), &mut source, &mut sink);

    assert_eq!(stats.status, NodeStatus::Aborted);
    assert!(stats.error.as_deref().unwrap_or("").contains("device lost"));
    assert_eq!(stats.frames_written, 2);
    assert_eq!(sink.frames.len(), 2);
    assert!(sink.finished);
}

#[test]
fn cluster_run_continues_past_failing_nodes() {
    let dir = calibrated_dir("cluster");
    let config = ClusterConfig::from_json_str(&format!(
        r#"{{
            "calibration_dir": {dir:?},
            "input": "in.mp4",
            "output_dir": "out",
            "defaults": {{ "decimate": false, "max_empty_reads": 2 }},
            "nodes": [
                {{ "hostname": "broken" }},
                {{ "hostname": "node-a" }},
                {{ "hostname": "node-z" }}
            ]
        }}"#,
        dir = dir.to_string_lossy()
    ))
    .unwrap();

    let stats = run_cluster_with(&config, &NodeRunner::new(), |plan| {
        if plan.hostname == "broken" {
            return Err(DomeWarpError::encode("cannot open input"));
        }
        let source = InMemorySource::new([Frame::solid_rgb(8, 4, [7, 7, 7])]);
        Ok((Box::new(source), Box::new(InMemorySink::new())))
    });

    let status: Vec<_> = stats.iter().map(|s| (s.hostname.as_str(), s.status)).collect();
    assert_eq!(
        status,
        vec![
            ("broken", NodeStatus::Aborted),
            ("node-a", NodeStatus::Completed),
            ("node-z", NodeStatus::PassThrough),
        ]
    );
    assert_eq!(stats[1].frames_written, 1);
    assert_eq!(stats[2].frames_written, 1);
}
