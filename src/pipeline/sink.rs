use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::{
    foundation::core::{Fps, PixelFormat, Resolution},
    foundation::error::{DomeWarpError, DomeWarpResult},
    frame::Frame,
};

/// Consumer of processed node frames.
pub trait FrameSink {
    /// Append one frame. All frames of a run share one size.
    fn write_frame(&mut self, frame: &Frame) -> DomeWarpResult<()>;

    /// Flush and close the output. Frames already written are kept even when the run was
    /// aborted.
    fn finish(&mut self) -> DomeWarpResult<()>;

    fn frames_written(&self) -> u64;
}

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub out_path: PathBuf,
    pub fps: Fps,
    /// x264 constant rate factor.
    pub crf: u32,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn validate(&self) -> DomeWarpResult<()> {
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(DomeWarpError::validation("encode fps must be non-zero"));
        }
        if self.crf > 51 {
            return Err(DomeWarpError::validation(format!(
                "encode crf must be <= 51, got {}",
                self.crf
            )));
        }
        Ok(())
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> DomeWarpResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

struct Encoder {
    size: Resolution,
    child: Child,
    stdin: Option<ChildStdin>,
}

/// H.264 MP4 writer piping packed RGB into a system `ffmpeg`.
///
/// The process starts on the first frame, once the frame size is known. Odd sizes are padded
/// to even for yuv420p.
pub struct FfmpegSink {
    cfg: EncodeConfig,
    encoder: Option<Encoder>,
    frames: u64,
    finished: bool,
}

impl FfmpegSink {
    pub fn new(cfg: EncodeConfig) -> DomeWarpResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;
        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(DomeWarpError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(DomeWarpError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }
        Ok(Self {
            cfg,
            encoder: None,
            frames: 0,
            finished: false,
        })
    }

    fn spawn(&self, size: Resolution) -> DomeWarpResult<Encoder> {
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if self.cfg.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            PixelFormat::Rgb24.ffmpeg_name(),
            "-s",
            &size.to_string(),
            "-r",
            &self.cfg.fps.to_ffmpeg_arg(),
            "-i",
            "pipe:0",
            "-an",
            "-vf",
            "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-c:v",
            "libx264",
            "-crf",
            &self.cfg.crf.to_string(),
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ])
        .arg(&self.cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            DomeWarpError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DomeWarpError::encode("failed to open ffmpeg stdin"))?;
        tracing::info!(out = %self.cfg.out_path.display(), size = %size, "encoding output");
        Ok(Encoder {
            size,
            child,
            stdin: Some(stdin),
        })
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> DomeWarpResult<()> {
        if self.finished {
            return Err(DomeWarpError::encode("ffmpeg sink is already finalized"));
        }
        if self.encoder.is_none() {
            self.encoder = Some(self.spawn(frame.resolution())?);
        }
        let Some(enc) = self.encoder.as_mut() else {
            return Err(DomeWarpError::encode("ffmpeg encoder is not running"));
        };
        if frame.resolution() != enc.size {
            return Err(DomeWarpError::validation(format!(
                "frame size mismatch: got {}, expected {}",
                frame.resolution(),
                enc.size
            )));
        }
        let Some(stdin) = enc.stdin.as_mut() else {
            return Err(DomeWarpError::encode("ffmpeg encoder is already finalized"));
        };

        let rgb;
        let frame = if frame.format() == PixelFormat::Rgb24 {
            frame
        } else {
            rgb = frame.converted(PixelFormat::Rgb24);
            &rgb
        };
        for y in 0..frame.height() {
            stdin.write_all(frame.row(y)).map_err(|e| {
                DomeWarpError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
            })?;
        }
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> DomeWarpResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let Some(mut enc) = self.encoder.take() else {
            tracing::warn!(
                out = %self.cfg.out_path.display(),
                "no frames written, nothing encoded"
            );
            return Ok(());
        };
        drop(enc.stdin.take());

        let output = enc.child.wait_with_output().map_err(|e| {
            DomeWarpError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DomeWarpError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!(error = %e, "ffmpeg sink finalization failed on drop");
        }
    }
}

/// Collects frames in memory.
#[derive(Debug, Default)]
pub struct InMemorySink {
    pub frames: Vec<Frame>,
    pub finished: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for InMemorySink {
    fn write_frame(&mut self, frame: &Frame) -> DomeWarpResult<()> {
        if self.finished {
            return Err(DomeWarpError::encode("sink is already finalized"));
        }
        if let Some(first) = self.frames.first()
            && first.resolution() != frame.resolution()
        {
            return Err(DomeWarpError::validation(format!(
                "frame size mismatch: got {}, expected {}",
                frame.resolution(),
                first.resolution()
            )));
        }
        self.frames.push(frame.to_tight());
        Ok(())
    }

    fn finish(&mut self) -> DomeWarpResult<()> {
        self.finished = true;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames.len() as u64
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/sink.rs"]
mod tests;
