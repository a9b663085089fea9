use std::collections::VecDeque;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::{
    foundation::core::{Fps, PixelFormat, Resolution},
    foundation::error::{DomeWarpError, DomeWarpResult},
    frame::Frame,
};

/// Producer of decoded equirectangular frames.
///
/// `Ok(None)` means "no frame available right now"; the driver decides when a run of those
/// is the end of the stream.
pub trait FrameSource {
    /// Nominal frame size, if known up front.
    fn resolution(&self) -> Option<Resolution>;

    fn next_frame(&mut self) -> DomeWarpResult<Option<Frame>>;
}

/// Stream and container properties reported by `ffprobe`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub resolution: Resolution,
    pub fps: Option<Fps>,
}

pub fn is_ffprobe_on_path() -> bool {
    Command::new("ffprobe")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn probe_video(path: &Path) -> DomeWarpResult<VideoInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
    }

    let out = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_streams"])
        .arg(path)
        .output()
        .map_err(|e| DomeWarpError::encode(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(DomeWarpError::encode(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| DomeWarpError::encode(format!("ffprobe json parse failed: {e}")))?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| DomeWarpError::encode("no video stream found"))?;
    let width = stream
        .width
        .ok_or_else(|| DomeWarpError::encode("missing video width from ffprobe"))?;
    let height = stream
        .height
        .ok_or_else(|| DomeWarpError::encode("missing video height from ffprobe"))?;
    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_ff_ratio)
        .and_then(|(n, d)| Fps::new(n, d).ok());

    Ok(VideoInfo {
        path: path.to_path_buf(),
        resolution: Resolution::new(width, height),
        fps,
    })
}

fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let (a, b) = s.split_once('/')?;
    let a = a.parse::<u32>().ok()?;
    let b = b.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

/// Decodes a video file to packed RGB frames through a system `ffmpeg` process.
pub struct FfmpegSource {
    info: VideoInfo,
    child: Child,
    stdout: Option<ChildStdout>,
    frame_bytes: usize,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> DomeWarpResult<Self> {
        let info = probe_video(path)?;
        if info.resolution.is_empty() {
            return Err(DomeWarpError::frame_validation(format!(
                "'{}' reports an empty frame size {}",
                path.display(),
                info.resolution
            )));
        }

        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(path)
            .args([
                "-f",
                "rawvideo",
                "-pix_fmt",
                PixelFormat::Rgb24.ffmpeg_name(),
                "-an",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                DomeWarpError::encode(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DomeWarpError::encode("failed to open ffmpeg stdout"))?;

        tracing::info!(path = %path.display(), size = %info.resolution, "decoding input");
        Ok(Self {
            frame_bytes: info.resolution.pixel_count() * PixelFormat::Rgb24.bytes_per_pixel(),
            info,
            child,
            stdout: Some(stdout),
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn close(&mut self) {
        drop(self.stdout.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl FrameSource for FfmpegSource {
    fn resolution(&self) -> Option<Resolution> {
        Some(self.info.resolution)
    }

    fn next_frame(&mut self) -> DomeWarpResult<Option<Frame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };
        let mut data = vec![0u8; self.frame_bytes];
        let mut filled = 0;
        while filled < data.len() {
            match stdout.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(DomeWarpError::encode(format!(
                        "failed to read from ffmpeg: {e}"
                    )));
                }
            }
        }
        if filled < data.len() {
            if filled > 0 {
                tracing::warn!(filled, expected = data.len(), "dropping truncated final frame");
            }
            self.close();
            return Ok(None);
        }
        let r = self.info.resolution;
        Frame::from_raw(
            r.width,
            r.height,
            PixelFormat::Rgb24,
            r.width as usize * 3,
            data,
        )
        .map(Some)
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Scripted source; `None` entries simulate transient "no frame" reads.
#[derive(Debug, Default)]
pub struct InMemorySource {
    resolution: Option<Resolution>,
    script: VecDeque<Option<Frame>>,
}

impl InMemorySource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        let script: VecDeque<Option<Frame>> = frames.into_iter().map(Some).collect();
        let resolution = script.iter().flatten().next().map(Frame::resolution);
        Self { resolution, script }
    }

    /// Append one empty read.
    pub fn push_gap(&mut self) {
        self.script.push_back(None);
    }

    pub fn push_frame(&mut self, frame: Frame) {
        if self.resolution.is_none() {
            self.resolution = Some(frame.resolution());
        }
        self.script.push_back(Some(frame));
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl FrameSource for InMemorySource {
    fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    fn next_frame(&mut self) -> DomeWarpResult<Option<Frame>> {
        Ok(self.script.pop_front().flatten())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/source.rs"]
mod tests;
