//! Per-projector reprojection of equirectangular frames through a warp map.

use crate::{
    decimate::{DecimationAnalyzer, DecimationConfig, DecimationResult},
    foundation::core::{PixelFormat, Resolution},
    foundation::error::{DomeWarpError, DomeWarpResult},
    frame::{Frame, nearest_source_index},
    render::backend::{RasterBackend, Readback, TargetId, TextureId, WarpDraw},
    warp::map::WarpMap,
};

/// Lifecycle of a [`ProjectionTransformer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformerState {
    Uninitialized,
    Ready,
    Closed,
}

#[derive(Clone, Copy, Debug)]
struct Resources {
    input: TextureId,
    input_size: Resolution,
    warp: TextureId,
    target: TargetId,
}

impl Resources {
    fn release(self, backend: &mut dyn RasterBackend) {
        backend.release_texture(self.input);
        backend.release_texture(self.warp);
        backend.release_target(self.target);
    }
}

/// Renders one projector's output from equirectangular input frames.
///
/// Rendering always happens at the warp-map resolution; decimation is applied only when the
/// result is read back. Backend resources are acquired in [`initialize`](Self::initialize) and
/// released in [`close`](Self::close); the transformer never holds the backend itself.
#[derive(Debug)]
pub struct ProjectionTransformer {
    warp: WarpMap,
    input: Resolution,
    decimation: DecimationConfig,
    analysis: Option<DecimationResult>,
    resources: Option<Resources>,
    state: TransformerState,
}

impl ProjectionTransformer {
    pub fn new(warp: WarpMap, input: Resolution, decimation: DecimationConfig) -> Self {
        Self {
            warp,
            input,
            decimation,
            analysis: None,
            resources: None,
            state: TransformerState::Uninitialized,
        }
    }

    pub fn state(&self) -> TransformerState {
        self.state
    }

    /// Full render resolution (the warp-map size).
    pub fn output_resolution(&self) -> Resolution {
        self.warp.resolution()
    }

    /// Size of the frames returned by [`transform_frame`](Self::transform_frame).
    ///
    /// Equal to the output resolution until the transformer has been initialised.
    pub fn decimated_resolution(&self) -> Resolution {
        self.analysis
            .map(|a| a.decimated)
            .unwrap_or_else(|| self.warp.resolution())
    }

    pub fn decimation(&self) -> Option<&DecimationResult> {
        self.analysis.as_ref()
    }

    pub fn warp_map(&self) -> &WarpMap {
        &self.warp
    }

    /// Analyse decimation and allocate the input, warp and target resources.
    ///
    /// Already-acquired resources are released again when a later step fails; the transformer
    /// then stays uninitialised.
    pub fn initialize(&mut self, backend: &mut dyn RasterBackend) -> DomeWarpResult<()> {
        match self.state {
            TransformerState::Ready => return Ok(()),
            TransformerState::Closed => {
                return Err(DomeWarpError::gpu_init("transformer has been closed"));
            }
            TransformerState::Uninitialized => {}
        }

        let analysis = DecimationAnalyzer::new(self.decimation)
            .analyze(&self.warp, self.input)
            .map_err(|e| DomeWarpError::gpu_init(format!("decimation analysis failed: {e}")))?;

        let resources = acquire(backend, &self.warp, self.input)?;

        tracing::debug!(
            backend = backend.name(),
            output = %analysis.output,
            decimated = %analysis.decimated,
            "projection transformer ready"
        );
        self.analysis = Some(analysis);
        self.resources = Some(resources);
        self.state = TransformerState::Ready;
        Ok(())
    }

    /// Warp one input frame and return the (possibly decimated) RGB projector frame.
    pub fn transform_frame(
        &mut self,
        backend: &mut dyn RasterBackend,
        input: &Frame,
    ) -> DomeWarpResult<Frame> {
        if self.state != TransformerState::Ready {
            return Err(DomeWarpError::transform(format!(
                "transformer is {:?}, expected Ready",
                self.state
            )));
        }
        let (Some(mut res), Some(analysis)) = (self.resources, self.analysis) else {
            return Err(DomeWarpError::transform("transformer resources are missing"));
        };
        if input.width() == 0 || input.height() == 0 {
            return Err(DomeWarpError::transform(format!(
                "input frame has invalid dimensions {}",
                input.resolution()
            )));
        }

        if input.resolution() != res.input_size {
            tracing::debug!(
                from = %res.input_size,
                to = %input.resolution(),
                "input size changed, re-creating input texture"
            );
            backend.release_texture(res.input);
            res.input = backend
                .create_input_texture(input.resolution())
                .map_err(|e| DomeWarpError::transform(e.to_string()))?;
            res.input_size = input.resolution();
            self.resources = Some(res);
        }

        backend.upload_input(res.input, input)?;
        backend.draw_warp(&WarpDraw {
            target: res.target,
            input: res.input,
            warp: res.warp,
        })?;
        backend.flush()?;
        let readback = backend.read_target(res.target)?;

        readback_to_frame(&readback, analysis.output, analysis.decimated)
    }

    /// Release backend resources. Safe to call more than once.
    pub fn close(&mut self, backend: &mut dyn RasterBackend) {
        if let Some(res) = self.resources.take() {
            res.release(backend);
        }
        self.state = TransformerState::Closed;
    }
}

fn acquire(
    backend: &mut dyn RasterBackend,
    warp: &WarpMap,
    input: Resolution,
) -> DomeWarpResult<Resources> {
    let input_tex = backend
        .create_input_texture(input)
        .map_err(as_init_error)?;
    let warp_tex = match backend.create_warp_texture(warp) {
        Ok(id) => id,
        Err(e) => {
            backend.release_texture(input_tex);
            return Err(as_init_error(e));
        }
    };
    let target = match backend.create_target(warp.resolution()) {
        Ok(id) => id,
        Err(e) => {
            backend.release_texture(input_tex);
            backend.release_texture(warp_tex);
            return Err(as_init_error(e));
        }
    };
    Ok(Resources {
        input: input_tex,
        input_size: input,
        warp: warp_tex,
        target,
    })
}

fn as_init_error(e: DomeWarpError) -> DomeWarpError {
    match e {
        DomeWarpError::GpuInitialization(_) => e,
        other => DomeWarpError::gpu_init(other.to_string()),
    }
}

/// Flip the bottom-up readback into a top-down RGB frame, nearest-downsampling to `decimated`.
fn readback_to_frame(
    readback: &Readback,
    full: Resolution,
    decimated: Resolution,
) -> DomeWarpResult<Frame> {
    let expected = full.pixel_count() * 4;
    if readback.width != full.width
        || readback.height != full.height
        || readback.rgba.len() < expected
    {
        return Err(DomeWarpError::transform(format!(
            "readback is {}x{} ({} bytes), expected {full}",
            readback.width,
            readback.height,
            readback.rgba.len()
        )));
    }

    let mut out = Frame::new(decimated.width, decimated.height, PixelFormat::Rgb24);
    let src_row_bytes = full.width as usize * 4;
    let src_x: Vec<usize> = (0..decimated.width)
        .map(|x| nearest_source_index(x, decimated.width, full.width) as usize * 4)
        .collect();
    for y in 0..decimated.height {
        let sy = nearest_source_index(y, decimated.height, full.height);
        let r = (full.height - 1 - sy) as usize;
        let src = &readback.rgba[r * src_row_bytes..(r + 1) * src_row_bytes];
        let dst = out.row_mut(y);
        for (d, &sx) in dst.chunks_exact_mut(3).zip(&src_x) {
            d.copy_from_slice(&src[sx..sx + 3]);
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../tests/unit/transform.rs"]
mod tests;
