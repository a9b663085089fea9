use crate::{
    foundation::core::Resolution,
    foundation::error::{DomeWarpError, DomeWarpResult},
    frame::Frame,
    warp::map::WarpMap,
};

/// Handle to a sampled texture (equirectangular input or warp map).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Handle to a colour render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u32);

/// One full-viewport warp draw: for every target pixel, look up the warp texel at the same
/// coordinate, project its direction to equirectangular UV and sample `input` there.
#[derive(Clone, Copy, Debug)]
pub struct WarpDraw {
    pub target: TargetId,
    pub input: TextureId,
    pub warp: TextureId,
}

/// RGBA8 pixels read back from a render target.
///
/// Rows follow the raster origin: row `0` is the **bottom** of the image.
#[derive(Clone, Debug)]
pub struct Readback {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8, bottom-up rows.
    pub rgba: Vec<u8>,
}

/// Abstract raster capability used by the projection transformer.
///
/// A backend is a single-threaded context: one owner drives it, resources are created and
/// released explicitly through it, and dropping it releases whatever is still alive.
///
/// Raster convention shared by all implementations:
///
/// - warp textures are indexed top-down (warp row `0` is the first row of the file);
/// - a target pixel on output row `y` reads warp row `y`;
/// - [`RasterBackend::read_target`] returns rows bottom-up, so output row `y` sits at readback
///   row `height - 1 - y`;
/// - input sampling is bilinear with clamp-to-edge addressing.
pub trait RasterBackend {
    /// Human-readable backend name for logs.
    fn name(&self) -> &'static str;

    /// Allocate an RGBA8 input texture.
    fn create_input_texture(&mut self, size: Resolution) -> DomeWarpResult<TextureId>;

    /// Upload a frame into an input texture of the same size. Row stride is honoured.
    fn upload_input(&mut self, texture: TextureId, frame: &Frame) -> DomeWarpResult<()>;

    /// Allocate a 4×f32 texture holding `warp`.
    fn create_warp_texture(&mut self, warp: &WarpMap) -> DomeWarpResult<TextureId>;

    /// Allocate an RGBA8 colour target.
    fn create_target(&mut self, size: Resolution) -> DomeWarpResult<TargetId>;

    /// Record a warp draw into `draw.target`.
    fn draw_warp(&mut self, draw: &WarpDraw) -> DomeWarpResult<()>;

    /// Block until all submitted work has completed.
    fn flush(&mut self) -> DomeWarpResult<()>;

    /// Read a target back to host memory (bottom-up rows).
    fn read_target(&mut self, target: TargetId) -> DomeWarpResult<Readback>;

    /// Free a texture. Unknown ids are ignored.
    fn release_texture(&mut self, texture: TextureId);

    /// Free a target. Unknown ids are ignored.
    fn release_target(&mut self, target: TargetId);

    /// Number of textures and targets currently alive.
    fn live_resources(&self) -> usize;
}

/// Available backend kinds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Software rasteriser; always available.
    #[default]
    Cpu,
    /// `wgpu` rasteriser; requires the `gpu` feature and an adapter.
    Gpu,
}

/// Acquire a raster context.
pub fn create_backend(kind: BackendKind) -> DomeWarpResult<Box<dyn RasterBackend>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(crate::render::cpu::CpuRasterBackend::new())),
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => Ok(Box::new(crate::render::gpu::WgpuRasterBackend::new()?)),
        #[allow(unreachable_patterns)]
        _ => Err(DomeWarpError::gpu_init(
            "requested backend is not available (built without the 'gpu' feature)",
        )),
    }
}
