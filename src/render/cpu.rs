use std::collections::HashMap;

use rayon::prelude::*;

use crate::{
    foundation::core::Resolution,
    foundation::error::{DomeWarpError, DomeWarpResult},
    frame::Frame,
    render::backend::{RasterBackend, Readback, TargetId, TextureId, WarpDraw},
    render::shader::{InputTexels, shade_warp_pixel},
    warp::map::WarpMap,
};

enum CpuTexture {
    Input { size: Resolution, rgba: Vec<u8> },
    Warp(WarpMap),
}

struct CpuTarget {
    size: Resolution,
    /// RGBA8, bottom-up rows.
    rgba: Vec<u8>,
}

/// Software rasteriser running the warp fragment program on the CPU.
///
/// Draws execute immediately (rows in parallel), so [`RasterBackend::flush`] has nothing to
/// wait for.
#[derive(Default)]
pub struct CpuRasterBackend {
    next_id: u32,
    textures: HashMap<TextureId, CpuTexture>,
    targets: HashMap<TargetId, CpuTarget>,
}

impl CpuRasterBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl RasterBackend for CpuRasterBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn create_input_texture(&mut self, size: Resolution) -> DomeWarpResult<TextureId> {
        if size.is_empty() {
            return Err(DomeWarpError::gpu_init(format!(
                "input texture must be non-empty, got {size}"
            )));
        }
        let id = TextureId(self.alloc_id());
        self.textures.insert(
            id,
            CpuTexture::Input {
                size,
                rgba: vec![0u8; size.pixel_count() * 4],
            },
        );
        Ok(id)
    }

    fn upload_input(&mut self, texture: TextureId, frame: &Frame) -> DomeWarpResult<()> {
        let Some(CpuTexture::Input { size, rgba }) = self.textures.get_mut(&texture) else {
            return Err(DomeWarpError::transform(format!(
                "input texture {texture:?} does not exist"
            )));
        };
        if frame.resolution() != *size {
            return Err(DomeWarpError::transform(format!(
                "frame {} does not match input texture {size}",
                frame.resolution()
            )));
        }
        *rgba = frame.to_rgba8_tight();
        Ok(())
    }

    fn create_warp_texture(&mut self, warp: &WarpMap) -> DomeWarpResult<TextureId> {
        let id = TextureId(self.alloc_id());
        self.textures.insert(id, CpuTexture::Warp(warp.clone()));
        Ok(id)
    }

    fn create_target(&mut self, size: Resolution) -> DomeWarpResult<TargetId> {
        if size.is_empty() {
            return Err(DomeWarpError::gpu_init(format!(
                "render target must be non-empty, got {size}"
            )));
        }
        let id = TargetId(self.alloc_id());
        self.targets.insert(
            id,
            CpuTarget {
                size,
                rgba: vec![0u8; size.pixel_count() * 4],
            },
        );
        Ok(id)
    }

    fn draw_warp(&mut self, draw: &WarpDraw) -> DomeWarpResult<()> {
        let Some(CpuTexture::Input { size: in_size, rgba }) = self.textures.get(&draw.input)
        else {
            return Err(DomeWarpError::transform("warp draw input is not an input texture"));
        };
        let Some(CpuTexture::Warp(warp)) = self.textures.get(&draw.warp) else {
            return Err(DomeWarpError::transform("warp draw warp is not a warp texture"));
        };
        let target = self
            .targets
            .get_mut(&draw.target)
            .ok_or_else(|| DomeWarpError::transform("warp draw target does not exist"))?;

        let input = InputTexels {
            width: in_size.width,
            height: in_size.height,
            rgba,
        };
        let size = target.size;
        let row_bytes = size.width as usize * 4;
        target
            .rgba
            .par_chunks_mut(row_bytes)
            .enumerate()
            .for_each(|(r, row)| {
                let y = size.height - 1 - r as u32;
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let w = warp.get_pixel(x as u32, y);
                    px.copy_from_slice(&shade_warp_pixel(w, &input));
                }
            });
        Ok(())
    }

    fn flush(&mut self) -> DomeWarpResult<()> {
        Ok(())
    }

    fn read_target(&mut self, target: TargetId) -> DomeWarpResult<Readback> {
        let t = self
            .targets
            .get(&target)
            .ok_or_else(|| DomeWarpError::transform(format!("target {target:?} does not exist")))?;
        Ok(Readback {
            width: t.size.width,
            height: t.size.height,
            rgba: t.rgba.clone(),
        })
    }

    fn release_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
    }

    fn release_target(&mut self, target: TargetId) {
        self.targets.remove(&target);
    }

    fn live_resources(&self) -> usize {
        self.textures.len() + self.targets.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
