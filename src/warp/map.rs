use glam::{Vec2, Vec3};

use crate::{
    foundation::core::Resolution,
    foundation::error::{DomeWarpError, DomeWarpResult},
    warp::geometry::{direction_to_equirect_uv, is_valid_sample},
};

/// One warp-map entry: a viewing direction into the source sphere plus a blend alpha.
///
/// Layout matches the on-disk and GPU texel layout (`x, y, z, alpha` as `f32`).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct WarpPixel {
    /// Direction x (+right).
    pub x: f32,
    /// Direction y (+up).
    pub y: f32,
    /// Direction z (-forward).
    pub z: f32,
    /// Edge-blend weight in `[0, 1]`.
    pub alpha: f32,
}

impl WarpPixel {
    /// The all-zero entry returned for out-of-range reads.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        alpha: 0.0,
    };

    /// Build an entry from a direction and alpha.
    pub fn new(dir: Vec3, alpha: f32) -> Self {
        Self {
            x: dir.x,
            y: dir.y,
            z: dir.z,
            alpha,
        }
    }

    /// Direction component as a vector (not normalised).
    pub fn direction(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// `true` when this entry should be sampled.
    pub fn is_valid(self) -> bool {
        is_valid_sample(self.direction(), self.alpha)
    }

    /// Equirectangular UV of this entry's direction.
    pub fn equirect_uv(self) -> Vec2 {
        direction_to_equirect_uv(self.direction())
    }
}

/// Dense per-projector calibration grid, one [`WarpPixel`] per output pixel, row-major from the
/// top-left corner.
///
/// Dimensions are fixed at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct WarpMap {
    resolution: Resolution,
    pixels: Vec<WarpPixel>,
}

impl WarpMap {
    /// A zeroed (fully invalid) map.
    pub fn new(width: u32, height: u32) -> DomeWarpResult<Self> {
        let resolution = Resolution::non_zero(width, height)?;
        Ok(Self {
            resolution,
            pixels: vec![WarpPixel::ZERO; resolution.pixel_count()],
        })
    }

    /// Wrap an existing pixel vector; its length must equal `width * height`.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<WarpPixel>) -> DomeWarpResult<Self> {
        let resolution = Resolution::non_zero(width, height)?;
        if pixels.len() != resolution.pixel_count() {
            return Err(DomeWarpError::validation(format!(
                "warp map {resolution} needs {} pixels, got {}",
                resolution.pixel_count(),
                pixels.len()
            )));
        }
        Ok(Self { resolution, pixels })
    }

    /// A map whose every entry is `pixel`.
    pub fn filled(width: u32, height: u32, pixel: WarpPixel) -> DomeWarpResult<Self> {
        let mut map = Self::new(width, height)?;
        map.pixels.fill(pixel);
        Ok(map)
    }

    /// Build a map by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> WarpPixel,
    ) -> DomeWarpResult<Self> {
        let resolution = Resolution::non_zero(width, height)?;
        let mut pixels = Vec::with_capacity(resolution.pixel_count());
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Ok(Self { resolution, pixels })
    }

    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Read an entry; out-of-range coordinates return [`WarpPixel::ZERO`].
    pub fn get_pixel(&self, x: u32, y: u32) -> WarpPixel {
        self.index(x, y)
            .map(|i| self.pixels[i])
            .unwrap_or(WarpPixel::ZERO)
    }

    /// Write an entry; out-of-range coordinates are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: WarpPixel) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = pixel;
        }
    }

    /// All entries, row-major.
    pub fn pixels(&self) -> &[WarpPixel] {
        &self.pixels
    }

    /// Entries reinterpreted as interleaved `f32` bytes (`x, y, z, alpha`).
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Iterate `(x, y, pixel)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, WarpPixel)> + '_ {
        let w = self.resolution.width;
        self.pixels
            .iter()
            .enumerate()
            .map(move |(i, p)| ((i as u32) % w, (i as u32) / w, *p))
    }

    /// Number of entries that would be sampled when rendering.
    pub fn valid_pixel_count(&self) -> usize {
        self.pixels.iter().filter(|p| p.is_valid()).count()
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.resolution.width || y >= self.resolution.height {
            return None;
        }
        Some(y as usize * self.resolution.width as usize + x as usize)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/warp/map.rs"]
mod tests;
