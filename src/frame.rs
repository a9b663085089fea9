//! Owned, strided pixel buffers exchanged with decode/encode collaborators and raster backends.
//!
//! A [`Frame`] has exactly one owner; it is moved or borrowed, never shared mutably, and its
//! memory is released when it is dropped. Row stride may exceed `width * bytes_per_pixel`;
//! every accessor here honours the stride.

use crate::{
    foundation::core::{PixelFormat, Resolution},
    foundation::error::{DomeWarpError, DomeWarpResult},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    stride: usize,
    data: Vec<u8>,
}

impl Frame {
    /// A black, tightly packed frame.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let stride = width as usize * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            stride,
            data: vec![0u8; stride * height as usize],
        }
    }

    /// A black frame with an explicit row stride.
    pub fn with_stride(
        width: u32,
        height: u32,
        format: PixelFormat,
        stride: usize,
    ) -> DomeWarpResult<Self> {
        let row_bytes = width as usize * format.bytes_per_pixel();
        if stride < row_bytes {
            return Err(DomeWarpError::validation(format!(
                "stride {stride} is smaller than row size {row_bytes}"
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            stride,
            data: vec![0u8; stride * height as usize],
        })
    }

    /// Take ownership of externally produced bytes.
    ///
    /// `data` must cover every row: `stride * (height - 1) + width * bpp` bytes at least.
    pub fn from_raw(
        width: u32,
        height: u32,
        format: PixelFormat,
        stride: usize,
        data: Vec<u8>,
    ) -> DomeWarpResult<Self> {
        let row_bytes = width as usize * format.bytes_per_pixel();
        if stride < row_bytes {
            return Err(DomeWarpError::validation(format!(
                "stride {stride} is smaller than row size {row_bytes}"
            )));
        }
        let needed = required_len(height, stride, row_bytes);
        if data.len() < needed {
            return Err(DomeWarpError::validation(format!(
                "frame buffer holds {} bytes, {width}x{height} with stride {stride} needs {needed}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            stride,
            data,
        })
    }

    /// A tightly packed frame filled with one colour.
    pub fn solid_rgb(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Rgb24);
        for px in frame.data.chunks_exact_mut(3) {
            px.copy_from_slice(&rgb);
        }
        frame
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes between the starts of consecutive rows.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Meaningful bytes per row (`width * bpp`).
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Raw storage, including any row padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Give up ownership of the storage.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// `true` when rows carry no padding.
    pub fn is_tight(&self) -> bool {
        self.stride == self.row_bytes()
    }

    /// Pixel bytes of row `y`, without padding.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.row_bytes()]
    }

    /// Mutable pixel bytes of row `y`, without padding.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let len = self.row_bytes();
        &mut self.data[start..start + len]
    }

    /// RGB of pixel `(x, y)`; `None` when out of range.
    pub fn pixel_rgb(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let off = y as usize * self.stride + x as usize * bpp;
        Some([self.data[off], self.data[off + 1], self.data[off + 2]])
    }

    /// Write RGB at `(x, y)`; RGBA frames get an opaque alpha. Out-of-range writes are ignored.
    pub fn set_pixel_rgb(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let off = y as usize * self.stride + x as usize * bpp;
        self.data[off..off + 3].copy_from_slice(&rgb);
        if bpp == 4 {
            self.data[off + 3] = 255;
        }
    }

    /// Repack rows so that `stride == width * bpp`.
    pub fn to_tight(&self) -> Self {
        if self.is_tight() && self.data.len() == self.stride * self.height as usize {
            return self.clone();
        }
        let row_bytes = self.row_bytes();
        let mut data = Vec::with_capacity(row_bytes * self.height as usize);
        for y in 0..self.height {
            data.extend_from_slice(self.row(y));
        }
        Self {
            width: self.width,
            height: self.height,
            format: self.format,
            stride: row_bytes,
            data,
        }
    }

    /// Tight copy with the row order reversed.
    pub fn flipped_vertical(&self) -> Self {
        let row_bytes = self.row_bytes();
        let mut data = Vec::with_capacity(row_bytes * self.height as usize);
        for y in (0..self.height).rev() {
            data.extend_from_slice(self.row(y));
        }
        Self {
            width: self.width,
            height: self.height,
            format: self.format,
            stride: row_bytes,
            data,
        }
    }

    /// Tightly packed RGBA8 copy (opaque alpha for RGB sources).
    pub fn to_rgba8_tight(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            let row = self.row(y);
            match self.format {
                PixelFormat::Rgba8 => out.extend_from_slice(row),
                PixelFormat::Rgb24 => {
                    for px in row.chunks_exact(3) {
                        out.extend_from_slice(&[px[0], px[1], px[2], 255]);
                    }
                }
            }
        }
        out
    }

    /// Nearest-neighbour resample to `width x height`, mapping each destination pixel to
    /// `floor(dst * src_dim / dst_dim)`.
    pub fn resample_nearest(&self, width: u32, height: u32) -> Self {
        if width == self.width && height == self.height {
            return self.to_tight();
        }
        let bpp = self.format.bytes_per_pixel();
        let mut out = Self::new(width, height, self.format);
        if self.width == 0 || self.height == 0 {
            return out;
        }
        let src_x: Vec<usize> = (0..width)
            .map(|x| nearest_source_index(x, width, self.width) as usize * bpp)
            .collect();
        for y in 0..height {
            let sy = nearest_source_index(y, height, self.height);
            let src_row = self.row(sy);
            let dst_row = out.row_mut(y);
            for (dx, &sx) in src_x.iter().enumerate() {
                dst_row[dx * bpp..(dx + 1) * bpp].copy_from_slice(&src_row[sx..sx + bpp]);
            }
        }
        out
    }

    /// Copy this frame into `dst` with its top-left corner at `(x0, y0)`, clipping to `dst`.
    pub fn blit_into(&self, dst: &mut Frame, x0: u32, y0: u32) {
        if x0 >= dst.width || y0 >= dst.height {
            return;
        }
        let src = if self.format == dst.format {
            None
        } else {
            Some(self.converted(dst.format))
        };
        let src = src.as_ref().unwrap_or(self);
        let bpp = dst.format.bytes_per_pixel();
        let cols = src.width.min(dst.width.saturating_sub(x0)) as usize;
        let rows = src.height.min(dst.height.saturating_sub(y0));
        for y in 0..rows {
            let s = &src.row(y)[..cols * bpp];
            let d = dst.row_mut(y0 + y);
            let off = x0 as usize * bpp;
            d[off..off + cols * bpp].copy_from_slice(s);
        }
    }

    /// Tight copy in another pixel format.
    pub fn converted(&self, format: PixelFormat) -> Self {
        if format == self.format {
            return self.to_tight();
        }
        let mut out = Self::new(self.width, self.height, format);
        for y in 0..self.height {
            let src = self.row(y);
            let dst = out.row_mut(y);
            match format {
                PixelFormat::Rgb24 => {
                    for (d, s) in dst.chunks_exact_mut(3).zip(src.chunks_exact(4)) {
                        d.copy_from_slice(&s[..3]);
                    }
                }
                PixelFormat::Rgba8 => {
                    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(3)) {
                        d[..3].copy_from_slice(s);
                        d[3] = 255;
                    }
                }
            }
        }
        out
    }
}

/// `floor(dst * src_len / dst_len)`, clamped into the source.
pub fn nearest_source_index(dst: u32, dst_len: u32, src_len: u32) -> u32 {
    if dst_len == 0 || src_len == 0 {
        return 0;
    }
    let s = u64::from(dst) * u64::from(src_len) / u64::from(dst_len);
    (s as u32).min(src_len - 1)
}

fn required_len(height: u32, stride: usize, row_bytes: usize) -> usize {
    if height == 0 {
        0
    } else {
        stride * (height as usize - 1) + row_bytes
    }
}

#[cfg(test)]
#[path = "../tests/unit/frame.rs"]
mod tests;
