//! Binary warp-map files: a flat little-endian `f32` array of `width * height * 4` values,
//! interleaved per pixel as `x, y, z, alpha`, row-major from the top-left pixel.

use std::path::Path;

use crate::{
    foundation::core::Resolution,
    foundation::error::{DomeWarpError, DomeWarpResult},
    warp::map::{WarpMap, WarpPixel},
};

/// Resolutions tried when a file's size does not match the requested dimensions.
pub const KNOWN_WARP_RESOLUTIONS: &[Resolution] = &[
    Resolution::new(1920, 1200),
    Resolution::new(1920, 1080),
    Resolution::new(2560, 1600),
    Resolution::new(3840, 2160),
    Resolution::new(1400, 1050),
    Resolution::new(1280, 800),
    Resolution::new(1024, 768),
];

const FLOATS_PER_PIXEL: usize = 4;
const BYTES_PER_PIXEL: usize = FLOATS_PER_PIXEL * 4;

/// Find a known resolution whose float count equals `float_count`.
pub fn infer_resolution(float_count: usize) -> Option<Resolution> {
    KNOWN_WARP_RESOLUTIONS
        .iter()
        .copied()
        .find(|r| r.pixel_count() * FLOATS_PER_PIXEL == float_count)
}

/// Read a warp map, validating its size against `expected`.
pub fn read_warp_file(path: &Path, expected: Resolution) -> DomeWarpResult<WarpMap> {
    if !path.is_file() {
        return Err(DomeWarpError::calibration_parse(format!(
            "warp map '{}' not found",
            path.display()
        )));
    }
    let bytes = std::fs::read(path).map_err(|e| {
        DomeWarpError::calibration_parse(format!(
            "failed to read warp map '{}': {e}",
            path.display()
        ))
    })?;
    decode_warp_bytes(&bytes, expected).map_err(|e| match e {
        DomeWarpError::CalibrationParse(msg) => {
            DomeWarpError::calibration_parse(format!("'{}': {msg}", path.display()))
        }
        other => other,
    })
}

/// Decode warp-map bytes, inferring the resolution when the size does not match `expected`.
pub fn decode_warp_bytes(bytes: &[u8], expected: Resolution) -> DomeWarpResult<WarpMap> {
    if expected.is_empty() {
        return Err(DomeWarpError::calibration_parse(format!(
            "invalid expected warp resolution {expected}"
        )));
    }
    let float_count = bytes.len() / 4;
    let expected_bytes = expected.pixel_count() * BYTES_PER_PIXEL;

    let resolution = if bytes.len() == expected_bytes {
        expected
    } else if let Some(inferred) = infer_resolution(float_count) {
        tracing::warn!(
            expected = %expected,
            inferred = %inferred,
            bytes = bytes.len(),
            "warp map size mismatch; using inferred resolution"
        );
        inferred
    } else {
        tracing::warn!(
            expected = %expected,
            bytes = bytes.len(),
            expected_bytes,
            "warp map size mismatch and no known resolution matches; keeping requested size"
        );
        if bytes.len() < expected_bytes {
            return Err(DomeWarpError::calibration_parse(format!(
                "warp map holds {} bytes, {expected} needs {expected_bytes}",
                bytes.len()
            )));
        }
        expected
    };

    let n = resolution.pixel_count();
    let mut pixels = Vec::with_capacity(n);
    for chunk in bytes[..n * BYTES_PER_PIXEL].chunks_exact(BYTES_PER_PIXEL) {
        let f = |i: usize| {
            f32::from_le_bytes([chunk[i], chunk[i + 1], chunk[i + 2], chunk[i + 3]])
        };
        pixels.push(WarpPixel {
            x: f(0),
            y: f(4),
            z: f(8),
            alpha: f(12),
        });
    }
    WarpMap::from_pixels(resolution.width, resolution.height, pixels)
}

/// Encode a warp map in the on-disk layout.
pub fn encode_warp_bytes(map: &WarpMap) -> Vec<u8> {
    let mut out = Vec::with_capacity(map.pixels().len() * BYTES_PER_PIXEL);
    for p in map.pixels() {
        for v in [p.x, p.y, p.z, p.alpha] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    out
}

/// Write a warp map to `path`, creating parent directories.
pub fn write_warp_file(path: &Path, map: &WarpMap) -> DomeWarpResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }
    std::fs::write(path, encode_warp_bytes(map))?;
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/calibration/warp_file.rs"]
mod tests;
