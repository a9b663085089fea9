//! Output-resolution reduction for warp maps that oversample the equirectangular source.
//!
//! Every warp pixel is projected to equirectangular UV and snapped to a grid of
//! `tolerance_pixels / min(input_w, input_h)` in UV units. The number of distinct cells is the
//! number of source locations the projector actually addresses; the output is scaled by the
//! area ratio `sqrt(unique / total)` and then snapped back to the projector's aspect ratio.

use rayon::prelude::*;

use crate::{
    foundation::core::Resolution,
    foundation::error::{DomeWarpError, DomeWarpResult},
    warp::map::WarpMap,
};

/// Tuning for [`DecimationAnalyzer`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecimationConfig {
    /// When `false`, the decimated size always equals the warp-map size.
    pub enabled: bool,
    /// Bucket size in input pixels (default half a pixel).
    pub tolerance_pixels: f64,
}

impl Default for DecimationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance_pixels: 0.5,
        }
    }
}

impl DecimationConfig {
    /// Decimation switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Outcome of a decimation analysis.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct DecimationResult {
    /// Warp-map (full render) resolution.
    pub output: Resolution,
    /// Reduced resolution used at readback.
    pub decimated: Resolution,
    /// Distinct UV cells addressed by the warp map.
    pub unique_pixels: usize,
    /// Warp-map pixel count.
    pub total_pixels: usize,
    /// `sqrt(unique_pixels / total_pixels)`.
    pub scale_factor: f64,
}

impl DecimationResult {
    /// `true` when the decimated size differs from the full output.
    pub fn is_decimated(&self) -> bool {
        self.decimated != self.output
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DecimationAnalyzer {
    config: DecimationConfig,
}

impl DecimationAnalyzer {
    pub fn new(config: DecimationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> DecimationConfig {
        self.config
    }

    /// Analyse `warp` against an equirectangular input of size `input`.
    #[tracing::instrument(skip(self, warp), fields(warp = %warp.resolution()))]
    pub fn analyze(&self, warp: &WarpMap, input: Resolution) -> DomeWarpResult<DecimationResult> {
        let output = warp.resolution();
        let total_pixels = output.pixel_count();

        if !self.config.enabled {
            return Ok(DecimationResult {
                output,
                decimated: output,
                unique_pixels: total_pixels,
                total_pixels,
                scale_factor: 1.0,
            });
        }
        if input.is_empty() {
            return Err(DomeWarpError::validation(format!(
                "decimation needs a non-empty input resolution, got {input}"
            )));
        }
        let tolerance_pixels = self.config.tolerance_pixels;
        if tolerance_pixels.is_nan() || tolerance_pixels <= 0.0 {
            return Err(DomeWarpError::validation(
                "decimation tolerance must be positive",
            ));
        }

        let tolerance = tolerance_pixels / f64::from(input.width.min(input.height));
        let unique_pixels = count_unique_cells(warp, tolerance);
        let scale_factor = (unique_pixels as f64 / total_pixels as f64).sqrt();
        let decimated = scaled_resolution(output, scale_factor);

        tracing::info!(
            unique_pixels,
            total_pixels,
            scale_factor,
            decimated = %decimated,
            "decimation analysis"
        );

        Ok(DecimationResult {
            output,
            decimated,
            unique_pixels,
            total_pixels,
            scale_factor,
        })
    }
}

fn count_unique_cells(warp: &WarpMap, tolerance: f64) -> usize {
    let mut keys: Vec<u64> = warp
        .pixels()
        .par_iter()
        .map(|p| {
            let uv = p.equirect_uv();
            let qu = (f64::from(uv.x) / tolerance).round() as i64;
            let qv = (f64::from(uv.y) / tolerance).round() as i64;
            ((qu as u64) << 32) | (qv as u64 & 0xffff_ffff)
        })
        .collect();
    keys.par_sort_unstable();
    keys.dedup();
    keys.len()
}

/// Scale `output` by `scale`, floor each side at 1 and restore the original aspect ratio.
pub fn scaled_resolution(output: Resolution, scale: f64) -> Resolution {
    let scale = scale.clamp(0.0, 1.0);
    let target = output.aspect();
    let mut w = ((f64::from(output.width) * scale).round() as u32).max(1);
    let mut h = ((f64::from(output.height) * scale).round() as u32).max(1);

    if f64::from(w) / f64::from(h) > target {
        h = ((f64::from(w) / target).round() as u32).max(1);
    } else {
        w = ((f64::from(h) * target).round() as u32).max(1);
    }

    Resolution::new(w.min(output.width), h.min(output.height))
}

#[cfg(test)]
#[path = "../tests/unit/decimate.rs"]
mod tests;
