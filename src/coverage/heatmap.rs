//! Equirectangular heatmap images of a [`CoverageReport`].

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::{Rgb, RgbImage};
use rayon::prelude::*;

use crate::{
    coverage::analyzer::CoverageReport,
    foundation::core::Resolution,
    foundation::error::{DomeWarpError, DomeWarpResult},
};

/// How buckets sharing one heatmap pixel are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapMode {
    #[default]
    Max,
    Average,
}

const RAMP: [(f64, [f64; 3]); 6] = [
    (0.0, [0.0, 0.0, 255.0]),
    (0.2, [0.0, 255.0, 255.0]),
    (0.4, [0.0, 255.0, 0.0]),
    (0.6, [255.0, 255.0, 0.0]),
    (0.8, [255.0, 128.0, 0.0]),
    (1.0, [255.0, 0.0, 0.0]),
];

/// Colour of a normalised intensity.
///
/// `[0, 1]` runs blue, cyan, green, yellow, orange, red with linear segments; values above 1
/// fade from red to white (white at 2). Negative values clamp to blue.
pub fn color_ramp(intensity: f64) -> Rgb<u8> {
    let t = if intensity.is_nan() { 0.0 } else { intensity.max(0.0) };
    if t > 1.0 {
        let k = (t - 1.0).min(1.0);
        let gb = (255.0 * k).round() as u8;
        return Rgb([255, gb, gb]);
    }
    for pair in RAMP.windows(2) {
        let (t0, c0) = pair[0];
        let (t1, c1) = pair[1];
        if t <= t1 {
            let f = (t - t0) / (t1 - t0);
            let mix = |i: usize| (c0[i] + (c1[i] - c0[i]) * f).round() as u8;
            return Rgb([mix(0), mix(1), mix(2)]);
        }
    }
    Rgb([255, 0, 0])
}

/// Heatmap of distinct projectors per bucket (max within a pixel).
pub fn render_projector_count(
    report: &CoverageReport,
    size: Resolution,
) -> DomeWarpResult<RgbImage> {
    let values: Vec<f64> = report.projector_counts().iter().map(|&c| f64::from(c)).collect();
    render(report.precision(), &values, size, OverlapMode::Max)
}

/// Heatmap of raw valid-pixel counts per bucket (max within a pixel).
pub fn render_pixel_density(report: &CoverageReport, size: Resolution) -> DomeWarpResult<RgbImage> {
    let values: Vec<f64> = report.pixel_counts().iter().map(|&c| c as f64).collect();
    render(report.precision(), &values, size, OverlapMode::Max)
}

/// Heatmap of area-corrected surface density.
pub fn render_surface_density(
    report: &CoverageReport,
    size: Resolution,
    mode: OverlapMode,
) -> DomeWarpResult<RgbImage> {
    render(report.precision(), report.surface_densities(), size, mode)
}

fn render(
    precision: u32,
    values: &[f64],
    size: Resolution,
    mode: OverlapMode,
) -> DomeWarpResult<RgbImage> {
    if size.is_empty() {
        return Err(DomeWarpError::validation(format!(
            "heatmap size must be non-empty, got {size}"
        )));
    }
    let (w, h) = (size.width as usize, size.height as usize);
    let p = precision as usize;

    // Each image pixel aggregates the buckets its footprint overlaps (at least one).
    let span = |i: usize, n: usize| {
        let lo = i * p / n;
        let hi = ((i + 1) * p).div_ceil(n).max(lo + 1).min(p);
        lo..hi
    };
    let mut acc = vec![0.0f64; size.pixel_count()];
    acc.par_chunks_mut(w).enumerate().for_each(|(py, row)| {
        let rows = span(py, h);
        for (px, out) in row.iter_mut().enumerate() {
            let cols = span(px, w);
            let mut agg = 0.0f64;
            let mut n = 0u32;
            for iv in rows.clone() {
                for &v in &values[iv * p + cols.start..iv * p + cols.end] {
                    if v <= 0.0 {
                        continue;
                    }
                    agg = match mode {
                        OverlapMode::Max => agg.max(v),
                        OverlapMode::Average => agg + v,
                    };
                    n += 1;
                }
            }
            if mode == OverlapMode::Average && n > 0 {
                agg /= f64::from(n);
            }
            *out = agg;
        }
    });

    let max = acc.iter().copied().fold(0.0f64, f64::max);
    let mut rgb = vec![0u8; size.pixel_count() * 3];
    if max > 0.0 {
        rgb.par_chunks_mut(w * 3)
            .zip(acc.par_chunks(w))
            .for_each(|(row, vals)| {
                for (px, &v) in row.chunks_exact_mut(3).zip(vals) {
                    if v > 0.0 {
                        px.copy_from_slice(&color_ramp(v / max).0);
                    }
                }
            });
    }

    RgbImage::from_raw(size.width, size.height, rgb)
        .ok_or_else(|| DomeWarpError::validation("heatmap buffer does not match its size"))
}

/// Files produced by [`save_heatmaps`].
#[derive(Clone, Debug)]
pub struct HeatmapPaths {
    pub projector_count: PathBuf,
    pub pixel_density: PathBuf,
    pub surface_density: PathBuf,
    pub summary: PathBuf,
}

/// Write the three heatmap PNGs and `coverage.json` into `dir`.
#[tracing::instrument(skip(report))]
pub fn save_heatmaps(
    report: &CoverageReport,
    dir: &Path,
    size: Resolution,
    mode: OverlapMode,
) -> DomeWarpResult<HeatmapPaths> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory '{}'", dir.display()))?;

    let paths = HeatmapPaths {
        projector_count: dir.join("projector_count.png"),
        pixel_density: dir.join("pixel_density.png"),
        surface_density: dir.join("surface_density.png"),
        summary: dir.join("coverage.json"),
    };

    for (path, img) in [
        (&paths.projector_count, render_projector_count(report, size)?),
        (&paths.pixel_density, render_pixel_density(report, size)?),
        (&paths.surface_density, render_surface_density(report, size, mode)?),
    ] {
        img.save(path)
            .with_context(|| format!("failed to write heatmap '{}'", path.display()))?;
    }

    let json = serde_json::to_vec_pretty(&report.summary())
        .map_err(|e| DomeWarpError::validation(format!("coverage summary serialization: {e}")))?;
    std::fs::write(&paths.summary, json)?;

    tracing::info!(dir = %dir.display(), "heatmaps written");
    Ok(paths)
}

#[cfg(test)]
#[path = "../../tests/unit/coverage/heatmap.rs"]
mod tests;
