use std::collections::BTreeMap;
use std::f64::consts::PI;

use glam::DVec3;
use rayon::prelude::*;

use crate::{
    foundation::error::{DomeWarpError, DomeWarpResult},
    warp::geometry::{direction_to_equirect_uv_f64, elevation_at_v, is_coverage_sample},
    warp::map::WarpMap,
};

/// Bucket grid resolution for [`CoverageAnalyzer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CoverageConfig {
    /// Buckets per UV axis.
    pub precision: u32,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self { precision: 1000 }
    }
}

/// One projector that contributed to a coverage run.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ProjectorCoverage {
    pub node_id: String,
    pub projector_index: usize,
    pub total_pixels: u64,
    pub valid_pixels: u64,
    /// Distinct buckets this projector reaches.
    pub unique_buckets: u64,
}

/// Aggregated values of one UV bucket.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverageCell {
    /// Distinct `(node, projector)` pairs sampling the bucket.
    pub projectors: u32,
    /// Raw valid-pixel count.
    pub pixels: u64,
    /// Area-corrected density per unit sphere surface.
    pub surface_density: f64,
}

/// Accumulates warp maps of many projectors over a shared equirectangular bucket grid.
///
/// Only pixels with direction length above 1e-3 and alpha above 1e-2 contribute. Projectors are
/// distinguished by `(node_id, projector_index)`; adding the same pair again is rejected.
pub struct CoverageAnalyzer {
    precision: u32,
    /// Ordinal (1-based) of the last projector that touched each bucket.
    last_seen: Vec<u32>,
    projector_count: Vec<u32>,
    pixel_count: Vec<u64>,
    /// Sum of `1 / cos(elevation)` per bucket.
    weighted: Vec<f64>,
    projectors: Vec<ProjectorCoverage>,
}

impl CoverageAnalyzer {
    pub fn new(config: CoverageConfig) -> DomeWarpResult<Self> {
        let precision = config.precision;
        if precision == 0 {
            return Err(DomeWarpError::validation(
                "coverage precision must be > 0",
            ));
        }
        let cells = (precision as usize)
            .checked_mul(precision as usize)
            .ok_or_else(|| DomeWarpError::validation("coverage precision too large"))?;
        Ok(Self {
            precision,
            last_seen: vec![0; cells],
            projector_count: vec![0; cells],
            pixel_count: vec![0; cells],
            weighted: vec![0.0; cells],
            projectors: Vec::new(),
        })
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Fold one projector's warp map into the grid.
    ///
    /// Each `(node_id, projector_index)` pair may be added once.
    #[tracing::instrument(skip(self, warp), fields(warp = %warp.resolution()))]
    pub fn add_projector(
        &mut self,
        node_id: &str,
        projector_index: usize,
        warp: &WarpMap,
    ) -> DomeWarpResult<()> {
        if self
            .projectors
            .iter()
            .any(|p| p.node_id == node_id && p.projector_index == projector_index)
        {
            return Err(DomeWarpError::validation(format!(
                "projector {node_id}/{projector_index} was already added"
            )));
        }
        let mark = u32::try_from(self.projectors.len() + 1)
            .map_err(|_| DomeWarpError::validation("too many projectors"))?;

        let precision = self.precision;
        let buckets: Vec<Option<usize>> = warp
            .pixels()
            .par_iter()
            .map(|p| {
                is_coverage_sample(p.direction(), p.alpha)
                    .then(|| bucket_index(p.direction().as_dvec3(), precision))
            })
            .collect();

        let mut valid = 0u64;
        let mut reached = 0u64;
        for b in buckets.into_iter().flatten() {
            valid += 1;
            self.pixel_count[b] += 1;
            self.weighted[b] += 1.0 / cos_elevation(b, precision);
            if self.last_seen[b] != mark {
                self.last_seen[b] = mark;
                self.projector_count[b] += 1;
                reached += 1;
            }
        }

        self.projectors.push(ProjectorCoverage {
            node_id: node_id.to_owned(),
            projector_index,
            total_pixels: warp.pixels().len() as u64,
            valid_pixels: valid,
            unique_buckets: reached,
        });
        tracing::debug!(valid, reached, "projector coverage added");
        Ok(())
    }

    /// Compute the per-bucket surface density and freeze the result.
    pub fn finish(self) -> CoverageReport {
        let precision = self.precision;
        let patch = 2.0 * PI * PI / (f64::from(precision) * f64::from(precision));
        let surface_density: Vec<f64> = self
            .weighted
            .par_iter()
            .enumerate()
            .map(|(b, &w)| {
                if w == 0.0 {
                    0.0
                } else {
                    w / (cos_elevation(b, precision) * patch)
                }
            })
            .collect();
        CoverageReport {
            precision,
            projector_count: self.projector_count,
            pixel_count: self.pixel_count,
            surface_density,
            projectors: self.projectors,
        }
    }
}

/// Row-major bucket of a direction: `u` picks the column, `v` the row.
fn bucket_index(dir: DVec3, precision: u32) -> usize {
    let (u, v) = direction_to_equirect_uv_f64(dir);
    let p = f64::from(precision);
    let max = precision - 1;
    let iu = ((u * p).floor() as u32).min(max);
    let iv = ((v * p).floor() as u32).min(max);
    iv as usize * precision as usize + iu as usize
}

/// `cos` of the elevation at the centre of the bucket's row.
fn cos_elevation(bucket: usize, precision: u32) -> f64 {
    let row = bucket / precision as usize;
    let v = (row as f64 + 0.5) / f64::from(precision);
    elevation_at_v(v).cos()
}

/// Frozen result of a coverage run.
#[derive(Clone, Debug)]
pub struct CoverageReport {
    precision: u32,
    projector_count: Vec<u32>,
    pixel_count: Vec<u64>,
    surface_density: Vec<f64>,
    projectors: Vec<ProjectorCoverage>,
}

impl CoverageReport {
    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn projectors(&self) -> &[ProjectorCoverage] {
        &self.projectors
    }

    /// Bucket `(iu, iv)`; `None` out of range.
    pub fn cell(&self, iu: u32, iv: u32) -> Option<CoverageCell> {
        if iu >= self.precision || iv >= self.precision {
            return None;
        }
        let b = iv as usize * self.precision as usize + iu as usize;
        Some(CoverageCell {
            projectors: self.projector_count[b],
            pixels: self.pixel_count[b],
            surface_density: self.surface_density[b],
        })
    }

    /// Bucket containing `(u, v)`.
    pub fn cell_at_uv(&self, u: f64, v: f64) -> Option<CoverageCell> {
        if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
            return None;
        }
        let p = f64::from(self.precision);
        let max = self.precision - 1;
        self.cell(
            ((u * p).floor() as u32).min(max),
            ((v * p).floor() as u32).min(max),
        )
    }

    pub fn projector_counts(&self) -> &[u32] {
        &self.projector_count
    }

    pub fn pixel_counts(&self) -> &[u64] {
        &self.pixel_count
    }

    pub fn surface_densities(&self) -> &[f64] {
        &self.surface_density
    }

    /// Scalar statistics over all covered buckets.
    pub fn summary(&self) -> CoverageSummary {
        let covered: Vec<usize> = (0..self.pixel_count.len())
            .filter(|&b| self.pixel_count[b] > 0)
            .collect();

        let mut overlap_histogram = BTreeMap::new();
        for &b in &covered {
            *overlap_histogram.entry(self.projector_count[b]).or_insert(0u64) += 1;
        }

        let valid_projector_pixels: u64 = self.pixel_count.iter().sum();
        let unique_equirect_pixels = covered.len() as u64;
        let redundancy_ratio = if unique_equirect_pixels == 0 {
            0.0
        } else {
            valid_projector_pixels as f64 / unique_equirect_pixels as f64
        };

        CoverageSummary {
            precision: self.precision,
            total_projector_pixels: self.projectors.iter().map(|p| p.total_pixels).sum(),
            valid_projector_pixels,
            unique_equirect_pixels,
            coverage_fraction: unique_equirect_pixels as f64 / self.pixel_count.len() as f64,
            redundancy_ratio,
            projector_count: MetricStats::over(
                covered
                    .iter()
                    .map(|&b| f64::from(self.projector_count[b])),
            ),
            pixel_density: MetricStats::over(covered.iter().map(|&b| self.pixel_count[b] as f64)),
            surface_density: MetricStats::over(covered.iter().map(|&b| self.surface_density[b])),
            overlap_histogram,
            projectors: self.projectors.clone(),
        }
    }
}

/// Min/max/mean of a metric over covered buckets (all zero when nothing is covered).
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct MetricStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl MetricStats {
    fn over(values: impl Iterator<Item = f64>) -> Self {
        let mut n = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for v in values {
            n += 1;
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        if n == 0 {
            return Self::default();
        }
        Self {
            min,
            max,
            avg: sum / n as f64,
        }
    }
}

/// Serializable coverage report, written next to the heatmaps as `coverage.json`.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CoverageSummary {
    pub precision: u32,
    /// Every warp pixel of every projector, valid or not.
    pub total_projector_pixels: u64,
    pub valid_projector_pixels: u64,
    /// Buckets reached by at least one valid pixel.
    pub unique_equirect_pixels: u64,
    pub coverage_fraction: f64,
    /// `valid_projector_pixels / unique_equirect_pixels`.
    pub redundancy_ratio: f64,
    pub projector_count: MetricStats,
    pub pixel_density: MetricStats,
    pub surface_density: MetricStats,
    /// Buckets with exactly `K` distinct projectors, keyed by `K`.
    pub overlap_histogram: BTreeMap<u32, u64>,
    pub projectors: Vec<ProjectorCoverage>,
}

#[cfg(test)]
#[path = "../../tests/unit/coverage/analyzer.rs"]
mod tests;
