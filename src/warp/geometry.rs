//! Direction ↔ equirectangular UV mapping.
//!
//! Coordinate system is right-handed: `+x` right, `+y` up, `-z` forward. The forward direction
//! `(0, 0, -1)` maps to the centre of the equirectangular frame, `(0.5, 0.5)`. `u` grows with
//! azimuth from `-π` (left edge) to `π` (right edge); `v` is `0` at the zenith and `1` at the
//! nadir.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::{DVec3, Vec2, Vec3};

/// Directions shorter than this map to the frame centre.
pub const DEGENERATE_DIRECTION_LENGTH: f32 = 1e-4;

/// Warp pixels with a shorter direction are outside the projector's useful area.
pub const MIN_VALID_DIRECTION_LENGTH: f32 = 1e-3;

/// Warp pixels with a lower blend alpha are outside the projector's useful area.
pub const MIN_VALID_ALPHA: f32 = 1e-2;

/// UV returned for degenerate directions.
pub const CENTER_UV: Vec2 = Vec2::new(0.5, 0.5);

/// Project a (not necessarily unit) direction onto equirectangular UV in `[0, 1]²`.
///
/// Degenerate input (`‖dir‖ < 1e-4`) yields [`CENTER_UV`]; this never fails.
pub fn direction_to_equirect_uv(dir: Vec3) -> Vec2 {
    let len = dir.length();
    if len.is_nan() || len < DEGENERATE_DIRECTION_LENGTH {
        return CENTER_UV;
    }
    let d = dir.as_dvec3() / f64::from(len);
    let (u, v) = direction_to_equirect_uv_f64(d);
    Vec2::new(u as f32, v as f32)
}

/// Double-precision variant of [`direction_to_equirect_uv`] for a unit direction.
pub(crate) fn direction_to_equirect_uv_f64(d: DVec3) -> (f64, f64) {
    let theta = d.x.atan2(-d.z);
    let phi = d.y.clamp(-1.0, 1.0).asin();
    let u = (theta + PI) / TAU;
    let v = 1.0 - (phi + FRAC_PI_2) / PI;
    (u, v)
}

/// Inverse of [`direction_to_equirect_uv`]: the unit direction sampled at `uv`.
pub fn equirect_uv_to_direction(uv: Vec2) -> Vec3 {
    let theta = f64::from(uv.x) * TAU - PI;
    let phi = (1.0 - f64::from(uv.y)) * PI - FRAC_PI_2;
    let (sin_t, cos_t) = theta.sin_cos();
    let (sin_p, cos_p) = phi.sin_cos();
    DVec3::new(cos_p * sin_t, sin_p, -cos_p * cos_t).as_vec3()
}

/// Elevation (radians) of the equirectangular row at `v`, measured from the equator.
///
/// Only the magnitude is meaningful to callers; the sign follows `v - 0.5`.
pub fn elevation_at_v(v: f64) -> f64 {
    PI * (v - 0.5)
}

/// `true` when a warp entry should be sampled rather than rendered black.
pub fn is_valid_sample(dir: Vec3, alpha: f32) -> bool {
    dir.length() >= MIN_VALID_DIRECTION_LENGTH && alpha >= MIN_VALID_ALPHA
}

/// `true` when a warp entry counts towards coverage; both thresholds are exclusive here.
pub fn is_coverage_sample(dir: Vec3, alpha: f32) -> bool {
    dir.length() > MIN_VALID_DIRECTION_LENGTH && alpha > MIN_VALID_ALPHA
}

#[cfg(test)]
#[path = "../../tests/unit/warp/geometry.rs"]
mod tests;
