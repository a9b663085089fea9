//! The warp fragment program, as WGSL for the GPU backend and as plain Rust for the software
//! backend. Both must agree pixel for pixel up to 8-bit rounding.

use glam::Vec2;

use crate::warp::{
    geometry::{direction_to_equirect_uv, is_valid_sample},
    map::WarpPixel,
};

/// Full-screen triangle + warp lookup.
///
/// Bindings: `0` input texture (RGBA8, filterable), `1` linear clamp sampler,
/// `2` warp texture (RGBA32F, loaded with `textureLoad`).
pub const WARP_SHADER_WGSL: &str = r#"
struct VsOut {
  @builtin(position) pos: vec4<f32>,
};

@vertex
fn vs(@builtin(vertex_index) vi: u32) -> VsOut {
  var p = array<vec2<f32>, 3>(
    vec2<f32>(-1.0, -1.0),
    vec2<f32>( 3.0, -1.0),
    vec2<f32>(-1.0,  3.0),
  );
  var o: VsOut;
  o.pos = vec4<f32>(p[vi], 0.0, 1.0);
  return o;
}

@group(0) @binding(0) var t_input: texture_2d<f32>;
@group(0) @binding(1) var s_input: sampler;
@group(0) @binding(2) var t_warp: texture_2d<f32>;

const PI: f32 = 3.14159265358979323846;

fn dir_to_equirect_uv(d: vec3<f32>) -> vec2<f32> {
  let len = length(d);
  if (len < 1e-4) {
    return vec2<f32>(0.5, 0.5);
  }
  let n = d / len;
  let theta = atan2(n.x, -n.z);
  let phi = asin(clamp(n.y, -1.0, 1.0));
  return vec2<f32>((theta + PI) / (2.0 * PI), 1.0 - (phi + 0.5 * PI) / PI);
}

@fragment
fn fs(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
  let size = textureDimensions(t_warp);
  // Target rows are stored bottom-up: framebuffer row r holds output row (h - 1 - r).
  let x = min(u32(frag.x), size.x - 1u);
  let y = size.y - 1u - min(u32(frag.y), size.y - 1u);
  let w = textureLoad(t_warp, vec2<i32>(i32(x), i32(y)), 0);
  if (length(w.xyz) < 1e-3 || w.w < 1e-2) {
    return vec4<f32>(0.0, 0.0, 0.0, 1.0);
  }
  let uv = clamp(dir_to_equirect_uv(w.xyz), vec2<f32>(0.0), vec2<f32>(1.0));
  let c = textureSampleLevel(t_input, s_input, uv, 0.0);
  return vec4<f32>(c.rgb * w.w, 1.0);
}
"#;

/// Software equivalent of the `fs` entry point. Returns RGBA8.
pub fn shade_warp_pixel(warp: WarpPixel, input: &InputTexels<'_>) -> [u8; 4] {
    if !is_valid_sample(warp.direction(), warp.alpha) {
        return [0, 0, 0, 255];
    }
    let uv = direction_to_equirect_uv(warp.direction()).clamp(Vec2::ZERO, Vec2::ONE);
    let c = input.sample_bilinear(uv);
    let a = warp.alpha.min(1.0);
    [
        unorm8(c[0] * a),
        unorm8(c[1] * a),
        unorm8(c[2] * a),
        255,
    ]
}

/// Borrowed RGBA8 texels with clamp-to-edge bilinear sampling.
#[derive(Clone, Copy, Debug)]
pub struct InputTexels<'a> {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8, top-down rows.
    pub rgba: &'a [u8],
}

impl InputTexels<'_> {
    fn texel(&self, x: i64, y: i64) -> [f32; 3] {
        let x = x.clamp(0, i64::from(self.width) - 1) as usize;
        let y = y.clamp(0, i64::from(self.height) - 1) as usize;
        let off = (y * self.width as usize + x) * 4;
        [
            f32::from(self.rgba[off]) / 255.0,
            f32::from(self.rgba[off + 1]) / 255.0,
            f32::from(self.rgba[off + 2]) / 255.0,
        ]
    }

    /// Sample at normalised `uv`, texel centres at `(i + 0.5) / size`.
    pub fn sample_bilinear(&self, uv: Vec2) -> [f32; 3] {
        if self.width == 0 || self.height == 0 {
            return [0.0; 3];
        }
        let tx = uv.x * self.width as f32 - 0.5;
        let ty = uv.y * self.height as f32 - 0.5;
        let x0 = tx.floor();
        let y0 = ty.floor();
        let fx = tx - x0;
        let fy = ty - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let c00 = self.texel(x0, y0);
        let c10 = self.texel(x0 + 1, y0);
        let c01 = self.texel(x0, y0 + 1);
        let c11 = self.texel(x0 + 1, y0 + 1);

        let mut out = [0.0f32; 3];
        for i in 0..3 {
            let top = c00[i] + (c10[i] - c00[i]) * fx;
            let bottom = c01[i] + (c11[i] - c01[i]) * fx;
            out[i] = top + (bottom - top) * fy;
        }
        out
    }
}

fn unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
#[path = "../../tests/unit/render/shader.rs"]
mod tests;
