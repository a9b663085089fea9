use super::*;
use glam::Vec3;

fn solid(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
    [rgb[0], rgb[1], rgb[2], 255].repeat((w * h) as usize)
}

#[test]
fn valid_pixel_samples_and_premultiplies() {
    let rgba = solid(4, 2, [200, 100, 50]);
    let tex = InputTexels {
        width: 4,
        height: 2,
        rgba: &rgba,
    };
    let fwd = WarpPixel::new(Vec3::new(0.0, 0.0, -1.0), 1.0);
    assert_eq!(shade_warp_pixel(fwd, &tex), [200, 100, 50, 255]);

    let half = WarpPixel::new(Vec3::new(0.0, 0.0, -1.0), 0.5);
    assert_eq!(shade_warp_pixel(half, &tex), [100, 50, 25, 255]);
}

#[test]
fn invalid_pixels_are_opaque_black() {
    let rgba = solid(2, 2, [255, 255, 255]);
    let tex = InputTexels {
        width: 2,
        height: 2,
        rgba: &rgba,
    };
    for p in [
        WarpPixel::ZERO,
        WarpPixel::new(Vec3::new(0.0, 0.0, -1.0), 0.005),
        WarpPixel::new(Vec3::new(0.0, 0.0, -5e-4), 1.0),
    ] {
        assert_eq!(shade_warp_pixel(p, &tex), [0, 0, 0, 255]);
    }
}

#[test]
fn bilinear_interpolates_between_texel_centres_and_clamps() {
    // 2x1: black | white.
    let rgba = vec![0, 0, 0, 255, 255, 255, 255, 255];
    let tex = InputTexels {
        width: 2,
        height: 1,
        rgba: &rgba,
    };
    assert_eq!(tex.sample_bilinear(Vec2::new(0.25, 0.5))[0], 0.0);
    assert_eq!(tex.sample_bilinear(Vec2::new(0.75, 0.5))[0], 1.0);
    assert!((tex.sample_bilinear(Vec2::new(0.5, 0.5))[0] - 0.5).abs() < 1e-6);
    // Edges clamp instead of wrapping.
    assert_eq!(tex.sample_bilinear(Vec2::new(0.0, 0.5))[0], 0.0);
    assert_eq!(tex.sample_bilinear(Vec2::new(1.0, 0.5))[0], 1.0);
}

#[test]
fn wgsl_declares_expected_entry_points_and_bindings() {
    assert!(WARP_SHADER_WGSL.contains("fn vs("));
    assert!(WARP_SHADER_WGSL.contains("fn fs("));
    for b in ["@binding(0)", "@binding(1)", "@binding(2)"] {
        assert!(WARP_SHADER_WGSL.contains(b), "missing {b}");
    }
    assert!(WARP_SHADER_WGSL.contains("atan2(n.x, -n.z)"));
}
