use super::*;
use crate::warp::{
    geometry::equirect_uv_to_direction,
    map::{WarpMap, WarpPixel},
};
use glam::{Vec2, Vec3};

const INPUT: Resolution = Resolution::new(4096, 2048);

fn grid_map(w: u32, h: u32, cols_per_cell: u32) -> WarpMap {
    WarpMap::from_fn(w, h, |x, y| {
        let cx = x / cols_per_cell;
        let cells = w.div_ceil(cols_per_cell);
        let uv = Vec2::new(
            (cx as f32 + 0.5) / cells as f32,
            (y as f32 + 0.5) / h as f32,
        );
        WarpPixel::new(equirect_uv_to_direction(uv), 1.0)
    })
    .unwrap()
}

#[test]
fn distinct_cells_keep_full_resolution() {
    let warp = grid_map(8, 4, 1);
    let r = DecimationAnalyzer::default().analyze(&warp, INPUT).unwrap();
    assert_eq!(r.unique_pixels, 32);
    assert!((r.scale_factor - 1.0).abs() < 1e-12);
    assert_eq!(r.decimated, Resolution::new(8, 4));
    assert!(!r.is_decimated());
}

#[test]
fn single_cell_collapses_to_minimum_size() {
    let forward = WarpPixel::new(Vec3::new(0.0, 0.0, -1.0), 1.0);
    let square = WarpMap::filled(4, 4, forward).unwrap();
    let r = DecimationAnalyzer::default().analyze(&square, INPUT).unwrap();
    assert_eq!(r.unique_pixels, 1);
    assert_eq!(r.decimated, Resolution::new(1, 1));

    let wide = WarpMap::filled(16, 10, forward).unwrap();
    let r = DecimationAnalyzer::default().analyze(&wide, INPUT).unwrap();
    assert_eq!(r.decimated, Resolution::new(2, 1));
}

#[test]
fn shared_columns_use_area_scale() {
    let warp = grid_map(8, 4, 2);
    let r = DecimationAnalyzer::default().analyze(&warp, INPUT).unwrap();
    assert_eq!(r.unique_pixels, 16);
    assert!((r.scale_factor - 0.5f64.sqrt()).abs() < 1e-12);
    assert_eq!(r.decimated, Resolution::new(6, 3));
}

#[test]
fn disabled_config_is_identity() {
    let forward = WarpPixel::new(Vec3::new(0.0, 0.0, -1.0), 1.0);
    let warp = WarpMap::filled(6, 4, forward).unwrap();
    let r = DecimationAnalyzer::new(DecimationConfig::disabled())
        .analyze(&warp, INPUT)
        .unwrap();
    assert_eq!(r.decimated, Resolution::new(6, 4));
    assert_eq!(r.scale_factor, 1.0);
}

#[test]
fn rejects_bad_inputs() {
    let warp = grid_map(2, 2, 1);
    assert!(
        DecimationAnalyzer::default()
            .analyze(&warp, Resolution::new(0, 10))
            .is_err()
    );
    let cfg = DecimationConfig {
        enabled: true,
        tolerance_pixels: 0.0,
    };
    assert!(DecimationAnalyzer::new(cfg).analyze(&warp, INPUT).is_err());
}

#[test]
fn aspect_correction_never_exceeds_output() {
    for &(w, h) in &[(1920u32, 1200u32), (1920, 1080), (7, 3), (3, 7)] {
        for s in [0.01, 0.3, 0.77, 1.0] {
            let r = scaled_resolution(Resolution::new(w, h), s);
            assert!(r.width >= 1 && r.height >= 1);
            assert!(r.width <= w && r.height <= h, "{w}x{h} @ {s} -> {r}");
        }
    }
}
