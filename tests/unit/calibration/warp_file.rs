use super::*;
use glam::Vec3;

fn sample_map(w: u32, h: u32) -> WarpMap {
    WarpMap::from_fn(w, h, |x, y| {
        WarpPixel::new(Vec3::new(x as f32, y as f32, -1.0), 0.25 * (x % 4) as f32)
    })
    .unwrap()
}

#[test]
fn exact_size_decodes_interleaved_floats() {
    let map = sample_map(3, 2);
    let bytes = encode_warp_bytes(&map);
    assert_eq!(bytes.len(), 3 * 2 * 16);
    assert_eq!(&bytes[16..20], &1.0f32.to_le_bytes());
    let back = decode_warp_bytes(&bytes, Resolution::new(3, 2)).unwrap();
    assert_eq!(back, map);
}

#[test]
fn mismatch_infers_known_resolution() {
    let bytes = vec![0u8; 1024 * 768 * 16];
    let map = decode_warp_bytes(&bytes, Resolution::new(1920, 1200)).unwrap();
    assert_eq!(map.resolution(), Resolution::new(1024, 768));
}

#[test]
fn undersized_unknown_file_is_a_parse_error() {
    let bytes = vec![0u8; 5 * 16];
    let err = decode_warp_bytes(&bytes, Resolution::new(3, 2)).unwrap_err();
    assert!(matches!(err, DomeWarpError::CalibrationParse(_)), "{err}");
}

#[test]
fn oversized_unknown_file_falls_back_to_requested_size() {
    let map = sample_map(3, 2);
    let mut bytes = encode_warp_bytes(&map);
    bytes.extend_from_slice(&[0u8; 16 * 3]);
    let back = decode_warp_bytes(&bytes, Resolution::new(3, 2)).unwrap();
    assert_eq!(back, map);
}

#[test]
fn missing_file_is_a_parse_error() {
    let err = read_warp_file(
        Path::new("target/does-not-exist/warp.bin"),
        Resolution::new(2, 2),
    )
    .unwrap_err();
    assert!(matches!(err, DomeWarpError::CalibrationParse(_)));
}

#[test]
fn write_then_read_file() {
    let dir = std::path::PathBuf::from("target").join("unit_warp_file");
    let path = dir.join("p0.bin");
    let map = sample_map(4, 3);
    write_warp_file(&path, &map).unwrap();
    let back = read_warp_file(&path, Resolution::new(4, 3)).unwrap();
    assert_eq!(back, map);
}

#[test]
fn known_resolutions_include_common_projectors() {
    assert_eq!(
        infer_resolution(1920 * 1200 * 4),
        Some(Resolution::new(1920, 1200))
    );
    assert_eq!(
        infer_resolution(1920 * 1080 * 4),
        Some(Resolution::new(1920, 1080))
    );
    assert_eq!(infer_resolution(7), None);
}
