use super::*;
use crate::{calibration::warp_file::write_warp_file, warp::map::WarpPixel};
use glam::Vec3;

fn fixture_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("unit_loader").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn forward_map(w: u32, h: u32) -> WarpMap {
    WarpMap::filled(w, h, WarpPixel::new(Vec3::new(0.0, 0.0, -1.0), 1.0)).unwrap()
}

#[test]
fn missing_descriptor_is_not_found() {
    let dir = fixture_dir("missing");
    let loader = CalibrationLoader::new(&dir);
    let err = loader.load_node("nobody").unwrap_err();
    assert!(matches!(err, DomeWarpError::CalibrationNotFound(_)), "{err}");
}

#[test]
fn loads_projectors_and_skips_broken_warp_maps() {
    let dir = fixture_dir("partial");
    write_warp_file(&dir.join("good.bin"), &forward_map(4, 2)).unwrap();
    std::fs::write(dir.join("short.bin"), [0u8; 10]).unwrap();
    std::fs::write(
        dir.join("node-a.txt"),
        "id 0\nfilepath /far/away/good.bin\nwidth 4\nheight 2\n\
         id 1\nfilepath short.bin\nwidth 4\nheight 2\n\
         id 2\nfilepath absent.bin\nwidth 4\nheight 2\n",
    )
    .unwrap();

    let loader = CalibrationLoader::new(&dir);
    let node = loader.load_node("node-a").unwrap();
    assert_eq!(node.projectors.len(), 3);

    let loaded = loader.load_projectors("node-a").unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].config.warp_map_filename, "good.bin");
    assert_eq!(loaded[0].warp.resolution(), node.projectors[0].resolution);
}

#[test]
fn node_without_usable_projectors_fails() {
    let dir = fixture_dir("empty");
    std::fs::write(dir.join("node-b.txt"), "id 0\nfilepath gone.bin\nwidth 2\nheight 2\n").unwrap();
    let err = CalibrationLoader::new(&dir)
        .load_projectors("node-b")
        .unwrap_err();
    assert!(matches!(err, DomeWarpError::CalibrationParse(_)), "{err}");
}
