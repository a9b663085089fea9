use super::*;
use crate::{foundation::core::PixelFormat, warp::map::WarpPixel};
use glam::Vec3;

#[test]
fn readback_is_bottom_up() {
    let mut backend = CpuRasterBackend::new();
    // Top warp row valid, bottom row invalid.
    let warp = WarpMap::from_fn(2, 2, |_, y| {
        if y == 0 {
            WarpPixel::new(Vec3::new(0.0, 0.0, -1.0), 1.0)
        } else {
            WarpPixel::ZERO
        }
    })
    .unwrap();

    let input = backend.create_input_texture(Resolution::new(4, 2)).unwrap();
    backend
        .upload_input(input, &Frame::solid_rgb(4, 2, [10, 20, 30]))
        .unwrap();
    let warp_tex = backend.create_warp_texture(&warp).unwrap();
    let target = backend.create_target(warp.resolution()).unwrap();
    backend
        .draw_warp(&WarpDraw {
            target,
            input,
            warp: warp_tex,
        })
        .unwrap();
    backend.flush().unwrap();
    let rb = backend.read_target(target).unwrap();

    assert_eq!((rb.width, rb.height), (2, 2));
    // Readback row 0 is the bottom output row (invalid => black).
    assert_eq!(&rb.rgba[0..8], &[0, 0, 0, 255, 0, 0, 0, 255]);
    assert_eq!(&rb.rgba[8..16], &[10, 20, 30, 255, 10, 20, 30, 255]);
}

#[test]
fn upload_honours_stride_and_checks_size() {
    let mut backend = CpuRasterBackend::new();
    let input = backend.create_input_texture(Resolution::new(2, 1)).unwrap();
    let mut data = vec![0u8; 16];
    data[..6].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
    let frame = Frame::from_raw(2, 1, PixelFormat::Rgb24, 16, data).unwrap();
    backend.upload_input(input, &frame).unwrap();

    let Some(CpuTexture::Input { rgba, .. }) = backend.textures.get(&input) else {
        panic!("input texture missing");
    };
    assert_eq!(rgba, &vec![1, 2, 3, 255, 4, 5, 6, 255]);

    let wrong = Frame::solid_rgb(3, 1, [0, 0, 0]);
    assert!(backend.upload_input(input, &wrong).is_err());
}

#[test]
fn release_frees_resources() {
    let mut backend = CpuRasterBackend::new();
    let t = backend.create_input_texture(Resolution::new(1, 1)).unwrap();
    let g = backend.create_target(Resolution::new(1, 1)).unwrap();
    assert_eq!(backend.live_resources(), 2);
    backend.release_texture(t);
    backend.release_target(g);
    backend.release_target(g);
    assert_eq!(backend.live_resources(), 0);
    assert!(backend.read_target(g).is_err());
    assert!(backend.create_target(Resolution::new(0, 1)).is_err());
}
