use super::*;

#[test]
fn layout_uses_widest_and_tallest_projector() {
    let l = CompositeLayout::for_sizes(&[
        Resolution::new(4, 2),
        Resolution::new(6, 3),
        Resolution::new(2, 5),
    ])
    .unwrap();
    assert_eq!((l.slot_width, l.slot_height), (6, 5));
    assert_eq!(l.total_width, 18);
    assert_eq!(l.slot_x(2), 12);
    assert!(CompositeLayout::for_sizes(&[]).is_err());
}

#[test]
fn smaller_frames_are_stretched_not_centred() {
    let c = Compositor::new(vec![Resolution::new(4, 2), Resolution::new(2, 1)]).unwrap();
    let mut small = Frame::new(2, 1, PixelFormat::Rgb24);
    small.set_pixel_rgb(0, 0, [10, 0, 0]);
    small.set_pixel_rgb(1, 0, [20, 0, 0]);
    let out = c
        .compose(&[Frame::solid_rgb(4, 2, [1, 1, 1]), small])
        .unwrap();

    assert_eq!(out.resolution(), Resolution::new(8, 2));
    for y in 0..2 {
        assert_eq!(out.pixel_rgb(4, y), Some([10, 0, 0]));
        assert_eq!(out.pixel_rgb(5, y), Some([10, 0, 0]));
        assert_eq!(out.pixel_rgb(6, y), Some([20, 0, 0]));
        assert_eq!(out.pixel_rgb(7, y), Some([20, 0, 0]));
    }
}

#[test]
fn uncovered_regions_stay_black() {
    let c = Compositor::new(vec![Resolution::new(3, 3), Resolution::new(3, 3)]).unwrap();
    let out = c
        .compose(&[Frame::solid_rgb(3, 3, [9, 9, 9]), Frame::new(0, 0, PixelFormat::Rgb24)])
        .unwrap();
    assert_eq!(out.width(), 6);
    for y in 0..3 {
        for x in 3..6 {
            assert_eq!(out.pixel_rgb(x, y), Some([0, 0, 0]));
        }
    }
    assert!(c.compose(&[Frame::solid_rgb(3, 3, [0, 0, 0])]).is_err());
}
