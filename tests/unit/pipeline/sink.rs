use super::*;

fn cfg(crf: u32, fps: u32) -> EncodeConfig {
    EncodeConfig {
        out_path: PathBuf::from("target/unit_sink/out.mp4"),
        fps: Fps { num: fps, den: 1 },
        crf,
        overwrite: true,
    }
}

#[test]
fn config_validation_catches_bad_values() {
    assert!(cfg(18, 30).validate().is_ok());
    assert!(cfg(52, 30).validate().is_err());
    assert!(cfg(18, 0).validate().is_err());
}

#[test]
fn in_memory_sink_enforces_one_size_and_finish() {
    let mut sink = InMemorySink::new();
    sink.write_frame(&Frame::solid_rgb(4, 2, [1, 2, 3])).unwrap();
    assert!(sink.write_frame(&Frame::solid_rgb(2, 2, [1, 2, 3])).is_err());
    sink.finish().unwrap();
    assert!(sink.write_frame(&Frame::solid_rgb(4, 2, [1, 2, 3])).is_err());
    assert_eq!(sink.frames_written(), 1);
}

#[test]
fn ffmpeg_sink_encodes_odd_sized_frames() {
    if !is_ffmpeg_on_path() {
        return;
    }
    let mut c = cfg(30, 10);
    c.out_path = PathBuf::from("target/unit_sink/odd.mp4");
    let mut sink = FfmpegSink::new(c.clone()).unwrap();
    for i in 0..3u8 {
        let strided = {
            let mut f = Frame::with_stride(7, 5, PixelFormat::Rgb24, 32).unwrap();
            for y in 0..5 {
                for x in 0..7 {
                    f.set_pixel_rgb(x, y, [i * 40, 0, 0]);
                }
            }
            f
        };
        sink.write_frame(&strided).unwrap();
    }
    sink.finish().unwrap();
    assert_eq!(sink.frames_written(), 3);
    assert!(std::fs::metadata(&c.out_path).unwrap().len() > 0);
}
