use super::*;

#[test]
fn ffprobe_ratios_parse() {
    assert_eq!(parse_ff_ratio("30000/1001"), Some((30000, 1001)));
    assert_eq!(parse_ff_ratio("25/0"), None);
    assert_eq!(parse_ff_ratio("25"), None);
}

#[test]
fn in_memory_source_replays_script_then_runs_dry() {
    let mut src = InMemorySource::new([Frame::solid_rgb(2, 1, [1, 1, 1])]);
    src.push_gap();
    src.push_frame(Frame::solid_rgb(2, 1, [2, 2, 2]));
    assert_eq!(src.resolution(), Some(Resolution::new(2, 1)));

    assert!(src.next_frame().unwrap().is_some());
    assert!(src.next_frame().unwrap().is_none());
    assert_eq!(
        src.next_frame().unwrap().and_then(|f| f.pixel_rgb(0, 0)),
        Some([2, 2, 2])
    );
    assert!(src.next_frame().unwrap().is_none());
    assert!(src.next_frame().unwrap().is_none());
}

#[test]
fn ffmpeg_source_decodes_generated_clip() {
    if !is_ffprobe_on_path() || !crate::pipeline::sink::is_ffmpeg_on_path() {
        return;
    }
    let dir = PathBuf::from("target").join("unit_source");
    std::fs::create_dir_all(&dir).unwrap();
    let clip = dir.join("clip.mp4");
    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-f", "lavfi", "-i", "color=c=red:s=32x16:d=0.2:r=10"])
        .args(["-pix_fmt", "yuv420p"])
        .arg(&clip)
        .status()
        .unwrap();
    if !status.success() {
        return;
    }

    let mut src = FfmpegSource::open(&clip).unwrap();
    assert_eq!(src.info().resolution, Resolution::new(32, 16));
    let mut frames = 0;
    while let Some(frame) = src.next_frame().unwrap() {
        assert_eq!(frame.resolution(), Resolution::new(32, 16));
        let [r, g, b] = frame.pixel_rgb(16, 8).unwrap();
        assert!(r > 200 && g < 60 && b < 60, "{r} {g} {b}");
        frames += 1;
    }
    assert!(frames >= 1);
}
