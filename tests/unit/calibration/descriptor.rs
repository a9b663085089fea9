use super::*;

#[test]
fn incomplete_first_record_is_dropped() {
    let text = "\
id 7
filepath /calib/a.bin
width 1920

id 9
filepath /calib/warps/b.bin
width 1920
height 1200
";
    let node = parse_descriptor("dome-01", text);
    assert_eq!(node.hostname, "dome-01");
    assert_eq!(node.projectors.len(), 1);
    let p = &node.projectors[0];
    assert_eq!(p.index, 0);
    assert_eq!(p.id, 9);
    assert_eq!(p.resolution, Resolution::new(1920, 1200));
    assert_eq!(p.warp_map_filename, "b.bin");
}

#[test]
fn index_is_completion_order_not_raw_id() {
    let text = "\
id 12
width 1280
height 800
filepath C:\\calib\\p12.bin
viewport 0 0 1 1
active 1
id 3
filepath p3.bin
height 600
width 800
";
    let node = parse_descriptor("h", text);
    let got: Vec<(usize, i64, &str)> = node
        .projectors
        .iter()
        .map(|p| (p.index, p.id, p.warp_map_filename.as_str()))
        .collect();
    assert_eq!(got, vec![(0, 12, "p12.bin"), (1, 3, "p3.bin")]);
}

#[test]
fn trailing_incomplete_record_and_stray_keys_are_ignored() {
    let text = "\
width 10
height 10
id 1
filepath a.bin
width 4
height 4
id 2
filepath b.bin
";
    let node = parse_descriptor("h", text);
    assert_eq!(node.projectors.len(), 1);
    assert_eq!(node.projectors[0].resolution, Resolution::new(4, 4));
}

#[test]
fn malformed_dimensions_leave_record_incomplete() {
    let text = "id 1\nfilepath a.bin\nwidth abc\nheight 4\nid 2\nfilepath b.bin\nwidth 0\nheight 3\n";
    assert!(parse_descriptor("h", text).projectors.is_empty());
}

#[test]
fn repeated_keys_after_completion_do_not_duplicate() {
    let text = "id 1\nfilepath a.bin\nwidth 4\nheight 4\nheight 8\n";
    let node = parse_descriptor("h", text);
    assert_eq!(node.projectors.len(), 1);
    assert_eq!(node.projectors[0].resolution.height, 4);
}

#[test]
fn basename_handles_both_separators() {
    assert_eq!(basename("/a/b/c.bin"), "c.bin");
    assert_eq!(basename("C:\\x\\y.bin"), "y.bin");
    assert_eq!(basename("plain.bin"), "plain.bin");
}
