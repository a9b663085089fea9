use super::*;

const BASE: &str = r#"{
    "calibration_dir": "calib",
    "input": "dome.mp4",
    "output_dir": "out",
    "defaults": { "crf": 20, "decimate": false },
    "nodes": [
        { "hostname": "node-a" },
        {
            "hostname": "node-b",
            "output": "custom/b.mp4",
            "settings": { "crf": 23, "fps": 60, "backend": "gpu", "decimation_tolerance": 1.0 }
        }
    ]
}"#;

#[test]
fn node_settings_override_cluster_defaults() {
    let cfg = ClusterConfig::from_json_str(BASE).unwrap();
    let plans = cfg.plans();
    assert_eq!(plans.len(), 2);

    let a = &plans[0];
    assert_eq!(a.crf, 20);
    assert!(!a.decimation.enabled);
    assert_eq!(a.fps.num, DEFAULT_FPS);
    assert_eq!(a.max_empty_reads, DEFAULT_MAX_EMPTY_READS);
    assert_eq!(a.backend, BackendKind::Cpu);
    assert_eq!(a.output, PathBuf::from("out").join("node-a.mp4"));
    assert_eq!(a.input, PathBuf::from("dome.mp4"));

    let b = cfg.plan_for("node-b").unwrap();
    assert_eq!(b.crf, 23);
    assert_eq!(b.fps.num, 60);
    assert_eq!(b.backend, BackendKind::Gpu);
    assert!(!b.decimation.enabled);
    assert_eq!(b.decimation.tolerance_pixels, 1.0);
    assert_eq!(b.output, PathBuf::from("custom/b.mp4"));
    assert!(cfg.plan_for("node-c").is_none());
}

#[test]
fn legacy_node_id_schema_is_rejected() {
    let text = r#"{
        "calibration_dir": "c", "input": "i.mp4", "output_dir": "o",
        "nodes": [ { "nodeId": 3, "hostname": "node-a" } ]
    }"#;
    let err = ClusterConfig::from_json_str(text).unwrap_err();
    assert!(matches!(err, DomeWarpError::Config(_)));
    assert!(err.to_string().contains("nodeId"), "{err}");
}

#[test]
fn duplicates_unknown_fields_and_bad_values_are_rejected() {
    let dup = r#"{ "calibration_dir": "c", "input": "i", "output_dir": "o",
        "nodes": [ { "hostname": "a" }, { "hostname": "a" } ] }"#;
    assert!(ClusterConfig::from_json_str(dup).unwrap_err().to_string().contains("duplicate"));

    let unknown = r#"{ "calibration_dir": "c", "input": "i", "output_dir": "o",
        "nodes": [ { "hostname": "a", "projectors": 3 } ] }"#;
    assert!(ClusterConfig::from_json_str(unknown).is_err());

    let crf = r#"{ "calibration_dir": "c", "input": "i", "output_dir": "o",
        "nodes": [ { "hostname": "a", "settings": { "crf": 99 } } ] }"#;
    assert!(ClusterConfig::from_json_str(crf).is_err());

    let empty = r#"{ "calibration_dir": "c", "input": "i", "output_dir": "o", "nodes": [] }"#;
    assert!(ClusterConfig::from_json_str(empty).is_err());

    assert!(ClusterConfig::from_json_str("not json").is_err());
}

#[test]
fn missing_config_file_is_a_config_error() {
    let err = ClusterConfig::load(Path::new("target/does/not/exist.json")).unwrap_err();
    assert!(matches!(err, DomeWarpError::Config(_)));
}
