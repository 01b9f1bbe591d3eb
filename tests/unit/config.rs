use super::*;
use std::collections::HashMap;

fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn defaults_are_valid() {
    let config = CompositorConfig::default();
    config.validate().unwrap();
    assert_eq!(config.merge_threshold, 50_000.0);
    assert_eq!(config.max_intermediate_dimension, 4096);
    assert!(config.use_native_layers);
    assert!(!config.debug.show_dirty_regions);
}

#[test]
fn json_fills_missing_fields_with_defaults() {
    let config = CompositorConfig::from_json_str(
        r#"{ "merge_threshold": 10, "traversal_direction": "right_to_left", "debug": { "show_dirty_regions": true } }"#,
    )
    .unwrap();
    assert_eq!(config.merge_threshold, 10.0);
    assert_eq!(config.traversal_direction, Direction::RightToLeft);
    assert!(config.debug.show_dirty_regions);
    assert_eq!(config.debug.dirty_region_color, DebugConfig::default().dirty_region_color);
    assert!(config.pixel_snapping);
}

#[test]
fn json_rejects_unknown_and_invalid_fields() {
    assert!(CompositorConfig::from_json_str(r#"{ "merge_treshold": 1 }"#).is_err());
    let err = CompositorConfig::from_json_str(r#"{ "max_intermediate_dimension": 0 }"#).unwrap_err();
    assert!(matches!(err, StrataError::Config(_)));
    assert!(CompositorConfig::from_json_str(r#"{ "merge_threshold": -1 }"#).is_err());
}

#[test]
fn overrides_replace_values() {
    let config = CompositorConfig::default()
        .with_overrides_from(vars(&[
            ("STRATA_MERGE_THRESHOLD", " 125.5 "),
            ("STRATA_MAX_INTERMEDIATE_DIM", "1024"),
            ("STRATA_SHOW_DIRTY_REGIONS", "yes"),
        ]))
        .unwrap();
    assert_eq!(config.merge_threshold, 125.5);
    assert_eq!(config.max_intermediate_dimension, 1024);
    assert!(config.debug.show_dirty_regions);

    let config = config
        .with_overrides_from(vars(&[("STRATA_SHOW_DIRTY_REGIONS", "")]))
        .unwrap();
    assert!(!config.debug.show_dirty_regions);
}

#[test]
fn absent_overrides_change_nothing() {
    let config = CompositorConfig::default()
        .with_overrides_from(vars(&[]))
        .unwrap();
    assert_eq!(config, CompositorConfig::default());
}

#[test]
fn malformed_overrides_are_config_errors() {
    let bad = [
        ("STRATA_MERGE_THRESHOLD", "lots"),
        ("STRATA_MAX_INTERMEDIATE_DIM", "-3"),
        ("STRATA_MAX_INTERMEDIATE_DIM", "100000"),
        ("STRATA_SHOW_DIRTY_REGIONS", "maybe"),
        ("STRATA_MERGE_THRESHOLD", "NaN"),
    ];
    for (key, value) in bad {
        let err = CompositorConfig::default()
            .with_overrides_from(vars(&[(key, value)]))
            .unwrap_err();
        assert!(matches!(err, StrataError::Config(_)), "{key}={value}");
    }
}
