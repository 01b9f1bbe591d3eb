use super::*;

#[test]
fn padding_follows_blur_radius() {
    assert_eq!(Effect::blur(6).padding(), 6.0);
    assert_eq!(
        Effect::ColorMatrix {
            matrix: IDENTITY_COLOR_MATRIX
        }
        .padding(),
        0.0
    );
}

#[test]
fn identity_detection() {
    assert!(Effect::blur(0).is_identity());
    assert!(!Effect::blur(1).is_identity());
    assert!(
        Effect::ColorMatrix {
            matrix: IDENTITY_COLOR_MATRIX
        }
        .is_identity()
    );
}

#[test]
fn json_uses_kind_tag() {
    let e: Effect = serde_json::from_str(r#"{"kind":"blur","radius":4}"#).unwrap();
    assert_eq!(e, Effect::blur(4));
    let s = serde_json::to_string(&Effect::blur(2)).unwrap();
    assert!(s.contains(r#""kind":"blur""#));
}

#[test]
fn color_matrix_apply_scales_alpha() {
    let mut m = IDENTITY_COLOR_MATRIX;
    m[18] = 0.5;
    let out = Effect::ColorMatrix { matrix: m }
        .apply(&[255, 255, 255, 255], 1, 1, 1.0)
        .unwrap();
    assert_eq!(out[3], 128);
}

#[test]
fn blur_radius_scales_with_surface_scale() {
    let mut src = vec![0u8; 9 * 4];
    src[4 * 4..4 * 4 + 4].copy_from_slice(&[255, 255, 255, 255]);
    let unscaled = Effect::blur(2).apply(&src, 3, 3, 0.0001).unwrap();
    assert_eq!(unscaled, src);
    let blurred = Effect::blur(2).apply(&src, 3, 3, 1.0).unwrap();
    assert_ne!(blurred, src);
}
