use super::*;
use crate::effects::color_matrix::IDENTITY_COLOR_MATRIX;

const RED: Color = Color::rgb(255, 0, 0);
const BLUE: Color = Color::rgb(0, 0, 255);

fn target(w: u32, h: u32) -> CpuTarget {
    CpuTarget::new(w, h, CpuTargetOpts::default()).unwrap()
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> BezPath {
    Rect::new(x0, y0, x1, y1).to_path(0.1)
}

fn fill(t: &mut CpuTarget, state: &DrawState, shape: &BezPath, color: Color) {
    t.draw_path(state, shape, None, Some(&Brush::solid(color)))
        .unwrap();
}

fn near(a: [u8; 4], b: [u8; 4]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.abs_diff(y) <= 2)
}

#[test]
fn pixel_aligned_fill_is_exact() {
    let mut t = target(8, 8);
    t.clear(Color::WHITE, None).unwrap();
    fill(&mut t, &DrawState::default(), &rect(2.0, 2.0, 6.0, 6.0), RED);

    assert_eq!(t.pixel(2, 2), Some([255, 0, 0, 255]));
    assert_eq!(t.pixel(5, 5), Some([255, 0, 0, 255]));
    assert_eq!(t.pixel(1, 1), Some([255, 255, 255, 255]));
    assert_eq!(t.pixel(6, 6), Some([255, 255, 255, 255]));
    assert_eq!(t.pixel(8, 0), None);
}

#[test]
fn draws_respect_the_state_clip_and_transform() {
    let mut t = target(8, 8);
    let state = DrawState {
        transform: Affine::translate((2.0, 0.0)),
        clip: Rect::new(0.0, 0.0, 4.0, 8.0),
        ..DrawState::default()
    };
    fill(&mut t, &state, &rect(0.0, 0.0, 8.0, 8.0), RED);

    assert_eq!(t.pixel(0, 0), Some([0, 0, 0, 0]));
    assert_eq!(t.pixel(2, 0), Some([255, 0, 0, 255]));
    assert_eq!(t.pixel(3, 7), Some([255, 0, 0, 255]));
    assert_eq!(t.pixel(4, 0), Some([0, 0, 0, 0]));
}

#[test]
fn inverted_clip_draws_nothing() {
    let mut t = target(4, 4);
    let state = DrawState {
        clip: Rect::new(4.0, 4.0, 0.0, 0.0),
        ..DrawState::default()
    };
    fill(&mut t, &state, &rect(0.0, 0.0, 4.0, 4.0), RED);
    assert!(t.data().iter().all(|&b| b == 0));
}

#[test]
fn aliased_mode_drops_partial_coverage() {
    let shape = rect(0.0, 0.0, 2.25, 1.0);
    let mut aa = target(4, 1);
    fill(&mut aa, &DrawState::default(), &shape, RED);
    let partial = aa.pixel(2, 0).unwrap()[3];
    assert!(partial > 0 && partial < 128, "coverage {partial}");

    let mut aliased = target(4, 1);
    let mut state = DrawState::default();
    state.options.antialias = Antialias::Aliased;
    fill(&mut aliased, &state, &shape, RED);
    assert_eq!(aliased.pixel(2, 0), Some([0, 0, 0, 0]));
    assert_eq!(aliased.pixel(1, 0), Some([255, 0, 0, 255]));
}

#[test]
fn stroke_paints_outline_only() {
    let mut t = target(10, 10);
    let pen = Pen::new(Brush::solid(BLUE), 2.0);
    t.draw_path(&DrawState::default(), &rect(2.0, 2.0, 8.0, 8.0), Some(&pen), None)
        .unwrap();
    assert_eq!(t.pixel(1, 5), Some([0, 0, 255, 255]));
    assert_eq!(t.pixel(5, 5), Some([0, 0, 0, 0]));
}

#[test]
fn alpha_layer_blends_on_end() {
    let mut t = target(4, 4);
    t.begin_layer(Rect::new(0.0, 0.0, 2.0, 4.0), Antialias::AntiAliased, None, 0.5)
        .unwrap();
    assert_eq!(t.layer_depth(), 1);
    fill(&mut t, &DrawState::default(), &rect(0.0, 0.0, 4.0, 4.0), RED);
    assert_eq!(t.pixel(0, 0), Some([255, 0, 0, 255]));
    t.end_layer().unwrap();

    assert_eq!(t.layer_depth(), 0);
    assert!(near(t.pixel(0, 0).unwrap(), [128, 0, 0, 128]));
    assert_eq!(t.pixel(3, 0), Some([0, 0, 0, 0]));
}

#[test]
fn opaque_layer_only_clips() {
    let mut t = target(4, 4);
    t.begin_layer(Rect::new(1.0, 1.0, 3.0, 3.0), Antialias::AntiAliased, None, 1.0)
        .unwrap();
    fill(&mut t, &DrawState::default(), &rect(0.0, 0.0, 4.0, 4.0), RED);
    t.end_layer().unwrap();
    assert_eq!(t.pixel(1, 1), Some([255, 0, 0, 255]));
    assert_eq!(t.pixel(0, 0), Some([0, 0, 0, 0]));
}

#[test]
fn masked_layer_keeps_inside_of_mask() {
    let mut t = target(8, 8);
    let mask = rect(0.0, 0.0, 4.0, 8.0);
    t.begin_layer(
        Rect::new(0.0, 0.0, 8.0, 8.0),
        Antialias::AntiAliased,
        Some(&mask),
        1.0,
    )
    .unwrap();
    fill(&mut t, &DrawState::default(), &rect(0.0, 0.0, 8.0, 8.0), RED);
    t.end_layer().unwrap();
    assert_eq!(t.pixel(3, 3), Some([255, 0, 0, 255]));
    assert_eq!(t.pixel(4, 3), Some([0, 0, 0, 0]));
}

#[test]
fn unbalanced_end_layer_is_a_protocol_error() {
    let mut t = target(2, 2);
    assert!(t.end_layer().is_err());
}

#[test]
fn end_frame_discards_open_layers() {
    let mut t = target(4, 4);
    t.begin_frame().unwrap();
    assert!(t.begin_frame().is_err());
    t.begin_layer(Rect::new(0.0, 0.0, 4.0, 4.0), Antialias::AntiAliased, None, 0.5)
        .unwrap();
    fill(&mut t, &DrawState::default(), &rect(0.0, 0.0, 4.0, 4.0), RED);

    assert!(t.end_frame().is_err());
    assert_eq!(t.layer_depth(), 0);
    assert_eq!(t.pixel(0, 0), Some([0, 0, 0, 0]));
    assert!(t.end_frame().is_err());
    t.begin_frame().unwrap();
    t.end_frame().unwrap();
}

#[test]
fn surfaces_round_trip_through_draw_bitmap() {
    let mut t = target(8, 8);
    let mut s = t
        .create_render_target_bitmap(2, 2, SurfaceUsage::Intermediate, SurfaceInit::Transparent)
        .unwrap();
    s.clear(BLUE, None).unwrap();
    let bitmap = s.into_bitmap().unwrap();

    let state = DrawState {
        transform: Affine::translate((4.0, 4.0)),
        ..DrawState::default()
    };
    t.draw_bitmap(&state, &bitmap, None, &[]).unwrap();
    assert_eq!(t.pixel(4, 4), Some([0, 0, 255, 255]));
    assert_eq!(t.pixel(5, 5), Some([0, 0, 255, 255]));
    assert_eq!(t.pixel(6, 6), Some([0, 0, 0, 0]));

    t.release_bitmap(bitmap);
    assert_eq!(t.pool_stats().retained_surfaces, 1);
}

#[test]
fn oversized_surface_is_an_allocation_error() {
    let caps = TargetCaps {
        max_surface_dim: 16,
        ..TargetCaps::default()
    };
    let mut t = CpuTarget::new(4, 4, CpuTargetOpts::default().with_caps(caps)).unwrap();
    let err = t
        .create_render_target_bitmap(17, 1, SurfaceUsage::Intermediate, SurfaceInit::Transparent)
        .err()
        .unwrap();
    assert!(matches!(err, StrataError::Allocation(_)));
}

#[test]
fn draw_bitmap_applies_post_ops() {
    let mut t = target(4, 1);
    let bitmap = Bitmap::solid(4, 1, RED).unwrap();
    t.draw_bitmap(
        &DrawState::default(),
        &bitmap,
        Some(&rect(0.0, 0.0, 2.0, 1.0)),
        &[PostOp::Opacity(0.5)],
    )
    .unwrap();
    assert!(near(t.pixel(0, 0).unwrap(), [128, 0, 0, 128]));
    assert_eq!(t.pixel(2, 0), Some([0, 0, 0, 0]));

    let mut t = target(4, 1);
    let mask = PostOp::OpacityMask {
        brush: Brush::solid(Color::TRANSPARENT),
        transform: Affine::IDENTITY,
    };
    t.draw_bitmap(&DrawState::default(), &bitmap, None, &[mask])
        .unwrap();
    assert!(t.data().iter().all(|&b| b == 0));
}

#[test]
fn compose_effect_honors_caps() {
    let input = Bitmap::solid(2, 2, RED).unwrap();
    let effect = Effect::ColorMatrix {
        matrix: IDENTITY_COLOR_MATRIX,
    };
    let state = DrawState::default();

    let mut direct = target(4, 4);
    let out = direct
        .compose_effect(&state, 1.0, &effect, 2, 2, &input)
        .unwrap();
    assert_eq!(out.pixel(1, 1), Some([255, 0, 0, 255]));
    assert!(direct.compose_effect(&state, 1.0, &effect, 3, 2, &input).is_err());

    let caps = TargetCaps {
        effects: EffectSupport::SoftwareOnly,
        ..TargetCaps::default()
    };
    let mut soft = CpuTarget::new(4, 4, CpuTargetOpts::default().with_caps(caps)).unwrap();
    assert!(soft.compose_effect(&state, 1.0, &effect, 2, 2, &input).is_err());

    let mut fallback = soft
        .create_render_target_bitmap(2, 2, SurfaceUsage::SoftwareFallback, SurfaceInit::Transparent)
        .unwrap();
    assert_eq!(fallback.caps().effects, EffectSupport::Direct);
    assert!(fallback.compose_effect(&state, 1.0, &effect, 2, 2, &input).is_ok());
}

#[test]
fn depth_test_keeps_the_nearest_draw() {
    let mut t = target(4, 4);
    let shape = rect(0.0, 0.0, 4.0, 4.0);
    t.begin_3d(Rect::new(0.0, 0.0, 4.0, 4.0)).unwrap();
    assert!(t.begin_3d(Rect::ZERO).is_err());

    let near_state = DrawState {
        depth: Some(1.0),
        ..DrawState::default()
    };
    let far_state = DrawState {
        depth: Some(2.0),
        ..DrawState::default()
    };
    fill(&mut t, &near_state, &shape, RED);
    fill(&mut t, &far_state, &shape, BLUE);
    assert_eq!(t.pixel(1, 1), Some([255, 0, 0, 255]));

    let nearer = DrawState {
        depth: Some(0.5),
        ..DrawState::default()
    };
    fill(&mut t, &nearer, &shape, BLUE);
    assert_eq!(t.pixel(1, 1), Some([0, 0, 255, 255]));
    t.end_3d().unwrap();
    assert!(t.end_3d().is_err());

    fill(&mut t, &far_state, &shape, RED);
    assert_eq!(t.pixel(1, 1), Some([255, 0, 0, 255]));
}

#[test]
fn surface_with_open_layer_cannot_finish() {
    let mut t = target(4, 4);
    let mut s = t
        .create_render_target_bitmap(2, 2, SurfaceUsage::Intermediate, SurfaceInit::Transparent)
        .unwrap();
    s.begin_layer(Rect::new(0.0, 0.0, 2.0, 2.0), Antialias::AntiAliased, None, 0.5)
        .unwrap();
    assert!(s.into_bitmap().is_err());
}

#[test]
fn snapshot_copies_pixels() {
    let mut t = target(2, 2);
    t.clear(RED, Some(Rect::new(0.0, 0.0, 1.0, 1.0))).unwrap();
    let snap = t.snapshot().unwrap();
    assert_eq!(snap.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(snap.pixel(1, 1), Some([0, 0, 0, 0]));
}
