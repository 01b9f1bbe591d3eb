use super::*;
use crate::foundation::core::{BezPath, PixelRect};
use crate::render::layer::LayerBlend;
use crate::render::recording::{RecordingTarget, TargetCall};
use crate::render::target::SurfaceUsage;
use crate::scene::node::{Antialias, TextMode};

#[test]
fn pops_restore_flat_state() {
    let mut root = RecordingTarget::new(100, 100);
    let mut stack = StateStack::default();

    stack.push_transform(Affine::translate((10.0, 0.0)));
    stack.push_clip(Rect::new(0.0, 0.0, 50.0, 50.0));
    stack.push_options(RenderOptions {
        text_mode: TextMode::Aliased,
        ..RenderOptions::default()
    });
    stack.push_transform(Affine::scale(2.0));
    stack.push_noop();

    assert_eq!(stack.transform(), Affine::translate((10.0, 0.0)) * Affine::scale(2.0));
    assert_eq!(stack.clip(), Rect::new(0.0, 0.0, 50.0, 50.0));
    assert_eq!(stack.options().text_mode, TextMode::Aliased);
    let counts = stack.counts();
    assert_eq!(counts.transforms, 2);
    assert_eq!(counts.no_ops, 1);
    assert_eq!(counts.total(), 5);

    stack.pop_to(1, &mut root).unwrap();
    assert_eq!(stack.depth(), 1);
    assert_eq!(stack.transform(), Affine::translate((10.0, 0.0)));
    assert_eq!(stack.clip(), INFINITE_RECT);
    assert_eq!(stack.options(), RenderOptions::default());

    stack.pop_to(0, &mut root).unwrap();
    assert_eq!(stack.transform(), Affine::IDENTITY);
    assert!(root.calls().is_empty());
}

#[test]
fn clip_only_shrinks() {
    let mut stack = StateStack::default();
    stack.push_clip(Rect::new(0.0, 0.0, 10.0, 10.0));
    stack.push_clip(Rect::new(5.0, 5.0, 20.0, 20.0));
    assert_eq!(stack.clip(), Rect::new(5.0, 5.0, 10.0, 10.0));
    stack.push_clip(Rect::new(50.0, 50.0, 60.0, 60.0));
    assert!(stack.clip().area() <= 0.0);
}

#[test]
fn guidelines_snap_the_translation() {
    let mut root = RecordingTarget::new(10, 10);
    let mut stack = StateStack::default();
    stack.push_transform(Affine::translate((2.4, 3.6)));
    stack.push_guidelines(Guidelines {
        snap_x: true,
        snap_y: false,
    });
    assert_eq!(stack.transform().translation().x, 2.0);
    assert_eq!(stack.transform().translation().y, 3.6);
    assert_eq!(stack.counts().guidelines, 1);

    stack.pop_to(1, &mut root).unwrap();
    assert_eq!(stack.transform().translation().x, 2.4);
}

#[test]
fn scene_3d_is_balanced_on_the_target() {
    let mut root = RecordingTarget::new(100, 100);
    let mut stack = StateStack::default();
    let viewport = Rect::new(10.0, 10.0, 60.0, 60.0);
    stack
        .push_scene_3d(&mut root, viewport, Affine::translate((10.0, 10.0)))
        .unwrap();
    assert_eq!(root.open_3d(), 1);
    assert_eq!(stack.clip(), viewport);
    assert_eq!(stack.transform(), Affine::translate((10.0, 10.0)));

    stack.pop_to(0, &mut root).unwrap();
    assert_eq!(root.open_3d(), 0);
    assert_eq!(stack.clip(), INFINITE_RECT);
}

#[test]
fn draws_go_to_the_innermost_surface() {
    let mut root = RecordingTarget::new(100, 100);
    let mut stack = StateStack::default();
    stack
        .push_intermediate_layer(
            &mut root,
            PixelRect::of_size(10, 10),
            4096,
            SurfaceUsage::Intermediate,
            LayerBlend::plain(),
        )
        .unwrap();
    let state = stack.draw_state();
    stack
        .active_target(&mut root)
        .draw_path(&state, &BezPath::new(), None, None)
        .unwrap();
    assert_eq!(
        root.count(|c| matches!(c, TargetCall::DrawPath { surface: 1, .. })),
        1
    );
    stack.pop_to(0, &mut root).unwrap();
    assert_eq!(root.live_surfaces(), 0);
}

#[test]
fn pop_to_stops_at_the_first_failure() {
    let mut root = RecordingTarget::new(100, 100);
    let mut stack = StateStack::default();
    stack.push_transform(Affine::scale(2.0));
    stack
        .push_native_layer(&mut root, Rect::new(0.0, 0.0, 10.0, 10.0), Antialias::AntiAliased, 0.5)
        .unwrap();
    stack.push_clip(Rect::new(0.0, 0.0, 5.0, 5.0));

    root.fail_at(Some(root.fallible_calls()));
    assert!(stack.pop_to(0, &mut root).is_err());
    assert_eq!(stack.depth(), 1);
    assert_eq!(root.open_layers(), 0);
}

#[test]
fn unwind_empties_the_stack_and_keeps_the_first_error() {
    let mut root = RecordingTarget::new(100, 100);
    let mut stack = StateStack::default();
    stack
        .push_native_layer(&mut root, Rect::new(0.0, 0.0, 10.0, 10.0), Antialias::AntiAliased, 1.0)
        .unwrap();
    stack
        .push_scene_3d(&mut root, Rect::new(0.0, 0.0, 10.0, 10.0), Affine::IDENTITY)
        .unwrap();
    stack.push_transform(Affine::scale(3.0));

    let first = root.fallible_calls();
    root.fail_at(Some(first));
    let err = stack.unwind_to(0, &mut root).unwrap_err();
    assert!(err.to_string().contains(&format!("call {first}")));
    assert_eq!(stack.depth(), 0);
    assert_eq!(stack.transform(), Affine::IDENTITY);
    assert_eq!(root.open_3d(), 0);
    assert_eq!(root.open_layers(), 0);
}

#[test]
fn unwind_discards_offscreen_content() {
    let mut root = RecordingTarget::new(100, 100);
    let mut stack = StateStack::default();
    stack
        .push_intermediate_layer(
            &mut root,
            PixelRect::of_size(10, 10),
            4096,
            SurfaceUsage::Intermediate,
            LayerBlend::plain(),
        )
        .unwrap();
    stack.unwind_to(0, &mut root).unwrap();
    assert_eq!(root.draw_count(), 0);
    assert_eq!(root.live_surfaces(), 0);
}
