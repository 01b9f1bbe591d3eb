use super::*;
use crate::foundation::core::{Color, Point};

fn red() -> Brush {
    Brush::solid(Color::rgb(255, 0, 0))
}

#[test]
fn draw_command_bounds_include_stroke_outset() {
    let cmd = DrawCommand::Rect {
        rect: Rect::new(10.0, 10.0, 20.0, 20.0),
        fill: None,
        pen: Some(Pen {
            brush: red(),
            stroke: Stroke::new(4.0).with_join(kurbo::Join::Round),
        }),
    };
    assert_eq!(cmd.bounds(), Rect::new(8.0, 8.0, 22.0, 22.0));

    let flipped = DrawCommand::fill_rect(Rect::new(5.0, 5.0, 0.0, 0.0), red());
    assert_eq!(flipped.bounds(), Rect::new(0.0, 0.0, 5.0, 5.0));
}

#[test]
fn miter_outset_uses_the_miter_limit() {
    let pen = Pen {
        brush: red(),
        stroke: Stroke::new(2.0)
            .with_join(kurbo::Join::Miter)
            .with_miter_limit(4.0),
    };
    assert_eq!(pen.outset(), 4.0);
}

#[test]
fn content_bounds_union_commands() {
    let node = VisualNode::content(vec![
        DrawCommand::fill_rect(Rect::new(0.0, 0.0, 10.0, 10.0), red()),
        DrawCommand::fill_rect(Rect::new(20.0, 5.0, 30.0, 40.0), red()),
    ]);
    assert_eq!(node.content_bounds(), Rect::new(0.0, 0.0, 30.0, 40.0));
    assert_eq!(VisualNode::group().content_bounds(), Rect::ZERO);
}

#[test]
fn offset_applies_after_transform() {
    let node = VisualNode::group()
        .with_transform(Affine::scale(2.0))
        .with_offset(Vec2::new(10.0, 0.0));
    let p = node.local_transform() * Point::new(1.0, 1.0);
    assert_eq!(p, Point::new(12.0, 2.0));
}

#[test]
fn scroll_shifts_content_and_viewport_clips() {
    let node = VisualNode::group().with_scroll(ScrollInfo {
        offset: Vec2::new(0.0, 50.0),
        viewport: Some(Size::new(100.0, 100.0)),
    });
    assert_eq!(
        node.content_transform() * Point::new(0.0, 60.0),
        Point::new(0.0, 10.0)
    );

    let footprint = node.local_footprint(Rect::new(0.0, 0.0, 100.0, 500.0));
    assert_eq!(footprint, Rect::new(0.0, 0.0, 100.0, 100.0));
    assert!(node.has_layer_effects());
}

#[test]
fn effect_padding_applies_before_the_clip() {
    let node = VisualNode::group()
        .with_effect(Effect::blur(5))
        .with_clip(Clip::Rect(Rect::new(0.0, 0.0, 12.0, 12.0)));
    let subtree = Rect::new(2.0, 2.0, 10.0, 10.0);
    assert_eq!(node.effect_extent(subtree), Rect::new(-3.0, -3.0, 15.0, 15.0));
    assert_eq!(node.local_footprint(subtree), Rect::new(0.0, 0.0, 12.0, 12.0));
}

#[test]
fn identity_effect_adds_no_padding_or_layer() {
    let node = VisualNode::group().with_effect(Effect::blur(0));
    assert_eq!(node.effect_padding(), 0.0);
    assert!(!node.has_layer_effects());
}

#[test]
fn bounds_in_parent_maps_through_local_transform() {
    let node = VisualNode::group().with_offset(Vec2::new(5.0, 5.0));
    assert_eq!(
        node.bounds_in_parent(Rect::new(0.0, 0.0, 10.0, 10.0)),
        Rect::new(5.0, 5.0, 15.0, 15.0)
    );
}

#[test]
fn overrides_inherit_unset_options() {
    let base = RenderOptions {
        antialias: Antialias::AntiAliased,
        text_mode: TextMode::Grayscale,
        interpolation: Interpolation::Linear,
    };
    let o = RenderOptionOverrides {
        antialias: Some(Antialias::Aliased),
        ..RenderOptionOverrides::default()
    };
    assert!(!o.is_empty());
    let applied = o.apply_to(base);
    assert_eq!(applied.antialias, Antialias::Aliased);
    assert_eq!(applied.text_mode, TextMode::Grayscale);
    assert!(RenderOptionOverrides::default().is_empty());
}

#[test]
fn path_clip_bounds_use_the_bounding_box() {
    let mut path = BezPath::new();
    path.move_to((0.0, 0.0));
    path.line_to((10.0, 0.0));
    path.line_to((5.0, 8.0));
    path.close_path();
    let clip = Clip::Path(path);
    assert_eq!(clip.bounds(), Rect::new(0.0, 0.0, 10.0, 8.0));
    assert!(clip.as_rect().is_none());
}
