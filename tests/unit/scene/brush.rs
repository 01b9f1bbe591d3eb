use super::*;

fn red_to_blue() -> Brush {
    Brush::linear(
        Point::new(0.0, 0.0),
        Point::new(10.0, 0.0),
        [
            GradientStop {
                offset: 1.0,
                color: Color::rgb(0, 0, 255),
            },
            GradientStop {
                offset: 0.0,
                color: Color::rgb(255, 0, 0),
            },
        ],
    )
}

#[test]
fn solid_sample_is_premultiplied() {
    let b = Brush::solid(Color::rgba(255, 0, 0, 128));
    assert_eq!(b.sample(Point::new(3.0, 4.0)).to_array(), [128, 0, 0, 128]);
    assert!(!b.is_opaque());
    assert_eq!(b.as_solid(), Some(Color::rgba(255, 0, 0, 128)));
}

#[test]
fn gradient_stops_are_sorted_and_padded() {
    let b = red_to_blue();
    assert!(b.is_opaque());
    assert_eq!(b.sample(Point::new(-5.0, 0.0)).to_array(), [255, 0, 0, 255]);
    assert_eq!(b.sample(Point::new(50.0, 3.0)).to_array(), [0, 0, 255, 255]);
}

#[test]
fn gradient_interpolates_along_axis_only() {
    let b = red_to_blue();
    let mid = b.sample(Point::new(5.0, 0.0));
    assert_eq!(mid, b.sample(Point::new(5.0, 100.0)));
    assert!((i32::from(mid.r) - 128).abs() <= 1);
    assert!((i32::from(mid.b) - 128).abs() <= 1);
}

#[test]
fn degenerate_gradient_uses_first_stop() {
    let b = Brush::linear(
        Point::new(1.0, 1.0),
        Point::new(1.0, 1.0),
        [GradientStop {
            offset: 0.0,
            color: Color::WHITE,
        }],
    );
    assert_eq!(b.sample(Point::new(9.0, 9.0)).to_array(), [255; 4]);
    let empty = Brush::linear(Point::ZERO, Point::new(1.0, 0.0), []);
    assert_eq!(empty.sample(Point::ZERO).a, 0);
    assert!(!empty.is_opaque());
}
