//! Shape geometry: angle measurement, hit testing, bounds and edits

use std::f64::consts::TAU;

use framemark_shared::{Point, Rect, Vec2};

use crate::document::Shape;

/// Crosshair radius in canvas pixels, independent of zoom
pub const CROSSHAIR_RADIUS: f64 = 8.0;
/// Default pick tolerance in media pixels
pub const HIT_TOLERANCE: f64 = 6.0;
/// Approximate glyph box used to hit-test text and note anchors
pub const TEXT_CHAR_WIDTH: f64 = 8.0;
pub const TEXT_LINE_HEIGHT: f64 = 20.0;

const CURVE_SAMPLES: usize = 24;

/// Clockwise and counter-clockwise angle between the two arms of an angle
/// drawing, in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleMeasure {
    pub clockwise: f64,
    pub counter_clockwise: f64,
}

/// Measures the angle swept from the `control` arm to the `end` arm around
/// `vertex`
///
/// Canvas space has y pointing down, so a positive screen rotation is
/// clockwise. Both values are reduced modulo 2π before conversion and lie in
/// [0, 360).
pub fn measure_angle(vertex: Point, control: Point, end: Point) -> AngleMeasure {
    let first = (control.y - vertex.y).atan2(control.x - vertex.x);
    let second = (end.y - vertex.y).atan2(end.x - vertex.x);

    let clockwise = (second - first).rem_euclid(TAU);
    let counter_clockwise = (TAU - clockwise).rem_euclid(TAU);

    AngleMeasure {
        clockwise: normalize_degrees(clockwise.to_degrees()),
        counter_clockwise: normalize_degrees(counter_clockwise.to_degrees()),
    }
}

/// Folds any degree value into [0, 360)
pub fn normalize_degrees(degrees: f64) -> f64 {
    let folded = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360.0
    if folded >= 360.0 {
        0.0
    } else {
        folded
    }
}

pub fn distance_to_segment(point: Point, a: Point, b: Point) -> f64 {
    let ab = a.delta_to(b);
    let ap = a.delta_to(point);
    let len_sq = ab.dot(ab);
    if len_sq <= f64::EPSILON {
        return ap.length();
    }
    let t = (ap.dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance_to(a.offset(ab.scale(t)))
}

fn distance_to_polyline(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => point.distance_to(*only),
        _ => points
            .windows(2)
            .map(|pair| distance_to_segment(point, pair[0], pair[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Point on a quadratic Bézier at parameter `t`
pub fn quadratic_point(start: Point, control: Point, end: Point, t: f64) -> Point {
    let u = 1.0 - t;
    Point::new(
        u * u * start.x + 2.0 * u * t * control.x + t * t * end.x,
        u * u * start.y + 2.0 * u * t * control.y + t * t * end.y,
    )
}

pub fn sample_curve(start: Point, control: Point, end: Point) -> Vec<Point> {
    (0..=CURVE_SAMPLES)
        .map(|i| quadratic_point(start, control, end, i as f64 / CURVE_SAMPLES as f64))
        .collect()
}

/// Control point of the quadratic curve from `start` to `end` that passes
/// through the sampled point farthest from the chord
pub fn fit_curve_control(start: Point, samples: &[Point], end: Point) -> Point {
    let apex = samples
        .iter()
        .copied()
        .max_by(|a, b| {
            distance_to_segment(*a, start, end).total_cmp(&distance_to_segment(*b, start, end))
        })
        .unwrap_or_else(|| start.midpoint(end));

    // B(0.5) = apex  =>  C = 2·apex - (start + end) / 2
    let chord_mid = start.midpoint(end);
    Point::new(2.0 * apex.x - chord_mid.x, 2.0 * apex.y - chord_mid.y)
}

fn text_box(x: f64, y: f64, text: &str) -> Rect {
    let longest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0).max(1);
    let lines = text.lines().count().max(1);
    Rect::from_corners(
        Point::new(x, y),
        Point::new(
            x + longest as f64 * TEXT_CHAR_WIDTH,
            y + lines as f64 * TEXT_LINE_HEIGHT,
        ),
    )
}

impl Shape {
    /// Whether `point` falls on the drawn stroke (or text box) of this shape
    pub fn hit_test(&self, point: Point, tolerance: f64, stroke_width: f64) -> bool {
        let reach = tolerance + stroke_width * 0.5;
        match self {
            Shape::Freehand { points } => distance_to_polyline(point, points) <= reach,
            Shape::Line { start, end } | Shape::Arrow { start, end } => {
                distance_to_segment(point, *start, *end) <= reach
            }
            Shape::Rectangle { start, end } => {
                let rect = Rect::from_corners(*start, *end);
                let corners = [
                    rect.min,
                    Point::new(rect.max.x, rect.min.y),
                    rect.max,
                    Point::new(rect.min.x, rect.max.y),
                    rect.min,
                ];
                distance_to_polyline(point, &corners) <= reach
            }
            Shape::Ellipse {
                center,
                radius_x,
                radius_y,
            } => {
                if *radius_x <= 0.1 || *radius_y <= 0.1 {
                    return point.distance_to(*center) <= reach;
                }
                let nx = (point.x - center.x) / radius_x;
                let ny = (point.y - center.y) / radius_y;
                let d = (nx * nx + ny * ny).sqrt();
                let ring = reach / radius_x.min(*radius_y).max(1.0);
                (d - 1.0).abs() <= ring
            }
            Shape::Curve {
                start,
                control,
                end,
            } => distance_to_polyline(point, &sample_curve(*start, *control, *end)) <= reach,
            Shape::Angle {
                vertex,
                control,
                end,
                ..
            } => {
                distance_to_segment(point, *vertex, *control) <= reach
                    || distance_to_segment(point, *vertex, *end) <= reach
            }
            Shape::Crosshair { center } => point.distance_to(*center) <= CROSSHAIR_RADIUS + reach,
            Shape::Text { x, y, text } | Shape::Note { x, y, text, .. } => {
                text_box(*x, *y, text).expand(tolerance).contains(point)
            }
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Shape::Freehand { points } => points
                .iter()
                .map(|p| Rect::from_corners(*p, *p))
                .reduce(|a, b| a.union(&b))
                .unwrap_or_default(),
            Shape::Line { start, end }
            | Shape::Arrow { start, end }
            | Shape::Rectangle { start, end } => Rect::from_corners(*start, *end),
            Shape::Ellipse {
                center,
                radius_x,
                radius_y,
            } => Rect::from_center(*center, *radius_x, *radius_y),
            Shape::Curve {
                start,
                control,
                end,
            } => Rect::from_corners(*start, *end).union(&Rect::from_corners(*control, *control)),
            Shape::Angle {
                vertex,
                control,
                end,
                ..
            } => Rect::from_corners(*vertex, *control).union(&Rect::from_corners(*end, *end)),
            Shape::Crosshair { center } => {
                Rect::from_center(*center, CROSSHAIR_RADIUS, CROSSHAIR_RADIUS)
            }
            Shape::Text { x, y, text } => text_box(*x, *y, text),
            Shape::Note { x, y, text, .. } => {
                let anchor = text_box(*x, *y, text);
                match self.note_target() {
                    Some(target) => anchor.union(&Rect::from_corners(target, target)),
                    None => anchor,
                }
            }
        }
    }

    /// Box of the text content for text and note drawings
    pub fn label_box(&self) -> Option<Rect> {
        match self {
            Shape::Text { x, y, text } | Shape::Note { x, y, text, .. } => {
                Some(text_box(*x, *y, text))
            }
            _ => None,
        }
    }

    /// Representative point used for snapshot markers
    pub fn anchor(&self) -> Point {
        match self {
            Shape::Freehand { points } => points.first().copied().unwrap_or_default(),
            Shape::Line { start, .. }
            | Shape::Arrow { start, .. }
            | Shape::Curve { start, .. } => *start,
            Shape::Rectangle { start, end } => Rect::from_corners(*start, *end).center(),
            Shape::Ellipse { center, .. } | Shape::Crosshair { center } => *center,
            Shape::Angle { vertex, .. } => *vertex,
            Shape::Text { x, y, .. } => Point::new(*x, *y),
            Shape::Note { x, y, .. } => self.note_target().unwrap_or(Point::new(*x, *y)),
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        let shift = |p: &mut Point| *p = p.offset(delta);
        match self {
            Shape::Freehand { points } => points.iter_mut().for_each(shift),
            Shape::Line { start, end }
            | Shape::Arrow { start, end }
            | Shape::Rectangle { start, end } => {
                shift(start);
                shift(end);
            }
            Shape::Ellipse { center, .. } | Shape::Crosshair { center } => shift(center),
            Shape::Curve {
                start,
                control,
                end,
            } => {
                shift(start);
                shift(control);
                shift(end);
            }
            Shape::Angle {
                vertex,
                control,
                end,
                ..
            } => {
                shift(vertex);
                shift(control);
                shift(end);
            }
            Shape::Text { x, y, .. } => {
                *x += delta.x;
                *y += delta.y;
            }
            Shape::Note {
                x,
                y,
                target_x,
                target_y,
                ..
            } => {
                *x += delta.x;
                *y += delta.y;
                if let (Some(tx), Some(ty)) = (target_x.as_mut(), target_y.as_mut()) {
                    *tx += delta.x;
                    *ty += delta.y;
                }
            }
        }
    }

    /// Moves the shape's trailing handle to `to`, the resize gesture
    ///
    /// Angle measures are recomputed so stored degrees stay consistent with
    /// the arms.
    pub fn resize_to(&mut self, to: Point) {
        match self {
            Shape::Freehand { points } => {
                if let Some(last) = points.last_mut() {
                    *last = to;
                }
            }
            Shape::Line { end, .. }
            | Shape::Arrow { end, .. }
            | Shape::Rectangle { end, .. }
            | Shape::Curve { end, .. } => *end = to,
            Shape::Ellipse {
                center,
                radius_x,
                radius_y,
            } => {
                *radius_x = (to.x - center.x).abs();
                *radius_y = (to.y - center.y).abs();
            }
            Shape::Angle {
                vertex,
                control,
                end,
                clockwise,
                counter_clockwise,
            } => {
                *end = to;
                let measure = measure_angle(*vertex, *control, *end);
                *clockwise = measure.clockwise;
                *counter_clockwise = measure.counter_clockwise;
            }
            Shape::Crosshair { center } => *center = to,
            Shape::Text { x, y, .. } => {
                *x = to.x;
                *y = to.y;
            }
            Shape::Note {
                target_x, target_y, ..
            } => {
                *target_x = Some(to.x);
                *target_y = Some(to.y);
            }
        }
    }
}
