//! Canvas display list
//!
//! A repaint is expressed as an ordered list of [`DrawCommand`]s in media
//! space. The browser surface replays it on a 2D context; tests inspect it
//! directly. Sizes marked as screen pixels are multiplied by the transform's
//! screen unit so they stay legible at every zoom.

use std::f64::consts::PI;

use framemark_shared::{Point, Rect, Size, Style};

use crate::controls::{DraftPreview, Loupe};
use crate::document::{Drawing, Shape};
use crate::geometry::{measure_angle, CROSSHAIR_RADIUS};
use crate::overlay::{OverlayOp, SeekMarker};

/// Length of the fixed guide arm shown while drafting an angle, screen pixels
pub const ANGLE_GUIDE_ARM: f64 = 40.0;
pub const ANGLE_ARC_RADIUS: f64 = 24.0;
/// Distance of the degree label beyond the arc
pub const ANGLE_LABEL_GAP: f64 = 16.0;
pub const LABEL_FONT_PX: f64 = 14.0;
pub const SELECTION_COLOR: &str = "#0a84ff";
const SELECTION_PADDING: f64 = 4.0;
const NOTE_TARGET_RADIUS: f64 = 4.0;
const ARROW_HEAD_MIN: f64 = 10.0;
const ARROW_HEAD_SPREAD: f64 = PI / 7.0;

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear {
        width: f64,
        height: f64,
    },
    Polyline {
        points: Vec<Point>,
        style: Style,
        closed: bool,
        dashed: bool,
    },
    Ellipse {
        center: Point,
        radius_x: f64,
        radius_y: f64,
        style: Style,
    },
    QuadraticCurve {
        start: Point,
        control: Point,
        end: Point,
        style: Style,
    },
    /// Angles in radians, canvas convention (y down)
    Arc {
        center: Point,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        anticlockwise: bool,
        style: Style,
    },
    Disc {
        center: Point,
        radius: f64,
        color: String,
    },
    Label {
        position: Point,
        text: String,
        color: String,
        font_px: f64,
    },
    /// Circular crop of the composited media, magnified into `center`
    Loupe {
        center: Point,
        radius: f64,
        source: Rect,
        ring: Style,
    },
}

/// Everything the surface needs for one presentation pass
#[derive(Clone, Debug, PartialEq)]
pub struct RenderFrame {
    pub canvas_size: Size,
    pub commands: Vec<DrawCommand>,
    pub overlay_ops: Vec<OverlayOp>,
    pub seek_markers: Vec<SeekMarker>,
    pub css_transform: String,
    pub canvas_passthrough: bool,
}

pub struct Scene<'a> {
    pub canvas_size: Size,
    /// Media pixels per screen pixel
    pub unit: f64,
    pub drawings: Vec<&'a Drawing>,
    pub selected: Option<&'a str>,
    pub draft: Option<DraftPreview>,
    pub draft_style: &'a Style,
    pub loupe: Option<&'a Loupe>,
}

/// Clear, drawings in document order, draft preview, then the loupe
pub fn display_list(scene: &Scene<'_>) -> Vec<DrawCommand> {
    let mut out = vec![DrawCommand::Clear {
        width: scene.canvas_size.width,
        height: scene.canvas_size.height,
    }];

    for drawing in &scene.drawings {
        draw_shape(&drawing.shape, &drawing.style, scene.unit, &mut out);
        if scene.selected == Some(drawing.id.as_str()) && !drawing.shape.is_overlay() {
            draw_selection(&drawing.shape, scene.unit, &mut out);
        }
    }

    if let Some(draft) = &scene.draft {
        draw_preview(draft, scene.draft_style, scene.unit, &mut out);
    }

    if let Some(loupe) = scene.loupe {
        out.push(DrawCommand::Loupe {
            center: loupe.handle,
            radius: loupe.radius,
            source: loupe.source_rect(),
            ring: Style::new("#ffffff", 2.0 * scene.unit),
        });
    }
    out
}

fn polyline(points: Vec<Point>, style: &Style) -> DrawCommand {
    DrawCommand::Polyline {
        points,
        style: style.clone(),
        closed: false,
        dashed: false,
    }
}

fn dashed(from: Point, to: Point, style: &Style) -> DrawCommand {
    DrawCommand::Polyline {
        points: vec![from, to],
        style: style.clone(),
        closed: false,
        dashed: true,
    }
}

pub fn draw_shape(shape: &Shape, style: &Style, unit: f64, out: &mut Vec<DrawCommand>) {
    match shape {
        Shape::Freehand { points } => out.push(polyline(points.clone(), style)),
        Shape::Line { start, end } => out.push(polyline(vec![*start, *end], style)),
        Shape::Rectangle { start, end } => {
            let rect = Rect::from_corners(*start, *end);
            out.push(DrawCommand::Polyline {
                points: vec![
                    rect.min,
                    Point::new(rect.max.x, rect.min.y),
                    rect.max,
                    Point::new(rect.min.x, rect.max.y),
                ],
                style: style.clone(),
                closed: true,
                dashed: false,
            });
        }
        Shape::Ellipse {
            center,
            radius_x,
            radius_y,
        } => out.push(DrawCommand::Ellipse {
            center: *center,
            radius_x: *radius_x,
            radius_y: *radius_y,
            style: style.clone(),
        }),
        Shape::Arrow { start, end } => {
            out.push(polyline(vec![*start, *end], style));
            out.push(polyline(arrow_head(*start, *end, style.width), style));
        }
        Shape::Curve {
            start,
            control,
            end,
        } => out.push(DrawCommand::QuadraticCurve {
            start: *start,
            control: *control,
            end: *end,
            style: style.clone(),
        }),
        Shape::Angle {
            vertex,
            control,
            end,
            clockwise,
            counter_clockwise,
        } => {
            out.push(polyline(vec![*control, *vertex, *end], style));
            draw_angle_arc(*vertex, *control, *clockwise, *counter_clockwise, style, unit, out);
        }
        Shape::Crosshair { center } => draw_crosshair(*center, style, unit, out),
        // The text itself lives in a DOM overlay
        Shape::Text { .. } => {}
        Shape::Note { x, y, .. } => {
            if let Some(target) = shape.note_target() {
                out.push(dashed(Point::new(*x, *y), target, style));
                out.push(DrawCommand::Disc {
                    center: target,
                    radius: NOTE_TARGET_RADIUS * unit,
                    color: style.color.clone(),
                });
            }
        }
    }
}

fn arrow_head(start: Point, end: Point, width: f64) -> Vec<Point> {
    let size = (width * 3.0).max(ARROW_HEAD_MIN);
    let heading = (end.y - start.y).atan2(end.x - start.x);
    let barb = |spread: f64| {
        let a = heading + PI + spread;
        Point::new(end.x + size * a.cos(), end.y + size * a.sin())
    };
    vec![barb(-ARROW_HEAD_SPREAD), end, barb(ARROW_HEAD_SPREAD)]
}

fn draw_crosshair(center: Point, style: &Style, unit: f64, out: &mut Vec<DrawCommand>) {
    let r = CROSSHAIR_RADIUS * unit;
    out.push(DrawCommand::Ellipse {
        center,
        radius_x: r,
        radius_y: r,
        style: style.clone(),
    });
    out.push(polyline(
        vec![Point::new(center.x - 2.0 * r, center.y), Point::new(center.x + 2.0 * r, center.y)],
        style,
    ));
    out.push(polyline(
        vec![Point::new(center.x, center.y - 2.0 * r), Point::new(center.x, center.y + 2.0 * r)],
        style,
    ));
}

/// Arc and degree label from the stored measures; the smaller sweep is drawn
fn draw_angle_arc(
    vertex: Point,
    control: Point,
    clockwise: f64,
    counter_clockwise: f64,
    style: &Style,
    unit: f64,
    out: &mut Vec<DrawCommand>,
) {
    let first = (control.y - vertex.y).atan2(control.x - vertex.x);
    let (sweep, shown) = if clockwise <= counter_clockwise {
        (clockwise.to_radians(), clockwise)
    } else {
        (-counter_clockwise.to_radians(), counter_clockwise)
    };
    let radius = ANGLE_ARC_RADIUS * unit;

    out.push(DrawCommand::Arc {
        center: vertex,
        radius,
        start_angle: first,
        end_angle: first + sweep,
        anticlockwise: sweep < 0.0,
        style: style.clone(),
    });

    let bisector = first + sweep * 0.5;
    let reach = radius + ANGLE_LABEL_GAP * unit;
    out.push(DrawCommand::Label {
        position: Point::new(vertex.x + reach * bisector.cos(), vertex.y + reach * bisector.sin()),
        text: format!("{shown:.1}°"),
        color: style.color.clone(),
        font_px: LABEL_FONT_PX * unit,
    });
}

fn draw_selection(shape: &Shape, unit: f64, out: &mut Vec<DrawCommand>) {
    let rect = shape.bounds().expand(SELECTION_PADDING * unit);
    out.push(DrawCommand::Polyline {
        points: vec![
            rect.min,
            Point::new(rect.max.x, rect.min.y),
            rect.max,
            Point::new(rect.min.x, rect.max.y),
        ],
        style: Style::new(SELECTION_COLOR, unit),
        closed: true,
        dashed: true,
    });
}

fn draw_preview(draft: &DraftPreview, style: &Style, unit: f64, out: &mut Vec<DrawCommand>) {
    match draft {
        DraftPreview::Shape(shape) => draw_shape(shape, style, unit, out),
        DraftPreview::NoteLink { anchor, current } => {
            out.push(DrawCommand::Disc {
                center: *anchor,
                radius: NOTE_TARGET_RADIUS * unit,
                color: style.color.clone(),
            });
            if anchor != current {
                out.push(dashed(*anchor, *current, style));
            }
        }
        DraftPreview::Angle {
            vertex,
            control,
            cursor,
        } => {
            draw_crosshair(*vertex, style, unit, out);
            match (control, cursor) {
                (None, Some(cursor)) => {
                    out.push(polyline(vec![*vertex, guide_tip(*vertex, *cursor, unit)], style));
                    out.push(dashed(*vertex, *cursor, style));
                }
                (Some(control), cursor) => {
                    out.push(polyline(vec![*vertex, *control], style));
                    if let Some(cursor) = cursor {
                        out.push(polyline(vec![*vertex, guide_tip(*vertex, *cursor, unit)], style));
                        out.push(dashed(*vertex, *cursor, style));
                        let measure = measure_angle(*vertex, *control, *cursor);
                        draw_angle_arc(
                            *vertex,
                            *control,
                            measure.clockwise,
                            measure.counter_clockwise,
                            style,
                            unit,
                            out,
                        );
                    }
                }
                (None, None) => {}
            }
        }
    }
}

/// End of the fixed-length guide arm pointing from `vertex` toward `toward`
fn guide_tip(vertex: Point, toward: Point, unit: f64) -> Point {
    let heading = (toward.y - vertex.y).atan2(toward.x - vertex.x);
    let arm = ANGLE_GUIDE_ARM * unit;
    Point::new(vertex.x + arm * heading.cos(), vertex.y + arm * heading.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drawing(id: &str, shape: Shape) -> Drawing {
        Drawing {
            id: id.to_string(),
            time: 0.0,
            style: Style::default(),
            shape,
        }
    }

    fn scene<'a>(drawings: Vec<&'a Drawing>, style: &'a Style, unit: f64) -> Scene<'a> {
        Scene {
            canvas_size: Size::new(640.0, 360.0),
            unit,
            drawings,
            selected: None,
            draft: None,
            draft_style: style,
            loupe: None,
        }
    }

    #[test]
    fn test_display_list_follows_document_order() {
        let first = drawing(
            "a",
            Shape::Line {
                start: Point::new(0.0, 0.0),
                end: Point::new(10.0, 10.0),
            },
        );
        let second = drawing(
            "b",
            Shape::Rectangle {
                start: Point::new(5.0, 5.0),
                end: Point::new(20.0, 20.0),
            },
        );
        let style = Style::default();
        let commands = display_list(&scene(vec![&first, &second], &style, 1.0));

        assert!(matches!(commands[0], DrawCommand::Clear { width, .. } if width == 640.0));
        assert!(matches!(&commands[1], DrawCommand::Polyline { closed: false, .. }));
        assert!(matches!(&commands[2], DrawCommand::Polyline { closed: true, .. }));
        assert_eq!(commands.len(), 3);
    }

    #[test]
    fn test_angle_renders_smaller_sweep_with_label() {
        let angle = drawing(
            "angle",
            Shape::Angle {
                vertex: Point::new(0.0, 0.0),
                control: Point::new(10.0, 0.0),
                end: Point::new(0.0, -10.0),
                clockwise: 270.0,
                counter_clockwise: 90.0,
            },
        );
        let style = Style::default();
        let commands = display_list(&scene(vec![&angle], &style, 1.0));

        let arc = commands
            .iter()
            .find_map(|c| match c {
                DrawCommand::Arc {
                    end_angle,
                    anticlockwise,
                    radius,
                    ..
                } => Some((*end_angle, *anticlockwise, *radius)),
                _ => None,
            })
            .unwrap();
        assert!(arc.1);
        assert!((arc.0 + PI / 2.0).abs() < 1e-9);
        assert_eq!(arc.2, ANGLE_ARC_RADIUS);
        assert!(commands
            .iter()
            .any(|c| matches!(c, DrawCommand::Label { text, .. } if text == "90.0°")));
    }

    #[test]
    fn test_crosshair_size_is_fixed_on_screen() {
        let cross = drawing(
            "x",
            Shape::Crosshair {
                center: Point::new(50.0, 50.0),
            },
        );
        let style = Style::default();
        let commands = display_list(&scene(vec![&cross], &style, 0.5));
        assert!(commands.iter().any(|c| matches!(
            c,
            DrawCommand::Ellipse { radius_x, .. } if *radius_x == CROSSHAIR_RADIUS * 0.5
        )));
    }

    #[test]
    fn test_text_has_no_canvas_output_and_note_target_draws_connector() {
        let text = drawing(
            "t",
            Shape::Text {
                x: 1.0,
                y: 1.0,
                text: "hi".to_string(),
            },
        );
        let note = drawing(
            "n",
            Shape::Note {
                x: 10.0,
                y: 10.0,
                text: "look".to_string(),
                target_x: Some(80.0),
                target_y: Some(40.0),
            },
        );
        let style = Style::default();
        let commands = display_list(&scene(vec![&text, &note], &style, 1.0));
        assert!(matches!(&commands[1], DrawCommand::Polyline { dashed: true, .. }));
        assert!(matches!(&commands[2], DrawCommand::Disc { center, .. } if *center == Point::new(80.0, 40.0)));
        assert_eq!(commands.len(), 3);
    }

    #[test]
    fn test_partial_angle_preview_and_loupe_are_last() {
        let style = Style::default();
        let loupe = Loupe {
            focus: Point::new(100.0, 100.0),
            handle: Point::new(40.0, 40.0),
            radius: 30.0,
            magnification: 2.0,
        };
        let mut scene = scene(Vec::new(), &style, 1.0);
        scene.draft = Some(DraftPreview::Angle {
            vertex: Point::new(100.0, 100.0),
            control: Some(Point::new(200.0, 100.0)),
            cursor: Some(Point::new(100.0, 200.0)),
        });
        scene.loupe = Some(&loupe);

        let commands = display_list(&scene);
        assert!(commands
            .iter()
            .any(|c| matches!(c, DrawCommand::Label { text, .. } if text == "90.0°")));
        assert!(commands.iter().any(|c| matches!(
            c,
            DrawCommand::Polyline { points, dashed: false, .. }
                if points.len() == 2 && (points[1].y - (100.0 + ANGLE_GUIDE_ARM)).abs() < 1e-9
        )));
        assert!(matches!(commands.last(), Some(DrawCommand::Loupe { .. })));
    }

    #[test]
    fn test_selected_drawing_gets_outline() {
        let line = drawing(
            "sel",
            Shape::Line {
                start: Point::new(0.0, 0.0),
                end: Point::new(10.0, 0.0),
            },
        );
        let style = Style::default();
        let mut scene = scene(vec![&line], &style, 1.0);
        scene.selected = Some("sel");
        let commands = display_list(&scene);
        assert!(matches!(
            commands.last(),
            Some(DrawCommand::Polyline { dashed: true, closed: true, style, .. }) if style.color == SELECTION_COLOR
        ));
    }
}
