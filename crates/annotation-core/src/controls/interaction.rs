//! Tool selection and per-tool drafting state machine
//!
//! Path tools draft with a press-drag-release gesture. The angle tool is a
//! three-click sub-machine that lives beside the gesture state, so unrelated
//! work (snapshots, zoom, playback queries) never disturbs a half-drawn angle.

use std::fmt;
use std::str::FromStr;

use framemark_shared::events::{KeyEvent, PointerEvent};
use framemark_shared::{FramemarkError, Point, Style};

use crate::controls::magnifier::Loupe;
use crate::document::{DrawingId, Shape};
use crate::geometry::{fit_curve_control, measure_angle, HIT_TOLERANCE};
use crate::store::AnnotationStore;
use crate::transform::Transform;

/// Shorter drags than this (in screen pixels) do not commit a shape
pub const MIN_DRAG_DISTANCE: f64 = 3.0;
pub const DEFAULT_TEXT: &str = "Text";
pub const DEFAULT_NOTE_TEXT: &str = "Note";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tool {
    Move,
    Freehand,
    Line,
    Rectangle,
    Ellipse,
    Arrow,
    Curve,
    Angle,
    Crosshair,
    Text,
    Note,
    Magnifier,
}

impl Tool {
    pub const ALL: [Tool; 12] = [
        Tool::Move,
        Tool::Freehand,
        Tool::Line,
        Tool::Rectangle,
        Tool::Ellipse,
        Tool::Arrow,
        Tool::Curve,
        Tool::Angle,
        Tool::Crosshair,
        Tool::Text,
        Tool::Note,
        Tool::Magnifier,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Move => "move",
            Tool::Freehand => "freehand",
            Tool::Line => "line",
            Tool::Rectangle => "rectangle",
            Tool::Ellipse => "ellipse",
            Tool::Arrow => "arrow",
            Tool::Curve => "curve",
            Tool::Angle => "angle",
            Tool::Crosshair => "crosshair",
            Tool::Text => "text",
            Tool::Note => "note",
            Tool::Magnifier => "magnifier",
        }
    }

    pub fn hotkey(&self) -> char {
        match self {
            Tool::Move => 'v',
            Tool::Freehand => 'f',
            Tool::Line => 'l',
            Tool::Rectangle => 'r',
            Tool::Ellipse => 'e',
            Tool::Arrow => 'a',
            Tool::Curve => 'c',
            Tool::Angle => 'g',
            Tool::Crosshair => 'x',
            Tool::Text => 't',
            Tool::Note => 'n',
            Tool::Magnifier => 'm',
        }
    }

    pub fn from_hotkey(key: &str) -> Option<Tool> {
        let mut chars = key.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return None;
        };
        let c = c.to_ascii_lowercase();
        Tool::ALL.into_iter().find(|tool| tool.hotkey() == c)
    }

    /// Tools drafted with press, drag and release
    pub fn is_path(&self) -> bool {
        matches!(
            self,
            Tool::Freehand
                | Tool::Line
                | Tool::Rectangle
                | Tool::Ellipse
                | Tool::Arrow
                | Tool::Curve
        )
    }

    pub fn creates_drawings(&self) -> bool {
        !matches!(self, Tool::Move | Tool::Magnifier)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = FramemarkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        // "rect" and "path" are accepted as host aliases
        let wanted = match wanted.as_str() {
            "rect" => "rectangle",
            "path" | "pen" => "freehand",
            other => other,
        };
        Tool::ALL
            .into_iter()
            .find(|tool| tool.name() == wanted)
            .ok_or_else(|| FramemarkError::NotFound {
                resource: format!("tool '{s}'"),
            })
    }
}

/// Point the angle tool is waiting for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AngleDraftPhase {
    #[default]
    None,
    Vertex,
    Control,
    End,
}

impl AngleDraftPhase {
    pub fn name(&self) -> &'static str {
        match self {
            AngleDraftPhase::None => "none",
            AngleDraftPhase::Vertex => "vertex",
            AngleDraftPhase::Control => "control",
            AngleDraftPhase::End => "end",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
enum AngleDraft {
    #[default]
    Inactive,
    AwaitVertex,
    AwaitControl {
        vertex: Point,
    },
    AwaitEnd {
        vertex: Point,
        control: Point,
    },
}

impl AngleDraft {
    fn phase(&self) -> AngleDraftPhase {
        match self {
            AngleDraft::Inactive => AngleDraftPhase::None,
            AngleDraft::AwaitVertex => AngleDraftPhase::Vertex,
            AngleDraft::AwaitControl { .. } => AngleDraftPhase::Control,
            AngleDraft::AwaitEnd { .. } => AngleDraftPhase::End,
        }
    }

    fn in_progress(&self) -> bool {
        matches!(
            self,
            AngleDraft::AwaitControl { .. } | AngleDraft::AwaitEnd { .. }
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Draft {
    /// Pointer samples in media space; the first is the press position
    Stroke { tool: Tool, points: Vec<Point> },
    Note { anchor: Point, current: Point },
}

impl Draft {
    /// Shape the draft would commit as, `None` while degenerate
    pub fn to_shape(&self, min_distance: f64) -> Option<Shape> {
        let Draft::Stroke { tool, points } = self else {
            return None;
        };
        let (&start, &end) = (points.first()?, points.last()?);

        if *tool == Tool::Freehand {
            let length: f64 = points.windows(2).map(|w| w[0].distance_to(w[1])).sum();
            return (length >= min_distance).then(|| Shape::Freehand {
                points: points.clone(),
            });
        }
        if start.distance_to(end) < min_distance {
            return None;
        }

        let shape = match tool {
            Tool::Line => Shape::Line { start, end },
            Tool::Arrow => Shape::Arrow { start, end },
            Tool::Rectangle => Shape::Rectangle { start, end },
            Tool::Ellipse => Shape::Ellipse {
                center: start.midpoint(end),
                radius_x: (end.x - start.x).abs() * 0.5,
                radius_y: (end.y - start.y).abs() * 0.5,
            },
            Tool::Curve => {
                let samples = &points[1..points.len() - 1];
                Shape::Curve {
                    start,
                    control: fit_curve_control(start, samples, end),
                    end,
                }
            }
            _ => return None,
        };
        Some(shape)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MoveDrag {
    pub id: DrawingId,
    origin: Point,
    last: Point,
}

impl MoveDrag {
    fn moved(&self) -> bool {
        self.origin != self.last
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Drafting(Draft),
    Moving(MoveDrag),
    Magnifying(Loupe),
}

/// What the annotator has to do after a transition
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Effects {
    pub repaint: bool,
    /// The document changed and has to be flushed
    pub document_changed: bool,
    pub transform_changed: bool,
    /// Overlay element to focus for in-place editing
    pub focus: Option<DrawingId>,
}

impl Effects {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn repaint() -> Self {
        Self {
            repaint: true,
            ..Self::default()
        }
    }

    pub fn changed() -> Self {
        Self {
            repaint: true,
            document_changed: true,
            ..Self::default()
        }
    }

    fn transform() -> Self {
        Self {
            repaint: true,
            transform_changed: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn merge(mut self, other: Effects) -> Self {
        self.repaint |= other.repaint;
        self.document_changed |= other.document_changed;
        self.transform_changed |= other.transform_changed;
        self.focus = other.focus.or(self.focus);
        self
    }
}

/// In-progress gesture handed to the renderer
#[derive(Clone, Debug, PartialEq)]
pub enum DraftPreview {
    Shape(Shape),
    NoteLink {
        anchor: Point,
        current: Point,
    },
    Angle {
        vertex: Point,
        control: Option<Point>,
        cursor: Option<Point>,
    },
}

/// Mutable collaborators of a transition
pub struct InteractionContext<'a> {
    pub store: &'a mut AnnotationStore,
    pub transform: &'a mut Transform,
}

impl InteractionContext<'_> {
    fn media_point(&self, event: &PointerEvent) -> Point {
        self.transform.to_media_coords(event.position)
    }

    fn tolerance(&self) -> f64 {
        HIT_TOLERANCE * self.transform.screen_unit()
    }
}

#[derive(Debug)]
pub struct Interaction {
    tool: Tool,
    state: InteractionState,
    angle: AngleDraft,
    /// Last pointer position in media space
    last_pointer: Option<Point>,
    selected: Option<DrawingId>,
    style: Style,
    read_only: bool,
}

impl Interaction {
    pub fn new(style: Style, read_only: bool) -> Self {
        Self {
            tool: Tool::Move,
            state: InteractionState::Idle,
            angle: AngleDraft::Inactive,
            last_pointer: None,
            selected: None,
            style,
            read_only,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn angle_phase(&self) -> AngleDraftPhase {
        self.angle.phase()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn style(&self) -> &Style {
        &self.style
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    pub fn last_pointer(&self) -> Option<Point> {
        self.last_pointer
    }

    /// The canvas stops taking pointer events while a drawing is dragged
    pub fn canvas_passthrough(&self) -> bool {
        matches!(self.state, InteractionState::Moving(_))
    }

    pub fn loupe(&self) -> Option<&Loupe> {
        match &self.state {
            InteractionState::Magnifying(loupe) => Some(loupe),
            _ => None,
        }
    }

    pub fn preview(&self, min_distance: f64) -> Option<DraftPreview> {
        if let InteractionState::Drafting(draft) = &self.state {
            return match draft {
                Draft::Stroke { .. } => draft.to_shape(min_distance).map(DraftPreview::Shape),
                Draft::Note { anchor, current } => Some(DraftPreview::NoteLink {
                    anchor: *anchor,
                    current: *current,
                }),
            };
        }
        match self.angle {
            AngleDraft::AwaitControl { vertex } => Some(DraftPreview::Angle {
                vertex,
                control: None,
                cursor: self.last_pointer,
            }),
            AngleDraft::AwaitEnd { vertex, control } => Some(DraftPreview::Angle {
                vertex,
                control: Some(control),
                cursor: self.last_pointer,
            }),
            _ => None,
        }
    }

    /// Forgets a selection whose drawing no longer exists
    pub fn forget(&mut self, id: &str) {
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
    }

    pub fn select_tool(&mut self, tool: Tool, cx: &mut InteractionContext<'_>) -> Effects {
        let effects = self.finish_gesture(cx);
        if tool != self.tool {
            log::debug!("Tool {} -> {}", self.tool, tool);
        }
        self.tool = tool;
        self.angle = if tool == Tool::Angle {
            AngleDraft::AwaitVertex
        } else {
            AngleDraft::Inactive
        };
        effects.merge(Effects::repaint())
    }

    /// Pointer-down delivered to the drawing canvas
    pub fn canvas_pointer_down(
        &mut self,
        event: &PointerEvent,
        cx: &mut InteractionContext<'_>,
    ) -> Effects {
        // No media mapping until the video reports its sizes
        if !event.button.is_primary() || !cx.transform.has_media() {
            return Effects::none();
        }
        let point = cx.media_point(event);
        self.last_pointer = Some(point);

        if !matches!(self.state, InteractionState::Idle) {
            return Effects::none();
        }
        if self.tool == Tool::Magnifier {
            let loupe = Loupe::at(
                point,
                event.modifiers,
                cx.transform.natural_size(),
                cx.transform.screen_unit(),
            );
            self.state = InteractionState::Magnifying(loupe);
            return Effects::repaint();
        }
        if self.read_only || !self.tool.creates_drawings() {
            return Effects::none();
        }

        if !self.angle.in_progress() {
            if let Some(id) = cx.store.hit_test(point, cx.tolerance()) {
                log::debug!("Switching to move for drawing {id}");
                self.tool = Tool::Move;
                self.angle = AngleDraft::Inactive;
                self.begin_drag(id, point);
                return Effects::repaint();
            }
        }

        match self.tool {
            Tool::Angle => self.advance_angle(point, cx),
            Tool::Crosshair => {
                let id = cx
                    .store
                    .add_drawing(Shape::Crosshair { center: point }, self.style.clone());
                self.selected = Some(id);
                Effects::changed()
            }
            Tool::Text => {
                let shape = Shape::Text {
                    x: point.x,
                    y: point.y,
                    text: DEFAULT_TEXT.to_string(),
                };
                let id = cx.store.add_drawing(shape, self.style.clone());
                self.selected = Some(id.clone());
                Effects {
                    focus: Some(id),
                    ..Effects::changed()
                }
            }
            Tool::Note => {
                self.state = InteractionState::Drafting(Draft::Note {
                    anchor: point,
                    current: point,
                });
                Effects::repaint()
            }
            tool if tool.is_path() => {
                self.state = InteractionState::Drafting(Draft::Stroke {
                    tool,
                    points: vec![point],
                });
                Effects::repaint()
            }
            _ => Effects::none(),
        }
    }

    /// Pointer-down seen by the stage, after any layer below it
    pub fn stage_pointer_down(
        &mut self,
        event: &PointerEvent,
        cx: &mut InteractionContext<'_>,
    ) -> Effects {
        if !event.button.is_primary()
            || self.tool != Tool::Move
            || self.read_only
            || !cx.transform.has_media()
            || !matches!(self.state, InteractionState::Idle)
        {
            return Effects::none();
        }
        let point = cx.media_point(event);
        self.last_pointer = Some(point);

        match cx.store.hit_test(point, cx.tolerance()) {
            Some(id) => {
                self.begin_drag(id, point);
                Effects::repaint()
            }
            None if self.selected.take().is_some() => Effects::repaint(),
            None => Effects::none(),
        }
    }

    pub fn pointer_move(&mut self, event: &PointerEvent, cx: &mut InteractionContext<'_>) -> Effects {
        let point = cx.media_point(event);
        self.last_pointer = Some(point);

        match &mut self.state {
            InteractionState::Drafting(Draft::Stroke { tool, points }) => {
                let keep_samples = matches!(tool, Tool::Freehand | Tool::Curve);
                if keep_samples || points.len() < 2 {
                    if points.last() != Some(&point) {
                        points.push(point);
                    }
                } else if let Some(last) = points.last_mut() {
                    *last = point;
                }
                Effects::repaint()
            }
            InteractionState::Drafting(Draft::Note { current, .. }) => {
                *current = point;
                Effects::repaint()
            }
            InteractionState::Moving(drag) => {
                let delta = drag.last.delta_to(point);
                drag.last = point;
                cx.store.nudge_drawing(&drag.id, delta);
                Effects::repaint()
            }
            InteractionState::Magnifying(loupe) => {
                *loupe = Loupe::at(
                    point,
                    event.modifiers,
                    cx.transform.natural_size(),
                    cx.transform.screen_unit(),
                );
                Effects::repaint()
            }
            InteractionState::Idle if self.angle.in_progress() => Effects::repaint(),
            InteractionState::Idle => Effects::none(),
        }
    }

    pub fn pointer_up(&mut self, event: &PointerEvent, cx: &mut InteractionContext<'_>) -> Effects {
        if !event.button.is_primary() {
            return Effects::none();
        }
        let point = cx.media_point(event);
        self.last_pointer = Some(point);
        let min_distance = MIN_DRAG_DISTANCE * cx.transform.screen_unit();

        match std::mem::take(&mut self.state) {
            InteractionState::Idle => Effects::none(),
            InteractionState::Drafting(Draft::Stroke { tool, mut points }) => {
                if points.last() != Some(&point) {
                    points.push(point);
                }
                let draft = Draft::Stroke { tool, points };
                match draft.to_shape(min_distance) {
                    Some(shape) => {
                        cx.store.add_drawing(shape, self.style.clone());
                        Effects::changed()
                    }
                    None => Effects::repaint(),
                }
            }
            InteractionState::Drafting(Draft::Note { anchor, .. }) => {
                let target = (anchor.distance_to(point) >= min_distance).then_some(point);
                let id = cx
                    .store
                    .add_note(anchor, DEFAULT_NOTE_TEXT, target, self.style.clone());
                self.selected = Some(id.clone());
                Effects {
                    focus: Some(id),
                    ..Effects::changed()
                }
            }
            InteractionState::Moving(drag) => Self::end_drag(drag, cx),
            InteractionState::Magnifying(_) => Effects::repaint(),
        }
    }

    pub fn key_down(&mut self, event: &KeyEvent, cx: &mut InteractionContext<'_>) -> Effects {
        let modifiers = event.modifiers;
        match event.key.as_str() {
            "Escape" => self.cancel(cx),
            "Delete" | "Backspace" => {
                if self.read_only {
                    return Effects::none();
                }
                match self.selected.take() {
                    Some(id) if cx.store.delete_drawing(&id) => Effects::changed(),
                    _ => Effects::none(),
                }
            }
            "z" | "Z" if modifiers.command() => {
                if self.read_only {
                    return Effects::none();
                }
                self.cancel(cx);
                let applied = if modifiers.shift {
                    cx.store.redo()
                } else {
                    cx.store.undo()
                };
                if applied {
                    Effects::changed()
                } else {
                    Effects::none()
                }
            }
            "+" | "=" => {
                cx.transform.step_zoom(1.0);
                Effects::transform()
            }
            "-" | "_" => {
                cx.transform.step_zoom(-1.0);
                Effects::transform()
            }
            "0" => {
                cx.transform.reset();
                Effects::transform()
            }
            key if !modifiers.command() && !modifiers.alt => match Tool::from_hotkey(key) {
                Some(tool) => self.select_tool(tool, cx),
                None => Effects::none(),
            },
            _ => Effects::none(),
        }
    }

    /// Abandons the current gesture: drafts are discarded, a drag is
    /// reverted, and an angle in progress restarts at its vertex
    pub fn cancel(&mut self, cx: &mut InteractionContext<'_>) -> Effects {
        let mut effects = Effects::none();
        match std::mem::take(&mut self.state) {
            InteractionState::Idle => {}
            InteractionState::Moving(drag) => {
                cx.store.nudge_drawing(&drag.id, drag.last.delta_to(drag.origin));
                effects = Effects::repaint();
            }
            InteractionState::Drafting(_) | InteractionState::Magnifying(_) => {
                effects = Effects::repaint();
            }
        }
        if self.angle.in_progress() {
            self.angle = AngleDraft::AwaitVertex;
            effects = Effects::repaint();
        }
        effects
    }

    /// Ends the gesture without reverting; an active drag is committed
    fn finish_gesture(&mut self, cx: &mut InteractionContext<'_>) -> Effects {
        match std::mem::take(&mut self.state) {
            InteractionState::Moving(drag) => Self::end_drag(drag, cx),
            InteractionState::Idle => Effects::none(),
            InteractionState::Drafting(_) | InteractionState::Magnifying(_) => Effects::repaint(),
        }
    }

    fn begin_drag(&mut self, id: DrawingId, point: Point) {
        self.selected = Some(id.clone());
        self.state = InteractionState::Moving(MoveDrag {
            id,
            origin: point,
            last: point,
        });
    }

    fn end_drag(drag: MoveDrag, cx: &mut InteractionContext<'_>) -> Effects {
        if drag.moved() {
            cx.store.record();
            Effects::changed()
        } else {
            Effects::repaint()
        }
    }

    fn advance_angle(&mut self, point: Point, cx: &mut InteractionContext<'_>) -> Effects {
        match self.angle {
            AngleDraft::Inactive | AngleDraft::AwaitVertex => {
                self.angle = AngleDraft::AwaitControl { vertex: point };
                Effects::repaint()
            }
            AngleDraft::AwaitControl { vertex } => {
                self.angle = AngleDraft::AwaitEnd {
                    vertex,
                    control: point,
                };
                Effects::repaint()
            }
            AngleDraft::AwaitEnd { vertex, control } => {
                let measure = measure_angle(vertex, control, point);
                cx.store.add_drawing(
                    Shape::Angle {
                        vertex,
                        control,
                        end: point,
                        clockwise: measure.clockwise,
                        counter_clockwise: measure.counter_clockwise,
                    },
                    self.style.clone(),
                );
                self.angle = AngleDraft::AwaitVertex;
                Effects::changed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framemark_config::ZoomSettings;
    use framemark_shared::events::{Modifiers, MouseButton, PointerPhase};
    use framemark_shared::Size;

    struct Fixture {
        store: AnnotationStore,
        transform: Transform,
        interaction: Interaction,
    }

    impl Fixture {
        fn new() -> Self {
            let mut transform = Transform::new(ZoomSettings::default());
            transform.set_media_sizes(Size::new(800.0, 600.0), Size::new(800.0, 600.0));
            Self {
                store: AnnotationStore::default(),
                transform,
                interaction: Interaction::new(Style::default(), false),
            }
        }

        fn run<R>(&mut self, f: impl FnOnce(&mut Interaction, &mut InteractionContext<'_>) -> R) -> R {
            let mut cx = InteractionContext {
                store: &mut self.store,
                transform: &mut self.transform,
            };
            f(&mut self.interaction, &mut cx)
        }

        fn select(&mut self, tool: Tool) {
            self.run(|i, cx| i.select_tool(tool, cx));
        }

        fn click(&mut self, x: f64, y: f64) -> Effects {
            self.down(x, y);
            self.up(x, y)
        }

        fn down(&mut self, x: f64, y: f64) -> Effects {
            let event = pointer(PointerPhase::Down, x, y, MouseButton::Primary);
            self.run(|i, cx| {
                i.canvas_pointer_down(&event, cx)
                    .merge(i.stage_pointer_down(&event, cx))
            })
        }

        fn drag_to(&mut self, x: f64, y: f64) -> Effects {
            let event = pointer(PointerPhase::Move, x, y, MouseButton::Other(0));
            self.run(|i, cx| i.pointer_move(&event, cx))
        }

        fn up(&mut self, x: f64, y: f64) -> Effects {
            let event = pointer(PointerPhase::Up, x, y, MouseButton::Primary);
            self.run(|i, cx| i.pointer_up(&event, cx))
        }

        fn key(&mut self, key: KeyEvent) -> Effects {
            self.run(|i, cx| i.key_down(&key, cx))
        }
    }

    fn pointer(phase: PointerPhase, x: f64, y: f64, button: MouseButton) -> PointerEvent {
        PointerEvent::new(phase, Point::new(x, y), button)
    }

    #[test]
    fn test_tool_names_and_hotkeys_round_trip() {
        for tool in Tool::ALL {
            assert_eq!(tool.name().parse::<Tool>().unwrap(), tool);
            assert_eq!(Tool::from_hotkey(&tool.hotkey().to_string()), Some(tool));
        }
        assert_eq!("Rect".parse::<Tool>().unwrap(), Tool::Rectangle);
        assert!("laser".parse::<Tool>().is_err());
        assert_eq!(Tool::from_hotkey("Enter"), None);
    }

    #[test]
    fn test_line_drag_commits_one_drawing() {
        let mut fx = Fixture::new();
        fx.select(Tool::Line);
        fx.down(10.0, 10.0);
        fx.drag_to(50.0, 40.0);
        let effects = fx.up(90.0, 70.0);

        assert!(effects.document_changed);
        let drawings = &fx.store.document().drawings;
        assert_eq!(drawings.len(), 1);
        assert_eq!(
            drawings[0].shape,
            Shape::Line {
                start: Point::new(10.0, 10.0),
                end: Point::new(90.0, 70.0)
            }
        );
    }

    #[test]
    fn test_click_without_drag_commits_nothing() {
        let mut fx = Fixture::new();
        fx.select(Tool::Rectangle);
        let effects = fx.click(20.0, 20.0);
        assert!(!effects.document_changed);
        assert!(fx.store.document().drawings.is_empty());
    }

    #[test]
    fn test_ellipse_from_drag_box() {
        let mut fx = Fixture::new();
        fx.select(Tool::Ellipse);
        fx.down(100.0, 100.0);
        fx.up(200.0, 160.0);
        assert_eq!(
            fx.store.document().drawings[0].shape,
            Shape::Ellipse {
                center: Point::new(150.0, 130.0),
                radius_x: 50.0,
                radius_y: 30.0
            }
        );
    }

    #[test]
    fn test_freehand_keeps_samples() {
        let mut fx = Fixture::new();
        fx.select(Tool::Freehand);
        fx.down(0.0, 0.0);
        fx.drag_to(10.0, 5.0);
        fx.drag_to(10.0, 5.0);
        fx.drag_to(20.0, 0.0);
        fx.up(30.0, 5.0);
        match &fx.store.document().drawings[0].shape {
            Shape::Freehand { points } => assert_eq!(points.len(), 4),
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_angle_needs_three_clicks() {
        let mut fx = Fixture::new();
        fx.select(Tool::Angle);
        assert_eq!(fx.interaction.angle_phase(), AngleDraftPhase::Vertex);

        fx.click(100.0, 100.0);
        assert_eq!(fx.interaction.angle_phase(), AngleDraftPhase::Control);
        fx.click(200.0, 100.0);
        assert_eq!(fx.interaction.angle_phase(), AngleDraftPhase::End);
        assert!(fx.store.document().drawings.is_empty());

        fx.click(100.0, 200.0);
        assert_eq!(fx.interaction.angle_phase(), AngleDraftPhase::Vertex);
        let drawings = &fx.store.document().drawings;
        assert_eq!(drawings.len(), 1);
        match drawings[0].shape {
            Shape::Angle {
                clockwise,
                counter_clockwise,
                ..
            } => {
                assert!((clockwise - 90.0).abs() < 1e-9);
                assert!((counter_clockwise - 270.0).abs() < 1e-9);
            }
            ref other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_angle_draft_ignores_existing_drawings_under_clicks() {
        let mut fx = Fixture::new();
        fx.select(Tool::Line);
        fx.down(100.0, 50.0);
        fx.up(100.0, 250.0);

        fx.select(Tool::Angle);
        fx.click(300.0, 300.0);
        // Lands on the line, but the angle draft owns the gesture
        fx.click(100.0, 150.0);
        assert_eq!(fx.interaction.tool(), Tool::Angle);
        assert_eq!(fx.interaction.angle_phase(), AngleDraftPhase::End);
    }

    #[test]
    fn test_pointer_down_on_drawing_switches_to_move() {
        let mut fx = Fixture::new();
        fx.select(Tool::Line);
        fx.down(100.0, 50.0);
        fx.up(100.0, 250.0);
        let id = fx.store.document().drawings[0].id.clone();

        fx.down(101.0, 150.0);
        assert_eq!(fx.interaction.tool(), Tool::Move);
        assert!(fx.interaction.canvas_passthrough());
        fx.drag_to(121.0, 160.0);
        let effects = fx.up(121.0, 160.0);

        assert!(effects.document_changed);
        assert!(!fx.interaction.canvas_passthrough());
        assert_eq!(fx.store.document().drawings.len(), 1);
        assert_eq!(
            fx.store.drawing(&id).unwrap().shape,
            Shape::Line {
                start: Point::new(120.0, 60.0),
                end: Point::new(120.0, 260.0)
            }
        );
    }

    #[test]
    fn test_escape_reverts_drag() {
        let mut fx = Fixture::new();
        let id = fx.store.add_drawing(
            Shape::Crosshair {
                center: Point::new(50.0, 50.0),
            },
            Style::default(),
        );
        fx.select(Tool::Move);
        fx.down(50.0, 50.0);
        fx.drag_to(80.0, 90.0);
        fx.key(KeyEvent::new("Escape"));

        assert_eq!(
            fx.store.drawing(&id).unwrap().shape,
            Shape::Crosshair {
                center: Point::new(50.0, 50.0)
            }
        );
        assert!(matches!(fx.interaction.state(), InteractionState::Idle));
    }

    #[test]
    fn test_non_primary_buttons_are_ignored() {
        let mut fx = Fixture::new();
        fx.select(Tool::Angle);
        for button in [MouseButton::Secondary, MouseButton::Middle, MouseButton::Other(3)] {
            let event = pointer(PointerPhase::Down, 10.0, 10.0, button);
            let effects = fx.run(|i, cx| i.canvas_pointer_down(&event, cx));
            assert!(effects.is_empty());
        }
        assert_eq!(fx.interaction.angle_phase(), AngleDraftPhase::Vertex);
    }

    #[test]
    fn test_tool_switch_discards_angle_draft() {
        let mut fx = Fixture::new();
        fx.select(Tool::Angle);
        fx.click(10.0, 10.0);
        fx.click(40.0, 10.0);
        fx.select(Tool::Line);
        assert_eq!(fx.interaction.angle_phase(), AngleDraftPhase::None);
        fx.select(Tool::Angle);
        fx.click(60.0, 60.0);
        assert_eq!(fx.interaction.angle_phase(), AngleDraftPhase::Control);
        assert!(fx.store.document().drawings.is_empty());
    }

    #[test]
    fn test_note_drag_sets_target_and_click_does_not() {
        let mut fx = Fixture::new();
        fx.select(Tool::Note);
        let effects = fx.click(20.0, 20.0);
        assert!(effects.focus.is_some());
        fx.down(300.0, 300.0);
        fx.drag_to(350.0, 320.0);
        fx.up(400.0, 380.0);

        let drawings = &fx.store.document().drawings;
        assert_eq!(drawings[0].shape.note_target(), None);
        assert_eq!(drawings[1].shape.note_target(), Some(Point::new(400.0, 380.0)));
    }

    #[test]
    fn test_magnifier_is_presentational() {
        let mut fx = Fixture::new();
        fx.select(Tool::Magnifier);
        let event = pointer(PointerPhase::Down, 400.0, 300.0, MouseButton::Primary)
            .with_modifiers(Modifiers::shift());
        fx.run(|i, cx| i.canvas_pointer_down(&event, cx));
        assert_eq!(fx.interaction.loupe().unwrap().magnification, 4.0);

        fx.drag_to(410.0, 310.0);
        assert_eq!(fx.interaction.loupe().unwrap().focus, Point::new(410.0, 310.0));
        fx.up(410.0, 310.0);
        assert!(fx.interaction.loupe().is_none());
        assert_eq!(fx.store.revision(), 0);
    }

    #[test]
    fn test_keyboard_shortcuts() {
        let mut fx = Fixture::new();
        fx.key(KeyEvent::new("l"));
        assert_eq!(fx.interaction.tool(), Tool::Line);
        fx.down(0.0, 0.0);
        fx.up(50.0, 50.0);
        assert_eq!(fx.store.document().drawings.len(), 1);

        fx.key(KeyEvent::new("z").with_modifiers(Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        }));
        assert!(fx.store.document().drawings.is_empty());
        fx.key(KeyEvent::new("Z").with_modifiers(Modifiers {
            ctrl: true,
            shift: true,
            ..Modifiers::NONE
        }));
        assert_eq!(fx.store.document().drawings.len(), 1);

        let before = fx.transform.zoom();
        assert!(fx.key(KeyEvent::new("+")).transform_changed);
        assert!(fx.transform.zoom() > before);
        fx.key(KeyEvent::new("0"));
        assert_eq!(fx.transform.zoom(), before);
    }

    #[test]
    fn test_delete_removes_selected_drawing() {
        let mut fx = Fixture::new();
        fx.select(Tool::Crosshair);
        fx.click(30.0, 30.0);
        assert!(fx.interaction.selected().is_some());
        assert!(fx.key(KeyEvent::new("Delete")).document_changed);
        assert!(fx.store.document().drawings.is_empty());
    }

    #[test]
    fn test_read_only_ignores_drawing_gestures() {
        let mut fx = Fixture::new();
        fx.interaction = Interaction::new(Style::default(), true);
        fx.select(Tool::Line);
        fx.down(0.0, 0.0);
        fx.up(100.0, 100.0);
        assert!(fx.store.document().drawings.is_empty());
    }
}
