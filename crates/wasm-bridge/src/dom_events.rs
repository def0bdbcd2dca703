//! Conversion of DOM input events into stage events

use framemark_shared::events::{
    KeyEvent, Modifiers, MouseButton, PinchEvent, PinchPhase, PointerEvent, PointerPhase,
    WheelEvent,
};
use framemark_shared::Point;
use wasm_bindgen::JsCast;
use web_sys::{Element, EventTarget, HtmlElement};

/// Viewport position relative to the stage's top-left corner
pub fn stage_point(stage: &Element, client_x: f64, client_y: f64) -> Point {
    let rect = stage.get_bounding_client_rect();
    Point::new(client_x - rect.left(), client_y - rect.top())
}

fn mouse_modifiers(event: &web_sys::MouseEvent) -> Modifiers {
    Modifiers {
        shift: event.shift_key(),
        alt: event.alt_key(),
        ctrl: event.ctrl_key(),
        meta: event.meta_key(),
    }
}

pub fn pointer_event(
    stage: &Element,
    phase: PointerPhase,
    event: &web_sys::PointerEvent,
) -> PointerEvent {
    PointerEvent::new(
        phase,
        stage_point(stage, event.client_x() as f64, event.client_y() as f64),
        MouseButton::from_dom(event.button()),
    )
    .with_modifiers(mouse_modifiers(event))
    .at_time(event.time_stamp())
}

/// Line and page delta modes are normalized to pixels
pub fn wheel_event(stage: &Element, event: &web_sys::WheelEvent) -> WheelEvent {
    let delta_y = match event.delta_mode() {
        web_sys::WheelEvent::DOM_DELTA_LINE => event.delta_y() * 16.0,
        web_sys::WheelEvent::DOM_DELTA_PAGE => event.delta_y() * 400.0,
        _ => event.delta_y(),
    };
    WheelEvent {
        position: stage_point(stage, event.client_x() as f64, event.client_y() as f64),
        delta_y,
        modifiers: mouse_modifiers(event),
        time_stamp: event.time_stamp(),
    }
}

pub fn key_event(event: &web_sys::KeyboardEvent) -> KeyEvent {
    let mut key = KeyEvent::new(event.key()).with_modifiers(Modifiers {
        shift: event.shift_key(),
        alt: event.alt_key(),
        ctrl: event.ctrl_key(),
        meta: event.meta_key(),
    });
    key.time_stamp = event.time_stamp();
    key
}

/// Keystrokes aimed at editable content belong to the editor, not the tools
pub fn is_text_entry(target: Option<EventTarget>) -> bool {
    let Some(element) = target.and_then(|t| t.dyn_into::<HtmlElement>().ok()) else {
        return false;
    };
    if element.is_content_editable() {
        return true;
    }
    matches!(
        element.tag_name().to_ascii_lowercase().as_str(),
        "input" | "textarea" | "select"
    )
}

/// Turns two concurrent touch pointers into pinch gestures
#[derive(Debug, Default)]
pub struct PinchTracker {
    touches: Vec<(i32, Point)>,
    start_distance: Option<f64>,
}

impl PinchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pinching(&self) -> bool {
        self.start_distance.is_some()
    }

    fn geometry(&self) -> Option<(f64, Point)> {
        match self.touches.as_slice() {
            [(_, a), (_, b), ..] => Some((a.distance_to(*b), a.midpoint(*b))),
            _ => None,
        }
    }

    /// Returns a start event when the second touch lands
    pub fn down(&mut self, pointer_id: i32, point: Point, time_stamp: f64) -> Option<PinchEvent> {
        self.touches.retain(|(id, _)| *id != pointer_id);
        self.touches.push((pointer_id, point));
        if self.is_pinching() {
            return None;
        }
        let (distance, center) = self.geometry()?;
        if distance <= 0.0 {
            return None;
        }
        self.start_distance = Some(distance);
        Some(PinchEvent {
            phase: PinchPhase::Start,
            center,
            time_stamp,
        })
    }

    pub fn moved(&mut self, pointer_id: i32, point: Point, time_stamp: f64) -> Option<PinchEvent> {
        let touch = self.touches.iter_mut().find(|(id, _)| *id == pointer_id)?;
        touch.1 = point;
        let start = self.start_distance?;
        let (distance, center) = self.geometry()?;
        Some(PinchEvent {
            phase: PinchPhase::Update {
                scale: distance / start,
            },
            center,
            time_stamp,
        })
    }

    /// Returns an end event when a pinch loses one of its touches
    pub fn up(&mut self, pointer_id: i32, time_stamp: f64) -> Option<PinchEvent> {
        let before = self.touches.len();
        self.touches.retain(|(id, _)| *id != pointer_id);
        if self.touches.len() == before || self.touches.len() >= 2 {
            return None;
        }
        let center = self.touches.first().map(|(_, p)| *p).unwrap_or_default();
        self.start_distance.take().map(|_| PinchEvent {
            phase: PinchPhase::End,
            center,
            time_stamp,
        })
    }
}
