//! Input event types decoupled from the DOM so the interaction layer can be
//! driven from tests and from the browser bridge alike

use crate::Point;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Middle,
    Secondary,
    Other(u16),
}

impl MouseButton {
    /// Maps a DOM `PointerEvent.button` value
    pub fn from_dom(button: i16) -> Self {
        match button {
            0 => MouseButton::Primary,
            1 => MouseButton::Middle,
            2 => MouseButton::Secondary,
            other => MouseButton::Other(other.max(0) as u16),
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, MouseButton::Primary)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        alt: false,
        ctrl: false,
        meta: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    /// Ctrl on most platforms, Cmd on macOS
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
}

/// A pointer event in stage-relative viewport coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub position: Point,
    pub button: MouseButton,
    pub modifiers: Modifiers,
    /// Milliseconds on the host's monotonic clock
    pub time_stamp: f64,
}

impl PointerEvent {
    pub fn new(phase: PointerPhase, position: Point, button: MouseButton) -> Self {
        Self {
            phase,
            position,
            button,
            modifiers: Modifiers::NONE,
            time_stamp: 0.0,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn at_time(mut self, time_stamp: f64) -> Self {
        self.time_stamp = time_stamp;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelEvent {
    pub position: Point,
    pub delta_y: f64,
    pub modifiers: Modifiers,
    pub time_stamp: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PinchPhase {
    Start,
    Update { scale: f64 },
    End,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PinchEvent {
    pub phase: PinchPhase,
    /// Midpoint between the two touches
    pub center: Point,
    pub time_stamp: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyEvent {
    /// DOM `KeyboardEvent.key` value
    pub key: String,
    pub modifiers: Modifiers,
    pub time_stamp: f64,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::NONE,
            time_stamp: 0.0,
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Coarse event classification used for listener registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    PointerDown,
    PointerMove,
    PointerUp,
    Wheel,
    Pinch,
    KeyDown,
    ContextMenu,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StageEvent {
    Pointer(PointerEvent),
    Wheel(WheelEvent),
    Pinch(PinchEvent),
    Key(KeyEvent),
    ContextMenu { position: Point },
}

impl StageEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StageEvent::Pointer(event) => match event.phase {
                PointerPhase::Down => EventKind::PointerDown,
                PointerPhase::Move => EventKind::PointerMove,
                PointerPhase::Up => EventKind::PointerUp,
            },
            StageEvent::Wheel(_) => EventKind::Wheel,
            StageEvent::Pinch(_) => EventKind::Pinch,
            StageEvent::Key(_) => EventKind::KeyDown,
            StageEvent::ContextMenu { .. } => EventKind::ContextMenu,
        }
    }

    /// Viewport position for positional events; keyboard events have none
    pub fn position(&self) -> Option<Point> {
        match self {
            StageEvent::Pointer(event) => Some(event.position),
            StageEvent::Wheel(event) => Some(event.position),
            StageEvent::Pinch(event) => Some(event.center),
            StageEvent::ContextMenu { position } => Some(*position),
            StageEvent::Key(_) => None,
        }
    }

    pub fn time_stamp(&self) -> f64 {
        match self {
            StageEvent::Pointer(event) => event.time_stamp,
            StageEvent::Wheel(event) => event.time_stamp,
            StageEvent::Pinch(event) => event.time_stamp,
            StageEvent::Key(event) => event.time_stamp,
            StageEvent::ContextMenu { .. } => 0.0,
        }
    }
}
