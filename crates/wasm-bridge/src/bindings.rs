//! Wiring of DOM listeners to the stage dispatcher
//!
//! Pointer, wheel and context-menu events are listened for on the stage
//! element and fed into the core [`Stage`], which resolves the layer the
//! event belongs to. Keyboard shortcuts come from the document; media
//! events keep the playhead and media sizes current.

use std::cell::RefCell;
use std::rc::Rc;

use framemark_core::stage::DispatchOutcome;
use framemark_core::{Annotator, Layer, Stage};
use framemark_shared::events::{PointerPhase, StageEvent};
use uuid::Uuid;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    Element, Event, HtmlElement, KeyboardEvent, MouseEvent, Node, PointerEvent, WheelEvent,
};

use crate::canvas_surface::StageDom;
use crate::dom_events::{self, PinchTracker};
use crate::instance_manager::InstanceManager;
use crate::listeners::ListenerScope;

/// Shared state captured by every listener of one attachment
#[derive(Clone)]
struct Session {
    id: Uuid,
    stage: Rc<RefCell<Stage>>,
    annotator: Rc<RefCell<Annotator>>,
    element: Element,
    dom: StageDom,
}

impl Session {
    fn dispatch(&self, event: StageEvent) -> Option<DispatchOutcome> {
        let outcome = match self.stage.try_borrow_mut() {
            Ok(mut stage) => stage.dispatch(&event),
            Err(_) => {
                log::warn!("Stage busy, dropping {:?} event", event.kind());
                return None;
            }
        };
        self.settled();
        Some(outcome)
    }

    /// Runs after every handled event: keeps routing state and the save
    /// timer in step with the annotator
    fn settled(&self) {
        InstanceManager::with_instance_mut(&self.id, |instance| {
            instance.sync_layers();
            instance.arm_save_timer(self.id);
        });
    }

    fn with_annotator(&self, f: impl FnOnce(&mut Annotator)) {
        match self.annotator.try_borrow_mut() {
            Ok(mut annotator) => f(&mut annotator),
            Err(_) => log::warn!("Annotator busy, dropping media event"),
        }
        self.settled();
    }

    /// Events from the seek bar never reach the drawing tools
    fn from_seek_bar(&self, event: &Event) -> bool {
        let target = event.target().and_then(|t| t.dyn_into::<Node>().ok());
        self.dom.seek_bar.contains(target.as_ref())
    }

    fn sync_media(&self) {
        let (natural, displayed) = self.dom.media_sizes();
        let duration = self.dom.video.duration();
        self.with_annotator(|annotator| {
            annotator.set_media_sizes(natural, displayed);
            if duration.is_finite() {
                annotator.set_duration(duration);
            }
        });
    }
}

fn data_attribute(event: &Event, name: &str) -> Option<String> {
    event
        .target()
        .and_then(|t| t.dyn_into::<Element>().ok())
        .and_then(|e| e.closest(&format!("[{name}]")).ok().flatten())
        .and_then(|e| e.get_attribute(name))
}

/// Registers every DOM listener of one attachment under a fresh scope
pub fn bind(
    id: Uuid,
    dom: &StageDom,
    stage: &Rc<RefCell<Stage>>,
    annotator: &Rc<RefCell<Annotator>>,
) -> Result<ListenerScope, JsValue> {
    let mut scope = ListenerScope::new()?;
    let session = Session {
        id,
        stage: Rc::clone(stage),
        annotator: Rc::clone(annotator),
        element: dom.stage.clone().into(),
        dom: dom.clone(),
    };
    let pinch = Rc::new(RefCell::new(PinchTracker::new()));
    let stage_target: &web_sys::EventTarget = &dom.stage;

    {
        let session = session.clone();
        let pinch = Rc::clone(&pinch);
        scope.listen(stage_target, "pointerdown", false, move |event: PointerEvent| {
            if session.from_seek_bar(&event) {
                return;
            }
            let pointer = dom_events::pointer_event(&session.element, PointerPhase::Down, &event);
            if event.pointer_type() == "touch" {
                let (pointer_id, time_stamp) = (event.pointer_id(), pointer.time_stamp);
                let started = pinch.borrow_mut().down(pointer_id, pointer.position, time_stamp);
                if let Some(start) = started {
                    session.with_annotator(|annotator| annotator.cancel_interaction());
                    session.dispatch(StageEvent::Pinch(start));
                    return;
                }
                if pinch.borrow().is_pinching() {
                    return;
                }
            }

            let Some(outcome) = session.dispatch(StageEvent::Pointer(pointer)) else {
                return;
            };
            // Overlay text keeps native focus and caret handling
            if outcome.target != Layer::Overlay {
                if let Err(err) = session.element.set_pointer_capture(event.pointer_id()) {
                    log::debug!("Pointer capture refused: {err:?}");
                }
            }
            if outcome.default_prevented {
                event.prevent_default();
            }
        })?;
    }

    {
        let session = session.clone();
        let pinch = Rc::clone(&pinch);
        scope.listen(stage_target, "pointermove", true, move |event: PointerEvent| {
            let pointer = dom_events::pointer_event(&session.element, PointerPhase::Move, &event);
            if event.pointer_type() == "touch" {
                let (pointer_id, time_stamp) = (event.pointer_id(), pointer.time_stamp);
                let update = pinch.borrow_mut().moved(pointer_id, pointer.position, time_stamp);
                if let Some(update) = update {
                    session.dispatch(StageEvent::Pinch(update));
                    return;
                }
            }
            if !pinch.borrow().is_pinching() {
                session.dispatch(StageEvent::Pointer(pointer));
            }
        })?;
    }

    for event_type in ["pointerup", "pointercancel"] {
        let session = session.clone();
        let pinch = Rc::clone(&pinch);
        scope.listen(stage_target, event_type, true, move |event: PointerEvent| {
            let pointer = dom_events::pointer_event(&session.element, PointerPhase::Up, &event);
            if session.element.has_pointer_capture(event.pointer_id()) {
                if let Err(err) = session.element.release_pointer_capture(event.pointer_id()) {
                    log::debug!("Releasing pointer capture failed: {err:?}");
                }
            }
            let was_pinching = pinch.borrow().is_pinching();
            let ended = pinch.borrow_mut().up(event.pointer_id(), pointer.time_stamp);
            if let Some(end) = ended {
                session.dispatch(StageEvent::Pinch(end));
                return;
            }
            if !was_pinching {
                session.dispatch(StageEvent::Pointer(pointer));
            }
        })?;
    }

    {
        let session = session.clone();
        scope.listen(stage_target, "wheel", false, move |event: WheelEvent| {
            if session.from_seek_bar(&event) {
                return;
            }
            let wheel = dom_events::wheel_event(&session.element, &event);
            if let Some(outcome) = session.dispatch(StageEvent::Wheel(wheel)) {
                if outcome.default_prevented {
                    event.prevent_default();
                }
            }
        })?;
    }

    {
        let session = session.clone();
        scope.listen(stage_target, "contextmenu", false, move |event: MouseEvent| {
            let position = dom_events::stage_point(
                &session.element,
                event.client_x() as f64,
                event.client_y() as f64,
            );
            if let Some(outcome) = session.dispatch(StageEvent::ContextMenu { position }) {
                if outcome.default_prevented {
                    event.prevent_default();
                }
            }
        })?;
    }

    {
        let session = session.clone();
        scope.listen(&dom.document, "keydown", false, move |event: KeyboardEvent| {
            if dom_events::is_text_entry(event.target()) {
                return;
            }
            session.dispatch(StageEvent::Key(dom_events::key_event(&event)));
        })?;
    }

    for event_type in ["timeupdate", "seeked"] {
        let session = session.clone();
        scope.listen(&dom.video, event_type, true, move |_: Event| {
            let time = session.dom.video.current_time();
            session.with_annotator(|annotator| annotator.set_playback_time(time));
        })?;
    }

    {
        let session = session.clone();
        scope.listen(&dom.video, "loadedmetadata", true, move |_: Event| {
            session.sync_media();
        })?;
    }

    if let Some(window) = web_sys::window() {
        let session = session.clone();
        scope.listen(&window, "resize", true, move |_: Event| {
            session.sync_media();
        })?;
    }

    {
        let session = session.clone();
        scope.listen(&dom.overlay, "input", true, move |event: Event| {
            let Some(id) = data_attribute(&event, "data-id") else {
                return;
            };
            let text = event
                .target()
                .and_then(|t| t.dyn_into::<HtmlElement>().ok())
                .and_then(|e| e.text_content())
                .unwrap_or_default();
            session.with_annotator(|annotator| {
                if let Err(err) = annotator.update_text(&id, &text) {
                    log::warn!("Text edit rejected: {err}");
                }
            });
        })?;
    }

    {
        let session = session.clone();
        scope.listen(&dom.seek_bar, "click", true, move |event: Event| {
            let time = data_attribute(&event, "data-time").and_then(|t| t.parse::<f64>().ok());
            if let Some(time) = time {
                session.dom.video.set_current_time(time);
            }
        })?;
    }

    Ok(scope)
}
