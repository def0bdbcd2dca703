//! Attach/detach lifecycle of an annotator on a stage
//!
//! All stage listeners of one attachment share a single [`AbortController`].
//! Attaching again first aborts the previous controller, so a session can be
//! moved to a new media source any number of times without stacking handlers.

use std::cell::RefCell;
use std::rc::Rc;

use framemark_shared::events::{EventKind, StageEvent};

use crate::annotator::{Annotator, MediaSource};
use crate::stage::{AbortController, EventContext, Handler, Layer, Stage};

pub struct AnnotatorHandle {
    annotator: Rc<RefCell<Annotator>>,
    scope: Option<AbortController>,
}

fn listener<F>(annotator: &Rc<RefCell<Annotator>>, mut f: F) -> Handler
where
    F: FnMut(&mut Annotator, &StageEvent, &mut EventContext<'_>) + 'static,
{
    let annotator = Rc::clone(annotator);
    Box::new(move |event: &StageEvent, ctx: &mut EventContext<'_>| {
        match annotator.try_borrow_mut() {
            Ok(mut annotator) => f(&mut annotator, event, ctx),
            Err(_) => log::warn!("Dropping re-entrant {:?} event", event.kind()),
        }
    })
}

impl AnnotatorHandle {
    pub fn new(annotator: Annotator) -> Self {
        Self {
            annotator: Rc::new(RefCell::new(annotator)),
            scope: None,
        }
    }

    pub fn annotator(&self) -> Rc<RefCell<Annotator>> {
        Rc::clone(&self.annotator)
    }

    pub fn is_attached(&self) -> bool {
        self.scope.is_some()
    }

    /// Registers the annotator's listeners on `stage` and loads `source`,
    /// revoking any earlier registration first
    pub fn attach(&mut self, stage: &mut Stage, source: MediaSource) {
        self.detach();

        let scope = AbortController::new();
        let signal = scope.signal();
        let a = &self.annotator;

        stage.add_listener(
            Layer::Canvas,
            EventKind::PointerDown,
            &signal,
            listener(a, |annotator: &mut Annotator, event: &StageEvent, ctx: &mut EventContext<'_>| {
                if let StageEvent::Pointer(pointer) = event {
                    annotator.on_canvas_pointer_down(pointer, ctx.layers);
                }
            }),
        );
        stage.add_listener(
            Layer::Stage,
            EventKind::PointerDown,
            &signal,
            listener(a, |annotator: &mut Annotator, event: &StageEvent, ctx: &mut EventContext<'_>| {
                if let StageEvent::Pointer(pointer) = event {
                    annotator.on_stage_pointer_down(pointer, ctx.layers);
                }
            }),
        );
        stage.add_listener(
            Layer::Stage,
            EventKind::PointerMove,
            &signal,
            listener(a, |annotator: &mut Annotator, event: &StageEvent, ctx: &mut EventContext<'_>| {
                if let StageEvent::Pointer(pointer) = event {
                    annotator.on_pointer_move(pointer, ctx.layers);
                }
            }),
        );
        stage.add_listener(
            Layer::Stage,
            EventKind::PointerUp,
            &signal,
            listener(a, |annotator: &mut Annotator, event: &StageEvent, ctx: &mut EventContext<'_>| {
                if let StageEvent::Pointer(pointer) = event {
                    annotator.on_pointer_up(pointer, ctx.layers);
                }
            }),
        );
        stage.add_listener(
            Layer::Stage,
            EventKind::Wheel,
            &signal,
            listener(a, |annotator: &mut Annotator, event: &StageEvent, ctx: &mut EventContext<'_>| {
                if let StageEvent::Wheel(wheel) = event {
                    ctx.prevent_default();
                    annotator.on_wheel(wheel, ctx.layers);
                }
            }),
        );
        stage.add_listener(
            Layer::Stage,
            EventKind::Pinch,
            &signal,
            listener(a, |annotator: &mut Annotator, event: &StageEvent, ctx: &mut EventContext<'_>| {
                if let StageEvent::Pinch(pinch) = event {
                    ctx.prevent_default();
                    annotator.on_pinch(pinch, ctx.layers);
                }
            }),
        );
        stage.add_listener(
            Layer::Stage,
            EventKind::KeyDown,
            &signal,
            listener(a, |annotator: &mut Annotator, event: &StageEvent, ctx: &mut EventContext<'_>| {
                if let StageEvent::Key(key) = event {
                    annotator.on_key(key, ctx.layers);
                }
            }),
        );
        // A right click must never open the browser menu over the stage
        stage.add_listener(
            Layer::Stage,
            EventKind::ContextMenu,
            &signal,
            Box::new(|_: &StageEvent, ctx: &mut EventContext<'_>| ctx.prevent_default()),
        );

        {
            let mut annotator = self.annotator.borrow_mut();
            annotator.load_source(source);
            annotator.sync_layers(stage.layers_mut());
        }
        log::info!("Annotator attached ({} stage listeners)", stage.listener_count());
        self.scope = Some(scope);
    }

    /// Revokes every listener of the current attachment
    pub fn detach(&mut self) {
        let Some(scope) = self.scope.take() else {
            return;
        };
        scope.abort();
        match self.annotator.try_borrow_mut() {
            Ok(mut annotator) => annotator.detached(),
            Err(_) => log::warn!("Annotator busy during detach, skipping final flush"),
        }
        log::info!("Annotator detached");
    }
}

impl Drop for AnnotatorHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotator::Surface;
    use crate::document::StillImage;
    use crate::render::RenderFrame;
    use framemark_config::AnnotatorSettings;
    use framemark_shared::{FramemarkResult, Size};

    struct NullSurface;

    impl Surface for NullSurface {
        fn present(&mut self, _frame: &RenderFrame) {}

        fn capture_still(&mut self) -> FramemarkResult<StillImage> {
            Ok(StillImage {
                url: String::new(),
                width: 0,
                height: 0,
            })
        }
    }

    fn source(name: &str) -> MediaSource {
        MediaSource {
            src: name.to_string(),
            natural_size: Size::new(320.0, 180.0),
            displayed_size: Size::new(320.0, 180.0),
            ..MediaSource::default()
        }
    }

    #[test]
    fn test_reattach_replaces_listeners() {
        let mut stage = Stage::new();
        let mut handle = AnnotatorHandle::new(Annotator::new(
            AnnotatorSettings::default(),
            Box::new(NullSurface),
            None,
        ));

        handle.attach(&mut stage, source("a.mp4"));
        let per_attach = stage.listener_count();
        handle.attach(&mut stage, source("b.mp4"));
        handle.attach(&mut stage, source("c.mp4"));
        assert_eq!(stage.listener_count(), per_attach);
        assert_eq!(handle.annotator().borrow().source().src, "c.mp4");

        handle.detach();
        assert!(!handle.is_attached());
        assert_eq!(stage.listener_count(), 0);
    }

    #[test]
    fn test_dropping_handle_revokes_listeners() {
        let mut stage = Stage::new();
        {
            let mut handle = AnnotatorHandle::new(Annotator::new(
                AnnotatorSettings::default(),
                Box::new(NullSurface),
                None,
            ));
            handle.attach(&mut stage, source("a.mp4"));
            assert!(stage.listener_count() > 0);
        }
        assert_eq!(stage.listener_count(), 0);
    }
}
