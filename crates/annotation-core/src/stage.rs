//! Stage event routing and scoped listener registration
//!
//! The stage is the outer interactive surface. It stacks the media element,
//! the drawing canvas and the overlay layer (text/note elements). A
//! positional event is delivered to the topmost layer that is not
//! pointer-transparent at that point and then bubbles to the stage itself,
//! mirroring DOM dispatch.
//!
//! Every listener is registered under an [`AbortSignal`]. Aborting the owning
//! [`AbortController`] revokes all listeners of a registration scope at once,
//! which is what makes re-attaching safe.

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use framemark_shared::events::{EventKind, StageEvent};
use framemark_shared::{Point, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    Stage,
    Media,
    Canvas,
    Overlay,
}

#[derive(Clone, Debug, Default)]
pub struct AbortSignal(Rc<Cell<bool>>);

impl AbortSignal {
    pub fn aborted(&self) -> bool {
        self.0.get()
    }
}

/// Revocation handle for a group of listeners
#[derive(Debug, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    pub fn abort(&self) {
        self.signal.0.set(true);
    }
}

/// Pointer routing state of the stacked layers
#[derive(Debug, Default)]
pub struct Layers {
    transparent: HashSet<Layer>,
    /// Viewport-space boxes of overlay elements
    overlay_regions: Vec<Rect>,
}

impl Layers {
    pub fn set_transparent(&mut self, layer: Layer, transparent: bool) {
        if transparent {
            self.transparent.insert(layer);
        } else {
            self.transparent.remove(&layer);
        }
    }

    pub fn is_transparent(&self, layer: Layer) -> bool {
        self.transparent.contains(&layer)
    }

    pub fn set_overlay_regions(&mut self, regions: Vec<Rect>) {
        self.overlay_regions = regions;
    }

    /// Topmost layer receiving pointer events at `point`
    pub fn target_at(&self, point: Point) -> Layer {
        if !self.is_transparent(Layer::Overlay)
            && self.overlay_regions.iter().any(|r| r.contains(point))
        {
            return Layer::Overlay;
        }
        [Layer::Canvas, Layer::Media]
            .into_iter()
            .find(|layer| !self.is_transparent(*layer))
            .unwrap_or(Layer::Stage)
    }
}

/// Per-dispatch context handed to listeners
pub struct EventContext<'a> {
    pub target: Layer,
    pub layers: &'a mut Layers,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl EventContext<'_> {
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }
}

pub type Handler = Box<dyn FnMut(&StageEvent, &mut EventContext<'_>)>;

struct Listener {
    layer: Layer,
    kind: EventKind,
    signal: AbortSignal,
    handler: Handler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub target: Layer,
    pub delivered: usize,
    pub default_prevented: bool,
}

#[derive(Default)]
pub struct Stage {
    listeners: Vec<Listener>,
    layers: Layers,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> &Layers {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut Layers {
        &mut self.layers
    }

    pub fn add_listener(
        &mut self,
        layer: Layer,
        kind: EventKind,
        signal: &AbortSignal,
        handler: Handler,
    ) {
        if signal.aborted() {
            log::debug!("Ignoring {kind:?} listener registered with an aborted signal");
            return;
        }
        self.listeners.push(Listener {
            layer,
            kind,
            signal: signal.clone(),
            handler,
        });
    }

    /// Live listeners; aborted registrations are not counted
    pub fn listener_count(&self) -> usize {
        self.listeners.iter().filter(|l| !l.signal.aborted()).count()
    }

    pub fn dispatch(&mut self, event: &StageEvent) -> DispatchOutcome {
        self.listeners.retain(|l| !l.signal.aborted());

        let Stage { listeners, layers } = self;
        let target = event
            .position()
            .map(|p| layers.target_at(p))
            .unwrap_or(Layer::Stage);
        let mut path = vec![target];
        if target != Layer::Stage {
            path.push(Layer::Stage);
        }

        let kind = event.kind();
        let mut ctx = EventContext {
            target,
            layers,
            default_prevented: false,
            propagation_stopped: false,
        };
        let mut delivered = 0;

        for layer in path {
            for listener in listeners.iter_mut() {
                // A handler earlier in this dispatch may have revoked the scope
                if listener.layer != layer || listener.kind != kind || listener.signal.aborted() {
                    continue;
                }
                (listener.handler)(event, &mut ctx);
                delivered += 1;
            }
            if ctx.propagation_stopped {
                break;
            }
        }

        DispatchOutcome {
            target,
            delivered,
            default_prevented: ctx.default_prevented,
        }
    }
}
