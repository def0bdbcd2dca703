//! Safe instance management for annotator instances
//! Replaces global mutable state with a thread-local registry keyed by id

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use framemark_config::PresetManager;
use framemark_core::{AnnotatorHandle, RenderFrame, SinkOutcome, Stage, StillImage, Surface};
use framemark_shared::{ErrorResponse, FramemarkError, FramemarkResult};
use uuid::Uuid;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::bindings;
use crate::canvas_surface::{js_error, CanvasSurface, StageDom};
use crate::listeners::ListenerScope;

/// Milliseconds on the page's monotonic clock, matching DOM event time stamps
pub fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

/// Presentation target while no stage is attached
pub struct DetachedSurface;

impl Surface for DetachedSurface {
    fn present(&mut self, _frame: &RenderFrame) {}

    fn capture_still(&mut self) -> FramemarkResult<StillImage> {
        Err(FramemarkError::Capture {
            message: "annotator is not attached to a stage".to_string(),
        })
    }
}

/// DOM side of one attachment
struct DomBinding {
    dom: StageDom,
    scope: ListenerScope,
}

/// A single annotator instance with all its associated state
pub struct AnnotatorInstance {
    pub handle: AnnotatorHandle,
    pub stage: Rc<RefCell<Stage>>,
    pub on_error: Option<js_sys::Function>,
    /// Toolbar stroke styles
    pub presets: PresetManager,
    binding: Option<DomBinding>,
    /// Pending debounce timeout and the deadline it was armed for
    save_timer: Option<(i32, f64)>,
}

impl AnnotatorInstance {
    pub fn new(annotator: framemark_core::Annotator) -> Self {
        Self {
            handle: AnnotatorHandle::new(annotator),
            stage: Rc::new(RefCell::new(Stage::new())),
            on_error: None,
            presets: PresetManager::new(),
            binding: None,
            save_timer: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.binding.is_some() && self.handle.is_attached()
    }

    /// Builds the stage DOM, registers every listener and loads the media
    ///
    /// An earlier attachment is fully revoked first, so attaching again to
    /// the same or another stage never stacks handlers.
    pub fn attach(&mut self, id: Uuid, stage_id: &str) -> FramemarkResult<()> {
        self.detach();

        let annotator = self.handle.annotator();
        let video_src = annotator.borrow().settings().video_src.clone();
        let dom = StageDom::build(stage_id, &video_src)?;
        let surface = CanvasSurface::new(dom.clone())?;
        annotator.borrow_mut().set_surface(Box::new(surface));

        let source = dom.media_source(&video_src, None);
        self.handle.attach(&mut self.stage.borrow_mut(), source);

        let scope = match bindings::bind(id, &dom, &self.stage, &annotator) {
            Ok(scope) => scope,
            Err(err) => {
                self.handle.detach();
                dom.teardown();
                return Err(js_error("Registering stage listeners", err));
            }
        };
        log::info!("Stage #{stage_id} bound with {} DOM listeners", scope.len());
        self.binding = Some(DomBinding { dom, scope });
        Ok(())
    }

    pub fn detach(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.scope.revoke();
            binding.dom.teardown();
        }
        self.handle.detach();
        if let Ok(mut annotator) = self.handle.annotator().try_borrow_mut() {
            annotator.set_surface(Box::new(DetachedSurface));
        }
        self.clear_save_timer();
    }

    /// Pushes derived pointer-routing state into the stage
    pub fn sync_layers(&self) {
        let annotator = self.handle.annotator();
        let (Ok(annotator), Ok(mut stage)) = (annotator.try_borrow(), self.stage.try_borrow_mut())
        else {
            return;
        };
        annotator.sync_layers(stage.layers_mut());
    }

    pub fn settle(&mut self, outcome: SinkOutcome) -> Option<FramemarkError> {
        let annotator = self.handle.annotator();
        let error = match annotator.try_borrow_mut() {
            Ok(mut annotator) => annotator.settle(outcome),
            Err(_) => {
                log::warn!("Annotator busy, dropping sink outcome {outcome:?}");
                None
            }
        };
        self.sync_layers();
        error
    }

    fn clear_save_timer(&mut self) {
        if let Some((handle, _)) = self.save_timer.take() {
            if let Some(window) = web_sys::window() {
                window.clear_timeout_with_handle(handle);
            }
        }
    }

    /// Keeps one timeout armed for the annotator's next debounced flush
    pub fn arm_save_timer(&mut self, id: Uuid) {
        let due = match self.handle.annotator().try_borrow() {
            Ok(annotator) => annotator.next_flush_due(),
            Err(_) => return,
        };
        if due == self.save_timer.map(|(_, armed)| armed) {
            return;
        }
        self.clear_save_timer();
        let (Some(due), Some(window)) = (due, web_sys::window()) else {
            return;
        };

        let delay = (due - now_ms()).max(0.0).ceil() as i32;
        let callback = Closure::once_into_js(move || fire_save_timer(id));
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.unchecked_ref(),
            delay,
        ) {
            Ok(handle) => self.save_timer = Some((handle, due)),
            Err(err) => log::error!("Arming save timer failed: {err:?}"),
        }
    }
}

impl Drop for AnnotatorInstance {
    fn drop(&mut self) {
        self.detach();
    }
}

fn fire_save_timer(id: Uuid) {
    InstanceManager::with_instance_mut(&id, |instance| {
        instance.save_timer = None;
        if let Ok(mut annotator) = instance.handle.annotator().try_borrow_mut() {
            annotator.tick(now_ms());
        }
        instance.arm_save_timer(id);
    });
}

// Thread-local storage for annotator instances
thread_local! {
    static ANNOTATOR_INSTANCES: RefCell<HashMap<Uuid, AnnotatorInstance>> = RefCell::new(HashMap::new());
}

/// Manages annotator instances safely without global mutable state
pub struct InstanceManager;

impl InstanceManager {
    /// Create a new instance and return its ID; the builder receives the id
    /// so sinks can report back to the instance
    pub fn create_instance<F>(build: F) -> Uuid
    where
        F: FnOnce(Uuid) -> AnnotatorInstance,
    {
        let id = Uuid::new_v4();
        let instance = build(id);
        ANNOTATOR_INSTANCES.with(|instances| {
            instances.borrow_mut().insert(id, instance);
        });
        id
    }

    /// Get a reference to an instance
    pub fn with_instance<F, R>(id: &Uuid, f: F) -> Option<R>
    where
        F: FnOnce(&AnnotatorInstance) -> R,
    {
        ANNOTATOR_INSTANCES.with(|instances| match instances.try_borrow() {
            Ok(instances) => instances.get(id).map(f),
            Err(_) => {
                log::warn!("Instance registry busy, skipping read of {id}");
                None
            }
        })
    }

    /// Get a mutable reference to an instance
    ///
    /// Re-entrant calls (a DOM event fired synchronously from inside another
    /// instance call) are skipped instead of panicking.
    pub fn with_instance_mut<F, R>(id: &Uuid, f: F) -> Option<R>
    where
        F: FnOnce(&mut AnnotatorInstance) -> R,
    {
        ANNOTATOR_INSTANCES.with(|instances| match instances.try_borrow_mut() {
            Ok(mut instances) => instances.get_mut(id).map(f),
            Err(_) => {
                log::warn!("Instance registry busy, skipping update of {id}");
                None
            }
        })
    }

    /// Check if an instance exists
    pub fn instance_exists(id: &Uuid) -> bool {
        ANNOTATOR_INSTANCES.with(|instances| instances.borrow().contains_key(id))
    }

    /// Remove an instance; it is dropped outside the registry borrow
    pub fn remove_instance(id: &Uuid) -> Option<AnnotatorInstance> {
        ANNOTATOR_INSTANCES.with(|instances| instances.borrow_mut().remove(id))
    }

    /// Get the number of active instances
    pub fn instance_count() -> usize {
        ANNOTATOR_INSTANCES.with(|instances| instances.borrow().len())
    }

    /// Forwards a settled sink request and reports any failure
    pub fn settle(id: &Uuid, outcome: SinkOutcome, operation: &str) {
        let error = Self::with_instance_mut(id, |instance| {
            let error = instance.settle(outcome);
            instance.arm_save_timer(*id);
            error
        });
        match error {
            Some(Some(error)) => Self::report_error(id, error, operation),
            Some(None) => {}
            None => log::debug!("Sink outcome for unknown instance {id}"),
        }
    }

    /// Hands an error to the host's `on_error` callback, or the console
    pub fn report_error(id: &Uuid, error: FramemarkError, operation: &str) {
        let payload = ErrorResponse::new(error)
            .with_context("Annotator", operation)
            .to_json();
        let callback = Self::with_instance(id, |instance| instance.on_error.clone()).flatten();
        match callback {
            Some(callback) => {
                if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(&payload)) {
                    log::error!("Error callback threw: {err:?}");
                }
            }
            None => log::error!("{payload}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framemark_config::AnnotatorSettings;

    fn instance() -> AnnotatorInstance {
        AnnotatorInstance::new(framemark_core::Annotator::new(
            AnnotatorSettings::default(),
            Box::new(DetachedSurface),
            None,
        ))
    }

    #[test]
    fn test_instance_creation_and_retrieval() {
        let mut seen = None;
        let id = InstanceManager::create_instance(|id| {
            seen = Some(id);
            instance()
        });
        assert_eq!(seen, Some(id));

        assert!(InstanceManager::instance_exists(&id));
        assert_eq!(
            InstanceManager::with_instance(&id, |instance| instance.is_attached()),
            Some(false)
        );

        InstanceManager::remove_instance(&id);
        assert!(!InstanceManager::instance_exists(&id));
        assert_eq!(InstanceManager::with_instance(&id, |_| ()), None);
    }

    #[test]
    fn test_detached_surface_cannot_capture() {
        let id = InstanceManager::create_instance(|_| instance());
        let result = InstanceManager::with_instance_mut(&id, |instance| {
            instance.handle.annotator().borrow_mut().capture_snapshot()
        });
        assert!(matches!(result, Some(Err(FramemarkError::Capture { .. }))));
        InstanceManager::remove_instance(&id);
    }
}
