//! WASM Bridge crate for Framemark
//! Adapts the browser to the annotation core: DOM listeners, Canvas2D
//! surface, fetch-based saving and the JavaScript-facing API

use std::str::FromStr;

use framemark_config::{AnnotatorSettings, ConfigParser};
use framemark_core::Tool;
use framemark_shared::{ErrorResponse, FramemarkError, FramemarkResult, Style};
use wasm_bindgen::prelude::*;

pub mod bindings;
pub mod canvas_surface;
pub mod dom_events;
pub mod fetch;
pub mod instance_manager;
pub mod listeners;

use fetch::FetchSink;
use instance_manager::{now_ms, AnnotatorInstance, DetachedSurface, InstanceManager};
use uuid::Uuid;

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    // A second module instance on the page already installed the logger
    let _ = console_log::init_with_level(log::Level::Info);
}

fn to_js(error: FramemarkError, operation: &str) -> JsValue {
    JsValue::from_str(
        &ErrorResponse::new(error)
            .with_context("Annotator", operation)
            .to_json(),
    )
}

fn parse_settings(config: JsValue) -> FramemarkResult<AnnotatorSettings> {
    let value: serde_json::Value =
        serde_wasm_bindgen::from_value(config).map_err(|e| FramemarkError::InvalidConfig {
            message: e.to_string(),
            field: None,
        })?;
    let host = ConfigParser::parse_value(value)?;
    Ok(AnnotatorSettings::resolve(host)?)
}

#[wasm_bindgen]
pub struct Annotator {
    instance_id: Uuid,
}

#[wasm_bindgen]
impl Annotator {
    /// Creates an annotator from the host configuration object
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<Annotator, JsValue> {
        let settings = parse_settings(config).map_err(|e| to_js(e, "new"))?;
        let read_only = settings.read_only;

        let instance_id = InstanceManager::create_instance(|id| {
            let sink: Option<Box<dyn framemark_core::SaveSink>> = if read_only {
                None
            } else {
                Some(Box::new(FetchSink::new(id)))
            };
            AnnotatorInstance::new(framemark_core::Annotator::new(
                settings,
                Box::new(DetachedSurface),
                sink,
            ))
        });
        Ok(Annotator { instance_id })
    }

    fn with_instance<R>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut AnnotatorInstance) -> FramemarkResult<R>,
    ) -> Result<R, JsValue> {
        let id = self.instance_id;
        let result = InstanceManager::with_instance_mut(&id, |instance| {
            let result = f(instance);
            instance.sync_layers();
            instance.arm_save_timer(id);
            result
        })
        .unwrap_or_else(|| {
            Err(FramemarkError::NotFound {
                resource: format!("annotator instance {id}"),
            })
        });
        result.map_err(|e| to_js(e, operation))
    }

    fn with_core<R>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut framemark_core::Annotator) -> FramemarkResult<R>,
    ) -> Result<R, JsValue> {
        self.with_instance(operation, |instance| {
            let annotator = instance.handle.annotator();
            let mut annotator = annotator
                .try_borrow_mut()
                .map_err(|_| FramemarkError::Internal {
                    message: "annotator is busy".to_string(),
                })?;
            annotator.advance_clock(now_ms());
            f(&mut annotator)
        })
    }

    /// Builds the layer stack inside the element with id `stage_id` and
    /// starts listening; attaching again first revokes the previous stage
    #[wasm_bindgen]
    pub fn attach(&self, stage_id: &str) -> Result<(), JsValue> {
        let id = self.instance_id;
        self.with_instance("attach", |instance| instance.attach(id, stage_id))
    }

    #[wasm_bindgen]
    pub fn detach(&self) -> Result<(), JsValue> {
        self.with_instance("detach", |instance| {
            instance.detach();
            Ok(())
        })
    }

    #[wasm_bindgen]
    pub fn is_attached(&self) -> bool {
        InstanceManager::with_instance(&self.instance_id, |instance| instance.is_attached())
            .unwrap_or(false)
    }

    #[wasm_bindgen]
    pub fn is_read_only(&self) -> Result<bool, JsValue> {
        self.with_core("is_read_only", |annotator| Ok(annotator.is_read_only()))
    }

    /// Registers `callback(errorJson)` for failures outside direct calls,
    /// such as saves and uploads settling later
    #[wasm_bindgen]
    pub fn on_error(&self, callback: js_sys::Function) -> Result<(), JsValue> {
        self.with_instance("on_error", |instance| {
            instance.on_error = Some(callback);
            Ok(())
        })
    }

    #[wasm_bindgen]
    pub fn select_tool(&self, name: &str) -> Result<(), JsValue> {
        let tool = Tool::from_str(name).map_err(|e| to_js(e, "select_tool"))?;
        self.with_core("select_tool", |annotator| {
            annotator.select_tool(tool);
            Ok(())
        })
    }

    #[wasm_bindgen]
    pub fn tool(&self) -> Result<String, JsValue> {
        self.with_core("tool", |annotator| Ok(annotator.tool().name().to_string()))
    }

    /// `none`, `vertex`, `control` or `end`
    #[wasm_bindgen]
    pub fn angle_phase(&self) -> Result<String, JsValue> {
        self.with_core("angle_phase", |annotator| {
            Ok(annotator.angle_phase().name().to_string())
        })
    }

    #[wasm_bindgen]
    pub fn set_style(&self, color: &str, width: f64) -> Result<(), JsValue> {
        self.with_core("set_style", |annotator| {
            annotator.set_style(Style::new(color, width));
            Ok(())
        })
    }

    /// Names of the built-in and user stroke presets, in toolbar order
    #[wasm_bindgen]
    pub fn style_presets(&self) -> Result<js_sys::Array, JsValue> {
        self.with_instance("style_presets", |instance| {
            Ok(instance
                .presets
                .list_presets_by_name()
                .into_iter()
                .map(JsValue::from_str)
                .collect())
        })
    }

    #[wasm_bindgen]
    pub fn apply_preset(&self, name: &str) -> Result<(), JsValue> {
        self.with_instance("apply_preset", |instance| {
            let style = instance
                .presets
                .get(name)
                .map(|preset| preset.style.clone())
                .ok_or_else(|| FramemarkError::NotFound {
                    resource: format!("style preset '{name}'"),
                })?;
            let annotator = instance.handle.annotator();
            let mut annotator = annotator
                .try_borrow_mut()
                .map_err(|_| FramemarkError::Internal {
                    message: "annotator is busy".to_string(),
                })?;
            annotator.set_style(style);
            Ok(())
        })
    }

    #[wasm_bindgen]
    pub fn save_preset(&self, name: &str, color: &str, width: f64) -> Result<(), JsValue> {
        self.with_instance("save_preset", |instance| {
            Ok(instance
                .presets
                .add_user_preset(name.to_string(), Style::new(color, width))?)
        })
    }

    #[wasm_bindgen]
    pub fn zoom(&self) -> Result<f64, JsValue> {
        self.with_core("zoom", |annotator| Ok(annotator.zoom()))
    }

    #[wasm_bindgen]
    pub fn zoom_in(&self) -> Result<(), JsValue> {
        self.with_core("zoom_in", |annotator| {
            annotator.zoom_in();
            Ok(())
        })
    }

    #[wasm_bindgen]
    pub fn zoom_out(&self) -> Result<(), JsValue> {
        self.with_core("zoom_out", |annotator| {
            annotator.zoom_out();
            Ok(())
        })
    }

    /// Sets the user zoom factor; the effective zoom is base times factor
    #[wasm_bindgen]
    pub fn set_zoom_factor(&self, factor: f64) -> Result<(), JsValue> {
        self.with_core("set_zoom_factor", |annotator| {
            annotator.set_zoom_factor(factor);
            Ok(())
        })
    }

    #[wasm_bindgen]
    pub fn reset_view(&self) -> Result<(), JsValue> {
        self.with_core("reset_view", |annotator| {
            annotator.reset_view();
            Ok(())
        })
    }

    #[wasm_bindgen]
    pub fn pan_by(&self, dx: f64, dy: f64) -> Result<(), JsValue> {
        self.with_core("pan_by", |annotator| {
            annotator.pan_by(dx, dy);
            Ok(())
        })
    }

    /// Moves the playhead without waiting for the video's time updates
    #[wasm_bindgen]
    pub fn set_playback(&self, time: f64) -> Result<(), JsValue> {
        self.with_core("set_playback", |annotator| {
            annotator.set_playback_time(time);
            Ok(())
        })
    }

    #[wasm_bindgen]
    pub fn clear_current_frame(&self) -> Result<u32, JsValue> {
        self.with_core("clear_current_frame", |annotator| {
            annotator.clear_current_frame().map(|n| n as u32)
        })
    }

    #[wasm_bindgen]
    pub fn delete_drawing(&self, id: &str) -> Result<bool, JsValue> {
        self.with_core("delete_drawing", |annotator| annotator.delete_drawing(id))
    }

    #[wasm_bindgen]
    pub fn update_text(&self, id: &str, text: &str) -> Result<bool, JsValue> {
        self.with_core("update_text", |annotator| annotator.update_text(id, text))
    }

    /// Captures the composited frame and returns the new snapshot id
    #[wasm_bindgen]
    pub fn capture_snapshot(&self) -> Result<String, JsValue> {
        self.with_core("capture_snapshot", |annotator| annotator.capture_snapshot())
    }

    #[wasm_bindgen]
    pub fn delete_snapshot(&self, id: &str) -> Result<bool, JsValue> {
        self.with_core("delete_snapshot", |annotator| annotator.delete_snapshot(id))
    }

    #[wasm_bindgen]
    pub fn undo(&self) -> Result<bool, JsValue> {
        self.with_core("undo", |annotator| annotator.undo())
    }

    #[wasm_bindgen]
    pub fn redo(&self) -> Result<bool, JsValue> {
        self.with_core("redo", |annotator| annotator.redo())
    }

    /// Saves now instead of waiting for the debounce; false when there was
    /// nothing new to send
    #[wasm_bindgen]
    pub fn flush(&self) -> Result<bool, JsValue> {
        self.with_core("flush", |annotator| Ok(annotator.flush()))
    }

    #[wasm_bindgen]
    pub fn document_json(&self) -> Result<String, JsValue> {
        self.with_core("document_json", |annotator| Ok(annotator.document_json()))
    }
}

impl Drop for Annotator {
    fn drop(&mut self) {
        // Dropped outside the registry borrow; detaches and flushes
        if InstanceManager::remove_instance(&self.instance_id).is_some() {
            log::info!("Annotator {} released", self.instance_id);
        }
    }
}
