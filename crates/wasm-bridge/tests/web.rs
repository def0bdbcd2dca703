// Browser tests for the DOM bridge
// Run with: wasm-pack test --headless --chrome crates/wasm-bridge
use std::cell::Cell;
use std::rc::Rc;

use framemark_wasm::listeners::ListenerScope;
use framemark_wasm::Annotator;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;
use web_sys::{Event, EventTarget};

wasm_bindgen_test_configure!(run_in_browser);

fn stage_div(id: &str) -> web_sys::Element {
    let document = web_sys::window().unwrap().document().unwrap();
    let stage = document.create_element("div").unwrap();
    stage.set_id(id);
    document.body().unwrap().append_child(&stage).unwrap();
    stage
}

fn config(json: &str) -> JsValue {
    js_sys::JSON::parse(json).unwrap()
}

#[wasm_bindgen_test]
fn test_revoked_scope_stops_listening() {
    let target = EventTarget::new().unwrap();
    let fired = Rc::new(Cell::new(0));
    let mut scope = ListenerScope::new().unwrap();
    {
        let fired = Rc::clone(&fired);
        scope
            .listen(&target, "ping", true, move |_: Event| fired.set(fired.get() + 1))
            .unwrap();
    }
    assert_eq!(scope.len(), 1);

    target.dispatch_event(&Event::new("ping").unwrap()).unwrap();
    assert_eq!(fired.get(), 1);

    scope.revoke();
    assert!(scope.is_revoked());
    target.dispatch_event(&Event::new("ping").unwrap()).unwrap();
    assert_eq!(fired.get(), 1);
}

#[wasm_bindgen_test]
fn test_reattach_replaces_layers() {
    let stage = stage_div("reattach-stage");
    let annotator = Annotator::new(config(r#"{"videoSrc":"clip.mp4","readOnly":true}"#)).unwrap();

    annotator.attach("reattach-stage").unwrap();
    let layers = stage.query_selector_all("[data-framemark]").unwrap().length();
    assert!(layers > 0);

    annotator.attach("reattach-stage").unwrap();
    assert!(annotator.is_attached());
    assert_eq!(
        stage.query_selector_all("[data-framemark]").unwrap().length(),
        layers
    );

    annotator.detach().unwrap();
    assert!(!annotator.is_attached());
    assert_eq!(stage.query_selector_all("[data-framemark]").unwrap().length(), 0);
    stage.remove();
}

#[wasm_bindgen_test]
fn test_attach_to_missing_stage_fails() {
    let annotator = Annotator::new(config(r#"{"videoSrc":"clip.mp4"}"#)).unwrap();
    let err = annotator.attach("no-such-stage").unwrap_err();
    assert!(err.as_string().unwrap().contains("no-such-stage"));
    assert!(!annotator.is_attached());
}

#[wasm_bindgen_test]
fn test_tool_selection_round_trips_names() {
    let annotator = Annotator::new(config(r#"{"videoSrc":"clip.mp4"}"#)).unwrap();
    annotator.select_tool("rect").unwrap();
    assert_eq!(annotator.tool().unwrap(), "rectangle");
    annotator.select_tool("angle").unwrap();
    assert_eq!(annotator.angle_phase().unwrap(), "vertex");
    assert!(annotator.select_tool("lasso").is_err());
}

#[wasm_bindgen_test]
fn test_style_presets() {
    let annotator = Annotator::new(config(r#"{"videoSrc":"clip.mp4"}"#)).unwrap();
    assert_eq!(annotator.style_presets().unwrap().get(0).as_string().unwrap(), "red");
    annotator.save_preset("team", "#123456", 4.0).unwrap();
    annotator.apply_preset("team").unwrap();
    assert!(annotator.apply_preset("missing").is_err());
    assert!(annotator.save_preset("red", "#000000", 1.0).is_err());
}
