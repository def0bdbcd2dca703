//! DOM listener registration scoped to one AbortController
//!
//! Every listener of an attachment is registered with the same
//! `AbortSignal`, so revoking the scope removes all of them at once. The
//! scope also owns the Rust closures backing the listeners; they are
//! released when the scope is dropped.

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{AbortController, AddEventListenerOptions, Event, EventTarget};

pub struct ListenerScope {
    controller: AbortController,
    closures: Vec<Closure<dyn FnMut(Event)>>,
}

impl ListenerScope {
    pub fn new() -> Result<Self, JsValue> {
        Ok(Self {
            controller: AbortController::new()?,
            closures: Vec::new(),
        })
    }

    pub fn is_revoked(&self) -> bool {
        self.controller.signal().aborted()
    }

    pub fn len(&self) -> usize {
        self.closures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closures.is_empty()
    }

    /// Registers `handler` for `event_type` on `target`
    ///
    /// Events that cannot be cast to `E` are dropped. Non-passive listeners
    /// may call `prevent_default`.
    pub fn listen<E, F>(
        &mut self,
        target: &EventTarget,
        event_type: &str,
        passive: bool,
        mut handler: F,
    ) -> Result<(), JsValue>
    where
        E: JsCast,
        F: FnMut(E) + 'static,
    {
        if self.is_revoked() {
            log::debug!("Scope already revoked, not registering {event_type}");
            return Ok(());
        }

        let name = event_type.to_string();
        let closure = Closure::wrap(Box::new(move |event: Event| match event.dyn_into::<E>() {
            Ok(event) => handler(event),
            Err(_) => log::debug!("Unexpected event type for {name} listener"),
        }) as Box<dyn FnMut(Event)>);

        let options = AddEventListenerOptions::new();
        options.set_signal(&self.controller.signal());
        options.set_passive(passive);
        target.add_event_listener_with_callback_and_add_event_listener_options(
            event_type,
            closure.as_ref().unchecked_ref(),
            &options,
        )?;
        self.closures.push(closure);
        Ok(())
    }

    /// Detaches every listener registered through this scope
    pub fn revoke(&self) {
        if !self.is_revoked() {
            self.controller.abort();
        }
    }
}

impl Drop for ListenerScope {
    fn drop(&mut self) {
        self.revoke();
    }
}
