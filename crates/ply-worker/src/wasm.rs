//! Browser execution boundary.
//!
//! A Web Worker loads the real Svelte compiler, hands it to
//! [`set_component_compiler`], then forwards every `event.data` to
//! [`bundle`] and posts the returned object back to the page:
//!
//! ```javascript
//! import init, { bundle, setComponentCompiler, takePanicResponse } from './pkg/ply_worker.js';
//! import { compile } from 'svelte/compiler';
//!
//! await init();
//! setComponentCompiler((source, filename) => {
//!   const result = compile(source, { filename });
//!   return { js: result.js.code, css: result.css?.code };
//! });
//!
//! self.onmessage = (event) => {
//!   try {
//!     self.postMessage(bundle(event.data));
//!   } catch (trap) {
//!     // A panic aborts the module; its sanitized response was recorded first.
//!     const response = takePanicResponse();
//!     if (!response) throw trap;
//!     self.postMessage(response);
//!   }
//! };
//! ```
//!
//! After a panic the instance should be re-initialised before the next
//! request.

use std::cell::RefCell;

use ply_bundler::BundlerConfig;
use ply_plugin_svelte::{CompileFailure, CompiledComponent, ComponentCompiler, TemplateFallbackCompiler};
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::engine::Engine;
use crate::panic_capture;
use crate::protocol::{BundleRequest, HostCompileOutput};

thread_local! {
    static ENGINE: Engine = Engine::with_compiler(BundlerConfig::default(), HostCompiler);
    static HOST_COMPILE: RefCell<Option<js_sys::Function>> = const { RefCell::new(None) };
}

/// Component compiler backed by the host's `compile(source, filename)`
/// function, falling back to [`TemplateFallbackCompiler`] until one is set.
#[derive(Debug, Clone, Copy, Default)]
struct HostCompiler;

impl ComponentCompiler for HostCompiler {
    fn compile(&self, id: &str, source: &str) -> Result<CompiledComponent, CompileFailure> {
        let compile = HOST_COMPILE.with(|slot| slot.borrow().clone());
        let Some(compile) = compile else {
            return TemplateFallbackCompiler.compile(id, source);
        };

        let output = compile
            .call2(&JsValue::NULL, &JsValue::from_str(source), &JsValue::from_str(id))
            .map_err(|thrown| host_failure(&thrown))?;
        let output: HostCompileOutput = serde_wasm_bindgen::from_value(output).map_err(|e| {
            CompileFailure::new(format!("Component compiler returned an invalid result: {e}"), None)
        })?;
        Ok(output.into())
    }
}

/// Reads `message` and the Svelte-style `start.character` (or `pos`) off a
/// thrown value.
fn host_failure(thrown: &JsValue) -> CompileFailure {
    let field = |target: &JsValue, key: &str| {
        js_sys::Reflect::get(target, &JsValue::from_str(key))
            .ok()
            .filter(|value| !value.is_undefined() && !value.is_null())
    };

    let message = field(thrown, "message")
        .and_then(|message| message.as_string())
        .or_else(|| thrown.as_string())
        .unwrap_or_else(|| "Component compiler failed".to_string());
    let pos = field(thrown, "start")
        .and_then(|start| field(&start, "character"))
        .or_else(|| field(thrown, "pos"))
        .and_then(|pos| pos.as_f64())
        .filter(|pos| pos.is_finite() && *pos >= 0.0 && *pos <= f64::from(u32::MAX))
        .map(|pos| pos as u32);
    CompileFailure::new(message, pos)
}

/// Installs the panic hooks.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    panic_capture::install_hook();
}

/// Sets the function that compiles `.svelte` files for the component
/// dialect. It is called as `compile(source, filename)` and must return
/// `{ js, css? }` or throw.
#[wasm_bindgen(js_name = setComponentCompiler)]
pub fn set_component_compiler(compile: js_sys::Function) {
    HOST_COMPILE.with(|slot| *slot.borrow_mut() = Some(compile));
}

/// Bundles one request object and returns the response object.
///
/// Only a malformed request throws; bundle failures come back in the
/// response's `error` field.
#[wasm_bindgen]
pub fn bundle(request: JsValue) -> Result<JsValue, JsValue> {
    let request: BundleRequest = serde_wasm_bindgen::from_value(request)
        .map_err(|e| JsValue::from(js_sys::Error::new(&format!("Invalid bundle request: {e}"))))?;

    let response = ENGINE.with(|engine| engine.handle_observed(request, panic_capture::begin));
    panic_capture::finish();

    to_js(&response)
}

/// The sanitized response of a request that panicked, or `undefined`.
#[wasm_bindgen(js_name = takePanicResponse)]
pub fn take_panic_response() -> Result<JsValue, JsValue> {
    match panic_capture::take() {
        Some(response) => to_js(&response),
        None => Ok(JsValue::UNDEFINED),
    }
}

fn to_js(value: &impl Serialize) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from(js_sys::Error::new(&format!("Failed to serialize bundle response: {e}"))))
}
