//! Browser host checks. Run with `wasm-pack test --headless --firefox crates/web-sdk`
//! or `cargo test --target wasm32-unknown-unknown` with a wasm-bindgen runner.

#![cfg(target_arch = "wasm32")]
#![allow(clippy::unwrap_used)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use js_sys::{Function, Reflect};
use pagewatch_web_sdk::host::{HistoryMethod, Host};
use pagewatch_web_sdk::BrowserHost;
use serde_json::{json, Value};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn test_on_loaded_runs_when_complete() {
    let host = BrowserHost::new().unwrap();
    let ran = Rc::new(Cell::new(false));
    let flag = Rc::clone(&ran);
    host.on_loaded(Box::new(move || flag.set(true)));

    let complete = web_sys::window()
        .and_then(|w| w.document())
        .map_or(true, |d| d.ready_state() == "complete");
    assert_eq!(ran.get(), complete);
}

#[wasm_bindgen_test]
fn test_history_wrapper_forwards_and_hooks() {
    let host = BrowserHost::new().unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    host.wrap_history(
        HistoryMethod::ReplaceState,
        Rc::new(move |method: HistoryMethod, args: &[Value]| {
            sink.borrow_mut().push((method, args.to_vec()));
        }),
    );

    let history = web_sys::window().unwrap().history().unwrap();
    let replace: Function = Reflect::get(&history, &JsValue::from_str("replaceState"))
        .unwrap()
        .dyn_into()
        .unwrap();
    let result = replace
        .call3(
            &history,
            &JsValue::NULL,
            &JsValue::from_str(""),
            &JsValue::from_str("#wrapped"),
        )
        .unwrap();

    assert!(result.is_undefined());
    assert!(web_sys::window()
        .unwrap()
        .location()
        .hash()
        .unwrap()
        .ends_with("wrapped"));
    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, HistoryMethod::ReplaceState);
    assert_eq!(seen[0].1, vec![Value::Null, json!(""), json!("#wrapped")]);
}

#[wasm_bindgen_test]
fn test_load_image_leaves_no_element() {
    let host = BrowserHost::new().unwrap();
    let body = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.body())
        .unwrap();
    let before = body.child_element_count();
    host.load_image("data:image/gif;base64,R0lGODlhAQABAAAAACw=");
    assert_eq!(body.child_element_count(), before);
}
