//! Browser host: `web-sys` bindings for wasm32 builds, plus the
//! `PageMonitor` class exported to page scripts.

use std::rc::Rc;

use js_sys::{Array, Function, Object, Reflect, JSON};
use pagewatch_core::{
    Action, MonitorError, MonitorOptions, MonitorResult, PageInfo, PathValue, TrackRecord,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, Blob, BlobPropertyBag, CustomEvent, CustomEventInit,
    ErrorEvent, Event, HtmlElement, HtmlImageElement, PerformanceObserver,
    PerformanceObserverEntryList, PerformanceObserverInit, PromiseRejectionEvent, Window,
};

use super::{
    Capabilities, Element, EventPayload, HistoryHook, HistoryMethod, Host, HostEvent, Listener,
    NavigationTiming, ObserverFlow, TimingObserver,
};
use crate::monitor::Monitor;

#[derive(Debug)]
struct BrowserElement(web_sys::Element);

impl Element for BrowserElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.0.has_attribute(name)
    }

    fn text(&self) -> String {
        match self.0.dyn_ref::<HtmlElement>() {
            Some(html) => html.inner_text(),
            None => self.0.text_content().unwrap_or_default(),
        }
    }

    fn parent(&self) -> Option<Rc<dyn Element>> {
        self.0
            .parent_element()
            .map(|p| Rc::new(BrowserElement(p)) as Rc<dyn Element>)
    }
}

fn js_to_json(value: &JsValue) -> Value {
    if value.is_undefined() {
        return Value::Null;
    }
    JSON::stringify(value)
        .ok()
        .map(String::from)
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or(Value::Null)
}

fn json_to_js(value: &Value) -> JsValue {
    serde_json::to_string(value)
        .ok()
        .and_then(|text| JSON::parse(&text).ok())
        .unwrap_or(JsValue::NULL)
}

fn reason_text(reason: &JsValue) -> String {
    if let Some(error) = reason.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    if let Some(text) = reason.as_string() {
        return text;
    }
    match js_to_json(reason) {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn to_host_event(event: &Event) -> HostEvent {
    let target = event
        .target()
        .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
        .map(|e| Rc::new(BrowserElement(e)) as Rc<dyn Element>);

    let payload = if let Some(error) = event.dyn_ref::<ErrorEvent>() {
        EventPayload::Message(error.message())
    } else if let Some(rejection) = event.dyn_ref::<PromiseRejectionEvent>() {
        EventPayload::Message(reason_text(&rejection.reason()))
    } else if let Some(custom) = event.dyn_ref::<CustomEvent>() {
        match js_to_json(&custom.detail()) {
            Value::Array(args) => EventPayload::Arguments(args),
            _ => EventPayload::None,
        }
    } else {
        EventPayload::None
    };

    HostEvent {
        name: event.type_(),
        target,
        payload,
    }
}

fn navigation_timing(entry: &JsValue) -> NavigationTiming {
    let field = |name: &str| {
        Reflect::get(entry, &JsValue::from_str(name))
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    };
    NavigationTiming {
        fetch_start: field("fetchStart"),
        domain_lookup_start: field("domainLookupStart"),
        domain_lookup_end: field("domainLookupEnd"),
        connect_start: field("connectStart"),
        connect_end: field("connectEnd"),
        response_start: field("responseStart"),
        dom_content_loaded_event_end: field("domContentLoadedEventEnd"),
    }
}

pub struct BrowserHost {
    window: Window,
}

impl BrowserHost {
    pub fn new() -> MonitorResult<Self> {
        let window = web_sys::window().ok_or(MonitorError::Unsupported("window"))?;
        Ok(Self { window })
    }
}

impl Host for BrowserHost {
    fn add_listener(&self, event: &str, listener: Listener) {
        let callback =
            Closure::<dyn FnMut(Event)>::new(move |fired: Event| listener(&to_host_event(&fired)));
        if let Err(e) = self
            .window
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
        {
            warn!(event, error = ?e, "addEventListener failed");
        }
        callback.forget();
    }

    fn dispatch(&self, event: HostEvent) {
        let init = CustomEventInit::new();
        if let EventPayload::Arguments(args) = &event.payload {
            init.set_detail(&json_to_js(&Value::Array(args.clone())));
        }
        match CustomEvent::new_with_event_init_dict(&event.name, &init) {
            Ok(custom) => {
                if let Err(e) = self.window.dispatch_event(&custom) {
                    warn!(event = %event.name, error = ?e, "dispatchEvent failed");
                }
            }
            Err(e) => warn!(event = %event.name, error = ?e, "could not create CustomEvent"),
        }
    }

    fn wrap_history(&self, method: HistoryMethod, hook: HistoryHook) {
        let name = method.as_str();
        let history = match self.window.history() {
            Ok(history) => history,
            Err(e) => {
                warn!(error = ?e, "history API unavailable");
                return;
            }
        };
        let Some(original) = Reflect::get(&history, &JsValue::from_str(name))
            .ok()
            .and_then(|f| f.dyn_into::<Function>().ok())
        else {
            warn!(method = name, "history method missing");
            return;
        };

        let this: JsValue = history.clone().into();
        let wrapper = Closure::<dyn FnMut(JsValue, JsValue, JsValue) -> Result<JsValue, JsValue>>::new(
            move |state: JsValue, unused: JsValue, url: JsValue| {
                let result = original.call3(&this, &state, &unused, &url)?;
                let mut args = vec![js_to_json(&state), js_to_json(&unused)];
                if !url.is_undefined() {
                    args.push(js_to_json(&url));
                }
                hook(method, &args);
                Ok(result)
            },
        );
        if let Err(e) = Reflect::set(&history, &JsValue::from_str(name), wrapper.as_ref()) {
            warn!(method = name, error = ?e, "could not replace history method");
        }
        wrapper.forget();
    }

    fn page_info(&self) -> PageInfo {
        let location = self.window.location();
        let document = self.window.document();
        PageInfo {
            user_agent: self.window.navigator().user_agent().unwrap_or_default(),
            url: location.href().unwrap_or_default(),
            domain: location.hostname().unwrap_or_default(),
            title: document.as_ref().map(|d| d.title()).unwrap_or_default(),
            referrer: document.as_ref().map(|d| d.referrer()).unwrap_or_default(),
        }
    }

    fn capabilities(&self) -> Capabilities {
        let navigator = self.window.navigator();
        Capabilities {
            beacon: Reflect::has(&navigator, &JsValue::from_str("sendBeacon")).unwrap_or(false),
            performance: self.window.performance().is_some()
                && Reflect::has(&self.window, &JsValue::from_str("PerformanceObserver"))
                    .unwrap_or(false),
        }
    }

    fn send_beacon(&self, url: &str, body: &str, content_type: &str) -> bool {
        let parts = Array::of1(&JsValue::from_str(body));
        let bag = BlobPropertyBag::new();
        bag.set_type(content_type);
        let blob = match Blob::new_with_str_sequence_and_options(&parts, &bag) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = ?e, "could not build beacon body");
                return false;
            }
        };
        self.window
            .navigator()
            .send_beacon_with_opt_blob(url, Some(&blob))
            .unwrap_or(false)
    }

    fn load_image(&self, src: &str) {
        let Some(document) = self.window.document() else {
            return;
        };
        let image = match document
            .create_element("img")
            .map(|e| e.dyn_into::<HtmlImageElement>())
        {
            Ok(Ok(image)) => image,
            _ => {
                warn!("could not create image element");
                return;
            }
        };
        if let Err(e) = image.style().set_property("display", "none") {
            debug!(error = ?e, "could not hide image element");
        }
        image.set_src(src);
        if let Some(body) = document.body() {
            if let Err(e) = body.append_child(&image) {
                warn!(error = ?e, "could not attach image element");
            }
        }
        image.remove();
    }

    fn on_loaded(&self, callback: Box<dyn FnOnce()>) {
        let complete = self
            .window
            .document()
            .map_or(true, |d| d.ready_state() == "complete");
        if complete {
            callback();
            return;
        }
        let options = AddEventListenerOptions::new();
        options.set_once(true);
        let handler = Closure::once_into_js(move || callback());
        if let Err(e) = self
            .window
            .add_event_listener_with_callback_and_add_event_listener_options(
                "load",
                handler.unchecked_ref(),
                &options,
            )
        {
            warn!(error = ?e, "could not defer until load");
        }
    }

    fn observe_navigation_timing(&self, observer: TimingObserver) -> MonitorResult<()> {
        if self.window.performance().is_none() {
            return Err(MonitorError::Unsupported("performance"));
        }
        let mut observer = observer;
        let callback = Closure::<dyn FnMut(PerformanceObserverEntryList, PerformanceObserver)>::new(
            move |list: PerformanceObserverEntryList, handle: PerformanceObserver| {
                let entries: Vec<NavigationTiming> = list
                    .get_entries()
                    .iter()
                    .map(|entry| navigation_timing(&entry))
                    .collect();
                if observer(&entries) == ObserverFlow::Disconnect {
                    handle.disconnect();
                }
            },
        );
        let handle = PerformanceObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|_| MonitorError::Unsupported("PerformanceObserver"))?;
        callback.forget();

        let init = Object::new();
        for (key, value) in [
            ("type", JsValue::from_str("navigation")),
            ("buffered", JsValue::TRUE),
        ] {
            if let Err(e) = Reflect::set(&init, &JsValue::from_str(key), &value) {
                warn!(key, error = ?e, "could not build observer options");
            }
        }
        handle.observe(init.unchecked_ref::<PerformanceObserverInit>());
        Ok(())
    }

    fn now_millis(&self) -> i64 {
        js_sys::Date::now() as i64
    }

    fn console(&self, line: &str) {
        web_sys::console::log_1(&JsValue::from_str(line));
    }
}

fn from_js<T: DeserializeOwned>(value: &JsValue) -> Result<T, JsValue> {
    let text = String::from(JSON::stringify(value)?);
    serde_json::from_str(&text).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn to_js_error(e: MonitorError) -> JsValue {
    js_sys::Error::new(&e.to_string()).into()
}

/// Page-facing handle. Keep the instance alive for the page's lifetime.
#[wasm_bindgen]
pub struct PageMonitor {
    monitor: Monitor,
}

#[wasm_bindgen]
impl PageMonitor {
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<PageMonitor, JsValue> {
        let options: MonitorOptions = from_js(&options)?;
        let host = BrowserHost::new().map_err(to_js_error)?;
        let monitor = Monitor::new(Rc::new(host), options).map_err(to_js_error)?;
        Ok(Self { monitor })
    }

    pub fn push(&self, record: JsValue) -> Result<(), JsValue> {
        let record: TrackRecord = from_js(&record)?;
        self.monitor.push(record).map(|_| ()).map_err(to_js_error)
    }

    /// `{path, name, value}` reported as a click.
    #[wasm_bindgen(js_name = clickPush)]
    pub fn click_push(&self, data: JsValue) -> Result<(), JsValue> {
        let data: TrackRecord = from_js(&data)?;
        let action = Action::with_value(
            data.name.unwrap_or_default(),
            data.value.unwrap_or_default(),
        );
        let path: Option<PathValue> = data.path;
        self.monitor
            .click_push(path, action)
            .map(|_| ())
            .map_err(to_js_error)
    }

    #[wasm_bindgen(js_name = setToken)]
    pub fn set_token(&self, token: String) {
        self.monitor.set_token(token);
    }

    #[wasm_bindgen(js_name = setConfig)]
    pub fn set_config(&self, patch: JsValue) -> Result<(), JsValue> {
        let patch: MonitorOptions = from_js(&patch)?;
        self.monitor.set_config(patch).map_err(to_js_error)
    }
}
