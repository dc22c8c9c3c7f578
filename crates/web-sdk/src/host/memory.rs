//! In-memory host: a scripted page used by tests and the replay CLI. Every
//! request the transport issues is recorded instead of sent.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use chrono::Utc;
use pagewatch_core::{MonitorError, MonitorResult, PageInfo};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{
    Capabilities, Element, EventPayload, HistoryHook, HistoryMethod, Host, HostEvent, Listener,
    NavigationTiming, ObserverFlow, TimingObserver,
};

type Mutator = Rc<dyn Fn(&[Value]) -> Value>;

/// A request the transport handed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum SentRequest {
    Beacon {
        url: String,
        body: String,
        content_type: String,
    },
    Image {
        src: String,
    },
}

/// Element node with attributes, text, and an optional parent.
#[derive(Debug, Default)]
pub struct MemoryElement {
    attributes: HashMap<String, String>,
    text: String,
    parent: Option<Rc<MemoryElement>>,
}

impl MemoryElement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn inside(mut self, parent: &Rc<MemoryElement>) -> Self {
        self.parent = Some(Rc::clone(parent));
        self
    }

    pub fn build(self) -> Rc<MemoryElement> {
        Rc::new(self)
    }
}

impl Element for MemoryElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn parent(&self) -> Option<Rc<dyn Element>> {
        self.parent.clone().map(|p| p as Rc<dyn Element>)
    }
}

pub struct MemoryHost {
    listeners: RefCell<HashMap<String, Vec<Listener>>>,
    history: RefCell<HashMap<HistoryMethod, Mutator>>,
    page: Rc<RefCell<PageInfo>>,
    capabilities: Cell<Capabilities>,
    loaded: Cell<bool>,
    pending_loaded: RefCell<Vec<Box<dyn FnOnce()>>>,
    observers: RefCell<Vec<TimingObserver>>,
    requests: RefCell<Vec<SentRequest>>,
    console_lines: RefCell<Vec<String>>,
    clock: Cell<Option<i64>>,
}

impl MemoryHost {
    /// A page still loading, with every capability present.
    pub fn new(page: PageInfo) -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
            history: RefCell::new(HashMap::new()),
            page: Rc::new(RefCell::new(page)),
            capabilities: Cell::new(Capabilities {
                beacon: true,
                performance: true,
            }),
            loaded: Cell::new(false),
            pending_loaded: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            requests: RefCell::new(Vec::new()),
            console_lines: RefCell::new(Vec::new()),
            clock: Cell::new(None),
        }
    }

    pub fn with_capabilities(self, capabilities: Capabilities) -> Self {
        self.capabilities.set(capabilities);
        self
    }

    pub fn set_capabilities(&self, capabilities: Capabilities) {
        self.capabilities.set(capabilities);
    }

    /// Pin the capture clock; `None` follows wall time.
    pub fn set_clock(&self, millis: Option<i64>) {
        self.clock.set(millis);
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.borrow().get(event).map_or(0, Vec::len)
    }

    /// Page code calling `history.pushState(state, "", url)`.
    pub fn push_state(&self, state: Value, url: Option<&str>) -> Value {
        self.call_history(HistoryMethod::PushState, state, url)
    }

    /// Page code calling `history.replaceState(state, "", url)`.
    pub fn replace_state(&self, state: Value, url: Option<&str>) -> Value {
        self.call_history(HistoryMethod::ReplaceState, state, url)
    }

    fn call_history(&self, method: HistoryMethod, state: Value, url: Option<&str>) -> Value {
        let mutator = self.current_mutator(method);
        let mut args = vec![state, Value::String(String::new())];
        if let Some(url) = url {
            args.push(Value::String(url.to_string()));
        }
        mutator(&args)
    }

    fn current_mutator(&self, method: HistoryMethod) -> Mutator {
        if let Some(existing) = self.history.borrow().get(&method) {
            return Rc::clone(existing);
        }
        let page = Rc::clone(&self.page);
        Rc::new(move |args: &[Value]| {
            if let Some(Value::String(target)) = args.get(2) {
                navigate(&page, target);
            }
            Value::Null
        })
    }

    /// Back/forward navigation.
    pub fn pop_state(&self) {
        self.dispatch(HostEvent::named("popstate"));
    }

    pub fn change_hash(&self, hash: &str) {
        navigate(&self.page, &format!("#{}", hash.trim_start_matches('#')));
        self.dispatch(HostEvent::named("hashchange"));
    }

    /// Fire a DOM event (e.g. `click`) with `target` as the event target.
    pub fn fire(&self, event: &str, target: &Rc<MemoryElement>) {
        let target: Rc<dyn Element> = Rc::clone(target) as Rc<dyn Element>;
        self.dispatch(HostEvent::targeting(event, target));
    }

    pub fn raise_error(&self, message: &str) {
        self.dispatch(
            HostEvent::named("error").with_payload(EventPayload::Message(message.to_string())),
        );
    }

    pub fn reject_promise(&self, reason: &str) {
        self.dispatch(
            HostEvent::named("unhandledrejection")
                .with_payload(EventPayload::Message(reason.to_string())),
        );
    }

    /// Complete document load and run deferred callbacks.
    pub fn finish_loading(&self) {
        self.loaded.set(true);
        let pending = std::mem::take(&mut *self.pending_loaded.borrow_mut());
        for callback in pending {
            callback();
        }
    }

    /// Deliver timing entries to every connected observer.
    pub fn deliver_navigation_timing(&self, entries: &[NavigationTiming]) {
        let observers = std::mem::take(&mut *self.observers.borrow_mut());
        let mut still_connected = Vec::with_capacity(observers.len());
        for mut observer in observers {
            if observer(entries) == ObserverFlow::Continue {
                still_connected.push(observer);
            }
        }
        let mut slot = self.observers.borrow_mut();
        still_connected.append(&mut slot);
        *slot = still_connected;
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.requests.borrow().clone()
    }

    pub fn take_requests(&self) -> Vec<SentRequest> {
        std::mem::take(&mut *self.requests.borrow_mut())
    }

    pub fn console_lines(&self) -> Vec<String> {
        self.console_lines.borrow().clone()
    }
}

fn navigate(page: &RefCell<PageInfo>, target: &str) {
    let mut page = page.borrow_mut();
    let next = Url::parse(&page.url)
        .and_then(|base| base.join(target))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| target.to_string());
    page.url = next;
}

impl Host for MemoryHost {
    fn add_listener(&self, event: &str, listener: Listener) {
        self.listeners
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    fn dispatch(&self, event: HostEvent) {
        let listeners = self
            .listeners
            .borrow()
            .get(&event.name)
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            listener(&event);
        }
    }

    fn wrap_history(&self, method: HistoryMethod, hook: HistoryHook) {
        let original = self.current_mutator(method);
        let wrapped: Mutator = Rc::new(move |args: &[Value]| {
            let result = original(args);
            hook(method, args);
            result
        });
        self.history.borrow_mut().insert(method, wrapped);
    }

    fn page_info(&self) -> PageInfo {
        self.page.borrow().clone()
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.get()
    }

    fn send_beacon(&self, url: &str, body: &str, content_type: &str) -> bool {
        if !self.capabilities.get().beacon {
            return false;
        }
        self.requests.borrow_mut().push(SentRequest::Beacon {
            url: url.to_string(),
            body: body.to_string(),
            content_type: content_type.to_string(),
        });
        true
    }

    fn load_image(&self, src: &str) {
        self.requests.borrow_mut().push(SentRequest::Image {
            src: src.to_string(),
        });
    }

    fn on_loaded(&self, callback: Box<dyn FnOnce()>) {
        if self.loaded.get() {
            callback();
        } else {
            self.pending_loaded.borrow_mut().push(callback);
        }
    }

    fn observe_navigation_timing(&self, observer: TimingObserver) -> MonitorResult<()> {
        if !self.capabilities.get().performance {
            return Err(MonitorError::Unsupported("PerformanceObserver"));
        }
        self.observers.borrow_mut().push(observer);
        Ok(())
    }

    fn now_millis(&self) -> i64 {
        self.clock
            .get()
            .unwrap_or_else(|| Utc::now().timestamp_millis())
    }

    fn console(&self, line: &str) {
        debug!(target: "pagewatch::console", "{line}");
        self.console_lines.borrow_mut().push(line.to_string());
    }
}
