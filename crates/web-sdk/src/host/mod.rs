//! Host abstraction: the browser primitives the pipeline touches, behind a
//! trait so the same capture code runs against a real page or an in-memory
//! double.

pub mod memory;

#[cfg(target_arch = "wasm32")]
pub mod browser;

use std::fmt;
use std::rc::Rc;

use pagewatch_core::{MonitorResult, PageInfo};
use serde::Deserialize;
use serde_json::Value;

/// A DOM element as seen by click-target resolution.
pub trait Element: fmt::Debug {
    fn attribute(&self, name: &str) -> Option<String>;

    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Rendered text content.
    fn text(&self) -> String;

    fn parent(&self) -> Option<Rc<dyn Element>>;
}

/// The two history mutators the interceptor wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryMethod {
    PushState,
    ReplaceState,
}

impl HistoryMethod {
    pub const ALL: [HistoryMethod; 2] = [HistoryMethod::PushState, HistoryMethod::ReplaceState];

    /// Name of the browser function, reused as the synthetic event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryMethod::PushState => "pushState",
            HistoryMethod::ReplaceState => "replaceState",
        }
    }
}

/// Data carried by an event beyond its name and target.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EventPayload {
    #[default]
    None,
    /// Arguments of an intercepted history call.
    Arguments(Vec<Value>),
    /// Message of an uncaught error or the reason of a rejected promise.
    Message(String),
}

/// An event delivered on the global event target.
#[derive(Debug, Clone)]
pub struct HostEvent {
    pub name: String,
    pub target: Option<Rc<dyn Element>>,
    pub payload: EventPayload,
}

impl HostEvent {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
            payload: EventPayload::None,
        }
    }

    pub fn targeting(name: impl Into<String>, target: Rc<dyn Element>) -> Self {
        Self {
            target: Some(target),
            ..Self::named(name)
        }
    }

    pub fn with_payload(mut self, payload: EventPayload) -> Self {
        self.payload = payload;
        self
    }

    pub fn history(method: HistoryMethod, args: Vec<Value>) -> Self {
        Self::named(method.as_str()).with_payload(EventPayload::Arguments(args))
    }
}

/// One navigation-timing entry, in milliseconds relative to time origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationTiming {
    pub fetch_start: f64,
    pub domain_lookup_start: f64,
    pub domain_lookup_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub response_start: f64,
    pub dom_content_loaded_event_end: f64,
}

/// Returned by a timing observer after each delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverFlow {
    Continue,
    Disconnect,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Capabilities {
    pub beacon: bool,
    pub performance: bool,
}

pub type Listener = Rc<dyn Fn(&HostEvent)>;

/// Runs after the original history function returned.
pub type HistoryHook = Rc<dyn Fn(HistoryMethod, &[Value])>;

pub type TimingObserver = Box<dyn FnMut(&[NavigationTiming]) -> ObserverFlow>;

/// Everything the pipeline needs from the page it runs in.
pub trait Host {
    /// Subscribe on the global event target.
    fn add_listener(&self, event: &str, listener: Listener);

    /// Raise an event on the global event target.
    fn dispatch(&self, event: HostEvent);

    /// Replace the current `method` implementation with one that forwards
    /// the call unchanged and then runs `hook`. Each call wraps whatever is
    /// installed at that moment, wrappers included.
    fn wrap_history(&self, method: HistoryMethod, hook: HistoryHook);

    fn page_info(&self) -> PageInfo;

    fn capabilities(&self) -> Capabilities;

    /// Queue a background POST. `false` when the browser refused it.
    fn send_beacon(&self, url: &str, body: &str, content_type: &str) -> bool;

    /// Issue a GET through a detached, invisible image element.
    fn load_image(&self, src: &str);

    /// Run `callback` once the document has finished loading.
    fn on_loaded(&self, callback: Box<dyn FnOnce()>);

    /// Subscribe to buffered navigation-timing entries.
    fn observe_navigation_timing(&self, observer: TimingObserver) -> MonitorResult<()>;

    fn now_millis(&self) -> i64;

    /// Debug console output.
    fn console(&self, line: &str);
}
