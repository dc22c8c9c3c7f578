//! Monitor: the per-page telemetry session. Resolves configuration, installs
//! the history interceptor and the enabled collectors, and routes every
//! captured record through the payload builder into the transport.

use std::cell::RefCell;
use std::rc::Rc;

use pagewatch_core::types::record_type;
use pagewatch_core::{
    Action, ContextUpdate, Fields, MonitorConfig, MonitorOptions, MonitorResult, PathValue,
    RequestContext, TrackRecord,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::capture;
use crate::host::Host;
use crate::transport::{Transport, TransportKind};
use crate::{errors, history, payload, performance};

struct Inner {
    host: Rc<dyn Host>,
    transport: Transport,
    config: RefCell<MonitorConfig>,
    context: RefCell<RequestContext>,
}

/// Handle to the page's telemetry session. Clones share the session.
///
/// Installed listeners own a clone, so the session stays bound to the page
/// after the caller drops its handle. There is no teardown.
#[derive(Clone)]
pub struct Monitor {
    inner: Rc<Inner>,
}

impl Monitor {
    /// Resolve `options` and install interception on `host`. Construct one
    /// monitor per page: the history interceptor wraps whatever is installed,
    /// so a second monitor would wrap the first one's wrappers.
    pub fn new(host: Rc<dyn Host>, options: MonitorOptions) -> MonitorResult<Self> {
        let config = MonitorConfig::resolve(options)?;
        let mut context = RequestContext::default();
        context.merge(config.context_update());

        let monitor = Self {
            inner: Rc::new(Inner {
                transport: Transport::new(Rc::clone(&host)),
                host,
                config: RefCell::new(config),
                context: RefCell::new(context),
            }),
        };

        history::install(&monitor.inner.host);
        monitor.install_collectors();
        Ok(monitor)
    }

    fn install_collectors(&self) {
        let config = self.config();

        capture::install_page_capture(self);
        if config.dom_tracker {
            capture::install_dom_capture(self, &config.dom_events());
        }
        if config.push_performance {
            performance::install(self);
        }
        if config.js_error_tracker {
            errors::install(self);
        }

        let capabilities = self.inner.host.capabilities();
        if config.beacon_tracker && !capabilities.beacon {
            warn!("sendBeacon unavailable, falling back to image requests");
        }

        info!(
            endpoint = config.endpoint(),
            sdk_version = %config.sdk_version,
            history = config.history_tracker,
            hash = config.hash_tracker,
            dom = config.dom_tracker,
            performance = config.push_performance,
            js_errors = config.js_error_tracker,
            "page monitor installed"
        );
    }

    pub fn config(&self) -> MonitorConfig {
        self.inner.config.borrow().clone()
    }

    pub fn context(&self) -> RequestContext {
        self.inner.context.borrow().clone()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        self.inner.config.borrow_mut().token = Some(token.clone());
        self.inner.context.borrow_mut().token = Some(token);
    }

    /// Merge identity fields and custom keys into the request context.
    pub fn set_request_options(&self, update: ContextUpdate) {
        self.inner.context.borrow_mut().merge(update);
    }

    /// Shallow-merge `patch` over the current configuration and refresh the
    /// request context from the result. Listener sets chosen at construction
    /// (DOM event list, performance, errors) are not re-installed; history
    /// and hash tracking follow the new flags immediately.
    pub fn set_config(&self, patch: MonitorOptions) -> MonitorResult<()> {
        let mut next = self.config();
        next.apply(patch);
        next.validate()?;

        let update = next.context_update();
        *self.inner.config.borrow_mut() = next;
        self.inner.context.borrow_mut().merge(update);
        Ok(())
    }

    /// Request context plus the live page values, as sent with every record.
    pub fn current_info(&self) -> Fields {
        let mut info = self.inner.context.borrow().to_fields();
        info.extend(self.inner.host.page_info().to_fields());
        info
    }

    /// Report a caller-built record. Returns the wire record that was sent.
    pub fn push(&self, record: TrackRecord) -> MonitorResult<Fields> {
        let host = &self.inner.host;
        let (endpoint, kind, debug_log) = {
            let config = self.inner.config.borrow();
            let kind = TransportKind::select(config.beacon_tracker, host.capabilities().beacon);
            (config.endpoint().to_string(), kind, config.debug)
        };

        let wire = {
            let context = self.inner.context.borrow();
            payload::build(record, &context, &host.page_info(), host.now_millis())?
        };

        if debug_log {
            host.console(&debug_line(&wire));
        }
        let record_type = wire.get("type").and_then(Value::as_str).unwrap_or_default();
        debug!(
            record_type,
            transport = ?kind,
            fields = wire.len(),
            "dispatching record"
        );

        self.inner.transport.send(kind, &endpoint, &wire);
        Ok(wire)
    }

    /// Manual click report with a one-entry action list.
    pub fn click_push(&self, path: Option<PathValue>, action: Action) -> MonitorResult<Fields> {
        let record = TrackRecord {
            path,
            ..TrackRecord::of_type(record_type::CLICK).with_actions(&[action])?
        };
        self.push(record)
    }

    /// Report from a capture path: failures drop this record only.
    pub(crate) fn report(&self, record: TrackRecord) {
        if let Err(e) = self.push(record) {
            warn!(error = %e, "dropping telemetry record");
        }
    }

    pub(crate) fn host(&self) -> &Rc<dyn Host> {
        &self.inner.host
    }

    pub(crate) fn is_enabled(&self, flag: impl FnOnce(&MonitorConfig) -> bool) -> bool {
        flag(&*self.inner.config.borrow())
    }
}

fn debug_line(wire: &Fields) -> String {
    let field = |key: &str| wire.get(key).and_then(Value::as_str).unwrap_or_default();
    let kind = field("type");
    let mut line = format!("----------{kind}------------ {} {}", field("appName"), field("moduleName"));
    if !capture::is_page_event(kind) {
        line.push_str(&format!(" {} {}", field("pathName"), field("eventName")));
    }
    line
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::host::memory::{MemoryHost, SentRequest};
    use crate::host::Capabilities;
    use pagewatch_core::{MonitorError, PageInfo};

    fn page() -> PageInfo {
        PageInfo {
            user_agent: "test-agent".into(),
            url: "https://shop.example/products".into(),
            domain: "shop.example".into(),
            title: "Products".into(),
            referrer: "https://search.example/".into(),
        }
    }

    fn setup(options: MonitorOptions) -> (Rc<MemoryHost>, Monitor) {
        let host = Rc::new(MemoryHost::new(page()));
        let monitor = Monitor::new(host.clone(), options).unwrap();
        (host, monitor)
    }

    #[test]
    fn test_requires_endpoint() {
        let host = Rc::new(MemoryHost::new(page()));
        let err = Monitor::new(host, MonitorOptions::default()).err().unwrap();
        assert!(matches!(err, MonitorError::Config(_)));
    }

    #[test]
    fn test_push_twice_differs_only_in_time() {
        let (host, monitor) = setup(MonitorOptions::with_endpoint("https://x/collect"));
        let record = TrackRecord {
            path: Some(PathValue::from("home")),
            ..TrackRecord::of_type("click")
        };

        host.set_clock(Some(1_000));
        let mut first = monitor.push(record.clone()).unwrap();
        host.set_clock(Some(2_000));
        let mut second = monitor.push(record).unwrap();

        assert_eq!(first.remove("time").unwrap(), 1_000);
        assert_eq!(second.remove("time").unwrap(), 2_000);
        assert_eq!(first, second);
        assert_eq!(host.requests().len(), 2);
    }

    #[test]
    fn test_beacon_when_preferred_and_available() {
        let (host, monitor) = setup(MonitorOptions {
            beacon_tracker: Some(true),
            ..MonitorOptions::with_endpoint("https://x/collect")
        });
        monitor.push(TrackRecord::of_type("click")).unwrap();
        assert!(matches!(host.requests()[0], SentRequest::Beacon { .. }));

        host.set_capabilities(Capabilities {
            beacon: false,
            performance: true,
        });
        monitor.push(TrackRecord::of_type("click")).unwrap();
        assert!(matches!(host.requests()[1], SentRequest::Image { .. }));
    }

    #[test]
    fn test_image_by_default_even_with_beacon() {
        let (host, monitor) = setup(MonitorOptions::with_endpoint("https://x/collect"));
        monitor.push(TrackRecord::of_type("click")).unwrap();
        assert!(matches!(host.requests()[0], SentRequest::Image { .. }));
    }

    #[test]
    fn test_invalid_actions_surface_to_caller() {
        let (host, monitor) = setup(MonitorOptions::with_endpoint("https://x/collect"));
        let record = TrackRecord {
            actions: Some("{oops".into()),
            ..TrackRecord::of_type("click")
        };
        assert!(matches!(
            monitor.push(record),
            Err(MonitorError::InvalidActions(_))
        ));
        assert!(host.requests().is_empty());
    }

    #[test]
    fn test_click_push() {
        let (_host, monitor) = setup(MonitorOptions::with_endpoint("https://x/collect"));
        let wire = monitor
            .click_push(
                Some(PathValue::from(vec!["cart".to_string(), "pay".to_string()])),
                Action::with_value("pay", "99"),
            )
            .unwrap();
        assert_eq!(wire["type"], "click");
        assert_eq!(wire["pathName"], r#"["cart","pay"]"#);
        assert_eq!(wire["eventName"], "pay");
        assert_eq!(wire["eventValue"], "99");
    }

    #[test]
    fn test_set_token_and_request_options() {
        let (_host, monitor) = setup(MonitorOptions {
            app_id: Some("shop".into()),
            ..MonitorOptions::with_endpoint("https://x/collect")
        });
        monitor.set_token("secret");
        let mut custom = Fields::new();
        custom.insert("uid".into(), Value::from("u-7"));
        monitor.set_request_options(ContextUpdate {
            module: Some("cart".into()),
            custom,
            ..Default::default()
        });

        let info = monitor.current_info();
        assert_eq!(info["appId"], "shop");
        assert_eq!(info["token"], "secret");
        assert_eq!(info["module"], "cart");
        assert_eq!(info["uid"], "u-7");
        assert_eq!(info["ua"], "test-agent");
        assert_eq!(monitor.config().token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_set_config_keeps_endpoint_required() {
        let (_host, monitor) = setup(MonitorOptions::with_endpoint("https://x/collect"));
        let err = monitor
            .set_config(MonitorOptions {
                request_url: Some(String::new()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
        assert_eq!(monitor.config().endpoint(), "https://x/collect");
    }

    #[test]
    fn test_debug_writes_console() {
        let (host, monitor) = setup(MonitorOptions {
            debug: Some(true),
            app_name: Some("Shop".into()),
            ..MonitorOptions::with_endpoint("https://x/collect")
        });
        monitor
            .push(TrackRecord {
                event_name: Some("buy".into()),
                ..TrackRecord::of_type("click")
            })
            .unwrap();
        let lines = host.console_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("----------click------------ Shop"));
        assert!(lines[0].ends_with("buy"));
    }

    #[test]
    fn test_no_console_without_debug() {
        let (host, monitor) = setup(MonitorOptions::with_endpoint("https://x/collect"));
        monitor.push(TrackRecord::of_type("click")).unwrap();
        assert!(host.console_lines().is_empty());
    }
}
