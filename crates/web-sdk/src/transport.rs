//! Transport: fire-and-forget delivery of one wire record, either as a
//! background beacon POST or as an image GET.

use std::rc::Rc;

use pagewatch_core::fields::to_query_string;
use pagewatch_core::Fields;
use tracing::{debug, warn};

use crate::host::Host;

pub const BEACON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// JSON body queued with `navigator.sendBeacon`; survives page unload.
    Beacon,
    /// Query-string GET through a detached image element.
    Image,
}

impl TransportKind {
    /// Beacon only when preferred and available; image otherwise.
    pub fn select(beacon_preferred: bool, beacon_available: bool) -> Self {
        if beacon_preferred && beacon_available {
            TransportKind::Beacon
        } else {
            TransportKind::Image
        }
    }
}

/// `{endpoint}?_t={millis}&{query}`; `_t` busts intermediary caches.
pub fn image_url(endpoint: &str, now_millis: i64, record: &Fields) -> String {
    let query = to_query_string(record);
    if query.is_empty() {
        format!("{endpoint}?_t={now_millis}")
    } else {
        format!("{endpoint}?_t={now_millis}&{query}")
    }
}

pub struct Transport {
    host: Rc<dyn Host>,
}

impl Transport {
    pub fn new(host: Rc<dyn Host>) -> Self {
        Self { host }
    }

    /// Hand the record to the browser. Delivery is never observed.
    pub fn send(&self, kind: TransportKind, endpoint: &str, record: &Fields) {
        match kind {
            TransportKind::Beacon => {
                let body = match serde_json::to_string(record) {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize record for beacon");
                        return;
                    }
                };
                if !self.host.send_beacon(endpoint, &body, BEACON_CONTENT_TYPE) {
                    debug!(endpoint, "beacon refused by the browser, record dropped");
                }
            }
            TransportKind::Image => {
                let src = image_url(endpoint, self.host.now_millis(), record);
                self.host.load_image(&src);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::host::memory::{MemoryHost, SentRequest};
    use pagewatch_core::PageInfo;
    use serde_json::json;

    #[test]
    fn test_select() {
        assert_eq!(TransportKind::select(true, true), TransportKind::Beacon);
        assert_eq!(TransportKind::select(true, false), TransportKind::Image);
        assert_eq!(TransportKind::select(false, true), TransportKind::Image);
        assert_eq!(TransportKind::select(false, false), TransportKind::Image);
    }

    #[test]
    fn test_image_request() {
        let host = Rc::new(MemoryHost::new(PageInfo::default()));
        host.set_clock(Some(42));
        let transport = Transport::new(host.clone());
        let record = json!({"type": "click", "eventName": "submit"});

        transport.send(
            TransportKind::Image,
            "https://x/collect",
            record.as_object().unwrap(),
        );

        let requests = host.requests();
        assert_eq!(requests.len(), 1);
        let SentRequest::Image { src } = &requests[0] else {
            panic!("expected image request, got {:?}", requests[0]);
        };
        assert!(src.starts_with("https://x/collect?_t=42&"));
        assert!(src.contains("type=click"));
        assert!(src.contains("eventName=submit"));
    }

    #[test]
    fn test_beacon_request() {
        let host = Rc::new(MemoryHost::new(PageInfo::default()));
        let transport = Transport::new(host.clone());
        let record = json!({"type": "click"});

        transport.send(
            TransportKind::Beacon,
            "https://x/collect",
            record.as_object().unwrap(),
        );

        match &host.requests()[0] {
            SentRequest::Beacon {
                url,
                body,
                content_type,
            } => {
                assert_eq!(url, "https://x/collect");
                assert_eq!(body, r#"{"type":"click"}"#);
                assert_eq!(content_type, BEACON_CONTENT_TYPE);
            }
            other => panic!("expected beacon, got {other:?}"),
        }
    }
}
