//! Performance collector: one-shot page-load metrics from the first
//! completed navigation-timing entry.

use pagewatch_core::types::record_type;
use pagewatch_core::TrackRecord;
use tracing::{debug, warn};

use crate::host::{NavigationTiming, ObserverFlow};
use crate::monitor::Monitor;

pub const DOM_READY_METRIC: &str = "page_dom_ready_time";
pub const FIRST_PAINT_METRIC: &str = "page_first_paint_time";

/// Durations derived from one navigation-timing entry, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageTimings {
    pub dom_ready: f64,
    pub first_paint: f64,
    pub dns: f64,
    pub tcp: f64,
}

impl PageTimings {
    /// `None` while `DOMContentLoaded` has not finished.
    pub fn from_entry(entry: &NavigationTiming) -> Option<Self> {
        if entry.dom_content_loaded_event_end == 0.0 {
            return None;
        }
        Some(Self {
            dom_ready: entry.dom_content_loaded_event_end - entry.fetch_start,
            first_paint: entry.response_start - entry.fetch_start,
            dns: entry.domain_lookup_end - entry.domain_lookup_start,
            tcp: entry.connect_end - entry.connect_start,
        })
    }

    /// The two reported metrics. DNS and TCP times are only logged.
    pub fn records(&self) -> [TrackRecord; 2] {
        [
            metric_record(DOM_READY_METRIC, self.dom_ready),
            metric_record(FIRST_PAINT_METRIC, self.first_paint),
        ]
    }
}

fn metric_record(metric: &str, millis: f64) -> TrackRecord {
    TrackRecord::of_type(record_type::PERFORMANCE)
        .with_config_entry("performanceType", metric)
        .with_config_entry("performanceTime", format!("{millis:.2}"))
}

/// Observe navigation timing once the document has loaded; report the first
/// completed entry, then disconnect.
pub(crate) fn install(monitor: &Monitor) {
    if !monitor.host().capabilities().performance {
        warn!("Performance API unavailable, page timings will not be reported");
        return;
    }

    let session = monitor.clone();
    monitor.host().on_loaded(Box::new(move || {
        let reporter = session.clone();
        let mut reported = false;
        let observed = session
            .host()
            .observe_navigation_timing(Box::new(move |entries: &[NavigationTiming]| {
                if reported {
                    return ObserverFlow::Disconnect;
                }
                let Some(timings) = entries.iter().find_map(PageTimings::from_entry) else {
                    return ObserverFlow::Continue;
                };
                reported = true;
                debug!(
                    dns_ms = timings.dns,
                    tcp_ms = timings.tcp,
                    dom_ready_ms = timings.dom_ready,
                    first_paint_ms = timings.first_paint,
                    "navigation timing collected"
                );
                for record in timings.records() {
                    reporter.report(record);
                }
                ObserverFlow::Disconnect
            }));
        if let Err(e) = observed {
            warn!(error = %e, "could not observe navigation timing");
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(dcl_end: f64) -> NavigationTiming {
        NavigationTiming {
            fetch_start: 10.0,
            domain_lookup_start: 12.0,
            domain_lookup_end: 20.5,
            connect_start: 20.5,
            connect_end: 35.0,
            response_start: 110.25,
            dom_content_loaded_event_end: dcl_end,
        }
    }

    #[test]
    fn test_incomplete_entry_ignored() {
        assert!(PageTimings::from_entry(&entry(0.0)).is_none());
    }

    #[test]
    fn test_durations() {
        let timings = PageTimings::from_entry(&entry(410.0)).unwrap_or_else(|| panic!("complete entry"));
        assert_eq!(timings.dom_ready, 400.0);
        assert_eq!(timings.first_paint, 100.25);
        assert_eq!(timings.dns, 8.5);
        assert_eq!(timings.tcp, 14.5);
    }

    #[test]
    fn test_metric_records() {
        let timings = PageTimings {
            dom_ready: 400.0,
            first_paint: 100.3125,
            dns: 0.0,
            tcp: 0.0,
        };
        let [dom_ready, first_paint] = timings.records();
        let dom_config = dom_ready.config.unwrap_or_default();
        let paint_config = first_paint.config.unwrap_or_default();
        assert_eq!(dom_ready.kind.as_deref(), Some("performance"));
        assert_eq!(dom_config["performanceType"], DOM_READY_METRIC);
        assert_eq!(dom_config["performanceTime"], "400.00");
        assert_eq!(paint_config["performanceType"], FIRST_PAINT_METRIC);
        assert_eq!(paint_config["performanceTime"], "100.31");
    }
}
