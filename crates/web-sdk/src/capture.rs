//! Event capture: page-level navigation events and DOM interaction events.
//!
//! Page-level events become records typed by the event name. DOM events go
//! through click-target resolution: one physical interaction yields one
//! `click` record per tracked (`m_btn`) element on the path from the target
//! to the document root, each with its own logical path.

use std::rc::Rc;

use pagewatch_core::types::record_type;
use pagewatch_core::{Action, MonitorResult, PathValue, TrackRecord};
use tracing::{debug, trace};

use crate::dom::{self, BUTTON_ATTR, PATH_ATTR, VALUE_ATTR};
use crate::host::{Element, HostEvent};
use crate::monitor::Monitor;

/// History navigation events: the two synthetic ones plus `popstate`.
pub const HISTORY_EVENTS: &[&str] = &["pushState", "replaceState", "popstate"];
pub const HASH_EVENTS: &[&str] = &["hashchange"];

/// History or hash event name.
pub fn is_page_event(name: &str) -> bool {
    HISTORY_EVENTS.contains(&name) || HASH_EVENTS.contains(&name)
}

/// One tracked element hit by an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickTarget {
    pub path: Vec<String>,
    pub event_name: String,
    pub event_value: String,
}

impl ClickTarget {
    pub fn to_record(&self) -> MonitorResult<TrackRecord> {
        let path_name = PathValue::Segments(self.path.clone()).to_path_name()?;
        Ok(TrackRecord {
            path_name: Some(path_name),
            event_name: Some(self.event_name.clone()),
            event_value: Some(self.event_value.clone()),
            ..TrackRecord::of_type(record_type::CLICK)
                .with_actions(&[Action::named(self.event_name.clone())])?
        })
    }
}

/// Tracked elements for an event target: the target itself when it carries
/// `m_btn`, then every `m_btn` ancestor, nearest first.
pub fn resolve_click_targets(target: &Rc<dyn Element>) -> Vec<ClickTarget> {
    let mut candidates: Vec<Rc<dyn Element>> = Vec::new();
    if target.has_attribute(BUTTON_ATTR) {
        candidates.push(Rc::clone(target));
    }
    candidates.extend(dom::parents_with_attribute(target.as_ref(), BUTTON_ATTR));

    candidates
        .into_iter()
        .map(|candidate| {
            let mut chain = dom::parents_with_attribute(candidate.as_ref(), PATH_ATTR);
            chain.insert(0, Rc::clone(&candidate));
            ClickTarget {
                path: dom::path_descriptor(&chain),
                event_name: candidate
                    .attribute(BUTTON_ATTR)
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| candidate.text()),
                event_value: candidate.attribute(VALUE_ATTR).unwrap_or_default(),
            }
        })
        .collect()
}

/// Subscribe to history and hash events. Both lists are always subscribed;
/// each firing checks the live flag, so `set_config` can switch them on later.
pub(crate) fn install_page_capture(monitor: &Monitor) {
    for (events, hash) in [(HISTORY_EVENTS, false), (HASH_EVENTS, true)] {
        for event in events {
            let session = monitor.clone();
            monitor.host().add_listener(
                event,
                Rc::new(move |fired: &HostEvent| {
                    let enabled = session.is_enabled(|c| {
                        if hash {
                            c.hash_tracker
                        } else {
                            c.history_tracker
                        }
                    });
                    if enabled {
                        session.report(TrackRecord::of_type(fired.name.clone()));
                    }
                }),
            );
        }
    }
}

/// Subscribe to the configured DOM events and report tracked targets.
pub(crate) fn install_dom_capture(monitor: &Monitor, events: &[String]) {
    for event in events {
        let session = monitor.clone();
        monitor.host().add_listener(
            event,
            Rc::new(move |fired: &HostEvent| {
                if !session.is_enabled(|c| c.dom_tracker) {
                    return;
                }
                let Some(target) = fired.target.as_ref() else {
                    trace!(event = %fired.name, "DOM event without element target");
                    return;
                };
                for hit in resolve_click_targets(target) {
                    match hit.to_record() {
                        Ok(record) => session.report(record),
                        Err(e) => debug!(error = %e, "skipping click target"),
                    }
                }
            }),
        );
    }
    debug!(events = ?events, "DOM capture installed");
}
