//! Error collector: uncaught exceptions and unhandled promise rejections.

use std::rc::Rc;

use pagewatch_core::types::record_type;
use pagewatch_core::TrackRecord;

use crate::host::{EventPayload, HostEvent};
use crate::monitor::Monitor;

pub const ERROR_EVENT: &str = "error";
pub const REJECTION_EVENT: &str = "unhandledrejection";

/// Every firing is reported; identical errors are not deduplicated.
pub fn error_record(signal: &str, message: &str) -> TrackRecord {
    TrackRecord {
        event_name: Some(signal.to_string()),
        error_message: Some(message.to_string()),
        ..TrackRecord::of_type(record_type::ERROR)
    }
}

pub(crate) fn install(monitor: &Monitor) {
    for signal in [ERROR_EVENT, REJECTION_EVENT] {
        let session = monitor.clone();
        monitor.host().add_listener(
            signal,
            Rc::new(move |fired: &HostEvent| {
                let message = match &fired.payload {
                    EventPayload::Message(message) => message.clone(),
                    _ => String::new(),
                };
                session.report(error_record(&fired.name, &message));
            }),
        );
    }
}
