//! Payload builder: turns a partially filled [`TrackRecord`] into the flat
//! wire record the transport sends.
//!
//! Merge precedence, lowest first: request context, live page values, the
//! record's own fields, the capture timestamp, the re-serialized action list,
//! and finally the record's per-event `config` entries.

use pagewatch_core::fields::strip_empty;
use pagewatch_core::types::{encode_actions, parse_actions};
use pagewatch_core::{Fields, MonitorResult, PageInfo, PathValue, RequestContext, TrackRecord};
use serde_json::Value;

/// Wire key of the capture timestamp.
pub const TIME_KEY: &str = "time";

/// Derive `pathName` and the event name/value in place.
///
/// A list-valued `path` is replaced by its JSON text. When no event name is
/// set, the first action supplies name and value. An action list that is not
/// valid JSON fails the whole record.
pub fn normalize(record: &mut TrackRecord) -> MonitorResult<()> {
    if let Some(path) = record.path.take() {
        let text = path.to_path_name()?;
        record.path = Some(PathValue::Text(text));
    }

    if record.path_name.as_deref().map_or(true, str::is_empty) {
        let derived = match &record.path {
            Some(PathValue::Text(text)) => text.clone(),
            _ => String::new(),
        };
        record.path_name = Some(derived);
    }

    if record.event_name.as_deref().map_or(true, str::is_empty) {
        if let Some(raw) = record.actions.as_deref() {
            let actions = parse_actions(raw)?;
            if let Some(first) = actions.first() {
                record.event_name = Some(first.name.clone());
                record.event_value = Some(first.value.clone().unwrap_or_default());
            }
        }
    }
    Ok(())
}

/// Build the wire record for one event.
///
/// `actions` goes out re-encoded from the parsed list: `name` and `value`
/// as text, any other keys unchanged.
pub fn build(
    mut record: TrackRecord,
    context: &RequestContext,
    page: &PageInfo,
    now_millis: i64,
) -> MonitorResult<Fields> {
    normalize(&mut record)?;

    let actions = record
        .actions
        .take()
        .map(|raw| parse_actions(&raw).and_then(|list| encode_actions(&list)))
        .transpose()?;
    let event_config = record.config.take();

    let mut wire = context.to_fields();
    wire.extend(page.to_fields());
    if let Value::Object(own) = serde_json::to_value(&record)? {
        wire.extend(own);
    }
    wire.insert(TIME_KEY.to_string(), Value::from(now_millis));
    if let Some(actions) = actions {
        wire.insert("actions".to_string(), Value::String(actions));
    }
    if let Some(event_config) = event_config {
        wire.extend(event_config);
    }
    wire.remove("config");

    Ok(strip_empty(wire))
}
