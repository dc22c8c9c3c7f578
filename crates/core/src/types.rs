use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{MonitorError, MonitorResult};

/// Open string-keyed map used for custom context, per-event config, and the
/// wire record itself.
pub type Fields = serde_json::Map<String, Value>;

/// Record type tags emitted by the built-in collectors. Page-level records
/// use the browser event name (`pushState`, `hashchange`, ...) instead.
pub mod record_type {
    pub const CLICK: &str = "click";
    pub const PERFORMANCE: &str = "performance";
    pub const ERROR: &str = "error";
}

/// One `{name, value}` entry of a record's action list. `name` and `value`
/// are normalized to text (`42` becomes `"42"`); any other keys are kept
/// as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, deserialize_with = "scalar_text")]
    pub name: String,
    #[serde(
        default,
        deserialize_with = "optional_scalar_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Fields,
}

impl Action {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::named(name)
        }
    }
}

/// Parse a serialized action list. Anything but a JSON array of objects is a
/// caller error.
pub fn parse_actions(raw: &str) -> MonitorResult<Vec<Action>> {
    serde_json::from_str(raw).map_err(MonitorError::InvalidActions)
}

pub fn encode_actions(actions: &[Action]) -> MonitorResult<String> {
    Ok(serde_json::to_string(actions)?)
}

fn scalar_text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(optional_scalar_text(de)?.unwrap_or_default())
}

/// Strings verbatim, other scalars as their JSON text, `null` as absent.
pub(crate) fn optional_scalar_text<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Logical page path: either already a string or a list of segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathValue {
    Text(String),
    Segments(Vec<String>),
}

impl PathValue {
    /// Segments are JSON-encoded, so `["a","b"]` becomes the string `["a","b"]`.
    pub fn to_path_name(&self) -> MonitorResult<String> {
        match self {
            PathValue::Text(text) => Ok(text.clone()),
            PathValue::Segments(segments) => Ok(serde_json::to_string(segments)?),
        }
    }
}

impl From<&str> for PathValue {
    fn from(value: &str) -> Self {
        PathValue::Text(value.to_string())
    }
}

impl From<String> for PathValue {
    fn from(value: String) -> Self {
        PathValue::Text(value)
    }
}

impl From<Vec<String>> for PathValue {
    fn from(value: Vec<String>) -> Self {
        PathValue::Segments(value)
    }
}

/// A partially filled outbound record, as produced by a collector or handed
/// to `Monitor::push`. The payload builder turns it into a wire record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Serialized action list (JSON array of [`Action`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Per-event payload flattened into the top level of the wire record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Fields>,
    #[serde(flatten)]
    pub extra: Fields,
}

impl TrackRecord {
    pub fn of_type(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Default::default()
        }
    }

    pub fn with_actions(mut self, actions: &[Action]) -> MonitorResult<Self> {
        self.actions = Some(encode_actions(actions)?);
        Ok(self)
    }

    pub fn with_config_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config
            .get_or_insert_with(Fields::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Identity fields merged into the request context, plus the custom map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextUpdate {
    pub app_id: Option<String>,
    pub app_name: Option<String>,
    pub module: Option<String>,
    pub module_name: Option<String>,
    pub token: Option<String>,
    pub custom: Fields,
}

/// Per-session identity carried by every outbound record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(flatten)]
    pub custom: Fields,
}

impl RequestContext {
    /// Later values overwrite earlier ones key by key; fields absent from the
    /// update are left as they are.
    pub fn merge(&mut self, update: ContextUpdate) {
        if update.app_id.is_some() {
            self.app_id = update.app_id;
        }
        if update.app_name.is_some() {
            self.app_name = update.app_name;
        }
        if update.module.is_some() {
            self.module = update.module;
        }
        if update.module_name.is_some() {
            self.module_name = update.module_name;
        }
        if update.token.is_some() {
            self.token = update.token;
        }
        self.custom.extend(update.custom);
    }

    /// Flatten into wire fields. Custom keys win over identity fields of the
    /// same name.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        let named = [
            ("appId", &self.app_id),
            ("appName", &self.app_name),
            ("module", &self.module),
            ("moduleName", &self.module_name),
            ("token", &self.token),
        ];
        for (key, value) in named {
            if let Some(value) = value {
                fields.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        for (key, value) in &self.custom {
            fields.insert(key.clone(), value.clone());
        }
        fields
    }
}

/// Live document/navigator values read at capture time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "ua", default)]
    pub user_agent: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub referrer: String,
}

impl PageInfo {
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("ua".into(), Value::String(self.user_agent.clone()));
        fields.insert("url".into(), Value::String(self.url.clone()));
        fields.insert("domain".into(), Value::String(self.domain.clone()));
        fields.insert("title".into(), Value::String(self.title.clone()));
        fields.insert("referrer".into(), Value::String(self.referrer.clone()));
        fields
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_segments_encode_as_json_text() {
        let path = PathValue::from(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(path.to_path_name().unwrap(), r#"["a","b"]"#);
        assert_eq!(PathValue::from("home").to_path_name().unwrap(), "home");
    }

    #[test]
    fn test_path_value_untagged() {
        let text: PathValue = serde_json::from_value(json!("home")).unwrap();
        let segments: PathValue = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(text, PathValue::Text("home".into()));
        assert_eq!(segments, PathValue::Segments(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_parse_actions_accepts_numeric_values() {
        let actions = parse_actions(r#"[{"name":"buy","value":42},{"name":"view"}]"#).unwrap();
        assert_eq!(actions[0], Action::with_value("buy", "42"));
        assert_eq!(actions[1], Action::named("view"));
    }

    #[test]
    fn test_action_keeps_extra_keys() {
        let actions = parse_actions(r#"[{"name":"buy","value":42,"sku":"A1","qty":2}]"#).unwrap();
        assert_eq!(actions[0].value.as_deref(), Some("42"));
        assert_eq!(actions[0].extra["sku"], "A1");
        let encoded: Value = serde_json::from_str(&encode_actions(&actions).unwrap()).unwrap();
        assert_eq!(encoded, json!([{"name":"buy","value":"42","sku":"A1","qty":2}]));
    }

    #[test]
    fn test_parse_actions_rejects_garbage() {
        let err = parse_actions("not json").unwrap_err();
        assert!(matches!(err, MonitorError::InvalidActions(_)));
    }

    #[test]
    fn test_context_merge_overwrites_and_keeps() {
        let mut ctx = RequestContext::default();
        ctx.merge(ContextUpdate {
            app_id: Some("shop".into()),
            token: Some("t-1".into()),
            ..Default::default()
        });
        let mut custom = Fields::new();
        custom.insert("uid".into(), json!("u-9"));
        ctx.merge(ContextUpdate {
            token: Some("t-2".into()),
            custom,
            ..Default::default()
        });

        let fields = ctx.to_fields();
        assert_eq!(fields["appId"], "shop");
        assert_eq!(fields["token"], "t-2");
        assert_eq!(fields["uid"], "u-9");
        assert!(!fields.contains_key("appName"));
        assert!(!fields.contains_key("moduleName"));
    }

    #[test]
    fn test_track_record_flattens_extra() {
        let record: TrackRecord = serde_json::from_value(json!({
            "type": "click",
            "path": ["a", "b"],
            "campaign": "spring"
        }))
        .unwrap();
        assert_eq!(record.kind.as_deref(), Some("click"));
        assert_eq!(record.extra["campaign"], "spring");

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "click");
        assert!(value.get("eventName").is_none());
    }
}
