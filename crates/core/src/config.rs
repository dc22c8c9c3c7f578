use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};
use crate::types::{optional_scalar_text, ContextUpdate, Fields};

/// SDK version reported by default when the host application sets none.
pub const SDK_VERSION: &str = "1.0.0";

/// DOM events captured when `domEventList` is absent or empty.
pub const DEFAULT_DOM_EVENTS: &[&str] = &[
    "click",
    "dblclick",
    "contextmenu",
    "mousedown",
    "mouseup",
    "mouseout",
    "mouseover",
];

/// Options supplied by the host application, either at construction or as a
/// shallow patch through `Monitor::set_config`. Every field is optional so the
/// same shape serves both; `resolve` enforces the endpoint.
///
/// Field names follow the camelCase the page scripts use. Snake-case aliases
/// let the same struct load from TOML files and `PAGEWATCH__*` variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorOptions {
    #[serde(default, alias = "request_url", skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
    /// Override endpoint, used only while `request_url` is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, alias = "app_id", skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(default, alias = "app_name", skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, alias = "module_name", skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, alias = "history_tracker", skip_serializing_if = "Option::is_none")]
    pub history_tracker: Option<bool>,
    #[serde(default, alias = "hash_tracker", skip_serializing_if = "Option::is_none")]
    pub hash_tracker: Option<bool>,
    #[serde(default, alias = "dom_tracker", skip_serializing_if = "Option::is_none")]
    pub dom_tracker: Option<bool>,
    #[serde(default, alias = "beacon_tracker", skip_serializing_if = "Option::is_none")]
    pub beacon_tracker: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(default, alias = "push_performance", skip_serializing_if = "Option::is_none")]
    pub push_performance: Option<bool>,
    #[serde(default, alias = "js_error_tracker", skip_serializing_if = "Option::is_none")]
    pub js_error_tracker: Option<bool>,
    /// Accepts a string or a number.
    #[serde(
        default,
        alias = "sdk_version",
        deserialize_with = "optional_scalar_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub sdk_version: Option<String>,
    #[serde(default, alias = "dom_event_list", skip_serializing_if = "Option::is_none")]
    pub dom_event_list: Option<Vec<String>>,
    /// Custom context merged verbatim into every record (user ids, tenant keys).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Fields>,
}

impl MonitorOptions {
    /// Options with only the collection endpoint set.
    pub fn with_endpoint(request_url: impl Into<String>) -> Self {
        Self {
            request_url: Some(request_url.into()),
            ..Default::default()
        }
    }

    /// Load options from an optional TOML file layered under environment
    /// variables with the prefix `PAGEWATCH__` (e.g. `PAGEWATCH__REQUEST_URL`).
    pub fn load(path: Option<&Path>) -> MonitorResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("PAGEWATCH")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("dom_event_list"),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

/// Session configuration resolved from defaults plus user options.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    pub request_url: String,
    pub url: Option<String>,
    pub sdk_version: String,
    pub history_tracker: bool,
    pub hash_tracker: bool,
    pub dom_tracker: bool,
    pub beacon_tracker: bool,
    pub debug: bool,
    pub push_performance: bool,
    pub js_error_tracker: bool,
    /// Empty means [`DEFAULT_DOM_EVENTS`].
    pub dom_event_list: Vec<String>,
    pub app_id: Option<String>,
    pub app_name: Option<String>,
    pub module: Option<String>,
    pub module_name: Option<String>,
    pub token: Option<String>,
    pub custom: Fields,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            request_url: String::new(),
            url: None,
            sdk_version: SDK_VERSION.to_string(),
            history_tracker: false,
            hash_tracker: false,
            dom_tracker: true,
            beacon_tracker: false,
            debug: false,
            push_performance: false,
            js_error_tracker: true,
            dom_event_list: Vec::new(),
            app_id: None,
            app_name: None,
            module: None,
            module_name: None,
            token: None,
            custom: Fields::new(),
        }
    }
}

impl MonitorConfig {
    /// Defaults first, then every option the caller set. Fails only when no
    /// endpoint is available.
    pub fn resolve(options: MonitorOptions) -> MonitorResult<Self> {
        let mut config = Self::default();
        config.apply(options);
        config.validate()?;
        Ok(config)
    }

    /// Shallow merge: each field present in `patch` replaces the current one.
    pub fn apply(&mut self, patch: MonitorOptions) {
        let MonitorOptions {
            request_url,
            url,
            app_id,
            app_name,
            module,
            module_name,
            token,
            history_tracker,
            hash_tracker,
            dom_tracker,
            beacon_tracker,
            debug,
            push_performance,
            js_error_tracker,
            sdk_version,
            dom_event_list,
            config,
        } = patch;

        if let Some(v) = request_url {
            self.request_url = v;
        }
        if url.is_some() {
            self.url = url;
        }
        if let Some(v) = sdk_version {
            self.sdk_version = v;
        }
        if let Some(v) = history_tracker {
            self.history_tracker = v;
        }
        if let Some(v) = hash_tracker {
            self.hash_tracker = v;
        }
        if let Some(v) = dom_tracker {
            self.dom_tracker = v;
        }
        if let Some(v) = beacon_tracker {
            self.beacon_tracker = v;
        }
        if let Some(v) = debug {
            self.debug = v;
        }
        if let Some(v) = push_performance {
            self.push_performance = v;
        }
        if let Some(v) = js_error_tracker {
            self.js_error_tracker = v;
        }
        if let Some(v) = dom_event_list {
            self.dom_event_list = v;
        }
        if app_id.is_some() {
            self.app_id = app_id;
        }
        if app_name.is_some() {
            self.app_name = app_name;
        }
        if module.is_some() {
            self.module = module;
        }
        if module_name.is_some() {
            self.module_name = module_name;
        }
        if token.is_some() {
            self.token = token;
        }
        if let Some(v) = config {
            self.custom = v;
        }
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if self.endpoint().is_empty() {
            return Err(MonitorError::Config(
                "a collection endpoint (requestUrl or url) is required".into(),
            ));
        }
        Ok(())
    }

    /// Collection endpoint: `request_url`, falling back to the override `url`.
    pub fn endpoint(&self) -> &str {
        if self.request_url.is_empty() {
            self.url.as_deref().unwrap_or_default()
        } else {
            &self.request_url
        }
    }

    /// DOM events to subscribe, falling back to the built-in mouse list.
    pub fn dom_events(&self) -> Vec<String> {
        if self.dom_event_list.is_empty() {
            DEFAULT_DOM_EVENTS.iter().map(|e| e.to_string()).collect()
        } else {
            self.dom_event_list.clone()
        }
    }

    /// Identity fields and custom context carried into the request context.
    pub fn context_update(&self) -> ContextUpdate {
        ContextUpdate {
            app_id: self.app_id.clone(),
            app_name: self.app_name.clone(),
            module: self.module.clone(),
            module_name: self.module_name.clone(),
            token: self.token.clone(),
            custom: self.custom.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_flags() {
        let config = MonitorConfig::resolve(MonitorOptions::with_endpoint("https://x/collect")).unwrap();
        assert_eq!(config.request_url, "https://x/collect");
        assert!(!config.history_tracker);
        assert!(!config.hash_tracker);
        assert!(config.dom_tracker);
        assert!(!config.beacon_tracker);
        assert!(!config.push_performance);
        assert!(config.js_error_tracker);
        assert!(!config.debug);
        assert_eq!(config.sdk_version, SDK_VERSION);
        assert_eq!(config.dom_events().len(), DEFAULT_DOM_EVENTS.len());
        assert_eq!(config.dom_events()[0], "click");
    }

    #[test]
    fn test_user_values_win() {
        let options = MonitorOptions {
            request_url: Some("https://x/collect".into()),
            dom_tracker: Some(false),
            beacon_tracker: Some(true),
            dom_event_list: Some(vec!["dblclick".into()]),
            ..Default::default()
        };
        let config = MonitorConfig::resolve(options).unwrap();
        assert!(!config.dom_tracker);
        assert!(config.beacon_tracker);
        assert_eq!(config.dom_events(), vec!["dblclick".to_string()]);
    }

    #[test]
    fn test_missing_endpoint_rejected() {
        let err = MonitorConfig::resolve(MonitorOptions::default()).unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
    }

    #[test]
    fn test_override_url_used_when_request_url_empty() {
        let options = MonitorOptions {
            url: Some("https://fallback/collect".into()),
            ..Default::default()
        };
        let config = MonitorConfig::resolve(options).unwrap();
        assert_eq!(config.endpoint(), "https://fallback/collect");
    }

    #[test]
    fn test_apply_is_shallow() {
        let mut first = Fields::new();
        first.insert("uid".into(), serde_json::json!("u-1"));
        first.insert("tenant".into(), serde_json::json!("t-1"));
        let mut config = MonitorConfig::resolve(MonitorOptions {
            request_url: Some("https://x/collect".into()),
            config: Some(first),
            ..Default::default()
        })
        .unwrap();

        let mut second = Fields::new();
        second.insert("uid".into(), serde_json::json!("u-2"));
        config.apply(MonitorOptions {
            history_tracker: Some(true),
            config: Some(second),
            ..Default::default()
        });

        assert!(config.history_tracker);
        assert_eq!(config.request_url, "https://x/collect");
        assert_eq!(config.custom.len(), 1);
        assert_eq!(config.custom["uid"], "u-2");
    }

    #[test]
    fn test_options_deserialize_camel_case() {
        let options: MonitorOptions = serde_json::from_str(
            r#"{"requestUrl":"https://x/collect","domTracker":true,"appId":"shop"}"#,
        )
        .unwrap();
        assert_eq!(options.request_url.as_deref(), Some("https://x/collect"));
        assert_eq!(options.dom_tracker, Some(true));
        assert_eq!(options.app_id.as_deref(), Some("shop"));
    }

    #[test]
    fn test_numeric_sdk_version_accepted() {
        let options: MonitorOptions =
            serde_json::from_str(r#"{"requestUrl":"https://x/collect","sdkVersion":2}"#).unwrap();
        assert_eq!(options.sdk_version.as_deref(), Some("2"));
        let config = MonitorConfig::resolve(options).unwrap();
        assert_eq!(config.sdk_version, "2");
    }
}
