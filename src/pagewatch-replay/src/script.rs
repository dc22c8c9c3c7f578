//! Replay scripts: a page description plus the ordered events to drive it.

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::Result;
use pagewatch_core::{MonitorOptions, PageInfo, TrackRecord};
use pagewatch_web_sdk::host::{Capabilities, NavigationTiming};
use pagewatch_web_sdk::{MemoryElement, MemoryHost, Monitor};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    #[serde(default)]
    pub page: PageInfo,
    #[serde(default = "all_capabilities")]
    pub capabilities: Capabilities,
    /// Pinned capture clock in epoch milliseconds.
    #[serde(default)]
    pub clock: Option<i64>,
    /// Replaces the loaded options when present.
    #[serde(default)]
    pub options: Option<MonitorOptions>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn all_capabilities() -> Capabilities {
    Capabilities {
        beacon: true,
        performance: true,
    }
}

/// An element and its ancestors, innermost first.
#[derive(Debug, Default, Deserialize)]
pub struct ElementSpec {
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub parent: Option<Box<ElementSpec>>,
}

impl ElementSpec {
    pub fn build(&self) -> Rc<MemoryElement> {
        let mut element = MemoryElement::new().with_text(self.text.clone());
        for (name, value) in &self.attrs {
            element = element.with_attr(name.clone(), value.clone());
        }
        if let Some(parent) = &self.parent {
            element = element.inside(&parent.build());
        }
        element.build()
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum Step {
    /// A DOM event on `target`; `event` defaults to `click`.
    Click {
        #[serde(default)]
        event: Option<String>,
        target: ElementSpec,
    },
    PushState {
        #[serde(default)]
        state: Value,
        #[serde(default)]
        url: Option<String>,
    },
    ReplaceState {
        #[serde(default)]
        state: Value,
        #[serde(default)]
        url: Option<String>,
    },
    Popstate,
    Hashchange {
        hash: String,
    },
    Error {
        message: String,
    },
    Rejection {
        reason: String,
    },
    Load,
    NavigationTiming {
        entries: Vec<NavigationTiming>,
    },
    Push {
        record: TrackRecord,
    },
    SetToken {
        token: String,
    },
    SetConfig {
        options: MonitorOptions,
    },
}

impl Step {
    pub fn apply(self, host: &MemoryHost, monitor: &Monitor) -> Result<()> {
        match self {
            Step::Click { event, target } => {
                let event = event.unwrap_or_else(|| "click".to_string());
                host.fire(&event, &target.build());
            }
            Step::PushState { state, url } => {
                host.push_state(state, url.as_deref());
            }
            Step::ReplaceState { state, url } => {
                host.replace_state(state, url.as_deref());
            }
            Step::Popstate => host.pop_state(),
            Step::Hashchange { hash } => host.change_hash(&hash),
            Step::Error { message } => host.raise_error(&message),
            Step::Rejection { reason } => host.reject_promise(&reason),
            Step::Load => host.finish_loading(),
            Step::NavigationTiming { entries } => host.deliver_navigation_timing(&entries),
            Step::Push { record } => {
                monitor.push(record)?;
            }
            Step::SetToken { token } => monitor.set_token(token),
            Step::SetConfig { options } => monitor.set_config(options)?,
        }
        Ok(())
    }
}
