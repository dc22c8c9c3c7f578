//! Host-independent data model for the pagewatch telemetry client.
//!
//! # Modules
//!
//! - [`config`]: user options, resolved session configuration, file/env loading
//! - [`types`]: track records, actions, path values, request context, page info
//! - [`fields`]: empty-field stripping and query-string encoding
//! - [`error`]: the crate-wide error type

pub mod config;
pub mod error;
pub mod fields;
pub mod types;

pub use config::{MonitorConfig, MonitorOptions};
pub use error::{MonitorError, MonitorResult};
pub use types::{Action, ContextUpdate, Fields, PageInfo, PathValue, RequestContext, TrackRecord};
