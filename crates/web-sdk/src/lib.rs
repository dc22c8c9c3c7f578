//! Web SDK: browser-resident telemetry client. Observes navigation, DOM
//! interaction, page-load timing, and uncaught errors, normalizes them into
//! flat wire records, and ships them to a collection endpoint without
//! blocking the page.
//!
//! # Modules
//!
//! - [`monitor`]: the per-page session orchestrating everything below
//! - [`host`]: browser primitives behind a trait; in-memory and wasm32 hosts
//! - [`history`]: `pushState` / `replaceState` interception
//! - [`capture`]: page-level and DOM event capture, click-target resolution
//! - [`dom`]: attribute-based ancestor traversal
//! - [`payload`]: wire record construction
//! - [`transport`]: beacon and image-GET delivery
//! - [`performance`]: one-shot navigation-timing metrics
//! - [`errors`]: uncaught error and rejection reporting

pub mod capture;
pub mod dom;
pub mod errors;
pub mod history;
pub mod host;
pub mod monitor;
pub mod payload;
pub mod performance;
pub mod transport;

pub use host::memory::{MemoryElement, MemoryHost, SentRequest};
pub use host::{Element, Host, HostEvent};
pub use monitor::Monitor;
pub use transport::TransportKind;

#[cfg(target_arch = "wasm32")]
pub use host::browser::{BrowserHost, PageMonitor};
