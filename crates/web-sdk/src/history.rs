//! History interceptor: makes single-page-app navigation observable by
//! re-raising every `pushState` / `replaceState` call as an event of the same
//! name on the global event target.

use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use crate::host::{HistoryMethod, Host, HostEvent};

/// Wrap both history mutators. Wrapping is not idempotent, so this runs once
/// per page, from `Monitor::new`.
pub fn install(host: &Rc<dyn Host>) {
    for method in HistoryMethod::ALL {
        let target = Rc::downgrade(host);
        host.wrap_history(
            method,
            Rc::new(move |method: HistoryMethod, args: &[Value]| {
                if let Some(target) = target.upgrade() {
                    target.dispatch(HostEvent::history(method, args.to_vec()));
                }
            }),
        );
    }
    debug!("history mutators wrapped");
}
