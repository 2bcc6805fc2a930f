//! Panic capture for targets where panics abort.
//!
//! On `wasm32-unknown-unknown` a panic traps instead of unwinding, so
//! [`Bundler::bundle`](ply_bundler::Bundler::bundle) never gets to sanitize
//! it. The hook installed here runs before the trap: while a request is in
//! flight it stores a sanitized failure response, which the host collects
//! after catching the trap.

use std::cell::RefCell;
use std::panic;
use std::sync::Once;

use crate::protocol::BundleResponse;

static INSTALLED: Once = Once::new();

#[derive(Debug)]
struct InFlight {
    id: Option<u64>,
    entry_point: String,
}

thread_local! {
    static IN_FLIGHT: RefCell<Option<InFlight>> = const { RefCell::new(None) };
    static CAPTURED: RefCell<Option<BundleResponse>> = const { RefCell::new(None) };
}

/// Wraps the current panic hook so panics during a request are captured.
/// Only the first call installs anything.
pub fn install_hook() {
    INSTALLED.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            capture(info.payload());
            previous(info);
        }));
    });
}

/// Marks a request as in flight on this thread.
pub fn begin(id: Option<u64>, entry_point: &str) {
    IN_FLIGHT.with(|slot| {
        if let Ok(mut slot) = slot.try_borrow_mut() {
            *slot = Some(InFlight {
                id,
                entry_point: entry_point.to_string(),
            });
        }
    });
}

/// Clears the in-flight request after it returned normally.
pub fn finish() {
    IN_FLIGHT.with(|slot| {
        if let Ok(mut slot) = slot.try_borrow_mut() {
            *slot = None;
        }
    });
}

/// The failure response of the last request that panicked, if any.
pub fn take() -> Option<BundleResponse> {
    CAPTURED.with(|slot| slot.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
}

fn capture(payload: &(dyn std::any::Any + Send)) {
    let in_flight = IN_FLIGHT.with(|slot| slot.try_borrow_mut().ok().and_then(|mut slot| slot.take()));
    let Some(InFlight { id, entry_point }) = in_flight else {
        return;
    };
    let response = BundleResponse::from_panic(id, payload, &entry_point);
    CAPTURED.with(|slot| {
        if let Ok(mut slot) = slot.try_borrow_mut() {
            *slot = Some(response);
        }
    });
}
