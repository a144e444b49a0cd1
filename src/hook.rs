//! The raise hook.
//!
//! Every raise goes through `raise` (or `throw` / `RaiseExt::or_raise`), which is the
//! single place observations are taken: the current log context, plus the flow
//! state when `capture_flow` is on, appended to the registry under the raised
//! error's identity. Raising the same `ErrorRef` again records another observation.
//!
//! Until the hook is installed (`ensure_initialized`, `init`, or constructing a
//! `ThrowContextEnricher`) raises record nothing.
//!
//! The hook never fails the raise it observes: a panic while capturing is caught
//! and logged, and the error is handed back unchanged.

use std::error::Error as StdError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use crate::config;
use crate::error_ref::ErrorRef;
use crate::registry::{self, CapturedObservation};

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the raise hook with the process-wide configuration.
///
/// Call this early if errors may be raised before any `ThrowContextEnricher` exists.
pub fn ensure_initialized() {
    install();
}

pub(crate) fn install() {
    if !INSTALLED.swap(true, Ordering::AcqRel) {
        let config = config::global();
        debug!(
            capture_flow = config.capture_flow,
            replay_order = ?config.replay_order,
            "Installed throw context raise hook"
        );
    }
}

pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::Acquire)
}

/// Raise `error`: record what is ambient right now, then hand the error back.
///
/// Use it for the original raise and for every rethrow of the same error.
pub fn raise(error: ErrorRef) -> ErrorRef {
    observe(&error);
    error
}

/// Share a freshly constructed error and raise it.
pub fn throw<E>(error: E) -> ErrorRef
where
    E: StdError + Send + Sync + 'static,
{
    raise(ErrorRef::new(error))
}

fn observe(error: &ErrorRef) {
    if !is_installed() {
        return;
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let observation = CapturedObservation::capture(config::global().capture_flow);
        registry::global().record(error, observation)
    }));

    if outcome.is_err() {
        warn!(error = %error, "Failed to capture raise context; the raise proceeds without it");
    }
}

/// Raise the error side of a `Result`.
pub trait RaiseExt<T> {
    /// Map `Err(e)` to `Err(raise(e))`. An `ErrorRef` error keeps its identity,
    /// so this is also the rethrow form.
    fn or_raise(self) -> Result<T, ErrorRef>;
}

impl<T, E> RaiseExt<T> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn or_raise(self) -> Result<T, ErrorRef> {
        self.map_err(throw)
    }
}
