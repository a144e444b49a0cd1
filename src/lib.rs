//! Raise-time log context capture.
//!
//! Records the ambient log context that was active at the moment an error was
//! raised, and replays it onto the log event that eventually reports that error,
//! even after the error crossed several catch/rethrow/wrap layers or resumed on
//! another thread.
//!
//! ```text
//! throw(err) ──► hook ──► ThrowRegistry[identity(err)] += (ContextSnapshot, FlowSnapshot)
//!                                   │
//! logger.error(&err, ..) ──► ThrowContextEnricher walks err.chain()
//!                                   └─► replays observations add-if-absent
//! ```

pub mod config;
pub mod context;
pub mod correlator;
pub mod enricher;
pub mod error;
pub mod error_ref;
pub mod event;
pub mod flow;
pub mod hook;
pub mod logger;
pub mod registry;
pub mod scope;

pub use config::{init, ReplayOrder, ThrowContextConfig};
pub use context::{ContextGuard, ContextSnapshot, LogContext, LogContextEnricher};
pub use correlator::{ReentrancyGuard, ThrowContextEnricher};
pub use enricher::{Enricher, PropertyEnricher};
pub use error::{Result, ThrowContextError};
pub use error_ref::{CauseChain, ErrorIdentity, ErrorRef};
pub use event::{Level, LogEvent};
pub use flow::{FlowExt, FlowSnapshot, WithFlow};
pub use hook::{ensure_initialized, raise, throw, RaiseExt};
pub use logger::{DelegatingSink, JsonSink, Logger, LoggerBuilder, Sink, TracingSink};
pub use registry::{CapturedObservation, ThrowRegistry};
pub use scope::{begin_scope, ScopeEnricher, ScopeGuard};
