//! ThrowContextEnricher - replays raise-time context onto the event that reports an error.
//!
//! For an event carrying an error, the enricher walks the error's cause chain from
//! the outermost error to the root cause. For each error it replays the recorded
//! observations oldest first (by default), each inside its captured flow state,
//! applying the captured log context with add-if-absent writes. That yields:
//!
//! - an outer error's context wins over its cause's context on a shared key
//! - the original raise wins over a later rethrow of the same error
//! - a new error raised while handling another one starts with nothing of its own
//!   unless it carries the other one as its cause
//!
//! Enrichment is order-sensitive with respect to other enrichers writing the same
//! keys: whichever runs first owns the key.

use tracing::trace;

use crate::config::{self, ReplayOrder, ThrowContextConfig};
use crate::enricher::Enricher;
use crate::event::LogEvent;
use crate::hook;
use crate::registry;

/// Marks an event once the correlator has started on it.
///
/// Replaying a captured context can run this same correlator again on the same
/// event (for example when the correlator itself was pushed onto the log context
/// that got captured). The marker lives on the event, so it goes away with it.
pub struct ReentrancyGuard;

impl ReentrancyGuard {
    const MARKER: &'static str = "throw_context.correlated";

    /// Mark `event`. Returns false if it was already marked.
    pub fn try_enter(event: &mut LogEvent) -> bool {
        event.mark(Self::MARKER)
    }

    pub fn is_marked(event: &LogEvent) -> bool {
        event.is_marked(Self::MARKER)
    }
}

#[derive(Debug, Clone)]
pub struct ThrowContextEnricher {
    replay_order: ReplayOrder,
    max_chain_depth: usize,
}

impl ThrowContextEnricher {
    /// Correlator using the process-wide configuration. Installs the raise hook.
    pub fn new() -> Self {
        Self::with_config(config::global())
    }

    pub fn with_config(config: &ThrowContextConfig) -> Self {
        hook::ensure_initialized();
        Self {
            replay_order: config.replay_order,
            max_chain_depth: config.max_chain_depth.max(1),
        }
    }

    pub fn replay_order(mut self, order: ReplayOrder) -> Self {
        self.replay_order = order;
        self
    }

    pub fn max_chain_depth(mut self, depth: usize) -> Self {
        self.max_chain_depth = depth.max(1);
        self
    }

    fn correlate(&self, event: &mut LogEvent) {
        // The chain borrows from this handle, not from the event being mutated
        let Some(error) = event.error().cloned() else {
            return;
        };

        let mut chain = error.chain().max_depth(self.max_chain_depth);
        for link in chain.by_ref() {
            let Some(identity) = link.identity else {
                continue;
            };
            let mut observations = registry::global().lookup(identity);
            if self.replay_order == ReplayOrder::MostRecentFirst {
                observations.reverse();
            }
            for observation in &observations {
                observation.replay_onto(event);
            }
        }

        if chain.was_truncated() {
            trace!(
                max_chain_depth = self.max_chain_depth,
                "Cause chain walk stopped early (depth bound or repeated error)"
            );
        }
    }
}

impl Default for ThrowContextEnricher {
    fn default() -> Self {
        Self::new()
    }
}

impl Enricher for ThrowContextEnricher {
    fn enrich(&self, event: &mut LogEvent) {
        if event.error().is_none() {
            return;
        }
        if !ReentrancyGuard::try_enter(event) {
            trace!("Skipping reentrant throw context enrichment");
            return;
        }
        self.correlate(event);
    }
}
