//! LogContext - the ambient stack of enrichers active on the current flow.
//!
//! Pushing returns a guard that pops on drop. `LogContext::snapshot()` captures the
//! stack as an immutable `ContextSnapshot` that can be applied to any event later,
//! long after the pushes that built it have been unwound.

use serde_json::Value;
use std::sync::Arc;

use crate::enricher::{Enricher, PropertyEnricher};
use crate::event::LogEvent;
use crate::flow;

/// One pushed enricher, linked to the frames below it.
pub(crate) struct Frame {
    enricher: Arc<dyn Enricher>,
    parent: Option<Arc<Frame>>,
}

/// Entry point for the ambient log context.
pub struct LogContext;

impl LogContext {
    /// Push an enricher for the lifetime of the returned guard.
    pub fn push<E: Enricher + 'static>(enricher: E) -> ContextGuard {
        Self::push_shared(Arc::new(enricher))
    }

    pub fn push_shared(enricher: Arc<dyn Enricher>) -> ContextGuard {
        let previous = flow::update(|state| {
            let frame = Arc::new(Frame {
                enricher,
                parent: state.context.clone(),
            });
            std::mem::replace(&mut state.context, Some(frame))
        })
        .flatten();

        ContextGuard {
            previous: Some(previous),
        }
    }

    /// Push a single property for the lifetime of the returned guard.
    pub fn push_property(name: impl Into<String>, value: impl Into<Value>) -> ContextGuard {
        Self::push(PropertyEnricher::new(name, value))
    }

    /// Capture the current stack.
    pub fn snapshot() -> ContextSnapshot {
        ContextSnapshot {
            top: flow::current().context,
        }
    }
}

/// Pops the pushed frame when dropped.
///
/// Guards should be dropped in reverse push order on the flow that created them.
#[must_use = "the pushed enricher is removed as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<Option<Arc<Frame>>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            flow::update(|state| state.context = previous);
        }
    }
}

/// Immutable capture of the log context stack.
#[derive(Clone, Default)]
pub struct ContextSnapshot {
    top: Option<Arc<Frame>>,
}

impl ContextSnapshot {
    /// Enrichers from the most recently pushed to the oldest.
    pub fn enrichers(&self) -> impl Iterator<Item = &Arc<dyn Enricher>> + '_ {
        std::iter::successors(self.top.as_deref(), |frame| frame.parent.as_deref())
            .map(|frame| &frame.enricher)
    }

    pub fn len(&self) -> usize {
        self.enrichers().count()
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    /// Apply every captured enricher, innermost push first.
    ///
    /// With add-if-absent writes the innermost value of a key wins.
    pub fn apply(&self, event: &mut LogEvent) {
        for enricher in self.enrichers() {
            enricher.enrich(event);
        }
    }
}

impl Enricher for ContextSnapshot {
    fn enrich(&self, event: &mut LogEvent) {
        self.apply(event)
    }
}

impl std::fmt::Debug for ContextSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextSnapshot")
            .field("frames", &self.len())
            .finish()
    }
}

/// Applies the live log context at the time the event is written.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogContextEnricher;

impl Enricher for LogContextEnricher {
    fn enrich(&self, event: &mut LogEvent) {
        LogContext::snapshot().apply(event);
    }
}
