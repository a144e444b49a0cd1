//! Facade scopes: a scope API kept in its own flow-local slot.
//!
//! Scopes are not part of the `LogContext` stack. They only reach an event through
//! `ScopeEnricher`, which reads whatever scopes are current on the flow at the time
//! it runs. Pushing a `ScopeEnricher` onto the `LogContext` therefore captures a
//! reference to "the scopes of the current flow", and only a `FlowSnapshot` replay
//! can bring the raise-time scopes back.

use serde_json::Value;
use std::sync::Arc;

use crate::enricher::Enricher;
use crate::event::LogEvent;
use crate::flow;

pub(crate) struct ScopeFrame {
    properties: Vec<(String, Value)>,
    parent: Option<Arc<ScopeFrame>>,
}

/// Open a scope carrying `properties` until the guard is dropped.
pub fn begin_scope<I, K, V>(properties: I) -> ScopeGuard
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    let properties = properties
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();

    let previous = flow::update(|state| {
        let frame = Arc::new(ScopeFrame {
            properties,
            parent: state.scopes.clone(),
        });
        std::mem::replace(&mut state.scopes, Some(frame))
    })
    .flatten();

    ScopeGuard {
        previous: Some(previous),
    }
}

#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ScopeGuard {
    previous: Option<Option<Arc<ScopeFrame>>>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            flow::update(|state| state.scopes = previous);
        }
    }
}

/// Writes the properties of the current flow's scopes, innermost scope first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeEnricher;

impl Enricher for ScopeEnricher {
    fn enrich(&self, event: &mut LogEvent) {
        let scopes = flow::current().scopes;
        let frames = std::iter::successors(scopes.as_deref(), |frame| frame.parent.as_deref());
        for frame in frames {
            for (name, value) in &frame.properties {
                event.add_property_if_absent(name.clone(), value.clone());
            }
        }
    }
}
