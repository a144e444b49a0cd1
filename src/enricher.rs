//! The enrichment seam shared by the logger pipeline, the log context and the correlator.

use serde_json::Value;

use crate::event::LogEvent;

/// Adds properties to a log event.
///
/// Enrichers are expected to write with `LogEvent::add_property_if_absent` so that
/// the first enricher to set a key keeps it.
pub trait Enricher: Send + Sync {
    fn enrich(&self, event: &mut LogEvent);
}

impl<F> Enricher for F
where
    F: Fn(&mut LogEvent) + Send + Sync,
{
    fn enrich(&self, event: &mut LogEvent) {
        self(event)
    }
}

/// Writes a single property, add-if-absent.
#[derive(Debug, Clone)]
pub struct PropertyEnricher {
    name: String,
    value: Value,
}

impl PropertyEnricher {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Enricher for PropertyEnricher {
    fn enrich(&self, event: &mut LogEvent) {
        event.add_property_if_absent(self.name.clone(), self.value.clone());
    }
}
