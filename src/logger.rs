//! A small structured logger: enrichers in registration order, then sinks.
//!
//! ```text
//! LogEvent ──► enricher 1 ──► enricher 2 ──► ... ──► sink 1, sink 2, ...
//! ```
//!
//! Enrichers run in the order they were added. Because enrichers write
//! add-if-absent, that order decides who owns a key several of them write.

use serde_json::{Map, Value};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::context::LogContextEnricher;
use crate::correlator::ThrowContextEnricher;
use crate::enricher::Enricher;
use crate::error::{Result, ThrowContextError};
use crate::error_ref::ErrorRef;
use crate::event::{Level, LogEvent};

/// Destination for fully enriched events.
pub trait Sink: Send + Sync {
    fn emit(&self, event: &LogEvent);
}

/// Hands every event to a closure.
pub struct DelegatingSink<F> {
    write: F,
}

impl<F> DelegatingSink<F>
where
    F: Fn(&LogEvent) + Send + Sync,
{
    pub fn new(write: F) -> Self {
        Self { write }
    }
}

impl<F> Sink for DelegatingSink<F>
where
    F: Fn(&LogEvent) + Send + Sync,
{
    fn emit(&self, event: &LogEvent) {
        (self.write)(event)
    }
}

/// Forwards events into `tracing`, one tracing event per log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn emit(&self, event: &LogEvent) {
        let message = event.render_message();
        let properties = serde_json::to_string(event.properties()).unwrap_or_default();
        let error = event.error().map(|e| e.to_string()).unwrap_or_default();

        match event.level() {
            Level::Trace => {
                tracing::trace!(target: "throw_context::event", %properties, %error, "{}", message)
            }
            Level::Debug => {
                tracing::debug!(target: "throw_context::event", %properties, %error, "{}", message)
            }
            Level::Information => {
                tracing::info!(target: "throw_context::event", %properties, %error, "{}", message)
            }
            Level::Warning => {
                tracing::warn!(target: "throw_context::event", %properties, %error, "{}", message)
            }
            Level::Error | Level::Fatal => {
                tracing::error!(target: "throw_context::event", %properties, %error, "{}", message)
            }
        }
    }
}

/// Writes one compact JSON object per event.
///
/// Reserved fields: `@t` timestamp, `@l` level, `@mt` template, `@m` rendered
/// message, `@x` error with its causes. Properties follow under their own names.
pub struct JsonSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Format one event as a JSON object.
    pub fn format(event: &LogEvent) -> Value {
        let mut object = Map::new();
        object.insert("@t".into(), Value::String(event.timestamp().to_rfc3339()));
        object.insert("@l".into(), Value::String(event.level().to_string()));
        object.insert(
            "@mt".into(),
            Value::String(event.message_template().to_string()),
        );
        object.insert("@m".into(), Value::String(event.render_message()));
        if let Some(error) = event.error() {
            object.insert("@x".into(), Value::String(describe_error(error)));
        }
        for (name, value) in event.properties() {
            object.insert(name.clone(), value.clone());
        }
        Value::Object(object)
    }

    fn write_event(&self, event: &LogEvent) -> Result<()> {
        let line = serde_json::to_string(&Self::format(event))?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| ThrowContextError::Sink("JSON sink writer lock poisoned".to_string()))?;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> Sink for JsonSink<W> {
    fn emit(&self, event: &LogEvent) {
        if let Err(e) = self.write_event(event) {
            warn!("Failed to write log event: {}", e);
        }
    }
}

/// `outer: inner: root` rendering of an error and its causes
fn describe_error(error: &ErrorRef) -> String {
    error
        .chain()
        .map(|link| link.error.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

#[derive(Default)]
pub struct LoggerBuilder {
    minimum_level: Option<Level>,
    enrichers: Vec<Arc<dyn Enricher>>,
    sinks: Vec<Arc<dyn Sink>>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop events below `level`. Defaults to `Level::Information`.
    pub fn minimum_level(mut self, level: Level) -> Self {
        self.minimum_level = Some(level);
        self
    }

    pub fn enrich_with<E: Enricher + 'static>(mut self, enricher: E) -> Self {
        self.enrichers.push(Arc::new(enricher));
        self
    }

    /// Apply the live log context when each event is written.
    pub fn enrich_from_log_context(self) -> Self {
        self.enrich_with(LogContextEnricher)
    }

    /// Replay raise-time context for events that carry an error.
    pub fn enrich_with_throw_context(self) -> Self {
        self.enrich_with(ThrowContextEnricher::new())
    }

    pub fn write_to<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Arc::new(sink));
        self
    }

    pub fn write_to_shared(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> Logger {
        Logger {
            inner: Arc::new(LoggerInner {
                minimum_level: self.minimum_level.unwrap_or(Level::Information),
                enrichers: self.enrichers,
                sinks: self.sinks,
            }),
        }
    }
}

struct LoggerInner {
    minimum_level: Level,
    enrichers: Vec<Arc<dyn Enricher>>,
    sinks: Vec<Arc<dyn Sink>>,
}

#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        level >= self.inner.minimum_level
    }

    /// Enrich `event` and hand it to every sink.
    pub fn write(&self, mut event: LogEvent) {
        if !self.is_enabled(event.level()) {
            return;
        }
        for enricher in &self.inner.enrichers {
            enricher.enrich(&mut event);
        }
        for sink in &self.inner.sinks {
            sink.emit(&event);
        }
    }

    pub fn log(&self, level: Level, error: Option<&ErrorRef>, message: &str) {
        let mut event = LogEvent::new(level, message);
        if let Some(error) = error {
            event = event.with_error(error.clone());
        }
        self.write(event);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, None, message);
    }

    pub fn information(&self, message: &str) {
        self.log(Level::Information, None, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(Level::Warning, None, message);
    }

    /// Log `error` at `Level::Information`.
    pub fn information_error(&self, error: &ErrorRef, message: &str) {
        self.log(Level::Information, Some(error), message);
    }

    pub fn error(&self, error: &ErrorRef, message: &str) {
        self.log(Level::Error, Some(error), message);
    }

    pub fn fatal(&self, error: &ErrorRef, message: &str) {
        self.log(Level::Fatal, Some(error), message);
    }
}
