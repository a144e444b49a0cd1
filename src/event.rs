//! Log events flowing through the logger pipeline.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error_ref::ErrorRef;

/// Matches `{Name}` and `{@Name}` holes in a message template
static TEMPLATE_HOLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{@?([A-Za-z_][A-Za-z0-9_]*)\}").expect("template hole pattern is valid")
});

/// Severity of a log event, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Trace => "Trace",
            Level::Debug => "Debug",
            Level::Information => "Information",
            Level::Warning => "Warning",
            Level::Error => "Error",
            Level::Fatal => "Fatal",
        };
        f.write_str(name)
    }
}

/// A single log record.
///
/// Properties are written by enrichers. The add-if-absent write
/// (`add_property_if_absent`) is what gives enrichers their precedence:
/// whoever writes a key first owns it.
#[derive(Debug, Clone)]
pub struct LogEvent {
    timestamp: DateTime<Utc>,
    level: Level,
    message_template: String,
    error: Option<ErrorRef>,
    properties: BTreeMap<String, Value>,
    /// Processing markers owned by the event (see `ReentrancyGuard`)
    markers: HashSet<&'static str>,
}

impl LogEvent {
    pub fn new(level: Level, message_template: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message_template: message_template.into(),
            error: None,
            properties: BTreeMap::new(),
            markers: HashSet::new(),
        }
    }

    /// Attach the error this event reports.
    pub fn with_error(mut self, error: ErrorRef) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_or_update_property(name, value);
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn message_template(&self) -> &str {
        &self.message_template
    }

    pub fn error(&self) -> Option<&ErrorRef> {
        self.error.as_ref()
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Write `value` under `name` unless the key is already present.
    ///
    /// Returns true if the property was newly set.
    pub fn add_property_if_absent(&mut self, name: impl Into<String>, value: impl Into<Value>) -> bool {
        use std::collections::btree_map::Entry;

        match self.properties.entry(name.into()) {
            Entry::Vacant(slot) => {
                slot.insert(value.into());
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn add_or_update_property(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Value> {
        self.properties.remove(name)
    }

    /// Set a processing marker. Returns false if it was already set.
    pub(crate) fn mark(&mut self, marker: &'static str) -> bool {
        self.markers.insert(marker)
    }

    pub(crate) fn is_marked(&self, marker: &str) -> bool {
        self.markers.contains(marker)
    }

    /// Render the message template, substituting `{Name}` holes with property values.
    ///
    /// String values render without quotes. Holes without a matching property are left as-is.
    pub fn render_message(&self) -> String {
        TEMPLATE_HOLE
            .replace_all(&self.message_template, |caps: &regex::Captures<'_>| {
                match self.properties.get(&caps[1]) {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}
