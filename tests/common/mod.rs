//! Test helpers shared by the integration tests
//!
//! Each test file pulls this in with `mod common;`. Not every file uses every
//! helper.
#![allow(dead_code)]

use std::error::Error as StdError;
use std::sync::{Arc, Mutex, Once};
use thiserror::Error;
use throw_context::{DelegatingSink, ErrorRef, LogEvent, Logger, LoggerBuilder};

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

#[derive(Error, Debug)]
#[error("application error")]
pub struct ApplicationError;

#[derive(Error, Debug)]
#[error("format error")]
pub struct FormatError;

/// An error raised while handling another one, carrying it as its cause
#[derive(Error, Debug)]
#[error("{message}")]
pub struct WrapperError {
    pub message: String,
    #[source]
    pub cause: ErrorRef,
}

impl WrapperError {
    pub fn new(message: impl Into<String>, cause: ErrorRef) -> Self {
        Self {
            message: message.into(),
            cause,
        }
    }
}

/// A wrapper holding its cause as a plain shared trait object
#[derive(Error, Debug)]
#[error("{message}")]
pub struct SharedCauseError {
    pub message: String,
    #[source]
    pub cause: Arc<dyn StdError + Send + Sync>,
}

/// Keeps the last event a logger wrote
#[derive(Clone, Default)]
pub struct LastEvent(Arc<Mutex<Option<LogEvent>>>);

impl LastEvent {
    pub fn get(&self) -> LogEvent {
        self.0
            .lock()
            .unwrap()
            .clone()
            .expect("an event was written")
    }

    pub fn sink(&self) -> DelegatingSink<impl Fn(&LogEvent) + Send + Sync> {
        let slot = Arc::clone(&self.0);
        DelegatingSink::new(move |event: &LogEvent| {
            *slot.lock().unwrap() = Some(event.clone());
        })
    }
}

/// Finish `builder` with a sink capturing the last event
pub fn capturing(builder: LoggerBuilder) -> (Logger, LastEvent) {
    let last = LastEvent::default();
    let logger = builder.write_to(last.sink()).build();
    (logger, last)
}

/// The logger most tests use: live log context only, correlator pushed per call
pub fn log_context_logger() -> (Logger, LastEvent) {
    init_test_logging();
    throw_context::ensure_initialized();
    capturing(Logger::builder().enrich_from_log_context())
}
