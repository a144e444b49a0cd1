mod common;

use common::{log_context_logger, ApplicationError, WrapperError};
use serde_json::json;
use throw_context::{throw, ErrorRef, LogContext, ThrowContextEnricher};

#[test]
fn test_throw_in_enricher_scope() {
    let (log, last) = log_context_logger();

    let _correlate = LogContext::push(ThrowContextEnricher::new());
    let result: Result<(), ErrorRef> = {
        let _a = LogContext::push_property("A", 1);
        Err(throw(ApplicationError))
    };
    if let Err(error) = result {
        log.information_error(&error, "Unit test");
    }

    assert_eq!(last.get().property("A"), Some(&json!(1)));
}

#[test]
fn test_wrapped_errors_raised_in_enricher_scope() {
    let (log, last) = log_context_logger();

    let _correlate = LogContext::push(ThrowContextEnricher::new());
    let inner = {
        let _a = LogContext::push_property("A", 1);
        throw(ApplicationError)
    };
    let outer = {
        let _nested = LogContext::push(ThrowContextEnricher::new());
        let _b = LogContext::push_property("B", 2);
        throw(WrapperError::new("Wrapper", inner))
    };
    log.information_error(&outer, "Unit test");

    let event = last.get();
    assert_eq!(event.property("A"), Some(&json!(1)));
    assert_eq!(event.property("B"), Some(&json!(2)));
}

#[test]
fn test_enricher_that_raises_during_replay() {
    let (log, last) = log_context_logger();

    // Raises (and so records) every time it runs, including during replay
    let _noisy = LogContext::push(|event: &mut throw_context::LogEvent| {
        let diagnostic = throw(ApplicationError);
        event.add_property_if_absent("Diagnostic", diagnostic.to_string());
    });
    let _correlate = LogContext::push(ThrowContextEnricher::new());

    let error = {
        let _a = LogContext::push_property("A", 1);
        throw(ApplicationError)
    };
    log.information_error(&error, "Unit test");

    let event = last.get();
    assert_eq!(event.property("A"), Some(&json!(1)));
    assert_eq!(event.property("Diagnostic"), Some(&json!("application error")));
}
