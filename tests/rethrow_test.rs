mod common;

use common::{log_context_logger, ApplicationError, FormatError};
use serde_json::json;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use throw_context::{
    raise, throw, ErrorRef, FlowExt, LogContext, RaiseExt, ThrowContextEnricher,
};

fn log_correlated(log: &throw_context::Logger, error: &ErrorRef) {
    let _correlate = LogContext::push(ThrowContextEnricher::new());
    log.information_error(error, "Unit test");
}

fn throw_with(name: &str, value: i64) -> Result<(), ErrorRef> {
    let _p = LogContext::push_property(name, value);
    Err(throw(ApplicationError))
}

#[test]
fn test_rethrow_captures_property() {
    let (log, last) = log_context_logger();

    let result = throw_with("A", 1).or_else(|error| {
        let _b = LogContext::push_property("B", 2);
        Err(raise(error))
    });
    log_correlated(&log, &result.unwrap_err());

    let event = last.get();
    assert_eq!(event.property("A"), Some(&json!(1)));
    assert_eq!(event.property("B"), Some(&json!(2)));
}

#[test]
fn test_rethrow_does_not_override_original_property() {
    let (log, last) = log_context_logger();

    let result = throw_with("A", 1).or_else(|error| {
        let _a = LogContext::push_property("A", 2);
        Err(raise(error))
    });
    log_correlated(&log, &result.unwrap_err());

    assert_eq!(last.get().property("A"), Some(&json!(1)));
}

#[test]
fn test_rethrow_through_or_raise_keeps_identity() {
    let (log, last) = log_context_logger();

    let original = throw_with("A", 1).unwrap_err();
    let result = {
        let _a = LogContext::push_property("A", 2);
        Err::<(), _>(original.clone()).or_raise()
    };
    let rethrown = result.unwrap_err();
    assert!(rethrown.ptr_eq(&original));

    log_correlated(&log, &rethrown);
    assert_eq!(last.get().property("A"), Some(&json!(1)));
}

#[test]
fn test_rethrow_does_not_capture_original_property_for_new_error() {
    let (log, last) = log_context_logger();

    let result = {
        let first: Result<(), ErrorRef> = {
            let _a = LogContext::push_property("A", 1);
            Err(throw(FormatError))
        };
        first.or_else(|_original| {
            let _b = LogContext::push_property("B", 2);
            Err(throw(ApplicationError))
        })
    };
    let error = result.unwrap_err();
    assert!(error.is::<ApplicationError>());
    log_correlated(&log, &error);

    let event = last.get();
    assert!(!event.has_property("A"));
    assert_eq!(event.property("B"), Some(&json!(2)));
}

#[test]
fn test_rethrow_of_shared_trait_object_keeps_first_raise() {
    let (log, last) = log_context_logger();

    let shared: Arc<dyn StdError + Send + Sync> = Arc::new(FormatError);
    let first = {
        let _a = LogContext::push_property("A", 1);
        Err::<(), _>(shared.clone()).or_raise().unwrap_err()
    };
    let second = {
        let _a = LogContext::push_property("A", 2);
        Err::<(), _>(shared).or_raise().unwrap_err()
    };
    assert!(first.ptr_eq(&second));

    log_correlated(&log, &second);
    assert_eq!(last.get().property("A"), Some(&json!(1)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rethrow_captures_property_async() {
    let (log, last) = log_context_logger();

    let task = async move {
        let inner: Result<(), ErrorRef> = async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            let _a = LogContext::push_property("A", 1);
            Err(throw(ApplicationError))
        }
        .await;

        let outer = match inner {
            Ok(()) => Ok(()),
            Err(error) => {
                tokio::time::sleep(Duration::from_millis(1)).await;
                let _b = LogContext::push_property("B", 2);
                Err(raise(error))
            }
        };

        if let Err(error) = outer {
            tokio::time::sleep(Duration::from_millis(1)).await;
            log_correlated(&log, &error);
        }
    }
    .in_current_flow();

    tokio::spawn(task).await.expect("task completes");

    let event = last.get();
    assert_eq!(event.property("A"), Some(&json!(1)));
    assert_eq!(event.property("B"), Some(&json!(2)));
}
