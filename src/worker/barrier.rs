//! Fault barrier around concurrency units
//!
//! A panic inside a supervisor loop or execution unit is caught here, logged
//! with a label naming the operation, and counted. The unit then ends
//! normally instead of tearing down the process.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::error;

use crate::error::{Error, Result};
use crate::metrics::{Counter, Metrics};

/// Run `fut`, converting a panic into `Error::Panicked`
pub async fn guarded<F, T>(label: &str, task_type: &str, metrics: &Metrics, fut: F) -> Result<T>
where
    F: Future<Output = T>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(value) => Ok(value),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(label, task_type, panic = %message, "Recovered from panic");
            metrics.incr(Counter::Panics, task_type);
            Err(Error::Panicked {
                label: label.to_string(),
                message,
            })
        }
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_value_passes_through() {
        let metrics = Metrics::new();
        let value = guarded("execute", "T", &metrics, async { 7 }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(metrics.counter(Counter::Panics, "T"), 0);
    }

    #[tokio::test]
    async fn test_panic_is_contained_and_counted() {
        let metrics = Metrics::new();
        let result: Result<()> = guarded("execute", "T", &metrics, async {
            panic!("handler blew up");
        })
        .await;

        match result {
            Err(Error::Panicked { label, message }) => {
                assert_eq!(label, "execute");
                assert_eq!(message, "handler blew up");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(metrics.counter(Counter::Panics, "T"), 1);
    }

    #[test]
    fn test_panic_message_formats() {
        let formatted: Box<dyn Any + Send> = Box::new(format!("code {}", 3));
        assert_eq!(panic_message(formatted.as_ref()), "code 3");

        let opaque: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(opaque.as_ref()), "unknown panic payload");
    }
}
