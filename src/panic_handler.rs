//! Panic containment boundary.
//!
//! After a panic caught at the boundary, the component's observable state
//! equals its state immediately
//! before the faulting call. `catch_panic` relies on the caller only
//! mutating shared state through operations that are themselves atomic
//! (lock-guarded swap, not a half-applied sequence of field writes) so that
//! unwinding out of the closure never leaves torn state behind.

use crate::error::AxonError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

pub type PanicResult<T> = Result<T, AxonError>;
pub type PanicError = AxonError;

/// Install a process-wide panic hook that emits one structured `tracing`
/// error record per panic, regardless of whether a `catch_panic` boundary
/// later recovers it. Idempotent.
pub fn install_panic_hook() {
    if HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
        return;
    }
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let location = info.location().map(|l| l.to_string());
        let message = panic_message(info.payload());
        tracing::error!(
            target: "axon_core::panic",
            location = location.as_deref().unwrap_or("unknown"),
            "panic: {message}"
        );
        previous(info);
    }));
}

fn panic_message(payload: &dyn Any) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Invoke `f`, catching a process-local panic and turning it into
/// [`AxonError::PanicRecovered`] instead of unwinding past this boundary.
pub fn catch_panic<F, T>(f: F) -> PanicResult<T>
where
    F: FnOnce() -> T,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(v) => Ok(v),
        Err(payload) => {
            crate::metrics::PANICS_TOTAL.inc();
            let message = panic_message(payload.as_ref());
            Err(AxonError::PanicRecovered {
                message,
                location: None,
                backtrace: std::backtrace::Backtrace::force_capture().to_string(),
            })
        }
    }
}

/// Async variant: runs a future on the current task and catches a panic
/// inside it. Requires the future to be `UnwindSafe` in practice (it is
/// driven to completion inside `catch_unwind` via a blocking poll loop is
/// not viable for arbitrary futures, so this spawns onto a dedicated task
/// and joins it — a panicking task surfaces as a `JoinError`, which we
/// translate the same way as a caught panic).
pub async fn catch_panic_async<F, T>(f: F) -> PanicResult<T>
where
    F: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(f).await {
        Ok(v) => Ok(v),
        Err(join_err) => {
            crate::metrics::PANICS_TOTAL.inc();
            let message = if join_err.is_panic() {
                let payload = join_err.into_panic();
                panic_message(payload.as_ref())
            } else {
                "task cancelled".to_string()
            };
            Err(AxonError::PanicRecovered {
                message,
                location: None,
                backtrace: String::new(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catches_string_panic() {
        let result = catch_panic(|| -> i32 { panic!("boom") });
        assert!(matches!(result, Err(AxonError::PanicRecovered { .. })));
    }

    #[test]
    fn passes_through_normal_result() {
        let result = catch_panic(|| 42);
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn catches_async_panic() {
        let result = catch_panic_async(async { panic!("async boom") }).await;
        assert!(result.is_err());
    }
}
