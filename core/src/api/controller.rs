//! Runs one engine request, optionally under a wall-clock timeout.
//!
//! Without a timeout the request runs on the caller's thread. With one, it
//! runs on a scoped worker thread while the caller waits with a deadline.
//! When the deadline passes the caller raises the engine's cancellation
//! flag and joins the worker; cancellation is cooperative, so the worker
//! stops at the engine's next statement, loop iteration or call.
//!
//! Host callbacks (`print`, bridged functions) run synchronously on the
//! thread executing the request.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use starbridge_engine::{self as engine, PrintFn, Thread};
use tracing::{debug, warn};

use super::error::{Error, EvalError};

/// Cancellation reason given to the engine on timeout.
pub(crate) const TIMEOUT_REASON: &str = "timed out";

/// Stack of the worker thread. The evaluator recurses on nested calls.
const WORKER_STACK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestState {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
}

struct Request {
    state: RequestState,
    started: Instant,
}

impl Request {
    fn new() -> Self {
        Self {
            state: RequestState::Pending,
            started: Instant::now(),
        }
    }

    fn transition(&mut self, state: RequestState) {
        debug!(from = ?self.state, to = ?state, elapsed = ?self.started.elapsed(), "Request state");
        self.state = state;
    }

    fn finish<T>(&mut self, result: Result<T, engine::Error>, cancelled: bool) -> Result<T, Error> {
        match result {
            Ok(value) => {
                self.transition(RequestState::Completed);
                Ok(value)
            }
            Err(err) => {
                // Cancellation can race with an unrelated failure.
                let timed_out = cancelled
                    && matches!(&err, engine::Error::Eval(err)
                        if err.msg == engine::cancellation_message(TIMEOUT_REASON));
                let err = Error::from_engine(err, timed_out);
                self.transition(if err.is_timeout() {
                    RequestState::TimedOut
                } else {
                    RequestState::Failed
                });
                Err(err)
            }
        }
    }
}

/// Runs `f` on a fresh engine thread that snapshots the current dialect.
///
/// A zero `timeout` means no timeout.
///
/// Returns once the request has completed, failed or been cancelled; a
/// worker thread never outlives this call.
pub(crate) fn run<T, F>(timeout: Option<Duration>, print: PrintFn, f: F) -> Result<T, Error>
where
    T: Send,
    F: FnOnce(&mut Thread) -> Result<T, engine::Error> + Send,
{
    let mut thread = Thread::new(engine::dialect::current()).with_print(print);
    let cancel = thread.cancel_handle();
    let mut request = Request::new();

    let Some(timeout) = timeout.filter(|timeout| !timeout.is_zero()) else {
        request.transition(RequestState::Running);
        let result = f(&mut thread);
        return request.finish(result, false);
    };

    let result = std::thread::scope(|scope| -> Result<Result<T, engine::Error>, Error> {
        let (tx, rx) = mpsc::channel();
        let worker = std::thread::Builder::new()
            .name("starlark-worker".to_string())
            .stack_size(WORKER_STACK_SIZE)
            .spawn_scoped(scope, move || {
                // The receiver is gone only if the caller panicked.
                let _ = tx.send(f(&mut thread));
            })
            .map_err(|err| {
                Error::Eval(EvalError::new(format!(
                    "failed to start evaluation worker: {}",
                    err
                )))
            })?;
        request.transition(RequestState::Running);

        let received = match rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => {
                warn!(?timeout, "Starlark evaluation timed out, cancelling");
                cancel.cancel(TIMEOUT_REASON);
                rx.recv().ok()
            }
            Err(RecvTimeoutError::Disconnected) => None,
        };
        match received {
            Some(result) => Ok(result),
            None => match worker.join() {
                Err(payload) => std::panic::resume_unwind(payload),
                Ok(()) => Err(Error::Eval(EvalError::new(
                    "evaluation worker exited without a result",
                ))),
            },
        }
    })?;

    request.finish(result, cancel.is_cancelled())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn quiet() -> PrintFn {
        Arc::new(|_: &str| {})
    }

    #[test]
    fn test_runs_inline_without_timeout() {
        let caller = std::thread::current().id();
        let ran_on = run(None, quiet(), |_| Ok(std::thread::current().id())).unwrap();
        assert_eq!(ran_on, caller);
    }

    #[test]
    fn test_runs_on_worker_with_timeout() {
        let caller = std::thread::current().id();
        let ran_on = run(Some(Duration::from_secs(5)), quiet(), |_| {
            Ok(std::thread::current().id())
        })
        .unwrap();
        assert_ne!(ran_on, caller);
    }

    #[test]
    fn test_late_result_is_returned() {
        // Finishes after the deadline without ever polling the flag.
        let result = run(Some(Duration::from_millis(10)), quiet(), |_| {
            std::thread::sleep(Duration::from_millis(100));
            Ok(42)
        });
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_cancelled_request_times_out() {
        let err = run(Some(Duration::from_millis(50)), quiet(), |thread| {
            engine::exec_file(
                thread,
                "spin.star",
                "def spin():\n    for i in range(1 << 60):\n        pass\nspin()\n",
                &engine::Globals::new(),
            )
        })
        .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.error_type(), "EvalTimeoutError");
        assert!(err.message().contains("timed out"), "{}", err.message());
    }

    #[test]
    fn test_zero_timeout_runs_inline() {
        let caller = std::thread::current().id();
        let ran_on = run(Some(Duration::ZERO), quiet(), |thread| {
            engine::eval(thread, "<expr>", "1", &engine::Globals::new())?;
            Ok(std::thread::current().id())
        })
        .unwrap();
        assert_eq!(ran_on, caller);
    }

    #[test]
    fn test_failure_after_deadline_is_not_a_timeout() {
        // Fails on its own after the deadline, before reaching a cancellation check.
        let err = run(Some(Duration::from_millis(10)), quiet(), |thread| {
            std::thread::sleep(Duration::from_millis(100));
            engine::eval(thread, "<expr>", "1 // 0", &engine::Globals::new())
        })
        .unwrap_err();
        assert!(!err.is_timeout());
        assert_eq!(err.error_type(), "EvalError");
        assert_eq!(err.message(), "integer division by zero");
    }

    #[test]
    fn test_failure_is_not_a_timeout() {
        let err = run(Some(Duration::from_secs(5)), quiet(), |thread| {
            engine::eval(thread, "<expr>", "1 // 0", &engine::Globals::new())
        })
        .unwrap_err();
        assert_eq!(err.error_type(), "EvalError");
        assert_eq!(err.message(), "integer division by zero");
    }
}
