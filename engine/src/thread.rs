//! Per-request execution state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::dialect::Dialect;
use crate::error::{CallFrame, EvalError};
use crate::syntax::Pos;

/// Receives each line written by the `print` builtin, without its newline.
pub type PrintFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Deepest call nesting allowed before evaluation fails.
pub const MAX_CALL_DEPTH: usize = 200;

/// The error message an evaluation stops with once cancelled for `reason`.
pub fn cancellation_message(reason: &str) -> String {
    format!("Starlark computation cancelled: {}", reason)
}

/// A cloneable flag another thread can raise to stop an evaluation.
///
/// The evaluator polls it before every statement, loop iteration and call.
#[derive(Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelState>,
}

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl CancelHandle {
    /// Requests cancellation. Only the first reason is kept.
    pub fn cancel(&self, reason: &str) {
        let mut slot = self.inner.reason.lock();
        if slot.is_none() {
            *slot = Some(reason.to_string());
            self.inner.cancelled.store(true, Ordering::Release);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub name: String,
    pub filename: Option<Arc<str>>,
    pub pos: Pos,
    /// Identity of the Starlark function running in this frame.
    pub function: Option<usize>,
}

/// The state of one evaluation request: dialect snapshot, print sink,
/// cancellation flag and call stack.
pub struct Thread {
    pub(crate) dialect: Dialect,
    print: PrintFn,
    cancel: CancelHandle,
    pub(crate) frames: Vec<Frame>,
}

impl Thread {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            print: Arc::new(|line: &str| println!("{}", line)),
            cancel: CancelHandle::default(),
            frames: Vec::new(),
        }
    }

    pub fn with_print(mut self, print: PrintFn) -> Self {
        self.print = print;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// A handle that can cancel this thread from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub(crate) fn print(&self, line: &str) {
        (self.print)(line)
    }

    pub(crate) fn check_cancelled(&self) -> Result<(), String> {
        if !self.cancel.is_cancelled() {
            return Ok(());
        }
        let reason = self.cancel.reason().unwrap_or_default();
        Err(cancellation_message(&reason))
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) -> Result<(), String> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(format!(
                "call stack exceeds maximum depth of {}",
                MAX_CALL_DEPTH
            ));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub(crate) fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub(crate) fn set_pos(&mut self, pos: Pos) {
        if let Some(frame) = self.frames.last_mut() {
            frame.pos = pos;
        }
    }

    pub(crate) fn is_active(&self, function: usize) -> bool {
        self.frames.iter().any(|f| f.function == Some(function))
    }

    /// Builds an [`EvalError`] carrying a copy of the current call stack.
    pub(crate) fn error(&self, msg: impl Into<String>) -> EvalError {
        let call_stack = self
            .frames
            .iter()
            .map(|frame| CallFrame {
                name: frame.name.clone(),
                location: frame
                    .filename
                    .as_ref()
                    .map(|filename| (filename.to_string(), frame.pos)),
            })
            .collect();
        EvalError {
            msg: msg.into(),
            call_stack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_cancel_reason_wins() {
        let thread = Thread::new(Dialect::default());
        let handle = thread.cancel_handle();
        assert!(thread.check_cancelled().is_ok());

        handle.cancel("timed out");
        handle.cancel("shutting down");
        assert!(handle.is_cancelled());
        assert_eq!(
            thread.check_cancelled().unwrap_err(),
            "Starlark computation cancelled: timed out"
        );
    }

    #[test]
    fn test_call_depth_limit() {
        let mut thread = Thread::new(Dialect::default());
        for _ in 0..MAX_CALL_DEPTH {
            thread
                .push_frame(Frame {
                    name: "f".to_string(),
                    filename: None,
                    pos: Pos::default(),
                    function: None,
                })
                .unwrap();
        }
        let err = thread
            .push_frame(Frame {
                name: "f".to_string(),
                filename: None,
                pos: Pos::default(),
                function: None,
            })
            .unwrap_err();
        assert!(err.contains("maximum depth"));
    }
}
