/*!
 * Error Facility State
 * Thread-local last error, global ring buffer, sink slot, and level filter
 */

use super::types::{ErrorCode, ErrorContext, ErrorLevel};
use crate::core::limits::ERROR_HISTORY_CAPACITY;
use parking_lot::{Mutex, RwLock};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};

/// Callback receiving every recorded error context
pub type ErrorSink = Box<dyn Fn(&ErrorContext) + Send + Sync>;

static MIN_LEVEL: AtomicU8 = AtomicU8::new(ErrorLevel::Debug as u8);
static SINK: RwLock<Option<ErrorSink>> = RwLock::new(None);
static HISTORY: Mutex<VecDeque<ErrorContext>> = Mutex::new(VecDeque::new());

thread_local! {
    static LAST_ERROR: RefCell<Option<ErrorContext>> = const { RefCell::new(None) };
}

/// Reset the facility to its initial state: Debug threshold, empty history,
/// no sink. Safe to call more than once.
pub fn init() {
    MIN_LEVEL.store(ErrorLevel::Debug as u8, Ordering::Relaxed);
    *SINK.write() = None;
    HISTORY.lock().clear();
}

/// Tear the facility down: drops the sink and the history. The thread-local
/// last error of other threads is left to die with them.
pub fn cleanup() {
    *SINK.write() = None;
    HISTORY.lock().clear();
    clear();
}

/// Install a callback receiving every recorded context; replaces any
/// previous sink. Callbacks run on the logging thread.
pub fn set_sink<F>(sink: F)
where
    F: Fn(&ErrorContext) + Send + Sync + 'static,
{
    *SINK.write() = Some(Box::new(sink));
}

/// Suppress events below `level`.
pub fn set_min_level(level: ErrorLevel) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Current suppression threshold.
pub fn min_level() -> ErrorLevel {
    ErrorLevel::from_u8(MIN_LEVEL.load(Ordering::Relaxed))
}

/// Record an error event: store it as the calling thread's last error,
/// append it to the ring buffer (evicting the oldest on overflow), and hand
/// it to the sink, or print a one-line diagnostic to stderr if none is
/// installed.
///
/// Prefer the `log_debug!`..`log_fatal!` macros, which capture the call site.
pub fn log(
    code: ErrorCode,
    level: ErrorLevel,
    file: &'static str,
    line: u32,
    function: &'static str,
    args: std::fmt::Arguments<'_>,
) {
    if level < min_level() {
        return;
    }

    let context = ErrorContext::new(code, level, file, line, function, args.to_string());

    LAST_ERROR.with(|last| {
        *last.borrow_mut() = Some(context.clone());
    });

    {
        let mut history = HISTORY.lock();
        if history.len() == ERROR_HISTORY_CAPACITY {
            history.pop_front();
        }
        history.push_back(context.clone());
    }

    let sink = SINK.read();
    match sink.as_ref() {
        Some(sink) => sink(&context),
        None => eprintln!(
            "[{}:{}] {}: {}",
            context.file, context.line, context.function, context.message
        ),
    }
}

/// The calling thread's most recent error, if any.
pub fn get_last() -> Option<ErrorContext> {
    LAST_ERROR.with(|last| last.borrow().clone())
}

/// Forget the calling thread's last error.
pub fn clear() {
    LAST_ERROR.with(|last| *last.borrow_mut() = None);
}

/// Snapshot of the ring buffer, oldest first.
pub fn recent() -> Vec<ErrorContext> {
    HISTORY.lock().iter().cloned().collect()
}
