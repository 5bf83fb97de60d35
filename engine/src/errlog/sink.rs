/*!
 * Default Error Sink
 * Appends timestamped lines to error.log in the working directory
 */

use super::facility::set_sink;
use super::types::ErrorContext;
use crate::core::limits::ERROR_LOG_FILE;
use std::fs::OpenOptions;
use std::io::Write;

/// Append one line per event to `error.log`:
/// `[timestamp] [LEVEL] [file:line] function: (code=N) message`
///
/// Sink failures are reported to stderr and dropped; the facility never
/// propagates them.
pub fn default_sink(context: &ErrorContext) {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(ERROR_LOG_FILE);

    let mut file = match file {
        Ok(file) => file,
        Err(err) => {
            eprintln!("failed to open {}: {}", ERROR_LOG_FILE, err);
            return;
        }
    };

    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    if let Err(err) = writeln!(
        file,
        "[{}] [{}] [{}:{}] {}: (code={}) {}",
        timestamp,
        context.level,
        context.file,
        context.line,
        context.function,
        context.code.value(),
        context.message
    ) {
        eprintln!("failed to write {}: {}", ERROR_LOG_FILE, err);
    }
}

/// Install `default_sink` as the active sink.
pub fn set_default_sink() {
    set_sink(default_sink);
}
