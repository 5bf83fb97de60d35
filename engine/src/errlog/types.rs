/*!
 * Error Context Types
 * Levels, codes, and the context record itself
 */

use crate::core::limits::ERROR_MESSAGE_MAX;
use serde::{Deserialize, Serialize};

/// Severity levels, ordered: Debug < Info < Warning < Error < Fatal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorLevel {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
    Fatal = 4,
}

impl ErrorLevel {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ErrorLevel::Debug,
            1 => ErrorLevel::Info,
            2 => ErrorLevel::Warning,
            3 => ErrorLevel::Error,
            _ => ErrorLevel::Fatal,
        }
    }
}

impl std::fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ErrorLevel::Debug => write!(f, "DEBUG"),
            ErrorLevel::Info => write!(f, "INFO"),
            ErrorLevel::Warning => write!(f, "WARNING"),
            ErrorLevel::Error => write!(f, "ERROR"),
            ErrorLevel::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Base value for pool-specific error codes
pub const POOL_ERROR_BASE: u32 = 1100;

/// Semantic error kinds surfaced at the API boundary.
///
/// Success is not a variant; `Result::Ok` encodes it. Numeric values are
/// stable: generic codes count from 1, pool codes from POOL_ERROR_BASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum ErrorCode {
    NullPointer = 1,
    InvalidArgument = 2,
    MemoryAllocation = 3,
    FileIo = 4,
    Network = 5,
    Unknown = 6,
    ThreadLock = 7,
    ThreadUnlock = 8,
    ThreadInit = 9,
    PoolInitFailed = POOL_ERROR_BASE + 1,
    PoolAllocFailed = POOL_ERROR_BASE + 2,
    PoolInvalidFree = POOL_ERROR_BASE + 3,
    PoolFull = POOL_ERROR_BASE + 4,
    PoolInvalidPool = POOL_ERROR_BASE + 5,
    PoolCorruption = POOL_ERROR_BASE + 6,
}

impl ErrorCode {
    /// Stable numeric value, as written by the default sink.
    pub fn value(self) -> u32 {
        self as u32
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ErrorCode::NullPointer => "NULL_POINTER",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::MemoryAllocation => "MEMORY_ALLOCATION",
            ErrorCode::FileIo => "FILE_IO",
            ErrorCode::Network => "NETWORK",
            ErrorCode::Unknown => "UNKNOWN",
            ErrorCode::ThreadLock => "THREAD_LOCK",
            ErrorCode::ThreadUnlock => "THREAD_UNLOCK",
            ErrorCode::ThreadInit => "THREAD_INIT",
            ErrorCode::PoolInitFailed => "POOL_INIT_FAILED",
            ErrorCode::PoolAllocFailed => "POOL_ALLOC_FAILED",
            ErrorCode::PoolInvalidFree => "POOL_INVALID_FREE",
            ErrorCode::PoolFull => "POOL_FULL",
            ErrorCode::PoolInvalidPool => "POOL_INVALID_POOL",
            ErrorCode::PoolCorruption => "POOL_CORRUPTION",
        };
        write!(f, "{}", name)
    }
}

/// One recorded error event: what, how bad, and where it came from
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    pub code: ErrorCode,
    pub level: ErrorLevel,
    pub file: &'static str,
    pub line: u32,
    pub function: &'static str,
    pub message: String,
}

impl ErrorContext {
    pub fn new(
        code: ErrorCode,
        level: ErrorLevel,
        file: &'static str,
        line: u32,
        function: &'static str,
        message: impl Into<String>,
    ) -> Self {
        let mut message = message.into();
        if message.len() > ERROR_MESSAGE_MAX {
            let mut end = ERROR_MESSAGE_MAX;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        Self {
            code,
            level,
            file,
            line,
            function,
            message,
        }
    }
}
