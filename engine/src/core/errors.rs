/*!
 * Error Types
 * Unified error type for the engine components
 */

use thiserror::Error;

// Re-export MemoryError from the memory module
pub use crate::memory::types::MemoryError;

/// Unified engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("service error: {0}")]
    Service(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<String> for EngineError {
    fn from(msg: String) -> Self {
        EngineError::Service(msg)
    }
}

impl From<&str> for EngineError {
    fn from(msg: &str) -> Self {
        EngineError::Service(msg.to_string())
    }
}

/// Result type for component operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;
