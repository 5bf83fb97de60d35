/*!
 * Lexis Engine Library
 *
 * Pooled memory management for the Lexis language-learning engine, plus the
 * component scaffolding that consumes it. The allocator is the substantive
 * subsystem: a slab cache for the smallest classes, best-fit routing over
 * small pools, a large-pool fallback, and an error-context facility that
 * threads through all of it.
 */

pub mod components;
pub mod core;
pub mod errlog;
pub mod memory;

pub use components::{Renderer, Translator, TranslatorAligner};
pub use core::{EngineError, EngineResult, Language};
pub use errlog::{ErrorCode, ErrorContext, ErrorLevel};
pub use memory::{
    Allocator, MemoryError, MemoryInfo, MemoryResult, MemoryStats, PoolAllocator, PoolConfig,
    PoolRef,
};
