/*!
 * Core Types
 * Common types used across the engine
 */

use serde::{Deserialize, Serialize};

/// Address type for memory operations
///
/// Addresses live in the allocator's own address space; they are stable
/// integers, not machine pointers. `NULL_ADDRESS` is never handed out.
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// Identifier of a registered pool (slot index in the registry)
pub type PoolId = u32;

/// The null address. Accepted where the C-style API allowed a null pointer:
/// freeing it is a no-op, reallocating it is a plain allocation.
pub const NULL_ADDRESS: Address = 0;

/// Languages the engine components understand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    Spanish,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Language::English => write!(f, "en"),
            Language::Spanish => write!(f, "es"),
        }
    }
}
