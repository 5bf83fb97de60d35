/*!
 * Engine Limits and Constants
 *
 * Centralized location for allocator-wide limits, thresholds, and magic
 * numbers. Values include rationale comments explaining why they exist.
 */

// =============================================================================
// ALIGNMENT
// =============================================================================

/// Allocation granularity (16 bytes)
/// Every request is rounded up to a multiple of this before it reaches any
/// lower layer; matches the platform maximum fundamental alignment.
pub const MEMORY_ALIGNMENT: usize = 16;

// =============================================================================
// POOL HEAP
// =============================================================================

/// In-band block header size (32 bytes)
/// Magic, payload size, in-use flag, and the next/prev chain offsets, padded
/// to a multiple of MEMORY_ALIGNMENT so payloads stay aligned.
pub const BLOCK_HEADER_SIZE: usize = 32;

/// Minimum payload a block may carry (one header's worth)
/// A split only happens when the remainder can hold a header plus this much.
pub const MIN_BLOCK_SIZE: usize = BLOCK_HEADER_SIZE;

/// Largest pool size the u32 offset chain can address
pub const MAX_POOL_SIZE: usize = u32::MAX as usize;

// =============================================================================
// SLAB CACHE
// =============================================================================

/// Smallest slab size class (16 bytes)
pub const SLAB_MIN_SIZE: usize = 16;

/// Largest slab size class (128 bytes)
/// Requests above this go to the pool heap.
pub const SLAB_MAX_SIZE: usize = 128;

/// Number of slab size classes (16, 32, 64, 128)
pub const SLAB_CLASS_COUNT: usize = 4;

/// Objects carved per slab by default
/// Amortizes the system-allocator round trip across this many allocations.
pub const DEFAULT_OBJECTS_PER_SLAB: usize = 64;

// =============================================================================
// ALLOCATOR DEFAULTS
// =============================================================================

/// Default small-block threshold (64 bytes)
pub const DEFAULT_SMALL_BLOCK_SIZE: usize = 64;

/// Default small-pool size (1 MiB)
pub const DEFAULT_SMALL_POOL_SIZE: usize = 1024 * 1024;

/// Default large-pool size (10 MiB)
pub const DEFAULT_LARGE_POOL_SIZE: usize = 10 * 1024 * 1024;

/// Default registry capacity (8 small pools)
pub const DEFAULT_MAX_POOLS: usize = 8;

/// First address handed out by an allocator's address space
/// Keeps NULL_ADDRESS (0) permanently invalid.
pub const ADDRESS_SPACE_BASE: usize = 0x1000;

// =============================================================================
// ERROR FACILITY
// =============================================================================

/// Ring-buffer capacity for recent error contexts
pub const ERROR_HISTORY_CAPACITY: usize = 100;

/// Upper bound on a recorded error message, in bytes
pub const ERROR_MESSAGE_MAX: usize = 256;

/// Name of the file the default error sink appends to
pub const ERROR_LOG_FILE: &str = "error.log";
