/*!
 * Pool Heap
 *
 * A pool owns one contiguous byte region carved into blocks. Every block
 * carries an in-band header: a magic sentinel, the payload size, an in-use
 * flag, and next/prev chain offsets keeping the blocks doubly linked in
 * address order. Allocation is first-fit with splitting; frees coalesce
 * eagerly with both neighbors.
 *
 * Addresses handed out are positions in the allocator's virtual address
 * space; payload bytes are reached through the bounds-checked read/write
 * operations, never through raw pointers.
 */

use super::types::{MemoryError, MemoryResult, PoolStats};
use crate::core::alignment::aligned_size;
use crate::core::limits::{BLOCK_HEADER_SIZE, MAX_POOL_SIZE, MEMORY_ALIGNMENT, MIN_BLOCK_SIZE};
use crate::core::types::{Address, PoolId, Size};
use crate::errlog::ErrorCode;
use crate::{log_error, log_fatal};
use parking_lot::Mutex;

/// Sentinel for "no block" in the chain offsets
const NO_BLOCK: u32 = u32::MAX;

/// Magic sentinel stamped into every live header
const BLOCK_MAGIC: u32 = 0xB10C_A11C;

// Header field positions within the 32-byte header
const MAGIC_AT: usize = 0;
const SIZE_AT: usize = 4;
const IN_USE_AT: usize = 8;
const NEXT_AT: usize = 12;
const PREV_AT: usize = 16;

/// Reserved id of the large pool (never a registry slot)
pub const LARGE_POOL_ID: PoolId = PoolId::MAX;

fn get_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn put_u32(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Decoded view of one block header
#[derive(Debug, Clone, Copy)]
struct Header {
    magic: u32,
    size: Size,
    in_use: bool,
    next: u32,
    prev: u32,
}

fn load_header(bytes: &[u8], off: u32) -> Header {
    let at = off as usize;
    Header {
        magic: get_u32(bytes, at + MAGIC_AT),
        size: get_u32(bytes, at + SIZE_AT) as Size,
        in_use: get_u32(bytes, at + IN_USE_AT) != 0,
        next: get_u32(bytes, at + NEXT_AT),
        prev: get_u32(bytes, at + PREV_AT),
    }
}

fn init_block(bytes: &mut [u8], off: u32, size: Size, in_use: bool, next: u32, prev: u32) {
    let at = off as usize;
    put_u32(bytes, at + MAGIC_AT, BLOCK_MAGIC);
    put_u32(bytes, at + SIZE_AT, size as u32);
    put_u32(bytes, at + IN_USE_AT, in_use as u32);
    put_u32(bytes, at + NEXT_AT, next);
    put_u32(bytes, at + PREV_AT, prev);
}

fn set_size(bytes: &mut [u8], off: u32, size: Size) {
    put_u32(bytes, off as usize + SIZE_AT, size as u32);
}

fn set_in_use(bytes: &mut [u8], off: u32, in_use: bool) {
    put_u32(bytes, off as usize + IN_USE_AT, in_use as u32);
}

fn set_next(bytes: &mut [u8], off: u32, next: u32) {
    put_u32(bytes, off as usize + NEXT_AT, next);
}

fn set_prev(bytes: &mut [u8], off: u32, prev: u32) {
    put_u32(bytes, off as usize + PREV_AT, prev);
}

/// Erase the magic of a header absorbed by coalescing, so a stale interior
/// address is caught as corruption instead of re-entering the chain.
fn scrub_block(bytes: &mut [u8], off: u32) {
    put_u32(bytes, off as usize + MAGIC_AT, 0);
}

/// Snapshot of one block, for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub offset: u32,
    pub payload_size: Size,
    pub in_use: bool,
}

struct PoolState {
    bytes: Box<[u8]>,
    used_size: Size,
}

/// One contiguous backing region managed by a block-chain allocator.
///
/// `base` and `total_size` never change after creation, so range tests need
/// no lock; all structural mutation happens under the pool mutex.
pub struct Pool {
    id: PoolId,
    base: Address,
    total_size: Size,
    state: Mutex<PoolState>,
}

impl Pool {
    /// Carve a fresh region into a single free block spanning everything
    /// after the first header.
    pub(crate) fn new(id: PoolId, base: Address, total_size: Size) -> MemoryResult<Self> {
        if total_size < BLOCK_HEADER_SIZE + MIN_BLOCK_SIZE || total_size > MAX_POOL_SIZE {
            log_error!(
                ErrorCode::PoolInitFailed,
                "pool size {} is outside the representable range",
                total_size
            );
            return Err(MemoryError::InitFailed(format!(
                "pool size {} is outside the representable range",
                total_size
            )));
        }
        debug_assert_eq!(total_size % MEMORY_ALIGNMENT, 0);
        debug_assert_eq!(base % MEMORY_ALIGNMENT, 0);

        let mut bytes = vec![0u8; total_size].into_boxed_slice();
        init_block(
            &mut bytes,
            0,
            total_size - BLOCK_HEADER_SIZE,
            false,
            NO_BLOCK,
            NO_BLOCK,
        );

        Ok(Self {
            id,
            base,
            total_size,
            state: Mutex::new(PoolState {
                bytes,
                used_size: 0,
            }),
        })
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn base(&self) -> Address {
        self.base
    }

    pub fn total_size(&self) -> Size {
        self.total_size
    }

    pub fn used_size(&self) -> Size {
        self.state.lock().used_size
    }

    /// True iff `addr` lies inside this pool's region.
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.base && addr < self.base + self.total_size
    }

    /// Magic mismatch means a double free through a stale address, an
    /// overrun, or a foreign address: the region can no longer be trusted.
    fn verify_magic(&self, header: &Header, off: u32) {
        if header.magic != BLOCK_MAGIC {
            log_fatal!(
                ErrorCode::PoolCorruption,
                "memory corruption detected: bad magic in pool {} at offset {}",
                self.id,
                off
            );
            panic!(
                "memory corruption detected: bad magic in pool {} at offset {}",
                self.id, off
            );
        }
    }

    /// Translate a payload address into its header offset, rejecting
    /// addresses that cannot name a block in this pool.
    fn block_offset(&self, addr: Address) -> MemoryResult<u32> {
        if !self.contains(addr) {
            return Err(MemoryError::InvalidFree(addr));
        }
        let rel = addr - self.base;
        if rel < BLOCK_HEADER_SIZE || rel % MEMORY_ALIGNMENT != 0 {
            return Err(MemoryError::InvalidFree(addr));
        }
        Ok((rel - BLOCK_HEADER_SIZE) as u32)
    }

    /// First-fit allocation with splitting.
    pub fn allocate(&self, size: Size) -> MemoryResult<Address> {
        // Payloads never drop below one header's worth
        let size = aligned_size(size).max(MIN_BLOCK_SIZE);
        let mut state = self.state.lock();
        let mut off = 0u32;

        loop {
            let header = load_header(&state.bytes, off);
            self.verify_magic(&header, off);

            if !header.in_use && header.size >= size {
                // Split when the remainder still holds a header plus the
                // minimum block.
                if header.size - size >= BLOCK_HEADER_SIZE + MIN_BLOCK_SIZE {
                    let split_off = off + (BLOCK_HEADER_SIZE + size) as u32;
                    let split_size = header.size - size - BLOCK_HEADER_SIZE;
                    init_block(
                        &mut state.bytes,
                        split_off,
                        split_size,
                        false,
                        header.next,
                        off,
                    );
                    if header.next != NO_BLOCK {
                        set_prev(&mut state.bytes, header.next, split_off);
                    }
                    set_next(&mut state.bytes, off, split_off);
                    set_size(&mut state.bytes, off, size);
                }

                set_in_use(&mut state.bytes, off, true);
                let granted = load_header(&state.bytes, off).size;
                state.used_size += BLOCK_HEADER_SIZE + granted;
                return Ok(self.base + off as usize + BLOCK_HEADER_SIZE);
            }

            if header.next == NO_BLOCK {
                break;
            }
            off = header.next;
        }

        let available = self.total_size - state.used_size;
        drop(state);
        log_error!(
            ErrorCode::PoolAllocFailed,
            "pool {}: no block for {} bytes",
            self.id,
            size
        );
        Err(MemoryError::AllocFailed {
            requested: size,
            available,
        })
    }

    /// Return a block to the pool, coalescing with free neighbors.
    pub fn free(&self, addr: Address) -> MemoryResult<()> {
        let off = self.block_offset(addr).map_err(|err| {
            log_error!(
                ErrorCode::PoolInvalidFree,
                "pool {}: free of invalid address 0x{:x}",
                self.id,
                addr
            );
            err
        })?;

        let mut state = self.state.lock();
        let header = load_header(&state.bytes, off);
        self.verify_magic(&header, off);

        if !header.in_use {
            drop(state);
            log_error!(
                ErrorCode::PoolInvalidFree,
                "pool {}: double free at 0x{:x}",
                self.id,
                addr
            );
            return Err(MemoryError::BlockNotInUse(addr));
        }

        set_in_use(&mut state.bytes, off, false);
        state.used_size -= BLOCK_HEADER_SIZE + header.size;

        let mut off = off;
        let mut header = header;

        // Coalesce with the previous block if it is free
        if header.prev != NO_BLOCK {
            let prev = load_header(&state.bytes, header.prev);
            self.verify_magic(&prev, header.prev);
            if !prev.in_use {
                let merged = prev.size + BLOCK_HEADER_SIZE + header.size;
                set_size(&mut state.bytes, header.prev, merged);
                set_next(&mut state.bytes, header.prev, header.next);
                if header.next != NO_BLOCK {
                    set_prev(&mut state.bytes, header.next, header.prev);
                }
                scrub_block(&mut state.bytes, off);
                off = header.prev;
                header = load_header(&state.bytes, off);
            }
        }

        // Coalesce with the next block if it is free
        if header.next != NO_BLOCK {
            let next = load_header(&state.bytes, header.next);
            self.verify_magic(&next, header.next);
            if !next.in_use {
                let merged = header.size + BLOCK_HEADER_SIZE + next.size;
                set_size(&mut state.bytes, off, merged);
                set_next(&mut state.bytes, off, next.next);
                if next.next != NO_BLOCK {
                    set_prev(&mut state.bytes, next.next, off);
                }
                scrub_block(&mut state.bytes, header.next);
            }
        }

        Ok(())
    }

    /// Resize in place when possible.
    ///
    /// Returns `Ok(Some(addr))` when the block was shrunk or grown without
    /// moving, `Ok(None)` when the caller must move the allocation, and an
    /// error for addresses that do not name an in-use block.
    pub fn try_realloc_in_place(
        &self,
        addr: Address,
        new_size: Size,
    ) -> MemoryResult<Option<Address>> {
        let new_size = aligned_size(new_size).max(MIN_BLOCK_SIZE);
        let off = self.block_offset(addr)?;

        let mut state = self.state.lock();
        let header = load_header(&state.bytes, off);
        self.verify_magic(&header, off);

        if !header.in_use {
            drop(state);
            log_error!(
                ErrorCode::PoolInvalidFree,
                "pool {}: realloc of freed block at 0x{:x}",
                self.id,
                addr
            );
            return Err(MemoryError::BlockNotInUse(addr));
        }

        // Shrink-in-place keeps the whole block; the contract stays simple.
        if new_size <= header.size {
            return Ok(Some(addr));
        }

        if header.next == NO_BLOCK {
            return Ok(None);
        }
        let next = load_header(&state.bytes, header.next);
        self.verify_magic(&next, header.next);

        let span = header.size + BLOCK_HEADER_SIZE + next.size;
        if next.in_use || span < new_size {
            return Ok(None);
        }

        // Absorb the free neighbor, splitting off a trailing remainder when
        // it is big enough to stand alone.
        scrub_block(&mut state.bytes, header.next);
        if span - new_size >= BLOCK_HEADER_SIZE + MIN_BLOCK_SIZE {
            let rem_off = off + (BLOCK_HEADER_SIZE + new_size) as u32;
            let rem_size = span - new_size - BLOCK_HEADER_SIZE;
            init_block(&mut state.bytes, rem_off, rem_size, false, next.next, off);
            if next.next != NO_BLOCK {
                set_prev(&mut state.bytes, next.next, rem_off);
            }
            set_next(&mut state.bytes, off, rem_off);
            set_size(&mut state.bytes, off, new_size);
            state.used_size += new_size - header.size;
        } else {
            set_size(&mut state.bytes, off, span);
            set_next(&mut state.bytes, off, next.next);
            if next.next != NO_BLOCK {
                set_prev(&mut state.bytes, next.next, off);
            }
            state.used_size += span - header.size;
        }

        Ok(Some(addr))
    }

    /// Payload size of an in-use block.
    pub fn payload_size(&self, addr: Address) -> MemoryResult<Size> {
        let off = self.block_offset(addr)?;
        let state = self.state.lock();
        let header = load_header(&state.bytes, off);
        self.verify_magic(&header, off);
        if !header.in_use {
            return Err(MemoryError::BlockNotInUse(addr));
        }
        Ok(header.size)
    }

    /// Merge every adjacent free pair in one pass. Idempotent; returns the
    /// number of merges performed.
    pub fn defragment(&self) -> usize {
        let mut state = self.state.lock();
        let mut merged = 0;
        let mut off = 0u32;

        loop {
            let header = load_header(&state.bytes, off);
            self.verify_magic(&header, off);

            if header.next == NO_BLOCK {
                break;
            }
            let next = load_header(&state.bytes, header.next);
            self.verify_magic(&next, header.next);

            if !header.in_use && !next.in_use {
                set_size(
                    &mut state.bytes,
                    off,
                    header.size + BLOCK_HEADER_SIZE + next.size,
                );
                set_next(&mut state.bytes, off, next.next);
                if next.next != NO_BLOCK {
                    set_prev(&mut state.bytes, next.next, off);
                }
                scrub_block(&mut state.bytes, header.next);
                merged += 1;
                // Stay on this block: the new neighbor may be free too.
                continue;
            }
            off = header.next;
        }

        merged
    }

    /// Copy `data` into an in-use block's payload. The whole write must fit
    /// inside one payload.
    pub fn write(&self, addr: Address, data: &[u8]) -> MemoryResult<()> {
        let mut state = self.state.lock();
        match self.locate_payload(&state, addr, data.len()) {
            Some((at, _)) => {
                state.bytes[at..at + data.len()].copy_from_slice(data);
                Ok(())
            }
            None => Err(MemoryError::InvalidAddress(addr)),
        }
    }

    /// Read `len` payload bytes starting at `addr`.
    pub fn read(&self, addr: Address, len: Size) -> MemoryResult<Vec<u8>> {
        let state = self.state.lock();
        match self.locate_payload(&state, addr, len) {
            Some((at, _)) => Ok(state.bytes[at..at + len].to_vec()),
            None => Err(MemoryError::InvalidAddress(addr)),
        }
    }

    /// Find the in-use block whose payload contains `[addr, addr + len)`;
    /// returns the buffer position and the owning block offset.
    fn locate_payload(&self, state: &PoolState, addr: Address, len: Size) -> Option<(usize, u32)> {
        if !self.contains(addr) {
            return None;
        }
        let mut off = 0u32;
        loop {
            let header = load_header(&state.bytes, off);
            self.verify_magic(&header, off);

            if header.in_use {
                let start = self.base + off as usize + BLOCK_HEADER_SIZE;
                let end = start + header.size;
                if addr >= start && addr + len <= end {
                    let at = off as usize + BLOCK_HEADER_SIZE + (addr - start);
                    return Some((at, off));
                }
            }

            if header.next == NO_BLOCK {
                return None;
            }
            off = header.next;
        }
    }

    /// Walk the chain and report per-pool statistics.
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        let mut block_count = 0;
        let mut free_block_count = 0;
        let mut largest_free_payload = 0;
        let mut off = 0u32;

        loop {
            let header = load_header(&state.bytes, off);
            self.verify_magic(&header, off);
            block_count += 1;
            if !header.in_use {
                free_block_count += 1;
                largest_free_payload = largest_free_payload.max(header.size);
            }
            if header.next == NO_BLOCK {
                break;
            }
            off = header.next;
        }

        PoolStats {
            total_size: self.total_size,
            used_size: state.used_size,
            block_count,
            free_block_count,
            largest_free_payload,
        }
    }

    /// Snapshot of the block chain in address order.
    pub fn blocks(&self) -> Vec<BlockInfo> {
        let state = self.state.lock();
        let mut out = Vec::new();
        let mut off = 0u32;
        loop {
            let header = load_header(&state.bytes, off);
            self.verify_magic(&header, off);
            out.push(BlockInfo {
                offset: off,
                payload_size: header.size,
                in_use: header.in_use,
            });
            if header.next == NO_BLOCK {
                break;
            }
            off = header.next;
        }
        out
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.id)
            .field("base", &format_args!("0x{:x}", self.base))
            .field("total_size", &self.total_size)
            .field("used_size", &self.state.lock().used_size)
            .finish()
    }
}
