//! This module provides the pool engine and its support types.
//!
//! A pool owns `BLOCK_COUNT` blocks of `BLOCK_SIZE` bytes each. The free
//! blocks are chained into an intrusive, singly linked list: the leading bytes
//! of every free block store the index of the next free one. Allocation pops
//! the head of the list, deallocation pushes onto it, so both operations are
//! `O(1)` and the most recently freed block is the next to be handed out.
mod storage;

use self::storage::{BlockIndex, Storage, LINK_SIZE, MAX_BLOCKS, STORAGE_ALIGN};
use crate::port::{Port, Section, SyncPort};
use crate::{ConfigError, Error};

use core::alloc::{GlobalAlloc, Layout};
use core::cell::UnsafeCell;
use core::fmt;
use core::ptr::{self, NonNull};

/// The minimum alignment every block size has to be a multiple of.
pub const MIN_ALIGNMENT: usize = 4;

/// A pool of `BLOCK_COUNT` fixed-size blocks of `BLOCK_SIZE` bytes each.
///
/// The pool memory is part of the pool value itself, so a pool placed in a
/// `static` lives in the `.bss`-section and a pool on the stack lives on the
/// stack. All accesses to the free list are serialized by the [`Port`] `P`,
/// which is bound to the pool for its whole lifetime.
///
/// ```
/// use blockpool::{port::NoopPort, Error, Pool};
///
/// let pool = Pool::<64, 4, _>::new(NoopPort);
/// let block = pool.allocate(48)?;
/// assert_eq!(pool.free_block_count(), 3);
///
/// // SAFETY: the block was allocated from this pool and is not used anymore
/// unsafe { pool.deallocate(block.as_ptr(), 48)? };
/// assert_eq!(pool.free_block_count(), 4);
/// # Ok::<(), Error>(())
/// ```
///
/// Note, that moving the pool moves the blocks as well. Blocks handed out
/// before the move are not part of the pool anymore and will be rejected by
/// [`deallocate()`](Self::deallocate). Keep pools, that have blocks handed
/// out, in place (e.g. in a `static` or behind a reference).
pub struct Pool<const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: Port> {
    storage: Storage<BLOCK_SIZE, BLOCK_COUNT>,
    /// The first free block. Only accessed inside of a critical section.
    head: UnsafeCell<Option<BlockIndex>>,
    port: P,
}

// SAFETY: the shared state (the free list) is only ever accessed inside of a
// critical section of the port, which excludes all other contexts.
unsafe impl<const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: SyncPort> Sync
    for Pool<BLOCK_SIZE, BLOCK_COUNT, P>
{
}

impl<const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: Port> Pool<BLOCK_SIZE, BLOCK_COUNT, P> {
    /// The alignment every block is guaranteed to have.
    ///
    /// This is the largest power of two dividing the block size, but at most
    /// the alignment of the pool memory (8).
    pub const BLOCK_ALIGN: usize = {
        let lowest_bit = BLOCK_SIZE & BLOCK_SIZE.wrapping_neg();
        if lowest_bit == 0 || lowest_bit > STORAGE_ALIGN {
            STORAGE_ALIGN
        } else {
            lowest_bit
        }
    };

    /// Create a new pool bound to the given port.
    ///
    /// All blocks are free afterwards. The free list is built inside of a
    /// single critical section of the port.
    ///
    /// # Panics
    /// This function panics if the configuration is invalid, i.e. if the block
    /// size is less than 4 or not a multiple of 4, if there are no blocks at
    /// all or too many of them. See [`try_new()`](Self::try_new) for a version
    /// reporting the error instead.
    pub fn new(port: P) -> Self {
        match Self::try_new(port) {
            Ok(pool) => pool,
            Err(error) => panic!("{error}"),
        }
    }

    /// Create a new pool bound to the given port, if the configuration is
    /// valid.
    ///
    /// The configuration is checked before the port is used at all.
    pub fn try_new(port: P) -> Result<Self, ConfigError> {
        Self::validate()?;

        let mut pool = Self {
            storage: Storage::new(),
            head: UnsafeCell::new(None),
            port,
        };
        {
            let _section = Section::enter(&pool.port);
            *pool.head.get_mut() = pool.storage.link_all();
        }
        // no address here: the pool is moved into place by the caller
        log::debug!("created pool of {} blocks of {} bytes", BLOCK_COUNT, BLOCK_SIZE);
        Ok(pool)
    }

    /// Check the block size and count.
    const fn validate() -> Result<(), ConfigError> {
        if BLOCK_SIZE < LINK_SIZE {
            return Err(ConfigError::BlockTooSmall {
                block_size: BLOCK_SIZE,
                minimum: LINK_SIZE,
            });
        }
        if BLOCK_SIZE % MIN_ALIGNMENT != 0 {
            return Err(ConfigError::BlockUnaligned {
                block_size: BLOCK_SIZE,
                alignment: MIN_ALIGNMENT,
            });
        }
        if BLOCK_COUNT == 0 {
            return Err(ConfigError::NoBlocks);
        }
        if BLOCK_COUNT >= MAX_BLOCKS {
            return Err(ConfigError::TooManyBlocks {
                block_count: BLOCK_COUNT,
                maximum: MAX_BLOCKS - 1,
            });
        }
        if BLOCK_SIZE.checked_mul(BLOCK_COUNT).is_none() {
            return Err(ConfigError::PoolTooLarge {
                block_size: BLOCK_SIZE,
                block_count: BLOCK_COUNT,
            });
        }
        Ok(())
    }

    /// Allocate a block for `size` bytes.
    ///
    /// The most recently freed block is handed out first. The whole block (not
    /// only `size` bytes) is filled with zeroes, so no data of a previous user
    /// of the block leaks.
    ///
    /// # Errors
    /// - [`Error::OversizedRequest`] if `size` exceeds the block size. The
    ///   port is not used in this case.
    /// - [`Error::OutOfMemory`] if all blocks are handed out.
    pub fn allocate(&self, size: usize) -> Result<NonNull<u8>, Error> {
        if size > BLOCK_SIZE {
            return Err(Error::OversizedRequest {
                requested: size,
                block_size: BLOCK_SIZE,
            });
        }

        let block = {
            let _section = Section::enter(&self.port);
            // SAFETY: the free list is only accessed inside of the section
            let head = unsafe { &mut *self.head.get() };
            let block = *head;
            if let Some(block) = block {
                // SAFETY: the head of the free list is a free block
                *head = unsafe { self.storage.free_block(block) }.next();
            }
            block
        };
        let Some(block) = block else {
            log::warn!(
                "pool of {} blocks of {} bytes is exhausted",
                BLOCK_COUNT,
                BLOCK_SIZE
            );
            return Err(Error::OutOfMemory {
                block_count: BLOCK_COUNT,
            });
        };

        // SAFETY: the block was just removed from the free list, so it is
        // owned by this call.
        unsafe { self.storage.zero(block) };
        let address = self.storage.block(block);
        log::trace!("allocated block {} at {address:p} for {size} bytes", block.get());
        Ok(address)
    }

    /// Return a block to the pool.
    ///
    /// The `size` is the size the block was requested with. It is not needed
    /// to find the block and only used for diagnostics. Deallocating a null
    /// pointer does nothing.
    ///
    /// # Errors
    /// - [`Error::InvalidAddress`] if `ptr` does not point into the pool.
    /// - [`Error::Misaligned`] if `ptr` points into the pool, but not to the
    ///   start of a block.
    ///
    /// In both cases the pool is left untouched and the port is not used.
    ///
    /// # Safety
    /// If `ptr` points to a block of this pool, that block must have been
    /// handed out by [`allocate()`](Self::allocate) and must not be used
    /// anymore after this call. In particular, freeing the same block twice is
    /// _not_ detected: the block would be put on the free list twice and
    /// later handed out to two clients at once.
    pub unsafe fn deallocate(&self, ptr: *mut u8, size: usize) -> Result<(), Error> {
        if ptr.is_null() {
            return Ok(());
        }

        let block = match self.storage.index_of(ptr as usize) {
            Ok(block) => block,
            Err(error) => {
                log::warn!("rejected deallocation of {ptr:p} ({size} bytes): {error}");
                return Err(error);
            }
        };

        {
            let _section = Section::enter(&self.port);
            // SAFETY: the free list is only accessed inside of the section
            let head = &mut *self.head.get();
            // SAFETY: the caller returns ownership of the block
            self.storage.free_block(block).set_next(*head);
            *head = Some(block);
        }
        log::trace!("freed block {} at {ptr:p} ({size} bytes)", block.get());
        Ok(())
    }

    /// Count the blocks currently on the free list.
    ///
    /// This walks the whole free list inside of a critical section, so it takes
    /// time proportional to the number of free blocks. It is meant for
    /// diagnostics and tests.
    pub fn free_block_count(&self) -> usize {
        let _section = Section::enter(&self.port);
        // SAFETY: the free list is only accessed inside of the section
        let head = unsafe { *self.head.get() };
        // SAFETY: the section is held for the lifetime of the iterator
        unsafe { self.storage.free_blocks(head) }.count()
    }

    /// The address of the first block of the pool.
    ///
    /// The address never changes as long as the pool isn't moved, so the port
    /// is not needed. Two handles refer to the same pool if and only if they
    /// report the same base address.
    pub fn pool_base_address(&self) -> NonNull<u8> {
        self.storage.base()
    }

    /// Query, whether the pointer points into the memory of this pool.
    pub fn contains(&self, ptr: *const u8) -> bool {
        let base = self.storage.base().as_ptr() as usize;
        (ptr as usize)
            .checked_sub(base)
            .is_some_and(|offset| offset < self.pool_size())
    }

    /// The size of every block in bytes.
    pub const fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    /// The number of blocks in the pool.
    pub const fn block_count(&self) -> usize {
        BLOCK_COUNT
    }

    /// The size of the whole pool memory in bytes.
    pub const fn pool_size(&self) -> usize {
        BLOCK_SIZE * BLOCK_COUNT
    }

    /// The port this pool is bound to.
    pub const fn port(&self) -> &P {
        &self.port
    }
}

impl<const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: Port + fmt::Debug> fmt::Debug
    for Pool<BLOCK_SIZE, BLOCK_COUNT, P>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("block_size", &BLOCK_SIZE)
            .field("block_count", &BLOCK_COUNT)
            .field("base", &self.storage.base())
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

// SAFETY: `alloc` hands out distinct, currently unused blocks of at least
// `layout.size()` bytes, aligned to `layout.align()`, or null. The pool is
// `Sync` thanks to the `SyncPort`.
unsafe impl<const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: SyncPort> GlobalAlloc
    for Pool<BLOCK_SIZE, BLOCK_COUNT, P>
{
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > Self::BLOCK_ALIGN {
            return ptr::null_mut();
        }
        self.allocate(layout.size())
            .map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // allocators must not unwind: a rejected pointer was already logged
        let _ = self.deallocate(ptr, layout.size());
    }
}
