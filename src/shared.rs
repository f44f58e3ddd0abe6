//! Shared, construct-on-first-use access to pools.
//!
//! The default way to use a [`Pool`] is to own it and hand out references to
//! whoever needs it. Sometimes there is no natural owner, e.g. when a pool
//! backs a `static` or is reached from interrupt handlers. For those cases
//! this module offers two opt-in wrappers over the owned pool:
//! - [`SharedPool`], a `const`-constructible cell for a `static`, which creates
//!   its pool on first access, and
//! - [`instance()`] (requires the `alloc` feature), a process-wide registry,
//!   which holds at most one pool per distinct configuration.
use crate::port::{Port, SyncPort};
use crate::Pool;

use core::alloc::{GlobalAlloc, Layout};
use core::fmt;

/// A pool, which is created on first use.
///
/// ```
/// use blockpool::{port::SpinPort, shared::SharedPool};
///
/// static POOL: SharedPool<512, 4, SpinPort> = SharedPool::new();
///
/// let block = POOL.get().allocate(100).unwrap();
/// assert_eq!(POOL.get().free_block_count(), 3);
/// # unsafe { POOL.get().deallocate(block.as_ptr(), 100).unwrap() };
/// ```
///
/// The port is created with [`Default`] when the pool is created. A static
/// `SharedPool` is all zeroes until then, so it is placed in the `.bss`-section
/// and does not occupy flash memory on embedded targets. Note, that the pool
/// is built on the stack before it is moved into place, so the stack must be
/// large enough to hold it once.
pub struct SharedPool<const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: Port + Default> {
    pool: spin::Once<Pool<BLOCK_SIZE, BLOCK_COUNT, P>>,
}
impl<const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: Port + Default> Default
    for SharedPool<BLOCK_SIZE, BLOCK_COUNT, P>
{
    fn default() -> Self {
        Self::new()
    }
}
impl<const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: Port + Default>
    SharedPool<BLOCK_SIZE, BLOCK_COUNT, P>
{
    /// Create a new, not yet initialized pool.
    pub const fn new() -> Self {
        Self {
            pool: spin::Once::new(),
        }
    }

    /// Obtain the pool, creating it if this is the first access.
    ///
    /// Concurrent first accesses are serialized: exactly one of them creates
    /// the pool, the others wait for it.
    ///
    /// # Panics
    /// This function panics if the configuration of the pool is invalid (see
    /// [`Pool::new()`]).
    pub fn get(&self) -> &Pool<BLOCK_SIZE, BLOCK_COUNT, P> {
        let mut created = false;
        let pool = self.pool.call_once(|| {
            created = true;
            Pool::new(P::default())
        });
        if created {
            log::debug!("placed shared pool at {:p}", pool.pool_base_address());
        }
        pool
    }

    /// Obtain the pool, if it was already created.
    pub fn get_if_created(&self) -> Option<&Pool<BLOCK_SIZE, BLOCK_COUNT, P>> {
        self.pool.get()
    }
}
impl<const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P> fmt::Debug
    for SharedPool<BLOCK_SIZE, BLOCK_COUNT, P>
where
    P: Port + Default + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedPool")
            .field(&self.get_if_created())
            .finish()
    }
}

// SAFETY: forwards to the pool, which implements `GlobalAlloc` itself
unsafe impl<const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P> GlobalAlloc
    for SharedPool<BLOCK_SIZE, BLOCK_COUNT, P>
where
    P: SyncPort + Default + Send,
{
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.get().alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.get().dealloc(ptr, layout);
    }
}

/// Obtain the process-wide pool of the given configuration.
///
/// There is at most one pool per distinct combination of block size, block
/// count and port type. It is created (with the default port) on the first
/// request and lives until the end of the process. Two calls with the same
/// configuration always return the same pool:
/// ```
/// use blockpool::{port::SpinPort, shared};
///
/// let first = shared::instance::<8, 10, SpinPort>();
/// let second = shared::instance::<8, 10, SpinPort>();
/// assert_eq!(first.pool_base_address(), second.pool_base_address());
///
/// let other = shared::instance::<8, 11, SpinPort>();
/// assert_ne!(first.pool_base_address(), other.pool_base_address());
/// ```
///
/// # Panics
/// This function panics if the configuration of the pool is invalid (see
/// [`Pool::new()`]).
#[cfg(feature = "alloc")]
pub fn instance<const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P>(
) -> &'static Pool<BLOCK_SIZE, BLOCK_COUNT, P>
where
    P: SyncPort + Default + Send + 'static,
{
    use alloc::boxed::Box;
    use alloc::vec::Vec;
    use core::any::Any;

    static REGISTRY: spin::Mutex<Vec<&'static (dyn Any + Send + Sync)>> =
        spin::Mutex::new(Vec::new());

    let mut registry = REGISTRY.lock();
    let existing = registry
        .iter()
        .copied()
        .find_map(|pool| pool.downcast_ref::<Pool<BLOCK_SIZE, BLOCK_COUNT, P>>());
    if let Some(pool) = existing {
        return pool;
    }

    let pool: &'static Pool<BLOCK_SIZE, BLOCK_COUNT, P> =
        Box::leak(Box::new(Pool::new(P::default())));
    registry.push(pool);
    log::debug!(
        "registered shared pool of {} blocks of {} bytes at {:p} ({} in total)",
        BLOCK_COUNT,
        BLOCK_SIZE,
        pool.pool_base_address(),
        registry.len()
    );
    pool
}
