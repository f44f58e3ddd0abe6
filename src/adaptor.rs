//! A typed view onto a pool for containers, that allocate elements.
use crate::port::Port;
use crate::{Error, Pool};

use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ptr::NonNull;

/// Allocates arrays of `T` from a [`Pool`].
///
/// A request for `count` elements is translated into a request for
/// `count * size_of::<T>()` bytes, so a single allocation can hold at most
/// [`max_count()`](Self::max_count) elements. Two adaptors compare equal if
/// they allocate from the same pool, regardless of their element types.
///
/// ```
/// use blockpool::{adaptor::PoolAdaptor, port::NoopPort, Pool};
///
/// let pool = Pool::<64, 2, _>::new(NoopPort);
/// let words = PoolAdaptor::<u32, 64, 2, _>::new(&pool);
/// assert_eq!(words.max_count(), 16);
///
/// let array = words.allocate(10).unwrap();
/// // SAFETY: the block is large enough and zero-initialized
/// let array = unsafe { core::slice::from_raw_parts_mut(array.as_ptr(), 10) };
/// array[9] = 42;
/// # unsafe { words.deallocate(core::ptr::NonNull::from(&mut array[0]), 10).unwrap() };
///
/// assert_eq!(words, words.rebind::<u8>());
/// ```
pub struct PoolAdaptor<'pool, T, const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: Port> {
    pool: &'pool Pool<BLOCK_SIZE, BLOCK_COUNT, P>,
    _element: PhantomData<fn() -> T>,
}
impl<'pool, T, const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: Port>
    PoolAdaptor<'pool, T, BLOCK_SIZE, BLOCK_COUNT, P>
{
    /// Create an adaptor allocating from the given pool.
    ///
    /// Element types with a larger alignment than the blocks of the pool
    /// ([`Pool::BLOCK_ALIGN`]) are rejected at compile time.
    pub const fn new(pool: &'pool Pool<BLOCK_SIZE, BLOCK_COUNT, P>) -> Self {
        const {
            assert!(
                mem::align_of::<T>() <= Pool::<BLOCK_SIZE, BLOCK_COUNT, P>::BLOCK_ALIGN,
                "element type is over-aligned for the blocks of the pool"
            );
        }
        Self {
            pool,
            _element: PhantomData,
        }
    }

    /// Obtain an adaptor for another element type allocating from the same
    /// pool.
    pub const fn rebind<U>(&self) -> PoolAdaptor<'pool, U, BLOCK_SIZE, BLOCK_COUNT, P> {
        PoolAdaptor::new(self.pool)
    }

    /// The pool this adaptor allocates from.
    pub const fn pool(&self) -> &'pool Pool<BLOCK_SIZE, BLOCK_COUNT, P> {
        self.pool
    }

    /// The maximum number of elements per allocation.
    pub const fn max_count(&self) -> usize {
        match mem::size_of::<T>() {
            0 => usize::MAX,
            size => BLOCK_SIZE / size,
        }
    }

    /// Allocate a zero-initialized array of `count` elements.
    ///
    /// # Errors
    /// The errors of [`Pool::allocate()`]. A `count` whose byte size overflows
    /// is reported as [`Error::OversizedRequest`].
    pub fn allocate(&self, count: usize) -> Result<NonNull<T>, Error> {
        let size = count
            .checked_mul(mem::size_of::<T>())
            .ok_or(Error::OversizedRequest {
                requested: usize::MAX,
                block_size: BLOCK_SIZE,
            })?;
        self.pool.allocate(size).map(NonNull::cast)
    }

    /// Return an array of `count` elements to the pool.
    ///
    /// The elements are not dropped.
    ///
    /// # Errors
    /// The errors of [`Pool::deallocate()`].
    ///
    /// # Safety
    /// See [`Pool::deallocate()`].
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, count: usize) -> Result<(), Error> {
        let size = count.saturating_mul(mem::size_of::<T>());
        self.pool.deallocate(ptr.as_ptr().cast(), size)
    }
}

impl<T, const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: Port> Clone
    for PoolAdaptor<'_, T, BLOCK_SIZE, BLOCK_COUNT, P>
{
    fn clone(&self) -> Self {
        *self
    }
}
impl<T, const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: Port> Copy
    for PoolAdaptor<'_, T, BLOCK_SIZE, BLOCK_COUNT, P>
{
}

impl<T, U, const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: Port>
    PartialEq<PoolAdaptor<'_, U, BLOCK_SIZE, BLOCK_COUNT, P>>
    for PoolAdaptor<'_, T, BLOCK_SIZE, BLOCK_COUNT, P>
{
    fn eq(&self, other: &PoolAdaptor<'_, U, BLOCK_SIZE, BLOCK_COUNT, P>) -> bool {
        self.pool.pool_base_address() == other.pool.pool_base_address()
    }
}
impl<T, const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: Port> Eq
    for PoolAdaptor<'_, T, BLOCK_SIZE, BLOCK_COUNT, P>
{
}

impl<T, const BLOCK_SIZE: usize, const BLOCK_COUNT: usize, P: Port> fmt::Debug
    for PoolAdaptor<'_, T, BLOCK_SIZE, BLOCK_COUNT, P>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAdaptor")
            .field("element", &core::any::type_name::<T>())
            .field("pool", &self.pool.pool_base_address())
            .finish()
    }
}
