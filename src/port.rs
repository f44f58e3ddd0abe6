//! The synchronization port of a pool.
//!
//! A [`Port`] is the only thing a [`Pool`](crate::Pool) knows about its
//! environment: a pair of functions entering and leaving a critical section.
//! What a critical section means is entirely up to the port: on a
//! single-threaded system it might be nothing at all ([`NoopPort`]), on a host
//! with preemptive threads it is a lock ([`SpinPort`]) and on a bare-metal
//! system sharing the pool with interrupt handlers it masks the interrupts
//! ([`InterruptPort`]).
//!
//! The pool brackets every access to its free list with exactly one call to
//! [`Port::enter()`] and one call to [`Port::exit()`]. The sections are never
//! nested and are kept as short as possible: no validation, no logging and no
//! zeroing of memory happens while a section is held.
use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};

/// A pair of functions providing mutual exclusion for a pool.
///
/// Every call to [`enter()`](Self::enter) is followed by exactly one call to
/// [`exit()`](Self::exit) from the same context. Implementations don't need
/// to support nesting.
///
/// This trait itself makes no promise about thread-safety: a pool is only
/// shareable between threads if its port implements [`SyncPort`].
#[cfg_attr(test, mockall::automock)]
pub trait Port {
    /// Enter the critical section.
    ///
    /// This may block until no other context is inside of the critical
    /// section of this port.
    fn enter(&self);

    /// Leave the critical section entered by the last call to
    /// [`enter()`](Self::enter).
    fn exit(&self);
}

impl<P: Port + ?Sized> Port for &P {
    fn enter(&self) {
        (**self).enter();
    }

    fn exit(&self) {
        (**self).exit();
    }
}

/// A [`Port`], whose critical sections exclude each other across all threads
/// and interrupt contexts, which can access the port.
///
/// # Safety
/// Implementors must guarantee, that between a call to [`Port::enter()`] and
/// the matching call to [`Port::exit()`] no other context executes code
/// between `enter()` and `exit()` of the same port. A [`Pool`](crate::Pool)
/// relies on this to implement [`Sync`].
pub unsafe trait SyncPort: Port + Sync {}

// SAFETY: a shared reference calls into the very same port
unsafe impl<P: SyncPort + ?Sized> SyncPort for &P {}

/// A scoped critical section.
///
/// The section is entered on construction and left when the guard is dropped,
/// i.e. on every path out of the scope, including early returns.
pub(crate) struct Section<'port, P: Port + ?Sized> {
    port: &'port P,
}
impl<'port, P: Port + ?Sized> Section<'port, P> {
    /// Enter the critical section of the given port.
    pub(crate) fn enter(port: &'port P) -> Self {
        port.enter();
        Self { port }
    }
}
impl<P: Port + ?Sized> Drop for Section<'_, P> {
    fn drop(&mut self) {
        self.port.exit();
    }
}

/// A port without any synchronization.
///
/// This is the right choice for single-threaded or purely cooperative
/// systems, where no other context can ever interrupt a pool operation. A pool
/// with this port does not implement [`Sync`], so the compiler rejects
/// sharing it between threads.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoopPort;
impl Port for NoopPort {
    fn enter(&self) {}

    fn exit(&self) {}
}

/// A port guarding the pool with a spin lock.
///
/// This is the port for preemptive multi-threaded hosts or RTOS tasks. The
/// critical sections of a pool are short (a couple of pointer operations), so
/// spinning is cheaper than parking a thread. Note, that this port must not be
/// used if interrupt handlers access the pool: an interrupt spinning on a lock
/// held by the interrupted code deadlocks. Use an [`InterruptPort`] then.
#[derive(Debug, Default)]
pub struct SpinPort {
    lock: spin::Mutex<()>,
}
impl SpinPort {
    /// Create a new, unlocked port.
    pub const fn new() -> Self {
        Self {
            lock: spin::Mutex::new(()),
        }
    }

    /// Query, whether some context is currently inside the critical section.
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}
impl Port for SpinPort {
    fn enter(&self) {
        // the guard is replaced by the explicit unlock in `exit()`
        core::mem::forget(self.lock.lock());
    }

    fn exit(&self) {
        // SAFETY: the `Port` contract pairs every `exit()` with a preceding
        // `enter()` of the same context, which holds the lock.
        unsafe { self.lock.force_unlock() };
    }
}
// SAFETY: the spin lock excludes every other context until `exit()`
unsafe impl SyncPort for SpinPort {}

/// The interrupt masking primitives of a platform.
///
/// `mask()` disables all (relevant) interrupts and reports, whether they were
/// enabled before. `restore()` re-enables them if the given state says so. On
/// a Cortex-M these are thin wrappers around the `PRIMASK` handling of the
/// `cortex-m` crate:
/// ```
/// # mod cortex_m { pub mod register { pub mod primask { pub fn read() -> bool { true } } } pub mod interrupt { pub fn disable() {} pub unsafe fn enable() {} } }
/// use blockpool::port::{InterruptControl, InterruptPort};
///
/// struct Primask;
/// // SAFETY: single-core target, the pool is only shared with interrupts.
/// unsafe impl InterruptControl for Primask {
///     fn mask() -> bool {
///         let was_enabled = cortex_m::register::primask::read();
///         cortex_m::interrupt::disable();
///         was_enabled
///     }
///
///     fn restore(was_enabled: bool) {
///         if was_enabled {
///             unsafe { cortex_m::interrupt::enable() };
///         }
///     }
/// }
///
/// static PORT: InterruptPort<Primask> = InterruptPort::new();
/// ```
///
/// # Safety
/// Masking interrupts must exclude every other context that accesses a pool
/// bound to an [`InterruptPort`] using these primitives. This is the case on
/// single-core systems, but _not_ on multi-core systems, where another core
/// keeps running.
pub unsafe trait InterruptControl {
    /// Disable interrupts and report, whether they were enabled before.
    fn mask() -> bool;

    /// Re-enable interrupts, if they were enabled before the matching
    /// [`mask()`](Self::mask).
    fn restore(was_enabled: bool);
}

/// A port masking interrupts during the critical sections.
///
/// This is the port for bare-metal systems, where interrupt handlers share a
/// pool with the main program. The masking itself is provided by the
/// platform via [`InterruptControl`]. A section entered with interrupts
/// already masked leaves them masked on exit.
pub struct InterruptPort<I> {
    was_enabled: AtomicBool,
    _interrupts: PhantomData<fn() -> I>,
}
impl<I: InterruptControl> InterruptPort<I> {
    /// Create a new port.
    pub const fn new() -> Self {
        Self {
            was_enabled: AtomicBool::new(false),
            _interrupts: PhantomData,
        }
    }
}
impl<I: InterruptControl> Default for InterruptPort<I> {
    fn default() -> Self {
        Self::new()
    }
}
impl<I> fmt::Debug for InterruptPort<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptPort")
            .field("was_enabled", &self.was_enabled)
            .finish()
    }
}
impl<I: InterruptControl> Port for InterruptPort<I> {
    fn enter(&self) {
        let was_enabled = I::mask();
        // nobody else runs now, so relaxed ordering is sufficient
        self.was_enabled.store(was_enabled, Ordering::Relaxed);
    }

    fn exit(&self) {
        I::restore(self.was_enabled.load(Ordering::Relaxed));
    }
}
// SAFETY: the implementor of `InterruptControl` guarantees, that masking
// interrupts excludes every other context.
unsafe impl<I: InterruptControl> SyncPort for InterruptPort<I> {}
