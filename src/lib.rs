//! Deterministic fixed-size block allocator for embedded systems
//!
//! This crate provides a [`Pool`]: a fixed number of equally sized blocks in
//! a single contiguous memory region, that is reserved once and never
//! resized. Allocation and deallocation are `O(1)` and cannot fragment the
//! memory, which makes the pool a good fit for real-time systems, interrupt
//! handlers and other places where a general purpose heap is not acceptable.
//! The crate is `#![no_std]` and does not need a heap itself.
//!
//! # Usage
//! Pick a block size and count and the [`Port`](port::Port) matching your
//! execution environment:
//! ```
//! use blockpool::{port::SpinPort, Pool};
//!
//! // 10 blocks of 8 bytes, shareable between threads
//! let pool = Pool::<8, 10, _>::new(SpinPort::new());
//!
//! let block = pool.allocate(8).unwrap();
//! assert_eq!(pool.free_block_count(), 9);
//!
//! // SAFETY: the block is not used anymore
//! unsafe { pool.deallocate(block.as_ptr(), 8).unwrap() };
//! ```
//! The pool is an ordinary value: own it and pass references to whoever needs
//! it. If there is no natural owner, the [`shared`]-module provides pools,
//! that are created on first use.
//!
//! A pool can also serve as the [`GlobalAlloc`](core::alloc::GlobalAlloc) of
//! a program, whose allocations all fit into one block. The pool is then
//! created by the first allocation:
//! ```no_run
//! use blockpool::{port::SpinPort, shared::SharedPool};
//!
//! #[global_allocator]
//! static ALLOCATOR: SharedPool<256, 64, SpinPort> = SharedPool::new();
//! # fn main() {}
//! ```
//!
//! # Synchronization
//! Every pool is bound to a [`Port`](port::Port), a pair of functions entering
//! and leaving a critical section. The crate ships a [`NoopPort`](port::NoopPort)
//! for single-threaded systems, a [`SpinPort`](port::SpinPort) for threads and
//! an [`InterruptPort`](port::InterruptPort) for bare-metal systems sharing the
//! pool with interrupt handlers. Only pools with a port implementing
//! [`SyncPort`](port::SyncPort) can be shared between threads.
//!
//! # Implementation
//! The pool memory consists of `BLOCK_COUNT` blocks of `BLOCK_SIZE` bytes.
//! Every free block stores the index of the next free block in its first
//! four bytes, so the free blocks form a singly linked list without any memory
//! overhead:
//! ```text
//!  block 0    block 1    block 2    block 3
//! +----------+----------+----------+----------+
//! | next: 2  | (in use) | next: 3  | next: -  |
//! +----------+----------+----------+----------+
//!   ^ head
//! ```
//! Allocating pops the head of the list, zeroes the whole block and returns
//! it. Deallocating validates, that the pointer is the start of a block of this
//! pool, and pushes the block back onto the list. Hence the most recently
//! freed block is the next one to be handed out.
//!
//! Note, that double frees are _not_ detected: this would need additional
//! bookkeeping per block. Freeing a block twice corrupts the free list, which
//! is why [`Pool::deallocate()`] is `unsafe`.
#![cfg_attr(not(test), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod adaptor;
mod error;
mod pool;
pub mod port;
pub mod shared;

pub use error::{ConfigError, Error};
pub use pool::{Pool, MIN_ALIGNMENT};
