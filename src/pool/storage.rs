use crate::Error;

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::mem::{self, MaybeUninit};
use core::ptr::NonNull;

/// The free-list link stored in the leading bytes of a free block.
///
/// The link is the index of the next free block or [`END`]. Indices are used
/// instead of addresses, so that the links stay valid if the storage is moved.
type Link = u32;

/// The end-of-list marker.
const END: Link = Link::MAX;

/// The number of bytes a free block needs to store its link.
pub(crate) const LINK_SIZE: usize = mem::size_of::<Link>();

/// The largest number of blocks, that can be addressed by a link.
pub(crate) const MAX_BLOCKS: usize = END as usize;

/// The alignment of the storage (and therefore of the first block).
pub(crate) const STORAGE_ALIGN: usize = mem::align_of::<Storage<4, 1>>();

/// The index of a block, that is validated and known to be in bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockIndex(u32);
impl BlockIndex {
    /// The numeric value of this index.
    pub(crate) const fn get(self) -> usize {
        self.0 as usize
    }

    /// Decode a link read from a free block.
    const fn from_link(link: Link) -> Option<Self> {
        if link == END {
            None
        } else {
            Some(Self(link))
        }
    }

    /// Encode an optional index as a link.
    const fn into_link(index: Option<Self>) -> Link {
        match index {
            Some(Self(index)) => index,
            None => END,
        }
    }
}

/// The memory backing a pool: `N` blocks of `B` bytes each.
///
/// The storage is only ever accessed through raw pointers derived from the
/// cell, so client code may write to allocated blocks while the pool keeps
/// reading the links of the free blocks. The memory starts uninitialized;
/// the links are written by [`link_all()`](Self::link_all) and blocks are
/// zeroed when they are handed out.
#[repr(C, align(8))]
pub(crate) struct Storage<const B: usize, const N: usize>(UnsafeCell<[[MaybeUninit<u8>; B]; N]>);
impl<const B: usize, const N: usize> Storage<B, N> {
    /// Create new, uninitialized storage.
    pub(crate) const fn new() -> Self {
        Self(UnsafeCell::new([[MaybeUninit::uninit(); B]; N]))
    }

    /// The address of the first byte of the first block.
    pub(crate) fn base(&self) -> NonNull<u8> {
        // SAFETY: the pointer of an `UnsafeCell` is derived from a reference to
        // the cell and therefore never null.
        unsafe { NonNull::new_unchecked(self.0.get().cast::<u8>()) }
    }

    /// The address of the block at the given index.
    pub(crate) fn block(&self, index: BlockIndex) -> NonNull<u8> {
        // SAFETY: a `BlockIndex` is in bounds, so the offset stays inside of
        // the storage.
        unsafe { self.base().add(index.get() * B) }
    }

    /// Translate an address into the index of the block starting there.
    ///
    /// This is a pure computation: the memory is not accessed. The address
    /// must lie inside of the storage and at the start of a block.
    pub(crate) fn index_of(&self, address: usize) -> Result<BlockIndex, Error> {
        let base = self.base().as_ptr() as usize;
        let offset = address
            .checked_sub(base)
            .filter(|&offset| offset < B * N)
            .ok_or(Error::InvalidAddress { address })?;
        if offset % B != 0 {
            return Err(Error::Misaligned {
                offset,
                block_size: B,
            });
        }

        // cannot truncate: `N` is less than `MAX_BLOCKS`
        Ok(BlockIndex((offset / B) as u32))
    }

    /// Link all blocks into a single free list and return its head.
    ///
    /// The list starts at the lowest block and runs towards the end of the
    /// storage.
    pub(crate) fn link_all(&mut self) -> Option<BlockIndex> {
        for index in 0..N {
            let next = (index + 1 < N).then(|| BlockIndex((index + 1) as u32));
            let index = BlockIndex(index as u32);
            // SAFETY: the storage is borrowed mutably, so no block is in use.
            unsafe { self.free_block(index) }.set_next(next);
        }
        (N > 0).then_some(BlockIndex(0))
    }

    /// View the block at the given index as a free block.
    ///
    /// # Safety
    /// The block has to be free, i.e. not handed out to a client, and the
    /// caller must have exclusive access to the free list (be inside of the
    /// critical section).
    pub(crate) unsafe fn free_block(&self, index: BlockIndex) -> FreeBlock<'_> {
        FreeBlock {
            link: self.block(index).cast::<Link>(),
            _storage: PhantomData,
        }
    }

    /// Iterate over the free list starting at `head`.
    ///
    /// # Safety
    /// `head` must be the head of the free list of this storage and the caller
    /// must have exclusive access to the free list for the lifetime of the
    /// iterator.
    pub(crate) unsafe fn free_blocks(&self, head: Option<BlockIndex>) -> FreeBlocks<'_, B, N> {
        FreeBlocks {
            storage: self,
            current: head,
        }
    }

    /// Overwrite the whole block with zeroes.
    ///
    /// # Safety
    /// The caller must own the block, i.e. it was just removed from the free
    /// list and not yet handed out.
    pub(crate) unsafe fn zero(&self, index: BlockIndex) {
        self.block(index).as_ptr().write_bytes(0, B);
    }
}

/// A free block, whose leading bytes store the link to the next free block.
///
/// This view is the only place where memory of the pool is interpreted as a
/// [`Link`]. It can only be obtained for blocks known to be free.
pub(crate) struct FreeBlock<'storage> {
    link: NonNull<Link>,
    _storage: PhantomData<&'storage ()>,
}
impl FreeBlock<'_> {
    /// The next free block after this one.
    pub(crate) fn next(&self) -> Option<BlockIndex> {
        // SAFETY: blocks start at multiples of the block size (itself a
        // multiple of 4) from the 8-aligned base, so the link is aligned. A
        // free block always carries a valid link.
        BlockIndex::from_link(unsafe { self.link.as_ptr().read() })
    }

    /// Change the next free block after this one.
    pub(crate) fn set_next(&mut self, next: Option<BlockIndex>) {
        // SAFETY: see `next()`; free blocks belong to the pool.
        unsafe { self.link.as_ptr().write(BlockIndex::into_link(next)) }
    }
}

/// An iterator over the blocks of a free list.
pub(crate) struct FreeBlocks<'storage, const B: usize, const N: usize> {
    storage: &'storage Storage<B, N>,
    current: Option<BlockIndex>,
}
impl<const B: usize, const N: usize> Iterator for FreeBlocks<'_, B, N> {
    type Item = BlockIndex;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        // SAFETY: every block on the free list is free and the creator of the
        // iterator guarantees exclusive access.
        self.current = unsafe { self.storage.free_block(current) }.next();
        Some(current)
    }
}
