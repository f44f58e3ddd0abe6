//! Error types reported by the pool.
//!
//! None of these errors are fatal by themselves: the pool is left untouched
//! whenever one of them is returned, so the caller is free to retry, to fall
//! back to another pool or to escalate to a panic.

/// An error returned by [`Pool::allocate()`](crate::Pool::allocate) or
/// [`Pool::deallocate()`](crate::Pool::deallocate).
///
/// Note, that there is no variant for a double free: such a free cannot be
/// detected without additional per-block bookkeeping. Freeing a block twice
/// silently corrupts the free list and is ruled out by the safety contract of
/// `deallocate()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// More bytes were requested than a single block can hold.
    #[error("requested {requested} bytes, but blocks are only {block_size} bytes large")]
    OversizedRequest {
        /// The number of requested bytes.
        requested: usize,
        /// The block size of the pool.
        block_size: usize,
    },
    /// Every block of the pool is currently handed out.
    #[error("all {block_count} blocks of the pool are in use")]
    OutOfMemory {
        /// The total number of blocks of the pool.
        block_count: usize,
    },
    /// A pointer outside of the pool memory was passed to `deallocate()`.
    #[error("address {address:#x} does not belong to the pool")]
    InvalidAddress {
        /// The rejected address.
        address: usize,
    },
    /// A pointer inside the pool memory but not at the start of a block was
    /// passed to `deallocate()`.
    #[error("offset {offset} into the pool is not a multiple of the block size {block_size}")]
    Misaligned {
        /// The offset of the pointer from the pool base address.
        offset: usize,
        /// The block size of the pool.
        block_size: usize,
    },
}

/// A pool configuration which violates the layout requirements.
///
/// Returned by [`Pool::try_new()`](crate::Pool::try_new). Its display text is
/// the panic message of [`Pool::new()`](crate::Pool::new).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The block cannot hold a free-list link.
    #[error("block size is too small: {block_size} < {minimum}")]
    BlockTooSmall {
        /// The configured block size.
        block_size: usize,
        /// The minimum block size.
        minimum: usize,
    },
    /// The block size is not a multiple of the minimum alignment.
    #[error("block size must be a multiple of {alignment}, got {block_size}")]
    BlockUnaligned {
        /// The configured block size.
        block_size: usize,
        /// The required alignment.
        alignment: usize,
    },
    /// A pool without blocks is useless.
    #[error("block count must not be zero")]
    NoBlocks,
    /// The block indices do not fit into a free-list link.
    #[error("too many blocks: {block_count} exceeds the maximum of {maximum}")]
    TooManyBlocks {
        /// The configured block count.
        block_count: usize,
        /// The maximum block count.
        maximum: usize,
    },
    /// `BLOCK_SIZE * BLOCK_COUNT` does not fit into an `usize`.
    #[error("pool size overflows: {block_size} * {block_count}")]
    PoolTooLarge {
        /// The configured block size.
        block_size: usize,
        /// The configured block count.
        block_count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, Error};

    #[test]
    fn display_messages() {
        let error = Error::OversizedRequest {
            requested: 9,
            block_size: 8,
        };
        assert_eq!(
            error.to_string(),
            "requested 9 bytes, but blocks are only 8 bytes large"
        );

        let error = Error::InvalidAddress { address: 0x1f };
        assert_eq!(error.to_string(), "address 0x1f does not belong to the pool");

        let error = ConfigError::BlockUnaligned {
            block_size: 6,
            alignment: 4,
        };
        assert_eq!(error.to_string(), "block size must be a multiple of 4, got 6");
    }
}
