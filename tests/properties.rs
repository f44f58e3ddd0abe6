//! Property tests: arbitrary sequences of allocations and deallocations keep
//! the free list consistent with the blocks held by the client.
use blockpool::port::NoopPort;
use blockpool::{Error, Pool};

use core::ptr::NonNull;
use proptest::prelude::*;

const BLOCK_SIZE: usize = 16;
const BLOCK_COUNT: usize = 12;

#[derive(Debug, Clone)]
enum Operation {
    /// Allocate the given number of bytes.
    Allocate(usize),
    /// Free the held block with the given index (modulo the number of held
    /// blocks).
    Free(usize),
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        (0..=BLOCK_SIZE + 4).prop_map(Operation::Allocate),
        any::<usize>().prop_map(Operation::Free),
    ]
}

proptest! {
    #[test]
    fn free_count_matches_held_blocks(operations in prop::collection::vec(operation(), 0..200)) {
        let pool = Pool::<BLOCK_SIZE, BLOCK_COUNT, _>::new(NoopPort);
        let mut held: Vec<NonNull<u8>> = Vec::new();

        for operation in operations {
            match operation {
                Operation::Allocate(size) => match pool.allocate(size) {
                    Ok(block) => {
                        prop_assert!(size <= BLOCK_SIZE);
                        prop_assert!(!held.contains(&block));
                        held.push(block);
                    }
                    Err(Error::OversizedRequest { .. }) => prop_assert!(size > BLOCK_SIZE),
                    Err(Error::OutOfMemory { .. }) => prop_assert_eq!(held.len(), BLOCK_COUNT),
                    Err(error) => prop_assert!(false, "unexpected error {error}"),
                },
                Operation::Free(index) if !held.is_empty() => {
                    let block = held.swap_remove(index % held.len());
                    prop_assert_eq!(unsafe { pool.deallocate(block.as_ptr(), 1) }, Ok(()));

                    // the freed block is the next to be handed out
                    let again = pool.allocate(BLOCK_SIZE);
                    prop_assert_eq!(again, Ok(block));
                    unsafe { pool.deallocate(block.as_ptr(), BLOCK_SIZE) }.unwrap();
                }
                Operation::Free(_) => {}
            }
            prop_assert_eq!(pool.free_block_count(), BLOCK_COUNT - held.len());
        }
    }

    #[test]
    fn only_block_starts_are_accepted(offset in 0..BLOCK_SIZE * BLOCK_COUNT) {
        let pool = Pool::<BLOCK_SIZE, BLOCK_COUNT, _>::new(NoopPort);
        let blocks: Vec<_> = (0..BLOCK_COUNT).map(|_| pool.allocate(BLOCK_SIZE).unwrap()).collect();
        let ptr = pool.pool_base_address().as_ptr().wrapping_add(offset);

        let result = unsafe { pool.deallocate(ptr, BLOCK_SIZE) };
        if offset % BLOCK_SIZE == 0 {
            prop_assert_eq!(result, Ok(()));
            prop_assert_eq!(pool.free_block_count(), 1);
            prop_assert!(blocks.contains(&NonNull::new(ptr).unwrap()));
        } else {
            prop_assert_eq!(result, Err(Error::Misaligned { offset, block_size: BLOCK_SIZE }));
            prop_assert_eq!(pool.free_block_count(), 0);
        }
    }
}
