use blockpool::adaptor::PoolAdaptor;
use blockpool::port::NoopPort;
use blockpool::{Error, Pool};

use core::ptr::NonNull;
use core::slice;

const BUFFER_SIZE: usize = 512;

/// View an allocated block as a byte buffer.
///
/// # Safety
/// The block has to be allocated and large enough.
unsafe fn buffer<'a>(block: NonNull<u8>) -> &'a mut [u8] {
    slice::from_raw_parts_mut(block.as_ptr(), BUFFER_SIZE)
}

fn fill(buffer: &mut [u8], shift: u8) {
    for (i, byte) in buffer.iter_mut().enumerate() {
        *byte = (i as u8).wrapping_add(shift);
    }
}

fn check(buffer: &[u8], shift: u8) {
    for (i, &byte) in buffer.iter().enumerate() {
        assert_eq!(byte, (i as u8).wrapping_add(shift), "byte {i}");
    }
}

#[test]
fn exhaust_and_refill() {
    let pool = Pool::<8, 10, _>::new(NoopPort);
    assert_eq!(pool.free_block_count(), 10);

    let mut blocks = Vec::new();
    for _ in 0..6 {
        blocks.push(pool.allocate(8).unwrap());
    }
    assert_eq!(pool.free_block_count(), 4);

    let sixth = blocks.pop().unwrap();
    unsafe { pool.deallocate(sixth.as_ptr(), 8) }.unwrap();
    assert_eq!(pool.free_block_count(), 5);

    while blocks.len() < 10 {
        blocks.push(pool.allocate(8).unwrap());
    }
    assert_eq!(pool.free_block_count(), 0);
    assert_eq!(pool.allocate(8), Err(Error::OutOfMemory { block_count: 10 }));

    let last = blocks.pop().unwrap();
    unsafe { pool.deallocate(last.as_ptr(), 8) }.unwrap();
    assert_eq!(pool.free_block_count(), 1);
}

#[test]
fn allocate_buffers() {
    let pool = Pool::<BUFFER_SIZE, 4, _>::new(NoopPort);

    let buf1 = pool.allocate(BUFFER_SIZE).unwrap();
    fill(unsafe { buffer(buf1) }, 10);
    check(unsafe { buffer(buf1) }, 10);

    let buf2 = pool.allocate(BUFFER_SIZE).unwrap();
    fill(unsafe { buffer(buf2) }, 20);
    check(unsafe { buffer(buf2) }, 20);

    {
        let buf3 = pool.allocate(BUFFER_SIZE).unwrap();
        fill(unsafe { buffer(buf3) }, 30);
        check(unsafe { buffer(buf3) }, 30);

        let buf4 = pool.allocate(BUFFER_SIZE).unwrap();
        fill(unsafe { buffer(buf4) }, 40);
        check(unsafe { buffer(buf4) }, 40);

        unsafe { pool.deallocate(buf3.as_ptr(), BUFFER_SIZE) }.unwrap();
        unsafe { pool.deallocate(buf4.as_ptr(), BUFFER_SIZE) }.unwrap();
    }

    let buf5 = pool.allocate(BUFFER_SIZE).unwrap();
    fill(unsafe { buffer(buf5) }, 50);
    check(unsafe { buffer(buf5) }, 50);

    let buf6 = pool.allocate(BUFFER_SIZE).unwrap();
    fill(unsafe { buffer(buf6) }, 60);
    check(unsafe { buffer(buf6) }, 60);

    // the first buffers are untouched by the reuse of the others
    check(unsafe { buffer(buf1) }, 10);
    check(unsafe { buffer(buf2) }, 20);

    assert_eq!(
        pool.allocate(BUFFER_SIZE),
        Err(Error::OutOfMemory { block_count: 4 })
    );

    unsafe { pool.deallocate(buf6.as_ptr(), BUFFER_SIZE) }.unwrap();

    let words = PoolAdaptor::<u32, BUFFER_SIZE, 4, _>::new(&pool);
    let buf7 = words.allocate(10).unwrap();
    assert_eq!(buf7.cast::<u8>(), buf6);
    assert_eq!(pool.allocate(1), Err(Error::OutOfMemory { block_count: 4 }));
}

#[test]
fn blocks_are_zeroed_on_reuse() {
    let pool = Pool::<BUFFER_SIZE, 2, _>::new(NoopPort);

    let block = pool.allocate(BUFFER_SIZE).unwrap();
    fill(unsafe { buffer(block) }, 0xA5);
    unsafe { pool.deallocate(block.as_ptr(), BUFFER_SIZE) }.unwrap();

    // a small request clears the whole block nevertheless
    let block = pool.allocate(1).unwrap();
    assert!(unsafe { buffer(block) }.iter().all(|&byte| byte == 0));
}

#[test]
fn last_freed_is_first_reused() {
    let pool = Pool::<16, 4, _>::new(NoopPort);
    let a = pool.allocate(16).unwrap();
    let b = pool.allocate(16).unwrap();

    unsafe { pool.deallocate(a.as_ptr(), 16) }.unwrap();
    unsafe { pool.deallocate(b.as_ptr(), 16) }.unwrap();
    assert_eq!(pool.allocate(4), Ok(b));
    assert_eq!(pool.allocate(16), Ok(a));
}

#[test]
fn addresses_are_inside_the_pool_at_block_boundaries() {
    let pool = Pool::<24, 7, _>::new(NoopPort);
    let base = pool.pool_base_address().as_ptr() as usize;

    while let Ok(block) = pool.allocate(24) {
        let offset = block.as_ptr() as usize - base;
        assert!(offset < 24 * 7);
        assert_eq!(offset % 24, 0);
        assert!(pool.contains(block.as_ptr()));
    }
}

#[test]
fn bad_address() {
    let pool = Pool::<8, 10, _>::new(NoopPort);
    let _block = pool.allocate(8).unwrap();
    let base = pool.pool_base_address().as_ptr();

    let below = base.wrapping_sub(1);
    assert_eq!(
        unsafe { pool.deallocate(below, 8) },
        Err(Error::InvalidAddress {
            address: below as usize
        })
    );
    assert_eq!(
        unsafe { pool.deallocate(base.wrapping_add(1), 8) },
        Err(Error::Misaligned {
            offset: 1,
            block_size: 8
        })
    );
    assert_eq!(pool.free_block_count(), 9);
}

#[test]
fn independent_pools_of_same_shape() {
    let first = Pool::<8, 2, _>::new(NoopPort);
    let second = Pool::<8, 2, _>::new(NoopPort);

    let block = first.allocate(8).unwrap();
    assert_eq!(first.free_block_count(), 1);
    assert_eq!(second.free_block_count(), 2);

    // a block of one pool is foreign to the other
    assert!(matches!(
        unsafe { second.deallocate(block.as_ptr(), 8) },
        Err(Error::InvalidAddress { .. })
    ));
}
