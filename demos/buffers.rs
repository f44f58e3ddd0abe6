//! Allocate a couple of fixed-size buffers from a shared pool, fill them with
//! patterns and print them.
use blockpool::port::SpinPort;
use blockpool::shared::SharedPool;
use blockpool::Error;

use std::ptr::NonNull;

const BUFFER_SIZE: usize = 512;
const BUFFER_COUNT: usize = 4;

static POOL: SharedPool<BUFFER_SIZE, BUFFER_COUNT, SpinPort> = SharedPool::new();

/// A buffer living in a block of the pool, which is returned on drop.
struct Buffer {
    block: NonNull<u8>,
}
impl Buffer {
    fn new() -> Result<Self, Error> {
        let block = POOL.get().allocate(BUFFER_SIZE)?;
        Ok(Self { block })
    }

    fn data(&mut self) -> &mut [u8] {
        // SAFETY: the block is owned by this buffer and `BUFFER_SIZE` large
        unsafe { std::slice::from_raw_parts_mut(self.block.as_ptr(), BUFFER_SIZE) }
    }

    fn fill(&mut self, shift: u8) {
        for (i, byte) in self.data().iter_mut().enumerate() {
            *byte = (i as u8).wrapping_add(shift);
        }
    }

    fn print(&mut self, name: &str) {
        println!("{name} elements:");
        let line: Vec<_> = self.data().iter().map(|byte| format!("{byte:x}")).collect();
        println!("{}", line.join(" "));
    }
}
impl Drop for Buffer {
    fn drop(&mut self) {
        // SAFETY: the block was allocated by `Buffer::new()` and is not used
        // anymore.
        if let Err(error) = unsafe { POOL.get().deallocate(self.block.as_ptr(), BUFFER_SIZE) } {
            eprintln!("failed to return buffer: {error}");
        }
    }
}

fn main() -> Result<(), Error> {
    let mut buf1 = Buffer::new()?;
    buf1.fill(10);
    buf1.print("buf1");

    let mut buf2 = Buffer::new()?;
    buf2.fill(20);
    buf2.print("buf2");

    {
        let mut buf3 = Buffer::new()?;
        buf3.fill(30);
        buf3.print("buf3");

        let mut buf4 = Buffer::new()?;
        buf4.fill(40);
        buf4.print("buf4");
    }

    let mut buf5 = Buffer::new()?;
    buf5.fill(50);
    buf5.print("buf5");

    let mut buf6 = Buffer::new()?;
    buf6.fill(60);
    buf6.print("buf6");

    match Buffer::new() {
        Ok(_) => println!("unexpectedly got a fifth buffer"),
        Err(error) => println!("fifth buffer: {error}"),
    }
    println!("free blocks: {}", POOL.get().free_block_count());
    Ok(())
}
