//! Reusable copy buffers
//!
//! Loads stream blobs out of the store through a fixed-size scratch buffer.
//! Buffers are checked out of a pool for the duration of one command, so two
//! commands running on different threads never share a buffer, and buffers
//! are recycled instead of being reallocated for every restore.

use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::ops::{Deref, DerefMut};

/// Default copy buffer size (64 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Pool of equally sized scratch buffers
pub struct CopyBufferPool {
    buffer_size: usize,
    free: Mutex<Vec<Box<[u8]>>>,
}

impl Default for CopyBufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl CopyBufferPool {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            free: Mutex::new(Vec::new()),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Take a buffer out of the pool, allocating one if none is free.
    pub fn checkout(&self) -> PooledBuffer<'_> {
        let buffer = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| vec![0u8; self.buffer_size].into_boxed_slice());
        PooledBuffer {
            pool: self,
            buffer: Some(buffer),
        }
    }

    /// Number of idle buffers currently held by the pool
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

/// A buffer on loan from a [`CopyBufferPool`]; returned on drop.
pub struct PooledBuffer<'a> {
    pool: &'a CopyBufferPool,
    buffer: Option<Box<[u8]>>,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buffer.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.free.lock().push(buffer);
        }
    }
}

/// Copy `reader` into `writer` through `buffer`, returning the byte count.
pub fn copy_with_buffer<R, W>(reader: &mut R, writer: &mut W, buffer: &mut [u8]) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut total = 0u64;
    loop {
        let n = match reader.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..n])?;
        total += n as u64;
    }
    writer.flush()?;
    Ok(total)
}
