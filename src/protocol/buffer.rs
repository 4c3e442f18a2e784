//! Blocking Stream Buffers
//!
//! [`ReadBuffer`] reads ahead from a `Read` into a bounded `BytesMut` so a
//! parser can look at whole frames. The bound can be raised while a large
//! frame is arriving. [`WriteBuffer`] collects small writes
//! and hands them to the underlying `Write` in large chunks.

use bytes::{Buf, BytesMut};
use std::io::{self, Read, Write};

/// Default read-ahead capacity.
pub const DEFAULT_READ_CAPACITY: usize = 2 * 1024;

/// Default write-behind capacity.
pub const DEFAULT_WRITE_CAPACITY: usize = 10 * 1024;

/// Size of a single read from the underlying stream.
const READ_CHUNK: usize = 4 * 1024;

/// Read-ahead buffer holding at most `capacity` unconsumed bytes.
#[derive(Debug)]
pub struct ReadBuffer<R> {
    reader: R,
    buf: BytesMut,
    capacity: usize,
}

impl<R: Read> ReadBuffer<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_READ_CAPACITY)
    }

    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(capacity.min(READ_CHUNK)),
            capacity,
        }
    }

    /// Bytes read but not yet consumed.
    #[inline]
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// True when no more input fits.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Raises the bound to `capacity`. Never shrinks it.
    pub fn grow(&mut self, capacity: usize) {
        self.capacity = self.capacity.max(capacity);
    }

    /// Drops `n` bytes from the front.
    pub fn consume(&mut self, n: usize) {
        self.buf.advance(n);
    }

    /// Reads once from the underlying stream, up to the free capacity.
    /// Each read asks for at least as much as is already buffered, so a
    /// frame arriving in many reads is re-parsed a logarithmic number of
    /// times.
    ///
    /// # Returns
    ///
    /// The number of bytes added; `0` means end of stream (or a full buffer).
    pub fn fill(&mut self) -> io::Result<usize> {
        let start = self.buf.len();
        let want = READ_CHUNK
            .max(start)
            .min(self.capacity.saturating_sub(start));
        if want == 0 {
            return Ok(0);
        }

        self.buf.resize(start + want, 0);
        let result = loop {
            match self.reader.read(&mut self.buf[start..]) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other,
            }
        };
        let n = *result.as_ref().unwrap_or(&0);
        self.buf.truncate(start + n);
        result
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Write-behind buffer that flushes once `capacity` bytes are pending.
#[derive(Debug)]
pub struct WriteBuffer<W: Write> {
    writer: W,
    buf: BytesMut,
    capacity: usize,
}

impl<W: Write> WriteBuffer<W> {
    pub fn new(writer: W) -> Self {
        Self::with_capacity(writer, DEFAULT_WRITE_CAPACITY)
    }

    pub fn with_capacity(writer: W, capacity: usize) -> Self {
        Self {
            writer,
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes waiting to be written.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn flush_buf(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.writer.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }
}

impl<W: Write> Write for WriteBuffer<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.capacity {
            self.flush_buf()?;
        }
        if data.len() >= self.capacity {
            // too big to be worth copying
            return self.writer.write(data);
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buf()?;
        self.writer.flush()
    }
}
