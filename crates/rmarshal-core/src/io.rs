//! Buffered byte I/O over an externally supplied reader/writer.
//!
//! Every multi-byte value on the wire is little-endian (see spec §4.1).

use std::io::{Read, Write};

use crate::error::{MarshalError, Result};

const MIN_REFILL: usize = 1024;

/// Buffered reader that tracks the byte offset for diagnostics.
pub struct ByteReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
    offset: usize,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, buf: Vec::new(), pos: 0, offset: 0 }
    }

    /// Current byte offset into the stream, for error diagnostics.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn refill(&mut self) -> Result<bool> {
        if self.pos < self.buf.len() {
            return Ok(true);
        }
        let mut chunk = vec![0u8; MIN_REFILL];
        let n = self.inner.read(&mut chunk)?;
        if n == 0 {
            return Ok(false);
        }
        chunk.truncate(n);
        self.buf = chunk;
        self.pos = 0;
        Ok(true)
    }

    /// Returns the next byte, or `Err(Truncated)` at EOF.
    pub fn next_byte(&mut self) -> Result<u8> {
        if !self.refill()? {
            return Err(MarshalError::Truncated { offset: self.offset, expected: 1 });
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        self.offset += 1;
        Ok(b)
    }

    /// Copies the next `n` bytes into a freshly allocated vector, refilling
    /// across internal buffer boundaries. Fails with `Truncated` if fewer
    /// than `n` bytes remain.
    pub fn next_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            if !self.refill()? {
                return Err(MarshalError::Truncated {
                    offset: self.offset,
                    expected: n - out.len(),
                });
            }
            let available = self.buf.len() - self.pos;
            let want = n - out.len();
            let take = available.min(want);
            out.extend_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
            self.offset += take;
        }
        Ok(out)
    }
}

/// Buffered writer that flushes to the underlying sink when full.
pub struct ByteWriter<W> {
    inner: W,
    buf: Vec<u8>,
    cap: usize,
}

impl<W: Write> ByteWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, buf: Vec::new(), cap: 8 * MIN_REFILL }
    }

    pub fn put_byte(&mut self, b: u8) -> Result<()> {
        self.buf.push(b);
        if self.buf.len() >= self.cap {
            self.flush()?;
        }
        Ok(())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() >= self.cap {
            self.flush()?;
        }
        Ok(())
    }

    /// Synchronously drains the write buffer to the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        self.inner.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for ByteWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_byte_reads_sequentially() {
        let mut r = ByteReader::new(&b"abc"[..]);
        assert_eq!(r.next_byte().unwrap(), b'a');
        assert_eq!(r.next_byte().unwrap(), b'b');
        assert_eq!(r.next_byte().unwrap(), b'c');
        assert!(r.next_byte().is_err());
    }

    #[test]
    fn next_bytes_spans_refills() {
        let data: Vec<u8> = (0..4000u32).map(|i| (i % 251) as u8).collect();
        let mut r = ByteReader::new(&data[..]);
        let got = r.next_bytes(4000).unwrap();
        assert_eq!(got, data);
    }

    #[test]
    fn next_bytes_truncated() {
        let mut r = ByteReader::new(&b"ab"[..]);
        assert!(r.next_bytes(10).is_err());
    }

    #[test]
    fn writer_roundtrip() {
        let mut out = Vec::new();
        {
            let mut w = ByteWriter::new(&mut out);
            w.put_byte(1).unwrap();
            w.put_bytes(&[2, 3, 4]).unwrap();
            w.flush().unwrap();
        }
        assert_eq!(out, vec![1, 2, 3, 4]);
    }
}
