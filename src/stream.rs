//! A peekable byte stream with position tracking.
//!
//! [`Stream`] wraps any [`Read`] and adds what the container parsers need on
//! top of it: non-consuming [`peek`](Stream::peek) for magic-number checks,
//! little-endian primitive reads, bounded skips and a running byte position.

use std::fmt;
use std::io::{self, Read};

use byteorder_lite::{ByteOrder, LittleEndian};

/// A reader that can look ahead without consuming and tracks how many bytes
/// have been consumed so far.
pub struct Stream<R> {
    inner: R,
    /// Bytes read from `inner` by `peek` but not yet consumed.
    peeked: Vec<u8>,
    pos: u64,
}

impl<R: Read> Stream<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            peeked: Vec::new(),
            pos: 0,
        }
    }

    /// Returns the number of bytes consumed so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Copy up to `buf.len()` upcoming bytes into `buf` without consuming them.
    ///
    /// Returns the number of bytes copied, which is short only at end of data.
    /// Callers that need an exact match (magic numbers) must treat a short
    /// count as a mismatch.
    pub fn peek(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.peeked.len() < buf.len() {
            let mut chunk = [0u8; 64];
            let want = (buf.len() - self.peeked.len()).min(chunk.len());
            match self.inner.read(&mut chunk[..want]) {
                Ok(0) => break,
                Ok(n) => self.peeked.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let n = buf.len().min(self.peeked.len());
        buf[..n].copy_from_slice(&self.peeked[..n]);
        Ok(n)
    }

    /// Returns `true` when no further byte can be read.
    pub fn at_eof(&mut self) -> io::Result<bool> {
        let mut probe = [0u8; 1];
        Ok(self.peek(&mut probe)? == 0)
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> io::Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    /// Read a u16 in little-endian byte order.
    #[inline]
    pub fn read_u16_le(&mut self) -> io::Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact(&mut b)?;
        Ok(LittleEndian::read_u16(&b))
    }

    /// Read a u24 in little-endian byte order (as u32).
    #[inline]
    pub fn read_u24_le(&mut self) -> io::Result<u32> {
        let mut b = [0u8; 3];
        self.read_exact(&mut b)?;
        Ok(LittleEndian::read_u24(&b))
    }

    /// Read a u32 in little-endian byte order.
    #[inline]
    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(LittleEndian::read_u32(&b))
    }

    /// Read a RIFF four-character code.
    #[inline]
    pub fn read_fourcc(&mut self) -> io::Result<[u8; 4]> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(b)
    }

    /// Read exactly `n` bytes into a new buffer.
    ///
    /// The buffer grows with the data actually read, so a corrupt length
    /// field cannot force a large up-front allocation.
    pub fn read_vec(&mut self, n: u64) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.by_ref().take(n).read_to_end(&mut out)?;
        if out.len() as u64 != n {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(out)
    }

    /// Consume and discard exactly `n` bytes.
    pub fn skip(&mut self, n: u64) -> io::Result<()> {
        let copied = io::copy(&mut self.by_ref().take(n), &mut io::sink())?;
        if copied != n {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(())
    }
}

impl<R: Read> Read for Stream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = if self.peeked.is_empty() {
            self.inner.read(buf)?
        } else {
            let n = buf.len().min(self.peeked.len());
            buf[..n].copy_from_slice(&self.peeked[..n]);
            self.peeked.drain(..n);
            n
        };
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R> fmt::Debug for Stream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("pos", &self.pos)
            .field("peeked", &self.peeked.len())
            .finish()
    }
}
