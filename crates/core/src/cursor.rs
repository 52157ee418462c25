//! Position-aware big-endian binary cursor
//!
//! `ByteCursor` wraps any byte source or sink (file, socket, `Vec<u8>`,
//! `&[u8]`) and provides fixed-width integer and length-prefixed byte string
//! I/O in network byte order.
//!
//! ## Length-prefixed strings
//!
//! ```text
//! [length: u32 BE][bytes; length]
//! ```
//!
//! The nullable variant uses an `i32` length where `-1` means "absent".
//!
//! Reads never return partial data: a read that cannot be satisfied in full
//! fails with [`CursorError::UnexpectedEof`], which records how many bytes
//! were obtained before the stream ran dry.

use crate::error::{CursorError, CursorResult};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::{self, Read, Write};
use uuid::Uuid;

/// Upper bound on the buffer reserved ahead of a variable-length read.
///
/// Length prefixes come from untrusted input; the buffer grows with the
/// bytes actually delivered instead of trusting the prefix up front.
const READ_PREALLOC_LIMIT: usize = 64 * 1024;

/// Big-endian reader/writer over a byte stream
#[derive(Debug)]
pub struct ByteCursor<T> {
    inner: T,
    position: u64,
}

impl<T> ByteCursor<T> {
    /// Wrap a stream, starting the position counter at zero.
    pub fn new(inner: T) -> Self {
        ByteCursor { inner, position: 0 }
    }

    /// Wrap a stream whose first byte sits at `position` in some larger
    /// frame. Only affects [`tell`](Self::tell) and error offsets.
    pub fn with_position(inner: T, position: u64) -> Self {
        ByteCursor { inner, position }
    }

    /// Number of bytes read or written through this cursor.
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Borrow the wrapped stream
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the wrapped stream
    ///
    /// Bytes moved through this reference are not counted by `tell()`.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Unwrap the stream
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Write> ByteCursor<T> {
    /// Write an unsigned 8-bit integer
    pub fn write_u8(&mut self, value: u8) -> CursorResult<()> {
        self.inner.write_u8(value)?;
        self.position += 1;
        Ok(())
    }

    /// Write an unsigned 16-bit integer
    pub fn write_u16(&mut self, value: u16) -> CursorResult<()> {
        self.inner.write_u16::<BigEndian>(value)?;
        self.position += 2;
        Ok(())
    }

    /// Write an unsigned 32-bit integer
    pub fn write_u32(&mut self, value: u32) -> CursorResult<()> {
        self.inner.write_u32::<BigEndian>(value)?;
        self.position += 4;
        Ok(())
    }

    /// Write an unsigned 64-bit integer
    pub fn write_u64(&mut self, value: u64) -> CursorResult<()> {
        self.inner.write_u64::<BigEndian>(value)?;
        self.position += 8;
        Ok(())
    }

    /// Write a signed 8-bit integer
    pub fn write_i8(&mut self, value: i8) -> CursorResult<()> {
        self.inner.write_i8(value)?;
        self.position += 1;
        Ok(())
    }

    /// Write a signed 16-bit integer
    pub fn write_i16(&mut self, value: i16) -> CursorResult<()> {
        self.inner.write_i16::<BigEndian>(value)?;
        self.position += 2;
        Ok(())
    }

    /// Write a signed 32-bit integer
    pub fn write_i32(&mut self, value: i32) -> CursorResult<()> {
        self.inner.write_i32::<BigEndian>(value)?;
        self.position += 4;
        Ok(())
    }

    /// Write a signed 64-bit integer
    pub fn write_i64(&mut self, value: i64) -> CursorResult<()> {
        self.inner.write_i64::<BigEndian>(value)?;
        self.position += 8;
        Ok(())
    }

    /// Write raw bytes verbatim, without a length prefix
    pub fn write_bytes(&mut self, bytes: &[u8]) -> CursorResult<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Write `u32(len)` followed by the bytes
    pub fn write_length_prefixed_bytes(&mut self, bytes: &[u8]) -> CursorResult<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| CursorError::LengthOverflow {
            length: bytes.len(),
        })?;
        self.write_u32(len)?;
        self.write_bytes(bytes)
    }

    /// Write an `i32` length followed by the bytes, or `-1` for `None`
    pub fn write_nullable_length_prefixed_bytes(&mut self, bytes: Option<&[u8]>) -> CursorResult<()> {
        match bytes {
            None => self.write_i32(-1),
            Some(bytes) => {
                let len = i32::try_from(bytes.len()).map_err(|_| CursorError::LengthOverflow {
                    length: bytes.len(),
                })?;
                self.write_i32(len)?;
                self.write_bytes(bytes)
            }
        }
    }

    /// Write the 16 raw bytes of a UUID
    pub fn write_uuid(&mut self, id: &Uuid) -> CursorResult<()> {
        self.write_bytes(id.as_bytes())
    }

    /// Flush the wrapped sink
    pub fn flush(&mut self) -> CursorResult<()> {
        self.inner.flush()?;
        Ok(())
    }
}

impl<T: Read> ByteCursor<T> {
    /// Read exactly `n` bytes
    ///
    /// Fails with `UnexpectedEof` if the stream ends first.
    pub fn read_bytes(&mut self, n: usize) -> CursorResult<Vec<u8>> {
        let start = self.position;
        let mut buf = Vec::with_capacity(n.min(READ_PREALLOC_LIMIT));
        let got = (&mut self.inner).take(n as u64).read_to_end(&mut buf)?;
        self.position += got as u64;

        if got < n {
            return Err(CursorError::UnexpectedEof {
                position: start,
                expected: n,
                actual: got,
            });
        }
        Ok(buf)
    }

    /// Read exactly `N` bytes into a fixed array
    pub fn read_array<const N: usize>(&mut self) -> CursorResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Read an unsigned 8-bit integer
    pub fn read_u8(&mut self) -> CursorResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read an unsigned 16-bit integer
    pub fn read_u16(&mut self) -> CursorResult<u16> {
        Ok(BigEndian::read_u16(&self.read_array::<2>()?))
    }

    /// Read an unsigned 32-bit integer
    pub fn read_u32(&mut self) -> CursorResult<u32> {
        Ok(BigEndian::read_u32(&self.read_array::<4>()?))
    }

    /// Read an unsigned 64-bit integer
    pub fn read_u64(&mut self) -> CursorResult<u64> {
        Ok(BigEndian::read_u64(&self.read_array::<8>()?))
    }

    /// Read a signed 8-bit integer
    pub fn read_i8(&mut self) -> CursorResult<i8> {
        Ok(self.read_array::<1>()?[0] as i8)
    }

    /// Read a signed 16-bit integer
    pub fn read_i16(&mut self) -> CursorResult<i16> {
        Ok(BigEndian::read_i16(&self.read_array::<2>()?))
    }

    /// Read a signed 32-bit integer
    pub fn read_i32(&mut self) -> CursorResult<i32> {
        Ok(BigEndian::read_i32(&self.read_array::<4>()?))
    }

    /// Read a signed 64-bit integer
    pub fn read_i64(&mut self) -> CursorResult<i64> {
        Ok(BigEndian::read_i64(&self.read_array::<8>()?))
    }

    /// Read a `u32` length followed by that many bytes
    pub fn read_length_prefixed_bytes(&mut self) -> CursorResult<Vec<u8>> {
        let len = self.read_u32()?;
        self.read_bytes(len as usize)
    }

    /// Read an `i32` length followed by that many bytes
    ///
    /// A length of exactly `-1` yields `None`. Any other negative length is
    /// rejected with `InvalidLength`.
    pub fn read_nullable_length_prefixed_bytes(&mut self) -> CursorResult<Option<Vec<u8>>> {
        let start = self.position;
        match self.read_i32()? {
            -1 => Ok(None),
            len if len >= 0 => self.read_bytes(len as usize).map(Some),
            len => Err(CursorError::InvalidLength {
                position: start,
                length: i64::from(len),
            }),
        }
    }

    /// Read 16 raw bytes as a UUID
    pub fn read_uuid(&mut self) -> CursorResult<Uuid> {
        Ok(Uuid::from_bytes(self.read_array::<16>()?))
    }

    fn fill(&mut self, buf: &mut [u8]) -> CursorResult<()> {
        let start = self.position;
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.position += filled as u64;

        if filled < buf.len() {
            return Err(CursorError::UnexpectedEof {
                position: start,
                expected: buf.len(),
                actual: filled,
            });
        }
        Ok(())
    }
}
