//! Bounds-checked access to typelib bytes
//!
//! Every blob in a typelib is addressed by a byte offset into one immutable
//! buffer. [`BlobReader`] is the only place that turns those offsets into
//! values, so a corrupt offset becomes a [`ReadError`] instead of an
//! out-of-bounds access.

use thiserror::Error;

/// Errors that can occur while reading typelib bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// A read ran past the end of the buffer
    #[error("Read of {len} bytes at offset {offset} exceeds buffer of {size} bytes")]
    OutOfBounds {
        /// Offset the read started at
        offset: usize,
        /// Number of bytes requested
        len: usize,
        /// Size of the buffer
        size: usize,
    },

    /// A string has no NUL terminator before the end of the buffer
    #[error("Unterminated string at offset {0}")]
    UnterminatedString(usize),

    /// A string is not valid UTF-8
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// An offset computed from stored values does not fit in 32 bits
    #[error("Offset {base} + {delta} overflows")]
    OffsetOverflow {
        /// Offset read from the buffer
        base: u32,
        /// Field or element distance added to it
        delta: u64,
    },
}

/// `base + delta`, failing instead of wrapping
pub fn offset_add(base: u32, delta: u32) -> Result<u32, ReadError> {
    base.checked_add(delta).ok_or(ReadError::OffsetOverflow {
        base,
        delta: u64::from(delta),
    })
}

/// Offset of record `index` in a table of `size`-byte records at `base`
pub fn element_offset(base: u32, index: u32, size: u32) -> Result<u32, ReadError> {
    index
        .checked_mul(size)
        .and_then(|delta| base.checked_add(delta))
        .ok_or(ReadError::OffsetOverflow {
            base,
            delta: u64::from(index) * u64::from(size),
        })
}

/// Random-access and sequential reader over a typelib buffer
///
/// The `*_at` methods read at an absolute offset and leave the cursor alone;
/// the `read_*` methods read at the cursor and advance it.
#[derive(Debug, Clone, Copy)]
pub struct BlobReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BlobReader<'a> {
    /// Create a new reader positioned at offset 0
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Underlying buffer
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// Current cursor position
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes remaining after the cursor
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Move the cursor to an absolute offset
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    // ===== Random Access =====

    /// Borrow `len` bytes starting at `offset`
    pub fn bytes_at(&self, offset: usize, len: usize) -> Result<&'a [u8], ReadError> {
        let end = offset.checked_add(len).ok_or(ReadError::OutOfBounds {
            offset,
            len,
            size: self.buffer.len(),
        })?;
        self.buffer.get(offset..end).ok_or(ReadError::OutOfBounds {
            offset,
            len,
            size: self.buffer.len(),
        })
    }

    fn array_at<const N: usize>(&self, offset: usize) -> Result<[u8; N], ReadError> {
        let bytes = self.bytes_at(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Read a byte at `offset`
    pub fn u8_at(&self, offset: usize) -> Result<u8, ReadError> {
        Ok(self.array_at::<1>(offset)?[0])
    }

    /// Read a little-endian u16 at `offset`
    pub fn u16_at(&self, offset: usize) -> Result<u16, ReadError> {
        Ok(u16::from_le_bytes(self.array_at(offset)?))
    }

    /// Read a little-endian u32 at `offset`
    pub fn u32_at(&self, offset: usize) -> Result<u32, ReadError> {
        Ok(u32::from_le_bytes(self.array_at(offset)?))
    }

    /// Read a little-endian i32 at `offset`
    pub fn i32_at(&self, offset: usize) -> Result<i32, ReadError> {
        Ok(i32::from_le_bytes(self.array_at(offset)?))
    }

    /// Read a little-endian u64 at `offset`
    pub fn u64_at(&self, offset: usize) -> Result<u64, ReadError> {
        Ok(u64::from_le_bytes(self.array_at(offset)?))
    }

    /// Read the NUL-terminated UTF-8 string starting at `offset`
    pub fn cstr_at(&self, offset: usize) -> Result<&'a str, ReadError> {
        let tail = self.buffer.get(offset..).ok_or(ReadError::OutOfBounds {
            offset,
            len: 1,
            size: self.buffer.len(),
        })?;
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(ReadError::UnterminatedString(offset))?;
        std::str::from_utf8(&tail[..len]).map_err(|_| ReadError::InvalidUtf8(offset))
    }

    // ===== Sequential Access =====

    /// Read a byte and advance
    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        let value = self.u8_at(self.position)?;
        self.position += 1;
        Ok(value)
    }

    /// Read a little-endian u16 and advance
    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        let value = self.u16_at(self.position)?;
        self.position += 2;
        Ok(value)
    }

    /// Read a little-endian u32 and advance
    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        let value = self.u32_at(self.position)?;
        self.position += 4;
        Ok(value)
    }

    /// Read `len` bytes and advance
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ReadError> {
        let value = self.bytes_at(self.position, len)?;
        self.position += len;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_bounds_checking() {
        let data = [1u8, 2, 3];
        let reader = BlobReader::new(&data);
        assert_eq!(reader.u16_at(0).unwrap(), 0x0201);
        assert_eq!(
            reader.u32_at(0),
            Err(ReadError::OutOfBounds {
                offset: 0,
                len: 4,
                size: 3
            })
        );
        assert!(reader.u8_at(3).is_err());
        assert!(reader.bytes_at(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_sequential_reads_advance() {
        let data = [0x34u8, 0x12, 0x78, 0x56, 0x34, 0x12, 0xff];
        let mut reader = BlobReader::new(&data);
        assert_eq!(reader.read_u16().unwrap(), 0x1234);
        assert_eq!(reader.read_u32().unwrap(), 0x12345678);
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.read_u8().unwrap(), 0xff);
        assert!(reader.read_u8().is_err());
    }

    #[test]
    fn test_cstr_at() {
        let data = b"\0hello\0wor";
        let reader = BlobReader::new(data);
        assert_eq!(reader.cstr_at(0).unwrap(), "");
        assert_eq!(reader.cstr_at(1).unwrap(), "hello");
        assert_eq!(reader.cstr_at(3).unwrap(), "llo");
        assert_eq!(reader.cstr_at(7), Err(ReadError::UnterminatedString(7)));
        assert!(matches!(
            reader.cstr_at(100),
            Err(ReadError::OutOfBounds { offset: 100, .. })
        ));
    }

    #[test]
    fn test_offset_arithmetic_does_not_wrap() {
        assert_eq!(offset_add(100, 12), Ok(112));
        assert_eq!(
            offset_add(0xFFFF_FFFE, 12),
            Err(ReadError::OffsetOverflow {
                base: 0xFFFF_FFFE,
                delta: 12
            })
        );
        assert_eq!(element_offset(64, 3, 16), Ok(112));
        assert_eq!(
            element_offset(64, 0x1000_0000, 16),
            Err(ReadError::OffsetOverflow {
                base: 64,
                delta: 0x1_0000_0000
            })
        );
    }

    #[test]
    fn test_cstr_invalid_utf8() {
        let data = [0xffu8, 0xfe, 0];
        let reader = BlobReader::new(&data);
        assert_eq!(reader.cstr_at(0), Err(ReadError::InvalidUtf8(0)));
    }
}
