//! Header read/write functions for map package files.

pub use crate::package_format_spec::{
    PACKAGE_BLOCK_ALIGNMENT, PACKAGE_ENDIANNESS, PACKAGE_FORMAT_CURRENT, PACKAGE_FORMAT_MIN,
    PACKAGE_FORMAT_OFFSET, PACKAGE_HEADER_SIZE, PACKAGE_MAGIC, PACKAGE_MAGIC_OFFSET,
    PACKAGE_META_LEN_OFFSET, PACKAGE_SECTIONS_LEN_OFFSET, PACKAGE_VERSION_OFFSET,
};

use crate::{MapSetError, MapSetResult};

/// Fixed-size header at the start of every package file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageHeader {
    /// Layout version of the file itself.
    pub format: u64,
    /// Data version of the package contents (for example `240115`).
    pub version: i64,
    /// Length of the archived metadata block.
    pub meta_len: u64,
    /// Length of the archived section table.
    pub sections_len: u64,
}

impl PackageHeader {
    /// Offset of the metadata block.
    pub fn meta_offset(&self) -> usize {
        PACKAGE_HEADER_SIZE
    }

    /// Offset of the section table block.
    ///
    /// Saturates at `usize::MAX` for lengths that do not fit the address
    /// space; [`read_header`] rejects such headers.
    pub fn sections_offset(&self) -> usize {
        block_end(self.meta_offset(), self.meta_len).unwrap_or(usize::MAX)
    }

    /// First byte after the section table; section payloads start here.
    pub fn payload_offset(&self) -> usize {
        self.checked_payload_offset().unwrap_or(usize::MAX)
    }

    fn checked_payload_offset(&self) -> Option<usize> {
        let sections = block_end(self.meta_offset(), self.meta_len)?;
        block_end(sections, self.sections_len)
    }
}

/// Aligned end of a block of `len` bytes starting at `offset`.
fn block_end(offset: usize, len: u64) -> Option<usize> {
    offset
        .checked_add(usize::try_from(len).ok()?)?
        .checked_next_multiple_of(PACKAGE_BLOCK_ALIGNMENT)
}

/// Rounds `offset` up to the block alignment.
#[inline]
pub fn align_up(offset: usize) -> usize {
    let align = PACKAGE_BLOCK_ALIGNMENT;
    (offset + align - 1) & !(align - 1)
}

/// Returns true if buffer starts with valid magic bytes.
pub fn validate_magic(buf: &[u8]) -> bool {
    buf.len() >= PACKAGE_HEADER_SIZE
        && read_u64_le(buf, PACKAGE_MAGIC_OFFSET) == Some(PACKAGE_MAGIC)
}

/// Reads and validates the header.
///
/// A wrong magic, or block lengths that cannot be laid out, is
/// [`MapSetError::InvalidHeader`]; a known magic with a format outside the
/// supported range is [`MapSetError::UnsupportedFormat`].
pub fn read_header(buf: &[u8]) -> MapSetResult<PackageHeader> {
    if buf.len() < PACKAGE_HEADER_SIZE {
        return Err(MapSetError::Truncated {
            needed: PACKAGE_HEADER_SIZE,
            actual: buf.len(),
        });
    }
    if !validate_magic(buf) {
        return Err(MapSetError::InvalidHeader);
    }

    let field = |offset: usize| read_u64_le(buf, offset).ok_or(MapSetError::InvalidHeader);

    let format = field(PACKAGE_FORMAT_OFFSET)?;
    if !(PACKAGE_FORMAT_MIN..=PACKAGE_FORMAT_CURRENT).contains(&format) {
        return Err(MapSetError::UnsupportedFormat {
            found: format,
            min: PACKAGE_FORMAT_MIN,
            max: PACKAGE_FORMAT_CURRENT,
        });
    }

    let header = PackageHeader {
        format,
        version: field(PACKAGE_VERSION_OFFSET)? as i64,
        meta_len: field(PACKAGE_META_LEN_OFFSET)?,
        sections_len: field(PACKAGE_SECTIONS_LEN_OFFSET)?,
    };
    if header.checked_payload_offset().is_none() {
        tracing::debug!(
            "Package header block lengths overflow: meta {}, sections {}",
            header.meta_len,
            header.sections_len
        );
        return Err(MapSetError::InvalidHeader);
    }
    Ok(header)
}

/// Writes magic and every header field to buffer.
pub fn write_header(buf: &mut [u8], header: &PackageHeader) -> MapSetResult<()> {
    if buf.len() < PACKAGE_HEADER_SIZE {
        return Err(MapSetError::Truncated {
            needed: PACKAGE_HEADER_SIZE,
            actual: buf.len(),
        });
    }
    write_u64_le(buf, PACKAGE_MAGIC_OFFSET, PACKAGE_MAGIC)?;
    write_u64_le(buf, PACKAGE_FORMAT_OFFSET, header.format)?;
    write_u64_le(buf, PACKAGE_VERSION_OFFSET, header.version as u64)?;
    write_u64_le(buf, PACKAGE_META_LEN_OFFSET, header.meta_len)?;
    write_u64_le(buf, PACKAGE_SECTIONS_LEN_OFFSET, header.sections_len)?;
    Ok(())
}

/// Writes a little-endian u64 at `offset`.
pub fn write_u64_le(buf: &mut [u8], offset: usize, value: u64) -> MapSetResult<()> {
    let len = buf.len();
    let slot = offset
        .checked_add(8)
        .and_then(|end| buf.get_mut(offset..end))
        .ok_or(MapSetError::Truncated {
            needed: offset.saturating_add(8),
            actual: len,
        })?;
    slot.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Reads a little-endian u64 at `offset`, or `None` past the end of `buf`.
pub fn read_u64_le(buf: &[u8], offset: usize) -> Option<u64> {
    let bytes = buf.get(offset..offset.checked_add(8)?)?;
    bytes.try_into().ok().map(u64::from_le_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PackageHeader {
        PackageHeader {
            format: PACKAGE_FORMAT_CURRENT,
            version: 240115,
            meta_len: 40,
            sections_len: 100,
        }
    }

    #[test]
    fn test_header_roundtrip() {
        let mut buf = vec![0u8; PACKAGE_HEADER_SIZE];
        write_header(&mut buf, &sample()).unwrap();
        assert!(validate_magic(&buf));
        assert_eq!(read_header(&buf).unwrap(), sample());
    }

    #[test]
    fn test_invalid_magic() {
        let buf = vec![0u8; PACKAGE_HEADER_SIZE];
        assert!(!validate_magic(&buf));
        assert!(matches!(read_header(&buf), Err(MapSetError::InvalidHeader)));
    }

    #[test]
    fn test_short_buffer() {
        let buf = vec![0u8; 10];
        assert!(matches!(
            read_header(&buf),
            Err(MapSetError::Truncated { needed, actual: 10 }) if needed == PACKAGE_HEADER_SIZE
        ));
    }

    #[test]
    fn test_future_format_is_unsupported() {
        let mut buf = vec![0u8; PACKAGE_HEADER_SIZE];
        let header = PackageHeader {
            format: PACKAGE_FORMAT_CURRENT + 1,
            ..sample()
        };
        write_header(&mut buf, &header).unwrap();
        let err = read_header(&buf).unwrap_err();
        assert!(err.is_unsupported_format());
    }

    #[test]
    fn test_block_offsets_are_aligned() {
        let header = sample();
        assert_eq!(header.meta_offset(), PACKAGE_HEADER_SIZE);
        assert_eq!(header.sections_offset() % PACKAGE_BLOCK_ALIGNMENT, 0);
        assert!(header.sections_offset() >= PACKAGE_HEADER_SIZE + 40);
        assert_eq!(header.payload_offset() % PACKAGE_BLOCK_ALIGNMENT, 0);
        assert!(header.payload_offset() >= header.sections_offset() + 100);
    }

    #[test]
    fn test_oversized_block_lengths_are_invalid() {
        let mut buf = vec![0u8; PACKAGE_HEADER_SIZE];
        write_header(&mut buf, &sample()).unwrap();
        write_u64_le(&mut buf, PACKAGE_META_LEN_OFFSET, u64::MAX).unwrap();
        assert!(matches!(read_header(&buf), Err(MapSetError::InvalidHeader)));

        write_header(&mut buf, &sample()).unwrap();
        write_u64_le(&mut buf, PACKAGE_SECTIONS_LEN_OFFSET, u64::MAX - 8).unwrap();
        assert!(matches!(read_header(&buf), Err(MapSetError::InvalidHeader)));

        let header = PackageHeader {
            meta_len: u64::MAX,
            ..sample()
        };
        assert_eq!(header.sections_offset(), usize::MAX);
        assert_eq!(header.payload_offset(), usize::MAX);
    }

    #[test]
    fn test_u64_helpers_stay_in_bounds() {
        let mut buf = [0u8; 12];
        write_u64_le(&mut buf, 4, 0x0102_0304_0506_0708).unwrap();
        assert_eq!(read_u64_le(&buf, 4), Some(0x0102_0304_0506_0708));
        assert_eq!(read_u64_le(&buf, 5), None);
        assert_eq!(read_u64_le(&buf, usize::MAX), None);
        assert!(matches!(
            write_u64_le(&mut buf, 8, 1),
            Err(MapSetError::Truncated { needed: 16, actual: 12 })
        ));
        assert!(write_u64_le(&mut buf, usize::MAX, 1).is_err());
    }
}
