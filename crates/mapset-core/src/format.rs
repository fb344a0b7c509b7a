//! Reading and writing whole package files.
//!
//! Layout, every block aligned to [`PACKAGE_BLOCK_ALIGNMENT`]:
//!
//! ```text
//! | header (64) | archived PackageMeta | archived SectionTable | section payloads ... |
//! ```

use std::path::Path;

use crate::header::{
    PACKAGE_BLOCK_ALIGNMENT, PACKAGE_FORMAT_CURRENT, PACKAGE_HEADER_SIZE, PackageHeader,
    align_up, read_header, write_header,
};
use crate::meta::{PackageDescriptor, PackageMeta};
use crate::sections::SectionTable;
use crate::{MapSetError, MapSetResult};

/// Returns the byte slice of a block, checking it against the buffer length.
fn block(buf: &[u8], offset: usize, len: u64) -> MapSetResult<&[u8]> {
    let truncated = |needed| MapSetError::Truncated {
        needed,
        actual: buf.len(),
    };
    let end = usize::try_from(len)
        .ok()
        .and_then(|len| offset.checked_add(len))
        .ok_or_else(|| truncated(usize::MAX))?;
    buf.get(offset..end).ok_or_else(|| truncated(end))
}

/// Reads the header and metadata block.
///
/// Only the first `payload_offset` bytes are touched, so callers may pass a
/// prefix of the file.
pub fn read_descriptor(buf: &[u8]) -> MapSetResult<PackageDescriptor> {
    let header = read_header(buf)?;
    let meta = PackageMeta::from_archive(block(buf, header.meta_offset(), header.meta_len)?)?;
    Ok(PackageDescriptor {
        format: header.format,
        version: header.version,
        meta,
    })
}

/// Reads and validates the section table of a whole package file.
pub fn read_section_table(buf: &[u8], header: &PackageHeader) -> MapSetResult<SectionTable> {
    let table =
        SectionTable::from_archive(block(buf, header.sections_offset(), header.sections_len)?)?;
    table.validate(buf.len())?;
    Ok(table)
}

/// Builds package files.
///
/// ```ignore
/// let bytes = PackageWriter::new(240115, meta)
///     .section(GEOMETRY_INDEX_TAG, geometry)
///     .to_bytes()?;
/// ```
#[derive(Debug, Clone)]
pub struct PackageWriter {
    format: u64,
    version: i64,
    meta: PackageMeta,
    sections: Vec<(String, Vec<u8>)>,
}

impl PackageWriter {
    pub fn new(version: i64, meta: PackageMeta) -> Self {
        Self {
            format: PACKAGE_FORMAT_CURRENT,
            version,
            meta,
            sections: Vec::new(),
        }
    }

    /// Overrides the format version written to the header.
    pub fn with_format(mut self, format: u64) -> Self {
        self.format = format;
        self
    }

    /// Appends a raw section.
    pub fn section(mut self, tag: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.sections.push((tag.into(), data.into()));
        self
    }

    fn layout(&self, payload_offset: usize) -> SectionTable {
        let mut table = SectionTable::new();
        let mut offset = payload_offset;
        for (tag, data) in &self.sections {
            table.push(tag.clone(), offset as u64, data.len() as u64);
            offset = align_up(offset + data.len());
        }
        table
    }

    /// Serializes the whole package.
    pub fn to_bytes(&self) -> MapSetResult<Vec<u8>> {
        let meta = self.meta.to_archive()?;

        // Archived offsets are fixed-width, so a placeholder table has the
        // same archived length as the final one.
        let sections_len = self.layout(0).to_archive()?.len();
        let header = PackageHeader {
            format: self.format,
            version: self.version,
            meta_len: meta.len() as u64,
            sections_len: sections_len as u64,
        };
        let sections = self.layout(header.payload_offset()).to_archive()?;
        if sections.len() != sections_len {
            return Err(MapSetError::Internal(format!(
                "section table length changed from {sections_len} to {}",
                sections.len()
            )));
        }

        let mut out = vec![0u8; header.payload_offset()];
        write_header(&mut out, &header)?;
        out[header.meta_offset()..header.meta_offset() + meta.len()].copy_from_slice(&meta);
        out[header.sections_offset()..header.sections_offset() + sections.len()]
            .copy_from_slice(&sections);
        for (_, data) in &self.sections {
            out.extend_from_slice(data);
            out.resize(align_up(out.len()), 0);
        }
        debug_assert_eq!(out.len() % PACKAGE_BLOCK_ALIGNMENT, 0);
        debug_assert!(out.len() >= PACKAGE_HEADER_SIZE);
        Ok(out)
    }

    /// Serializes the package and writes it to `path`, creating parent directories.
    pub fn write_to(&self, path: impl AsRef<Path>) -> MapSetResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}
