//! Table of contents for the raw sections of a package file.

use std::ops::Range;

use rkyv::{Archive, Deserialize, Serialize};

use crate::{MapSetError, MapSetResult};

/// Tag of the geometry index section.
pub const GEOMETRY_INDEX_TAG: &str = "idx";

/// Tag of the search index section.
pub const SEARCH_INDEX_TAG: &str = "sdx";

/// Location of one section, relative to the start of the file.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SectionEntry {
    pub tag: String,
    pub offset: u64,
    pub len: u64,
}

/// Ordered list of sections in a package file.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SectionTable {
    entries: Vec<SectionEntry>,
}

impl SectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tag: impl Into<String>, offset: u64, len: u64) {
        self.entries.push(SectionEntry {
            tag: tag.into(),
            offset,
            len,
        });
    }

    pub fn get(&self, tag: &str) -> Option<&SectionEntry> {
        self.entries.iter().find(|e| e.tag == tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.get(tag).is_some()
    }

    /// Byte range of a section within the file.
    pub fn range(&self, tag: &str) -> Option<Range<usize>> {
        self.get(tag)
            .map(|e| e.offset as usize..e.offset.saturating_add(e.len) as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectionEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks that every section lies within a file of `file_len` bytes.
    pub fn validate(&self, file_len: usize) -> MapSetResult<()> {
        for e in &self.entries {
            let end = e.offset.checked_add(e.len);
            if end.is_none_or(|end| end > file_len as u64) {
                return Err(MapSetError::SectionOutOfBounds {
                    tag: e.tag.clone(),
                    offset: e.offset,
                    len: e.len,
                    file_len,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn to_archive(&self) -> MapSetResult<rkyv::util::AlignedVec> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| MapSetError::Serialization(e.to_string()))
    }

    pub(crate) fn from_archive(bytes: &[u8]) -> MapSetResult<Self> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<SectionTable, rkyv::rancor::Error>(&aligned)
            .map_err(|e| MapSetError::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_tag() {
        let mut table = SectionTable::new();
        table.push(GEOMETRY_INDEX_TAG, 128, 32);
        table.push("names", 160, 8);

        assert_eq!(table.len(), 2);
        assert!(table.contains(GEOMETRY_INDEX_TAG));
        assert!(!table.contains(SEARCH_INDEX_TAG));
        assert_eq!(table.range("names"), Some(160..168));
    }

    #[test]
    fn test_validate_rejects_overflowing_section() {
        let mut table = SectionTable::new();
        table.push("tail", 100, 50);
        assert!(table.validate(150).is_ok());
        assert!(matches!(
            table.validate(149),
            Err(MapSetError::SectionOutOfBounds { ref tag, .. }) if tag == "tail"
        ));

        let mut table = SectionTable::new();
        table.push("wrap", u64::MAX, 2);
        assert!(table.validate(usize::MAX).is_err());
    }
}
