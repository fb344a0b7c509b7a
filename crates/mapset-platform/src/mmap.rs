//! Memory-mapped package values.
//!
//! Provides the package factory used by [`crate::DataSource`].

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;

use mapset_core::{
    GEOMETRY_INDEX_TAG, LocalPackageFile, MapSetError, MapSetResult, PACKAGE_HEADER_SIZE,
    PackageDescriptor, PackageFactory, PackageHeader, PackageInfo, SEARCH_INDEX_TAG, SectionTable,
    read_descriptor, read_header, read_section_table,
};

/// Maps a package file read-only.
fn map_file(path: &Path) -> MapSetResult<Mmap> {
    let file = File::open(path).map_err(|e| MapSetError::OpenFailed(format!("{path:?}: {e}")))?;

    let len = file.metadata()?.len() as usize;
    if len < PACKAGE_HEADER_SIZE {
        return Err(MapSetError::Truncated {
            needed: PACKAGE_HEADER_SIZE,
            actual: len,
        });
    }

    // SAFETY: package files are written once and never modified in place;
    // updates arrive as new files under a new version directory.
    unsafe { Mmap::map(&file).map_err(|e| MapSetError::MmapFailed(e.to_string())) }
}

/// Decoded package value backed by a read-only memory map.
#[derive(Debug)]
pub struct MappedPackage {
    file: LocalPackageFile,
    header: PackageHeader,
    mmap: Mmap,
    sections: Arc<SectionTable>,
}

impl MappedPackage {
    /// Returns the file this value was mapped from.
    pub fn file(&self) -> &LocalPackageFile {
        &self.file
    }

    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    /// Size of the mapped file in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Section table, shared with every other open value of the same package.
    pub fn sections(&self) -> &Arc<SectionTable> {
        &self.sections
    }

    /// Returns the bytes of a section.
    pub fn section(&self, tag: &str) -> Option<&[u8]> {
        self.sections.range(tag).map(|range| &self.mmap[range])
    }

    /// Returns the bytes of a section or [`MapSetError::SectionNotFound`].
    pub fn require_section(&self, tag: &str) -> MapSetResult<&[u8]> {
        self.section(tag)
            .ok_or_else(|| MapSetError::SectionNotFound(tag.to_string()))
    }

    pub fn has_section(&self, tag: &str) -> bool {
        self.sections.contains(tag)
    }

    pub fn has_search_index(&self) -> bool {
        self.has_section(SEARCH_INDEX_TAG)
    }

    pub fn has_geometry_index(&self) -> bool {
        self.has_section(GEOMETRY_INDEX_TAG)
    }
}

/// Factory that reads package metadata and maps package files.
#[derive(Debug, Clone, Default)]
pub struct MmapPackageFactory;

impl MmapPackageFactory {
    pub fn new() -> Self {
        Self
    }
}

impl PackageFactory for MmapPackageFactory {
    type Value = MappedPackage;

    fn read_meta(&self, file: &LocalPackageFile) -> MapSetResult<PackageDescriptor> {
        let mmap = map_file(file.path())?;
        read_descriptor(&mmap)
    }

    fn open_value(&self, info: &Arc<PackageInfo>) -> MapSetResult<MappedPackage> {
        let mmap = map_file(info.file().path())?;
        let header = read_header(&mmap)?;
        let sections = info.shared_sections(|| read_section_table(&mmap, &header))?;

        tracing::debug!(
            "Mapped package {} ({} bytes, {} sections)",
            info.file(),
            mmap.len(),
            sections.len()
        );

        Ok(MappedPackage {
            file: info.file().clone(),
            header,
            mmap,
            sections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapset_core::header::{PACKAGE_META_LEN_OFFSET, write_u64_le};
    use mapset_core::{
        PACKAGE_FORMAT_CURRENT, PackageMeta, PackageWriter, RegResult, Rect, RegionData, Registry,
    };
    use tempfile::TempDir;

    fn meta() -> PackageMeta {
        PackageMeta {
            bounds: Rect::new(-1.0, -1.0, 1.0, 1.0),
            min_zoom: 1,
            max_zoom: 17,
            region: RegionData {
                languages: vec!["ca".to_string()],
            },
        }
    }

    fn write_package(dir: &TempDir, name: &str, version: i64) -> LocalPackageFile {
        let path = dir
            .path()
            .join(version.to_string())
            .join(format!("{name}.mpk"));
        PackageWriter::new(version, meta())
            .section(GEOMETRY_INDEX_TAG, b"geometry bytes".to_vec())
            .section("names", b"Andorra la Vella".to_vec())
            .write_to(&path)
            .unwrap();
        LocalPackageFile::new(name, version, path)
    }

    #[test]
    fn test_register_and_map() {
        let dir = TempDir::new().unwrap();
        let file = write_package(&dir, "Andorra", 240115);
        let registry = Registry::new(MmapPackageFactory::new());

        let (id, result) = registry.register(file.clone());
        assert_eq!(result, RegResult::Success);
        let info = id.info().unwrap();
        assert_eq!(info.format(), PACKAGE_FORMAT_CURRENT);
        assert_eq!(info.max_zoom(), 17);
        assert_eq!(info.bounds(), Rect::new(-1.0, -1.0, 1.0, 1.0));
        assert_eq!(info.region().languages, vec!["ca".to_string()]);

        let handle = registry.get_handle(&id);
        let value = handle.value().unwrap();
        assert_eq!(value.file(), &file);
        assert_eq!(value.section("names"), Some(&b"Andorra la Vella"[..]));
        assert!(value.has_geometry_index());
        assert!(!value.has_search_index());
        assert!(matches!(
            value.require_section(SEARCH_INDEX_TAG),
            Err(MapSetError::SectionNotFound(_))
        ));
    }

    #[test]
    fn test_open_values_share_section_table() {
        let dir = TempDir::new().unwrap();
        let file = write_package(&dir, "Andorra", 1);
        let registry = Registry::new(MmapPackageFactory::new());
        let (id, _) = registry.register(file);

        let first = registry.get_handle(&id);
        let second = registry.get_handle(&id);
        assert!(Arc::ptr_eq(
            first.value().unwrap().sections(),
            second.value().unwrap().sections()
        ));
    }

    #[test]
    fn test_bad_and_unsupported_files() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::new(MmapPackageFactory::new());

        let garbage = dir.path().join("1").join("Garbage.mpk");
        std::fs::create_dir_all(garbage.parent().unwrap()).unwrap();
        std::fs::write(&garbage, vec![0x55u8; 256]).unwrap();
        let (id, result) = registry.register(LocalPackageFile::new("Garbage", 1, &garbage));
        assert_eq!(result, RegResult::BadFile);
        assert!(id.is_null());

        let short = dir.path().join("1").join("Short.mpk");
        std::fs::write(&short, b"tiny").unwrap();
        assert_eq!(
            registry
                .register(LocalPackageFile::new("Short", 1, &short))
                .1,
            RegResult::BadFile
        );

        let missing = LocalPackageFile::new("Missing", 1, dir.path().join("nope.mpk"));
        assert_eq!(registry.register(missing).1, RegResult::BadFile);

        let future = dir.path().join("1").join("Future.mpk");
        PackageWriter::new(1, meta())
            .with_format(PACKAGE_FORMAT_CURRENT + 1)
            .write_to(&future)
            .unwrap();
        assert_eq!(
            registry
                .register(LocalPackageFile::new("Future", 1, &future))
                .1,
            RegResult::UnsupportedFileFormat
        );

        assert!(registry.infos().is_empty());
    }

    #[test]
    fn test_overflowing_block_length_is_bad_file() {
        let dir = TempDir::new().unwrap();
        let file = write_package(&dir, "Andorra", 1);
        let mut bytes = std::fs::read(file.path()).unwrap();
        write_u64_le(&mut bytes, PACKAGE_META_LEN_OFFSET, u64::MAX).unwrap();
        std::fs::write(file.path(), &bytes).unwrap();

        let registry = Registry::new(MmapPackageFactory::new());
        let (id, result) = registry.register(file);
        assert_eq!(result, RegResult::BadFile);
        assert!(id.is_null());
        assert!(registry.infos().is_empty());
    }

    #[test]
    fn test_file_removed_after_registration() {
        let dir = TempDir::new().unwrap();
        let file = write_package(&dir, "Andorra", 1);
        let registry = Registry::new(MmapPackageFactory::new());
        let (id, _) = registry.register(file.clone());

        std::fs::remove_file(file.path()).unwrap();
        let handle = registry.get_handle(&id);
        assert!(!handle.is_alive());
        assert!(!id.is_alive());
    }
}
