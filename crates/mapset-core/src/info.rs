//! Per-version package records shared by the catalog, ids and handles.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::file::{LocalPackageFile, WORLD_COASTS_FILE_NAME, WORLD_FILE_NAME};
use crate::meta::{PackageDescriptor, Rect, RegionData};
use crate::sections::SectionTable;

/// Lifecycle state of a registered package version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    /// Registered and up to date.
    Registered = 0,
    /// Will be deregistered as soon as its last handle is released.
    MarkedForDeregistration = 1,
    /// Removed from the catalog.
    Deregistered = 2,
}

impl Status {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Status::Registered,
            1 => Status::MarkedForDeregistration,
            _ => Status::Deregistered,
        }
    }
}

/// Kind of package, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageKind {
    Country,
    World,
    Coasts,
}

impl PackageKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            WORLD_FILE_NAME => PackageKind::World,
            WORLD_COASTS_FILE_NAME => PackageKind::Coasts,
            _ => PackageKind::Country,
        }
    }
}

/// Information about one registered package version.
///
/// Status and reference count are only written by the registry while it holds
/// its lock; status may be read from anywhere without it.
#[derive(Debug)]
pub struct PackageInfo {
    file: LocalPackageFile,
    format: u64,
    bounds: Rect,
    min_zoom: u8,
    max_zoom: u8,
    region: RegionData,
    status: AtomicU8,
    num_refs: AtomicU32,
    // Non-owning: lives as long as some opened value holds the Arc.
    sections: Mutex<Weak<SectionTable>>,
}

impl PackageInfo {
    pub(crate) fn new(file: LocalPackageFile, descriptor: PackageDescriptor) -> Self {
        let meta = descriptor.meta;
        Self {
            file,
            format: descriptor.format,
            bounds: meta.bounds,
            min_zoom: meta.min_zoom,
            max_zoom: meta.max_zoom,
            region: meta.region,
            status: AtomicU8::new(Status::Registered as u8),
            num_refs: AtomicU32::new(0),
            sections: Mutex::new(Weak::new()),
        }
    }

    pub fn file(&self) -> &LocalPackageFile {
        &self.file
    }

    pub fn name(&self) -> &str {
        self.file.name()
    }

    pub fn version(&self) -> i64 {
        self.file.version()
    }

    /// Package file format version.
    pub fn format(&self) -> u64 {
        self.format
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn region(&self) -> &RegionData {
        &self.region
    }

    pub fn kind(&self) -> PackageKind {
        PackageKind::from_name(self.name())
    }

    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn is_registered(&self) -> bool {
        self.status() == Status::Registered
    }

    pub fn is_up_to_date(&self) -> bool {
        self.is_registered()
    }

    /// Number of outstanding handles.
    pub fn num_refs(&self) -> u32 {
        self.num_refs.load(Ordering::Relaxed)
    }

    /// Returns the section table shared by every open value of this package,
    /// loading it if no value currently holds one.
    pub fn shared_sections<E>(
        &self,
        load: impl FnOnce() -> Result<SectionTable, E>,
    ) -> Result<Arc<SectionTable>, E> {
        let mut slot = self.sections.lock();
        if let Some(table) = slot.upgrade() {
            return Ok(table);
        }
        let table = Arc::new(load()?);
        *slot = Arc::downgrade(&table);
        Ok(table)
    }

    /// Swaps the status, returning the previous one.
    pub(crate) fn set_status(&self, status: Status) -> Status {
        Status::from_u8(self.status.swap(status as u8, Ordering::AcqRel))
    }

    pub(crate) fn add_ref(&self) -> u32 {
        self.num_refs.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn release_ref(&self) -> u32 {
        let prev = self.num_refs.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "refcount underflow on {}", self.file);
        prev - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::PackageMeta;

    fn info(name: &str) -> PackageInfo {
        PackageInfo::new(
            LocalPackageFile::new(name, 1, format!("/maps/1/{name}.mpk")),
            PackageDescriptor {
                format: 2,
                version: 1,
                meta: PackageMeta::default(),
            },
        )
    }

    #[test]
    fn test_status_transitions() {
        let info = info("Andorra");
        assert!(info.is_registered());
        assert_eq!(
            info.set_status(Status::MarkedForDeregistration),
            Status::Registered
        );
        assert!(!info.is_up_to_date());
        assert_eq!(
            info.set_status(Status::Deregistered),
            Status::MarkedForDeregistration
        );
        assert_eq!(info.status(), Status::Deregistered);
    }

    #[test]
    fn test_kind_from_name() {
        assert_eq!(info("World").kind(), PackageKind::World);
        assert_eq!(info("WorldCoasts").kind(), PackageKind::Coasts);
        assert_eq!(info("Andorra").kind(), PackageKind::Country);
    }

    #[test]
    fn test_shared_sections_are_not_kept_alive() {
        let info = info("Andorra");
        let mut loads = 0;

        let first = info
            .shared_sections(|| {
                loads += 1;
                Ok::<_, ()>(SectionTable::new())
            })
            .unwrap();
        let second = info
            .shared_sections(|| {
                loads += 1;
                Ok::<_, ()>(SectionTable::new())
            })
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads, 1);

        drop(first);
        drop(second);
        let _third = info
            .shared_sections(|| {
                loads += 1;
                Ok::<_, ()>(SectionTable::new())
            })
            .unwrap();
        assert_eq!(loads, 2);
    }
}
