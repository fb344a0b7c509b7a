//! # mapset
//!
//! Registry of versioned map data packages.
//!
//! Packages are registered from files on disk, leased through RAII handles
//! and kept warm in a small cache once released. Observers hear about
//! registrations, updates and deregistrations.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mapset::prelude::*;
//!
//! let source = open_data_source(Path::new("/data/maps"), RegistryConfig::default())?;
//! let handle = source.get_handle_by_name("Andorra");
//! if let Some(package) = handle.value() {
//!     let index = package.section(GEOMETRY_INDEX_TAG);
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`prelude`] - Import everything with `use mapset::prelude::*`
//! - [`Registry`] - Generic registry over any [`PackageFactory`]
//! - [`platform`] - Memory-mapped packages and local file discovery

pub use mapset_core::{
    Event, EventList, GEOMETRY_INDEX_TAG, LocalPackageFile, MapSetError, MapSetResult, Observer,
    PACKAGE_FILE_EXTENSION, PackageDescriptor, PackageFactory, PackageHandle, PackageId,
    PackageInfo, PackageKind, PackageMeta, PackageWriter, RegResult, Rect, RegionData, Registry,
    RegistryConfig, SEARCH_INDEX_TAG, SectionTable, Status, WORLD_COASTS_FILE_NAME,
    WORLD_FILE_NAME,
};

// Re-export rkyv for custom package factories
pub use rkyv;

/// Package files on disk.
pub mod platform {
    pub use mapset_platform::{
        DataSource, MappedPackage, MmapPackageFactory, data_source, data_source_with_config,
        find_local_packages, find_local_packages_with_extension, open_data_source, register_all,
    };
}

/// Prelude module - import everything you need with one line.
///
/// ```rust,ignore
/// use mapset::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Event, GEOMETRY_INDEX_TAG, LocalPackageFile, MapSetError, MapSetResult, Observer,
        PackageFactory, PackageHandle, PackageId, PackageInfo, RegResult, Registry,
        RegistryConfig, SEARCH_INDEX_TAG, Status,
    };

    pub use crate::platform::{DataSource, MappedPackage, data_source, open_data_source};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl Observer for Log {
        fn on_registered(&self, file: &LocalPackageFile) {
            self.0.lock().unwrap().push(format!("registered {file}"));
        }

        fn on_updated(&self, new: &LocalPackageFile, old: &LocalPackageFile) {
            self.0
                .lock()
                .unwrap()
                .push(format!("updated {old} -> {new}"));
        }

        fn on_deregistered(&self, file: &LocalPackageFile) {
            self.0.lock().unwrap().push(format!("deregistered {file}"));
        }
    }

    #[test]
    fn test_upgrade_while_leased() {
        let dir = tempfile::TempDir::new().unwrap();
        let write = |version: i64| {
            let path = dir
                .path()
                .join(version.to_string())
                .join("Andorra.mpk");
            crate::PackageWriter::new(version, crate::PackageMeta::default())
                .section(GEOMETRY_INDEX_TAG, vec![version as u8; 8])
                .write_to(&path)
                .unwrap();
            LocalPackageFile::new("Andorra", version, path)
        };

        let source = data_source();
        let log = Arc::new(Log::default());
        let observer: Arc<dyn Observer> = log.clone();
        assert!(source.add_observer(observer.clone()));

        let (v1, result) = source.register(write(1));
        assert_eq!(result, RegResult::Success);
        let handle = source.get_handle(&v1);
        assert_eq!(
            handle.value().unwrap().section(GEOMETRY_INDEX_TAG),
            Some(&[1u8; 8][..])
        );

        let (v2, result) = source.register(write(2));
        assert_eq!(result, RegResult::Success);
        let info = v1.info().unwrap();
        assert_eq!(info.status(), Status::MarkedForDeregistration);
        assert!(handle.is_alive());

        drop(handle);
        assert_eq!(info.status(), Status::Deregistered);
        assert!(source.get_handle(&v2).is_alive());

        assert_eq!(
            *log.0.lock().unwrap(),
            vec![
                "registered Andorra v1".to_string(),
                "updated Andorra v1 -> Andorra v2".to_string(),
                "deregistered Andorra v1".to_string(),
            ]
        );
    }
}
