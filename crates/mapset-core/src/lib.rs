//! Types and traits for registering map packages and leasing their values.

use std::sync::Arc;

pub mod cache;
pub mod error;
pub mod event;
pub mod file;
pub mod format;
pub mod handle;
pub mod header;
pub mod id;
pub mod info;
pub mod meta;
pub mod observer;
pub mod registry;
pub mod sections;

mod package_format_spec {
    include!(concat!(env!("OUT_DIR"), "/package_format_spec.rs"));
}

pub use error::{MapSetError, MapSetResult};

/// Opens package files for a [`Registry`].
///
/// Implementations are called without the registry lock held, possibly from
/// several threads at once.
pub trait PackageFactory: Send + Sync + 'static {
    /// Decoded in-memory representation of one package.
    type Value: Send + 'static;

    /// Reads the header and metadata needed to register `file`.
    ///
    /// Return [`MapSetError::UnsupportedFormat`] for a readable file in an
    /// unknown format; any other error marks the file as bad.
    fn read_meta(&self, file: &LocalPackageFile) -> MapSetResult<PackageDescriptor>;

    /// Decodes the value of a registered package.
    fn open_value(&self, info: &Arc<PackageInfo>) -> MapSetResult<Self::Value>;
}

pub use cache::ValueCache;
pub use event::{Event, EventList};
pub use file::{
    LocalPackageFile, PACKAGE_FILE_EXTENSION, WORLD_COASTS_FILE_NAME, WORLD_FILE_NAME,
};
pub use format::{PackageWriter, read_descriptor, read_section_table};
pub use handle::PackageHandle;
pub use id::PackageId;
pub use info::{PackageInfo, PackageKind, Status};
pub use meta::{PackageDescriptor, PackageMeta, Rect, RegionData};
pub use observer::{Observer, ObserverList};
pub use registry::{DEFAULT_CACHE_SIZE, RegResult, Registry, RegistryConfig};
pub use sections::{GEOMETRY_INDEX_TAG, SEARCH_INDEX_TAG, SectionEntry, SectionTable};

pub use header::{
    PACKAGE_BLOCK_ALIGNMENT, PACKAGE_FORMAT_CURRENT, PACKAGE_FORMAT_MIN, PACKAGE_HEADER_SIZE,
    PACKAGE_MAGIC, PackageHeader, read_header, validate_magic, write_header,
};
