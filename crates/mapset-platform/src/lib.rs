//! Package files on disk for mapset registries.
//!
//! # Usage
//!
//! ```ignore
//! use mapset_platform::open_data_source;
//! use mapset_core::RegistryConfig;
//!
//! let source = open_data_source(Path::new("/data/maps"), RegistryConfig::default())?;
//! let handle = source.get_handle_by_name("Andorra");
//! if let Some(package) = handle.value() {
//!     let names = package.section("names");
//! }
//! ```

pub mod data_source;
pub mod local_files;
pub mod mmap;

pub use data_source::{DataSource, data_source, data_source_with_config, open_data_source};
pub use local_files::{find_local_packages, find_local_packages_with_extension, register_all};
pub use mmap::{MappedPackage, MmapPackageFactory};
