//! Registry of memory-mapped packages.

use std::path::Path;

use mapset_core::{MapSetResult, Registry, RegistryConfig};

use crate::local_files::register_all;
use crate::mmap::MmapPackageFactory;

/// Registry whose values are memory-mapped package files.
pub type DataSource = Registry<MmapPackageFactory>;

/// Creates an empty data source with the default configuration.
pub fn data_source() -> DataSource {
    Registry::new(MmapPackageFactory::new())
}

pub fn data_source_with_config(config: RegistryConfig) -> DataSource {
    Registry::with_config(MmapPackageFactory::new(), config)
}

/// Creates a data source and registers every package found under `root`.
pub fn open_data_source(root: &Path, config: RegistryConfig) -> MapSetResult<DataSource> {
    let source = data_source_with_config(config);
    register_all(&source, root)?;
    Ok(source)
}
