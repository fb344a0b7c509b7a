//! Discovery of package files stored on disk.
//!
//! Packages live under `<root>/<version>/<name>.<extension>`, where the
//! version directory name is a decimal data version.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use mapset_core::{
    LocalPackageFile, MapSetResult, PACKAGE_FILE_EXTENSION, PackageFactory, PackageId, RegResult,
    Registry,
};

/// Finds every package file under `root` with the default extension.
pub fn find_local_packages(root: &Path) -> MapSetResult<Vec<LocalPackageFile>> {
    find_local_packages_with_extension(root, PACKAGE_FILE_EXTENSION)
}

/// Finds every package file under `root` ending in `.{extension}`.
///
/// Results are sorted by name, then by ascending version. Entries that are
/// not numeric version directories are ignored.
pub fn find_local_packages_with_extension(
    root: &Path,
    extension: &str,
) -> MapSetResult<Vec<LocalPackageFile>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(root)?.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let Some(version) = parse_version(&dir) else {
            tracing::trace!("Skipping non-version directory {:?}", dir);
            continue;
        };

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to read version directory {:?}: {}", dir, e);
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|n| n.to_str()) {
                files.push(LocalPackageFile::new(name, version, &path));
            }
        }
    }

    files.sort_by(|a, b| {
        a.name()
            .cmp(b.name())
            .then_with(|| a.version().cmp(&b.version()))
    });
    Ok(files)
}

fn parse_version(dir: &Path) -> Option<i64> {
    let name = dir.file_name()?.to_str()?;
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// Registers every package found under `root`.
///
/// Versions of the same package are registered newest first, so older copies
/// are rejected as [`RegResult::VersionTooOld`] without being read.
pub fn register_all<F: PackageFactory>(
    registry: &Registry<F>,
    root: &Path,
) -> MapSetResult<Vec<(LocalPackageFile, PackageId, RegResult)>> {
    let mut by_name: BTreeMap<String, Vec<LocalPackageFile>> = BTreeMap::new();
    for file in find_local_packages(root)? {
        by_name.entry(file.name().to_string()).or_default().push(file);
    }

    let mut results = Vec::new();
    for files in by_name.into_values() {
        for file in files.into_iter().rev() {
            let (id, result) = registry.register(file.clone());
            results.push((file, id, result));
        }
    }

    let registered = results
        .iter()
        .filter(|(_, _, result)| *result == RegResult::Success)
        .count();
    tracing::info!(
        "Registered {} of {} local packages from {:?}",
        registered,
        results.len(),
        root
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MmapPackageFactory;
    use mapset_core::{PackageMeta, PackageWriter};
    use tempfile::TempDir;

    fn write(root: &Path, version: &str, file_name: &str, data_version: i64) {
        PackageWriter::new(data_version, PackageMeta::default())
            .write_to(root.join(version).join(file_name))
            .unwrap();
    }

    #[test]
    fn test_find_local_packages() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "2", "Spain.mpk", 2);
        write(dir.path(), "1", "Spain.mpk", 1);
        write(dir.path(), "1", "Andorra.mpk", 1);
        write(dir.path(), "1", "Notes.txt", 1);
        write(dir.path(), "latest", "Spain.mpk", 3);
        fs::write(dir.path().join("README"), b"not a package").unwrap();

        let found = find_local_packages(dir.path()).unwrap();
        let listed: Vec<_> = found
            .iter()
            .map(|f| (f.name().to_string(), f.version()))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("Andorra".to_string(), 1),
                ("Spain".to_string(), 1),
                ("Spain".to_string(), 2),
            ]
        );
        assert_eq!(found[2].path(), dir.path().join("2").join("Spain.mpk"));

        let other = find_local_packages_with_extension(dir.path(), "txt").unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].name(), "Notes");
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        assert!(find_local_packages(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn test_register_all_newest_first() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "1", "Spain.mpk", 1);
        write(dir.path(), "3", "Spain.mpk", 3);
        write(dir.path(), "2", "Andorra.mpk", 2);

        let registry = Registry::new(MmapPackageFactory::new());
        let results = register_all(&registry, dir.path()).unwrap();

        let summary: Vec<_> = results
            .iter()
            .map(|(file, _, result)| (file.name().to_string(), file.version(), *result))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Andorra".to_string(), 2, RegResult::Success),
                ("Spain".to_string(), 3, RegResult::Success),
                ("Spain".to_string(), 1, RegResult::VersionTooOld),
            ]
        );
        assert_eq!(registry.package_id("Spain").info().unwrap().version(), 3);
        assert_eq!(registry.infos().len(), 2);
    }
}
