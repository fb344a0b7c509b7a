//! Identity of one package file on disk.

use std::fmt::{Display, Formatter, Result};
use std::path::{Path, PathBuf};

/// Default package file extension.
pub const PACKAGE_FILE_EXTENSION: &str = "mpk";

/// Name of the world overview package.
pub const WORLD_FILE_NAME: &str = "World";

/// Name of the world coastlines package.
pub const WORLD_COASTS_FILE_NAME: &str = "WorldCoasts";

/// A package file on the local filesystem.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocalPackageFile {
    name: String,
    version: i64,
    path: PathBuf,
}

impl Display for LocalPackageFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

impl LocalPackageFile {
    /// Creates a new package file description.
    #[must_use]
    pub fn new(name: &str, version: i64, path: impl Into<PathBuf>) -> Self {
        LocalPackageFile {
            name: name.to_owned(),
            version,
            path: path.into(),
        }
    }

    /// Gets the package name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the package data version.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Gets the path of the package file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Builds the package file name for a name and extension.
    #[must_use]
    pub fn to_file_name(name: &str, extension: &str) -> String {
        format!("{name}.{extension}")
    }

    /// Builds the relative path `<version>/<name>.<extension>`.
    #[must_use]
    pub fn to_relative_path(name: &str, version: i64, extension: &str) -> PathBuf {
        PathBuf::from(version.to_string()).join(Self::to_file_name(name, extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_paths() {
        let file = LocalPackageFile::new("Andorra", 240115, "/maps/240115/Andorra.mpk");
        assert_eq!(file.to_string(), "Andorra v240115");
        assert_eq!(file.name(), "Andorra");
        assert_eq!(file.version(), 240115);
        assert_eq!(
            LocalPackageFile::to_relative_path("Andorra", 240115, PACKAGE_FILE_EXTENSION),
            PathBuf::from("240115/Andorra.mpk")
        );
    }
}
