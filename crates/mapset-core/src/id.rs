//! Shared references to package records.

use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::info::{PackageInfo, Status};

/// Nullable reference to one registered package version.
///
/// Cloning is cheap. Two ids are equal when they point at the same record,
/// not merely at records with the same name and version.
#[derive(Clone, Default)]
pub struct PackageId {
    info: Option<Arc<PackageInfo>>,
}

impl PackageId {
    pub fn new(info: Arc<PackageInfo>) -> Self {
        Self { info: Some(info) }
    }

    pub fn is_null(&self) -> bool {
        self.info.is_none()
    }

    /// True when the record exists and has not been deregistered.
    pub fn is_alive(&self) -> bool {
        self.info
            .as_ref()
            .is_some_and(|info| info.status() != Status::Deregistered)
    }

    pub fn info(&self) -> Option<&Arc<PackageInfo>> {
        self.info.as_ref()
    }

    fn addr(&self) -> usize {
        self.info
            .as_ref()
            .map_or(0, |info| Arc::as_ptr(info) as usize)
    }
}

impl PartialEq for PackageId {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for PackageId {}

impl PartialOrd for PackageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl Hash for PackageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl Display for PackageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.info {
            Some(info) => write!(f, "PackageId [{}]", info.file()),
            None => write!(f, "PackageId [invalid]"),
        }
    }
}

impl Debug for PackageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<Arc<PackageInfo>> for PackageId {
    fn from(info: Arc<PackageInfo>) -> Self {
        Self::new(info)
    }
}
