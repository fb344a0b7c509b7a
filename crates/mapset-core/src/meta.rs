//! Package metadata stored in the archived block after the header.

use rkyv::{Archive, Deserialize, Serialize};

/// Axis-aligned bounding rectangle in projected map coordinates.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

/// Region-level facts about the package contents.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionData {
    /// Language codes spoken in the region, most common first.
    pub languages: Vec<String>,
}

/// Everything the registry needs to know about a package before opening it.
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PackageMeta {
    /// Rect around the region border. Features crossing the border may cross it too.
    pub bounds: Rect,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub region: RegionData,
}

/// Header facts plus decoded metadata for one package file.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDescriptor {
    pub format: u64,
    pub version: i64,
    pub meta: PackageMeta,
}

impl PackageMeta {
    pub(crate) fn to_archive(&self) -> crate::MapSetResult<rkyv::util::AlignedVec> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| crate::MapSetError::Serialization(e.to_string()))
    }

    pub(crate) fn from_archive(bytes: &[u8]) -> crate::MapSetResult<Self> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<PackageMeta, rkyv::rancor::Error>(&aligned)
            .map_err(|e| crate::MapSetError::Deserialization(e.to_string()))
    }
}
