//! Scoped leases on decoded package values.

use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};

use crate::id::PackageId;
use crate::info::PackageInfo;

/// Receives values back from dropped handles.
pub(crate) trait ReleaseValue<V>: Send + Sync {
    fn release(&self, id: &PackageId, value: V);
}

/// A lease on the decoded value of one package version.
///
/// While a populated handle exists its package keeps a non-zero reference
/// count and cannot be deregistered. Dropping the handle gives the value back
/// to the registry that issued it, or drops it if that registry is gone.
pub struct PackageHandle<V> {
    id: PackageId,
    value: Option<V>,
    owner: Option<Weak<dyn ReleaseValue<V>>>,
}

impl<V> PackageHandle<V> {
    pub(crate) fn new(id: PackageId, value: V, owner: Weak<dyn ReleaseValue<V>>) -> Self {
        Self {
            id,
            value: Some(value),
            owner: Some(owner),
        }
    }

    /// A handle without a value: unknown package, or open failed.
    pub fn empty(id: PackageId) -> Self {
        Self {
            id,
            value: None,
            owner: None,
        }
    }

    /// True when the handle holds a value.
    pub fn is_alive(&self) -> bool {
        self.value.is_some()
    }

    pub fn id(&self) -> &PackageId {
        &self.id
    }

    pub fn info(&self) -> Option<&Arc<PackageInfo>> {
        self.id.info()
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn value_mut(&mut self) -> Option<&mut V> {
        self.value.as_mut()
    }
}

impl<V> Default for PackageHandle<V> {
    fn default() -> Self {
        Self::empty(PackageId::default())
    }
}

impl<V> Drop for PackageHandle<V> {
    fn drop(&mut self) {
        let Some(value) = self.value.take() else {
            return;
        };
        if let Some(owner) = self.owner.take().and_then(|weak| weak.upgrade()) {
            owner.release(&self.id, value);
        }
    }
}

impl<V> Debug for PackageHandle<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageHandle")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}
