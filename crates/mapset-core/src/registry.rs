//! Catalog of registered packages with leased access to their values.
//!
//! All catalog and cache state sits behind one mutex. Every operation runs in
//! two phases: mutate under the lock while collecting [`Effects`], then, with
//! the lock released, drop the values that left the cache and dispatch events
//! to observers. Observer callbacks and package I/O never run under the lock.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::cache::ValueCache;
use crate::event::{Event, EventList};
use crate::file::LocalPackageFile;
use crate::handle::{PackageHandle, ReleaseValue};
use crate::id::PackageId;
use crate::info::{PackageInfo, Status};
use crate::meta::PackageDescriptor;
use crate::observer::{Observer, ObserverList};
use crate::{MapSetError, PackageFactory};


/// Default number of warm values kept after their last handle is released.
pub const DEFAULT_CACHE_SIZE: usize = 64;

/// Registry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of cached values (defaults to [`DEFAULT_CACHE_SIZE`]).
    pub cache_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

impl RegistryConfig {
    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }
}

/// Outcome of [`Registry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegResult {
    Success,
    VersionAlreadyExists,
    VersionTooOld,
    UnsupportedFileFormat,
    BadFile,
}

impl RegResult {
    /// Classifies a metadata read failure.
    pub fn from_error(error: &MapSetError) -> Self {
        if error.is_unsupported_format() {
            RegResult::UnsupportedFileFormat
        } else {
            RegResult::BadFile
        }
    }
}

impl Display for RegResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RegResult::Success => "Success",
            RegResult::VersionAlreadyExists => "VersionAlreadyExists",
            RegResult::VersionTooOld => "VersionTooOld",
            RegResult::UnsupportedFileFormat => "UnsupportedFileFormat",
            RegResult::BadFile => "BadFile",
        };
        f.write_str(s)
    }
}

/// Side effects of one critical section, applied after the lock is released.
struct Effects<V> {
    events: EventList,
    garbage: Vec<V>,
}

impl<V> Default for Effects<V> {
    fn default() -> Self {
        Self {
            events: EventList::new(),
            garbage: Vec::new(),
        }
    }
}

/// Result of the locked half of a handle acquisition.
enum Lease<V> {
    Cached(V),
    Open(Arc<PackageInfo>),
    Unavailable,
}

/// State protected by the registry lock.
struct State<V> {
    catalog: HashMap<String, Vec<Arc<PackageInfo>>>,
    cache: ValueCache<V>,
}

impl<V> State<V> {
    fn latest(&self, name: &str) -> Option<&Arc<PackageInfo>> {
        self.catalog.get(name).and_then(|infos| infos.last())
    }

    fn contains(&self, info: &Arc<PackageInfo>) -> bool {
        self.catalog
            .get(info.name())
            .is_some_and(|infos| infos.iter().any(|i| Arc::ptr_eq(i, info)))
    }

    fn set_status(info: &PackageInfo, status: Status, effects: &mut Effects<V>) {
        let old = info.set_status(status);
        if old == status {
            return;
        }
        match status {
            Status::Registered => effects.events.add(Event::Registered(info.file().clone())),
            Status::MarkedForDeregistration => {}
            Status::Deregistered => effects.events.add(Event::Deregistered(info.file().clone())),
        }
    }

    /// Settles a registration against the latest known version, if it can be
    /// settled without reading the file.
    fn resolve_existing(
        &self,
        file: &LocalPackageFile,
        effects: &mut Effects<V>,
    ) -> Option<(PackageId, RegResult)> {
        let info = self.latest(file.name())?;
        if info.status() == Status::Deregistered {
            return None;
        }

        match info.version().cmp(&file.version()) {
            Ordering::Less => None,
            Ordering::Equal => {
                tracing::warn!("Trying to add already registered package: {file}");
                Self::set_status(info, Status::Registered, effects);
                Some((PackageId::new(info.clone()), RegResult::VersionAlreadyExists))
            }
            Ordering::Greater => {
                tracing::warn!(
                    "Trying to add too old package {file}, current version: {}",
                    info.version()
                );
                Some((PackageId::default(), RegResult::VersionTooOld))
            }
        }
    }

    fn register(
        &mut self,
        file: LocalPackageFile,
        descriptor: PackageDescriptor,
        effects: &mut Effects<V>,
    ) -> (PackageId, RegResult) {
        if let Some(result) = self.resolve_existing(&file, effects) {
            return result;
        }

        let old = self
            .latest(file.name())
            .filter(|info| info.status() != Status::Deregistered)
            .cloned();

        // The old version's own events are folded into a single update.
        let mut sub = Effects::default();
        if let Some(old) = &old {
            self.deregister(old, &mut sub);
        }
        effects.garbage.append(&mut sub.garbage);

        let info = Arc::new(PackageInfo::new(file, descriptor));
        self.catalog
            .entry(info.name().to_owned())
            .or_default()
            .push(info.clone());

        match old {
            Some(old) => {
                tracing::debug!("Updated package {} -> {}", old.file(), info.file());
                effects.events.add(Event::Updated {
                    new: info.file().clone(),
                    old: old.file().clone(),
                });
            }
            None => {
                tracing::debug!("Registered package {}", info.file());
                effects.events.add(Event::Registered(info.file().clone()));
            }
        }

        (PackageId::new(info), RegResult::Success)
    }

    /// Deregisters `info` now if nothing holds it, otherwise marks it so the
    /// last handle release finishes the job. Returns true if it was removed.
    fn deregister(&mut self, info: &Arc<PackageInfo>, effects: &mut Effects<V>) -> bool {
        if info.status() == Status::Deregistered {
            return false;
        }

        let id = PackageId::new(info.clone());
        effects.garbage.append(&mut self.cache.remove_package(&id));

        if info.num_refs() == 0 {
            Self::set_status(info, Status::Deregistered, effects);
            if let Some(infos) = self.catalog.get_mut(info.name()) {
                infos.retain(|i| !Arc::ptr_eq(i, info));
                if infos.is_empty() {
                    self.catalog.remove(info.name());
                }
            }
            return true;
        }

        tracing::debug!(
            "Package {} has {} open handles, deregistration deferred",
            info.file(),
            info.num_refs()
        );
        Self::set_status(info, Status::MarkedForDeregistration, effects);
        false
    }

    fn lock_value(&mut self, id: &PackageId) -> Lease<V> {
        let Some(info) = id.info() else {
            return Lease::Unavailable;
        };
        if !info.is_registered() {
            return Lease::Unavailable;
        }

        info.add_ref();
        match self.cache.take(id) {
            Some(value) => Lease::Cached(value),
            None => Lease::Open(info.clone()),
        }
    }

    fn unlock_value(&mut self, id: &PackageId, value: V, effects: &mut Effects<V>) {
        let Some(info) = id.info() else {
            effects.garbage.push(value);
            return;
        };

        if info.release_ref() == 0 && info.status() == Status::MarkedForDeregistration {
            self.deregister(info, effects);
        }

        if info.is_up_to_date() && self.contains(info) {
            let mut evicted = self.cache.insert(id.clone(), value);
            if !evicted.is_empty() {
                tracing::trace!("Evicted {} cached values", evicted.len());
            }
            effects.garbage.append(&mut evicted);
        } else {
            effects.garbage.push(value);
        }
    }

    /// Undoes [`State::lock_value`] after the value failed to open.
    fn abandon_value(&mut self, info: &Arc<PackageInfo>, effects: &mut Effects<V>) {
        info.release_ref();
        self.deregister(info, effects);
    }
}

struct Shared<F: PackageFactory> {
    factory: F,
    config: RegistryConfig,
    state: Mutex<State<F::Value>>,
    observers: ObserverList,
}

impl<F: PackageFactory> Shared<F> {
    fn lock_state(&self) -> MutexGuard<'_, State<F::Value>> {
        // Every critical section leaves the state consistent between
        // statements, so a panic elsewhere does not corrupt it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The only way to take the lock. Effects are applied once it is released.
    fn with_event_log<R>(
        &self,
        f: impl FnOnce(&mut State<F::Value>, &mut Effects<F::Value>) -> R,
    ) -> R {
        let mut effects = Effects::default();
        let result = {
            let mut state = self.lock_state();
            f(&mut state, &mut effects)
        };
        drop(effects.garbage);
        self.observers.dispatch(effects.events);
        result
    }
}

impl<F: PackageFactory> ReleaseValue<F::Value> for Shared<F> {
    fn release(&self, id: &PackageId, value: F::Value) {
        self.with_event_log(|state, effects| state.unlock_value(id, value, effects));
    }
}

/// Thread-safe registry of versioned map packages.
///
/// Cloning is cheap and every clone refers to the same catalog.
pub struct Registry<F: PackageFactory> {
    shared: Arc<Shared<F>>,
}

impl<F: PackageFactory> Clone for Registry<F> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<F: PackageFactory> Debug for Registry<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Observer dispatch may call back into the registry, so the state
        // lock is never held while the observer list is locked.
        let (packages, cached) = {
            let state = self.shared.lock_state();
            (state.catalog.len(), state.cache.len())
        };
        f.debug_struct("Registry")
            .field("config", &self.shared.config)
            .field("packages", &packages)
            .field("cached", &cached)
            .field("observers", &self.shared.observers)
            .finish()
    }
}

impl<F: PackageFactory> Registry<F> {
    /// Creates a registry with the default configuration.
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, RegistryConfig::default())
    }

    pub fn with_config(factory: F, config: RegistryConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                factory,
                config,
                state: Mutex::new(State {
                    catalog: HashMap::new(),
                    cache: ValueCache::new(config.cache_size),
                }),
                observers: ObserverList::new(),
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.shared.config
    }

    pub fn factory(&self) -> &F {
        &self.shared.factory
    }

    /// Registers a package file.
    ///
    /// Returns the id of the already registered entry for the same version,
    /// the id of the new entry when every registered version is older, or a
    /// null id when the file is older than what is registered or unreadable.
    pub fn register(&self, file: LocalPackageFile) -> (PackageId, RegResult) {
        if let Some(result) = self
            .shared
            .with_event_log(|state, effects| state.resolve_existing(&file, effects))
        {
            return result;
        }

        let descriptor = match self.shared.factory.read_meta(&file) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                let result = RegResult::from_error(&e);
                tracing::warn!("Failed to register {file}: {e} ({result})");
                return (PackageId::default(), result);
            }
        };
        if descriptor.version != file.version() {
            tracing::warn!(
                "Package {file} reports data version {}",
                descriptor.version
            );
        }

        self.shared
            .with_event_log(|state, effects| state.register(file, descriptor, effects))
    }

    /// Deregisters every alive version of `name`.
    ///
    /// Versions with open handles are only marked and finish deregistering
    /// when their last handle is released. Returns true if at least one
    /// version existed and all of them were removed immediately.
    pub fn deregister(&self, name: &str) -> bool {
        self.shared.with_event_log(|state, effects| {
            let infos: Vec<_> = state
                .catalog
                .get(name)
                .map(|infos| {
                    infos
                        .iter()
                        .filter(|i| i.status() != Status::Deregistered)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            if infos.is_empty() {
                return false;
            }
            let mut all = true;
            for info in &infos {
                all &= state.deregister(info, effects);
            }
            all
        })
    }

    /// Deregisters one package version. See [`Registry::deregister`].
    pub fn deregister_id(&self, id: &PackageId) -> bool {
        let Some(info) = id.info().filter(|_| id.is_alive()) else {
            return false;
        };
        self.shared
            .with_event_log(|state, effects| state.deregister(info, effects))
    }

    /// Id of the latest registered version of `name`, or a null id.
    pub fn package_id(&self, name: &str) -> PackageId {
        self.shared
            .lock_state()
            .latest(name)
            .map(|info| PackageId::new(info.clone()))
            .unwrap_or_default()
    }

    /// True when the latest version of `name` is registered and usable.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.shared
            .lock_state()
            .latest(name)
            .is_some_and(|info| info.is_registered())
    }

    /// Snapshot of every catalog entry. Some may be marked for deregistration.
    pub fn infos(&self) -> Vec<Arc<PackageInfo>> {
        self.shared
            .lock_state()
            .catalog
            .values()
            .flatten()
            .cloned()
            .collect()
    }

    /// Leases the value of a package version.
    ///
    /// The handle is empty when the package is not registered any more or
    /// its value cannot be opened. A package that fails to open is
    /// deregistered.
    pub fn get_handle(&self, id: &PackageId) -> PackageHandle<F::Value> {
        let lease = self.shared.with_event_log(|state, _| state.lock_value(id));
        match lease {
            Lease::Cached(value) => PackageHandle::new(id.clone(), value, self.owner()),
            Lease::Unavailable => PackageHandle::empty(id.clone()),
            Lease::Open(info) => match self.shared.factory.open_value(&info) {
                Ok(value) => PackageHandle::new(id.clone(), value, self.owner()),
                Err(e) => {
                    tracing::error!("Can't open package {}: {e}", info.file());
                    self.shared
                        .with_event_log(|state, effects| state.abandon_value(&info, effects));
                    PackageHandle::empty(id.clone())
                }
            },
        }
    }

    /// Leases the value of the latest version of `name`.
    pub fn get_handle_by_name(&self, name: &str) -> PackageHandle<F::Value> {
        let id = self.package_id(name);
        self.get_handle(&id)
    }

    /// Drops every cached value. Open handles are unaffected.
    pub fn clear_cache(&self) {
        self.shared.with_event_log(|state, effects| {
            effects.garbage.append(&mut state.cache.clear());
        });
    }

    /// Empties the cache and the catalog without notifying observers and
    /// without changing package statuses.
    pub fn clear(&self) {
        self.shared.with_event_log(|state, effects| {
            effects.garbage.append(&mut state.cache.clear());
            state.catalog.clear();
        });
    }

    /// Number of values currently cached.
    pub fn cache_len(&self) -> usize {
        self.shared.lock_state().cache.len()
    }

    /// Adds an observer. Returns false if it was already added.
    pub fn add_observer(&self, observer: Arc<dyn Observer>) -> bool {
        self.shared.observers.add(observer)
    }

    /// Removes an observer. Returns false if it was not present.
    pub fn remove_observer(&self, observer: &Arc<dyn Observer>) -> bool {
        self.shared.observers.remove(observer)
    }

    fn owner(&self) -> Weak<dyn ReleaseValue<F::Value>> {
        let shared: Arc<dyn ReleaseValue<F::Value>> = self.shared.clone();
        Arc::downgrade(&shared)
    }
}
