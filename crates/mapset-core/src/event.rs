//! Lifecycle events collected under the registry lock.

use std::fmt::{Display, Formatter, Result};

use crate::file::LocalPackageFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Registered(LocalPackageFile),
    Updated {
        new: LocalPackageFile,
        old: LocalPackageFile,
    },
    Deregistered(LocalPackageFile),
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Event::Registered(file) => write!(f, "Registered [{file}]"),
            Event::Updated { new, old } => write!(f, "Updated [{new}, {old}]"),
            Event::Deregistered(file) => write!(f, "Deregistered [{file}]"),
        }
    }
}

/// Append-only list of events, drained after the lock is released.
#[derive(Debug, Default)]
pub struct EventList {
    events: Vec<Event>,
}

impl EventList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl IntoIterator for EventList {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
