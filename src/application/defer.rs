//! Per-request registry of deferred producers.
//!
//! Entries are drained in `defer()` call order. Producers may defer again
//! while the registry drains; the new entries join the back of the same queue
//! and are resolved in the same pass, so a flush always ends with an empty
//! registry.

use std::{collections::VecDeque, fmt};

use crate::domain::marker::Marker;

use super::filter::RenderResult;
use super::request::Request;

pub type DeferredProducer = Box<dyn FnOnce(&mut Request) -> RenderResult>;

pub struct DeferEntry {
    pub marker: Marker,
    pub producer: DeferredProducer,
}

impl fmt::Debug for DeferEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferEntry")
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferState {
    Empty,
    Accumulating,
    Draining,
}

#[derive(Debug)]
pub struct DeferRegistry {
    pending: VecDeque<DeferEntry>,
    state: DeferState,
}

impl Default for DeferRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferRegistry {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            state: DeferState::Empty,
        }
    }

    pub fn state(&self) -> DeferState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn push(&mut self, marker: Marker, producer: DeferredProducer) {
        self.pending.push_back(DeferEntry { marker, producer });
        if self.state == DeferState::Empty {
            self.state = DeferState::Accumulating;
        }
    }

    /// Take the next entry to resolve, entering the draining state.
    pub fn next_for_drain(&mut self) -> Option<DeferEntry> {
        let entry = self.pending.pop_front()?;
        self.state = DeferState::Draining;
        Some(entry)
    }

    /// Mark the drain complete once the queue has run dry.
    pub fn finish_drain(&mut self) {
        debug_assert!(self.pending.is_empty());
        self.state = DeferState::Empty;
    }

    /// Discard everything still pending after a failed drain. Returns how many
    /// entries were dropped.
    pub fn abandon(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.state = DeferState::Empty;
        dropped
    }
}

/// Replace the first occurrence of `marker` in `buffer`. Returns false when
/// the marker does not occur.
pub(crate) fn substitute_first(buffer: &mut String, marker: &str, replacement: &str) -> bool {
    match buffer.find(marker) {
        Some(start) => {
            buffer.replace_range(start..start + marker.len(), replacement);
            true
        }
        None => false,
    }
}
