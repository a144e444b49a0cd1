//! ThrowRegistry - raise observations keyed by error identity.
//!
//! Entries are weak: each one holds a `Weak` handle to its error, and an entry
//! whose error has no strong references left is dropped by the next sweep. The
//! `Weak` also keeps the allocation reserved, so a stale entry can never be
//! mistaken for a new error that happens to reuse the address.
//!
//! The map is sharded (`DashMap`), so raises of unrelated errors on different
//! threads only contend when they hash to the same shard. Appends for one
//! identity happen under that shard's lock, and the sequence number is stamped
//! there, so the append order of an entry is its raise chronology.

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Weak;
use tracing::trace;

use crate::context::{ContextSnapshot, LogContext};
use crate::error_ref::{DynError, ErrorIdentity, ErrorRef};
use crate::event::LogEvent;
use crate::flow::FlowSnapshot;

/// Default entry count that triggers the first sweep
pub const DEFAULT_SWEEP_THRESHOLD: usize = 1024;

static GLOBAL: Lazy<ThrowRegistry> =
    Lazy::new(|| ThrowRegistry::with_sweep_threshold(crate::config::global().sweep_threshold));

/// The process-wide registry fed by the raise hook.
pub fn global() -> &'static ThrowRegistry {
    &GLOBAL
}

/// What was ambient at one raise of one error.
#[derive(Debug, Clone)]
pub struct CapturedObservation {
    context: ContextSnapshot,
    flow: Option<FlowSnapshot>,
    sequence: u64,
}

impl CapturedObservation {
    /// Capture the current log context, and the flow state if `with_flow`.
    ///
    /// The sequence number is assigned when the observation is recorded.
    pub fn capture(with_flow: bool) -> Self {
        Self::new(LogContext::snapshot(), with_flow.then(FlowSnapshot::capture))
    }

    pub fn new(context: ContextSnapshot, flow: Option<FlowSnapshot>) -> Self {
        Self {
            context,
            flow,
            sequence: 0,
        }
    }

    pub fn context(&self) -> &ContextSnapshot {
        &self.context
    }

    pub fn flow(&self) -> Option<&FlowSnapshot> {
        self.flow.as_ref()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Apply the captured context to `event`, inside the captured flow if there is one.
    pub fn replay_onto(&self, event: &mut LogEvent) {
        match &self.flow {
            Some(flow) => flow.replay(|| self.context.apply(event)),
            None => self.context.apply(event),
        }
    }
}

struct RegistryEntry {
    error: Weak<DynError>,
    observations: Vec<CapturedObservation>,
}

impl RegistryEntry {
    fn new(error: &ErrorRef) -> Self {
        Self {
            error: error.downgrade(),
            observations: Vec::new(),
        }
    }

    fn is_live(&self) -> bool {
        self.error.strong_count() > 0
    }
}

pub struct ThrowRegistry {
    entries: DashMap<ErrorIdentity, RegistryEntry>,
    /// Tracked separately: `DashMap::len` visits every shard
    entry_count: AtomicUsize,
    sequence: AtomicU64,
    min_sweep_threshold: usize,
    next_sweep_at: AtomicUsize,
}

impl ThrowRegistry {
    pub fn new() -> Self {
        Self::with_sweep_threshold(DEFAULT_SWEEP_THRESHOLD)
    }

    pub fn with_sweep_threshold(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            entries: DashMap::new(),
            entry_count: AtomicUsize::new(0),
            sequence: AtomicU64::new(0),
            min_sweep_threshold: threshold,
            next_sweep_at: AtomicUsize::new(threshold),
        }
    }

    /// Append `observation` to the entry for `error`, creating the entry if needed.
    ///
    /// Returns how many raises are now recorded for `error`.
    pub fn record(&self, error: &ErrorRef, mut observation: CapturedObservation) -> usize {
        let identity = error.identity();
        let raises = match self.entries.entry(identity) {
            MapEntry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if !entry.is_live() {
                    *entry = RegistryEntry::new(error);
                }
                observation.sequence = self.next_sequence();
                entry.observations.push(observation);
                trace!(?identity, raises = entry.observations.len(), "Recorded repeated raise");
                entry.observations.len()
            }
            MapEntry::Vacant(vacant) => {
                observation.sequence = self.next_sequence();
                let mut entry = RegistryEntry::new(error);
                entry.observations.push(observation);
                vacant.insert(entry);
                self.entry_count.fetch_add(1, Ordering::Relaxed);
                1
            }
        };

        self.maybe_sweep();
        raises
    }

    /// Observations recorded for `identity`, oldest first. Empty if none.
    ///
    /// The list is cloned out so no shard lock is held while the caller replays it;
    /// replaying can raise, and raising records into this registry.
    pub fn lookup(&self, identity: ErrorIdentity) -> Vec<CapturedObservation> {
        match self.entries.get(&identity) {
            Some(entry) if entry.is_live() => entry.observations.clone(),
            _ => Vec::new(),
        }
    }

    pub fn lookup_error(&self, error: &ErrorRef) -> Vec<CapturedObservation> {
        self.lookup(error.identity())
    }

    /// Number of entries, including dead ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry whose error is no longer reachable. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let live = entry.is_live();
            if !live {
                removed += 1;
            }
            live
        });
        let remaining = self.entry_count.fetch_sub(removed, Ordering::Relaxed) - removed;
        trace!(removed, remaining, "Swept throw registry");
        removed
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Sweep once the map doubles past the live population seen at the last sweep.
    fn maybe_sweep(&self) {
        let threshold = self.next_sweep_at.load(Ordering::Relaxed);
        if self.entry_count.load(Ordering::Relaxed) < threshold {
            return;
        }
        // Only one thread performs a given sweep
        let parked = usize::MAX;
        if self
            .next_sweep_at
            .compare_exchange(threshold, parked, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        self.sweep();
        let next = (self.entry_count.load(Ordering::Relaxed) * 2).max(self.min_sweep_threshold);
        self.next_sweep_at.store(next, Ordering::Release);
    }
}

impl Default for ThrowRegistry {
    fn default() -> Self {
        Self::new()
    }
}
