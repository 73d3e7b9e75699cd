//! Messages into the session thread

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};

use hashbrown::HashSet;
use meshscan_shared::AnchorId;

use crate::cache::CacheSnapshot;
use crate::sensor::AnchorBatch;

pub(super) enum SessionCommand {
    StartScan,
    StopScan,
    Anchors(AnchorBatch),
    Removed(Vec<AnchorId>),
    /// Reply with a snapshot of the cache
    Snapshot(Sender<CacheSnapshot>),
}

/// Removals that found the command queue full.
///
/// Shared between the handle and the session thread, which drains it before
/// every command. Holds each id once, so it never outgrows the anchors the
/// sensor has reported.
#[derive(Debug, Clone, Default)]
pub(super) struct PendingRemovals {
    ids: Arc<Mutex<HashSet<AnchorId>>>,
}

impl PendingRemovals {
    pub fn park(&self, ids: Vec<AnchorId>) {
        self.lock().extend(ids);
    }

    pub fn take(&self) -> HashSet<AnchorId> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<AnchorId>> {
        // A set of ids cannot be left half-updated
        self.ids.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
