//! Scan session handle
//!
//! The only way into a running session: UI controls, sensor callbacks and
//! status readers all go through [`ScanHandle`].

use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::JoinHandle;

use meshscan_shared::AnchorId;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::command::{PendingRemovals, SessionCommand};
use super::status::ScanStatus;
use crate::cache::CacheSnapshot;
use crate::error::ScanError;
use crate::sensor::AnchorBatch;

/// Handle to a session thread
///
/// Returned from [`ScanSession::spawn`](super::ScanSession::spawn). Dropping
/// it shuts the session down; an export in flight is finished first.
pub struct ScanHandle {
    /// Sender for commands (Option to allow explicit drop before join)
    pub(super) tx: Option<SyncSender<SessionCommand>>,

    /// Thread join handle
    pub(super) handle: Option<JoinHandle<()>>,

    /// Latest published status
    pub(super) status: watch::Receiver<ScanStatus>,

    /// Removals parked while the queue was full
    pub(super) pending_removals: PendingRemovals,
}

impl ScanHandle {
    /// Ask the session to start a new scan.
    ///
    /// Ignored by the session unless it is idle, saved or in error.
    pub fn start_scan(&self) -> Result<(), ScanError> {
        self.send(SessionCommand::StartScan)
    }

    /// Ask the session to finish the scan and export it.
    ///
    /// Ignored by the session unless it is scanning.
    pub fn stop_scan(&self) -> Result<(), ScanError> {
        self.send(SessionCommand::StopScan)
    }

    /// Submit anchor updates from the sensor callback thread.
    ///
    /// Non-blocking - if the queue is full the batch is dropped and `false`
    /// returned. The sensor resends every anchor's full geometry on its next
    /// update, so nothing is lost for good.
    pub fn submit_anchors(&self, batch: AnchorBatch) -> bool {
        let Some(ref tx) = self.tx else {
            warn!("Scan session sender already dropped");
            return false;
        };
        match tx.try_send(SessionCommand::Anchors(batch)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Scan session queue full, dropping anchor batch");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("Scan session thread disconnected");
                false
            }
        }
    }

    /// Submit anchor updates, waiting for queue space instead of dropping.
    ///
    /// For offline replays; live sensor callbacks use [`submit_anchors`](Self::submit_anchors).
    pub fn submit_anchors_blocking(&self, batch: AnchorBatch) -> Result<(), ScanError> {
        self.send(SessionCommand::Anchors(batch))
    }

    /// Report anchors the sensor stopped tracking.
    ///
    /// Never blocks. Removals are never resent, so when the queue is full
    /// they are parked instead of dropped and applied before the session's
    /// next command. A parked anchor stays gone for the rest of the scan,
    /// even if an older queued batch still carries it.
    pub fn remove_anchors(&self, ids: Vec<AnchorId>) -> Result<(), ScanError> {
        let tx = self.tx.as_ref().ok_or(ScanError::SessionClosed)?;
        match tx.try_send(SessionCommand::Removed(ids)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(command)) => {
                if let SessionCommand::Removed(ids) = command {
                    debug!("Scan session queue full, parking {} anchor removals", ids.len());
                    self.pending_removals.park(ids);
                }
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(ScanError::SessionClosed),
        }
    }

    /// Current contents of the mesh cache.
    ///
    /// Blocks until the session thread answers.
    pub fn snapshot(&self) -> Result<CacheSnapshot, ScanError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(SessionCommand::Snapshot(reply_tx))?;
        reply_rx.recv().map_err(|_| ScanError::SessionClosed)
    }

    /// Latest published status.
    pub fn status(&self) -> ScanStatus {
        self.status.borrow().clone()
    }

    /// A receiver that is notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<ScanStatus> {
        self.status.clone()
    }

    /// Wait until the status satisfies `predicate` and return it.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<ScanStatus, ScanError>
    where
        F: FnMut(&ScanStatus) -> bool,
    {
        let mut rx = self.status.clone();
        let status = rx
            .wait_for(|status| predicate(status))
            .await
            .map_err(|_| ScanError::SessionClosed)?;
        Ok(status.clone())
    }

    /// Check if the session thread is still running
    pub fn is_alive(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    fn send(&self, command: SessionCommand) -> Result<(), ScanError> {
        let tx = self.tx.as_ref().ok_or(ScanError::SessionClosed)?;
        tx.send(command).map_err(|_| ScanError::SessionClosed)
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        // Drop the sender first: the thread exits once its receiver
        // disconnects, so joining while holding it would deadlock.
        drop(self.tx.take());

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
