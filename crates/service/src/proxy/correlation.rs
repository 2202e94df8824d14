use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;

use crate::errors::StorageError;
use crate::observability::PENDING_REQUESTS;

/// Outcome delivered to a pending request: document text for reads,
/// `None` for writes, or the rejection.
pub type Completion = Result<Option<String>, StorageError>;

/// Outstanding requests of one proxy backend, keyed by correlation id.
///
/// Ids have the form `{identity}/{counter}` with a counter that only grows,
/// so an id is never handed out twice by the same table. Each entry is
/// consumed exactly once: by the matching reply, a timeout, a failed send
/// or the channel closing. Once closed, the table refuses new requests.
#[derive(Debug)]
pub struct CorrelationTable {
    identity: String,
    next: AtomicU64,
    pending: DashMap<String, oneshot::Sender<Completion>>,
    closed: AtomicBool,
}

impl CorrelationTable {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            next: AtomicU64::new(1),
            pending: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Allocate a fresh id and store its completion handle.
    pub fn register(&self) -> Result<(String, oneshot::Receiver<Completion>), StorageError> {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}/{}", self.identity, seq);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);
        PENDING_REQUESTS.inc();
        // Checked after the insert: either this sees the flag or `close` sees the entry.
        if self.closed.load(Ordering::SeqCst) {
            self.cancel(&id);
            return Err(StorageError::ChannelClosed);
        }
        Ok((id, rx))
    }

    /// Remove the handle for `id` and deliver `outcome` to it.
    /// Returns `false` when no such request is pending.
    pub fn complete(&self, id: &str, outcome: Completion) -> bool {
        match self.pending.remove(id) {
            Some((_, tx)) => {
                PENDING_REQUESTS.dec();
                // The caller may have given up already.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Forget `id` without delivering anything.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = self.pending.remove(id).is_some();
        if removed {
            PENDING_REQUESTS.dec();
        }
        removed
    }

    /// Reject every outstanding request, e.g. when the channel is gone.
    pub fn reject_all<F>(&self, make_err: F) -> usize
    where
        F: Fn() -> StorageError,
    {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        let mut rejected = 0;
        for id in ids {
            if self.complete(&id, Err(make_err())) {
                debug!(id = %id, "rejected pending request");
                rejected += 1;
            }
        }
        rejected
    }

    /// Mark the channel gone and reject everything still pending.
    pub fn close(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        self.reject_all(|| StorageError::ChannelClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
