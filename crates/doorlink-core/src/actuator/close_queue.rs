// ── Deferred close queue ──
//
// Every opened door gets one entry in a `DelayQueue` that fires after the
// open duration. Entries are visible through `pending()` and can be
// cancelled until they fire. The `pending` map is the source of truth:
// an expiring entry only fires if its sequence number is still there.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::time::{DelayQueue, delay_queue};
use tracing::{debug, warn};

use crate::model::MAX_OPENABLE_DURATION_SECS;
use crate::vendor::Vendor;

/// Longest delay the queue accepts; `DelayQueue` panics on far-off deadlines.
const MAX_DELAY: Duration = Duration::from_secs(MAX_OPENABLE_DURATION_SECS);

/// A scheduled close, as seen from outside the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingClose {
    pub asset_id: i32,
    pub config_id: i64,
    pub location_id: String,
    pub due: Instant,
}

/// Everything needed to close one door when its entry fires.
pub(crate) struct CloseJob {
    pub asset_id: i32,
    pub config_id: i64,
    pub location_id: String,
    pub vendor: Arc<dyn Vendor>,
}

enum Command {
    Schedule { seq: u64, job: CloseJob, due: Instant },
    Cancel { asset_id: i32, seq: u64 },
}

/// Handle to the close queue task. Cheap to clone.
#[derive(Clone)]
pub(crate) struct CloseQueue {
    tx: mpsc::UnboundedSender<Command>,
    pending: Arc<DashMap<i32, (u64, PendingClose)>>,
    next_seq: Arc<AtomicU64>,
}

impl CloseQueue {
    /// Spawn the queue task; `on_due` runs for every entry that fires.
    pub(crate) fn spawn<F>(cancel: CancellationToken, on_due: F) -> Self
    where
        F: Fn(CloseJob) + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(DashMap::new());
        tokio::spawn(run_queue(rx, Arc::clone(&pending), cancel, on_due));
        Self {
            tx,
            pending,
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedule a close of `job.asset_id` after `delay`.
    ///
    /// Replaces any close already pending for the same asset. A delay
    /// above one day is refused and the job handed back.
    pub(crate) fn schedule(&self, job: CloseJob, delay: Duration) -> Result<(), CloseJob> {
        if delay > MAX_DELAY {
            return Err(job);
        }
        let Some(due) = Instant::now().checked_add(delay) else {
            return Err(job);
        };
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let entry = PendingClose {
            asset_id: job.asset_id,
            config_id: job.config_id,
            location_id: job.location_id.clone(),
            due,
        };
        self.pending.insert(job.asset_id, (seq, entry));
        if self.tx.send(Command::Schedule { seq, job, due }).is_err() {
            warn!("close queue stopped, close will not fire");
        }
        Ok(())
    }

    /// Cancel the pending close of an asset, returning it if there was one.
    pub fn cancel(&self, asset_id: i32) -> Option<PendingClose> {
        let (_, (seq, entry)) = self.pending.remove(&asset_id)?;
        // The task may already be gone during shutdown; the entry is removed either way
        let _ = self.tx.send(Command::Cancel { asset_id, seq });
        Some(entry)
    }

    /// Pending closes, soonest first.
    pub fn pending(&self) -> Vec<PendingClose> {
        let mut entries: Vec<PendingClose> =
            self.pending.iter().map(|e| e.value().1.clone()).collect();
        entries.sort_by_key(|e| (e.due, e.asset_id));
        entries
    }
}

async fn run_queue<F>(
    mut rx: mpsc::UnboundedReceiver<Command>,
    pending: Arc<DashMap<i32, (u64, PendingClose)>>,
    cancel: CancellationToken,
    on_due: F,
) where
    F: Fn(CloseJob) + Send + 'static,
{
    let mut queue: DelayQueue<(u64, CloseJob)> = DelayQueue::new();
    let mut keys: HashMap<i32, (u64, delay_queue::Key)> = HashMap::new();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            command = rx.recv() => match command {
                None => break,
                Some(Command::Schedule { seq, job, due }) => {
                    let asset_id = job.asset_id;
                    let key = queue.insert_at((seq, job), due);
                    if let Some((_, replaced)) = keys.insert(asset_id, (seq, key)) {
                        queue.try_remove(&replaced);
                    }
                }
                Some(Command::Cancel { asset_id, seq }) => {
                    if keys.get(&asset_id).is_some_and(|(s, _)| *s == seq) {
                        if let Some((_, key)) = keys.remove(&asset_id) {
                            queue.try_remove(&key);
                            debug!(asset_id, "close cancelled");
                        }
                    }
                }
            },
            Some(expired) = queue.next() => {
                let (seq, job) = expired.into_inner();
                if keys.get(&job.asset_id).is_some_and(|(s, _)| *s == seq) {
                    keys.remove(&job.asset_id);
                }
                if pending.remove_if(&job.asset_id, |_, (s, _)| *s == seq).is_some() {
                    on_due(job);
                }
            }
        }
    }

    debug!(dropped = queue.len(), "close queue stopped");
}
