//! Per-folder sliding-window debouncing.
//!
//! Every classified change pushes its folder's deadline out to `now + interval`.
//! A single timer task per pending folder sleeps until the stored deadline,
//! re-checks it under the lock, and only emits once the deadline stopped
//! moving. The settle queue is bounded: when it is full, the firing timer waits
//! for room instead of dropping the settle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

use super::classify::SourceFilter;
use super::event::ChangeEvent;

type PendingMap = Arc<Mutex<HashMap<PathBuf, Instant>>>;

/// Collapses bursts of change events into one settle per folder.
#[derive(Clone)]
pub struct Debouncer {
    interval: Duration,
    filter: Arc<SourceFilter>,
    pending: PendingMap,
    settle_tx: mpsc::Sender<PathBuf>,
}

impl Debouncer {
    pub fn new(
        interval: Duration,
        filter: Arc<SourceFilter>,
        settle_tx: mpsc::Sender<PathBuf>,
    ) -> Self {
        Self {
            interval,
            filter,
            pending: Arc::new(Mutex::new(HashMap::new())),
            settle_tx,
        }
    }

    /// Classify one raw event and, if it belongs to a source folder, (re)arm that folder's timer.
    pub fn observe(&self, event: &ChangeEvent) {
        match self.filter.owning_folder(event) {
            Some(folder) => self.touch(folder),
            None => trace!(path = %event.path.display(), at = %event.timestamp, "ignoring change"),
        }
    }

    /// Start or slide the timer for `folder`.
    pub fn touch(&self, folder: PathBuf) {
        let deadline = Instant::now() + self.interval;

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = pending.get_mut(&folder) {
            *current = deadline;
            return;
        }
        pending.insert(folder.clone(), deadline);
        drop(pending);

        debug!(folder = %folder.display(), "folder changed, waiting for it to settle");
        tokio::spawn(settle_when_quiet(
            folder,
            deadline,
            Arc::clone(&self.pending),
            self.settle_tx.clone(),
        ));
    }

    /// Number of folders with an armed timer.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Feed every event from the watch source through the debouncer until the source closes.
    pub async fn consume(self, mut events: mpsc::Receiver<ChangeEvent>) {
        while let Some(event) = events.recv().await {
            self.observe(&event);
        }
        debug!(pending = self.pending_count(), "watch source closed");
    }
}

/// Timer body for one pending folder.
async fn settle_when_quiet(
    folder: PathBuf,
    mut deadline: Instant,
    pending: PendingMap,
    settle_tx: mpsc::Sender<PathBuf>,
) {
    loop {
        sleep_until(deadline).await;
        match expire(&pending, &folder, deadline) {
            Some(later) => deadline = later,
            None => break,
        }
    }

    // The folder may have been deleted while we waited.
    if !folder.exists() {
        debug!(folder = %folder.display(), "folder vanished before settling");
        return;
    }

    debug!(folder = %folder.display(), "folder settled");
    if settle_tx.send(folder).await.is_err() {
        debug!("settle queue closed");
    }
}

/// Remove the folder's entry if its deadline has passed, or return the newer deadline.
fn expire(pending: &PendingMap, folder: &Path, deadline: Instant) -> Option<Instant> {
    let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);
    match pending.get(folder) {
        Some(&current) if current > deadline => Some(current),
        _ => {
            pending.remove(folder);
            None
        }
    }
}
