pub mod classify;
pub mod debounce;
pub mod event;

use std::path::Path;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as tokio_mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::WatchError;
use event::{ChangeEvent, ChangeOp};

/// Capacity of the raw change-event channel between notify and the debouncer.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Handle to a running watcher. Keeps the OS watcher alive (dropping stops watching).
pub struct WatcherHandle {
    /// Keep alive: dropping the watcher stops the OS notifications.
    _watcher: RecommendedWatcher,
    /// The bridge task forwarding events from std channel to tokio channel.
    _bridge_task: JoinHandle<()>,
}

/// Start a recursive file watcher on `watch_root`.
///
/// Returns a `WatcherHandle` (must be kept alive) and a tokio mpsc receiver
/// that yields raw `ChangeEvent`s. Classification and debouncing happen
/// downstream.
///
/// Only create, write, move and rename changes are forwarded. Registration
/// failures are returned here; errors after startup are logged and skipped.
pub fn start_watcher(
    watch_root: &Path,
) -> Result<(WatcherHandle, tokio_mpsc::Receiver<ChangeEvent>), WatchError> {
    if !watch_root.is_dir() {
        return Err(WatchError::MissingRoot(watch_root.to_path_buf()));
    }

    let (std_tx, std_rx) = std::sync::mpsc::channel::<notify::Result<notify::Event>>();

    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = std_tx.send(res);
    })?;
    watcher
        .watch(watch_root, RecursiveMode::Recursive)
        .map_err(|source| WatchError::Register {
            path: watch_root.to_path_buf(),
            source,
        })?;

    let (tokio_tx, tokio_rx) = tokio_mpsc::channel::<ChangeEvent>(EVENT_CHANNEL_CAPACITY);

    // Bridge: spawn_blocking to receive from std channel, translate, forward to tokio
    let bridge_task = tokio::task::spawn_blocking(move || {
        while let Ok(result) = std_rx.recv() {
            match result {
                Ok(event) => {
                    for change in translate_event(event) {
                        if tokio_tx.blocking_send(change).is_err() {
                            return; // receiver dropped, shutdown
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "watch error");
                }
            }
        }
    });

    Ok((
        WatcherHandle {
            _watcher: watcher,
            _bridge_task: bridge_task,
        },
        tokio_rx,
    ))
}

/// Translate a notify event into zero or more `ChangeEvent`s.
///
/// A rename that reports both ends becomes a single `old -> new` event;
/// removals, metadata-only changes and accesses are dropped.
pub fn translate_event(event: notify::Event) -> Vec<ChangeEvent> {
    let op = match event.kind {
        EventKind::Create(_) => ChangeOp::Create,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if let [from, to] = event.paths.as_slice() {
                return vec![ChangeEvent::moved(from, to, ChangeOp::Rename)];
            }
            ChangeOp::Rename
        }
        // The old name is gone; the matching `To` half carries the new one.
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => return Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeOp::Move,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeOp::Rename,
        EventKind::Modify(ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => ChangeOp::Write,
        _ => return Vec::new(),
    };

    event
        .paths
        .into_iter()
        .map(|path| ChangeEvent::new(path, op))
        .collect()
}
