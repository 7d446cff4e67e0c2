//! Settle → run → track → print.
//!
//! ```text
//! settle queue ──dispatch──▶ one task per run ──▶ result queue
//!                                                     │
//!                                               tracking step
//!                                                     │
//!                                print queue (single consumer) ──▶ Presenter
//! ```
//!
//! Runs execute concurrently and may overlap for the same folder. Tracking is
//! last-write-wins, so overlap is harmless. All console output goes through one
//! consumer so results from different folders never interleave.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::present::Presenter;
use crate::result::{TestRunResult, assemble_result};
use crate::runner::TestRunner;
use crate::tracker::{FolderState, ResultTracker, TrackOutcome};

/// How long shutdown waits for already-queued output before giving up.
const FLUSH_GRACE: Duration = Duration::from_secs(2);

/// What the print consumer hands to the presenter.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Baselined(PathBuf),
    Unchanged(PathBuf),
    Changed(Arc<TestRunResult>),
}

impl Report {
    fn deliver(self, presenter: &mut dyn Presenter) {
        match self {
            Report::Baselined(folder) => presenter.baselined(&folder),
            Report::Unchanged(folder) => presenter.unchanged(&folder),
            Report::Changed(result) => presenter.present(&result),
        }
    }
}

/// Owns the runner and the tracking context for one watch session.
pub struct Pipeline {
    runner: Arc<dyn TestRunner>,
    tracker: Arc<ResultTracker>,
    queue_depth: usize,
}

impl Pipeline {
    pub fn new(runner: Arc<dyn TestRunner>, queue_depth: usize) -> Self {
        Self {
            runner,
            tracker: Arc::new(ResultTracker::new()),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Handle to the tracking context.
    pub fn tracker(&self) -> Arc<ResultTracker> {
        Arc::clone(&self.tracker)
    }

    /// Drive the pipeline until the settle queue closes or `shutdown` flips to `true`.
    ///
    /// In-flight runs are not cancelled. Output still queued at shutdown is
    /// flushed on a best-effort basis.
    pub async fn run<P>(
        self,
        mut settles: mpsc::Receiver<PathBuf>,
        presenter: P,
        mut shutdown: watch::Receiver<bool>,
    ) where
        P: Presenter + 'static,
    {
        let (result_tx, result_rx) = mpsc::channel::<TestRunResult>(self.queue_depth);
        let (print_tx, print_rx) = mpsc::channel::<Report>(self.queue_depth);

        let tracking = spawn_tracking(self.tracker(), result_rx, print_tx);
        let printing = spawn_printing(presenter, print_rx);

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => {
                    info!("shutting down, no new test runs will start");
                    break;
                }
                settled = settles.recv() => match settled {
                    Some(folder) => self.dispatch(folder, result_tx.clone()),
                    None => {
                        debug!("settle queue closed");
                        break;
                    }
                },
            }
        }

        // Tracking ends once every in-flight run has dropped its sender.
        drop(result_tx);
        let drained = async {
            let _ = tracking.await;
            let _ = printing.await;
        };
        if tokio::time::timeout(FLUSH_GRACE, drained).await.is_err() {
            debug!("gave up waiting for in-flight runs");
        }
        info!(folders = self.tracker.tracked_folders(), "pipeline stopped");
    }

    /// Launch one run without waiting for it.
    fn dispatch(&self, folder: PathBuf, results: mpsc::Sender<TestRunResult>) {
        let runner = Arc::clone(&self.runner);
        tokio::spawn(async move {
            let result = execute(runner.as_ref(), folder).await;
            if results.send(result).await.is_err() {
                debug!("result queue closed");
            }
        });
    }
}

/// Run one folder's tests and route the output into a [`TestRunResult`].
///
/// A runner that cannot be started yields a result carrying the transport error.
pub async fn execute(runner: &dyn TestRunner, folder: PathBuf) -> TestRunResult {
    info!(folder = %folder.display(), "running tests");
    match runner.run(&folder).await {
        Ok(output) => assemble_result(folder, output),
        Err(err) => {
            warn!(folder = %folder.display(), error = %err, "test run failed to start");
            TestRunResult::transport_failure(folder, &err)
        }
    }
}

fn spawn_tracking(
    tracker: Arc<ResultTracker>,
    mut results: mpsc::Receiver<TestRunResult>,
    print_tx: mpsc::Sender<Report>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = results.recv().await {
            let result = Arc::new(result);
            let folder = result.folder.clone();
            let report = match tracker.track(Arc::clone(&result)) {
                // A broken first run still becomes the baseline, but is never hidden.
                TrackOutcome::Baselined if result.is_failure() => Report::Changed(result),
                TrackOutcome::Baselined => {
                    if let FolderState::Baselined { original, .. } = tracker.state(&folder) {
                        debug!(
                            folder = %folder.display(),
                            functions = original.coverage.len(),
                            "baseline recorded"
                        );
                    }
                    Report::Baselined(folder)
                }
                TrackOutcome::Unchanged => Report::Unchanged(folder),
                TrackOutcome::Display(shown) => Report::Changed(shown),
            };
            if print_tx.send(report).await.is_err() {
                debug!("print queue closed");
                return;
            }
        }
    })
}

fn spawn_printing<P>(mut presenter: P, mut reports: mpsc::Receiver<Report>) -> JoinHandle<()>
where
    P: Presenter + 'static,
{
    tokio::spawn(async move {
        while let Some(report) = reports.recv().await {
            report.deliver(&mut presenter);
        }
    })
}

/// Resolves once shutdown is requested. A dropped sender never requests shutdown.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
