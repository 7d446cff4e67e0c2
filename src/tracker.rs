//! Per-folder baseline tracking and coverage diffing.
//!
//! The first result seen for a folder becomes its baseline and is never
//! replaced. Every later clean run is compared against that baseline; only
//! functions whose coverage moved at the same line are reported. Build breaks
//! and failing tests skip the diff and are always shown.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::result::{FunctionCoverage, TestRunResult};

/// Tracking state for one folder. There is no terminal state: a folder stays
/// baselined for the rest of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FolderState {
    #[default]
    Unseen,
    Baselined {
        original: Arc<TestRunResult>,
        last: Arc<TestRunResult>,
    },
}

/// What the caller should do with a tracked result.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    /// First run for the folder; recorded silently, whatever it contained.
    Baselined,
    /// Nothing moved against the baseline.
    Unchanged,
    /// Must be shown: a failure verbatim, or a clean run reduced to its coverage changes.
    Display(Arc<TestRunResult>),
}

/// Process-wide folder → state map behind a single reader/writer lock.
#[derive(Debug, Default)]
pub struct ResultTracker {
    folders: RwLock<HashMap<PathBuf, FolderState>>,
}

impl ResultTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `result` and decide whether it needs displaying.
    ///
    /// Runs whose runner could not be reached are returned for display without
    /// touching any state.
    pub fn track(&self, result: Arc<TestRunResult>) -> TrackOutcome {
        if result.transport_error.is_some() {
            return TrackOutcome::Display(result);
        }

        let mut folders = self.folders.write().unwrap_or_else(PoisonError::into_inner);
        let slot = folders.entry(result.folder.clone()).or_default();

        let (next, outcome) = match &*slot {
            FolderState::Unseen => (
                FolderState::Baselined {
                    original: Arc::clone(&result),
                    last: Arc::clone(&result),
                },
                TrackOutcome::Baselined,
            ),
            FolderState::Baselined { original, .. } => {
                let outcome = compare(original, &result);
                (
                    FolderState::Baselined {
                        original: Arc::clone(original),
                        last: Arc::clone(&result),
                    },
                    outcome,
                )
            }
        };

        *slot = next;
        outcome
    }

    pub fn state(&self, folder: &Path) -> FolderState {
        let folders = self.folders.read().unwrap_or_else(PoisonError::into_inner);
        folders.get(folder).cloned().unwrap_or_default()
    }

    pub fn tracked_folders(&self) -> usize {
        self.folders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Outcome of a run against an existing baseline.
fn compare(original: &TestRunResult, result: &Arc<TestRunResult>) -> TrackOutcome {
    if result.is_failure() {
        return TrackOutcome::Display(Arc::clone(result));
    }

    let changed = coverage_diff(&original.coverage, &result.coverage);
    if changed.is_empty() {
        return TrackOutcome::Unchanged;
    }

    TrackOutcome::Display(Arc::new(TestRunResult {
        folder: result.folder.clone(),
        statuses: result.statuses.clone(),
        coverage: changed,
        ..TestRunResult::default()
    }))
}

/// Entries of `current` whose percent differs from a baseline entry with the
/// same filename, function and line number.
///
/// Functions that only exist in `current`, or whose line moved, are not reported.
pub fn coverage_diff(
    original: &[FunctionCoverage],
    current: &[FunctionCoverage],
) -> Vec<FunctionCoverage> {
    let mut index: HashMap<(&str, &str), Vec<(Option<u32>, f64)>> = HashMap::new();
    for entry in original {
        index
            .entry((entry.filename.as_str(), entry.function.as_str()))
            .or_default()
            .push((entry.line_number, entry.percent));
    }

    current
        .iter()
        .filter(|entry| {
            index
                .get(&(entry.filename.as_str(), entry.function.as_str()))
                .is_some_and(|recorded| {
                    recorded.iter().any(|&(line, percent)| {
                        line == entry.line_number && percent != entry.percent
                    })
                })
        })
        .cloned()
        .collect()
}
