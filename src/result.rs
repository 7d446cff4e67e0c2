use std::path::PathBuf;

use crate::coverage::parse_coverage_report;
use crate::error::RunnerError;
use crate::events::parse_event_stream;

/// Terminal state of a single test as reported by the test tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Pass,
    Fail,
    Skip,
}

impl TestOutcome {
    /// Map an event action onto an outcome. Non-terminal actions yield `None`.
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "pass" => Some(Self::Pass),
            "fail" => Some(Self::Fail),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

/// One row per distinct (package, test) pair seen in a run's event stream.
///
/// Package-level rows carry an empty `test`.
#[derive(Debug, Clone, PartialEq)]
pub struct TestStatus {
    pub package: String,
    pub test: String,
    /// Seconds.
    pub elapsed: f64,
    /// `None` when the stream never reported a terminal action for this group.
    pub result: Option<TestOutcome>,
    pub output: String,
}

/// Coverage of a single function from one coverage report.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCoverage {
    /// Base name only (`runner.go`), or the whole line for banner lines.
    pub filename: String,
    pub function: String,
    /// Absent for the `total:` summary line.
    pub line_number: Option<u32>,
    pub percent: f64,
}

/// Everything produced by one execution of the runner for one folder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestRunResult {
    pub folder: PathBuf,
    /// Raw compiler diagnostics. Never parsed into statuses.
    pub build_failure: Option<Vec<u8>>,
    pub tests_failed: bool,
    pub statuses: Vec<TestStatus>,
    pub coverage: Vec<FunctionCoverage>,
    /// Set when the runner could not be started or talked to at all.
    pub transport_error: Option<String>,
}

impl TestRunResult {
    /// Result for a run that never got as far as producing output.
    pub fn transport_failure(folder: impl Into<PathBuf>, err: &RunnerError) -> Self {
        Self {
            folder: folder.into(),
            transport_error: Some(err.to_string()),
            ..Self::default()
        }
    }

    /// Build breaks and failing tests are always shown, whatever the baseline says.
    pub fn is_failure(&self) -> bool {
        self.build_failure.is_some() || self.tests_failed
    }
}

/// How the runner process exited, mapped onto the three-way convention:
/// zero, build-failure code, anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Passed,
    TestsFailed,
    BuildFailed,
}

impl ExitKind {
    /// Classify a raw exit code. A missing code (killed by a signal) counts as a test failure.
    pub fn from_code(code: Option<i32>, build_failure_code: i32) -> Self {
        match code {
            Some(0) => Self::Passed,
            Some(c) if c == build_failure_code => Self::BuildFailed,
            _ => Self::TestsFailed,
        }
    }
}

/// Raw bytes handed back by a [`crate::runner::TestRunner`].
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub exit: ExitKind,
    /// Event stream on success or test failure, compiler diagnostics on build failure.
    pub output: Vec<u8>,
    /// Coverage report text. Only present on non-build outcomes.
    pub coverage: Option<Vec<u8>>,
}

/// Route one run's output into a [`TestRunResult`].
///
/// A build failure keeps the raw bytes and skips both parsers; anything else
/// is grouped into statuses and, when a report came back, coverage entries.
pub fn assemble_result(folder: PathBuf, run: RunOutput) -> TestRunResult {
    if run.exit == ExitKind::BuildFailed {
        return TestRunResult {
            folder,
            build_failure: Some(run.output),
            ..TestRunResult::default()
        };
    }

    let statuses = parse_event_stream(&run.output);
    let tests_failed = run.exit == ExitKind::TestsFailed
        || statuses
            .iter()
            .any(|s| s.result == Some(TestOutcome::Fail));
    let coverage = run
        .coverage
        .as_deref()
        .map(parse_coverage_report)
        .unwrap_or_default();

    TestRunResult {
        folder,
        build_failure: None,
        tests_failed,
        statuses,
        coverage,
        transport_error: None,
    }
}
