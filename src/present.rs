use std::io::{self, Write};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::events::parse_event_line;
use crate::result::{FunctionCoverage, TestOutcome, TestRunResult, TestStatus};

/// Width of the folder banner.
const BANNER_WIDTH: usize = 80;
/// Passing tests faster than this are hidden unless the run failed.
const SLOW_TEST_SECS: f64 = 0.1;
const VERY_SLOW_TEST_SECS: f64 = 0.5;
const PACKAGE_ROW_LABEL: &str = "[package]";

// <file>:<line>:<column>:<message>
static BUILD_ERROR: OnceLock<Regex> = OnceLock::new();

fn build_error_pattern() -> &'static Regex {
    BUILD_ERROR.get_or_init(|| {
        Regex::new(r"(^.*?):(\d*):(\d*):(.*)$").expect("invalid build error pattern")
    })
}

/// Receives finished results one at a time. Never called concurrently.
pub trait Presenter: Send {
    /// Show a result that needs attention (failure or coverage change).
    fn present(&mut self, result: &TestRunResult);

    /// A clean run with nothing new to say.
    fn unchanged(&mut self, _folder: &Path) {}

    /// The first clean run for a folder was recorded.
    fn baselined(&mut self, _folder: &Path) {}
}

/// Renders results as text tables, with ANSI color when enabled.
pub struct ConsolePresenter<W = io::Stdout> {
    out: W,
    color: bool,
}

impl ConsolePresenter {
    pub fn stdout(color: bool) -> Self {
        Self::new(io::stdout(), color)
    }
}

impl<W: Write + Send> ConsolePresenter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(err) = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush())
        {
            warn!(error = %err, "failed to write results");
        }
    }
}

impl<W: Write + Send> Presenter for ConsolePresenter<W> {
    fn present(&mut self, result: &TestRunResult) {
        let text = render_result(result, self.color);
        self.emit(&text);
    }

    fn unchanged(&mut self, folder: &Path) {
        let line = format!("{} {}\n", folder.display(), paint("unchanged", GRAY, self.color));
        self.emit(&line);
    }

    fn baselined(&mut self, folder: &Path) {
        let line = format!("{} {}\n", folder.display(), paint("baseline recorded", GRAY, self.color));
        self.emit(&line);
    }
}

// ANSI SGR codes.
const RED: &str = "31";
const GREEN: &str = "32";
const YELLOW: &str = "33";
const BLUE: &str = "34";
const GRAY: &str = "90";
const BRIGHT_RED: &str = "91";
const BOLD: &str = "1";

fn paint(text: &str, code: &str, color: bool) -> String {
    if color {
        format!("\x1b[{code}m{text}\x1b[0m")
    } else {
        text.to_string()
    }
}

/// Render one result: banner, then transport error, build failure, tests and coverage as present.
pub fn render_result(result: &TestRunResult, color: bool) -> String {
    let mut out = String::new();
    let folder = result.folder.display().to_string();
    let margin = "-".repeat(BANNER_WIDTH.saturating_sub(folder.len()) / 2);
    out.push_str(&format!("\n{margin} {folder} {margin}\n"));

    if let Some(err) = &result.transport_error {
        out.push_str(&paint(&format!("could not run tests: {err}"), RED, color));
        out.push('\n');
    }
    if let Some(raw) = &result.build_failure {
        out.push_str(&render_build_failure(raw, color));
    }
    if !result.statuses.is_empty() {
        out.push_str(&render_statuses(&result.statuses, result.tests_failed, color));
    }
    if !result.coverage.is_empty() {
        out.push_str(&render_coverage(&result.coverage, color));
    }
    out
}

/// Pick `file:line:col: message` lines out of compiler output. Everything else is noise.
///
/// Newer toolchains wrap compiler output in JSON `build-output` events; those
/// are unwrapped to their `Output` text first.
pub fn render_build_failure(raw: &[u8], color: bool) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut out = String::new();

    let decoded: Vec<String> = text
        .lines()
        .filter_map(parse_event_line)
        .map(|event| event.output)
        .collect();

    for line in decoded.iter().flat_map(|output| output.lines()) {
        if line.starts_with('#') || line.starts_with("FAIL") {
            continue;
        }
        let Some(caps) = build_error_pattern().captures(line) else {
            continue;
        };
        // `cover: /abs/x.go: /abs/x.go:66:2: ...` keeps only the part after the last colon.
        let mut file = caps[1].trim();
        if let Some((_, tail)) = file.rsplit_once(':') {
            file = tail.trim();
        }
        out.push_str(&format!(
            "Error in {file} at line {}, column {}\n{}\n",
            paint(&caps[2], BLUE, color),
            paint(&caps[3], BLUE, color),
            paint(caps[4].trim(), RED, color),
        ));
    }
    out
}

/// Test table. Passing tests are only listed when slow, unless `show_all` (the run failed).
pub fn render_statuses(statuses: &[TestStatus], show_all: bool, color: bool) -> String {
    let rows: Vec<&TestStatus> = statuses
        .iter()
        .filter(|s| s.test.is_empty() || show_all || s.elapsed > SLOW_TEST_SECS)
        .collect();
    if rows.is_empty() {
        return String::new();
    }

    let package_w = rows
        .iter()
        .map(|s| short_package(&s.package).len())
        .max()
        .unwrap_or(0)
        .max("Package".len());
    let test_w = rows
        .iter()
        .map(|s| test_label(&s.test).len())
        .max()
        .unwrap_or(0)
        .max(PACKAGE_ROW_LABEL.len());

    let mut out = header(
        "--- Test Results ---",
        &[
            "Time  ".to_string(),
            format!("{:<package_w$}", "Package"),
            format!("{:<test_w$}", "Test"),
            "Status".to_string(),
        ],
        color,
    );
    for status in rows {
        out.push_str(&format!(
            "{} {:<package_w$} {} {}",
            elapsed_label(status.elapsed, color),
            short_package(&status.package),
            paint(&format!("{:<test_w$}", test_label(&status.test)), BOLD, color),
            outcome_label(status.result, color),
        ));
        if !status.output.is_empty() {
            out.push('\n');
            out.push_str(&paint(&format!("output:\n{}", status.output), GRAY, color));
        }
        out.push('\n');
    }
    out
}

/// Coverage table. Fully covered functions are left out.
pub fn render_coverage(entries: &[FunctionCoverage], color: bool) -> String {
    let rows: Vec<&FunctionCoverage> = entries.iter().filter(|c| c.percent < 100.0).collect();
    if rows.is_empty() {
        return String::new();
    }

    let file_w = rows.iter().map(|c| c.filename.len()).max().unwrap_or(0).max("Filename".len());
    let func_w = rows.iter().map(|c| c.function.len()).max().unwrap_or(0).max("Function".len());

    let mut out = header(
        "--- Code Coverage ---",
        &[
            format!("{:<file_w$}", "Filename"),
            format!("{:<func_w$}", "Function"),
            "Coverage".to_string(),
        ],
        color,
    );
    for entry in rows {
        out.push_str(&format!(
            "{:<file_w$} {:<func_w$} {}\n",
            entry.filename,
            entry.function,
            percent_label(entry.percent, color),
        ));
    }
    out
}

fn header(title: &str, columns: &[String], color: bool) -> String {
    let total: usize = columns.iter().map(|c| c.len() + 1).sum();
    let indent = " ".repeat(total.saturating_sub(title.len()) / 2);
    let names = columns
        .iter()
        .map(|c| paint(c, GRAY, color))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{indent}{}\n{names}\n", paint(title, BLUE, color))
}

/// Drop the first two path segments (`github.com/org/`) from an import path.
fn short_package(package: &str) -> &str {
    let mut parts = package.splitn(3, '/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(rest)) => rest,
        _ => package,
    }
}

fn test_label(test: &str) -> &str {
    if test.is_empty() { PACKAGE_ROW_LABEL } else { test }
}

fn elapsed_label(elapsed: f64, color: bool) -> String {
    let text = format!("{elapsed:.2}s ");
    if elapsed > VERY_SLOW_TEST_SECS {
        paint(&text, RED, color)
    } else if elapsed > SLOW_TEST_SECS {
        paint(&text, YELLOW, color)
    } else {
        text
    }
}

fn outcome_label(outcome: Option<TestOutcome>, color: bool) -> String {
    match outcome {
        Some(TestOutcome::Pass) => paint("PASS", GREEN, color),
        Some(TestOutcome::Fail) => paint("FAIL", RED, color),
        Some(TestOutcome::Skip) => paint("SKIPPED", YELLOW, color),
        None => paint("?", GRAY, color),
    }
}

fn percent_label(percent: f64, color: bool) -> String {
    if percent >= 100.0 {
        paint("100%", GREEN, color)
    } else if percent > 75.0 {
        paint(&format!("{percent:.1}%"), YELLOW, color)
    } else {
        paint(&format!("{percent:.1}%"), BRIGHT_RED, color)
    }
}
