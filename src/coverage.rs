//! Parser for the per-function report printed by `go tool cover -func`.
//!
//! ```text
//! github.com/acme/autotest/runner.go:37:	RunTests		100.0%
//! total:							(statements)		35.5%
//! ```
//!
//! The report is a display list, so nothing here fails: lines that do not fit
//! the shape degrade to zero-valued fields.

use crate::result::FunctionCoverage;

/// Parse every non-blank line of a coverage report.
pub fn parse_coverage_report(bytes: &[u8]) -> Vec<FunctionCoverage> {
    String::from_utf8_lossy(bytes)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_coverage_line)
        .collect()
}

/// Parse a single report line.
///
/// The split point is the *last* colon, so paths that contain colons survive.
/// A line with no colon at all is kept verbatim as the filename.
pub fn parse_coverage_line(line: &str) -> FunctionCoverage {
    let Some((location, rest)) = line.rsplit_once(':') else {
        return FunctionCoverage {
            filename: line.to_string(),
            function: String::new(),
            line_number: None,
            percent: 0.0,
        };
    };

    let (path, line_number) = split_line_number(location);
    let (function, percent) = parse_name_and_percent(rest.trim());

    FunctionCoverage {
        filename: base_name(path).to_string(),
        function,
        line_number,
        percent,
    }
}

/// `pkg/file.go:42` -> (`pkg/file.go`, Some(42)); `total` -> (`total`, None).
fn split_line_number(location: &str) -> (&str, Option<u32>) {
    match location.rsplit_once(':') {
        Some((path, number)) => match number.trim().parse::<u32>() {
            Ok(n) => (path, Some(n)),
            Err(_) => (location, None),
        },
        None => (location, None),
    }
}

/// `Name<tab>...NN.N%` -> (Name, NN.N). Without a tab there is nothing to trust.
fn parse_name_and_percent(segment: &str) -> (String, f64) {
    match segment.split_once('\t') {
        Some((name, percent)) => (name.trim().to_string(), parse_percent(percent)),
        None => (String::new(), 0.0),
    }
}

fn parse_percent(text: &str) -> f64 {
    let text = text.trim();
    text.strip_suffix('%')
        .unwrap_or(text)
        .trim()
        .parse::<f64>()
        .unwrap_or(0.0)
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
