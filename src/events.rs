//! Parser for the newline-delimited JSON event stream written by `go test -json`.
//!
//! Every line becomes a [`TestEvent`]. Lines that are not valid JSON are kept as
//! raw `output` events so compiler chatter and panics printed outside the
//! protocol still reach the user. Events are then folded into one
//! [`TestStatus`] per (package, test) pair, in first-seen order.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::result::{TestOutcome, TestStatus};

/// Output lines that only frame the real output (`=== RUN`, `--- PASS`, the
/// package `ok` summary, ...). They are dropped from the grouped output.
const FRAMING_MARKERS: &[&str] = &["===", "---", "PASS", "ok  \t", "FAIL", "SKIP"];

/// One decoded line of the event stream.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestEvent {
    #[serde(default)]
    pub time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub test: String,
    #[serde(default)]
    pub elapsed: Option<f64>,
    #[serde(default)]
    pub output: String,
}

impl TestEvent {
    fn raw_output(line: &str) -> Self {
        Self {
            action: "output".to_string(),
            output: line.to_string(),
            ..Self::default()
        }
    }
}

/// Parse a whole run's event stream into grouped statuses.
pub fn parse_event_stream(bytes: &[u8]) -> Vec<TestStatus> {
    let text = String::from_utf8_lossy(bytes);
    group_events(text.lines().filter_map(parse_event_line))
}

/// Decode one line. Non-JSON text becomes an `output` event; blank lines yield `None`.
pub fn parse_event_line(line: &str) -> Option<TestEvent> {
    match serde_json::from_str::<TestEvent>(line) {
        Ok(event) => Some(event),
        Err(_) if line.trim().is_empty() => None,
        Err(_) => Some(TestEvent::raw_output(line)),
    }
}

/// Per-group state while folding the stream.
#[derive(Default)]
struct Group {
    package: String,
    test: String,
    result: Option<TestOutcome>,
    reported_elapsed: Option<f64>,
    output: Vec<String>,
    first_seen: Option<DateTime<FixedOffset>>,
    last_seen: Option<DateTime<FixedOffset>>,
}

impl Group {
    fn absorb(&mut self, event: TestEvent) {
        if let Some(time) = event.time {
            self.first_seen.get_or_insert(time);
            self.last_seen = Some(time);
        }

        if event.action == "output" {
            let text = event.output.trim();
            if !text.is_empty() && !is_framing(text) {
                self.output.push(text.to_string());
            }
        } else if let Some(outcome) = TestOutcome::from_action(&event.action) {
            self.result = Some(outcome);
            self.reported_elapsed = Some(event.elapsed.unwrap_or(0.0));
        }
        // "run", "pause", "cont", ... only matter for ordering.
    }

    fn finish(self) -> TestStatus {
        let elapsed = self
            .reported_elapsed
            .unwrap_or_else(|| wall_clock_secs(self.first_seen, self.last_seen));
        TestStatus {
            package: self.package,
            test: self.test,
            elapsed,
            result: self.result,
            output: self.output.join("\n"),
        }
    }
}

/// Fold events into one status per (package, test), keeping first-seen order.
pub fn group_events(events: impl IntoIterator<Item = TestEvent>) -> Vec<TestStatus> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for event in events {
        let key = (event.package.clone(), event.test.clone());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Group {
                package: event.package.clone(),
                test: event.test.clone(),
                ..Group::default()
            });
            groups.len() - 1
        });
        groups[slot].absorb(event);
    }

    groups.into_iter().map(Group::finish).collect()
}

fn is_framing(text: &str) -> bool {
    FRAMING_MARKERS.iter().any(|marker| text.starts_with(marker))
}

fn wall_clock_secs(
    first: Option<DateTime<FixedOffset>>,
    last: Option<DateTime<FixedOffset>>,
) -> f64 {
    match (first, last) {
        (Some(first), Some(last)) => {
            let micros = (last - first).num_microseconds().unwrap_or(0);
            (micros as f64 / 1_000_000.0).max(0.0)
        }
        _ => 0.0,
    }
}
