use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// Marker between the two ends of a move/rename event: `old -> new`.
pub const MOVE_MARKER: &str = "-> ";

/// Kind of filesystem change reported by the watch source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Create,
    Write,
    Move,
    Rename,
    /// Never forwarded by the notify source; rejected at classification.
    Remove,
}

/// A raw change as emitted by the watch source, before classification.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// For moves and renames this is `old -> new`.
    pub path: PathBuf,
    pub op: ChangeOp,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, op: ChangeOp) -> Self {
        Self {
            path: path.into(),
            op,
            timestamp: Utc::now(),
        }
    }

    /// A move/rename carrying both ends, encoded as `from -> to`.
    pub fn moved(from: &Path, to: &Path, op: ChangeOp) -> Self {
        let encoded = format!("{} {MOVE_MARKER}{}", from.display(), to.display());
        Self::new(encoded, op)
    }

    /// The path the change ends up at: the right-hand side of `old -> new`,
    /// or the path itself.
    pub fn target_path(&self) -> PathBuf {
        let raw = self.path.to_string_lossy();
        match raw.find(MOVE_MARKER) {
            Some(idx) => PathBuf::from(&raw[idx + MOVE_MARKER.len()..]),
            None => self.path.clone(),
        }
    }
}
