use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// Name of the optional config file at the watched root.
pub const CONFIG_FILE: &str = "autotest.toml";

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);
const DEFAULT_QUEUE_DEPTH: usize = 100;
/// `go test` exits with 2 when the package does not compile.
const DEFAULT_BUILD_FAILURE_EXIT_CODE: i32 = 2;

/// Configuration loaded from `autotest.toml` at the watched root.
#[derive(Debug, Deserialize, Default)]
pub struct AutotestConfig {
    /// Quiet period before a changed folder is re-tested, in milliseconds.
    pub debounce_ms: Option<u64>,
    /// Capacity of the settle and result queues.
    pub queue_depth: Option<usize>,
    /// File extensions (without the dot) that count as source files.
    pub extensions: Option<Vec<String>>,
    /// Additional path patterns to ignore (beyond .gitignore, hidden dirs and node_modules).
    pub exclude: Option<Vec<String>>,
    /// The `go` executable used to run tests.
    pub go_binary: Option<String>,
    /// Exit code the runner uses to signal a compile error.
    pub build_failure_exit_code: Option<i32>,
}

impl AutotestConfig {
    /// Load configuration from `autotest.toml` in the given root directory.
    ///
    /// Returns a default (empty) configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    warn!(error = %err, "failed to parse {CONFIG_FILE}, using defaults");
                    Self::default()
                }
            },
            Err(err) => {
                warn!(error = %err, "failed to read {CONFIG_FILE}, using defaults");
                Self::default()
            }
        }
    }
}

/// Resolved settings for a watch session.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    pub debounce: Duration,
    pub queue_depth: usize,
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub go_binary: String,
    pub build_failure_exit_code: i32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            extensions: vec!["go".to_string()],
            exclude: Vec::new(),
            go_binary: "go".to_string(),
            build_failure_exit_code: DEFAULT_BUILD_FAILURE_EXIT_CODE,
        }
    }
}

impl From<AutotestConfig> for WatchConfig {
    fn from(file: AutotestConfig) -> Self {
        let defaults = Self::default();
        Self {
            debounce: file
                .debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce),
            queue_depth: file.queue_depth.unwrap_or(defaults.queue_depth).max(1),
            extensions: file.extensions.unwrap_or(defaults.extensions),
            exclude: file.exclude.unwrap_or(defaults.exclude),
            go_binary: file.go_binary.unwrap_or(defaults.go_binary),
            build_failure_exit_code: file
                .build_failure_exit_code
                .unwrap_or(defaults.build_failure_exit_code),
        }
    }
}

impl WatchConfig {
    /// Load `autotest.toml` from `root` and resolve it against the defaults.
    pub fn load(root: &Path) -> Self {
        AutotestConfig::load(root).into()
    }

    /// Sets the debounce interval.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the queue depth. Bounded channels need at least one slot.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Sets the `go` executable.
    pub fn with_go_binary(mut self, go_binary: impl Into<String>) -> Self {
        self.go_binary = go_binary.into();
        self
    }
}
