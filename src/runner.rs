//! The seam to the external test tool.
//!
//! The core only needs raw bytes and a three-way exit convention from a run;
//! [`GoTestRunner`] provides both by shelling out to `go test -json` and
//! `go tool cover -func`.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::WatchConfig;
use crate::error::RunnerError;
use crate::result::{ExitKind, RunOutput};

/// Markers `go test` prints when a package never got as far as running tests.
const BUILD_FAILURE_MARKERS: &[&str] = &["[build failed]", "[setup failed]"];

/// Runs the tests of one folder.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Execute the folder's tests. `Err` means the tool could not be run at all.
    async fn run(&self, folder: &Path) -> Result<RunOutput, RunnerError>;
}

/// Runs `go test -json` with a coverage profile, then renders the profile per function.
#[derive(Debug, Clone)]
pub struct GoTestRunner {
    go_binary: String,
    build_failure_exit_code: i32,
}

impl GoTestRunner {
    pub fn new(config: &WatchConfig) -> Self {
        Self {
            go_binary: config.go_binary.clone(),
            build_failure_exit_code: config.build_failure_exit_code,
        }
    }

    fn classify(&self, code: Option<i32>, output: &[u8]) -> ExitKind {
        let kind = ExitKind::from_code(code, self.build_failure_exit_code);
        if kind == ExitKind::TestsFailed && mentions_build_failure(output) {
            return ExitKind::BuildFailed;
        }
        kind
    }

    async fn go(&self, folder: &Path, args: &[&str]) -> Result<std::process::Output, RunnerError> {
        Command::new(&self.go_binary)
            .args(args)
            .current_dir(folder)
            .output()
            .await
            .map_err(|source| RunnerError::Spawn {
                program: self.go_binary.clone(),
                source,
            })
    }
}

#[async_trait]
impl TestRunner for GoTestRunner {
    async fn run(&self, folder: &Path) -> Result<RunOutput, RunnerError> {
        let profile_dir = tempfile::tempdir()?;
        let profile = profile_dir.path().join("cover.out");
        let profile_arg = format!("-coverprofile={}", profile.display());

        let test = self.go(folder, &["test", "-json", &profile_arg, "."]).await?;
        let mut output = test.stdout;
        output.extend_from_slice(&test.stderr);

        let exit = self.classify(test.status.code(), &output);
        debug!(folder = %folder.display(), ?exit, "go test finished");

        if exit == ExitKind::BuildFailed || !profile.exists() {
            return Ok(RunOutput {
                exit,
                output,
                coverage: None,
            });
        }

        let profile_func = format!("-func={}", profile.display());
        let cover = self.go(folder, &["tool", "cover", &profile_func]).await?;
        let coverage = if cover.status.success() {
            Some(cover.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&cover.stderr);
            warn!(folder = %folder.display(), stderr = %stderr.trim(), "go tool cover failed");
            None
        };

        Ok(RunOutput {
            exit,
            output,
            coverage,
        })
    }
}

fn mentions_build_failure(output: &[u8]) -> bool {
    let text = String::from_utf8_lossy(output);
    BUILD_FAILURE_MARKERS
        .iter()
        .any(|marker| text.contains(marker))
}
