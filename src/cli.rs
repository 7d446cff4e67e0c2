use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Continuous test runner for Go source trees.
///
/// autotest watches a directory, reruns the tests of every folder that changes,
/// and reports failures and coverage changes against the first clean run.
#[derive(Parser, Debug)]
#[command(
    name = "autotest",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable ANSI colors even when stdout is a terminal.
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl Cli {
    /// Default log filter when RUST_LOG is not set.
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a source tree and rerun tests of every folder that changes.
    Watch {
        /// Root of the tree to watch.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Quiet period in milliseconds before a changed folder is tested.
        #[arg(long)]
        debounce_ms: Option<u64>,

        /// Capacity of each internal queue.
        #[arg(long)]
        queue_depth: Option<usize>,

        /// Path to the `go` executable.
        #[arg(long)]
        go: Option<String>,
    },

    /// Run the tests of one folder once and print the full result.
    Run {
        /// Folder whose tests to run.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Path to the `go` executable.
        #[arg(long)]
        go: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_defaults_to_current_dir() {
        let cli = Cli::parse_from(["autotest", "watch"]);
        assert_eq!(cli.log_level(), "info");
        match &cli.command {
            Commands::Watch {
                path, debounce_ms, ..
            } => {
                assert_eq!(path, &PathBuf::from("."));
                assert_eq!(*debounce_ms, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["autotest", "run", "pkg", "--verbose", "--no-color", "--go", "/opt/go/bin/go"]);
        assert!(cli.verbose);
        assert!(cli.no_color);
        assert_eq!(cli.log_level(), "debug");
        match cli.command {
            Commands::Run { path, go } => {
                assert_eq!(path, PathBuf::from("pkg"));
                assert_eq!(go.as_deref(), Some("/opt/go/bin/go"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_watch_overrides() {
        let cli = Cli::parse_from(["autotest", "watch", "src", "--debounce-ms", "250", "--queue-depth", "4"]);
        let Commands::Watch {
            debounce_ms,
            queue_depth,
            ..
        } = cli.command
        else {
            panic!("expected watch");
        };
        assert_eq!(debounce_ms, Some(250));
        assert_eq!(queue_depth, Some(4));
    }
}
