//! Run configuration for merge-bisect.
//!
//! There is no config file. Everything comes from CLI flags, some of which
//! can also be supplied through environment variables:
//!
//! - `MERGE_BISECT_DAYS` - width of the search window (`--days`)
//! - `MERGE_BISECT_REPO` - directory to run in (`-C/--repo`)
//! - `MERGE_BISECT_TIMEOUT` - per-command timeout in seconds (`--timeout`)
//!
//! Log verbosity is controlled separately by `MERGE_BISECT_LOG`; see
//! [`crate::logging`].

use crate::cli::Cli;
use crate::oracle::Progress;
use crate::{Error, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Output format for the final report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output (machine-readable)
    Json,
}

impl OutputFormat {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Human => "human",
            OutputFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct BisectConfig {
    /// Opaque shell command used as the oracle
    pub command: String,
    /// How many days back to look for revisions
    pub days: u32,
    /// Stream command output live
    pub verbose: bool,
    /// Directory git and the command run in
    pub repo_path: PathBuf,
    /// Per-command timeout; `None` waits forever
    pub timeout: Option<Duration>,
    pub format: OutputFormat,
}

impl BisectConfig {
    /// Resolve and validate configuration from parsed CLI arguments.
    ///
    /// An explicit repo path is used literally and must exist; otherwise the
    /// current directory is used.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.cmd.trim().is_empty() {
            return Err(Error::InvalidInput("command must not be empty".to_string()));
        }

        let repo_path = match cli.repo_path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::InvalidInput(format!(
                        "Specified repo path does not exist: {}",
                        path.display()
                    )));
                }
                path
            }
            None => env::current_dir()?,
        };

        Ok(Self {
            command: cli.cmd,
            days: cli.days,
            verbose: cli.verbose,
            repo_path,
            timeout: cli.timeout.map(Duration::from_secs),
            format: if cli.json {
                OutputFormat::Json
            } else {
                OutputFormat::Human
            },
        })
    }

    /// The search window as a duration counted back from now.
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.days))
    }

    /// Where progress lines go, keeping stdout clean for JSON.
    pub fn progress(&self) -> Progress {
        match self.format {
            OutputFormat::Human => Progress::Stdout,
            OutputFormat::Json => Progress::Stderr,
        }
    }
}
