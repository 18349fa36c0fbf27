//! CLI argument definitions for merge-bisect.

use clap::Parser;
use std::path::PathBuf;

/// Version string including the commit the binary was built from.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("MERGE_BISECT_GIT_COMMIT"),
    ")"
);

/// merge-bisect - Like git bisect, but on merge commits.
///
/// Runs CMD on the first-parent revisions of the last --days days and reports
/// the earliest one where CMD started failing. The oldest revision must pass
/// and the newest must fail.
#[derive(Parser, Debug)]
#[command(name = "merge-bisect")]
#[command(version = VERSION, about = "Like git bisect, but on merge commits", long_about = None)]
pub struct Cli {
    /// Command to run in order to find whether a revision is good or bad.
    /// Passed to the shell as-is; exit status 0 means good.
    pub cmd: String,

    /// Check merge commits only going this many days in the past
    #[arg(
        long,
        default_value_t = 30,
        env = "MERGE_BISECT_DAYS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub days: u32,

    /// Print the output of the command live while it runs
    #[arg(short, long)]
    pub verbose: bool,

    /// Run as if merge-bisect was started in <path> instead of the current directory.
    /// The path must exist. Can also be set via MERGE_BISECT_REPO environment variable.
    #[arg(short = 'C', long = "repo", env = "MERGE_BISECT_REPO")]
    pub repo_path: Option<PathBuf>,

    /// Kill the command and count the revision as failing after this many seconds
    #[arg(
        long,
        value_name = "SECS",
        env = "MERGE_BISECT_TIMEOUT",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: Option<u64>,

    /// Print the final report as JSON (progress goes to stderr)
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        // This will panic if the CLI is misconfigured
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["merge-bisect", "make test"]).unwrap();
        assert_eq!(cli.cmd, "make test");
        assert_eq!(cli.days, 30);
        assert!(!cli.verbose);
        assert!(!cli.json);
        assert!(cli.timeout.is_none());
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "merge-bisect",
            "--days",
            "7",
            "-v",
            "--timeout",
            "60",
            "--json",
            "-C",
            "/tmp",
            "cargo test",
        ])
        .unwrap();
        assert_eq!(cli.days, 7);
        assert!(cli.verbose);
        assert!(cli.json);
        assert_eq!(cli.timeout, Some(60));
        assert_eq!(cli.repo_path, Some(PathBuf::from("/tmp")));
        assert_eq!(cli.cmd, "cargo test");
    }

    #[test]
    fn test_rejects_zero_days() {
        assert!(Cli::try_parse_from(["merge-bisect", "--days", "0", "true"]).is_err());
    }

    #[test]
    fn test_requires_command() {
        assert!(Cli::try_parse_from(["merge-bisect"]).is_err());
    }
}
