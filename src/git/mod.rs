//! Git adapters for listing revisions and moving the working tree.
//!
//! This module provides the two seams the bisection run depends on:
//! - `RevisionSource` - produces the first-parent revisions of a time window
//! - `Workspace` - reads and sets the current checkout
//!
//! `Git` implements both by shelling out to the `git` binary, so it works
//! with whatever git configuration the user already has.

use crate::guard;
use crate::models::Revision;
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Field separator used in the `git log` pretty format.
const LOG_SEPARATOR: char = '\t';

/// Pretty format producing `<commit time>\t<hash>\t<author>\t<subject>`.
const LOG_FORMAT: &str = "--pretty=format:%ct%x09%H%x09%an%x09%s";

/// Produces the candidate revisions for a bisection run.
pub trait RevisionSource {
    /// Revisions on the first-parent line committed within `window` of now,
    /// oldest first and without duplicates.
    ///
    /// Returns an empty list when history cannot be queried.
    fn list_revisions(&self, window: Duration) -> Vec<Revision>;
}

/// The checked-out state of a working tree.
///
/// Only one revision can be materialized at a time, so callers must not
/// evaluate revisions concurrently against the same workspace.
pub trait Workspace {
    /// Where the working tree currently points.
    fn current_position(&self) -> Result<Position>;

    /// Materialize `identifier` as the working tree (detached).
    fn checkout(&self, identifier: &str) -> Result<()>;

    /// Return to a position captured earlier with `current_position`.
    fn restore(&self, position: &Position) -> Result<()>;
}

/// A working tree position that can be restored later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    /// HEAD is attached to a local branch
    Branch(String),
    /// HEAD points directly at a commit
    Detached(String),
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Branch(name) => write!(f, "{}", name),
            Position::Detached(sha) => write!(f, "{} (detached)", sha),
        }
    }
}

impl Position {
    /// The argument to pass to `git checkout` to return here.
    pub fn checkout_target(&self) -> &str {
        match self {
            Position::Branch(name) => name,
            Position::Detached(sha) => sha,
        }
    }
}

/// `git` command-line adapter bound to one working tree.
#[derive(Debug, Clone)]
pub struct Git {
    /// Directory git commands run in.
    repo_path: PathBuf,
}

impl Git {
    /// Open the working tree containing `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let git = Self {
            repo_path: path.to_path_buf(),
        };

        match git.run(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(out) if out.trim() == "true" => Ok(git),
            _ => Err(Error::NotARepository(path.display().to_string())),
        }
    }

    /// Run git with `args` and return stdout, failing on a non-zero exit.
    fn run(&self, args: &[&str]) -> Result<String> {
        tracing::debug!(args = ?args, "running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .map_err(|e| Error::Git {
                command: args.join(" "),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::Git {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Raw `git log` output for the first-parent line since `since`.
    fn first_parent_log(&self, since: DateTime<Utc>) -> Result<String> {
        let since_arg = format!("--since={}", since.format("%Y-%m-%d %H:%M:%S +0000"));
        self.run(&["log", "--first-parent", LOG_FORMAT, since_arg.as_str()])
    }

    fn checkout_args(&self, args: &[&str], identifier: &str) -> Result<()> {
        self.run(args).map(|_| ()).map_err(|e| match e {
            Error::Git { stderr, .. } => Error::Checkout {
                identifier: identifier.to_string(),
                stderr,
            },
            other => other,
        })
    }
}

impl RevisionSource for Git {
    fn list_revisions(&self, window: Duration) -> Vec<Revision> {
        let since = Utc::now() - window;
        match self.first_parent_log(since) {
            Ok(output) => parse_log(&output),
            Err(e) => {
                tracing::warn!(error = %e, "failed to list revisions");
                Vec::new()
            }
        }
    }
}

impl Workspace for Git {
    fn current_position(&self) -> Result<Position> {
        if let Ok(branch) = self.run(&["symbolic-ref", "--quiet", "--short", "HEAD"]) {
            return Ok(Position::Branch(branch.trim().to_string()));
        }
        let sha = self.run(&["rev-parse", "HEAD"])?;
        Ok(Position::Detached(sha.trim().to_string()))
    }

    fn checkout(&self, identifier: &str) -> Result<()> {
        self.checkout_args(&["checkout", "--quiet", "--detach", identifier], identifier)
            .map_err(|e| {
                // Ctrl-C reaches git as well and aborts the checkout.
                if guard::interrupted() { Error::Interrupted } else { e }
            })
    }

    fn restore(&self, position: &Position) -> Result<()> {
        match position {
            Position::Branch(name) => {
                self.checkout_args(&["checkout", "--quiet", name.as_str()], name)
            }
            Position::Detached(sha) => {
                self.checkout_args(&["checkout", "--quiet", "--detach", sha.as_str()], sha)
            }
        }
    }
}

/// Parse one line of `LOG_FORMAT` output.
///
/// The subject is the last field and may itself contain tabs.
pub fn parse_log_line(line: &str) -> Option<Revision> {
    let mut fields = line.splitn(4, LOG_SEPARATOR);
    let seconds: i64 = fields.next()?.trim().parse().ok()?;
    let identifier = fields.next()?.trim();
    if identifier.is_empty() {
        return None;
    }
    let author = fields.next().unwrap_or_default();
    let summary = fields.next().unwrap_or_default();
    let timestamp = DateTime::from_timestamp(seconds, 0)?;

    Some(Revision::new(timestamp, identifier, author, summary))
}

/// Parse `git log` output (newest first) into an oldest-first sequence.
///
/// Malformed lines are skipped. Duplicate identifiers keep their first
/// (oldest) occurrence.
pub fn parse_log(output: &str) -> Vec<Revision> {
    let mut seen = HashSet::new();
    output
        .lines()
        .rev()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = parse_log_line(line);
            if parsed.is_none() {
                tracing::debug!(line, "skipping malformed log line");
            }
            parsed
        })
        .filter(|revision| seen.insert(revision.identifier.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_parse_log_line() {
        let rev = parse_log_line("1700000000\tabc123\tAlice Smith\tMerge pull request #42")
            .unwrap();
        assert_eq!(rev.identifier, "abc123");
        assert_eq!(rev.author, "Alice Smith");
        assert_eq!(rev.summary, "Merge pull request #42");
        assert_eq!(rev.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_log_line_keeps_tabs_in_summary() {
        let rev = parse_log_line("1700000000\tabc\tBob\tfix:\tthings").unwrap();
        assert_eq!(rev.summary, "fix:\tthings");
    }

    #[test]
    fn test_parse_log_line_empty_summary() {
        let rev = parse_log_line("1700000000\tabc\tBob\t").unwrap();
        assert_eq!(rev.summary, "");
    }

    #[test]
    fn test_parse_log_line_rejects_malformed() {
        assert!(parse_log_line("").is_none());
        assert!(parse_log_line("not-a-time\tabc\tBob\tx").is_none());
        assert!(parse_log_line("1700000000").is_none());
        assert!(parse_log_line("1700000000\t\tBob\tx").is_none());
    }

    #[test]
    fn test_parse_log_reverses_to_oldest_first() {
        let output = "1700000300\tccc\tC\tthird\n\
                      1700000200\tbbb\tB\tsecond\n\
                      1700000100\taaa\tA\tfirst\n";
        let ids: Vec<_> = parse_log(output)
            .into_iter()
            .map(|r| r.identifier)
            .collect();
        assert_eq!(ids, vec!["aaa", "bbb", "ccc"]);
    }

    #[test]
    fn test_parse_log_dedupes_and_skips_garbage() {
        let output = "1700000200\tbbb\tB\tsecond\n\
                      \n\
                      garbage line\n\
                      1700000100\taaa\tA\tfirst\n\
                      1700000100\taaa\tA\tfirst again\n";
        let revs = parse_log(output);
        assert_eq!(revs.len(), 2);
        assert_eq!(revs[0].identifier, "aaa");
        assert_eq!(revs[0].summary, "first again");
        assert_eq!(revs[1].identifier, "bbb");
    }

    #[test]
    fn test_parse_log_empty_output() {
        assert!(parse_log("").is_empty());
    }

    #[test]
    fn test_position_display_and_target() {
        let branch = Position::Branch("main".to_string());
        assert_eq!(branch.to_string(), "main");
        assert_eq!(branch.checkout_target(), "main");

        let detached = Position::Detached("abc".to_string());
        assert_eq!(detached.to_string(), "abc (detached)");
        assert_eq!(detached.checkout_target(), "abc");
    }

    #[test]
    #[serial]
    fn test_checkout_failure_during_interrupt_reports_interrupt() {
        let dir = TempDir::new().unwrap();
        let git = Git {
            repo_path: dir.path().to_path_buf(),
        };

        let err = git.checkout("abc123").unwrap_err();
        assert!(matches!(err, Error::Checkout { .. }));

        guard::request_interrupt();
        let err = git.checkout("abc123").unwrap_err();
        guard::clear_interrupt();
        assert!(matches!(err, Error::Interrupted));
    }
}
