//! Common test utilities for merge-bisect integration tests.
//!
//! Provides `TestRepo`, a throwaway git repository whose history is built
//! from a list of states. Each commit writes its state into a `state` file,
//! so `grep -q good state` acts as a monotonic oracle.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::Path;
use std::process::Command as StdCommand;
pub use tempfile::TempDir;

/// Oracle command that passes while the `state` file says "good".
pub const GOOD_ORACLE: &str = "grep -q good state";

/// A git repository in a temporary directory, on branch `main`.
pub struct TestRepo {
    pub dir: TempDir,
}

impl TestRepo {
    /// Create an empty repository with identity configured.
    pub fn new() -> Self {
        let repo = Self {
            dir: TempDir::new().unwrap(),
        };
        repo.git(&["init", "--quiet"]);
        repo.git(&["symbolic-ref", "HEAD", "refs/heads/main"]);
        repo.git(&["config", "user.email", "test@test.com"]);
        repo.git(&["config", "user.name", "Test"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo
    }

    /// Create a repository with one commit per state, oldest first.
    ///
    /// Returns the repository and the commit hashes in the same order.
    pub fn with_history(states: &[&str]) -> (Self, Vec<String>) {
        let repo = Self::new();
        let shas = states
            .iter()
            .enumerate()
            .map(|(i, state)| repo.commit_state(state, &format!("Merge change {}", i)))
            .collect();
        (repo, shas)
    }

    /// Get the path to the repository.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run git in the repository, panicking on failure, and return stdout.
    pub fn git(&self, args: &[&str]) -> String {
        self.git_with_env(args, &[])
    }

    fn git_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> String {
        let output = StdCommand::new("git")
            .args(args)
            .envs(env.iter().copied())
            .current_dir(self.path())
            .output()
            .expect("Failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Commit `state` into the `state` file and return the new hash.
    pub fn commit_state(&self, state: &str, message: &str) -> String {
        self.commit_state_with_env(state, message, &[])
    }

    /// Commit `state` with both author and committer time set to `unix_time`.
    pub fn commit_state_at(&self, state: &str, message: &str, unix_time: i64) -> String {
        let date = format!("{} +0000", unix_time);
        self.commit_state_with_env(
            state,
            message,
            &[
                ("GIT_AUTHOR_DATE", date.as_str()),
                ("GIT_COMMITTER_DATE", date.as_str()),
            ],
        )
    }

    fn commit_state_with_env(&self, state: &str, message: &str, env: &[(&str, &str)]) -> String {
        std::fs::write(self.path().join("state"), format!("{}\n", state)).unwrap();
        self.git(&["add", "state"]);
        self.git_with_env(&["commit", "--quiet", "--allow-empty", "-m", message], env);
        self.head_sha()
    }

    /// Current commit hash.
    pub fn head_sha(&self) -> String {
        self.git(&["rev-parse", "HEAD"])
    }

    /// Name of the checked-out branch, or `None` when detached.
    pub fn head_branch(&self) -> Option<String> {
        let output = StdCommand::new("git")
            .args(["symbolic-ref", "--quiet", "--short", "HEAD"])
            .current_dir(self.path())
            .output()
            .expect("Failed to run git");
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Get a Command for the merge-bisect binary running in this repository.
    pub fn merge_bisect(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_merge-bisect"));
        cmd.current_dir(self.path());
        cmd.env_remove("MERGE_BISECT_DAYS");
        cmd.env_remove("MERGE_BISECT_REPO");
        cmd.env_remove("MERGE_BISECT_TIMEOUT");
        cmd
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifiers from `PASSED:`/`FAILED:` progress lines, in order.
pub fn evaluated_shas(stdout: &str, shas: &[String]) -> Vec<String> {
    stdout
        .lines()
        .filter(|line| line.starts_with("PASSED: ") || line.starts_with("FAILED: "))
        .filter_map(|line| shas.iter().find(|sha| line.contains(sha.as_str())).cloned())
        .collect()
}
