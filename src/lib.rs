//! merge-bisect - Bisection over the first-parent merge history of a git repository.
//!
//! This library provides the core functionality for the `merge-bisect` CLI tool:
//! listing recent merge points, running a validation command on each candidate,
//! and narrowing down the first revision where that command started failing.

pub mod bisect;
pub mod cli;
pub mod commands;
pub mod config;
pub mod git;
pub mod guard;
pub mod logging;
pub mod models;
pub mod oracle;
pub mod report;

/// Library-level error type for merge-bisect operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("at least 2 merge revisions are needed to bisect, found {found}")]
    InsufficientHistory { found: usize },

    #[error("earliest revision {revision} already fails")]
    NoGoodBaseline { revision: String },

    #[error("latest revision {revision} already passes")]
    NoBadTarget { revision: String },

    #[error("bisection finished without any failing revision")]
    NoTransitionFound,

    #[error("not a git repository: {0}")]
    NotARepository(String),

    #[error("`git {command}` failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("failed to check out {identifier}: {stderr}")]
    Checkout { identifier: String, stderr: String },

    #[error("interrupted")]
    Interrupted,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Remediation guidance shown below the error message.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::InsufficientHistory { .. } => Some(
                "Widen the search window with --days so that it covers at least two merges.",
            ),
            Error::NoGoodBaseline { .. } => Some(
                "At least one passing revision is needed in the window. \
                 Increase --days to reach back to a known-good merge.",
            ),
            Error::NoBadTarget { .. } => Some(
                "The newest revision must fail the command for there to be a regression \
                 to find. Check the command against the current checkout.",
            ),
            Error::NoTransitionFound => Some(
                "The command is probably not monotonic over history (flaky or fixed-then-broken).",
            ),
            Error::NotARepository(_) => Some("Run inside a git work tree or pass -C <path>."),
            Error::Checkout { .. } => {
                Some("Commit or stash local changes that conflict with the checkout.")
            }
            _ => None,
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Interrupted => 130,
            _ => 1,
        }
    }
}

/// Result type alias for merge-bisect operations.
pub type Result<T> = std::result::Result<T, Error>;
