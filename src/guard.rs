//! Keeping the user's checkout intact across a bisection run.
//!
//! `WorkspaceGuard` records where the working tree points when it is
//! acquired and puts it back when released or dropped, so the run ends on
//! the original branch whether it completes, fails, is interrupted, or panics.
//!
//! Ctrl-C is routed through a process-wide flag rather than killing the
//! process, giving the guard a chance to restore the checkout first.

use crate::Result;
use crate::git::{Position, Workspace};
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Install the Ctrl-C handler that sets the interrupt flag.
///
/// Safe to call more than once; later calls are ignored.
pub fn install_interrupt_handler() {
    if let Err(e) = ctrlc::set_handler(request_interrupt) {
        tracing::debug!(error = %e, "interrupt handler not installed");
    }
}

/// Whether an interrupt has been requested.
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Flag the run as interrupted.
pub fn request_interrupt() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

#[cfg(test)]
pub(crate) fn clear_interrupt() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Scoped record of the original working tree position.
pub struct WorkspaceGuard<'w, W: Workspace> {
    workspace: &'w W,
    original: Position,
    released: bool,
}

impl<'w, W: Workspace> WorkspaceGuard<'w, W> {
    /// Record the current position of `workspace`.
    pub fn acquire(workspace: &'w W) -> Result<Self> {
        let original = workspace.current_position()?;
        tracing::debug!(position = %original, "recorded original position");
        Ok(Self {
            workspace,
            original,
            released: false,
        })
    }

    /// Restore the original position now, reporting any failure.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.restore()
    }

    fn restore(&self) -> Result<()> {
        if self.workspace.current_position().ok().as_ref() == Some(&self.original) {
            return Ok(());
        }
        tracing::debug!(position = %self.original, "restoring original position");
        self.workspace.restore(&self.original)
    }
}

impl<W: Workspace> Drop for WorkspaceGuard<'_, W> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.restore() {
            tracing::warn!(error = %e, "failed to restore original position");
            eprintln!(
                "merge-bisect: warning: could not return to {}: {}\n\n  Run `git checkout {}` to restore it.",
                self.original,
                e,
                self.original.checkout_target()
            );
        }
    }
}
