//! Running the validation command against a revision.
//!
//! The command is an opaque shell string. It is never parsed or validated;
//! its exit status is the only pass/fail signal. A command that cannot even
//! be launched counts as a failure, with the launch error as its output.

use crate::git::Workspace;
use crate::guard;
use crate::models::{Evaluation, Revision};
use crate::{Error, Result};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Width of the rule printed around streamed output.
const RULE_WIDTH: usize = 80;

/// How often a running command is checked for timeout and interrupt.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How waiting on the command ended.
enum Wait {
    Exited(ExitStatus),
    TimedOut,
    Interrupted,
}

/// Decides whether a revision is good.
pub trait Oracle {
    /// Materialize `revision` and judge it.
    ///
    /// Only fatal conditions (checkout failure, interrupt) are errors; a
    /// command that fails or cannot start yields a failed `Evaluation`.
    fn evaluate(&mut self, revision: &Revision) -> Result<Evaluation>;
}

/// Where progress lines and streamed output go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Progress {
    #[default]
    Stdout,
    /// Used when stdout is reserved for a machine-readable report
    Stderr,
    /// Discard progress output
    Quiet,
}

impl Progress {
    /// Print one line.
    pub fn emit(self, line: &str) {
        match self {
            Progress::Stdout => println!("{}", line),
            Progress::Stderr => eprintln!("{}", line),
            Progress::Quiet => {}
        }
    }

    fn echo(self, bytes: &[u8]) {
        let _ = match self {
            Progress::Stdout => std::io::stdout().write_all(bytes),
            Progress::Stderr => std::io::stderr().write_all(bytes),
            Progress::Quiet => Ok(()),
        };
    }
}

/// Oracle that checks out each revision and runs a shell command on it.
pub struct ShellOracle<'w, W: Workspace> {
    workspace: &'w W,
    command: String,
    work_dir: PathBuf,
    verbose: bool,
    timeout: Option<Duration>,
    progress: Progress,
}

impl<'w, W: Workspace> ShellOracle<'w, W> {
    /// Create an oracle running `command` in `work_dir`.
    pub fn new(workspace: &'w W, command: impl Into<String>, work_dir: &Path) -> Self {
        Self {
            workspace,
            command: command.into(),
            work_dir: work_dir.to_path_buf(),
            verbose: false,
            timeout: None,
            progress: Progress::default(),
        }
    }

    /// Stream command output live while it runs.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Kill the command if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// Run the command once in the current checkout.
    pub fn run_command(&self) -> Evaluation {
        let mut child = match self.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(command = %self.command, error = %e, "failed to launch command");
                let message = format!("failed to launch `{}`: {}", self.command, e);
                if self.verbose {
                    self.progress.emit(&message);
                }
                return Evaluation::failed(message);
            }
        };

        let echo = if self.verbose {
            self.progress
        } else {
            Progress::Quiet
        };
        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let readers = [
            child
                .stdout
                .take()
                .map(|out| capture(out, Arc::clone(&stdout_buf), echo)),
            child.stderr.take().map(|err| {
                let echo = if echo == Progress::Quiet {
                    Progress::Quiet
                } else {
                    Progress::Stderr
                };
                capture(err, Arc::clone(&stderr_buf), echo)
            }),
        ];

        let (passed, note) = match self.wait(&mut child) {
            Ok(Wait::Exited(status)) => (status.success(), None),
            Ok(Wait::TimedOut) => {
                let limit = self.timeout.unwrap_or_default();
                tracing::warn!(command = %self.command, ?limit, "command timed out");
                (
                    false,
                    Some(format!("command timed out after {}s", limit.as_secs_f64())),
                )
            }
            Ok(Wait::Interrupted) => (false, Some("command interrupted".to_string())),
            Err(e) => {
                terminate(&mut child);
                (false, Some(format!("failed to wait for command: {}", e)))
            }
        };

        // Pipes close once the command, or its killed group, has exited.
        for handle in readers.into_iter().flatten() {
            let _ = handle.join();
        }

        let mut output = snapshot(&stdout_buf);
        output.push_str(&snapshot(&stderr_buf));
        if let Some(note) = note {
            if self.verbose {
                self.progress.emit(&note);
            }
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&note);
        }

        Evaluation { passed, output }
    }

    fn spawn(&self) -> std::io::Result<Child> {
        let mut cmd = shell_command(&self.command);
        cmd.current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group, so a timeout or interrupt can stop every
        // process the shell starts, not just the shell.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd.spawn()
    }

    /// Wait for the command to exit, stopping it on timeout or interrupt.
    fn wait(&self, child: &mut Child) -> std::io::Result<Wait> {
        let started = Instant::now();
        loop {
            let slice = match self.timeout {
                Some(limit) => {
                    let remaining = limit.saturating_sub(started.elapsed());
                    if remaining.is_zero() {
                        terminate(child);
                        return Ok(Wait::TimedOut);
                    }
                    remaining.min(POLL_INTERVAL)
                }
                None => POLL_INTERVAL,
            };

            if let Some(status) = child.wait_timeout(slice)? {
                return Ok(Wait::Exited(status));
            }

            if guard::interrupted() {
                terminate(child);
                return Ok(Wait::Interrupted);
            }
        }
    }
}

impl<W: Workspace> Oracle for ShellOracle<'_, W> {
    fn evaluate(&mut self, revision: &Revision) -> Result<Evaluation> {
        if guard::interrupted() {
            return Err(Error::Interrupted);
        }

        self.workspace.checkout(&revision.identifier)?;

        if self.verbose {
            self.progress.emit("");
            let header = format!("{} {}", "=".repeat(RULE_WIDTH), revision.identifier);
            self.progress.emit(&header);
        }

        let evaluation = self.run_command();

        // An interrupted command's result says nothing.
        if guard::interrupted() {
            return Err(Error::Interrupted);
        }

        if self.verbose {
            self.progress.emit(&"=".repeat(RULE_WIDTH));
        }

        let status = if evaluation.passed { "PASSED" } else { "FAILED" };
        self.progress.emit(&format!("{}: {}", status, revision));
        tracing::debug!(revision = %revision.identifier, passed = evaluation.passed, "evaluated");

        Ok(evaluation)
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Kill the command's whole process group and reap the shell.
///
/// Must run before the shell is reaped, while its pid still names the group.
#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
        tracing::debug!(error = %e, "failed to kill command process group");
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(windows)]
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Drain `reader` into `buffer` on a background thread, echoing each line.
fn capture<R: Read + Send + 'static>(
    reader: R,
    buffer: Arc<Mutex<Vec<u8>>>,
    echo: Progress,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    echo.echo(&line);
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(&line);
                    }
                }
            }
        }
    })
}

fn snapshot(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    buffer
        .lock()
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}
