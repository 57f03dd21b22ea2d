//! Privileged command execution through the sudo-util helper.
//!
//! Administrative steps that need elevated local rights (rootless docker
//! wiring, linger management) go through a single helper binary invoked
//! as `sudo -n rigger-sudoutil <mode> [args...]`. The sudoers allowlist
//! for that invocation is operator-managed; in local development the
//! helper runs directly as the current user instead.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::config::BridgeConfig;
use crate::error::{ProvisionError, ProvisionResult};

/// How the helper is invoked. Chosen once at construction, never
/// branched at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationStrategy {
    /// Production: `sudo -n <helper> ...` through the sudoers allowlist.
    Sudo,
    /// Local development: run the helper directly.
    Direct,
}

/// How the helper process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitDisposition {
    Code(i32),
    Signal(String),
}

impl fmt::Display for ExitDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitDisposition::Code(code) => write!(f, "exit code {code}"),
            ExitDisposition::Signal(name) => write!(f, "killed by {name}"),
        }
    }
}

/// Captured result of one helper invocation. Output captured before a
/// failure is preserved in the corresponding error.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub disposition: ExitDisposition,
    pub stdout: String,
    pub stderr: String,
}

/// Executor for the privileged helper binary.
pub struct SudoUtil {
    program: PathBuf,
    strategy: EscalationStrategy,
}

impl SudoUtil {
    pub fn new(program: impl AsRef<Path>, strategy: EscalationStrategy) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            strategy,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(&config.sudo_util, config.escalation())
    }

    fn build_command(&self, mode: &str, args: &[&str]) -> Command {
        let mut cmd = match self.strategy {
            EscalationStrategy::Sudo => {
                let mut c = Command::new("sudo");
                c.arg("-n").arg(&self.program);
                c
            }
            EscalationStrategy::Direct => Command::new(&self.program),
        };
        cmd.arg(mode).args(args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn command_line(&self, mode: &str, args: &[&str]) -> String {
        let mut line = format!("{} {mode}", self.program.display());
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Run one helper invocation to completion.
    ///
    /// Stdout and stderr are accumulated incrementally as the process
    /// writes, not buffered until exit. Exit code 0 resolves, as does
    /// termination by a signal without an exit code (an expected
    /// supervisory kill). Any nonzero code fails with the captured
    /// output attached. A spawn failure (helper missing, permission
    /// denied) reports through the same error shape with the OS error
    /// appended to stderr.
    pub async fn run(&self, mode: &str, args: &[&str]) -> ProvisionResult<ExecOutput> {
        let command = self.command_line(mode, args);
        debug!("running privileged helper: {command}");

        let mut child = match self.build_command(mode, args).spawn() {
            Ok(child) => child,
            Err(e) => {
                return Err(ProvisionError::ExecutionFailure {
                    command,
                    disposition: ExitDisposition::Code(-1),
                    stdout: String::new(),
                    stderr: format!("{e}\n"),
                });
            }
        };

        let stdout_task = child.stdout.take().map(|pipe| tokio::spawn(drain(pipe)));
        let stderr_task = child.stderr.take().map(|pipe| tokio::spawn(drain(pipe)));

        // A wait failure reports through the same shape as every other
        // execution problem, never a bare io error.
        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                return Err(ProvisionError::ExecutionFailure {
                    command,
                    disposition: ExitDisposition::Code(-1),
                    stdout: String::new(),
                    stderr: format!("{e}\n"),
                });
            }
        };

        let mut stdout = String::new();
        if let Some(task) = stdout_task {
            stdout = task.await.unwrap_or_default();
        }
        let mut stderr = String::new();
        if let Some(task) = stderr_task {
            stderr = task.await.unwrap_or_default();
        }

        let disposition = match status.code() {
            Some(code) => ExitDisposition::Code(code),
            None => ExitDisposition::Signal(signal_name(&status)),
        };

        match disposition {
            // Signal terminations without an exit code count as benign
            // supervisory kills.
            ExitDisposition::Code(0) | ExitDisposition::Signal(_) => Ok(ExecOutput {
                disposition,
                stdout,
                stderr,
            }),
            ExitDisposition::Code(_) => Err(ProvisionError::ExecutionFailure {
                command,
                disposition,
                stdout,
                stderr,
            }),
        }
    }

    /// Fire-and-forget variant: spawn the helper and hand back the live
    /// child so the caller can attach its own stream consumers.
    pub fn spawn(&self, mode: &str, args: &[&str]) -> ProvisionResult<Child> {
        debug!(
            "spawning privileged helper: {}",
            self.command_line(mode, args)
        );
        Ok(self.build_command(mode, args).spawn()?)
    }
}

/// Read a pipe to EOF, accumulating chunks as they arrive. Decoded to
/// text once at the end so a multi-byte character split across read
/// boundaries is not mangled.
async fn drain<R: AsyncRead + Unpin>(mut pipe: R) -> String {
    let mut acc = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => acc.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&acc).into_owned()
}

#[cfg(unix)]
fn signal_name(status: &std::process::ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(9) => "SIGKILL".to_string(),
        Some(15) => "SIGTERM".to_string(),
        Some(11) => "SIGSEGV".to_string(),
        Some(6) => "SIGABRT".to_string(),
        Some(2) => "SIGINT".to_string(),
        Some(1) => "SIGHUP".to_string(),
        Some(n) => format!("signal {n}"),
        None => "unknown signal".to_string(),
    }
}

#[cfg(not(unix))]
fn signal_name(_status: &std::process::ExitStatus) -> String {
    "unknown signal".to_string()
}
