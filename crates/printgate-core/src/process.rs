// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External-process seam.
//
// Conversion, submission and the command-line diagnostics strategies all run
// through `CommandRunner`, so tests can swap in canned output instead of
// spawning `soffice`, `lp`, `lpstat` or `ipptool`.

use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Why a process could not produce a [`CommandOutput`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("{program}: command not found")]
    NotFound { program: String },

    #[error("{program} timed out after {after:?}")]
    TimedOut { program: String, after: Duration },

    #[error("failed to run {program}: {reason}")]
    Spawn { program: String, reason: String },
}

/// Runs a program to completion and captures its output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[OsString],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError>;
}

/// [`CommandRunner`] backed by `tokio::process`.
///
/// The child is killed if the timeout elapses.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &str,
        args: &[OsString],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        debug!(program, ?args, "spawning");
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CommandError::NotFound {
                    program: program.to_string(),
                },
                _ => CommandError::Spawn {
                    program: program.to_string(),
                    reason: e.to_string(),
                },
            })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CommandError::Spawn {
                    program: program.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(CommandError::TimedOut {
                    program: program.to_string(),
                    after: timeout,
                });
            }
        };

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args<const N: usize>(items: [&str; N]) -> Vec<OsString> {
        items.into_iter().map(OsString::from).collect()
    }

    #[tokio::test]
    async fn missing_program_reports_not_found() {
        let err = SystemRunner
            .run(
                "printgate-definitely-not-installed",
                &[],
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let output = SystemRunner
            .run(
                "sh",
                &args(["-c", "echo out; echo err >&2; exit 3"]),
                Duration::from_secs(5),
            )
            .await
            .expect("sh should run");
        assert_eq!(output.status, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_process_times_out() {
        let err = SystemRunner
            .run("sleep", &args(["5"]), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
    }
}
