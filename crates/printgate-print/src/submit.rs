// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print submission through the CUPS `lp` command.
//
// The text `lp` writes is the only way a user learns why a physical printer
// rejected a job, so on failure it is surfaced as-is rather than reduced to
// an exit code.

use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use printgate_core::error::{PrintgateError, Result};
use printgate_core::process::{CommandOutput, CommandRunner};
use printgate_core::types::{PrintOptions, PrinterProfile};
use tracing::{info, instrument, warn};

/// What the printing subsystem handed back for an accepted job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// CUPS request id, e.g. `Office_Printer-42`.
    pub request_id: Option<String>,
}

/// Hands a printable file to the printing subsystem.
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Submit `file` to `printer` with the job's options.
    ///
    /// Fails with [`PrintgateError::PrintSubmissionFailed`] carrying the
    /// tool's captured output.
    async fn submit(
        &self,
        file: &Path,
        printer: &PrinterProfile,
        options: &PrintOptions,
    ) -> Result<SubmitReceipt>;
}

/// [`Submitter`] backed by `lp`.
pub struct LpSubmitter {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
}

impl LpSubmitter {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self {
            runner,
            program: "lp".into(),
            timeout,
        }
    }
}

/// `-d <printer> [-P <pages>] -o orientation-requested=<n> -o ColorModel=<mode> <file>`
pub fn build_lp_args(file: &Path, printer: &PrinterProfile, options: &PrintOptions) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-d".into(), printer.name.clone().into()];
    if let Some(pages) = options.pages.as_page_list() {
        args.push("-P".into());
        args.push(pages.into());
    }
    args.push("-o".into());
    args.push(format!("orientation-requested={}", options.orientation.ipp_enum_value()).into());
    args.push("-o".into());
    args.push(format!("ColorModel={}", options.color.cups_keyword()).into());
    args.push(file.as_os_str().to_owned());
    args
}

/// Pull the request id out of `request id is Office-42 (1 file(s))`.
pub fn parse_request_id(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        line.trim()
            .strip_prefix("request id is ")
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string)
    })
}

/// The failure text to show for a finished `lp` run, or `None` when it
/// succeeded. Anything on stderr counts as failure even with exit status 0.
fn failure_text(program: &str, output: &CommandOutput) -> Option<String> {
    let stderr = output.stderr.trim();
    if output.success() && stderr.is_empty() {
        return None;
    }
    if !stderr.is_empty() {
        return Some(stderr.to_string());
    }
    let stdout = output.stdout.trim();
    if !stdout.is_empty() {
        return Some(stdout.to_string());
    }
    Some(match output.status {
        Some(code) => format!("{program} exited with status {code}"),
        None => format!("{program} was terminated by a signal"),
    })
}

#[async_trait]
impl Submitter for LpSubmitter {
    #[instrument(skip(self, options), fields(printer = %printer.name, file = %file.display()))]
    async fn submit(
        &self,
        file: &Path,
        printer: &PrinterProfile,
        options: &PrintOptions,
    ) -> Result<SubmitReceipt> {
        let args = build_lp_args(file, printer, options);
        let output = self
            .runner
            .run(&self.program, &args, self.timeout)
            .await
            .map_err(|e| PrintgateError::PrintSubmissionFailed(e.to_string()))?;

        if let Some(text) = failure_text(&self.program, &output) {
            warn!(status = ?output.status, output = %text, "print submission failed");
            return Err(PrintgateError::PrintSubmissionFailed(text));
        }

        let request_id = parse_request_id(&output.stdout);
        info!(request_id = request_id.as_deref().unwrap_or("-"), "job accepted by CUPS");
        Ok(SubmitReceipt { request_id })
    }
}
