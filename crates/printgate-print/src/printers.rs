// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CUPS destinations and printer-profile resolution.

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use printgate_core::process::{CommandError, CommandRunner};
use printgate_core::settings::PrinterSettings;
use printgate_core::types::PrinterProfile;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why the list of printers could not be read.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrinterLookupError {
    #[error("The CUPS 'lpstat' command is not available.")]
    ToolMissing,

    #[error("{0}")]
    Failed(String),
}

/// Lists the printers the local print system accepts jobs for.
#[async_trait]
pub trait PrinterDirectory: Send + Sync {
    async fn available_printers(&self) -> Result<Vec<String>, PrinterLookupError>;
}

/// [`PrinterDirectory`] backed by `lpstat -a`.
pub struct LpstatDirectory {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl LpstatDirectory {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }
}

#[async_trait]
impl PrinterDirectory for LpstatDirectory {
    async fn available_printers(&self) -> Result<Vec<String>, PrinterLookupError> {
        let args: [OsString; 1] = ["-a".into()];
        let output = self
            .runner
            .run("lpstat", &args, self.timeout)
            .await
            .map_err(|e| match e {
                CommandError::NotFound { .. } => PrinterLookupError::ToolMissing,
                other => PrinterLookupError::Failed(other.to_string()),
            })?;

        if !output.success() {
            let detail = [output.stderr.trim(), output.stdout.trim()]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or("Unable to list printers via lpstat.");
            return Err(PrinterLookupError::Failed(detail.to_string()));
        }
        Ok(parse_accepting(&output.stdout))
    }
}

/// Printer names from `lpstat -a` output, one per non-blank line.
///
/// ```text
/// Office_Printer accepting requests since Tue 01 Jan 2026 10:00:00 AM
/// ```
pub fn parse_accepting(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once(" accepting") {
            Some((name, _)) => name.to_string(),
            None => line.to_string(),
        })
        .collect()
}

/// Decide which printer jobs go to.
///
/// A configured printer wins. Otherwise, if the print system offers exactly
/// one printer, that one is used. Anything else means no printer.
pub async fn resolve_profile(
    settings: &PrinterSettings,
    directory: &dyn PrinterDirectory,
) -> Option<PrinterProfile> {
    if let Some(profile) = settings.configured_profile() {
        debug!(printer = %profile.name, "using configured printer");
        return Some(profile);
    }

    match directory.available_printers().await {
        Ok(printers) if printers.len() == 1 => {
            let name = printers.into_iter().next()?;
            info!(printer = %name, "no printer configured, using the only one available");
            Some(PrinterProfile::new(name))
        }
        Ok(printers) => {
            debug!(count = printers.len(), "no printer configured and no unambiguous choice");
            None
        }
        Err(e) => {
            warn!(error = %e, "could not list printers");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use printgate_core::process::CommandOutput;

    use super::*;

    struct Fixed(Result<Vec<String>, PrinterLookupError>);

    #[async_trait]
    impl PrinterDirectory for Fixed {
        async fn available_printers(&self) -> Result<Vec<String>, PrinterLookupError> {
            self.0.clone()
        }
    }

    fn names(list: &[&str]) -> Fixed {
        Fixed(Ok(list.iter().map(|s| s.to_string()).collect()))
    }

    #[test]
    fn parses_lpstat_accepting_lines() {
        let out = "Office_Printer accepting requests since Tue 01 Jan 2026\n\nLabel accepting requests since Wed\n";
        assert_eq!(parse_accepting(out), ["Office_Printer", "Label"]);
    }

    #[tokio::test]
    async fn configured_printer_wins() {
        let settings = PrinterSettings {
            printer_profile: Some("Office_Printer".into()),
            ..PrinterSettings::default()
        };
        let profile = resolve_profile(&settings, &names(&["Other"])).await;
        assert_eq!(profile, Some(PrinterProfile::new("Office_Printer")));
    }

    #[tokio::test]
    async fn single_available_printer_is_picked() {
        let profile = resolve_profile(&PrinterSettings::default(), &names(&["Only"])).await;
        assert_eq!(profile, Some(PrinterProfile::new("Only")));
    }

    #[tokio::test]
    async fn ambiguous_or_failed_lookup_selects_nothing() {
        let settings = PrinterSettings::default();
        assert!(resolve_profile(&settings, &names(&["A", "B"])).await.is_none());
        assert!(resolve_profile(&settings, &names(&[])).await.is_none());
        let failed = Fixed(Err(PrinterLookupError::ToolMissing));
        assert!(resolve_profile(&settings, &failed).await.is_none());
    }

    struct CannedRunner(Result<CommandOutput, CommandError>);

    #[async_trait]
    impl CommandRunner for CannedRunner {
        async fn run(
            &self,
            _program: &str,
            _args: &[OsString],
            _timeout: Duration,
        ) -> Result<CommandOutput, CommandError> {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn lpstat_errors_are_reported() {
        let missing = LpstatDirectory::new(
            Arc::new(CannedRunner(Err(CommandError::NotFound { program: "lpstat".into() }))),
            Duration::from_secs(1),
        );
        assert_eq!(missing.available_printers().await, Err(PrinterLookupError::ToolMissing));

        let failing = LpstatDirectory::new(
            Arc::new(CannedRunner(Ok(CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: "lpstat: Bad file descriptor\n".into(),
            }))),
            Duration::from_secs(1),
        );
        assert_eq!(
            failing.available_printers().await,
            Err(PrinterLookupError::Failed("lpstat: Bad file descriptor".into()))
        );
    }
}
