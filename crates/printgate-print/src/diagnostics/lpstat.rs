// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Probe strategy 3: the line-oriented `lpstat -p <printer>`.
//
//     printer Office_Printer is idle.  enabled since Tue 01 Jan 2026 10:00:00 AM
//     printer Office_Printer now printing Office_Printer-12.  enabled since ...
//     printer Office_Printer disabled since Tue 01 Jan 2026 -
//             Paper out
//
// No supply levels are available this way.

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use printgate_core::process::CommandRunner;
use printgate_core::types::{PrinterProfile, PrinterState, PrinterStatus, ProbeSource};

use super::{ProbeStrategy, ProbeUnavailable};

pub struct LpstatStrategy {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl LpstatStrategy {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }
}

/// Interpret `lpstat -p` output for one printer.
pub fn parse_lpstat(printer: &str, stdout: &str) -> Result<PrinterStatus, ProbeUnavailable> {
    let mut lines = stdout.lines().filter(|l| !l.trim().is_empty());
    let first = lines
        .next()
        .ok_or_else(|| ProbeUnavailable::Unparseable("lpstat printed nothing".into()))?;
    let head = first.trim();

    if head.contains("scheduler is not running") {
        let mut status = PrinterStatus::new(
            Some(printer.to_string()),
            PrinterState::Unreachable,
            ProbeSource::Lpstat,
        );
        status.message = Some(head.to_string());
        return Ok(status);
    }

    let rest = head
        .strip_prefix("printer ")
        .ok_or_else(|| ProbeUnavailable::Unparseable(format!("unexpected lpstat line '{head}'")))?;
    let state = if rest.contains(" is idle") {
        PrinterState::Idle
    } else if rest.contains(" now printing") {
        PrinterState::Processing
    } else if rest.contains(" disabled") {
        PrinterState::Stopped
    } else {
        return Err(ProbeUnavailable::Unparseable(format!(
            "unrecognised lpstat state in '{head}'"
        )));
    };

    let mut status = PrinterStatus::new(Some(printer.to_string()), state, ProbeSource::Lpstat);
    for line in lines {
        if !line.starts_with(char::is_whitespace) {
            break;
        }
        let reason = line.trim();
        if !reason.is_empty() && !status.reasons.iter().any(|r| r == reason) {
            status.reasons.push(reason.to_string());
        }
    }
    Ok(status)
}

#[async_trait]
impl ProbeStrategy for LpstatStrategy {
    fn source(&self) -> ProbeSource {
        ProbeSource::Lpstat
    }

    async fn probe(&self, printer: &PrinterProfile) -> Result<PrinterStatus, ProbeUnavailable> {
        let args: [OsString; 2] = ["-p".into(), printer.name.clone().into()];
        let output = self.runner.run("lpstat", &args, self.timeout).await?;

        // lpstat reports a dead scheduler on stderr with a non-zero status.
        let combined = format!("{}\n{}", output.stdout, output.stderr);
        if combined.contains("scheduler is not running") {
            return parse_lpstat(&printer.name, &combined);
        }
        if !output.success() {
            let detail = [output.stderr.trim(), output.stdout.trim()]
                .into_iter()
                .find(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("lpstat exited with status {:?}", output.status));
            return Err(ProbeUnavailable::Failed(detail));
        }
        parse_lpstat(&printer.name, &output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use printgate_core::process::{CommandError, CommandOutput};

    use super::*;

    #[test]
    fn idle_printer() {
        let status = parse_lpstat(
            "Office_Printer",
            "printer Office_Printer is idle.  enabled since Tue 01 Jan 2021 10:00:00 AM",
        )
        .unwrap();
        assert_eq!(status.state, PrinterState::Idle);
        assert!(status.reasons.is_empty());
        assert!(status.supplies.is_empty());
        assert_eq!(status.source, ProbeSource::Lpstat);
    }

    #[test]
    fn printing_printer() {
        let status = parse_lpstat(
            "Office_Printer",
            "printer Office_Printer now printing Office_Printer-12.  enabled since Tue",
        )
        .unwrap();
        assert_eq!(status.state, PrinterState::Processing);
    }

    #[test]
    fn disabled_printer_collects_reasons() {
        let out = "printer Office_Printer disabled since Tue 01 Jan 2026 -\n\tPaper out\n\tCover open\n";
        let status = parse_lpstat("Office_Printer", out).unwrap();
        assert_eq!(status.state, PrinterState::Stopped);
        assert_eq!(status.reasons, ["Paper out", "Cover open"]);
    }

    #[test]
    fn dead_scheduler_is_unreachable() {
        let status = parse_lpstat("P", "lpstat: scheduler is not running").unwrap();
        assert_eq!(status.state, PrinterState::Unreachable);
        assert!(status.message.unwrap().contains("scheduler"));
    }

    #[test]
    fn unexpected_output_is_unparseable() {
        assert!(matches!(parse_lpstat("P", ""), Err(ProbeUnavailable::Unparseable(_))));
        assert!(matches!(
            parse_lpstat("P", "printer P is on fire"),
            Err(ProbeUnavailable::Unparseable(_))
        ));
    }

    struct Canned(CommandOutput);

    #[async_trait]
    impl CommandRunner for Canned {
        async fn run(
            &self,
            _program: &str,
            _args: &[OsString],
            _timeout: Duration,
        ) -> Result<CommandOutput, CommandError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn error_output_is_a_failure() {
        let strategy = LpstatStrategy::new(
            Arc::new(Canned(CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: "lpstat: Invalid destination name in list \"Missing\".".into(),
            })),
            Duration::from_secs(1),
        );
        let err = strategy.probe(&PrinterProfile::new("Missing")).await.unwrap_err();
        assert!(matches!(err, ProbeUnavailable::Failed(ref m) if m.starts_with("lpstat: Invalid")));
    }

    #[tokio::test]
    async fn scheduler_down_on_stderr_is_reported_not_failed() {
        let strategy = LpstatStrategy::new(
            Arc::new(Canned(CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: "lpstat: scheduler is not running\n".into(),
            })),
            Duration::from_secs(1),
        );
        let status = strategy.probe(&PrinterProfile::new("Office")).await.unwrap();
        assert_eq!(status.state, PrinterState::Unreachable);
    }
}
