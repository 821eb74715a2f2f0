// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer diagnostics: an ordered chain of probe strategies, highest
// fidelity first.
//
//   1. ipptool       full IPP attribute set, including supplies
//   2. ipp client    same attributes without the external tool
//   3. lpstat -p     state and reasons only
//
// The first strategy that answers wins. A missing tool, a timeout, a tool
// error or unparseable output all fall through to the next strategy; when
// none answers the caller still gets a status (`Unknown`) explaining why.

pub mod attributes;
pub mod ipp_client;
pub mod ipptool;
pub mod lpstat;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use printgate_core::process::{CommandError, CommandRunner};
use printgate_core::types::{PrinterProfile, PrinterStatus, ProbeSource};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub use ipp_client::IppClientStrategy;
pub use ipptool::IpptoolStrategy;
pub use lpstat::LpstatStrategy;

/// Why one strategy could not produce a status. Never shown to users on its
/// own; it only feeds the fall-through and the final explanation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeUnavailable {
    #[error("{0} is not installed")]
    ToolMissing(String),

    #[error("timed out after {after:?}")]
    TimedOut { after: Duration },

    #[error("{0}")]
    Failed(String),

    #[error("unreadable output: {0}")]
    Unparseable(String),
}

impl From<CommandError> for ProbeUnavailable {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::NotFound { program } => Self::ToolMissing(program),
            CommandError::TimedOut { after, .. } => Self::TimedOut { after },
            CommandError::Spawn { program, reason } => Self::Failed(format!("{program}: {reason}")),
        }
    }
}

/// One way of asking the print system how a printer is doing.
#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    fn source(&self) -> ProbeSource;

    async fn probe(&self, printer: &PrinterProfile) -> Result<PrinterStatus, ProbeUnavailable>;
}

/// Runs strategies in order until one answers.
pub struct Prober {
    strategies: Vec<Arc<dyn ProbeStrategy>>,
    timeout: Duration,
}

impl Prober {
    /// `timeout` bounds each strategy separately.
    pub fn new(strategies: Vec<Arc<dyn ProbeStrategy>>, timeout: Duration) -> Self {
        Self {
            strategies,
            timeout,
        }
    }

    /// ipptool, then the in-process IPP client, then `lpstat`.
    pub fn standard(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self::new(
            vec![
                Arc::new(IpptoolStrategy::new(runner.clone(), timeout)),
                Arc::new(IppClientStrategy::default()),
                Arc::new(LpstatStrategy::new(runner, timeout)),
            ],
            timeout,
        )
    }

    /// Probe `printer`. Always returns a status.
    #[instrument(skip(self), fields(printer = %printer.name))]
    pub async fn probe(&self, printer: &PrinterProfile) -> PrinterStatus {
        let mut failures = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let source = strategy.source();
            let outcome = match tokio::time::timeout(self.timeout, strategy.probe(printer)).await {
                Ok(result) => result,
                Err(_) => Err(ProbeUnavailable::TimedOut {
                    after: self.timeout,
                }),
            };
            match outcome {
                Ok(status) => {
                    info!(%source, state = %status.state, "printer probed");
                    return status;
                }
                Err(reason) => {
                    debug!(%source, %reason, "probe strategy unavailable, falling through");
                    failures.push(format!("{source}: {reason}"));
                }
            }
        }

        warn!(attempts = failures.len(), "no diagnostics probe succeeded");
        let explanation = if failures.is_empty() {
            "No diagnostics probe is configured.".to_string()
        } else {
            format!("No diagnostics probe succeeded ({}).", failures.join("; "))
        };
        PrinterStatus::unknown(Some(printer.name.clone()), explanation)
    }
}

#[cfg(test)]
mod tests {
    use printgate_core::types::PrinterState;

    use super::*;

    #[derive(Clone, Copy, Debug)]
    enum Mode {
        Present,
        Absent,
        Hangs,
    }

    struct Fake {
        source: ProbeSource,
        mode: Mode,
    }

    #[async_trait]
    impl ProbeStrategy for Fake {
        fn source(&self) -> ProbeSource {
            self.source
        }

        async fn probe(&self, printer: &PrinterProfile) -> Result<PrinterStatus, ProbeUnavailable> {
            match self.mode {
                Mode::Present => Ok(PrinterStatus::new(
                    Some(printer.name.clone()),
                    PrinterState::Idle,
                    self.source,
                )),
                Mode::Absent => Err(ProbeUnavailable::ToolMissing(self.source.to_string())),
                Mode::Hangs => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    unreachable!("the prober should time out first")
                }
            }
        }
    }

    const SOURCES: [ProbeSource; 3] = [ProbeSource::Ipptool, ProbeSource::IppClient, ProbeSource::Lpstat];

    fn prober(modes: [Mode; 3]) -> Prober {
        let strategies = SOURCES
            .iter()
            .zip(modes)
            .map(|(source, mode)| {
                Arc::new(Fake {
                    source: *source,
                    mode,
                }) as Arc<dyn ProbeStrategy>
            })
            .collect();
        Prober::new(strategies, Duration::from_millis(20))
    }

    fn office() -> PrinterProfile {
        PrinterProfile::new("Office_Printer")
    }

    #[tokio::test]
    async fn second_strategy_answers_when_first_is_absent() {
        let status = prober([Mode::Absent, Mode::Present, Mode::Present])
            .probe(&office())
            .await;
        assert_eq!(status.source, ProbeSource::IppClient);
        assert_eq!(status.state, PrinterState::Idle);
    }

    #[tokio::test]
    async fn all_absent_yields_unknown_with_explanation() {
        let status = prober([Mode::Absent; 3]).probe(&office()).await;
        assert_eq!(status.state, PrinterState::Unknown);
        assert_eq!(status.source, ProbeSource::None);
        let message = status.message.expect("explanation");
        assert!(message.contains("ipptool"));
        assert!(message.contains("ipp-client"));
        assert!(message.contains("lpstat"));
    }

    #[tokio::test]
    async fn every_present_absent_hang_permutation() {
        let modes = [Mode::Present, Mode::Absent, Mode::Hangs];
        for a in modes {
            for b in modes {
                for c in modes {
                    let combo = [a, b, c];
                    let status = prober(combo).probe(&office()).await;
                    let expected = combo
                        .iter()
                        .position(|m| matches!(m, Mode::Present))
                        .map(|i| SOURCES[i])
                        .unwrap_or(ProbeSource::None);
                    assert_eq!(status.source, expected, "modes {combo:?}");
                    if expected == ProbeSource::None {
                        assert_eq!(status.state, PrinterState::Unknown, "modes {combo:?}");
                        let message = status.message.unwrap_or_default();
                        for (mode, source) in combo.iter().zip(SOURCES) {
                            let expected_reason = match mode {
                                Mode::Hangs => format!("{source}: timed out"),
                                _ => format!("{source}: {source} is not installed"),
                            };
                            assert!(message.contains(&expected_reason), "{message}");
                        }
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn empty_chain_still_reports() {
        let status = Prober::new(Vec::new(), Duration::from_millis(10))
            .probe(&office())
            .await;
        assert_eq!(status.state, PrinterState::Unknown);
        assert!(!status.message.unwrap_or_default().is_empty());
    }

    #[test]
    fn command_errors_map_to_fallthrough_reasons() {
        assert_eq!(
            ProbeUnavailable::from(CommandError::NotFound { program: "ipptool".into() }),
            ProbeUnavailable::ToolMissing("ipptool".into())
        );
        assert_eq!(
            ProbeUnavailable::from(CommandError::TimedOut {
                program: "lpstat".into(),
                after: Duration::from_secs(5),
            }),
            ProbeUnavailable::TimedOut {
                after: Duration::from_secs(5)
            }
        );
    }

    #[test]
    fn sub_second_timeouts_are_reported_precisely() {
        let reason = ProbeUnavailable::TimedOut {
            after: Duration::from_millis(250),
        };
        assert_eq!(reason.to_string(), "timed out after 250ms");
    }
}
