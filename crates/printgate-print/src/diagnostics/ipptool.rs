// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Probe strategy 1: `ipptool` running the stock Get-Printer-Attributes test.
//
// With `-tv` ipptool prints every received attribute as
//
//     printer-state (enum) = idle
//     marker-levels (1setOf integer) = 80,-1
//
// which is parsed into the shared attribute map.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use printgate_core::process::CommandRunner;
use printgate_core::types::{PrinterProfile, PrinterStatus, ProbeSource};
use tracing::debug;

use super::attributes::{AttributeMap, status_from_attributes};
use super::{ProbeStrategy, ProbeUnavailable};

pub const TEST_FILE: &str = "get-printer-attributes.test";

/// Where CUPS installs its ipptool test files.
const TEST_FILE_DIRS: [&str; 3] = [
    "/usr/share/cups/ipptool",
    "/usr/local/share/cups/ipptool",
    "/usr/share/cups/examples",
];

pub struct IpptoolStrategy {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
    test_file: PathBuf,
}

impl IpptoolStrategy {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self {
            runner,
            timeout,
            test_file: locate_test_file(TEST_FILE_DIRS.iter().map(Path::new)),
        }
    }

    fn build_args(&self, printer: &PrinterProfile) -> Vec<OsString> {
        vec![
            "-T".into(),
            self.timeout.as_secs().max(1).to_string().into(),
            "-tv".into(),
            format!("ipp://localhost/printers/{}", printer.name).into(),
            self.test_file.as_os_str().to_owned(),
        ]
    }
}

/// First directory holding the test file, else the bare name for ipptool to
/// resolve itself.
pub fn locate_test_file<'a>(dirs: impl IntoIterator<Item = &'a Path>) -> PathBuf {
    dirs.into_iter()
        .map(|dir| dir.join(TEST_FILE))
        .find(|candidate| candidate.is_file())
        .unwrap_or_else(|| PathBuf::from(TEST_FILE))
}

/// Collect `name (type) = value` lines. Values of `1setOf` attributes are
/// split on the commas ipptool puts between members; single text values are
/// kept whole.
pub fn parse_ipptool_output(stdout: &str) -> AttributeMap {
    let mut attrs = AttributeMap::new();
    for line in stdout.lines() {
        let Some((lhs, value)) = line.trim().split_once(" = ") else {
            continue;
        };
        let Some((name, syntax)) = lhs.split_once(" (") else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || name.contains(' ') {
            continue;
        }
        let values: Vec<String> = if syntax.starts_with("1setOf") {
            split_set(value, syntax)
        } else {
            vec![value.trim().to_string()]
        };
        attrs.insert(name.to_string(), values);
    }
    attrs
}

/// ipptool joins set members with a bare comma. Inside name and text members
/// a comma followed by whitespace is part of the value.
fn split_set(value: &str, syntax: &str) -> Vec<String> {
    let textual = syntax.contains("name") || syntax.contains("text");
    let mut members = Vec::new();
    let mut start = 0;
    for (i, c) in value.char_indices() {
        if c != ',' {
            continue;
        }
        if textual && value[i + 1..].starts_with(char::is_whitespace) {
            continue;
        }
        members.push(value[start..i].trim().to_string());
        start = i + 1;
    }
    members.push(value[start..].trim().to_string());
    members
}

#[async_trait]
impl ProbeStrategy for IpptoolStrategy {
    fn source(&self) -> ProbeSource {
        ProbeSource::Ipptool
    }

    async fn probe(&self, printer: &PrinterProfile) -> Result<PrinterStatus, ProbeUnavailable> {
        let output = self
            .runner
            .run("ipptool", &self.build_args(printer), self.timeout)
            .await?;

        if !output.success() {
            let detail = [output.stderr.trim(), output.stdout.trim()]
                .into_iter()
                .find(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("ipptool exited with status {:?}", output.status));
            return Err(ProbeUnavailable::Failed(detail));
        }

        let attrs = parse_ipptool_output(&output.stdout);
        debug!(count = attrs.len(), "ipptool attributes parsed");
        status_from_attributes(&printer.name, &attrs, ProbeSource::Ipptool)
    }
}

#[cfg(test)]
mod tests {
    use printgate_core::process::{CommandError, CommandOutput};
    use printgate_core::types::PrinterState;

    use super::*;

    const SAMPLE: &str = r#""/usr/share/cups/ipptool/get-printer-attributes.test":
    Get printer attributes using get-printer-attributes                  [PASS]
        RECEIVED: 3104 bytes in response
        status-code = successful-ok (successful-ok)
        attributes-charset (charset) = utf-8
        printer-name (nameWithoutLanguage) = Office_Printer
        printer-state (enum) = stopped
        printer-state-message (textWithoutLanguage) = Load paper, then press OK
        printer-state-reasons (1setOf keyword) = media-empty-error,offline-report
        marker-names (1setOf nameWithoutLanguage) = Black Toner,Cyan Toner
        marker-levels (1setOf integer) = 64,-3
        marker-colors (1setOf nameWithoutLanguage) = #000000,#00FFFF
"#;

    struct Canned(Result<CommandOutput, CommandError>);

    #[async_trait]
    impl CommandRunner for Canned {
        async fn run(
            &self,
            program: &str,
            args: &[OsString],
            _timeout: Duration,
        ) -> Result<CommandOutput, CommandError> {
            assert_eq!(program, "ipptool");
            assert_eq!(args[3], OsString::from("ipp://localhost/printers/Office_Printer"));
            self.0.clone()
        }
    }

    fn ok(stdout: &str) -> Arc<Canned> {
        Arc::new(Canned(Ok(CommandOutput {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        })))
    }

    #[test]
    fn parses_attribute_lines() {
        let attrs = parse_ipptool_output(SAMPLE);
        assert_eq!(attrs["printer-state"], ["stopped"]);
        assert_eq!(attrs["printer-state-message"], ["Load paper, then press OK"]);
        assert_eq!(attrs["marker-levels"], ["64", "-3"]);
        assert!(!attrs.contains_key("status-code"));
    }

    #[test]
    fn marker_names_keep_embedded_commas() {
        let attrs = parse_ipptool_output(
            "marker-names (1setOf nameWithoutLanguage) = Black Toner, High Yield,Drum Unit\n\
             marker-levels (1setOf integer) = 15,90\n\
             printer-state-reasons (1setOf keyword) = toner-low-warning,none\n",
        );
        assert_eq!(attrs["marker-names"], ["Black Toner, High Yield", "Drum Unit"]);
        assert_eq!(attrs["marker-levels"], ["15", "90"]);
        assert_eq!(attrs["printer-state-reasons"], ["toner-low-warning", "none"]);
    }

    #[test]
    fn test_file_falls_back_to_bare_name() {
        let tmp = tempfile::tempdir().expect("tempdir");
        assert_eq!(locate_test_file([tmp.path()]), PathBuf::from(TEST_FILE));
        std::fs::write(tmp.path().join(TEST_FILE), "{}").unwrap();
        assert_eq!(locate_test_file([tmp.path()]), tmp.path().join(TEST_FILE));
    }

    #[tokio::test]
    async fn probe_maps_full_status() {
        let strategy = IpptoolStrategy::new(ok(SAMPLE), Duration::from_secs(2));
        let status = strategy
            .probe(&PrinterProfile::new("Office_Printer"))
            .await
            .unwrap();
        assert_eq!(status.state, PrinterState::Stopped);
        assert_eq!(status.reasons, ["Out of paper", "Printer is offline"]);
        assert_eq!(status.supplies[0].level, Some(64));
        assert_eq!(status.supplies[1].level, None);
        assert_eq!(status.source, ProbeSource::Ipptool);
    }

    #[tokio::test]
    async fn missing_tool_and_failures_fall_through() {
        let missing = IpptoolStrategy::new(
            Arc::new(Canned(Err(CommandError::NotFound { program: "ipptool".into() }))),
            Duration::from_secs(2),
        );
        let err = missing.probe(&PrinterProfile::new("Office_Printer")).await.unwrap_err();
        assert!(matches!(err, ProbeUnavailable::ToolMissing(_)));

        let failing = IpptoolStrategy::new(
            Arc::new(Canned(Ok(CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: "ipptool: Unable to connect to \"localhost\"".into(),
            }))),
            Duration::from_secs(2),
        );
        let err = failing.probe(&PrinterProfile::new("Office_Printer")).await.unwrap_err();
        assert!(matches!(err, ProbeUnavailable::Failed(ref m) if m.contains("Unable to connect")));

        let garbage = IpptoolStrategy::new(ok("nothing useful"), Duration::from_secs(2));
        let err = garbage.probe(&PrinterProfile::new("Office_Printer")).await.unwrap_err();
        assert!(matches!(err, ProbeUnavailable::Unparseable(_)));
    }
}
