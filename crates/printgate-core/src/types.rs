// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Printgate print server.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{PrintgateError, Result};

/// Unique identifier for a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = PrintgateError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| PrintgateError::JobNotFound(s.to_string()))
    }
}

/// Opaque session token owning a queue.
///
/// The token itself comes from the session cookie and is treated as a
/// secret: logs and on-disk names only ever see [`SessionId::short`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Mint a fresh random session token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Stable 16-hex-digit digest of the token, safe for logs and paths.
    pub fn short(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..8])
    }
}

impl std::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionId({})", self.short())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.short())
    }
}

/// Lifecycle states of a queued job.
///
/// ```text
/// Queued ──► Converting ──► ReadyToPrint ──► Printing ──► Succeeded
///   │  ▲          │                             │
///   │  │          ▼                             ▼
///   └──┼──────► Failed ◄────────────────────────┘
///      └──────────┘ (retry)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for the next batch.
    Queued,
    /// Being rendered to PDF by the conversion service.
    Converting,
    /// Printable form available, about to be submitted.
    ReadyToPrint,
    /// Handed to the print-submission command.
    Printing,
    /// Accepted by the printing subsystem. Terminal.
    Succeeded,
    /// Conversion or submission failed; see the error message.
    Failed,
}

impl JobStatus {
    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Converting)
                | (Queued, ReadyToPrint)
                | (Converting, ReadyToPrint)
                | (Converting, Failed)
                | (ReadyToPrint, Printing)
                | (ReadyToPrint, Failed)
                | (Printing, Succeeded)
                | (Printing, Failed)
                | (Failed, Queued)
        )
    }

    /// States in which the owning session may edit options and a batch may
    /// pick the job up.
    pub fn is_actionable(self) -> bool {
        matches!(self, Self::Queued | Self::Failed)
    }

    /// States in which an external tool is working on the job's files.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Converting | Self::ReadyToPrint | Self::Printing)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Queued => "queued",
            Self::Converting => "converting",
            Self::ReadyToPrint => "ready to print",
            Self::Printing => "printing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// How the printing subsystem can consume a format.
///
/// Formats off the allow-list never get this far: classification reports
/// them as [`PrintgateError::UnsupportedFormat`](crate::error::PrintgateError::UnsupportedFormat).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatKind {
    /// Accepted by CUPS directly.
    NativePrintable,
    /// Must be rendered to PDF first.
    ConvertibleDocument,
}

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentFormat {
    Pdf,
    PostScript,
    PlainText,
    Jpeg,
    Png,
    Gif,
    Tiff,
    Doc,
    Docx,
    Ppt,
    Pptx,
    Xls,
    Xlsx,
    Odt,
    Odp,
    Ods,
    Rtf,
}

impl DocumentFormat {
    /// Every supported format in display order: CUPS-native first, then the
    /// formats routed through conversion.
    pub const ALL: [DocumentFormat; 17] = [
        Self::Pdf,
        Self::PostScript,
        Self::PlainText,
        Self::Jpeg,
        Self::Png,
        Self::Gif,
        Self::Tiff,
        Self::Doc,
        Self::Docx,
        Self::Ppt,
        Self::Pptx,
        Self::Xls,
        Self::Xlsx,
        Self::Odt,
        Self::Odp,
        Self::Ods,
        Self::Rtf,
    ];

    /// MIME type used for the upload `accept` attribute and content-type
    /// fallback.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::PostScript => "application/postscript",
            Self::PlainText => "text/plain",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Tiff => "image/tiff",
            Self::Doc => "application/msword",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Ppt => "application/vnd.ms-powerpoint",
            Self::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::Xls => "application/vnd.ms-excel",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Odt => "application/vnd.oasis.opendocument.text",
            Self::Odp => "application/vnd.oasis.opendocument.presentation",
            Self::Ods => "application/vnd.oasis.opendocument.spreadsheet",
            Self::Rtf => "application/rtf",
        }
    }

    /// File extensions (without the dot) that map to this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Pdf => &["pdf"],
            Self::PostScript => &["ps"],
            Self::PlainText => &["txt"],
            Self::Jpeg => &["jpg", "jpeg"],
            Self::Png => &["png"],
            Self::Gif => &["gif"],
            Self::Tiff => &["tif", "tiff"],
            Self::Doc => &["doc"],
            Self::Docx => &["docx"],
            Self::Ppt => &["ppt"],
            Self::Pptx => &["pptx"],
            Self::Xls => &["xls"],
            Self::Xlsx => &["xlsx"],
            Self::Odt => &["odt"],
            Self::Odp => &["odp"],
            Self::Ods => &["ods"],
            Self::Rtf => &["rtf"],
        }
    }

    /// Infer the format from a file extension (with or without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&ext.as_str()))
    }

    /// Infer the format from a declared MIME type. Parameters such as
    /// `; charset=utf-8` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        Self::ALL
            .into_iter()
            .find(|format| format.mime_type().eq_ignore_ascii_case(essence))
    }

    /// Short human label shown in the job list.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::PostScript => "PostScript",
            Self::PlainText => "Plain text",
            Self::Jpeg => "JPEG image",
            Self::Png => "PNG image",
            Self::Gif => "GIF image",
            Self::Tiff => "TIFF image",
            Self::Doc | Self::Docx => "Word document",
            Self::Ppt | Self::Pptx => "PowerPoint presentation",
            Self::Xls | Self::Xlsx => "Excel spreadsheet",
            Self::Odt => "OpenDocument text",
            Self::Odp => "OpenDocument presentation",
            Self::Ods => "OpenDocument spreadsheet",
            Self::Rtf => "Rich text",
        }
    }

    pub fn kind(&self) -> FormatKind {
        match self {
            Self::Pdf
            | Self::PostScript
            | Self::PlainText
            | Self::Jpeg
            | Self::Png
            | Self::Gif
            | Self::Tiff => FormatKind::NativePrintable,
            _ => FormatKind::ConvertibleDocument,
        }
    }

    pub fn requires_conversion(&self) -> bool {
        self.kind() == FormatKind::ConvertibleDocument
    }
}

/// CUPS `ColorModel` choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    #[serde(rename = "Gray")]
    Gray,
    #[serde(rename = "RGB")]
    Rgb,
}

impl ColorMode {
    /// Value passed as `-o ColorModel=<value>`.
    pub fn cups_keyword(&self) -> &'static str {
        match self {
            Self::Gray => "Gray",
            Self::Rgb => "RGB",
        }
    }
}

impl std::str::FromStr for ColorMode {
    type Err = PrintgateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Gray" | "gray" => Ok(Self::Gray),
            "RGB" | "rgb" => Ok(Self::Rgb),
            other => Err(PrintgateError::InvalidOptions(format!(
                "unknown color mode '{other}'"
            ))),
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// IPP `orientation-requested` enum value (RFC 8011 §5.2.10).
    pub fn ipp_enum_value(&self) -> i32 {
        match self {
            Self::Portrait => 3,
            Self::Landscape => 4,
        }
    }
}

impl std::str::FromStr for Orientation {
    type Err = PrintgateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "3" | "portrait" => Ok(Self::Portrait),
            "4" | "landscape" => Ok(Self::Landscape),
            other => Err(PrintgateError::InvalidOptions(format!(
                "unknown orientation '{other}'"
            ))),
        }
    }
}

/// Which pages to print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    All,
    /// CUPS page-list syntax, e.g. `1-3,5`.
    Range(String),
}

impl PageSelection {
    /// Build a selection from the form pair (`page_range`, `pages`):
    /// `"0"` means all pages, `"1"` a custom range (defaulting to `1-1`).
    pub fn from_form(page_range: &str, pages: &str) -> Result<Self> {
        match page_range.trim() {
            "0" => Ok(Self::All),
            "1" => {
                let pages = pages.trim();
                Self::range(if pages.is_empty() { "1-1" } else { pages })
            }
            other => Err(PrintgateError::InvalidOptions(format!(
                "unknown page range mode '{other}'"
            ))),
        }
    }

    /// Validate and wrap a custom page list.
    pub fn range(pages: &str) -> Result<Self> {
        let normalized: String = pages.chars().filter(|c| !c.is_whitespace()).collect();
        if normalized.is_empty() {
            return Err(PrintgateError::InvalidOptions("empty page range".into()));
        }
        for part in normalized.split(',') {
            let (start, end) = match part.split_once('-') {
                Some((a, b)) => (parse_page(a)?, parse_page(b)?),
                None => {
                    let page = parse_page(part)?;
                    (page, page)
                }
            };
            if start > end {
                return Err(PrintgateError::InvalidOptions(format!(
                    "page range '{part}' runs backwards"
                )));
            }
        }
        Ok(Self::Range(normalized))
    }

    /// The `-P` argument for `lp`, if any.
    pub fn as_page_list(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Range(pages) => Some(pages),
        }
    }
}

fn parse_page(raw: &str) -> Result<u32> {
    match raw.parse::<u32>() {
        Ok(page) if page >= 1 => Ok(page),
        _ => Err(PrintgateError::InvalidOptions(format!(
            "'{raw}' is not a valid page number"
        ))),
    }
}

/// Per-job print options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintOptions {
    pub pages: PageSelection,
    pub color: ColorMode,
    pub orientation: Orientation,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            pages: PageSelection::All,
            color: ColorMode::Rgb,
            orientation: Orientation::Portrait,
        }
    }
}

/// One uploaded file awaiting or undergoing printing.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    #[serde(skip)]
    pub session_id: SessionId,
    /// Name as supplied by the browser.
    pub original_filename: String,
    /// Collision-free, traversal-free name on disk.
    pub sanitized_filename: String,
    #[serde(skip)]
    pub storage_path: PathBuf,
    pub source_format: DocumentFormat,
    pub status: JobStatus,
    pub options: PrintOptions,
    pub error_message: Option<String>,
    /// SHA-256 of the uploaded bytes.
    pub document_hash: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: SessionId,
        original_filename: String,
        sanitized_filename: String,
        storage_path: PathBuf,
        source_format: DocumentFormat,
        options: PrintOptions,
        document_hash: String,
        size_bytes: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            session_id,
            original_filename,
            sanitized_filename,
            storage_path,
            source_format,
            status: JobStatus::Queued,
            options,
            error_message: None,
            document_hash,
            size_bytes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    ///
    /// Leaving `Failed` clears the error message; entering `Failed` goes
    /// through [`Job::fail`] instead so the message is always set.
    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if next == JobStatus::Failed || !self.status.can_transition_to(next) {
            return Err(PrintgateError::InvalidState {
                job: self.id.to_string(),
                status: self.status,
            });
        }
        if self.status == JobStatus::Failed {
            self.error_message = None;
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to `Failed` with the captured message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        if !self.status.can_transition_to(JobStatus::Failed) {
            return Err(PrintgateError::InvalidState {
                job: self.id.to_string(),
                status: self.status,
            });
        }
        self.status = JobStatus::Failed;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn requires_conversion(&self) -> bool {
        self.source_format.requires_conversion()
    }
}

/// The CUPS destination jobs are sent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterProfile {
    pub name: String,
}

impl PrinterProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Overall printer state, normalised across diagnostics tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterState {
    Idle,
    Processing,
    Stopped,
    /// The print scheduler itself could not be reached.
    Unreachable,
    /// No probe produced an answer.
    Unknown,
}

impl std::fmt::Display for PrinterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "Idle",
            Self::Processing => "Processing",
            Self::Stopped => "Stopped",
            Self::Unreachable => "Unreachable",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// One consumable reading (toner, ink, drum...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyLevel {
    pub name: String,
    /// Percentage 0–100; `None` when the printer cannot tell.
    pub level: Option<u8>,
    pub color: Option<String>,
}

/// Which probe strategy produced a [`PrinterStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeSource {
    /// `ipptool` Get-Printer-Attributes.
    Ipptool,
    /// In-process IPP client against the local CUPS server.
    IppClient,
    /// `lpstat -p`.
    Lpstat,
    /// Every strategy failed.
    None,
}

impl std::fmt::Display for ProbeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Ipptool => "ipptool",
            Self::IppClient => "ipp-client",
            Self::Lpstat => "lpstat",
            Self::None => "none",
        };
        f.write_str(label)
    }
}

/// Normalised result of a diagnostics probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterStatus {
    pub printer: Option<String>,
    pub state: PrinterState,
    /// Free-form message from the tool (`printer-state-message`) or, for
    /// `Unknown`, the explanation of why nothing answered.
    pub message: Option<String>,
    /// Human-readable reasons derived from the tool's reason vocabulary.
    pub reasons: Vec<String>,
    pub supplies: Vec<SupplyLevel>,
    pub source: ProbeSource,
    pub checked_at: DateTime<Utc>,
}

impl PrinterStatus {
    pub fn new(printer: Option<String>, state: PrinterState, source: ProbeSource) -> Self {
        Self {
            printer,
            state,
            message: None,
            reasons: Vec::new(),
            supplies: Vec::new(),
            source,
            checked_at: Utc::now(),
        }
    }

    /// Terminal status when no strategy could answer.
    pub fn unknown(printer: Option<String>, explanation: impl Into<String>) -> Self {
        let mut status = Self::new(printer, PrinterState::Unknown, ProbeSource::None);
        status.message = Some(explanation.into());
        status
    }
}
