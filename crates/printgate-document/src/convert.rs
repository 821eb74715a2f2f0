// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document-to-PDF conversion.
//
// Office, word-processing, presentation, spreadsheet and rich-text uploads
// are rendered to PDF by an external converter (LibreOffice in headless
// mode by default). Output always goes to a caller-supplied work directory,
// never next to the original upload.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use printgate_core::error::{PrintgateError, Result};
use printgate_core::process::{CommandError, CommandRunner};
use printgate_core::types::DocumentFormat;
use tracing::{info, instrument, warn};

use crate::pdf::inspect_pdf;

/// Renders a document to PDF.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `source` into a PDF inside `out_dir` and return its path.
    ///
    /// Any failure is reported as [`PrintgateError::ConversionFailed`].
    async fn convert(
        &self,
        source: &Path,
        format: DocumentFormat,
        out_dir: &Path,
    ) -> Result<PathBuf>;
}

/// [`Converter`] that shells out to `soffice --headless --convert-to pdf`.
pub struct SofficeConverter {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
}

impl SofficeConverter {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
        }
    }

    fn build_args(source: &Path, out_dir: &Path) -> Vec<OsString> {
        vec![
            "--headless".into(),
            "--convert-to".into(),
            "pdf".into(),
            "--outdir".into(),
            out_dir.as_os_str().to_owned(),
            source.as_os_str().to_owned(),
        ]
    }
}

#[async_trait]
impl Converter for SofficeConverter {
    #[instrument(skip(self), fields(program = %self.program, source = %source.display()))]
    async fn convert(
        &self,
        source: &Path,
        format: DocumentFormat,
        out_dir: &Path,
    ) -> Result<PathBuf> {
        if !format.requires_conversion() {
            return Err(PrintgateError::ConversionFailed(format!(
                "{} files do not need conversion",
                format.label()
            )));
        }
        if source.parent() == Some(out_dir) {
            return Err(PrintgateError::ConversionFailed(
                "conversion output must not share the upload directory".into(),
            ));
        }

        tokio::fs::create_dir_all(out_dir).await.map_err(|e| {
            PrintgateError::ConversionFailed(format!(
                "cannot create conversion directory {}: {e}",
                out_dir.display()
            ))
        })?;

        let args = Self::build_args(source, out_dir);
        let output = self
            .runner
            .run(&self.program, &args, self.timeout)
            .await
            .map_err(|e| match e {
                CommandError::NotFound { program } => PrintgateError::ConversionFailed(format!(
                    "document converter '{program}' is not installed"
                )),
                other => PrintgateError::ConversionFailed(other.to_string()),
            })?;

        if !output.success() {
            let detail = [output.stderr.trim(), output.stdout.trim()]
                .into_iter()
                .find(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| match output.status {
                    Some(code) => format!("{} exited with status {code}", self.program),
                    None => format!("{} was terminated by a signal", self.program),
                });
            warn!(status = ?output.status, "conversion failed");
            return Err(PrintgateError::ConversionFailed(detail));
        }

        let stem = source
            .file_stem()
            .ok_or_else(|| PrintgateError::ConversionFailed("upload has no file name".into()))?;
        let pdf_path = out_dir.join(stem).with_extension("pdf");
        if !pdf_path.exists() {
            let mut detail = format!("{} did not produce {}", self.program, pdf_path.display());
            if !output.stderr.trim().is_empty() {
                detail.push_str(": ");
                detail.push_str(output.stderr.trim());
            }
            return Err(PrintgateError::ConversionFailed(detail));
        }

        let pdf = pdf_path.clone();
        let info = tokio::task::spawn_blocking(move || inspect_pdf(&pdf))
            .await
            .map_err(|e| PrintgateError::ConversionFailed(format!("PDF check aborted: {e}")))?
            .map_err(PrintgateError::ConversionFailed)?;

        info!(pages = info.page_count, output = %pdf_path.display(), "document converted");
        Ok(pdf_path)
    }
}
