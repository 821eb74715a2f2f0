// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Format classification for uploads.
//
// The extension allow-list decides. Only a file with no extension at all
// falls back to its declared content type; a present but unknown extension
// is rejected outright.

use std::collections::BTreeSet;

use printgate_core::error::{PrintgateError, Result};
use printgate_core::types::{DocumentFormat, FormatKind};
use serde::Serialize;
use tracing::debug;

/// Outcome of classifying one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub format: DocumentFormat,
    pub kind: FormatKind,
}

/// Classify an upload by filename, falling back to `content_type` when the
/// name carries no extension.
pub fn classify(filename: &str, content_type: Option<&str>) -> Result<Classification> {
    let format = match extension_of(filename) {
        Some(ext) => DocumentFormat::from_extension(ext)
            .ok_or_else(|| PrintgateError::UnsupportedFormat(format!(".{}", ext.to_lowercase())))?,
        None => content_type
            .and_then(DocumentFormat::from_mime)
            .ok_or_else(|| {
                PrintgateError::UnsupportedFormat(
                    content_type.unwrap_or("file without extension").to_string(),
                )
            })?,
    };

    debug!(filename, format = format.label(), "classified upload");
    Ok(Classification {
        format,
        kind: format.kind(),
    })
}

/// Comma-separated list of accepted extensions, native formats first.
pub fn describe_supported_extensions() -> String {
    DocumentFormat::ALL
        .iter()
        .flat_map(|format| format.extensions().iter().copied())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Value for the upload form's `accept` attribute: sorted, unique MIME types.
pub fn accept_attribute() -> String {
    DocumentFormat::ALL
        .iter()
        .map(|format| format.mime_type())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(",")
}

fn extension_of(filename: &str) -> Option<&str> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_and_convertible_extensions() {
        let pdf = classify("report.PDF", None).unwrap();
        assert_eq!(pdf.format, DocumentFormat::Pdf);
        assert_eq!(pdf.kind, FormatKind::NativePrintable);

        let docx = classify("minutes.docx", Some("application/octet-stream")).unwrap();
        assert_eq!(docx.kind, FormatKind::ConvertibleDocument);
    }

    #[test]
    fn unknown_extension_is_rejected_even_with_known_mime() {
        let err = classify("payload.exe", Some("application/pdf")).unwrap_err();
        assert!(matches!(err, PrintgateError::UnsupportedFormat(ref ext) if ext == ".exe"));
    }

    #[test]
    fn extensionless_upload_uses_content_type() {
        let c = classify("scan", Some("image/png")).unwrap();
        assert_eq!(c.format, DocumentFormat::Png);
        assert!(classify("scan", None).is_err());
        assert!(classify("scan", Some("application/zip")).is_err());
    }

    #[test]
    fn dotfile_has_no_extension() {
        assert!(extension_of(".bashrc").is_none());
        assert_eq!(extension_of("dir.v2/notes.txt"), Some("txt"));
    }

    #[test]
    fn supported_extension_summary_is_in_display_order() {
        let summary = describe_supported_extensions();
        assert!(summary.starts_with("pdf, ps, txt, jpg, jpeg"));
        assert!(summary.ends_with("odt, odp, ods, rtf"));
    }

    #[test]
    fn accept_attribute_is_sorted_and_unique() {
        let accept = accept_attribute();
        let parts: Vec<&str> = accept.split(',').collect();
        let mut sorted = parts.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(parts, sorted);
        assert_eq!(parts.iter().filter(|m| **m == "image/jpeg").count(), 1);
    }
}
