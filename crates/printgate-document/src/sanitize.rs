// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filename sanitization for stored uploads.

/// Stem used when nothing printable survives sanitization.
const FALLBACK_STEM: &str = "upload";

/// Reduce a browser-supplied filename to a safe single path component.
///
/// Any directory prefix (either separator) is dropped, the stem keeps
/// ASCII alphanumerics, `_` and `-` with every other run collapsed to one
/// `-`, and the extension is lower-cased.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();

    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    };

    let mut clean = String::with_capacity(stem.len());
    let mut in_run = false;
    for c in stem.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            clean.push(c);
            in_run = false;
        } else if !in_run {
            clean.push('-');
            in_run = true;
        }
    }
    let clean = clean.trim_matches(|c| c == '-' || c == '_');
    let stem = if clean.is_empty() { FALLBACK_STEM } else { clean };

    let ext: String = ext
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();

    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{ext}")
    }
}

/// The `n`th de-duplicated variant of a sanitized name: `name-n.ext`.
pub fn numbered_variant(sanitized: &str, n: u32) -> String {
    match sanitized.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{n}.{ext}"),
        None => format!("{sanitized}-{n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_directories_with_either_separator() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename(r"C:\Users\me\Report.PDF"), "Report.pdf");
    }

    #[test]
    fn collapses_unsafe_runs_and_trims_edges() {
        assert_eq!(sanitize_filename("Quarterly report (final)!!.docx"), "Quarterly-report-final.docx");
        assert_eq!(sanitize_filename("__draft__.txt"), "draft.txt");
        assert_eq!(sanitize_filename("résumé.pdf"), "r-sum.pdf");
    }

    #[test]
    fn empty_stem_falls_back() {
        assert_eq!(sanitize_filename("???.png"), "upload.png");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("dir/"), "upload");
    }

    #[test]
    fn dotfiles_keep_no_extension() {
        assert_eq!(sanitize_filename(".hidden"), "hidden");
    }

    #[test]
    fn numbered_variants() {
        assert_eq!(numbered_variant("report.pdf", 2), "report-2.pdf");
        assert_eq!(numbered_variant("notes", 1), "notes-1");
    }
}
