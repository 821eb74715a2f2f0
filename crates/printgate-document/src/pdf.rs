// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF inspection using the `lopdf` crate.
//
// Used to confirm that a converter actually produced a loadable PDF before
// it is handed to `lp`.

use std::path::Path;

use lopdf::Document;
use tracing::{debug, instrument};

/// Summary of a PDF on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfInfo {
    pub page_count: usize,
}

/// Load the PDF at `path` and report its page count.
///
/// A file that fails to parse, or parses with no pages, is rejected with
/// a message suitable for a job's error text.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn inspect_pdf(path: &Path) -> Result<PdfInfo, String> {
    let document = Document::load(path)
        .map_err(|err| format!("converted file {} is not a valid PDF: {err}", path.display()))?;

    let page_count = document.get_pages().len();
    debug!(page_count, "PDF loaded");
    if page_count == 0 {
        return Err(format!("converted file {} has no pages", path.display()));
    }
    Ok(PdfInfo { page_count })
}

/// Write a minimal PDF with `pages` blank A4 pages.
#[cfg(test)]
pub(crate) fn write_blank_pdf(path: &Path, pages: usize) {
    use lopdf::{Object, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..pages)
        .map(|_| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("write test PDF");
}
