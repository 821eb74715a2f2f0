// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printgate Document: everything that happens to an uploaded file before it
// reaches the printer: format classification, filename sanitization,
// per-session storage, and conversion to PDF.

pub mod classify;
pub mod convert;
pub mod pdf;
pub mod sanitize;
pub mod storage;

pub use classify::{Classification, accept_attribute, classify, describe_supported_extensions};
pub use convert::{Converter, SofficeConverter};
pub use sanitize::sanitize_filename;
pub use storage::{StoredUpload, UploadStore};
