// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Printgate.

use thiserror::Error;

use crate::types::JobStatus;

/// Top-level error type for all Printgate operations.
///
/// Every variant is scoped to one upload, one job, or one request; none of
/// them is fatal to the process.
#[derive(Debug, Error)]
pub enum PrintgateError {
    // -- Upload errors --
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    UploadTooLarge { size: u64, limit: u64 },

    #[error("queue is full ({limit} jobs)")]
    QueueFull { limit: usize },

    // -- Job errors --
    #[error("{0}")]
    ConversionFailed(String),

    #[error("{0}")]
    PrintSubmissionFailed(String),

    #[error("job {job} cannot be changed while {status}")]
    InvalidState { job: String, status: JobStatus },

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("invalid print options: {0}")]
    InvalidOptions(String),

    #[error("no printer selected")]
    NoPrinterSelected,

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrintgateError>;
