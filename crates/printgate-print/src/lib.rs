// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printgate Print: everything that talks to the local CUPS installation.
// Submission through `lp`, printer lookup through `lpstat`, the layered
// diagnostics prober, and the per-session queues that drive them.

pub mod diagnostics;
pub mod printers;
pub mod queue;
pub mod submit;

pub use diagnostics::{ProbeStrategy, ProbeUnavailable, Prober};
pub use printers::{LpstatDirectory, PrinterDirectory, PrinterLookupError, resolve_profile};
pub use queue::{BatchResult, JobOutcome, Outcome, QueueServices, SessionQueueManager, Upload};
pub use submit::{LpSubmitter, SubmitReceipt, Submitter};
