// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printgate Core: types, errors, configuration and the external-process
// seam shared across all crates.

pub mod config;
pub mod error;
pub mod process;
pub mod settings;
pub mod types;

pub use config::AppConfig;
pub use error::{PrintgateError, Result};
pub use process::{CommandError, CommandOutput, CommandRunner, SystemRunner};
pub use settings::{PrinterSettings, SettingsSource};
pub use types::*;
