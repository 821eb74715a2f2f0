// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Startup check for the external tools the server drives.

use printgate_core::AppConfig;
use tracing::{info, warn};

/// Programs the server shells out to.
pub fn required_tools(config: &AppConfig) -> Vec<&str> {
    vec!["lp", "lpstat", "ipptool", config.converter_program.as_str()]
}

/// Required programs that are not on `PATH`.
pub fn missing_tools(config: &AppConfig) -> Vec<String> {
    required_tools(config)
        .into_iter()
        .filter(|tool| which::which(tool).is_err())
        .map(str::to_string)
        .collect()
}

/// Log which tools are missing. The server starts regardless: each missing
/// tool only disables the feature that needs it.
pub fn check_dependencies(config: &AppConfig) -> Vec<String> {
    if config.skip_dependency_install {
        info!("dependency check skipped");
        return Vec::new();
    }

    let missing = missing_tools(config);
    if missing.is_empty() {
        info!("all external tools found");
    } else {
        warn!(
            missing = %missing.join(", "),
            "external tools not found; install the CUPS client utilities and LibreOffice"
        );
    }
    missing
}
