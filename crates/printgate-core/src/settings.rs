// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The singleton printer settings record and the read-only seam the job
// engine consumes it through.

use serde::{Deserialize, Serialize};

use crate::types::{ColorMode, Orientation, PageSelection, PrintOptions, PrinterProfile};

/// Administrator-controlled settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterSettings {
    /// Title shown in the page header.
    pub app_title: String,
    pub default_color: ColorMode,
    pub default_orientation: Orientation,
    /// Selected CUPS destination; `None` until an administrator picks one.
    pub printer_profile: Option<String>,
}

impl Default for PrinterSettings {
    fn default() -> Self {
        Self {
            app_title: "GUI Print Server".into(),
            default_color: ColorMode::Rgb,
            default_orientation: Orientation::Portrait,
            printer_profile: None,
        }
    }
}

impl PrinterSettings {
    /// Options given to a new job when the upload does not specify any.
    pub fn default_options(&self) -> PrintOptions {
        PrintOptions {
            pages: PageSelection::All,
            color: self.default_color,
            orientation: self.default_orientation,
        }
    }

    pub fn configured_profile(&self) -> Option<PrinterProfile> {
        self.printer_profile
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(PrinterProfile::new)
    }
}

/// Read access to the current settings.
///
/// The job engine never writes settings; the administrative surface owns
/// that.
pub trait SettingsSource: Send + Sync {
    fn current(&self) -> PrinterSettings;
}

impl SettingsSource for PrinterSettings {
    fn current(&self) -> PrinterSettings {
        self.clone()
    }
}
