// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// Resolution order: built-in defaults, then `<data_dir>/config.json`, then
// `PRINTGATE_*` environment variables. The server binary applies CLI flags
// last.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PrintgateError, Result};

/// Name of the JSON config file inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Values that switch a boolean environment flag off.
const DISABLE_VALUES: [&str; 4] = ["0", "false", "no", "off"];

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind: String,
    /// HTTP port.
    pub port: u16,
    /// Root for uploads, conversion output and the settings database.
    pub data_dir: PathBuf,
    /// Largest accepted upload in bytes.
    pub max_upload_bytes: u64,
    /// Most jobs a single session may have queued.
    pub max_jobs_per_session: usize,
    /// Per-strategy timeout for diagnostics probes, in seconds.
    pub probe_timeout_secs: u64,
    /// Timeout for one document conversion, in seconds.
    pub conversion_timeout_secs: u64,
    /// Timeout for one `lp` submission, in seconds.
    pub submission_timeout_secs: u64,
    /// Program used to render office documents to PDF.
    pub converter_program: String,
    /// Create/migrate the settings schema at startup.
    pub auto_apply_migrations: bool,
    /// Skip the startup check for external tools.
    pub skip_dependency_install: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8000,
            data_dir: default_data_dir(),
            max_upload_bytes: 50 * 1024 * 1024,
            max_jobs_per_session: 25,
            probe_timeout_secs: 5,
            conversion_timeout_secs: 120,
            submission_timeout_secs: 30,
            converter_program: "soffice".into(),
            auto_apply_migrations: true,
            skip_dependency_install: false,
        }
    }
}

impl AppConfig {
    /// Load `config.json` from `data_dir` if present, falling back to
    /// defaults. The returned config always points at `data_dir`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<AppConfig>(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                AppConfig::default()
            }
            Err(e) => return Err(PrintgateError::Io(e)),
        };
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    /// Apply `PRINTGATE_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(std::env::vars());
    }

    /// Apply overrides from an arbitrary key/value source.
    pub fn apply_env_from<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                "PRINTGATE_AUTO_APPLY_MIGRATIONS" => {
                    self.auto_apply_migrations = flag_enabled(value);
                }
                "PRINTGATE_SKIP_DEPENDENCY_INSTALL" => {
                    self.skip_dependency_install = flag_enabled(value);
                }
                "PRINTGATE_BIND" => self.bind = value.trim().to_string(),
                "PRINTGATE_PORT" => match value.trim().parse() {
                    Ok(port) => self.port = port,
                    Err(_) => warn!(value, "ignoring invalid PRINTGATE_PORT"),
                },
                "PRINTGATE_DATA_DIR" => self.data_dir = PathBuf::from(value.trim()),
                "PRINTGATE_CONVERTER" => self.converter_program = value.trim().to_string(),
                _ => {}
            }
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn converted_dir(&self) -> PathBuf {
        self.data_dir.join("converted")
    }

    pub fn settings_db_path(&self) -> PathBuf {
        self.data_dir.join("settings.db")
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion_timeout_secs)
    }

    pub fn submission_timeout(&self) -> Duration {
        Duration::from_secs(self.submission_timeout_secs)
    }
}

/// A boolean flag is on unless it is one of `0/false/no/off`.
pub fn flag_enabled(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    !DISABLE_VALUES.contains(&normalized.as_str())
}

/// Platform data directory: `$XDG_DATA_HOME`, then `~/.local/share`, then
/// `/tmp`.
pub fn default_data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".local").join("share")
    } else {
        PathBuf::from("/tmp")
    };
    base.join("printgate")
}
