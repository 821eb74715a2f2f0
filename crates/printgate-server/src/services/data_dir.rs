// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory layout.
//
//     <data_dir>/
//         config.json
//         settings.db
//         uploads/<session>/...
//         converted/<job id>/...
//
// Queues live in memory, so anything left under uploads/ or converted/ by a
// previous process belongs to no session and is cleared at startup.

use std::fs;
use std::path::Path;

use printgate_core::AppConfig;
use printgate_core::error::Result;
use tracing::{info, warn};

/// Create the layout and clear leftovers from a previous run.
pub fn prepare(config: &AppConfig) -> Result<()> {
    fs::create_dir_all(&config.data_dir)?;
    for dir in [config.uploads_dir(), config.converted_dir()] {
        fs::create_dir_all(&dir)?;
        let removed = clear_dir(&dir)?;
        if removed > 0 {
            info!(path = %dir.display(), removed, "cleared files left by a previous run");
        }
    }
    Ok(())
}

fn clear_dir(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let outcome = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match outcome {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove stale entry"),
        }
    }
    Ok(removed)
}
