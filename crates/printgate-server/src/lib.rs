// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printgate Server: the HTTP glue around the job engine. Session cookie and
// CSRF token, routes, the SQLite settings store and startup checks.

pub mod error;
pub mod routes;
pub mod services;
pub mod session;
pub mod settings_store;
pub mod startup;

pub use error::ApiError;
pub use routes::router;
pub use services::{AppServices, AppServicesBuilder};
pub use settings_store::SqliteSettingsStore;
