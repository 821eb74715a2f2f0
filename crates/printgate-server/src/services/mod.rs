// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: wires the backend crates together for the HTTP handlers.

pub mod app_services;
pub mod data_dir;

pub use app_services::{AppServices, AppServicesBuilder};
