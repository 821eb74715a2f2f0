// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: builds every backend component once at startup and
// hands the HTTP handlers cheap clones.
//
// Every external tool sits behind a trait object so tests can swap the real
// `soffice`/`lp`/`lpstat`/`ipptool` invocations for fakes through
// [`AppServicesBuilder`].

use std::sync::Arc;

use printgate_core::AppConfig;
use printgate_core::error::Result;
use printgate_core::process::{CommandRunner, SystemRunner};
use printgate_document::{Converter, SofficeConverter, UploadStore};
use printgate_print::diagnostics::{ProbeStrategy, Prober};
use printgate_print::printers::{LpstatDirectory, PrinterDirectory};
use printgate_print::queue::{QueueServices, SessionQueueManager};
use printgate_print::submit::{LpSubmitter, Submitter};
use tracing::info;

use super::data_dir;
use crate::session::CsrfSecret;
use crate::settings_store::SqliteSettingsStore;

/// Shared application services, one clone per request.
#[derive(Clone)]
pub struct AppServices {
    config: Arc<AppConfig>,
    queue: Arc<SessionQueueManager>,
    prober: Arc<Prober>,
    printers: Arc<dyn PrinterDirectory>,
    settings: Arc<SqliteSettingsStore>,
    csrf: CsrfSecret,
}

impl AppServices {
    /// Build the production services. Call once at startup.
    pub fn init(config: AppConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: AppConfig) -> AppServicesBuilder {
        AppServicesBuilder::new(config)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn queue(&self) -> &SessionQueueManager {
        &self.queue
    }

    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    pub fn printers(&self) -> &dyn PrinterDirectory {
        self.printers.as_ref()
    }

    pub fn settings(&self) -> &Arc<SqliteSettingsStore> {
        &self.settings
    }

    pub fn csrf(&self) -> &CsrfSecret {
        &self.csrf
    }
}

/// Overrides for the components [`AppServices::init`] would otherwise build
/// from the configuration.
pub struct AppServicesBuilder {
    config: AppConfig,
    runner: Arc<dyn CommandRunner>,
    converter: Option<Arc<dyn Converter>>,
    submitter: Option<Arc<dyn Submitter>>,
    printers: Option<Arc<dyn PrinterDirectory>>,
    probe_strategies: Option<Vec<Arc<dyn ProbeStrategy>>>,
    settings: Option<SqliteSettingsStore>,
}

impl AppServicesBuilder {
    fn new(config: AppConfig) -> Self {
        Self {
            config,
            runner: Arc::new(SystemRunner),
            converter: None,
            submitter: None,
            printers: None,
            probe_strategies: None,
            settings: None,
        }
    }

    /// Runner used by every default tool-backed component.
    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn submitter(mut self, submitter: Arc<dyn Submitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    pub fn printers(mut self, printers: Arc<dyn PrinterDirectory>) -> Self {
        self.printers = Some(printers);
        self
    }

    pub fn probe_strategies(mut self, strategies: Vec<Arc<dyn ProbeStrategy>>) -> Self {
        self.probe_strategies = Some(strategies);
        self
    }

    pub fn settings(mut self, settings: SqliteSettingsStore) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn build(self) -> Result<AppServices> {
        let config = self.config;
        info!(path = %config.data_dir.display(), "initialising app services");
        data_dir::prepare(&config)?;

        let settings = match self.settings {
            Some(store) => store,
            None => SqliteSettingsStore::open(
                config.settings_db_path(),
                config.auto_apply_migrations,
            )?,
        };
        let settings = Arc::new(settings);

        let runner = self.runner;
        let converter = self.converter.unwrap_or_else(|| {
            Arc::new(SofficeConverter::new(
                runner.clone(),
                config.converter_program.clone(),
                config.conversion_timeout(),
            )) as Arc<dyn Converter>
        });
        let submitter = self.submitter.unwrap_or_else(|| {
            Arc::new(LpSubmitter::new(runner.clone(), config.submission_timeout())) as Arc<dyn Submitter>
        });
        let printers = self.printers.unwrap_or_else(|| {
            Arc::new(LpstatDirectory::new(runner.clone(), config.probe_timeout()))
                as Arc<dyn PrinterDirectory>
        });
        let prober = match self.probe_strategies {
            Some(strategies) => Prober::new(strategies, config.probe_timeout()),
            None => Prober::standard(runner, config.probe_timeout()),
        };

        let queue = SessionQueueManager::new(
            QueueServices {
                store: UploadStore::new(
                    config.uploads_dir(),
                    config.converted_dir(),
                    config.max_upload_bytes,
                ),
                converter,
                submitter,
                printers: printers.clone(),
                settings: settings.clone(),
            },
            config.max_jobs_per_session,
        );

        info!(
            max_jobs = config.max_jobs_per_session,
            max_upload_bytes = config.max_upload_bytes,
            "app services initialised"
        );
        Ok(AppServices {
            config: Arc::new(config),
            queue: Arc::new(queue),
            prober: Arc::new(prober),
            printers,
            settings,
            csrf: CsrfSecret::generate(),
        })
    }
}
