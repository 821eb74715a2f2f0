// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-session job queues and batch printing.
//
// Each session owns an ordered list of jobs behind its own lock; there is no
// lock spanning sessions apart from the brief map lookup that finds (or
// creates) a session's slot. A batch holds the session's async batch lock
// for its whole run, so two batches for one session never interleave while
// other sessions proceed untouched.
//
// File ownership: only this manager deletes uploads. A job's original is
// removed once its submission is confirmed (or the job is cancelled); a
// failed job keeps its original so the user can retry. Conversion output is
// always removed at the end of the pass.
//
// Slot lifetime: uploads hold a slot's gate shared while they write and
// queue a file. Releasing a session, or forgetting an idle one, takes the
// gate exclusively and marks the slot closed before it leaves the map; an
// upload that finds its slot closed starts over with a fresh one.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use printgate_core::error::{PrintgateError, Result};
use printgate_core::settings::SettingsSource;
use printgate_core::types::{
    DocumentFormat, Job, JobId, JobStatus, PrintOptions, PrinterProfile, SessionId,
};
use printgate_document::{Converter, UploadStore, classify, sanitize_filename};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::printers::{PrinterDirectory, resolve_profile};
use crate::submit::Submitter;

/// A file as received from the browser.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    pub filename: &'a str,
    pub content_type: Option<&'a str>,
    pub bytes: &'a [u8],
}

/// What happened to one job during a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Printed { request_id: Option<String> },
    Failed { error: String },
    /// Removed by the user while the batch was working on it.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub filename: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Aggregate of one `print_batch` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub outcomes: Vec<JobOutcome>,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchResult {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn record(&mut self, outcome: JobOutcome) {
        match outcome.outcome {
            Outcome::Printed { .. } => self.succeeded += 1,
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::Cancelled => {}
        }
        self.outcomes.push(outcome);
    }
}

/// Collaborators the manager drives.
pub struct QueueServices {
    pub store: UploadStore,
    pub converter: Arc<dyn Converter>,
    pub submitter: Arc<dyn Submitter>,
    pub printers: Arc<dyn PrinterDirectory>,
    pub settings: Arc<dyn SettingsSource>,
}

struct SessionSlot {
    /// Held for the duration of a batch.
    batch: tokio::sync::Mutex<()>,
    /// `true` once the slot has left the session map.
    closed: tokio::sync::RwLock<bool>,
    /// FIFO; insertion order is print order.
    jobs: Mutex<Vec<Job>>,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            batch: tokio::sync::Mutex::new(()),
            closed: tokio::sync::RwLock::new(false),
            jobs: Mutex::new(Vec::new()),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, Vec<Job>> {
        self.jobs.lock().expect("session queue lock poisoned")
    }

    /// Run `f` on the job if it is still queued.
    fn with_job<R>(&self, id: &JobId, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        self.jobs().iter_mut().find(|job| job.id == *id).map(f)
    }
}

/// What a batch needs to know about a job once it has claimed it.
struct Claim {
    filename: String,
    source: PathBuf,
    format: DocumentFormat,
    options: PrintOptions,
    needs_conversion: bool,
}

/// Owns every session's queue.
pub struct SessionQueueManager {
    sessions: Mutex<HashMap<SessionId, Arc<SessionSlot>>>,
    store: UploadStore,
    converter: Arc<dyn Converter>,
    submitter: Arc<dyn Submitter>,
    printers: Arc<dyn PrinterDirectory>,
    settings: Arc<dyn SettingsSource>,
    max_jobs_per_session: usize,
}

impl SessionQueueManager {
    pub fn new(services: QueueServices, max_jobs_per_session: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            store: services.store,
            converter: services.converter,
            submitter: services.submitter,
            printers: services.printers,
            settings: services.settings,
            max_jobs_per_session,
        }
    }

    pub fn store(&self) -> &UploadStore {
        &self.store
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<SessionSlot>>> {
        self.sessions.lock().expect("session map lock poisoned")
    }

    fn slot(&self, session: &SessionId) -> Arc<SessionSlot> {
        self.sessions()
            .entry(session.clone())
            .or_insert_with(|| Arc::new(SessionSlot::new()))
            .clone()
    }

    fn existing_slot(&self, session: &SessionId) -> Option<Arc<SessionSlot>> {
        self.sessions().get(session).cloned()
    }

    /// Take `slot` out of the map unless a newer slot already replaced it.
    fn unmap(&self, session: &SessionId, slot: &Arc<SessionSlot>) {
        let mut sessions = self.sessions();
        if sessions
            .get(session)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            sessions.remove(session);
        }
    }

    /// Drop the slot if its queue is empty and nothing is using it.
    fn forget_if_idle(&self, session: &SessionId, slot: &Arc<SessionSlot>) {
        let Ok(_batch) = slot.batch.try_lock() else {
            return;
        };
        let Ok(mut closed) = slot.closed.try_write() else {
            return;
        };
        if *closed || !slot.jobs().is_empty() {
            return;
        }
        *closed = true;
        self.unmap(session, slot);
        debug!(session = %session, "idle session slot dropped");
    }

    // -- Queue operations -----------------------------------------------------

    /// Store, classify and queue an upload.
    ///
    /// Unsupported formats are rejected before anything is written. When
    /// `options` is `None` the settings defaults apply.
    #[instrument(skip(self, upload, options), fields(session = %session, file = %upload.filename))]
    pub async fn enqueue(
        &self,
        session: &SessionId,
        upload: Upload<'_>,
        options: Option<PrintOptions>,
    ) -> Result<Job> {
        let classification = classify(&sanitize_filename(upload.filename), upload.content_type)?;

        loop {
            let slot = self.slot(session);
            if let Some(outcome) = self
                .enqueue_into(&slot, session, upload, options.clone(), classification.format)
                .await
            {
                if outcome.is_err() {
                    self.forget_if_idle(session, &slot);
                }
                return outcome;
            }
            debug!("session slot closed before the upload started, retrying");
        }
    }

    /// `None` when the slot was closed before the upload could start.
    async fn enqueue_into(
        &self,
        slot: &SessionSlot,
        session: &SessionId,
        upload: Upload<'_>,
        options: Option<PrintOptions>,
        format: DocumentFormat,
    ) -> Option<Result<Job>> {
        let closed = slot.closed.read().await;
        if *closed {
            return None;
        }
        Some(self.store_and_queue(slot, session, upload, options, format).await)
    }

    async fn store_and_queue(
        &self,
        slot: &SessionSlot,
        session: &SessionId,
        upload: Upload<'_>,
        options: Option<PrintOptions>,
        format: DocumentFormat,
    ) -> Result<Job> {
        if slot.jobs().len() >= self.max_jobs_per_session {
            return Err(PrintgateError::QueueFull {
                limit: self.max_jobs_per_session,
            });
        }

        let stored = self
            .store
            .store(session, upload.filename, upload.bytes)
            .await?;
        let options = options.unwrap_or_else(|| self.settings.current().default_options());
        let job = Job::new(
            session.clone(),
            stored.original_filename,
            stored.sanitized_filename,
            stored.path,
            format,
            options,
            stored.sha256,
            stored.size_bytes,
        );

        // Re-checked under the lock: a concurrent upload may have filled the
        // queue while this one was being written.
        let accepted = {
            let mut jobs = slot.jobs();
            if jobs.len() >= self.max_jobs_per_session {
                false
            } else {
                jobs.push(job.clone());
                true
            }
        };
        if !accepted {
            self.store.remove_file(&job.storage_path).await;
            return Err(PrintgateError::QueueFull {
                limit: self.max_jobs_per_session,
            });
        }

        info!(job_id = %job.id, format = job.source_format.label(), "job queued");
        Ok(job)
    }

    /// Snapshot of the session's queue in print order.
    pub fn list_jobs(&self, session: &SessionId) -> Vec<Job> {
        self.existing_slot(session)
            .map(|slot| slot.jobs().clone())
            .unwrap_or_default()
    }

    pub fn job(&self, session: &SessionId, id: &JobId) -> Result<Job> {
        self.existing_slot(session)
            .and_then(|slot| slot.with_job(id, |job| job.clone()))
            .ok_or_else(|| PrintgateError::JobNotFound(id.to_string()))
    }

    /// Replace a job's print options. Only `Queued` and `Failed` jobs can be
    /// edited.
    #[instrument(skip(self, options), fields(session = %session, job_id = %id))]
    pub fn update_options(
        &self,
        session: &SessionId,
        id: &JobId,
        options: PrintOptions,
    ) -> Result<Job> {
        let slot = self
            .existing_slot(session)
            .ok_or_else(|| PrintgateError::JobNotFound(id.to_string()))?;
        slot.with_job(id, |job| {
            if !job.status.is_actionable() {
                return Err(PrintgateError::InvalidState {
                    job: job.id.to_string(),
                    status: job.status,
                });
            }
            job.options = options;
            job.updated_at = Utc::now();
            debug!("print options updated");
            Ok(job.clone())
        })
        .unwrap_or_else(|| Err(PrintgateError::JobNotFound(id.to_string())))
    }

    /// Drop a job from the queue and delete its files.
    ///
    /// Always allowed. If a batch is working on the job right now, the files
    /// are left for that batch to delete once the external call returns.
    #[instrument(skip(self), fields(session = %session, job_id = %id))]
    pub async fn remove_job(&self, session: &SessionId, id: &JobId) -> Result<()> {
        let slot = self
            .existing_slot(session)
            .ok_or_else(|| PrintgateError::JobNotFound(id.to_string()))?;
        let removed = {
            let mut jobs = slot.jobs();
            jobs.iter()
                .position(|job| job.id == *id)
                .map(|index| jobs.remove(index))
        };
        let job = removed.ok_or_else(|| PrintgateError::JobNotFound(id.to_string()))?;

        if job.status.is_in_flight() {
            info!(status = %job.status, "job removed while in flight");
        } else {
            self.store.remove_file(&job.storage_path).await;
            self.store.remove_conversion_dir(&job.id).await;
            info!("job removed");
        }
        self.forget_if_idle(session, &slot);
        Ok(())
    }

    /// Forget a session: wait for any running batch and any upload still
    /// being written, drop its queue and delete everything it uploaded.
    ///
    /// Uploads that arrive meanwhile wait, then land in a fresh queue.
    #[instrument(skip(self), fields(session = %session))]
    pub async fn release_session(&self, session: &SessionId) -> Result<()> {
        let Some(slot) = self.existing_slot(session) else {
            return self.store.purge_session(session).await;
        };
        let _batch = slot.batch.lock().await;
        let mut closed = slot.closed.write().await;
        *closed = true;

        let ids: Vec<JobId> = slot.jobs().drain(..).map(|job| job.id).collect();
        for id in ids {
            self.store.remove_conversion_dir(&id).await;
        }
        let purged = self.store.purge_session(session).await;
        self.unmap(session, &slot);
        purged
    }

    // -- Batch printing -------------------------------------------------------

    /// Print every actionable job the session has right now, in order.
    ///
    /// Jobs uploaded after the batch starts wait for the next one. A failing
    /// job is recorded and the batch moves on. Failed jobs from earlier
    /// batches are retried.
    #[instrument(skip(self), fields(session = %session))]
    pub async fn print_batch(&self, session: &SessionId) -> BatchResult {
        let Some(slot) = self.existing_slot(session) else {
            return BatchResult::default();
        };
        let result = self.run_batch(&slot).await;
        self.forget_if_idle(session, &slot);
        result
    }

    async fn run_batch(&self, slot: &SessionSlot) -> BatchResult {
        let _batch = slot.batch.lock().await;

        let snapshot: Vec<JobId> = slot
            .jobs()
            .iter()
            .filter(|job| job.status.is_actionable())
            .map(|job| job.id)
            .collect();
        if snapshot.is_empty() {
            debug!("nothing to print");
            return BatchResult::default();
        }

        let settings = self.settings.current();
        let printer = resolve_profile(&settings, self.printers.as_ref()).await;

        let mut result = BatchResult::default();
        for id in snapshot {
            if let Some(outcome) = self.run_job(slot, id, printer.as_ref()).await {
                result.record(outcome);
            }
        }

        info!(
            succeeded = result.succeeded,
            failed = result.failed,
            "batch finished"
        );
        result
    }

    /// Take one job through conversion and submission. `None` when the job
    /// was removed before its turn came.
    async fn run_job(
        &self,
        slot: &SessionSlot,
        id: JobId,
        printer: Option<&PrinterProfile>,
    ) -> Option<JobOutcome> {
        let claim = match slot.with_job(&id, claim_job)? {
            Ok(claim) => claim,
            Err(e) => {
                warn!(job_id = %id, error = %e, "job could not be claimed");
                return None;
            }
        };

        let printable = if claim.needs_conversion {
            let out_dir = self.store.conversion_dir(&id);
            match self.converter.convert(&claim.source, claim.format, &out_dir).await {
                Ok(pdf) => match slot.with_job(&id, |job| job.transition(JobStatus::ReadyToPrint)) {
                    Some(Ok(())) => pdf,
                    Some(Err(e)) => return Some(self.fail(slot, id, claim, e.to_string()).await),
                    None => return Some(self.cancelled(id, claim).await),
                },
                Err(e) => return Some(self.fail(slot, id, claim, e.to_string()).await),
            }
        } else {
            claim.source.clone()
        };

        let Some(printer) = printer else {
            let message = PrintgateError::NoPrinterSelected.to_string();
            return Some(self.fail(slot, id, claim, message).await);
        };

        match slot.with_job(&id, |job| job.transition(JobStatus::Printing)) {
            Some(Ok(())) => {}
            Some(Err(e)) => return Some(self.fail(slot, id, claim, e.to_string()).await),
            None => return Some(self.cancelled(id, claim).await),
        }

        match self.submitter.submit(&printable, printer, &claim.options).await {
            Ok(receipt) => {
                {
                    let mut jobs = slot.jobs();
                    if let Some(index) = jobs.iter().position(|job| job.id == id) {
                        if let Err(e) = jobs[index].transition(JobStatus::Succeeded) {
                            warn!(job_id = %id, error = %e, "unexpected state after printing");
                        }
                        jobs.remove(index);
                    }
                }
                self.store.remove_file(&claim.source).await;
                self.store.remove_conversion_dir(&id).await;
                info!(job_id = %id, printer = %printer.name, "job printed");
                Some(JobOutcome {
                    job_id: id,
                    filename: claim.filename,
                    outcome: Outcome::Printed {
                        request_id: receipt.request_id,
                    },
                })
            }
            Err(e) => Some(self.fail(slot, id, claim, e.to_string()).await),
        }
    }

    /// Mark the job failed, keeping its original for a retry.
    async fn fail(&self, slot: &SessionSlot, id: JobId, claim: Claim, message: String) -> JobOutcome {
        self.store.remove_conversion_dir(&id).await;
        match slot.with_job(&id, |job| job.fail(message.clone())) {
            Some(Ok(())) => {
                warn!(job_id = %id, error = %message, "job failed");
                JobOutcome {
                    job_id: id,
                    filename: claim.filename,
                    outcome: Outcome::Failed { error: message },
                }
            }
            Some(Err(e)) => {
                warn!(job_id = %id, error = %e, "could not record job failure");
                JobOutcome {
                    job_id: id,
                    filename: claim.filename,
                    outcome: Outcome::Failed { error: message },
                }
            }
            None => self.cancelled(id, claim).await,
        }
    }

    /// The job was removed mid-flight; its files are ours to delete.
    async fn cancelled(&self, id: JobId, claim: Claim) -> JobOutcome {
        self.store.remove_file(&claim.source).await;
        self.store.remove_conversion_dir(&id).await;
        info!(job_id = %id, "job cancelled during batch");
        JobOutcome {
            job_id: id,
            filename: claim.filename,
            outcome: Outcome::Cancelled,
        }
    }
}

/// Move an actionable job into the pipeline. A failed job is reset to
/// `Queued` first, which clears its previous error.
fn claim_job(job: &mut Job) -> Result<Claim> {
    if job.status == JobStatus::Failed {
        job.transition(JobStatus::Queued)?;
    }
    let needs_conversion = job.requires_conversion();
    job.transition(if needs_conversion {
        JobStatus::Converting
    } else {
        JobStatus::ReadyToPrint
    })?;
    Ok(Claim {
        filename: job.sanitized_filename.clone(),
        source: job.storage_path.clone(),
        format: job.source_format,
        options: job.options.clone(),
        needs_conversion,
    })
}
