// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatch pipeline.  The poll phase turns new store objects into staged
// jobs, the print phase sends a staged job to a printer and cleans up after
// it.
//
// Per-job state machine:
//
//   Discovered → Staged → Printing → Completed   (key released, record dropped)
//                                  ↘ Failed      (key and file kept for retry)
//
// All mutable state lives in `PipelineState`, which the caller owns and
// passes in.  Nothing here runs two operations at once; the controller
// awaits each one before starting the next.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use dropprint_core::error::{DropprintError, Result};
use dropprint_core::human_errors::{HumanError, humanize_error};
use dropprint_core::types::{JobKey, JobRecord, JobState};
use dropprint_print::{PrinterRegistry, PrinterTransport};

use crate::events::EventSink;
use crate::staging::{StagingArea, hash_bytes};
use crate::store::BlobStore;
use crate::tracker::JobTracker;

/// Status line emitted when a cycle finds nothing to do.
pub const NO_NEW_JOBS: &str = "No new jobs.";

/// Tunables for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Only keys ending with this suffix become jobs (case-insensitive).
    pub job_suffix: String,
    /// Bound on each store call; `None` leaves it to the backend.
    pub store_timeout: Option<Duration>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            job_suffix: ".ps".into(),
            store_timeout: None,
        }
    }
}

impl PipelineSettings {
    fn is_job(&self, key: &str) -> bool {
        key.to_ascii_lowercase()
            .ends_with(&self.job_suffix.to_ascii_lowercase())
    }
}

/// Mutable state shared by the poll and print phases.
#[derive(Debug, Default)]
pub struct PipelineState {
    tracker: JobTracker,
    jobs: HashMap<JobKey, JobRecord>,
    /// Printed keys whose remote delete failed.  Excluded from discovery
    /// and retried at the start of every cycle.
    cleanup_backlog: BTreeSet<JobKey>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn job(&self, key: &JobKey) -> Option<&JobRecord> {
        self.jobs.get(key)
    }

    /// Snapshot of live job records, oldest first.
    pub fn jobs(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<_> = self.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| {
            a.discovered_at
                .cmp(&b.discovered_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        jobs
    }

    pub fn awaiting_cleanup(&self, key: &JobKey) -> bool {
        self.cleanup_backlog.contains(key)
    }

    pub fn cleanup_backlog_len(&self) -> usize {
        self.cleanup_backlog.len()
    }
}

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// New keys found in the listing.
    pub discovered: usize,
    /// Of those, how many were staged.
    pub staged: usize,
    /// Of those, how many failed to download or stage.
    pub failed: usize,
    /// Backlog keys whose remote delete succeeded this cycle.
    pub cleaned_up: usize,
}

/// A request to print a staged document.
#[derive(Debug, Clone)]
pub struct PrintRequest {
    pub local_path: PathBuf,
    pub printer_name: String,
    /// Store key to clean up after printing, if the file came from the store.
    pub job_key: Option<JobKey>,
}

/// How a print request ended.
#[derive(Debug)]
pub enum PrintOutcome {
    /// The printer name did not resolve; nothing was touched.
    UnknownPrinter,
    /// The job is not in a state it can be printed from; nothing was touched.
    NotReady(JobState),
    /// Transmission failed; the staged file and store object are intact.
    Failed(DropprintError),
    /// The printer accepted the document.
    Completed { remote_cleanup_failed: bool },
}

/// The dispatch pipeline and its collaborators.
pub struct Pipeline {
    store: Arc<dyn BlobStore>,
    staging: StagingArea,
    printers: PrinterRegistry,
    transport: Arc<dyn PrinterTransport>,
    events: Arc<dyn EventSink>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn BlobStore>,
        staging: StagingArea,
        printers: PrinterRegistry,
        transport: Arc<dyn PrinterTransport>,
        events: Arc<dyn EventSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            staging,
            printers,
            transport,
            events,
            settings,
        }
    }

    pub fn printers(&self) -> &PrinterRegistry {
        &self.printers
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    // -- Poll phase ----------------------------------------------------------

    /// List the store, stage every new job, and announce it.
    ///
    /// Failures for one key are reported and skipped; the key stays
    /// untracked so the next cycle tries it again.
    #[instrument(skip_all)]
    pub async fn poll_cycle(&self, state: &mut PipelineState) -> PollReport {
        let mut report = PollReport {
            cleaned_up: self.retry_cleanup_backlog(state).await,
            ..Default::default()
        };

        let listing = match self.store_call("list", self.store.list()).await {
            Ok(listing) => listing,
            Err(e) => {
                let human = log_error(&e, "listing the store failed");
                self.events.status(&human.status_line());
                return report;
            }
        };

        // Someone else removed a backlog object; nothing left to clean.
        let listed: HashSet<&str> = listing.iter().map(|o| o.key.as_str()).collect();
        state
            .cleanup_backlog
            .retain(|key| listed.contains(key.as_str()));

        let candidates: Vec<JobKey> = listing
            .iter()
            .filter(|o| self.settings.is_job(&o.key))
            .map(|o| JobKey::new(o.key.clone()))
            .filter(|key| !state.tracker.contains(key) && !state.cleanup_backlog.contains(key))
            .collect();

        if candidates.is_empty() {
            debug!(listed = listing.len(), "no new jobs");
            self.events.status(NO_NEW_JOBS);
            return report;
        }

        for key in candidates {
            report.discovered += 1;
            match self.stage_job(state, &key).await {
                Ok(()) => report.staged += 1,
                Err(e) => {
                    report.failed += 1;
                    let human = log_error(&e, "job not staged, will retry next cycle");
                    self.events.status(&human.status_line());
                }
            }
        }

        info!(
            discovered = report.discovered,
            staged = report.staged,
            failed = report.failed,
            "poll cycle finished"
        );
        report
    }

    async fn stage_job(&self, state: &mut PipelineState, key: &JobKey) -> Result<()> {
        info!(%key, "new job discovered");
        let mut record = JobRecord::discovered(key.clone());
        self.events.new_job(key);

        let bytes = self
            .store_call("get", self.store.get(key.as_str()))
            .await
            .map_err(|e| DropprintError::Fetch {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        let path = self.staging.stage(key, &bytes).await?;

        record.local_path = Some(path.clone());
        record.size = bytes.len() as u64;
        record.digest = Some(hash_bytes(&bytes));
        record.transition(JobState::Staged);

        // Only now: a tracked key always has a staged file behind it.
        state.tracker.mark_staged(key);
        state.jobs.insert(key.clone(), record);

        self.events.job_ready(key, &path);
        Ok(())
    }

    async fn retry_cleanup_backlog(&self, state: &mut PipelineState) -> usize {
        if state.cleanup_backlog.is_empty() {
            return 0;
        }

        let keys: Vec<JobKey> = state.cleanup_backlog.iter().cloned().collect();
        let mut cleaned = 0;
        for key in keys {
            match self.store_call("delete", self.store.delete(key.as_str())).await {
                Ok(()) => {
                    info!(%key, "deferred remote cleanup succeeded");
                    state.cleanup_backlog.remove(&key);
                    cleaned += 1;
                }
                Err(e) => debug!(%key, error = %e, "deferred remote cleanup still failing"),
            }
        }
        cleaned
    }

    // -- Print phase ---------------------------------------------------------

    /// Send a staged document to a printer, then clean up locally and
    /// remotely.  A refresh notification follows every attempt.
    #[instrument(skip(self, state, request), fields(printer = %request.printer_name, key = ?request.job_key))]
    pub async fn print_job(&self, state: &mut PipelineState, request: PrintRequest) -> PrintOutcome {
        let outcome = self.run_print(state, &request).await;
        self.events.refresh();
        outcome
    }

    async fn run_print(&self, state: &mut PipelineState, request: &PrintRequest) -> PrintOutcome {
        let printer = match self.printers.lookup(&request.printer_name) {
            Ok(printer) => printer.clone(),
            Err(e) => {
                let human = log_error(&e, "print request for unknown printer");
                self.events.status(&human.status_line());
                return PrintOutcome::UnknownPrinter;
            }
        };

        let blocked = request
            .job_key
            .as_ref()
            .and_then(|k| state.jobs.get(k))
            .filter(|record| !record.state.is_printable());
        if let Some(record) = blocked {
            let err = DropprintError::JobNotReady {
                key: record.key.to_string(),
                state: record.state,
            };
            let human = log_error(&err, "print request refused");
            self.events.status(&human.status_line());
            return PrintOutcome::NotReady(record.state);
        }

        let name = display_name(request);
        if let Some(record) = request.job_key.as_ref().and_then(|k| state.jobs.get_mut(k)) {
            record.transition(JobState::Printing);
        }
        info!(document = %name, addr = %printer.addr(), "sending to printer");

        if let Err(e) = self
            .transport
            .send(&request.local_path, &printer.host, printer.port)
            .await
        {
            let human = log_error(&e, "print failed");
            let line = format!(
                "Printing {name} on {} failed. {}",
                printer.name,
                human.status_line()
            );
            if let Some(record) = request.job_key.as_ref().and_then(|k| state.jobs.get_mut(k)) {
                record.last_error = Some(e.to_string());
                record.transition(JobState::Failed);
            }
            self.events.status(&line);
            return PrintOutcome::Failed(e);
        }

        self.remove_staged_file(&request.local_path).await;

        let mut remote_cleanup_failed = false;
        if let Some(key) = &request.job_key {
            if let Some(mut record) = state.jobs.remove(key) {
                record.transition(JobState::Completed);
                debug!(%key, digest = ?record.digest, bytes = record.size, "job completed");
            }

            if let Err(e) = self.store_call("delete", self.store.delete(key.as_str())).await {
                let err = DropprintError::RemoteCleanup {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                let human = log_error(&err, "remote cleanup failed, deferring");
                self.events.status(&human.status_line());
                state.cleanup_backlog.insert(key.clone());
                remote_cleanup_failed = true;
            }

            // Released either way: the document is on paper.
            state.tracker.release(key);
        }

        info!(document = %name, printer = %printer.name, "print completed");
        self.events
            .status(&format!("Printed {name} on {}.", printer.name));
        PrintOutcome::Completed {
            remote_cleanup_failed,
        }
    }

    /// Best-effort removal of the staged copy.  Files outside the staging
    /// root are left alone.
    async fn remove_staged_file(&self, path: &Path) {
        if !self.staging.holds(path) {
            debug!(path = %path.display(), "printed file is not staged, keeping it");
            return;
        }
        if let Err(e) = self.staging.remove(path).await {
            warn!(path = %path.display(), error = %e, "could not remove staged file");
        }
    }

    async fn store_call<T>(&self, op: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.settings.store_timeout {
            None => fut.await,
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                DropprintError::Store(format!("{op} timed out after {}ms", limit.as_millis()))
            })?,
        }
    }
}

/// Log `err` at a level matching its severity.
fn log_error(err: &DropprintError, context: &str) -> HumanError {
    let human = humanize_error(err);
    if human.severity.needs_attention() {
        error!(error = %err, retriable = human.retriable, "{context}");
    } else {
        warn!(error = %err, retriable = human.retriable, "{context}");
    }
    human
}

fn display_name(request: &PrintRequest) -> String {
    match &request.job_key {
        Some(key) => key.to_string(),
        None => request
            .local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| request.local_path.display().to_string()),
    }
}
