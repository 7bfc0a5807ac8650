// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Long-lived controller that owns the pipeline state.
//
// Two triggers feed it: a fixed-interval timer for poll cycles and a
// channel of commands from outside (print requests, snapshots).  Each
// trigger is handled to completion before the next one is picked up, so
// poll cycles never overlap and only one operation touches the tracker at
// a time.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use dropprint_core::error::{DropprintError, Result};
use dropprint_core::types::{JobRecord, PrinterDescriptor};

use crate::pipeline::{Pipeline, PipelineState, PrintRequest};

/// Queued commands beyond this make `send` wait.
const COMMAND_BUFFER: usize = 64;

/// Requests the controller accepts from outside.
#[derive(Debug)]
pub enum Command {
    /// Print a staged document.  The outcome is reported via notifications.
    Print(PrintRequest),
    /// Run a poll cycle now instead of waiting for the timer.
    PollNow,
    /// Reply with the live job records.
    Snapshot(oneshot::Sender<Vec<JobRecord>>),
    /// Reply with the configured printers, in configuration order.
    Printers(oneshot::Sender<Vec<PrinterDescriptor>>),
}

/// Cloneable sender side used by the app to talk to the controller.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Command>,
}

impl ControllerHandle {
    /// Queue a print request.  Returns before the print happens.
    pub async fn print(&self, request: PrintRequest) -> Result<()> {
        self.send(Command::Print(request)).await
    }

    pub async fn poll_now(&self) -> Result<()> {
        self.send(Command::PollNow).await
    }

    /// Live job records, oldest first.
    pub async fn jobs(&self) -> Result<Vec<JobRecord>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await.map_err(|_| DropprintError::DispatcherStopped)
    }

    pub async fn printers(&self) -> Result<Vec<PrinterDescriptor>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Printers(reply)).await?;
        rx.await.map_err(|_| DropprintError::DispatcherStopped)
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| DropprintError::DispatcherStopped)
    }
}

/// Owns the pipeline and its state and runs the event loop.
pub struct Controller {
    pipeline: Pipeline,
    state: PipelineState,
    poll_interval: Duration,
    rx: mpsc::Receiver<Command>,
}

impl Controller {
    pub fn new(pipeline: Pipeline, poll_interval: Duration) -> (Self, ControllerHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let controller = Self {
            pipeline,
            state: PipelineState::new(),
            poll_interval,
            rx,
        };
        (controller, ControllerHandle { tx })
    }

    /// Run until `shutdown` flips to `true`, its sender is dropped, or every
    /// handle is gone.  The first poll cycle starts immediately.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        // A slow cycle delays the next one instead of bunching them up.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let printers = self.pipeline.printers();
        info!(
            interval_secs = self.poll_interval.as_secs(),
            printers = printers.len(),
            "dispatcher started"
        );
        if printers.is_empty() {
            warn!("no printers configured, print requests will be refused");
        }

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }

                command = self.rx.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => {
                        debug!("all controller handles dropped");
                        break;
                    }
                },

                _ = ticker.tick() => {
                    self.pipeline.poll_cycle(&mut self.state).await;
                }
            }
        }

        info!("dispatcher stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Print(request) => {
                self.pipeline.print_job(&mut self.state, request).await;
            }
            Command::PollNow => {
                self.pipeline.poll_cycle(&mut self.state).await;
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.state.jobs());
            }
            Command::Printers(reply) => {
                let _ = reply.send(self.pipeline.printers().printers().to_vec());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use dropprint_core::types::{JobKey, JobState, PrinterDescriptor};
    use dropprint_print::{PrinterRegistry, PrinterTransport};

    use crate::events::PipelineEvent;
    use crate::events::recording::RecordingSink;
    use crate::pipeline::PipelineSettings;
    use crate::staging::StagingArea;
    use crate::store::MemoryStore;

    struct AcceptingTransport;

    #[async_trait]
    impl PrinterTransport for AcceptingTransport {
        async fn send(&self, path: &Path, _host: &str, _port: u16) -> Result<()> {
            tokio::fs::read(path).await?;
            Ok(())
        }
    }

    struct Running {
        _dir: tempfile::TempDir,
        store: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
        handle: ControllerHandle,
        shutdown: watch::Sender<bool>,
        task: tokio::task::JoinHandle<()>,
        staging: StagingArea,
    }

    fn start(interval: Duration) -> Running {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let staging = StagingArea::new(dir.path().join("staging"));
        let pipeline = Pipeline::new(
            store.clone(),
            staging.clone(),
            PrinterRegistry::new(vec![PrinterDescriptor::new("lobby", "127.0.0.1", 9100)])
                .expect("registry"),
            Arc::new(AcceptingTransport),
            sink.clone(),
            PipelineSettings::default(),
        );
        let (controller, handle) = Controller::new(pipeline, interval);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(controller.run(shutdown_rx));
        Running {
            _dir: dir,
            store,
            sink,
            handle,
            shutdown,
            task,
            staging,
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn ready_count(sink: &RecordingSink) -> usize {
        sink.count(|e| matches!(e, PipelineEvent::JobReadyToPrint { .. }))
    }

    #[tokio::test]
    async fn timer_cycles_stage_each_key_once() {
        let run = start(Duration::from_millis(20));
        run.store.insert("a.ps", b"%!PS".to_vec());

        wait_until(|| ready_count(&run.sink) == 1).await;
        // Let several more cycles run.
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(ready_count(&run.sink), 1);
        assert_eq!(run.store.get_count("a.ps"), 1);

        let jobs = run.handle.jobs().await.expect("snapshot");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].state, JobState::Staged);
    }

    #[tokio::test]
    async fn print_command_completes_job() {
        let run = start(Duration::from_secs(3600));
        run.store.insert("a.ps", b"%!PS".to_vec());

        // The first tick fires immediately.
        wait_until(|| ready_count(&run.sink) == 1).await;

        let key = JobKey::from("a.ps");
        run.handle
            .print(PrintRequest {
                local_path: run.staging.path_for(&key),
                printer_name: "lobby".into(),
                job_key: Some(key.clone()),
            })
            .await
            .expect("queue print");

        // Commands are handled in order, so the snapshot reflects the print.
        let jobs = run.handle.jobs().await.expect("snapshot");
        assert!(jobs.is_empty());
        assert!(!run.store.contains("a.ps"));
        assert!(!run.staging.path_for(&key).exists());
    }

    #[tokio::test]
    async fn poll_now_runs_a_cycle_without_waiting() {
        let run = start(Duration::from_secs(3600));
        wait_until(|| !run.sink.statuses().is_empty()).await;

        run.store.insert("late.ps", b"%!PS".to_vec());
        run.handle.poll_now().await.expect("poll");
        run.handle.jobs().await.expect("sync");

        assert_eq!(ready_count(&run.sink), 1);
    }

    #[tokio::test]
    async fn printers_are_listed_in_configuration_order() {
        let run = start(Duration::from_secs(3600));
        let printers = run.handle.printers().await.expect("printers");
        assert_eq!(printers, vec![PrinterDescriptor::new("lobby", "127.0.0.1", 9100)]);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let run = start(Duration::from_millis(20));
        run.shutdown.send(true).expect("signal");

        tokio::time::timeout(Duration::from_secs(2), run.task)
            .await
            .expect("stopped in time")
            .expect("no panic");

        assert!(matches!(
            run.handle.jobs().await,
            Err(DropprintError::DispatcherStopped)
        ));
    }
}
