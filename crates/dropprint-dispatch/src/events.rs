// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Notifications emitted by the pipeline for whatever displays status.

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use dropprint_core::types::JobKey;

/// Discrete notifications, in the order they were emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Human-readable status line.
    Status { text: String },
    NewJobDiscovered { key: JobKey },
    JobReadyToPrint { key: JobKey, local_path: PathBuf },
    /// The display should re-render; sent after every print attempt.
    RefreshDisplay,
}

/// Receives pipeline notifications.  Nothing is acknowledged or awaited.
pub trait EventSink: Send + Sync {
    fn status(&self, text: &str);
    fn new_job(&self, key: &JobKey);
    fn job_ready(&self, key: &JobKey, local_path: &std::path::Path);
    fn refresh(&self);
}

/// Forwards every notification into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: PipelineEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped, notification discarded");
        }
    }
}

impl EventSink for ChannelSink {
    fn status(&self, text: &str) {
        self.send(PipelineEvent::Status {
            text: text.to_owned(),
        });
    }

    fn new_job(&self, key: &JobKey) {
        self.send(PipelineEvent::NewJobDiscovered { key: key.clone() });
    }

    fn job_ready(&self, key: &JobKey, local_path: &std::path::Path) {
        self.send(PipelineEvent::JobReadyToPrint {
            key: key.clone(),
            local_path: local_path.to_path_buf(),
        });
    }

    fn refresh(&self) {
        self.send(PipelineEvent::RefreshDisplay);
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Mutex;

    use super::*;

    /// Sink that keeps every event for later assertions.
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        events: Mutex<Vec<PipelineEvent>>,
    }

    impl RecordingSink {
        pub(crate) fn events(&self) -> Vec<PipelineEvent> {
            self.events.lock().expect("sink lock poisoned").clone()
        }

        pub(crate) fn clear(&self) {
            self.events.lock().expect("sink lock poisoned").clear();
        }

        pub(crate) fn statuses(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    PipelineEvent::Status { text } => Some(text),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn count(&self, pred: impl Fn(&PipelineEvent) -> bool) -> usize {
            self.events().iter().filter(|e| pred(e)).count()
        }

        fn push(&self, event: PipelineEvent) {
            self.events.lock().expect("sink lock poisoned").push(event);
        }
    }

    impl EventSink for RecordingSink {
        fn status(&self, text: &str) {
            self.push(PipelineEvent::Status {
                text: text.to_owned(),
            });
        }

        fn new_job(&self, key: &JobKey) {
            self.push(PipelineEvent::NewJobDiscovered { key: key.clone() });
        }

        fn job_ready(&self, key: &JobKey, local_path: &std::path::Path) {
            self.push(PipelineEvent::JobReadyToPrint {
                key: key.clone(),
                local_path: local_path.to_path_buf(),
            });
        }

        fn refresh(&self) {
            self.push(PipelineEvent::RefreshDisplay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::new();
        let key = JobKey::from("a.ps");
        sink.new_job(&key);
        sink.job_ready(&key, std::path::Path::new("/tmp/a.ps"));
        sink.refresh();

        assert_eq!(rx.try_recv().expect("1"), PipelineEvent::NewJobDiscovered { key: key.clone() });
        assert!(matches!(rx.try_recv().expect("2"), PipelineEvent::JobReadyToPrint { .. }));
        assert_eq!(rx.try_recv().expect("3"), PipelineEvent::RefreshDisplay);
    }

    #[test]
    fn dropped_receiver_is_not_an_error() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.status("nobody is listening");
    }
}
