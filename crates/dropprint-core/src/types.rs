// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Dropprint dispatcher.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default raw printing port (HP JetDirect).
pub const DEFAULT_RAW_PORT: u16 = 9100;

/// Key of a remote object.  Opaque, unique per object and stable until the
/// object is deleted from the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(pub String);

impl JobKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for JobKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Lifecycle states of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Seen in the store listing, not yet downloaded.
    Discovered,
    /// Downloaded and written to the staging directory.
    Staged,
    /// Currently being transmitted to a printer.
    Printing,
    /// Printer accepted the document.
    Completed,
    /// Transmission failed; the staged file is kept for a retry.
    Failed,
}

impl JobState {
    /// Whether a print request may be started from this state.
    pub fn is_printable(&self) -> bool {
        matches!(self, Self::Staged | Self::Failed)
    }
}

/// In-memory record of a job.  Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub key: JobKey,
    /// Where the downloaded bytes live; set once staged.
    pub local_path: Option<PathBuf>,
    pub state: JobState,
    /// Number of bytes staged.
    pub size: u64,
    /// SHA-256 of the staged bytes (hex).
    pub digest: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Message of the last failed print attempt.
    pub last_error: Option<String>,
}

impl JobRecord {
    pub fn discovered(key: JobKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            local_path: None,
            state: JobState::Discovered,
            size: 0,
            digest: None,
            discovered_at: now,
            updated_at: now,
            last_error: None,
        }
    }

    /// Move to `state`, bumping `updated_at`.
    pub fn transition(&mut self, state: JobState) {
        self.state = state;
        self.updated_at = Utc::now();
    }
}

fn default_port() -> u16 {
    DEFAULT_RAW_PORT
}

/// A configured network printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterDescriptor {
    /// Unique, human-chosen name.
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl PrinterDescriptor {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// `host:port` form used for connecting and in messages.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printer_port_defaults_to_raw_port() {
        let p: PrinterDescriptor =
            serde_json::from_str(r#"{"name":"front-desk","host":"10.0.0.5"}"#).expect("parse");
        assert_eq!(p.port, DEFAULT_RAW_PORT);
        assert_eq!(p.addr(), "10.0.0.5:9100");
    }

    #[test]
    fn only_staged_or_failed_jobs_are_printable() {
        assert!(JobState::Staged.is_printable());
        assert!(JobState::Failed.is_printable());
        assert!(!JobState::Discovered.is_printable());
        assert!(!JobState::Printing.is_printable());
        assert!(!JobState::Completed.is_printable());
    }

    #[test]
    fn transition_updates_timestamp() {
        let mut record = JobRecord::discovered(JobKey::from("a.ps"));
        let before = record.updated_at;
        record.transition(JobState::Staged);
        assert_eq!(record.state, JobState::Staged);
        assert!(record.updated_at >= before);
    }
}
