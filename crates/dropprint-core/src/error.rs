// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Dropprint.

use std::time::Duration;

use thiserror::Error;

use crate::types::JobState;

/// Top-level error type for all Dropprint operations.
#[derive(Debug, Error)]
pub enum DropprintError {
    // -- Polling / staging --
    #[error("could not fetch {key}: {reason}")]
    Fetch { key: String, reason: String },

    #[error("could not stage {key}: {source}")]
    Stage {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("object store error: {0}")]
    Store(String),

    // -- Printing --
    #[error("unknown printer: {0}")]
    UnknownPrinter(String),

    #[error("could not connect to printer at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("printer at {addr} did not finish within {}ms", .limit.as_millis())]
    Timeout { addr: String, limit: Duration },

    #[error("transmission to {addr} failed: {source}")]
    TransportIo {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("job {key} is {state:?}, not ready to print")]
    JobNotReady { key: String, state: JobState },

    #[error("printed, but could not delete {key} from the store: {reason}")]
    RemoteCleanup { key: String, reason: String },

    #[error("dispatcher is not running")]
    DispatcherStopped,

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DropprintError {
    /// Whether this error happened on the network path to a printer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Timeout { .. } | Self::TransportIo { .. }
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DropprintError>;
