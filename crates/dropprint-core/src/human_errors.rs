// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the status display.
//
// Every error the pipeline catches ends up as one status line.  The line is
// built from a plain-English message plus a suggestion, so whoever watches
// the display knows whether to wait, retry, or fix something.

use std::io::ErrorKind;
use std::time::Duration;

use crate::error::DropprintError;

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The pipeline tries again on its own (next poll cycle).
    Transient,
    /// Someone has to act: check the printer, fix a name, retry the print.
    ActionRequired,
    /// Retrying will not help.
    Permanent,
}

impl Severity {
    /// Whether someone should be alerted rather than just informed.
    pub fn needs_attention(self) -> bool {
        !matches!(self, Self::Transient)
    }
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the operator should try.
    pub suggestion: String,
    /// Whether the pipeline will retry without being asked.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    /// Single line for the status display.
    pub fn status_line(&self) -> String {
        format!("{} {}", self.message, self.suggestion)
    }
}

/// Convert a `DropprintError` into a `HumanError`.
pub fn humanize_error(err: &DropprintError) -> HumanError {
    match err {
        DropprintError::Fetch { key, .. } => HumanError {
            message: format!("Couldn't download {key}."),
            suggestion: "It will be tried again on the next check.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        DropprintError::Stage { key, source } => HumanError {
            message: format!("Couldn't save {key} to the staging folder."),
            suggestion: match source.kind() {
                ErrorKind::PermissionDenied => {
                    "Check the staging folder's permissions; it will be tried again on the next check.".into()
                }
                _ => "Check there is free disk space; it will be tried again on the next check."
                    .into(),
            },
            retriable: true,
            severity: Severity::Transient,
        },

        DropprintError::Store(detail) => HumanError {
            message: "The document store couldn't be read.".into(),
            suggestion: format!("Checking again shortly. ({detail})"),
            retriable: true,
            severity: Severity::Transient,
        },

        DropprintError::UnknownPrinter(name) => HumanError {
            message: format!("There is no printer called \"{name}\"."),
            suggestion: "Pick one of the configured printers and try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        DropprintError::Connect { addr, source } => {
            let message = if source.kind() == ErrorKind::ConnectionRefused {
                format!("The printer at {addr} refused the connection.")
            } else {
                format!("Couldn't reach the printer at {addr}.")
            };
            HumanError {
                message,
                suggestion: "Check the printer is on and connected, then print again.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            }
        }

        DropprintError::Timeout { addr, limit } => HumanError {
            message: format!(
                "The printer at {addr} didn't finish within {}.",
                describe_duration(*limit)
            ),
            suggestion: "The printer might be busy or stuck. The document is kept, print it again when the printer is ready.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        DropprintError::TransportIo { addr, source } => {
            let message = match source.kind() {
                ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
                    format!("The connection to the printer at {addr} was interrupted.")
                }
                _ => format!("Sending to the printer at {addr} failed."),
            };
            HumanError {
                message,
                suggestion: "The document is kept, print it again.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            }
        }

        DropprintError::JobNotReady { key, state } => HumanError {
            message: format!("{key} can't be printed while it is {state:?}."),
            suggestion: "Wait until it shows as staged or failed, then print again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        DropprintError::RemoteCleanup { key, .. } => HumanError {
            message: format!("{key} was printed, but couldn't be removed from the store."),
            suggestion: "Removal will be retried; it won't be printed twice.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        DropprintError::DispatcherStopped => HumanError {
            message: "The dispatcher has stopped.".into(),
            suggestion: "Restart Dropprint to keep printing.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        DropprintError::Config(detail) => HumanError {
            message: "The configuration isn't valid.".into(),
            suggestion: format!("Fix the configuration file and restart. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        DropprintError::Io(io_err) => match io_err.kind() {
            ErrorKind::NotFound => HumanError {
                message: "The file couldn't be found.".into(),
                suggestion: "It may have been printed or removed already.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            ErrorKind::PermissionDenied => HumanError {
                message: "Dropprint doesn't have permission to read that file.".into(),
                suggestion: "Check the file permissions and try again.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            _ => HumanError {
                message: "There was a problem reading or writing a file.".into(),
                suggestion: "Try again. If this keeps happening, the disk may be full.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
        },

        DropprintError::Serialization(_) => HumanError {
            message: "A data file couldn't be read.".into(),
            suggestion: "Check the configuration file is valid JSON.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}

fn describe_duration(d: Duration) -> String {
    if d.subsec_millis() == 0 && d.as_secs() > 0 {
        match d.as_secs() {
            1 => "1 second".into(),
            secs => format!("{secs} seconds"),
        }
    } else {
        format!("{} milliseconds", d.as_millis())
    }
}
