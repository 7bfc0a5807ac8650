// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DropprintError, Result};
use crate::types::PrinterDescriptor;

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory acting as the watched bucket.  `None` means `<data dir>/bucket`.
    pub store_root: Option<PathBuf>,
    /// Where downloaded documents are staged.  `None` means `<data dir>/staging`.
    pub staging_dir: Option<PathBuf>,
    /// Only keys ending with this suffix (case-insensitive) become jobs.
    pub job_suffix: String,
    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,
    /// Upper bound for one printer transmission, connect through peer close.
    pub print_timeout_secs: u64,
    /// Optional bound on each object store call.
    pub store_timeout_secs: Option<u64>,
    /// Printers jobs can be sent to.  Names must be unique.
    pub printers: Vec<PrinterDescriptor>,
    /// Print every ready job on this printer without waiting for a request.
    pub default_printer: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_root: None,
            staging_dir: None,
            job_suffix: ".ps".into(),
            poll_interval_secs: 5,
            print_timeout_secs: 30,
            store_timeout_secs: None,
            printers: Vec::new(),
            default_printer: None,
        }
    }
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn print_timeout(&self) -> Duration {
        Duration::from_secs(self.print_timeout_secs)
    }

    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout_secs.map(Duration::from_secs)
    }

    /// Reject settings the dispatcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(DropprintError::Config(
                "poll_interval_secs must be at least 1".into(),
            ));
        }
        if self.print_timeout_secs == 0 {
            return Err(DropprintError::Config(
                "print_timeout_secs must be at least 1".into(),
            ));
        }
        if self.store_timeout_secs == Some(0) {
            return Err(DropprintError::Config(
                "store_timeout_secs must be at least 1 when set".into(),
            ));
        }

        let mut seen = HashSet::new();
        for printer in &self.printers {
            if printer.name.trim().is_empty() {
                return Err(DropprintError::Config("printer name must not be empty".into()));
            }
            if !seen.insert(printer.name.as_str()) {
                return Err(DropprintError::Config(format!(
                    "duplicate printer name: {}",
                    printer.name
                )));
            }
        }

        if let Some(ref name) = self.default_printer {
            if !seen.contains(name.as_str()) {
                return Err(DropprintError::Config(format!(
                    "default_printer {name} is not among the configured printers"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let config = AppConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.print_timeout(), Duration::from_secs(30));
        assert!(config.store_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"printers":[{"name":"lobby","host":"192.168.1.20"}]}"#,
        )
        .expect("parse");
        assert_eq!(config.job_suffix, ".ps");
        assert_eq!(config.printers[0].port, 9100);
    }

    #[test]
    fn duplicate_printer_names_are_rejected() {
        let config = AppConfig {
            printers: vec![
                PrinterDescriptor::new("lobby", "10.0.0.1", 9100),
                PrinterDescriptor::new("lobby", "10.0.0.2", 9100),
            ],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DropprintError::Config(_))));
    }

    #[test]
    fn default_printer_must_exist() {
        let config = AppConfig {
            printers: vec![PrinterDescriptor::new("lobby", "10.0.0.1", 9100)],
            default_printer: Some("basement".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let config = AppConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
