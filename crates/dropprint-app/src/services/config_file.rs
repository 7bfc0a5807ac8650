// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Loading and persisting `AppConfig` as JSON.

use std::path::{Path, PathBuf};

use dropprint_core::AppConfig;
use dropprint_core::error::Result;
use tracing::info;

pub const CONFIG_FILE: &str = "config.json";

/// Read the configuration at `path`.
///
/// A missing file yields the defaults and writes them out so there is
/// something to edit.  A file that exists but does not parse is an error.
pub fn load_or_init(path: &Path) -> Result<AppConfig> {
    match std::fs::read_to_string(path) {
        Ok(data) => Ok(serde_json::from_str(&data)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let config = AppConfig::default();
            persist(path, &config)?;
            info!(path = %path.display(), "wrote default configuration");
            Ok(config)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn persist(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Directory used as the watched bucket.
pub fn store_root(config: &AppConfig, data_dir: &Path) -> PathBuf {
    config
        .store_root
        .clone()
        .unwrap_or_else(|| data_dir.join("bucket"))
}

/// Directory documents are staged into.
pub fn staging_dir(config: &AppConfig, data_dir: &Path) -> PathBuf {
    config
        .staging_dir
        .clone()
        .unwrap_or_else(|| data_dir.join("staging"))
}
