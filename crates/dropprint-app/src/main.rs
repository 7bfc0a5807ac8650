// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dropprint: watches a document store and dispatches jobs to raw TCP printers.
//
// Entry point. Initialises logging, loads configuration, wires the dispatch
// pipeline, and runs the operator console until quit or Ctrl-C.

mod console;
mod services;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use dropprint_core::error::Result;
use dropprint_core::human_errors::humanize_error;
use dropprint_dispatch::{
    ChannelSink, Controller, DirectoryStore, Pipeline, PipelineSettings, StagingArea,
};
use dropprint_print::{PrinterRegistry, RawTcpTransport};

use services::config_file::{self, CONFIG_FILE};
use services::data_dir;

/// How long blocked stdin reads may hold up process exit.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Dropprint starting");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "could not start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run());
    // The stdin reader sits on a blocking thread; don't wait for a newline.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Dropprint stopped");
            eprintln!("{}", humanize_error(&e).status_line());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let data = data_dir::data_dir();
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| data.join(CONFIG_FILE));

    let config = config_file::load_or_init(&config_path)?;
    config.validate()?;
    info!(
        path = %config_path.display(),
        printers = config.printers.len(),
        "configuration loaded"
    );

    let store = DirectoryStore::open(config_file::store_root(&config, &data))?;
    let staging = StagingArea::new(config_file::staging_dir(&config, &data));
    let printers = PrinterRegistry::new(config.printers.clone())?;
    let transport = RawTcpTransport::with_timeout(config.print_timeout());
    let (sink, events) = ChannelSink::new();

    let pipeline = Pipeline::new(
        Arc::new(store),
        staging,
        printers,
        Arc::new(transport),
        Arc::new(sink),
        PipelineSettings {
            job_suffix: config.job_suffix.clone(),
            store_timeout: config.store_timeout(),
        },
    );

    let (controller, handle) = Controller::new(pipeline, config.poll_interval());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dispatcher = tokio::spawn(controller.run(shutdown_rx));
    let notifier = tokio::spawn(console::show_events(
        events,
        handle.clone(),
        config.default_printer.clone(),
    ));

    let mut commands = std::pin::pin!(console::read_commands(handle));
    let signal = tokio::select! {
        _ = &mut commands => None,
        signal = tokio::signal::ctrl_c() => Some(signal),
    };
    match signal {
        Some(Ok(())) => info!("interrupt received"),
        Some(Err(e)) => {
            warn!("could not listen for Ctrl-C: {e}");
            commands.await;
        }
        None => {}
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = dispatcher.await {
        error!("dispatcher task failed: {e}");
    }
    // The event stream ends once the pipeline (and its sink) is dropped.
    if let Err(e) = notifier.await {
        error!("notification task failed: {e}");
    }

    info!("Dropprint stopped");
    Ok(())
}
