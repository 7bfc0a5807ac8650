// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Line-oriented operator console: notifications out on stdout, commands in
// on stdin.

use std::path::PathBuf;

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use dropprint_core::human_errors::humanize_error;
use dropprint_core::types::{JobKey, JobRecord, PrinterDescriptor};
use dropprint_dispatch::{ControllerHandle, PipelineEvent, PrintRequest};

const USAGE: &str = "commands: print <printer> <path> [key] | jobs | printers | quit";

/// One parsed line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Print {
        printer: String,
        path: PathBuf,
        key: Option<JobKey>,
    },
    Jobs,
    Printers,
    Help,
    Quit,
}

/// Parse a line.  Blank lines yield `Ok(None)`; bad input yields the text to
/// show the operator.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb, args.as_slice()) {
        ("print", [printer, path]) => ConsoleCommand::Print {
            printer: (*printer).to_owned(),
            path: PathBuf::from(path),
            key: None,
        },
        ("print", [printer, path, key]) => ConsoleCommand::Print {
            printer: (*printer).to_owned(),
            path: PathBuf::from(path),
            key: Some(JobKey::from(*key)),
        },
        ("print", _) => return Err("usage: print <printer> <path> [key]".into()),
        ("jobs", []) => ConsoleCommand::Jobs,
        ("printers", []) => ConsoleCommand::Printers,
        ("help" | "?", []) => ConsoleCommand::Help,
        ("quit" | "exit", []) => ConsoleCommand::Quit,
        _ => return Err(format!("unknown command: {}", line.trim())),
    };
    Ok(Some(command))
}

/// Text shown for a notification, if any.
pub fn render_event(event: &PipelineEvent) -> Option<String> {
    match event {
        PipelineEvent::Status { text } => Some(text.clone()),
        PipelineEvent::NewJobDiscovered { key } => Some(format!("New job: {key}")),
        PipelineEvent::JobReadyToPrint { key, local_path } => {
            Some(format!("Ready to print: {key} ({})", local_path.display()))
        }
        PipelineEvent::RefreshDisplay => None,
    }
}

pub fn render_job(job: &JobRecord) -> String {
    let state = format!("{:?}", job.state);
    let mut line = format!(
        "{:<32} {state:<10} {:>8} B  since {}",
        job.key.as_str(),
        job.size,
        job.discovered_at.with_timezone(&Local).format("%H:%M:%S"),
    );
    if let Some(ref err) = job.last_error {
        line.push_str("  last error: ");
        line.push_str(err);
    }
    line
}

pub fn render_printer(printer: &PrinterDescriptor) -> String {
    format!("{:<20} {}", printer.name, printer.addr())
}

/// The print request to issue automatically for `event`, if one applies.
pub fn auto_print_request(event: &PipelineEvent, default_printer: Option<&str>) -> Option<PrintRequest> {
    match (event, default_printer) {
        (PipelineEvent::JobReadyToPrint { key, local_path }, Some(printer)) => Some(PrintRequest {
            local_path: local_path.clone(),
            printer_name: printer.to_owned(),
            job_key: Some(key.clone()),
        }),
        _ => None,
    }
}

/// Print notifications until the dispatcher goes away, auto-printing ready
/// jobs when a default printer is configured.
pub async fn show_events(
    mut events: mpsc::UnboundedReceiver<PipelineEvent>,
    handle: ControllerHandle,
    default_printer: Option<String>,
) {
    while let Some(event) = events.recv().await {
        if let Some(text) = render_event(&event) {
            println!("{text}");
        }
        if let Some(request) = auto_print_request(&event, default_printer.as_deref()) {
            if let Err(e) = handle.print(request).await {
                warn!("auto-print not queued: {e}");
            }
        }
    }
    debug!("notification stream closed");
}

/// Read commands from stdin until `quit` or end of input.
pub async fn read_commands(handle: ControllerHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{USAGE}");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("stdin unreadable: {e}");
                break;
            }
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(text) => {
                println!("{text}");
                continue;
            }
        };

        let result = match command {
            ConsoleCommand::Print { printer, path, key } => {
                handle
                    .print(PrintRequest {
                        local_path: path,
                        printer_name: printer,
                        job_key: key,
                    })
                    .await
            }
            ConsoleCommand::Jobs => handle.jobs().await.map(|jobs| {
                if jobs.is_empty() {
                    println!("No jobs waiting.");
                }
                for job in &jobs {
                    println!("{}", render_job(job));
                }
            }),
            ConsoleCommand::Printers => handle.printers().await.map(|printers| {
                if printers.is_empty() {
                    println!("No printers configured.");
                }
                for printer in &printers {
                    println!("{}", render_printer(printer));
                }
            }),
            ConsoleCommand::Help => {
                println!("{USAGE}");
                Ok(())
            }
            ConsoleCommand::Quit => break,
        };

        if let Err(e) = result {
            println!("{}", humanize_error(&e).status_line());
            break;
        }
    }
}
