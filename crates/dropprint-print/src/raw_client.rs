// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP print transport (JetDirect, port 9100).
//
// The simplest possible print protocol: open a TCP socket and dump bytes.
// No framing, no acknowledgement beyond the stream itself.  We close our
// write side once the payload is flushed and treat the printer closing its
// side as acceptance of the job.  One timeout bounds everything from the
// connection attempt to that close.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use dropprint_core::error::{DropprintError, Result};

pub use dropprint_core::types::DEFAULT_RAW_PORT as RAW_PORT;

/// Default bound for one transmission, connect through peer close.
pub const DEFAULT_PRINT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bytes written per `write_all` call.
const CHUNK_SIZE: usize = 8192;

/// Delivers a staged document to a printer endpoint.
#[async_trait]
pub trait PrinterTransport: Send + Sync {
    /// Send the file at `path` to `host:port`.  Returns once the printer has
    /// accepted the whole document.
    async fn send(&self, path: &Path, host: &str, port: u16) -> Result<()>;
}

/// Raw byte-stream transport over TCP.
#[derive(Debug, Clone)]
pub struct RawTcpTransport {
    timeout: Duration,
}

impl Default for RawTcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RawTcpTransport {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_PRINT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl PrinterTransport for RawTcpTransport {
    #[instrument(skip(self, path), fields(path = %path.display()))]
    async fn send(&self, path: &Path, host: &str, port: u16) -> Result<()> {
        // Read everything up front so a bad file never turns into a
        // half-sent job.
        let document = tokio::fs::read(path).await?;
        send_raw(host, port, &document, self.timeout).await
    }
}

/// Send document bytes to `host:port` and wait for the printer to close the
/// connection.
pub async fn send_raw(host: &str, port: u16, document: &[u8], timeout: Duration) -> Result<()> {
    let addr = format!("{host}:{port}");
    info!(addr = %addr, total = document.len(), "connecting via raw TCP");

    match tokio::time::timeout(timeout, transmit(&addr, document)).await {
        Ok(result) => result,
        Err(_) => {
            // The in-flight future (and its socket) was dropped by the
            // timeout, which closes the connection.
            warn!(addr = %addr, limit_ms = timeout.as_millis() as u64, "raw TCP print timed out");
            Err(DropprintError::Timeout {
                addr,
                limit: timeout,
            })
        }
    }
}

async fn transmit(addr: &str, document: &[u8]) -> Result<()> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|source| DropprintError::Connect {
            addr: addr.to_owned(),
            source,
        })?;

    let io_err = |source: std::io::Error| DropprintError::TransportIo {
        addr: addr.to_owned(),
        source,
    };

    let mut sent = 0usize;
    for chunk in document.chunks(CHUNK_SIZE) {
        stream.write_all(chunk).await.map_err(io_err)?;
        sent += chunk.len();
        debug!(sent, total = document.len(), "raw TCP progress");
    }

    stream.flush().await.map_err(io_err)?;
    stream.shutdown().await.map_err(io_err)?;

    // Anything the printer says back (PJL status and the like) is drained
    // and discarded; EOF is the acceptance signal.
    let mut buf = [0u8; 512];
    loop {
        let n = stream.read(&mut buf).await.map_err(io_err)?;
        if n == 0 {
            break;
        }
        debug!(bytes = n, "discarding printer response");
    }

    info!(addr = %addr, total = document.len(), "printer accepted raw TCP job");
    Ok(())
}
