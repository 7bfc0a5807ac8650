// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dropprint Print: raw byte-stream delivery to network printers and the
// name → printer lookup the dispatch pipeline resolves requests against.

pub mod raw_client;
pub mod registry;

pub use raw_client::{PrinterTransport, RawTcpTransport};
pub use registry::PrinterRegistry;
