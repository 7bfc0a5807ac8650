// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dropprint Dispatch: watches the object store for new documents, stages
// them locally, and drives each job through printing and cleanup.

pub mod controller;
pub mod events;
pub mod pipeline;
pub mod staging;
pub mod store;
pub mod tracker;

pub use controller::{Command, Controller, ControllerHandle};
pub use events::{ChannelSink, EventSink, PipelineEvent};
pub use pipeline::{Pipeline, PipelineSettings, PipelineState, PollReport, PrintOutcome, PrintRequest};
pub use staging::StagingArea;
pub use store::{BlobStore, DirectoryStore, MemoryStore, ObjectInfo};
pub use tracker::JobTracker;
