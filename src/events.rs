//! Pipeline events and the sinks that receive them.
//!
//! The orchestrator and scheduler never log directly; they emit
//! [`PipelineEvent`]s into whatever [`EventSink`] they were built with.

use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::affect::AffectVector;
use crate::descriptor::{RenderStage, RenderStatus};
use crate::error::ErrorKind;
use crate::plan::AffectRegion;

/// One observable step of a render job. `job` is the directive's index in
/// its batch.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    DirectiveReceived {
        job: usize,
        text: String,
        duration_sec: u32,
    },
    DirectiveRejected {
        job: usize,
        kind: ErrorKind,
        /// The caller sent a bad directive, as opposed to a collaborator failing.
        caller_error: bool,
        message: String,
    },
    AffectExtracted {
        job: usize,
        source: String,
        affect: AffectVector,
    },
    PlanMapped {
        job: usize,
        region: AffectRegion,
        fingerprint: String,
    },
    StageStarted {
        job: usize,
        stage: RenderStage,
        attempt: u32,
    },
    StageCompleted {
        job: usize,
        stage: RenderStage,
        attempt: u32,
    },
    StageTimedOut {
        job: usize,
        stage: RenderStage,
        attempt: u32,
        timeout_ms: u64,
    },
    StageErrored {
        job: usize,
        stage: RenderStage,
        attempt: u32,
        message: String,
    },
    JobFinished {
        job: usize,
        status: RenderStatus,
        stages_completed: usize,
    },
}

/// Receiver of pipeline events. Must tolerate concurrent jobs.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

/// Forwards every event to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::DirectiveReceived {
                job,
                text,
                duration_sec,
            } => info!(job, duration_sec, directive = %text, "received directive"),
            PipelineEvent::DirectiveRejected {
                job,
                kind,
                caller_error: true,
                message,
            } => info!(job, kind = ?kind, "directive rejected: {message}"),
            PipelineEvent::DirectiveRejected {
                job, kind, message, ..
            } => warn!(job, kind = ?kind, "directive rejected: {message}"),
            PipelineEvent::AffectExtracted { job, source, affect } => info!(
                job,
                source = %source,
                valence = affect.valence,
                arousal = affect.arousal,
                dominance = affect.dominance,
                "affect extracted"
            ),
            PipelineEvent::PlanMapped {
                job,
                region,
                fingerprint,
            } => info!(
                job,
                region = %region,
                character = region.character(),
                fingerprint = %fingerprint,
                "synthesis plan mapped"
            ),
            PipelineEvent::StageStarted {
                job,
                stage,
                attempt,
            } => debug!(job, stage = %stage, attempt, "stage started"),
            PipelineEvent::StageCompleted {
                job,
                stage,
                attempt,
            } => debug!(job, stage = %stage, attempt, "stage completed"),
            PipelineEvent::StageTimedOut {
                job,
                stage,
                attempt,
                timeout_ms,
            } => warn!(job, stage = %stage, attempt, timeout_ms, "stage timed out"),
            PipelineEvent::StageErrored {
                job,
                stage,
                attempt,
                message,
            } => warn!(job, stage = %stage, attempt, "stage failed: {message}"),
            PipelineEvent::JobFinished {
                job,
                status,
                stages_completed,
            } => info!(job, status = ?status, stages_completed, "job finished"),
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events belonging to one job.
    pub fn for_job(&self, job: usize) -> Vec<PipelineEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.job() == job)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

impl PipelineEvent {
    pub fn job(&self) -> usize {
        match *self {
            Self::DirectiveReceived { job, .. }
            | Self::DirectiveRejected { job, .. }
            | Self::AffectExtracted { job, .. }
            | Self::PlanMapped { job, .. }
            | Self::StageStarted { job, .. }
            | Self::StageCompleted { job, .. }
            | Self::StageTimedOut { job, .. }
            | Self::StageErrored { job, .. }
            | Self::JobFinished { job, .. } => job,
        }
    }
}
