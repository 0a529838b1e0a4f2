//! Staged execution of a synthesis plan.
//!
//! A job moves `Pending -> Oscillators -> Effects -> Mixdown -> Completed`
//! and can drop into `Failed` from any non-terminal state. Every stage runs
//! under its own timeout and is retried with the same inputs before the job
//! gives up.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use crate::config::{PipelineConfig, StageTimeouts};
use crate::descriptor::{RenderDescriptor, RenderStage};
use crate::dsp::renderer::{self, RenderedAudio};
use crate::dsp::{CancellationToken, StereoBuffer};
use crate::error::{RenderError, Result, panic_message};
use crate::events::{EventSink, PipelineEvent, TracingSink};
use crate::plan::SynthesisPlan;

/// Computes the artifact of each stage.
///
/// Implementations must be idempotent: the same inputs always give the same
/// output, and nothing observable survives an attempt whose future was
/// dropped.
#[async_trait]
pub trait StageWorker: Send + Sync {
    async fn oscillators(&self, plan: Arc<SynthesisPlan>) -> Result<Arc<StereoBuffer>>;

    async fn effects(
        &self,
        plan: Arc<SynthesisPlan>,
        dry: Arc<StereoBuffer>,
    ) -> Result<Arc<StereoBuffer>>;

    async fn mixdown(
        &self,
        plan: Arc<SynthesisPlan>,
        wet: Arc<StereoBuffer>,
    ) -> Result<Arc<RenderedAudio>>;
}

/// Runs the DSP kernels on tokio's blocking pool.
///
/// Each call owns a cancellation token that is tripped when the awaiting
/// future is dropped, so a timed-out attempt stops at its next chunk
/// boundary instead of running to completion.
#[derive(Debug, Clone, Copy)]
pub struct DspStageWorker {
    sample_rate: u32,
}

impl DspStageWorker {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

async fn blocking<T, F>(stage: RenderStage, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&CancellationToken) -> Result<T> + Send + 'static,
{
    let token = CancellationToken::new();
    let _guard = token.clone().drop_guard();
    tokio::task::spawn_blocking(move || f(&token))
        .await
        .map_err(|e| RenderError::stage_failed(stage, format!("worker aborted: {e}")))?
}

#[async_trait]
impl StageWorker for DspStageWorker {
    async fn oscillators(&self, plan: Arc<SynthesisPlan>) -> Result<Arc<StereoBuffer>> {
        let sample_rate = self.sample_rate;
        blocking(RenderStage::Oscillators, move |cancel| {
            renderer::render_oscillators(&plan, sample_rate, cancel).map(Arc::new)
        })
        .await
    }

    async fn effects(
        &self,
        plan: Arc<SynthesisPlan>,
        dry: Arc<StereoBuffer>,
    ) -> Result<Arc<StereoBuffer>> {
        blocking(RenderStage::Effects, move |cancel| {
            renderer::apply_effects(&plan, &dry, cancel).map(Arc::new)
        })
        .await
    }

    async fn mixdown(
        &self,
        plan: Arc<SynthesisPlan>,
        wet: Arc<StereoBuffer>,
    ) -> Result<Arc<RenderedAudio>> {
        blocking(RenderStage::Mixdown, move |cancel| {
            renderer::mixdown(&plan, &wet, cancel).map(Arc::new)
        })
        .await
    }
}

/// State of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Oscillators,
    Effects,
    Mixdown,
    Completed,
    Failed,
}

impl JobState {
    /// The stage running in this state, if any.
    pub fn stage(self) -> Option<RenderStage> {
        match self {
            Self::Oscillators => Some(RenderStage::Oscillators),
            Self::Effects => Some(RenderStage::Effects),
            Self::Mixdown => Some(RenderStage::Mixdown),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The state reached when the current one succeeds.
    pub fn advance(self) -> Self {
        match self {
            Self::Pending => Self::Oscillators,
            Self::Oscillators => Self::Effects,
            Self::Effects => Self::Mixdown,
            Self::Mixdown => Self::Completed,
            terminal => terminal,
        }
    }

    /// The state reached when the current one fails.
    pub fn fail(self) -> Self {
        if self.is_terminal() { self } else { Self::Failed }
    }
}

/// State machine plus the trace of completed stages.
#[derive(Debug)]
struct Job {
    id: usize,
    state: JobState,
    trace: Vec<RenderStage>,
}

impl Job {
    fn start(id: usize) -> Self {
        Self {
            id,
            state: JobState::Pending.advance(),
            trace: Vec::with_capacity(RenderStage::ALL.len()),
        }
    }

    /// Record `stage` as done and move to the next state.
    fn complete_stage(&mut self, stage: RenderStage) {
        debug_assert_eq!(self.state.stage(), Some(stage));
        self.trace.push(stage);
        self.state = self.state.advance();
    }

    fn fail(&mut self) {
        self.state = self.state.fail();
    }
}

/// Drives a plan through the render stages.
pub struct SynthesisScheduler {
    worker: Arc<dyn StageWorker>,
    timeouts: StageTimeouts,
    attempts: u32,
    events: Arc<dyn EventSink>,
}

impl SynthesisScheduler {
    pub fn new(
        worker: Arc<dyn StageWorker>,
        config: &PipelineConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            worker,
            timeouts: config.stage_timeouts,
            attempts: config.stage_attempts(),
            events,
        }
    }

    /// A scheduler backed by the DSP kernels, logging through `tracing`.
    pub fn with_dsp(config: &PipelineConfig) -> Self {
        Self::new(
            Arc::new(DspStageWorker::new(config.render_sample_rate)),
            config,
            Arc::new(TracingSink),
        )
    }

    /// Render `plan` as a standalone job.
    pub async fn render(&self, plan: SynthesisPlan) -> RenderDescriptor {
        self.render_job(0, plan).await
    }

    /// Render `plan` as job `id` of a batch. Never fails: stage errors end
    /// up in the descriptor.
    pub async fn render_job(&self, id: usize, plan: SynthesisPlan) -> RenderDescriptor {
        let plan = Arc::new(plan);
        let fingerprint = plan.fingerprint();
        let mut job = Job::start(id);

        let descriptor = match self.run_stages(&mut job, &plan).await {
            Ok(audio) => RenderDescriptor::completed(&plan, fingerprint, audio.digest.clone()),
            Err(err) => {
                job.fail();
                RenderDescriptor::interrupted(&plan, fingerprint, job.trace.clone(), &err)
            }
        };

        self.events.emit(&PipelineEvent::JobFinished {
            job: id,
            status: descriptor.status,
            stages_completed: job.trace.len(),
        });
        descriptor
    }

    async fn run_stages(
        &self,
        job: &mut Job,
        plan: &Arc<SynthesisPlan>,
    ) -> Result<Arc<RenderedAudio>> {
        let worker = &self.worker;

        let dry = self
            .run_stage(job, RenderStage::Oscillators, || {
                worker.oscillators(Arc::clone(plan))
            })
            .await?;
        let wet = self
            .run_stage(job, RenderStage::Effects, || {
                worker.effects(Arc::clone(plan), Arc::clone(&dry))
            })
            .await?;
        self.run_stage(job, RenderStage::Mixdown, || {
            worker.mixdown(Arc::clone(plan), Arc::clone(&wet))
        })
        .await
    }

    /// Run `stage` until it succeeds or attempts run out. A timed-out
    /// attempt is dropped and its result never observed; a panicking one
    /// counts as a stage failure.
    async fn run_stage<T, F, Fut>(
        &self,
        job: &mut Job,
        stage: RenderStage,
        mut attempt_fn: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout_ms = self.timeouts.millis(stage);
        let mut attempt = 1;
        loop {
            self.events.emit(&PipelineEvent::StageStarted {
                job: job.id,
                stage,
                attempt,
            });

            let attempt_fut = AssertUnwindSafe(attempt_fn()).catch_unwind();
            let outcome = tokio::time::timeout(self.timeouts.get(stage), attempt_fut)
                .await
                .map(|caught| {
                    caught.unwrap_or_else(|payload| {
                        Err(RenderError::stage_failed(
                            stage,
                            format!("worker panicked: {}", panic_message(&*payload)),
                        ))
                    })
                });

            let err = match outcome {
                Ok(Ok(artifact)) => {
                    self.events.emit(&PipelineEvent::StageCompleted {
                        job: job.id,
                        stage,
                        attempt,
                    });
                    job.complete_stage(stage);
                    return Ok(artifact);
                }
                Ok(Err(err)) => {
                    self.events.emit(&PipelineEvent::StageErrored {
                        job: job.id,
                        stage,
                        attempt,
                        message: err.to_string(),
                    });
                    err
                }
                Err(_) => {
                    self.events.emit(&PipelineEvent::StageTimedOut {
                        job: job.id,
                        stage,
                        attempt,
                        timeout_ms,
                    });
                    RenderError::StageTimeout { stage, timeout_ms }
                }
            };

            if attempt >= self.attempts || !err.is_retryable() {
                return Err(err);
            }
            attempt += 1;
        }
    }
}
