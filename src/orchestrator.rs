//! Batch entry point: directives in, one descriptor per directive out.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::stream::{self, StreamExt};

use crate::affect::AffectSource;
use crate::config::PipelineConfig;
use crate::descriptor::{RenderDescriptor, RenderStatus};
use crate::directive::Directive;
use crate::error::{RenderError, Result, panic_message};
use crate::events::{EventSink, PipelineEvent, TracingSink};
use crate::mapper::ParameterMapper;
use crate::plan::SynthesisPlan;
use crate::scheduler::{DspStageWorker, StageWorker, SynthesisScheduler};

/// Runs directives through affect extraction, mapping and rendering.
///
/// Each directive is isolated: whatever goes wrong with one only shows up in
/// its own descriptor.
pub struct RenderJobOrchestrator {
    source: Arc<dyn AffectSource>,
    mapper: ParameterMapper,
    scheduler: SynthesisScheduler,
    events: Arc<dyn EventSink>,
    config: PipelineConfig,
}

impl RenderJobOrchestrator {
    /// DSP-backed orchestrator logging through `tracing`.
    pub fn new(source: Arc<dyn AffectSource>, config: PipelineConfig) -> Result<Self> {
        let worker = Arc::new(DspStageWorker::new(config.render_sample_rate));
        Self::with_parts(source, worker, Arc::new(TracingSink), config)
    }

    /// Orchestrator with an explicit stage worker and event sink.
    pub fn with_parts(
        source: Arc<dyn AffectSource>,
        worker: Arc<dyn StageWorker>,
        events: Arc<dyn EventSink>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            mapper: ParameterMapper::new(config.max_duration_sec),
            scheduler: SynthesisScheduler::new(worker, &config, Arc::clone(&events)),
            events,
            config,
        })
    }

    /// Process a batch. Results come back in input order, at most
    /// `max_in_flight` directives run at once.
    pub async fn process(&self, directives: Vec<Directive>) -> Vec<RenderDescriptor> {
        stream::iter(directives.into_iter().enumerate())
            .map(|(job, directive)| self.process_one(job, directive))
            .buffered(self.config.max_in_flight)
            .collect()
            .await
    }

    async fn process_one(&self, job: usize, directive: Directive) -> RenderDescriptor {
        self.events.emit(&PipelineEvent::DirectiveReceived {
            job,
            text: directive.text().to_string(),
            duration_sec: directive.duration_sec(),
        });

        match self.plan_for(job, &directive).await {
            Ok(plan) => self.scheduler.render_job(job, plan).await,
            Err(err) => self.reject(job, &err),
        }
    }

    /// Validate, analyze and map. Any error here means no stage runs.
    async fn plan_for(&self, job: usize, directive: &Directive) -> Result<SynthesisPlan> {
        directive.validate(self.config.max_duration_sec)?;

        let source = self.source.name();
        // a panicking source counts as an unavailable model
        let analysis = AssertUnwindSafe(self.source.analyze(directive.text()))
            .catch_unwind()
            .map(|caught| {
                caught.unwrap_or_else(|payload| {
                    Err(RenderError::ModelUnavailable {
                        reason: format!("{source} panicked: {}", panic_message(&*payload)),
                    })
                })
            });
        let affect = tokio::time::timeout(self.config.analysis_timeout(), analysis)
            .await
            .map_err(|_| RenderError::AnalysisTimeout {
                timeout_ms: self.config.analysis_timeout_ms,
            })??;
        self.events.emit(&PipelineEvent::AffectExtracted {
            job,
            source: source.to_string(),
            affect,
        });

        let plan = self.mapper.map(&affect, directive.duration_sec())?;
        self.events.emit(&PipelineEvent::PlanMapped {
            job,
            region: plan.region,
            fingerprint: plan.fingerprint(),
        });
        Ok(plan)
    }

    fn reject(&self, job: usize, err: &RenderError) -> RenderDescriptor {
        self.events.emit(&PipelineEvent::DirectiveRejected {
            job,
            kind: err.kind(),
            caller_error: err.is_input_error(),
            message: err.to_string(),
        });
        self.events.emit(&PipelineEvent::JobFinished {
            job,
            status: RenderStatus::Failed,
            stages_completed: 0,
        });
        RenderDescriptor::rejected(err)
    }
}
