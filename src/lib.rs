pub mod affect;
pub mod config;
pub mod descriptor;
pub mod directive;
pub mod dsp;
pub mod error;
pub mod events;
pub mod mapper;
pub mod orchestrator;
pub mod plan;
pub mod scheduler;

pub use crate::affect::{AffectSource, AffectVector, LexiconAffectSource};
pub use crate::config::{PipelineConfig, StageTimeouts};
pub use crate::descriptor::{AudioFormat, RenderDescriptor, RenderStage, RenderStatus};
pub use crate::directive::Directive;
pub use crate::error::{ErrorKind, RenderError, Result};
pub use crate::events::{EventSink, MemorySink, PipelineEvent, TracingSink};
pub use crate::mapper::ParameterMapper;
pub use crate::orchestrator::RenderJobOrchestrator;
pub use crate::plan::{AffectRegion, SynthesisPlan};
pub use crate::scheduler::{DspStageWorker, StageWorker, SynthesisScheduler};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Built-in directives of the demo loop.
pub const DEMO_DIRECTIVES: [&str; 2] = [
    "Generate a melancholic track about digital rain",
    "Synthesize an upbeat rhythm for data transmission",
];

/// Default directive length, in seconds.
pub const DEFAULT_DURATION_SEC: u32 = 180;

/// Map a single affect vector and render it, without an affect source.
pub async fn render_affect(
    affect: AffectVector,
    duration_sec: u32,
    config: &PipelineConfig,
) -> Result<RenderDescriptor> {
    config.validate()?;
    let plan = ParameterMapper::new(config.max_duration_sec).map(&affect, duration_sec)?;
    Ok(SynthesisScheduler::with_dsp(config).render(plan).await)
}
