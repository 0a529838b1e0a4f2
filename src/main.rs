//! MoltRadio CLI: turn text directives into render descriptors.
//!
//! Descriptors are written to stdout as JSON lines, logs go to stderr.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use moltradio_core::{
    DEFAULT_DURATION_SEC, DEMO_DIRECTIVES, Directive, LexiconAffectSource, PipelineConfig,
    RenderDescriptor, RenderJobOrchestrator, VERSION,
};

/// Where directives come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// The built-in demo directives
    Demo,
    /// Directive texts given as arguments
    Batch,
    /// One directive per line on stdin
    Stdin,
}

/// MoltRadio audio core
#[derive(Parser, Debug)]
#[command(name = "moltradio")]
#[command(version, about = "Render text directives into synthesized audio descriptors")]
struct Cli {
    /// Execution mode
    #[arg(long, value_enum, default_value = "demo")]
    mode: Mode,

    /// Agent identity reported at boot
    #[arg(long, default_value = "Unit-00")]
    agent: String,

    /// Pipeline configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Duration of every directive, in seconds
    #[arg(short, long, default_value_t = DEFAULT_DURATION_SEC)]
    duration: u32,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Directive texts (batch mode)
    texts: Vec<String>,
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn directives(cli: &Cli) -> Result<Vec<Directive>> {
    let texts: Vec<String> = match cli.mode {
        Mode::Demo => DEMO_DIRECTIVES.iter().map(|s| s.to_string()).collect(),
        Mode::Batch => {
            if cli.texts.is_empty() {
                anyhow::bail!("batch mode needs at least one directive text");
            }
            cli.texts.clone()
        }
        Mode::Stdin => io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<Vec<_>>>()
            .context("failed to read directives from stdin")?
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect(),
    };
    Ok(texts
        .into_iter()
        .map(|text| Directive::new(text, cli.duration))
        .collect())
}

fn report(descriptors: &[RenderDescriptor]) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for descriptor in descriptors {
        let line = serde_json::to_string(descriptor).context("failed to encode descriptor")?;
        writeln!(out, "{line}").context("failed to write descriptor")?;
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<bool> {
    info!("MoltRadio audio core v{}", VERSION);
    info!(agent = %cli.agent, "identity verified");

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let mut source = LexiconAffectSource::new();
    match &config.lexicon_path {
        Some(path) => source
            .load_file(path)
            .with_context(|| format!("failed to load lexicon {}", path.display()))?,
        None => source.load(),
    }

    let orchestrator = RenderJobOrchestrator::new(Arc::new(source), config)
        .context("failed to initialize pipeline")?;
    let directives = directives(&cli)?;
    info!(count = directives.len(), "listening for directives");

    let descriptors = orchestrator.process(directives).await;
    report(&descriptors)?;

    let failed = descriptors.iter().filter(|d| !d.is_completed()).count();
    if failed > 0 {
        warn!(failed, total = descriptors.len(), "some directives did not complete");
    }
    Ok(failed == 0)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("critical failure: {err:#}");
            ExitCode::FAILURE
        }
    }
}
