//! # trace-eval
//!
//! Scores recorded supervisor conversations and inspects supervisor
//! configurations without calling any model.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use supervisor::agent::DEFAULT_SYSTEM_PROMPT;
use supervisor::{AgentCatalog, ConfigResolver, DEFAULT_MODEL_ID};
use trace_eval::dataset::load_recorded_runs;
use trace_eval::{
    score_recordings, BatchSummary, EvalSettings, JsonlSink, MemorySink, ReferenceJudge,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "trace-eval")]
#[command(about = "Score supervisor conversation traces", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score recorded runs against their labels
    Score {
        /// Recorded runs, one JSON object per line; defaults to the
        /// settings' dataset
        input: Option<PathBuf>,

        /// Write outcomes here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Evaluation settings (YAML)
        #[arg(short, long, env = "TRACE_EVAL_SETTINGS")]
        settings: Option<PathBuf>,
    },

    /// Print the built-in agent catalog and supervisor defaults
    Defaults,

    /// Validate a configuration overrides file (YAML or JSON)
    CheckConfig {
        /// Path to the overrides file
        file: PathBuf,
    },
}

#[derive(Serialize)]
struct Defaults<'a> {
    system_prompt: &'a str,
    supervisor_model: &'a str,
    agents: AgentCatalog,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            input,
            output,
            settings,
        } => score(input, output, settings.as_deref()).await?,
        Commands::Defaults => print_defaults()?,
        Commands::CheckConfig { file } => check_config(&file)?,
    }

    Ok(())
}

async fn score(input: Option<PathBuf>, output: Option<PathBuf>, settings: Option<&Path>) -> Result<()> {
    let settings = match settings {
        Some(path) => EvalSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => EvalSettings::default(),
    };

    let Some(input) = input.or_else(|| settings.dataset.clone()) else {
        bail!("No recorded runs given: pass an input file or set `dataset` in the settings");
    };
    let runs = load_recorded_runs(&input)?;
    tracing::info!(runs = runs.len(), input = %input.display(), "Loaded recorded runs");

    let scorer = settings.scorer(Arc::new(ReferenceJudge));

    match output.or_else(|| settings.output.clone()) {
        Some(path) => {
            let sink = JsonlSink::create(&path).await?;
            let summary = score_recordings(&scorer, &runs, &settings.retry, &sink).await?;
            println!("✓ Wrote {} outcomes to {}", summary.total, path.display());
            write_summary(&mut std::io::stdout(), &summary)?;
        }
        None => {
            let sink = MemorySink::new();
            let summary = score_recordings(&scorer, &runs, &settings.retry, &sink).await?;
            let mut stdout = std::io::stdout().lock();
            for outcome in sink.outcomes() {
                writeln!(stdout, "{}", serde_json::to_string(&outcome)?)?;
            }
            write_summary(&mut std::io::stderr(), &summary)?;
        }
    }

    Ok(())
}

fn write_summary(out: &mut dyn Write, summary: &BatchSummary) -> Result<()> {
    writeln!(out, "\nScored {} runs ({} failed)", summary.total, summary.failed)?;
    writeln!(out, "  routing_accuracy:   {:.3}", summary.mean.routing_accuracy)?;
    writeln!(out, "  response_quality:   {:.3}", summary.mean.response_quality)?;
    writeln!(out, "  step_efficiency:    {:.3}", summary.mean.step_efficiency)?;
    writeln!(out, "  source_attribution: {:.3}", summary.mean.source_attribution)?;
    Ok(())
}

fn print_defaults() -> Result<()> {
    let defaults = Defaults {
        system_prompt: DEFAULT_SYSTEM_PROMPT,
        supervisor_model: DEFAULT_MODEL_ID,
        agents: AgentCatalog::default_catalog(),
    };
    print!("{}", serde_yaml::to_string(&defaults)?);
    Ok(())
}

fn check_config(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    // JSON is valid YAML, so one parser covers both
    let params: Value = serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    let params = match params {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        _ => bail!("{} must contain a mapping of configuration fields", file.display()),
    };

    let config = ConfigResolver::for_catalog(&AgentCatalog::default_catalog())
        .resolve_map(&params)
        .with_context(|| format!("Invalid configuration in {}", file.display()))?;

    if config.is_default() {
        println!("✓ Configuration is the default (served from the shared cache)");
    } else {
        println!("✓ Configuration is valid (custom, built per request)");
        print!("{}", serde_yaml::to_string(&config)?);
    }

    Ok(())
}
