use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use tutor_bench::config::{ResolvedOutputs, SessionConfig};
use tutor_bench::logging::init_logging;
use tutor_bench::session::{PreplanSource, SessionRunner};

/// Simulated teaching sessions driven by a planner and a learner model.
#[derive(Debug, Parser)]
#[command(
    name = "tutor-bench",
    author,
    version,
    about = "Deterministic teaching-session harness"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/session.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the RNG seed for concepts, learners and planners.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Override the number of simulated learners to teach.
    #[arg(long, value_name = "COUNT")]
    trials: Option<usize>,

    /// Override the action budget per trial.
    #[arg(long, value_name = "COUNT")]
    max_actions: Option<usize>,

    /// Exit after validating the configuration (no session is run).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = SessionConfig::from_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(seed) = cli.seed {
        config.session.seed = Some(seed);
    }

    if let Some(trials) = cli.trials {
        config.session.trials = trials;
    }

    if let Some(max_actions) = cli.max_actions {
        config.session.max_actions = max_actions;
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let trials = config.session.trials;

    println!(
        "Loaded configuration '{run_id}': {} planner, {} model, {trials} trial{}",
        config.planner.kind.as_str(),
        config.model.kind,
        if trials == 1 { "" } else { "s" }
    );

    if cli.validate_only {
        println!("Validation-only mode: session execution skipped.");
        return Ok(());
    }

    let logging_guard = init_logging(&config.logging, &outputs, &run_id)?;
    let runner = SessionRunner::new(config, outputs);
    let summary = runner
        .run()
        .with_context(|| format!("running session '{run_id}'"))?;

    println!(
        "Session complete for '{run_id}': {}/{} learners passed in {} actions → {} rows at {}",
        summary.passed,
        summary.trials,
        summary.actions,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    if summary.fallbacks > 0 {
        println!(
            "  {} actions fell back to random after the search budget ran out",
            summary.fallbacks
        );
    }
    match summary.preplan.as_ref() {
        Some(PreplanSource::Loaded(path)) => {
            println!("Preplanned tree loaded from {}", path.display());
        }
        Some(PreplanSource::Computed {
            saved_to: Some(path),
        }) => {
            println!("Preplanned tree saved to {}", path.display());
        }
        Some(PreplanSource::Computed { saved_to: None }) | None => {}
    }
    if let Some(guard) = logging_guard.as_ref() {
        println!("Telemetry log: {}", guard.telemetry_path.display());
    }

    Ok(())
}
