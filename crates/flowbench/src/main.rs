//! flowbench - concurrency sweep benchmark for process engines
//!
//! Runs every workload at every worker pool size in the configured range,
//! once to warm up and once measured, then writes the measured figures to a
//! CSV report.

mod cli;
mod output;

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::Cli;
use libflowbench_core::{
    run_with_warmup, write_report, BenchError, SweepController, SweepPlan, WorkloadRegistry,
};
use libflowbench_engine::EmbeddedEngine;

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so stdout carries only the report or JSON
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(&cli) {
        output::output_error(&cli, &e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: &Cli) -> Result<(), BenchError> {
    let config = cli.load_config()?;

    if cli.print_config {
        let text = toml::to_string_pretty(&config)
            .map_err(|e| BenchError::Config(format!("cannot encode configuration: {}", e)))?;
        print!("{}", text);
        return Ok(());
    }

    config.validate()?;

    let engine = Arc::new(EmbeddedEngine::open(&config.engine_options())?);
    let registry = WorkloadRegistry::builtin(engine.clone());

    if cli.list_workloads {
        let names = registry.names();
        output::output_success(cli, &names, || names.join("\n"));
        return Ok(());
    }

    let plan = SweepPlan::measured(&config, config.resolve_workloads(&registry)?);
    info!(
        min_threads = plan.min_threads,
        max_threads = plan.max_threads,
        iterations = plan.iterations,
        warmup_iterations = config.warmup_iterations,
        "Starting benchmark of {} workloads",
        plan.workloads.len()
    );

    let controller = SweepController::new(engine.clone(), registry).with_timeout(config.timeout());
    let report = run_with_warmup(&controller, &plan, config.warmup_iterations)?;

    write_report(&report, &config.output)?;
    engine.flush()?;

    output::output_report(cli, &report, &config.output);
    Ok(())
}
