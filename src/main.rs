mod analyze;
mod app;
mod batch;
mod config;
mod denorm;
mod emit;
mod group;
mod model;
mod phases;
mod sanitize;
mod store;
mod validate;

use anyhow::{Context, Result};
use clap::Parser;

use app::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = cli.settings()?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(settings.max_concurrency)
        .build_global()
        .context("CLI: Failed to initialize thread pool")?;

    let summary = app::run(&settings)?;
    if summary.error_count() > 0 {
        tracing::warn!(
            "Finished with {} file errors; see the log above",
            summary.error_count()
        );
    }

    Ok(())
}
