use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::analyze::analyze;
use crate::config::{ErrorMode, OutputStyle, Settings};
use crate::emit::{Emitter, timestamp_now};
use crate::model::{City, Country, State};
use crate::phases::{
    ApiInfoPhase, CitiesPhase, CountriesPhase, Phase, PhaseContext, PhaseReport, SearchPhase,
    StatesPhase,
};
use crate::store::{Lookup, RawSnapshot, RecordStore};
use crate::validate::{check_integrity, validate_records};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding countries.json, states.json and cities.json
    #[arg(short, long, env = "GEOAPI_INPUT_DIR")]
    pub input: Option<PathBuf>,

    /// Output directory for the generated tree
    #[arg(short, long, env = "GEOAPI_OUTPUT_DIR")]
    pub output: Option<PathBuf>,

    /// Settings file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Serialization style
    #[arg(long, value_enum)]
    pub style: Option<OutputStyle>,

    /// Record count below which `auto` style pretty-prints
    #[arg(long)]
    pub pretty_threshold: Option<usize>,

    /// Decimal places kept for coordinates in compact output
    #[arg(long)]
    pub precision: Option<u32>,

    /// Cities per batch file
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Number of worker threads (default: 5)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// How per-record and per-file failures are handled
    #[arg(long, value_enum)]
    pub error_mode: Option<ErrorMode>,

    /// Version tag written into every document
    #[arg(long)]
    pub api_version: Option<String>,

    /// Public base URL advertised in api-info.json
    #[arg(long)]
    pub base_url: Option<String>,

    /// Remove the output directory before writing
    #[arg(long)]
    pub clean: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Load layered settings and apply the flags given on the command line.
    pub fn settings(&self) -> Result<Settings> {
        let settings = Settings::load(self.config.as_deref())
            .context("Config: Failed to load settings")?;
        self.apply_overrides(settings)
    }

    pub fn apply_overrides(&self, mut settings: Settings) -> Result<Settings> {
        if let Some(input) = &self.input {
            settings.input_dir = input.clone();
        }
        if let Some(output) = &self.output {
            settings.output_dir = output.clone();
        }
        if let Some(style) = self.style {
            settings.output_style = style;
        }
        if let Some(threshold) = self.pretty_threshold {
            settings.pretty_threshold = threshold;
        }
        if let Some(precision) = self.precision {
            settings.coordinate_precision = precision;
        }
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
        if let Some(concurrency) = self.concurrency {
            settings.max_concurrency = concurrency;
        }
        if let Some(mode) = self.error_mode {
            settings.error_mode = mode;
        }
        if let Some(version) = &self.api_version {
            settings.api_version = version.clone();
        }
        if let Some(url) = &self.base_url {
            settings.cdn_base_url = Some(url.clone());
        }
        if self.clean {
            settings.clean_output = true;
        }
        settings.validate()?;
        Ok(settings)
    }
}

/// Per-phase reports plus wall time for the whole run.
#[derive(Debug)]
pub struct RunSummary {
    pub phases: Vec<PhaseReport>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn files_written(&self) -> usize {
        self.phases.iter().map(|p| p.files_written).sum()
    }

    pub fn error_count(&self) -> usize {
        self.phases.iter().map(|p| p.errors.len()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.phases.iter().map(|p| p.warnings.len()).sum()
    }

    pub fn log(&self) {
        let total = self.elapsed.as_secs_f64();
        for phase in &self.phases {
            let share = if total > 0.0 {
                phase.elapsed.as_secs_f64() / total * 100.0
            } else {
                0.0
            };
            tracing::info!(
                "  {:<10} {:>8.2}s ({:>5.1}%) {} files",
                phase.phase,
                phase.elapsed.as_secs_f64(),
                share,
                phase.files_written
            );
        }
        let files = self.files_written();
        tracing::info!(
            "Done! Written {} files in {:.2}s ({} files/s), {} errors, {} warnings",
            files,
            total,
            (files as f64 / total.max(f64::EPSILON)) as u64,
            self.error_count(),
            self.warning_count()
        );
    }
}

/// Validate all three collections, dropping or failing per `mode`.
pub fn validate_snapshot(raw: RawSnapshot, mode: ErrorMode) -> Result<RecordStore> {
    let countries = validate_records::<Country>(raw.countries, mode)?;
    let states = validate_records::<State>(raw.states, mode)?;
    let cities = validate_records::<City>(raw.cities, mode)?;
    tracing::info!(
        "Loaded {} countries, {} states, {} cities ({} invalid)",
        countries.records.len(),
        states.records.len(),
        cities.records.len(),
        countries.invalid.len() + states.invalid.len() + cities.invalid.len()
    );
    Ok(RecordStore {
        countries: countries.records,
        states: states.records,
        cities: cities.records,
    })
}

/// Remove a previous output tree, refusing anything that would take the
/// input with it.
fn clean_output(output: &Path, input: &Path) -> Result<()> {
    if output.parent().is_none() || input.starts_with(output) {
        bail!(
            "Config: Refusing to clean {} (it contains the input)",
            output.display()
        );
    }
    if output.exists() {
        tracing::info!("Cleaning {}", output.display());
        std::fs::remove_dir_all(output)
            .with_context(|| format!("Emit: Failed to remove {}", output.display()))?;
    }
    Ok(())
}

pub fn run(settings: &Settings) -> Result<RunSummary> {
    let start = Instant::now();
    let generated_at = timestamp_now()?;
    tracing::info!(
        "Generating {} from {:?} into {:?} (style: {}, errors: {})",
        settings.api_version,
        settings.input_dir,
        settings.output_dir,
        settings.output_style.label(),
        settings.error_mode.label()
    );

    let raw = RawSnapshot::load(&settings.input_dir)?;
    let store = validate_snapshot(raw, settings.error_mode)?;
    let lookup = Lookup::new(&store);
    let integrity = check_integrity(&store, &lookup);
    integrity.log();
    if !integrity.is_clean() {
        tracing::warn!(
            "Validate: {} dangling references; affected records are written without parent details",
            integrity.violation_count()
        );
    }
    let analysis = analyze(&store);
    analysis.log();

    if settings.clean_output {
        clean_output(&settings.output_dir, &settings.input_dir)?;
    }

    let emitter = Emitter::new(settings, generated_at);
    let ctx = PhaseContext {
        store: &store,
        lookup: &lookup,
        analysis: &analysis,
        emitter: &emitter,
        settings,
    };

    let phases: [&dyn Phase; 5] = [
        &CountriesPhase,
        &StatesPhase,
        &CitiesPhase,
        &SearchPhase,
        &ApiInfoPhase,
    ];
    let mut reports = Vec::with_capacity(phases.len());
    for phase in phases {
        let report = phase
            .run(&ctx)
            .with_context(|| format!("Pipeline: {} phase aborted", phase.name()))?;
        reports.push(report);
    }

    let summary = RunSummary {
        phases: reports,
        elapsed: start.elapsed(),
    };
    summary.log();
    Ok(summary)
}
