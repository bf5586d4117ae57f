use anyhow::Result;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::analyze::DataAnalysis;
use crate::config::{ErrorMode, Settings};
use crate::emit::{Emitter, Envelope, OutputFile};
use crate::store::{Lookup, RecordStore};

pub mod cities;
pub mod countries;
pub mod info;
pub mod search;
pub mod states;

pub use self::cities::CitiesPhase;
pub use self::countries::CountriesPhase;
pub use self::info::ApiInfoPhase;
pub use self::search::SearchPhase;
pub use self::states::StatesPhase;

/// Everything a phase may read. Nothing in here is mutated while phases run.
pub struct PhaseContext<'a> {
    pub store: &'a RecordStore,
    pub lookup: &'a Lookup<'a>,
    pub analysis: &'a DataAnalysis,
    pub emitter: &'a Emitter,
    pub settings: &'a Settings,
}

/// Outcome of one phase, folded into the run summary by the driver.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub phase: &'static str,
    pub files_written: usize,
    pub records_processed: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

impl PhaseReport {
    pub fn new(phase: &'static str) -> Self {
        Self {
            phase,
            files_written: 0,
            records_processed: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Record a data-quality warning. `ignore` runs keep quiet.
    pub fn warn(&mut self, mode: ErrorMode, message: String) {
        if mode != ErrorMode::Ignore {
            tracing::warn!("{}: {}", self.phase, message);
            self.warnings.push(message);
        }
    }
}

pub trait Phase: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()>;

    /// Run the phase and time it. Fails only on strict-mode aborts.
    fn run(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        tracing::info!("Generating {} endpoints...", self.name());
        let start = Instant::now();
        let mut report = PhaseReport::new(self.name());
        self.generate(ctx, &mut report)?;
        report.elapsed = start.elapsed();
        tracing::info!(
            "{}: {} files, {} records in {:.2}s ({} errors, {} warnings)",
            report.phase,
            report.files_written,
            report.records_processed,
            report.elapsed.as_secs_f64(),
            report.errors.len(),
            report.warnings.len()
        );
        Ok(report)
    }
}

impl PhaseContext<'_> {
    pub fn mode(&self) -> ErrorMode {
        self.settings.error_mode
    }

    /// Write one document, folding a failure into the report.
    pub fn emit(&self, report: &mut PhaseReport, file: Result<OutputFile>) -> Result<()> {
        match file.and_then(|file| self.emitter.write(file)) {
            Ok(()) => {
                report.files_written += 1;
                Ok(())
            }
            Err(err) => self.fail(report, err),
        }
    }

    /// Build and write one document per item on the worker pool.
    ///
    /// Output paths are worked out up front: when several items map to the
    /// same path only the last one is built, so the result never depends on
    /// scheduling. In strict mode the first failure stops the remaining work
    /// and is returned; otherwise failures are collected and the rest still
    /// runs.
    pub fn emit_all<T, P, F>(
        &self,
        report: &mut PhaseReport,
        items: Vec<T>,
        path_of: P,
        build: F,
    ) -> Result<()>
    where
        T: Send,
        P: Fn(&T) -> String,
        F: Fn(T) -> Result<Envelope> + Sync + Send,
    {
        let total = items.len();
        let units = last_per_path(items, path_of);
        if units.len() < total {
            tracing::debug!(
                "{}: {} documents share a path with a later one and were skipped",
                report.phase,
                total - units.len()
            );
        }
        let count = units.len();
        let write = |(path, item): (String, T)| {
            build(item).and_then(|envelope| self.emitter.write(OutputFile::new(path, envelope)))
        };

        if self.mode() == ErrorMode::Strict {
            let written = AtomicUsize::new(0);
            units.into_par_iter().try_for_each(|unit| -> Result<()> {
                write(unit)?;
                written.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })?;
            report.files_written += written.into_inner();
            return Ok(());
        }

        let failures: Vec<anyhow::Error> = units
            .into_par_iter()
            .map(write)
            .filter_map(Result::err)
            .collect();
        report.files_written += count - failures.len();
        for err in failures {
            self.fail(report, err)?;
        }
        Ok(())
    }

    fn fail(&self, report: &mut PhaseReport, err: anyhow::Error) -> Result<()> {
        match self.mode() {
            ErrorMode::Strict => Err(err),
            ErrorMode::Warn => {
                tracing::error!("{}: {:#}", report.phase, err);
                report.errors.push(format!("{err:#}"));
                Ok(())
            }
            ErrorMode::Ignore => Ok(()),
        }
    }
}

/// Pair each item with its output path, keeping only the last item for a
/// path several items share. Input order is preserved.
fn last_per_path<T>(items: Vec<T>, path_of: impl Fn(&T) -> String) -> Vec<(String, T)> {
    let mut seen = HashSet::new();
    let mut units: Vec<(String, T)> = items
        .into_iter()
        .rev()
        .map(|item| (path_of(&item), item))
        .filter(|(path, _)| seen.insert(path.clone()))
        .collect();
    units.reverse();
    units
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for the phase tests.

    use super::*;
    use crate::analyze::analyze;
    use serde_json::{Value, json};
    use std::path::Path;

    pub fn sample_store() -> RecordStore {
        let countries = vec![
            json!({"id": 1, "name": "Afneq", "iso2": "AF", "iso3": "AFQ", "region": "Asia",
                   "region_id": 3, "subregion": "Southern Asia", "phonecode": 93,
                   "timezones": [{"zoneName": "Asia/Kabul"}],
                   "translations": {"de": "Afnek", "fr": "Afnèque"}}),
            json!({"id": 2, "name": "Borland", "iso2": "BO", "iso3": "BOR", "region": "Europe",
                   "subregion": "Northern Europe"}),
            json!({"id": 3, "name": "Atlantis", "region": ""}),
        ];
        let states = vec![
            json!({"id": 10, "name": "Prov", "country_id": 1, "country_code": "AF",
                   "country_name": "Afneq", "iso2": "PR", "iso3166_2": "AF-PR",
                   "type": "province", "timezone": "Asia/Kabul",
                   "latitude": "34.52813000", "longitude": "69.17233000"}),
            json!({"id": 11, "name": "Lowland", "country_id": 1, "country_code": "AF",
                   "country_name": "Afneq", "type": "province", "timezone": "Asia/Kabul"}),
            json!({"id": 20, "name": "North", "country_id": 2, "country_code": "BO",
                   "country_name": "Borland", "iso3166_2": "BO-N", "type": "region"}),
            json!({"id": 30, "name": "Lost", "country_id": 99, "type": "undefined"}),
        ];
        let cities = vec![
            json!({"id": 100, "name": "Town", "state_id": 10, "country_id": 1,
                   "state_name": "Prov", "country_name": "Afneq", "timezone": "Asia/Kabul",
                   "latitude": "34.5", "longitude": "69.1", "wikiDataId": "Q1"}),
            json!({"id": 101, "name": "Arbor", "state_id": 10, "country_id": 1,
                   "state_name": "Prov", "country_name": "Afneq"}),
            json!({"id": 205, "name": "Fjord", "state_id": 20, "country_id": 2,
                   "state_name": "North", "country_name": "Borland",
                   "timezone": "Europe/Oslo"}),
            json!({"id": 300, "name": "Drift", "state_id": 77, "country_id": 98}),
        ];

        fn typed<T: serde::de::DeserializeOwned>(values: Vec<Value>) -> Vec<T> {
            values
                .into_iter()
                .map(|v| serde_json::from_value(v).unwrap())
                .collect()
        }

        RecordStore {
            countries: typed(countries),
            states: typed(states),
            cities: typed(cities),
        }
    }

    pub fn settings(root: &Path) -> Settings {
        Settings {
            output_dir: root.to_path_buf(),
            output_style: crate::config::OutputStyle::Pretty,
            batch_size: 2,
            ..Settings::default()
        }
    }

    /// Run `phase` over the sample store into `root`.
    pub fn run_phase(phase: &dyn Phase, root: &Path) -> PhaseReport {
        run_phase_with(phase, &sample_store(), &settings(root))
    }

    pub fn run_phase_with(
        phase: &dyn Phase,
        store: &RecordStore,
        settings: &Settings,
    ) -> PhaseReport {
        let lookup = Lookup::new(store);
        let analysis = analyze(store);
        let emitter = Emitter::new(settings, "2024-01-01T00:00:00Z".to_string());
        let ctx = PhaseContext {
            store,
            lookup: &lookup,
            analysis: &analysis,
            emitter: &emitter,
            settings,
        };
        phase.run(&ctx).unwrap()
    }

    pub fn read(root: &Path, path: &str) -> Value {
        let text = std::fs::read_to_string(root.join(path))
            .unwrap_or_else(|err| panic!("missing {path}: {err}"));
        serde_json::from_str(&text).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::analyze::analyze;

    #[test]
    fn warn_mode_records_failures_and_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        // a regular file where a directory is needed makes writes below it fail
        std::fs::write(dir.path().join("blocked"), "x").unwrap();

        let store = sample_store();
        let lookup = Lookup::new(&store);
        let analysis = analyze(&store);
        let settings = settings(dir.path());
        let emitter = Emitter::new(&settings, "t".to_string());
        let ctx = PhaseContext {
            store: &store,
            lookup: &lookup,
            analysis: &analysis,
            emitter: &emitter,
            settings: &settings,
        };

        let mut report = PhaseReport::new("test");
        let paths = vec!["ok/a.json", "blocked/b.json", "ok/c.json"];
        ctx.emit_all(&mut report, paths, |path| path.to_string(), |_| {
            Envelope::new("x", &[1])
        })
        .unwrap();

        assert_eq!(report.files_written, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("blocked"));
    }

    #[test]
    fn strict_mode_propagates_failures() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocked"), "x").unwrap();

        let store = sample_store();
        let lookup = Lookup::new(&store);
        let analysis = analyze(&store);
        let settings = Settings {
            error_mode: ErrorMode::Strict,
            ..settings(dir.path())
        };
        let emitter = Emitter::new(&settings, "t".to_string());
        let ctx = PhaseContext {
            store: &store,
            lookup: &lookup,
            analysis: &analysis,
            emitter: &emitter,
            settings: &settings,
        };

        let mut report = PhaseReport::new("test");
        let result = ctx.emit(
            &mut report,
            Envelope::new("x", &[1]).map(|env| OutputFile::new("blocked/b.json", env)),
        );
        assert!(result.is_err());
        assert_eq!(report.files_written, 0);
    }

    #[test]
    fn shared_paths_keep_the_last_item_at_any_thread_count() {
        let store = sample_store();
        let lookup = Lookup::new(&store);
        let analysis = analyze(&store);

        for threads in [1, 4] {
            let dir = tempfile::tempdir().unwrap();
            let settings = settings(dir.path());
            let emitter = Emitter::new(&settings, "t".to_string());
            let ctx = PhaseContext {
                store: &store,
                lookup: &lookup,
                analysis: &analysis,
                emitter: &emitter,
                settings: &settings,
            };

            // a long document and a short one land on the same file
            let units = vec![("Province", 400), ("other", 2), ("province", 1)];
            let mut report = PhaseReport::new("test");
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap();
            pool.install(|| {
                ctx.emit_all(
                    &mut report,
                    units,
                    |(key, _)| format!("type/{}.json", key.to_lowercase()),
                    |(key, size)| {
                        Envelope::new("states_by_type", &vec![key; size])
                            .map(|env| env.meta("group", key))
                    },
                )
            })
            .unwrap();

            assert_eq!(report.files_written, 2, "{threads} threads");
            let doc = read(dir.path(), "type/province.json");
            assert_eq!(doc["meta"]["group"], "province");
            assert_eq!(doc["meta"]["count"], 1);
        }
    }

    #[test]
    fn last_per_path_preserves_input_order() {
        let units = last_per_path(vec!["b1", "a1", "b2", "c1"], |s| s[..1].to_string());
        let kept: Vec<&str> = units.iter().map(|(_, item)| *item).collect();
        assert_eq!(kept, vec!["a1", "b2", "c1"]);
    }

    #[test]
    fn warnings_are_kept_unless_ignored() {
        for (mode, expected) in [
            (ErrorMode::Strict, 1),
            (ErrorMode::Warn, 1),
            (ErrorMode::Ignore, 0),
        ] {
            let mut report = PhaseReport::new("test");
            report.warn(mode, "2 states written without country details".to_string());
            assert_eq!(report.warnings.len(), expected, "{}", mode.label());
        }
    }
}
