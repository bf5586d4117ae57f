use anyhow::Result;
use serde_json::json;
use std::collections::BTreeMap;

use super::{Phase, PhaseContext, PhaseReport};
use crate::batch::{BatchIndexEntry, CityBatch, plan_batches};
use crate::denorm::{CityRecord, denormalize_city};
use crate::emit::{Envelope, OutputFile};
use crate::group::{distinct, distinct_sorted, group_by, group_key};
use crate::model::City;
use crate::model::views::{CityListItem, CityTimezoneItem, project};
use crate::sanitize::{safe_filename, timezone_filename};

/// City lists by country, state and timezone, plus the id batches.
pub struct CitiesPhase;

fn with_wikidata(cities: &[&City]) -> usize {
    cities.iter().filter(|c| c.has_wikidata()).count()
}

fn with_coordinates(cities: &[&City]) -> usize {
    cities.iter().filter(|c| c.has_coordinates()).count()
}

impl CitiesPhase {
    fn by_country(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        let groups: Vec<(i64, Vec<&City>)> = group_by(&ctx.store.cities, |c| c.country_id)
            .into_iter()
            .collect();

        ctx.emit_all(
            report,
            groups,
            |(country_id, _)| {
                let country = ctx.lookup.country(Some(*country_id));
                let stem = safe_filename(
                    country.and_then(|c| c.iso2.as_deref()),
                    &country_id.to_string(),
                );
                format!("cities/country/{stem}.json")
            },
            |(country_id, cities)| {
                let country = ctx.lookup.country(Some(country_id));
                let items: Vec<CityListItem> = project(&cities);
                let summary = json!({
                    "states": distinct(cities.iter().map(|c| c.state_name.as_deref())).len(),
                    "cities_with_wikidata": with_wikidata(&cities),
                    "cities_with_coordinates": with_coordinates(&cities),
                });
                Ok(Envelope::new("cities", &items)?
                    .meta("country_id", country_id)
                    .meta_opt("country_name", country.map(|c| c.name.as_str()))
                    .meta_opt("country_iso2", country.and_then(|c| c.iso2.as_deref()))
                    .meta_opt("country_code", cities[0].country_code.as_deref())
                    .meta("total_cities", items.len())
                    .meta("summary", summary))
            },
        )
    }

    fn by_state(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        let groups: Vec<(i64, Vec<&City>)> = group_by(&ctx.store.cities, |c| c.state_id)
            .into_iter()
            .collect();

        ctx.emit_all(
            report,
            groups,
            |(state_id, _)| {
                let state = ctx.lookup.state(Some(*state_id));
                let stem = safe_filename(
                    state.and_then(|s| s.iso3166_2.as_deref()),
                    &state_id.to_string(),
                );
                format!("cities/state/{stem}.json")
            },
            |(state_id, cities)| {
                let state = ctx.lookup.state(Some(state_id));
                let first = cities[0];
                let items: Vec<CityListItem> = project(&cities);
                Ok(Envelope::new("cities", &items)?
                    .meta("state_id", state_id)
                    .meta_opt("state_name", state.map(|s| s.name.as_str()))
                    .meta_opt("state_code", first.state_code.as_deref())
                    .meta_opt("country_id", first.country_id)
                    .meta_opt("country_name", first.country_name.as_deref())
                    .meta_opt("country_code", first.country_code.as_deref())
                    .meta("total_cities", items.len())
                    .meta("cities_with_wikidata", with_wikidata(&cities))
                    .meta("cities_with_coordinates", with_coordinates(&cities)))
            },
        )
    }

    fn by_timezone(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        let groups: Vec<(&str, Vec<&City>)> =
            group_by(&ctx.store.cities, |c| group_key(c.timezone.as_deref()))
                .into_iter()
                .collect();

        ctx.emit_all(
            report,
            groups,
            |(timezone, _)| format!("cities/timezone/{}.json", timezone_filename(timezone)),
            |(timezone, cities)| {
                let items: Vec<CityTimezoneItem> = project(&cities);
                Ok(Envelope::new("cities_by_timezone", &items)?
                    .meta("timezone", timezone)
                    .meta("total_cities", items.len())
                    .meta(
                        "countries",
                        distinct_sorted(cities.iter().map(|c| c.country_name.as_deref())),
                    )
                    .meta(
                        "states",
                        distinct(cities.iter().map(|c| c.state_name.as_deref())).len(),
                    ))
            },
        )
    }

    fn batches(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        let cities = &ctx.store.cities;
        let batch_size = ctx.settings.batch_size;
        let batches = plan_batches(cities, batch_size);
        let index: Vec<BatchIndexEntry> = batches.iter().map(CityBatch::entry).collect();
        tracing::info!("Generating {} city batch files", batches.len());

        ctx.emit_all(report, batches, |batch| batch.path(), |batch| {
            let lookup: BTreeMap<i64, CityRecord> = batch
                .cities
                .iter()
                .map(|&city| {
                    let state = ctx.lookup.state(city.state_id);
                    let country = ctx.lookup.country(city.country_id);
                    (city.id, denormalize_city(city, state, country))
                })
                .collect();
            Ok(Envelope::new("cities_batch", &lookup)?
                .meta(
                    "batch_range",
                    format!("{}-{}", batch.start_id, batch.end_id),
                )
                .meta("cities_count", batch.cities.len())
                .meta("usage", "Access city by ID: data[city_id]"))
        })?;

        ctx.emit(
            report,
            Envelope::new("batch_index", &index).map(|env| {
                let env = env
                    .meta("total_batches", index.len())
                    .meta("cities_per_batch", batch_size)
                    .meta("total_cities", cities.len())
                    .meta(
                        "usage",
                        "Use start_id/end_id to find which batch contains a specific city ID",
                    );
                OutputFile::new("cities/batches.json", env)
            }),
        )
    }
}

impl Phase for CitiesPhase {
    fn name(&self) -> &'static str {
        "cities"
    }

    fn generate(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        report.records_processed = ctx.store.cities.len();

        let orphans = ctx
            .store
            .cities
            .iter()
            .filter(|c| ctx.lookup.state(c.state_id).is_none())
            .count();
        if orphans > 0 {
            report.warn(
                ctx.mode(),
                format!("{orphans} cities written without state details"),
            );
        }

        self.by_country(ctx, report)?;
        self.by_state(ctx, report)?;
        self.by_timezone(ctx, report)?;
        self.batches(ctx, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::testing::{read, run_phase, run_phase_with, settings};
    use crate::store::RecordStore;
    use serde_json::json;

    #[test]
    fn country_and_state_lists() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_phase(&CitiesPhase, dir.path());
        assert!(report.errors.is_empty());

        let af = read(dir.path(), "cities/country/af.json");
        assert_eq!(af["meta"]["total_cities"], 2);
        assert_eq!(af["meta"]["summary"]["cities_with_wikidata"], 1);
        assert_eq!(af["meta"]["summary"]["states"], 1);
        assert_eq!(af["data"][0]["name"], "Arbor");

        let prov = read(dir.path(), "cities/state/af-pr.json");
        assert_eq!(prov["meta"]["state_name"], "Prov");
        assert_eq!(prov["meta"]["cities_with_coordinates"], 1);

        // orphans fall back to their raw ids
        assert!(dir.path().join("cities/country/98.json").exists());
        assert!(dir.path().join("cities/state/77.json").exists());
    }

    #[test]
    fn timezone_groups_skip_cities_without_one() {
        let dir = tempfile::tempdir().unwrap();
        run_phase(&CitiesPhase, dir.path());

        let oslo = read(dir.path(), "cities/timezone/Europe-Oslo.json");
        assert_eq!(oslo["meta"]["countries"], serde_json::json!(["Borland"]));
        let kabul = read(dir.path(), "cities/timezone/Asia-Kabul.json");
        assert_eq!(kabul["meta"]["total_cities"], 1);
    }

    #[test]
    fn batches_cover_all_cities() {
        let dir = tempfile::tempdir().unwrap();
        run_phase(&CitiesPhase, dir.path());

        // batch_size is 2 in the fixture settings
        let index = read(dir.path(), "cities/batches.json");
        assert_eq!(index["meta"]["total_batches"], 2);
        assert_eq!(index["meta"]["total_cities"], 4);
        assert_eq!(index["data"][0]["filename"], "cities/batch/batch-100-101.json");
        assert_eq!(index["data"][1]["start_id"], 205);
        assert_eq!(index["data"][1]["end_id"], 300);

        let first = read(dir.path(), "cities/batch/batch-100-101.json");
        assert_eq!(first["meta"]["batch_range"], "100-101");
        assert_eq!(first["data"]["100"]["state_type"], "province");
        assert_eq!(first["data"]["100"]["country_iso3"], "AFQ");
        assert_eq!(first["data"]["100"]["has_wikidata"], true);

        let second = read(dir.path(), "cities/batch/batch-205-300.json");
        let drift = &second["data"]["300"];
        assert!(drift.get("country_iso2").is_none());
        assert_eq!(drift["has_coordinates"], false);
    }

    #[test]
    fn batch_entries_keep_source_values() {
        let store = RecordStore {
            countries: vec![
                serde_json::from_value(json!({"id": 1, "name": "Afneq", "iso2": "AF"})).unwrap(),
            ],
            states: vec![
                serde_json::from_value(json!({"id": 10, "name": "Prov", "country_id": 1}))
                    .unwrap(),
            ],
            cities: vec![
                serde_json::from_value(json!({
                    "id": 100,
                    "name": "Town",
                    "state_id": 10,
                    "country_id": 1,
                    "latitude": 34.5,
                    "longitude": "69.10000000",
                    "wikiDataId": null
                }))
                .unwrap(),
            ],
        };

        let dir = tempfile::tempdir().unwrap();
        run_phase_with(&CitiesPhase, &store, &settings(dir.path()));

        let batch = read(dir.path(), "cities/batch/batch-100-100.json");
        let town = &batch["data"]["100"];
        assert_eq!(town["latitude"], json!(34.5));
        assert_eq!(town["longitude"], "69.10000000");
        assert!(town["wikiDataId"].is_null());
        assert_eq!(town["state_name"], "Prov");
        assert_eq!(town["country_iso2"], "AF");
    }
}
