use anyhow::Result;
use serde::Serialize;

use super::{Phase, PhaseContext, PhaseReport};
use crate::emit::{Envelope, OutputFile};
use crate::group::{group_by, group_key, sort_by_name};
use crate::model::Country;
use crate::model::views::{
    CountryListItem, CountryRegionItem, CountrySubregionItem, Projection, project,
};
use crate::sanitize::safe_filename;

/// `countries.json`, one file per country, and the region/subregion groups.
pub struct CountriesPhase;

#[derive(Debug, Serialize)]
struct RegionEntry<'a> {
    region: &'a str,
    region_id: Option<i64>,
    country_count: usize,
    endpoint: String,
}

fn country_path(country: &Country) -> String {
    format!(
        "countries/{}.json",
        safe_filename(country.iso2.as_deref(), &country.id.to_string())
    )
}

fn region_path(dir: &str, key: &str) -> String {
    format!("countries/{dir}/{}.json", safe_filename(Some(key), "unknown"))
}

impl Phase for CountriesPhase {
    fn name(&self) -> &'static str {
        "countries"
    }

    fn generate(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        let countries = &ctx.store.countries;
        report.records_processed = countries.len();

        let mut sorted: Vec<&Country> = countries.iter().collect();
        sort_by_name(&mut sorted);
        let list: Vec<CountryListItem> = project(&sorted);
        ctx.emit(
            report,
            Envelope::new("countries", &list).map(|env| {
                OutputFile::new(
                    "countries.json",
                    env.meta("total_countries", list.len())
                        .meta("fields_included", CountryListItem::FIELDS),
                )
            }),
        )?;

        let all: Vec<&Country> = countries.iter().collect();
        ctx.emit_all(report, all, |country| country_path(country), |country| {
            Ok(Envelope::new("country", country)?
                .meta("country_id", country.id)
                .meta("country_name", country.name.as_str())
                .meta("has_timezones", country.has_timezones())
                .meta("has_translations", country.has_translations()))
        })?;

        let regions = group_by(countries, |c| group_key(c.region.as_deref()));
        let index: Vec<RegionEntry> = regions
            .iter()
            .map(|(&region, members)| RegionEntry {
                region,
                region_id: members[0].region_id,
                country_count: members.len(),
                endpoint: region_path("region", region),
            })
            .collect();
        let groups: Vec<(&str, Vec<&Country>)> = regions.into_iter().collect();
        ctx.emit_all(
            report,
            groups,
            |(region, _)| region_path("region", region),
            |(region, members)| {
                let items: Vec<CountryRegionItem> = project(&members);
                Ok(Envelope::new("countries_by_region", &items)?
                    .meta("region", region)
                    .meta_opt("region_id", members[0].region_id)
                    .meta("total_countries", items.len()))
            },
        )?;
        ctx.emit(
            report,
            Envelope::new("regions_index", &index)
                .map(|env| OutputFile::new("countries/regions.json", env)),
        )?;

        let subregions = group_by(countries, |c| group_key(c.subregion.as_deref()));
        let groups: Vec<(&str, Vec<&Country>)> = subregions.into_iter().collect();
        ctx.emit_all(
            report,
            groups,
            |(subregion, _)| region_path("subregion", subregion),
            |(subregion, members)| {
                let items: Vec<CountrySubregionItem> = project(&members);
                Ok(Envelope::new("countries_by_subregion", &items)?
                    .meta("subregion", subregion)
                    .meta_opt("subregion_id", members[0].subregion_id)
                    .meta_opt("region", members[0].region.as_deref())
                    .meta("total_countries", items.len()))
            },
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::testing::{read, run_phase, run_phase_with, settings};
    use crate::store::RecordStore;
    use serde_json::json;

    #[test]
    fn writes_list_details_and_groups() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_phase(&CountriesPhase, dir.path());
        assert!(report.errors.is_empty());
        // list + 3 details + 2 regions + index + 2 subregions
        assert_eq!(report.files_written, 9);

        let list = read(dir.path(), "countries.json");
        let names: Vec<&str> = list["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Afneq", "Atlantis", "Borland"]);
        assert_eq!(list["meta"]["total_countries"], 3);
        assert_eq!(list["data"][0]["phonecode"], "93");

        let detail = read(dir.path(), "countries/af.json");
        assert_eq!(detail["meta"]["has_timezones"], true);
        assert_eq!(detail["meta"]["has_translations"], true);
        assert_eq!(detail["data"]["iso3"], "AFQ");

        // no iso2 falls back to the id
        let fallback = read(dir.path(), "countries/3.json");
        assert_eq!(fallback["meta"]["has_timezones"], false);
    }

    #[test]
    fn blank_regions_form_no_group() {
        let dir = tempfile::tempdir().unwrap();
        run_phase(&CountriesPhase, dir.path());

        let asia = read(dir.path(), "countries/region/asia.json");
        assert_eq!(asia["meta"]["region_id"], 3);
        assert_eq!(asia["meta"]["count"], 1);

        let index = read(dir.path(), "countries/regions.json");
        let regions: Vec<&str> = index["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["region"].as_str().unwrap())
            .collect();
        assert_eq!(regions, vec!["Asia", "Europe"]);
        assert_eq!(index["data"][1]["endpoint"], "countries/region/europe.json");

        let sub = read(dir.path(), "countries/subregion/northern-europe.json");
        assert_eq!(sub["meta"]["region"], "Europe");
    }

    #[test]
    fn pretty_details_reproduce_the_source_record() {
        let dir = tempfile::tempdir().unwrap();
        let source = json!({
            "id": 1,
            "name": "Afneq",
            "iso2": "AF",
            "capital": null,
            "phonecode": 93,
            "numeric_code": null
        });
        let store = RecordStore {
            countries: vec![serde_json::from_value(source.clone()).unwrap()],
            states: Vec::new(),
            cities: Vec::new(),
        };
        run_phase_with(&CountriesPhase, &store, &settings(dir.path()));

        let detail = read(dir.path(), "countries/af.json");
        assert_eq!(detail["data"], source);
        assert!(detail["data"]["capital"].is_null());
        assert_eq!(detail["data"]["phonecode"], json!(93));

        let text = std::fs::read_to_string(dir.path().join("countries/af.json")).unwrap();
        let capital = text.find("\"capital\"").unwrap();
        let phonecode = text.find("\"phonecode\"").unwrap();
        assert!(capital < phonecode, "source field order is kept");
    }

    #[test]
    fn colliding_region_names_resolve_to_the_last_group() {
        let store = RecordStore {
            countries: vec![
                serde_json::from_value(json!({"id": 1, "name": "A", "region": "South Seas"}))
                    .unwrap(),
                serde_json::from_value(json!({"id": 2, "name": "B", "region": "south-seas"}))
                    .unwrap(),
                serde_json::from_value(json!({"id": 3, "name": "C", "region": "south-seas"}))
                    .unwrap(),
            ],
            states: Vec::new(),
            cities: Vec::new(),
        };

        let dir = tempfile::tempdir().unwrap();
        run_phase_with(&CountriesPhase, &store, &settings(dir.path()));

        // "South Seas" sorts before "south-seas", so the latter wins
        let group = read(dir.path(), "countries/region/south-seas.json");
        assert_eq!(group["meta"]["region"], "south-seas");
        assert_eq!(group["meta"]["total_countries"], 2);
    }
}
