use anyhow::Result;
use serde::Serialize;

use super::{Phase, PhaseContext, PhaseReport};
use crate::denorm::{StateListing, denormalize_state};
use crate::emit::{Envelope, OutputFile};
use crate::model::{City, Country, State};

/// Entries kept per collection in `search/combined.json`.
const COMBINED_STATE_LIMIT: usize = 1000;
const COMBINED_CITY_LIMIT: usize = 5000;

const COUNTRY_SEARCH_FIELDS: &[&str] = &[
    "name",
    "iso2",
    "iso3",
    "native",
    "capital",
    "currency",
    "region",
    "subregion",
    "translations",
];
const STATE_SEARCH_FIELDS: &[&str] = &["name", "iso2", "country_name", "country_iso2"];
const CITY_SEARCH_FIELDS: &[&str] = &["name", "state_name", "country_name"];

/// Flat indexes a client can filter without fetching the grouped documents.
pub struct SearchPhase;

#[derive(Debug, Serialize)]
struct CountrySearchItem<'a> {
    id: i64,
    name: &'a str,
    iso2: Option<&'a str>,
    iso3: Option<&'a str>,
    native: Option<&'a str>,
    capital: Option<&'a str>,
    currency: Option<&'a str>,
    currency_name: Option<&'a str>,
    region: Option<&'a str>,
    subregion: Option<&'a str>,
    emoji: Option<&'a str>,
    translations: Vec<String>,
}

impl<'a> From<&'a Country> for CountrySearchItem<'a> {
    fn from(country: &'a Country) -> Self {
        Self {
            id: country.id,
            name: &country.name,
            iso2: country.iso2.as_deref(),
            iso3: country.iso3.as_deref(),
            native: country.native.as_deref(),
            capital: country.capital.as_deref(),
            currency: country.currency.as_deref(),
            currency_name: country.currency_name.as_deref(),
            region: country.region.as_deref(),
            subregion: country.subregion.as_deref(),
            emoji: country.emoji.as_deref(),
            translations: country.translation_values(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CitySearchItem<'a> {
    id: i64,
    name: &'a str,
    state_id: Option<i64>,
    state_name: Option<&'a str>,
    country_id: Option<i64>,
    country_name: Option<&'a str>,
}

impl<'a> From<&'a City> for CitySearchItem<'a> {
    fn from(city: &'a City) -> Self {
        Self {
            id: city.id,
            name: &city.name,
            state_id: city.state_id,
            state_name: city.state_name.as_deref(),
            country_id: city.country_id,
            country_name: city.country_name.as_deref(),
        }
    }
}

/// Tagged entry of the combined index.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum QuickEntry<'a> {
    Country {
        id: i64,
        name: &'a str,
        iso2: Option<&'a str>,
        emoji: Option<&'a str>,
    },
    State {
        id: i64,
        name: &'a str,
        country_name: Option<&'a str>,
    },
    City {
        id: i64,
        name: &'a str,
        state_name: Option<&'a str>,
        country_name: Option<&'a str>,
    },
}

impl<'a> QuickEntry<'a> {
    fn country(c: &'a Country) -> Self {
        Self::Country {
            id: c.id,
            name: &c.name,
            iso2: c.iso2.as_deref(),
            emoji: c.emoji.as_deref(),
        }
    }

    fn state(s: &'a State) -> Self {
        Self::State {
            id: s.id,
            name: &s.name,
            country_name: s.country_name.as_deref(),
        }
    }

    fn city(c: &'a City) -> Self {
        Self::City {
            id: c.id,
            name: &c.name,
            state_name: c.state_name.as_deref(),
            country_name: c.country_name.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Combined<'a> {
    countries: Vec<QuickEntry<'a>>,
    states: Vec<QuickEntry<'a>>,
    cities: Vec<QuickEntry<'a>>,
}

impl Phase for SearchPhase {
    fn name(&self) -> &'static str {
        "search"
    }

    fn generate(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        let store = ctx.store;
        report.records_processed = store.countries.len() + store.states.len() + store.cities.len();

        let countries: Vec<CountrySearchItem> = store.countries.iter().map(Into::into).collect();
        ctx.emit(
            report,
            Envelope::new("countries_search", &countries).map(|env| {
                let env = env
                    .meta("searchable_fields", COUNTRY_SEARCH_FIELDS)
                    .meta("usage", "Filter client-side using any of the searchable fields")
                    .meta("total_countries", countries.len());
                OutputFile::new("search/countries.json", env)
            }),
        )?;

        let states: Vec<StateListing> = store
            .states
            .iter()
            .map(|s| denormalize_state(s, ctx.lookup.country(s.country_id)))
            .collect();
        ctx.emit(
            report,
            Envelope::new("states_search", &states).map(|env| {
                let env = env
                    .meta("searchable_fields", STATE_SEARCH_FIELDS)
                    .meta(
                        "usage",
                        "Filter client-side using name, iso2, or country_name fields",
                    )
                    .meta("total_states", states.len());
                OutputFile::new("search/states.json", env)
            }),
        )?;

        let cities: Vec<CitySearchItem> = store.cities.iter().map(Into::into).collect();
        ctx.emit(
            report,
            Envelope::new("cities_search", &cities).map(|env| {
                let env = env
                    .meta("searchable_fields", CITY_SEARCH_FIELDS)
                    .meta(
                        "usage",
                        "Filter client-side using name, state_name, or country_name fields",
                    )
                    .meta(
                        "note",
                        "Large dataset - consider client-side pagination or filtering",
                    )
                    .meta("total_cities", cities.len());
                OutputFile::new("search/cities.json", env)
            }),
        )?;

        let combined = Combined {
            countries: store.countries.iter().map(QuickEntry::country).collect(),
            states: store
                .states
                .iter()
                .take(COMBINED_STATE_LIMIT)
                .map(QuickEntry::state)
                .collect(),
            cities: store
                .cities
                .iter()
                .take(COMBINED_CITY_LIMIT)
                .map(QuickEntry::city)
                .collect(),
        };
        let limitations = serde_json::json!({
            "states": format!("Limited to first {COMBINED_STATE_LIMIT} states"),
            "cities": format!("Limited to first {COMBINED_CITY_LIMIT} cities"),
        });
        ctx.emit(
            report,
            Envelope::new("combined_search", &combined).map(|env| {
                let env = env
                    .meta("usage", "Quick search across all entity types")
                    .meta("limitations", limitations)
                    .meta("note", "For complete search, use individual search endpoints");
                OutputFile::new("search/combined.json", env)
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::testing::{read, run_phase};

    #[test]
    fn writes_four_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_phase(&SearchPhase, dir.path());
        assert_eq!(report.files_written, 4);
        assert_eq!(report.records_processed, 11);

        let countries = read(dir.path(), "search/countries.json");
        assert_eq!(countries["data"][0]["translations"], serde_json::json!(["Afnek", "Afnèque"]));
        assert_eq!(countries["data"][1]["translations"], serde_json::json!([]));

        let states = read(dir.path(), "search/states.json");
        assert_eq!(states["data"][0]["country_iso2"], "AF");
        assert!(states["data"][1]["iso2"].is_null());
        assert!(states["data"][3].get("country_iso2").is_none());

        let cities = read(dir.path(), "search/cities.json");
        assert_eq!(cities["meta"]["total_cities"], 4);
    }

    #[test]
    fn combined_entries_are_tagged() {
        let dir = tempfile::tempdir().unwrap();
        run_phase(&SearchPhase, dir.path());

        let combined = read(dir.path(), "search/combined.json");
        assert_eq!(combined["meta"]["count"], 1);
        assert_eq!(combined["data"]["countries"][0]["type"], "country");
        assert_eq!(combined["data"]["states"][0]["type"], "state");
        assert_eq!(combined["data"]["cities"].as_array().unwrap().len(), 4);
        assert_eq!(
            combined["meta"]["limitations"]["cities"],
            "Limited to first 5000 cities"
        );
    }
}
