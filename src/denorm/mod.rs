//! Parent-enriched views of child records.
//!
//! Views borrow from the child and its resolved parents, and batch records
//! start from a copy of the child's source object; nothing here mutates a
//! record. When a parent lookup misses, the fields it would have contributed
//! are left out of the output entirely.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{City, Country, State};

/// Country attributes copied onto state and city documents.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CountryFacts<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_iso2: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_iso3: Option<&'a str>,
}

impl<'a> CountryFacts<'a> {
    pub fn of(country: Option<&'a Country>) -> Self {
        match country {
            Some(country) => Self {
                country_name: Some(&country.name),
                country_iso2: country.iso2.as_deref(),
                country_iso3: country.iso3.as_deref(),
            },
            None => Self::default(),
        }
    }
}

/// A city's source object with its state and country folded in, as stored
/// in batch files.
pub type CityRecord = Map<String, Value>;

/// Resolved parent names win over the copies stored on the city. Fields that
/// only a parent can supply are left out when that parent is missing.
pub fn denormalize_city(
    city: &City,
    state: Option<&State>,
    country: Option<&Country>,
) -> CityRecord {
    let facts = CountryFacts::of(country);
    let mut record = city.source().clone();

    let resolved = [
        ("state_name", state.map(|s| s.name.as_str())),
        ("country_name", facts.country_name),
        ("state_type", state.and_then(|s| s.state_type.as_deref())),
        ("country_iso2", facts.country_iso2),
        ("country_iso3", facts.country_iso3),
    ];
    for (key, value) in resolved {
        if let Some(value) = value {
            record.insert(key.to_string(), Value::from(value));
        }
    }

    record.insert("has_coordinates".to_string(), city.has_coordinates().into());
    record.insert("has_wikidata".to_string(), city.has_wikidata().into());
    record.insert("has_timezone".to_string(), city.has_timezone().into());
    record
}

/// Search entry for a state. `iso2` is written as `null` when unknown so
/// clients can rely on the key; `country_iso2` needs the parent.
#[derive(Debug, Serialize)]
pub struct StateListing<'a> {
    pub id: i64,
    pub name: &'a str,
    pub iso2: Option<&'a str>,
    pub country_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_iso2: Option<&'a str>,
}

/// The state's own `country_name` is kept as-is; the parent only fills it
/// in when the state carries none.
pub fn denormalize_state<'a>(state: &'a State, country: Option<&'a Country>) -> StateListing<'a> {
    let facts = CountryFacts::of(country);
    StateListing {
        id: state.id,
        name: &state.name,
        iso2: state.iso2.as_deref().filter(|iso2| !iso2.is_empty()),
        country_id: state.country_id,
        country_name: state.country_name.as_deref().or(facts.country_name),
        country_iso2: facts.country_iso2,
    }
}
