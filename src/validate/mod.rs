//! Per-record validation and referential-integrity checks.

use anyhow::{Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ErrorMode;
use crate::model::{Record, State};
use crate::store::{Lookup, RecordStore};

/// How many offending records are quoted in a warning.
const SAMPLE_LIMIT: usize = 3;

#[derive(Debug, Clone)]
pub struct InvalidRecord {
    pub index: usize,
    pub id: Option<Value>,
    pub reason: String,
}

impl std::fmt::Display for InvalidRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "record {} (index {}): {}", id, self.index, self.reason),
            None => write!(f, "record at index {}: {}", self.index, self.reason),
        }
    }
}

#[derive(Debug)]
pub struct Validated<T> {
    pub records: Vec<T>,
    pub invalid: Vec<InvalidRecord>,
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(_) => false,
    }
}

fn check_record<T>(index: usize, value: Value, mode: ErrorMode) -> Result<T, InvalidRecord>
where
    T: Record + DeserializeOwned,
{
    let Some(object) = value.as_object() else {
        return Err(InvalidRecord {
            index,
            id: None,
            reason: "not a JSON object".to_string(),
        });
    };
    let id = object.get("id").cloned();

    if mode != ErrorMode::Ignore {
        let missing: Vec<&str> = T::REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| is_missing(object.get(*field)))
            .collect();
        if !missing.is_empty() {
            return Err(InvalidRecord {
                index,
                id,
                reason: format!("missing {}", missing.join(", ")),
            });
        }
    }

    serde_json::from_value(value).map_err(|err| InvalidRecord {
        index,
        id,
        reason: format!("malformed: {err}"),
    })
}

/// Keep the records that pass validation.
///
/// `warn` drops and reports failures, `strict` fails on the first one,
/// `ignore` skips the required-field check and reports nothing.
pub fn validate_records<T>(raw: Vec<Value>, mode: ErrorMode) -> Result<Validated<T>>
where
    T: Record + DeserializeOwned,
{
    let total = raw.len();
    let mut records = Vec::with_capacity(total);
    let mut invalid = Vec::new();

    for (index, value) in raw.into_iter().enumerate() {
        match check_record::<T>(index, value, mode) {
            Ok(record) => records.push(record),
            Err(bad) if mode == ErrorMode::Strict => {
                bail!("Validate: invalid {} {}", T::KIND, bad);
            }
            Err(bad) => invalid.push(bad),
        }
    }

    if mode == ErrorMode::Warn && !invalid.is_empty() {
        tracing::warn!(
            "Validate: dropped {} of {} {} records",
            invalid.len(),
            total,
            T::KIND
        );
        for bad in invalid.iter().take(SAMPLE_LIMIT) {
            tracing::warn!("Validate: invalid {} {}", T::KIND, bad);
        }
    }

    Ok(Validated { records, invalid })
}

/// A child whose foreign key matches no parent.
#[derive(Debug, Clone, Serialize)]
pub struct Dangling {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Default, Serialize)]
pub struct IntegrityReport {
    pub states_without_country: Vec<Dangling>,
    pub cities_without_state: Vec<Dangling>,
    pub cities_without_country: Vec<Dangling>,
}

impl IntegrityReport {
    pub fn violation_count(&self) -> usize {
        self.states_without_country.len()
            + self.cities_without_state.len()
            + self.cities_without_country.len()
    }

    pub fn is_clean(&self) -> bool {
        self.violation_count() == 0
    }

    /// Log each check; violations are warnings, never failures.
    pub fn log(&self) {
        log_check("states", "country_id", &self.states_without_country);
        log_check("cities", "state_id", &self.cities_without_state);
        log_check("cities", "country_id", &self.cities_without_country);
    }
}

fn log_check(children: &str, key: &str, dangling: &[Dangling]) {
    if dangling.is_empty() {
        tracing::info!("Validate: all {} have valid {} references", children, key);
        return;
    }
    let samples: Vec<String> = dangling
        .iter()
        .take(SAMPLE_LIMIT)
        .map(|d| match d.parent_id {
            Some(parent) => format!("{} #{} ({}: {})", d.name, d.id, key, parent),
            None => format!("{} #{} ({}: none)", d.name, d.id, key),
        })
        .collect();
    tracing::warn!(
        "Validate: {} {} with invalid {} references, e.g. {}",
        dangling.len(),
        children,
        key,
        samples.join(", ")
    );
}

fn dangling<T: Record>(record: &T, parent_id: Option<i64>) -> Dangling {
    Dangling {
        id: record.id(),
        name: record.name().to_string(),
        parent_id,
    }
}

pub fn check_integrity(store: &RecordStore, lookup: &Lookup<'_>) -> IntegrityReport {
    let states_without_country = store
        .states
        .iter()
        .filter(|state: &&State| lookup.country(state.country_id).is_none())
        .map(|state| dangling(state, state.country_id))
        .collect();
    let cities_without_state = store
        .cities
        .iter()
        .filter(|city| lookup.state(city.state_id).is_none())
        .map(|city| dangling(city, city.state_id))
        .collect();
    let cities_without_country = store
        .cities
        .iter()
        .filter(|city| lookup.country(city.country_id).is_none())
        .map(|city| dangling(city, city.country_id))
        .collect();

    IntegrityReport {
        states_without_country,
        cities_without_state,
        cities_without_country,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{City, Country};
    use serde_json::json;

    fn raw_states() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "Good", "country_id": 1}),
            json!({"id": 2, "name": "  ", "country_id": 1}),
            json!({"id": 3, "name": "Orphan"}),
            json!("not an object"),
        ]
    }

    #[test]
    fn warn_mode_drops_invalid_records() {
        let validated = validate_records::<State>(raw_states(), ErrorMode::Warn).unwrap();
        assert_eq!(validated.records.len(), 1);
        assert_eq!(validated.invalid.len(), 3);
        assert!(validated.invalid[0].reason.contains("name"));
        assert!(validated.invalid[1].reason.contains("country_id"));
    }

    #[test]
    fn strict_mode_fails_on_first_invalid_record() {
        let err = validate_records::<State>(raw_states(), ErrorMode::Strict).unwrap_err();
        assert!(err.to_string().contains("missing name"));
    }

    #[test]
    fn ignore_mode_keeps_incomplete_records() {
        let validated = validate_records::<State>(raw_states(), ErrorMode::Ignore).unwrap();
        // only the non-object cannot be represented at all
        assert_eq!(validated.records.len(), 3);
        assert_eq!(validated.invalid.len(), 1);
    }

    #[test]
    fn malformed_ids_are_invalid() {
        let raw = vec![json!({"id": "seven", "name": "X", "country_id": 1})];
        let validated = validate_records::<State>(raw, ErrorMode::Warn).unwrap();
        assert!(validated.records.is_empty());
        assert!(validated.invalid[0].reason.starts_with("malformed"));
    }

    #[test]
    fn reports_dangling_references() {
        let store = RecordStore {
            countries: vec![
                serde_json::from_value::<Country>(json!({"id": 1, "name": "A"})).unwrap(),
            ],
            states: vec![
                serde_json::from_value(json!({"id": 10, "name": "S", "country_id": 1})).unwrap(),
                serde_json::from_value(json!({"id": 11, "name": "T", "country_id": 9})).unwrap(),
            ],
            cities: vec![
                serde_json::from_value::<City>(
                    json!({"id": 100, "name": "C", "state_id": 10, "country_id": 1}),
                )
                .unwrap(),
                serde_json::from_value::<City>(
                    json!({"id": 101, "name": "D", "state_id": 77, "country_id": 8}),
                )
                .unwrap(),
            ],
        };
        let lookup = Lookup::new(&store);
        let report = check_integrity(&store, &lookup);

        assert_eq!(report.states_without_country.len(), 1);
        assert_eq!(report.states_without_country[0].parent_id, Some(9));
        assert_eq!(report.cities_without_state.len(), 1);
        assert_eq!(report.cities_without_country.len(), 1);
        assert_eq!(report.violation_count(), 3);
        assert!(!report.is_clean());
    }
}
