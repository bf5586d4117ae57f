//! Snapshot loading and parent lookup maps.

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::model::{City, Country, Record, State};

pub const COUNTRIES_FILE: &str = "countries.json";
pub const STATES_FILE: &str = "states.json";
pub const CITIES_FILE: &str = "cities.json";

/// The three collections exactly as read, before validation.
#[derive(Debug)]
pub struct RawSnapshot {
    pub countries: Vec<Value>,
    pub states: Vec<Value>,
    pub cities: Vec<Value>,
}

impl RawSnapshot {
    /// Read all three inputs. Any missing or unparsable file is fatal.
    pub fn load(input_dir: &Path) -> Result<Self> {
        Ok(Self {
            countries: read_array(&input_dir.join(COUNTRIES_FILE))?,
            states: read_array(&input_dir.join(STATES_FILE))?,
            cities: read_array(&input_dir.join(CITIES_FILE))?,
        })
    }
}

fn read_array(path: &Path) -> Result<Vec<Value>> {
    let file =
        File::open(path).with_context(|| format!("Load: Failed to open {}", path.display()))?;
    let value: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Load: Failed to parse {}", path.display()))?;
    match value {
        Value::Array(items) => Ok(items),
        other => bail!(
            "Load: {} must contain a JSON array, found {}",
            path.display(),
            json_kind(&other)
        ),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Validated, typed collections. Read-only for the rest of the run.
#[derive(Debug, Default)]
pub struct RecordStore {
    pub countries: Vec<Country>,
    pub states: Vec<State>,
    pub cities: Vec<City>,
}

/// `id -> record` map over a borrowed collection.
pub type Index<'a, T> = HashMap<i64, &'a T>;

pub fn build_index<T: Record>(records: &[T]) -> Index<'_, T> {
    records.iter().map(|record| (record.id(), record)).collect()
}

/// Parent lookups shared by every phase.
pub struct Lookup<'a> {
    pub countries: Index<'a, Country>,
    pub states: Index<'a, State>,
}

impl<'a> Lookup<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self {
            countries: build_index(&store.countries),
            states: build_index(&store.states),
        }
    }

    pub fn country(&self, id: Option<i64>) -> Option<&'a Country> {
        id.and_then(|id| self.countries.get(&id).copied())
    }

    pub fn state(&self, id: Option<i64>) -> Option<&'a State> {
        id.and_then(|id| self.states.get(&id).copied())
    }
}
