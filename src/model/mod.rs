//! Source records as read from the reference snapshot.
//!
//! Only the fields the generator reads are typed. Each record also keeps the
//! object it was parsed from, and that object is what the detail documents
//! write back: nulls, number formatting and field order survive untouched.

pub mod views;

use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::ops::Deref;

/// Common surface of the three collections.
pub trait Record {
    /// Singular label used in logs.
    const KIND: &'static str;
    /// Fields that must be present and non-empty for a record to be kept.
    const REQUIRED_FIELDS: &'static [&'static str];

    fn id(&self) -> i64;
    fn name(&self) -> &str;
}

/// Typed fields plus the JSON object they were read from.
///
/// Derefs to the typed fields; serializes as the source object.
#[derive(Debug, Clone)]
pub struct Sourced<F> {
    fields: F,
    source: Map<String, Value>,
}

impl<F> Sourced<F> {
    pub fn source(&self) -> &Map<String, Value> {
        &self.source
    }
}

impl<F> Deref for Sourced<F> {
    type Target = F;

    fn deref(&self) -> &F {
        &self.fields
    }
}

impl<'de, F: DeserializeOwned> Deserialize<'de> for Sourced<F> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let source = Map::<String, Value>::deserialize(deserializer)?;
        let fields = serde_json::from_value(Value::Object(source.clone()))
            .map_err(<D::Error as de::Error>::custom)?;
        Ok(Self { fields, source })
    }
}

impl<F> Serialize for Sourced<F> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.source.serialize(serializer)
    }
}

pub type Country = Sourced<CountryFields>;
pub type State = Sourced<StateFields>;
pub type City = Sourced<CityFields>;

#[derive(Debug, Clone, Deserialize)]
pub struct CountryFields {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub iso2: Option<String>,
    #[serde(default)]
    pub iso3: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phonecode: Option<String>,
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub currency_name: Option<String>,
    #[serde(default)]
    pub currency_symbol: Option<String>,
    #[serde(default)]
    pub native: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<i64>,
    #[serde(default)]
    pub subregion: Option<String>,
    #[serde(default)]
    pub subregion_id: Option<i64>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(rename = "emojiU", default)]
    pub emoji_u: Option<String>,
    #[serde(default)]
    pub timezones: Option<Value>,
    #[serde(default)]
    pub translations: Option<Value>,
}

impl CountryFields {
    pub fn has_timezones(&self) -> bool {
        matches!(&self.timezones, Some(Value::Array(items)) if !items.is_empty())
    }

    pub fn has_translations(&self) -> bool {
        matches!(&self.translations, Some(Value::Object(map)) if !map.is_empty())
    }

    /// Translation values in source order, used as extra search terms.
    pub fn translation_values(&self) -> Vec<String> {
        match &self.translations {
            Some(Value::Object(map)) => map
                .values()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl Record for Country {
    const KIND: &'static str = "country";
    const REQUIRED_FIELDS: &'static [&'static str] = &["id", "name"];

    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateFields {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub country_id: Option<i64>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default)]
    pub iso2: Option<String>,
    #[serde(default)]
    pub iso3166_2: Option<String>,
    #[serde(rename = "type", default)]
    pub state_type: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub latitude: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub longitude: Option<String>,
}

impl StateFields {
    pub fn has_coordinates(&self) -> bool {
        is_present(&self.latitude) && is_present(&self.longitude)
    }

    pub fn has_timezone(&self) -> bool {
        is_present(&self.timezone)
    }
}

impl Record for State {
    const KIND: &'static str = "state";
    const REQUIRED_FIELDS: &'static [&'static str] = &["id", "name", "country_id"];

    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CityFields {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state_id: Option<i64>,
    #[serde(default)]
    pub state_code: Option<String>,
    #[serde(default)]
    pub state_name: Option<String>,
    #[serde(default)]
    pub country_id: Option<i64>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub country_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub latitude: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub longitude: Option<String>,
    #[serde(rename = "wikiDataId", default)]
    pub wiki_data_id: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl CityFields {
    pub fn has_coordinates(&self) -> bool {
        is_present(&self.latitude) && is_present(&self.longitude)
    }

    pub fn has_wikidata(&self) -> bool {
        is_present(&self.wiki_data_id)
    }

    pub fn has_timezone(&self) -> bool {
        is_present(&self.timezone)
    }
}

impl Record for City {
    const KIND: &'static str = "city";
    const REQUIRED_FIELDS: &'static [&'static str] = &["id", "name", "state_id", "country_id"];

    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Non-empty optional text.
pub fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(serde_json::Number),
}

/// Accepts `"12.5"`, `12.5` or `null`; numbers keep their textual form.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<TextOrNumber>::deserialize(deserializer)?.map(|value| match value {
            TextOrNumber::Text(text) => text,
            TextOrNumber::Number(number) => number.to_string(),
        }),
    )
}
