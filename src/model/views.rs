//! Field projections for the listing documents.
//!
//! Detail documents carry the whole record; every list or group file carries
//! one of these borrowed views instead.

use super::{City, Country, State};
use serde::Serialize;

/// Projection with a published field list (reported in `meta.fields_included`).
pub trait Projection {
    const FIELDS: &'static [&'static str];
}

#[derive(Debug, Serialize)]
pub struct CountryListItem<'a> {
    pub id: i64,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso2: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phonecode: Option<&'a str>,
}

impl Projection for CountryListItem<'_> {
    const FIELDS: &'static [&'static str] = &["id", "name", "iso2", "phonecode"];
}

impl<'a> From<&'a Country> for CountryListItem<'a> {
    fn from(country: &'a Country) -> Self {
        Self {
            id: country.id,
            name: &country.name,
            iso2: country.iso2.as_deref(),
            phonecode: country.phonecode.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CountryRegionItem<'a> {
    pub id: i64,
    pub name: &'a str,
    pub iso2: Option<&'a str>,
    pub iso3: Option<&'a str>,
    pub capital: Option<&'a str>,
    pub currency: Option<&'a str>,
    pub currency_symbol: Option<&'a str>,
    pub subregion: Option<&'a str>,
    pub emoji: Option<&'a str>,
    #[serde(rename = "emojiU")]
    pub emoji_u: Option<&'a str>,
}

impl<'a> From<&'a Country> for CountryRegionItem<'a> {
    fn from(country: &'a Country) -> Self {
        Self {
            id: country.id,
            name: &country.name,
            iso2: country.iso2.as_deref(),
            iso3: country.iso3.as_deref(),
            capital: country.capital.as_deref(),
            currency: country.currency.as_deref(),
            currency_symbol: country.currency_symbol.as_deref(),
            subregion: country.subregion.as_deref(),
            emoji: country.emoji.as_deref(),
            emoji_u: country.emoji_u.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CountrySubregionItem<'a> {
    pub id: i64,
    pub name: &'a str,
    pub iso2: Option<&'a str>,
    pub iso3: Option<&'a str>,
    pub capital: Option<&'a str>,
    pub currency: Option<&'a str>,
    pub region: Option<&'a str>,
    pub emoji: Option<&'a str>,
    #[serde(rename = "emojiU")]
    pub emoji_u: Option<&'a str>,
}

impl<'a> From<&'a Country> for CountrySubregionItem<'a> {
    fn from(country: &'a Country) -> Self {
        Self {
            id: country.id,
            name: &country.name,
            iso2: country.iso2.as_deref(),
            iso3: country.iso3.as_deref(),
            capital: country.capital.as_deref(),
            currency: country.currency.as_deref(),
            region: country.region.as_deref(),
            emoji: country.emoji.as_deref(),
            emoji_u: country.emoji_u.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StateListItem<'a> {
    pub id: i64,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso2: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso3166_2: Option<&'a str>,
}

impl Projection for StateListItem<'_> {
    const FIELDS: &'static [&'static str] = &["id", "name", "iso2", "iso3166_2"];
}

impl<'a> From<&'a State> for StateListItem<'a> {
    fn from(state: &'a State) -> Self {
        Self {
            id: state.id,
            name: &state.name,
            iso2: state.iso2.as_deref(),
            iso3166_2: state.iso3166_2.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StateTypeItem<'a> {
    pub id: i64,
    pub name: &'a str,
    pub country_id: Option<i64>,
    pub country_code: Option<&'a str>,
    pub country_name: Option<&'a str>,
    pub iso2: Option<&'a str>,
    pub latitude: Option<&'a str>,
    pub longitude: Option<&'a str>,
    pub timezone: Option<&'a str>,
}

impl<'a> From<&'a State> for StateTypeItem<'a> {
    fn from(state: &'a State) -> Self {
        Self {
            id: state.id,
            name: &state.name,
            country_id: state.country_id,
            country_code: state.country_code.as_deref(),
            country_name: state.country_name.as_deref(),
            iso2: state.iso2.as_deref(),
            latitude: state.latitude.as_deref(),
            longitude: state.longitude.as_deref(),
            timezone: state.timezone.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StateTimezoneItem<'a> {
    pub id: i64,
    pub name: &'a str,
    pub country_id: Option<i64>,
    pub country_code: Option<&'a str>,
    pub country_name: Option<&'a str>,
    #[serde(rename = "type")]
    pub state_type: Option<&'a str>,
    pub latitude: Option<&'a str>,
    pub longitude: Option<&'a str>,
}

impl<'a> From<&'a State> for StateTimezoneItem<'a> {
    fn from(state: &'a State) -> Self {
        Self {
            id: state.id,
            name: &state.name,
            country_id: state.country_id,
            country_code: state.country_code.as_deref(),
            country_name: state.country_name.as_deref(),
            state_type: state.state_type.as_deref(),
            latitude: state.latitude.as_deref(),
            longitude: state.longitude.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CityListItem<'a> {
    pub id: i64,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<&'a str>,
    #[serde(rename = "wikiDataId", skip_serializing_if = "Option::is_none")]
    pub wiki_data_id: Option<&'a str>,
}

impl Projection for CityListItem<'_> {
    const FIELDS: &'static [&'static str] = &["id", "name", "latitude", "longitude", "wikiDataId"];
}

impl<'a> From<&'a City> for CityListItem<'a> {
    fn from(city: &'a City) -> Self {
        Self {
            id: city.id,
            name: &city.name,
            latitude: city.latitude.as_deref(),
            longitude: city.longitude.as_deref(),
            wiki_data_id: city.wiki_data_id.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CityTimezoneItem<'a> {
    pub id: i64,
    pub name: &'a str,
    pub state_name: Option<&'a str>,
    pub country_name: Option<&'a str>,
    pub latitude: Option<&'a str>,
    pub longitude: Option<&'a str>,
    #[serde(rename = "wikiDataId")]
    pub wiki_data_id: Option<&'a str>,
}

impl<'a> From<&'a City> for CityTimezoneItem<'a> {
    fn from(city: &'a City) -> Self {
        Self {
            id: city.id,
            name: &city.name,
            state_name: city.state_name.as_deref(),
            country_name: city.country_name.as_deref(),
            latitude: city.latitude.as_deref(),
            longitude: city.longitude.as_deref(),
            wiki_data_id: city.wiki_data_id.as_deref(),
        }
    }
}

/// Convert a group of records into one projection.
pub fn project<'a, T, P>(records: &[&'a T]) -> Vec<P>
where
    P: From<&'a T>,
{
    records.iter().map(|record| P::from(*record)).collect()
}
