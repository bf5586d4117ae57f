//! Descriptive statistics over the loaded snapshot.

use serde::Serialize;
use std::collections::HashMap;

use crate::group::distinct;
use crate::store::RecordStore;

const TOP_N: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct CountryStats {
    pub total: usize,
    pub regions: usize,
    pub subregions: usize,
    pub currencies: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateStats {
    pub total: usize,
    pub types: Vec<String>,
    pub timezones: usize,
    pub with_coordinates: usize,
    pub coordinates_coverage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CityStats {
    pub total: usize,
    pub countries: usize,
    pub with_wikidata: usize,
    pub wikidata_coverage: f64,
    pub with_coordinates: usize,
    pub coordinates_coverage: f64,
    pub timezones: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Distribution {
    pub top_countries_by_cities: Vec<(String, usize)>,
    pub top_countries_by_states: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataAnalysis {
    pub countries: CountryStats,
    pub states: StateStats,
    pub cities: CityStats,
    pub distribution: Distribution,
}

/// Share of `part` in `total` as a percentage with one decimal.
pub fn coverage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Largest groups first; ties keep name order so the result is stable.
fn top_counts<'a, I>(names: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in names.into_iter().flatten() {
        *counts.entry(name).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(TOP_N)
        .map(|(name, count)| (name.to_string(), count))
        .collect()
}

pub fn analyze(store: &RecordStore) -> DataAnalysis {
    let countries = &store.countries;
    let states = &store.states;
    let cities = &store.cities;

    let states_with_coords = states.iter().filter(|s| s.has_coordinates()).count();
    let cities_with_wikidata = cities.iter().filter(|c| c.has_wikidata()).count();
    let cities_with_coords = cities.iter().filter(|c| c.has_coordinates()).count();

    DataAnalysis {
        countries: CountryStats {
            total: countries.len(),
            regions: distinct(countries.iter().map(|c| c.region.as_deref())).len(),
            subregions: distinct(countries.iter().map(|c| c.subregion.as_deref())).len(),
            currencies: distinct(countries.iter().map(|c| c.currency.as_deref())).len(),
        },
        states: StateStats {
            total: states.len(),
            types: distinct(states.iter().map(|s| s.state_type.as_deref()))
                .into_iter()
                .map(str::to_string)
                .collect(),
            timezones: distinct(states.iter().map(|s| s.timezone.as_deref())).len(),
            with_coordinates: states_with_coords,
            coordinates_coverage: coverage(states_with_coords, states.len()),
        },
        cities: CityStats {
            total: cities.len(),
            countries: distinct(cities.iter().map(|c| c.country_name.as_deref())).len(),
            with_wikidata: cities_with_wikidata,
            wikidata_coverage: coverage(cities_with_wikidata, cities.len()),
            with_coordinates: cities_with_coords,
            coordinates_coverage: coverage(cities_with_coords, cities.len()),
            timezones: distinct(cities.iter().map(|c| c.timezone.as_deref())).len(),
        },
        distribution: Distribution {
            top_countries_by_cities: top_counts(cities.iter().map(|c| c.country_name.as_deref())),
            top_countries_by_states: top_counts(states.iter().map(|s| s.country_name.as_deref())),
        },
    }
}

impl DataAnalysis {
    pub fn log(&self) {
        let c = &self.countries;
        tracing::info!(
            "Countries: {} total, {} regions, {} subregions, {} currencies",
            c.total,
            c.regions,
            c.subregions,
            c.currencies
        );
        let s = &self.states;
        tracing::info!(
            "States: {} total, {} types, {} timezones, {} with coordinates ({:.1}%)",
            s.total,
            s.types.len(),
            s.timezones,
            s.with_coordinates,
            s.coordinates_coverage
        );
        let ci = &self.cities;
        tracing::info!(
            "Cities: {} total, {} with WikiData ({:.1}%), {} with coordinates ({:.1}%), {} timezones",
            ci.total,
            ci.with_wikidata,
            ci.wikidata_coverage,
            ci.with_coordinates,
            ci.coordinates_coverage,
            ci.timezones
        );
        let fmt_top = |top: &[(String, usize)]| {
            top.iter()
                .map(|(name, count)| format!("{name} ({count})"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        tracing::info!(
            "Top countries by cities: {}",
            fmt_top(&self.distribution.top_countries_by_cities)
        );
        tracing::info!(
            "Top countries by states: {}",
            fmt_top(&self.distribution.top_countries_by_states)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> RecordStore {
        let cities = (0..7)
            .map(|i| {
                let country = if i < 4 { "Big" } else if i < 6 { "Mid" } else { "Small" };
                serde_json::from_value(json!({
                    "id": 100 + i,
                    "name": format!("City {i}"),
                    "state_id": 10,
                    "country_id": 1,
                    "country_name": country,
                    "wikiDataId": if i % 2 == 0 { "Q1" } else { "" },
                    "latitude": "1.0",
                    "longitude": "2.0",
                }))
                .unwrap()
            })
            .collect();
        RecordStore {
            countries: vec![
                serde_json::from_value(
                    json!({"id": 1, "name": "A", "region": "Asia", "subregion": "", "currency": "AFN"}),
                )
                .unwrap(),
                serde_json::from_value(json!({"id": 2, "name": "B", "region": "Asia"})).unwrap(),
            ],
            states: vec![
                serde_json::from_value(
                    json!({"id": 10, "name": "S", "country_id": 1, "type": "province", "timezone": "Asia/Kabul"}),
                )
                .unwrap(),
            ],
            cities,
        }
    }

    #[test]
    fn counts_distinct_values_ignoring_blanks() {
        let analysis = analyze(&store());
        assert_eq!(analysis.countries.total, 2);
        assert_eq!(analysis.countries.regions, 1);
        assert_eq!(analysis.countries.subregions, 0);
        assert_eq!(analysis.countries.currencies, 1);
        assert_eq!(analysis.states.types, vec!["province".to_string()]);
        assert_eq!(analysis.states.timezones, 1);
    }

    #[test]
    fn computes_coverage() {
        let analysis = analyze(&store());
        assert_eq!(analysis.cities.with_wikidata, 4);
        assert_eq!(analysis.cities.wikidata_coverage, 57.1);
        assert_eq!(analysis.cities.coordinates_coverage, 100.0);
        assert_eq!(coverage(0, 0), 0.0);
    }

    #[test]
    fn ranks_top_countries() {
        let analysis = analyze(&store());
        let top = &analysis.distribution.top_countries_by_cities;
        assert_eq!(top[0], ("Big".to_string(), 4));
        assert_eq!(top[1], ("Mid".to_string(), 2));
        assert_eq!(top[2], ("Small".to_string(), 1));
    }
}
