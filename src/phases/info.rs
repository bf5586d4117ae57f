use anyhow::Result;
use serde::Serialize;
use serde_json::{Value, json};

use super::{Phase, PhaseContext, PhaseReport};
use crate::analyze::DataAnalysis;
use crate::emit::{Envelope, OutputFile};

/// `api-info.json`: headline statistics and the endpoint catalogue.
pub struct ApiInfoPhase;

#[derive(Debug, Serialize)]
struct Statistics<'a> {
    total_countries: usize,
    total_states: usize,
    total_cities: usize,
    regions: usize,
    subregions: usize,
    state_types: &'a [String],
    states_with_coordinates: usize,
    cities_with_wikidata: usize,
    cities_with_coordinates: usize,
}

impl<'a> From<&'a DataAnalysis> for Statistics<'a> {
    fn from(analysis: &'a DataAnalysis) -> Self {
        Self {
            total_countries: analysis.countries.total,
            total_states: analysis.states.total,
            total_cities: analysis.cities.total,
            regions: analysis.countries.regions,
            subregions: analysis.countries.subregions,
            state_types: &analysis.states.types,
            states_with_coordinates: analysis.states.with_coordinates,
            cities_with_wikidata: analysis.cities.with_wikidata,
            cities_with_coordinates: analysis.cities.with_coordinates,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiInfo<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<&'a str>,
    statistics: Statistics<'a>,
    data_analysis: &'a DataAnalysis,
    endpoints: Value,
}

fn endpoints() -> Value {
    json!({
        "countries": {
            "list": "countries.json",
            "individual": "countries/{iso2}.json",
            "by_region": "countries/region/{region-name}.json",
            "by_subregion": "countries/subregion/{subregion-name}.json",
            "regions_index": "countries/regions.json",
        },
        "states": {
            "all": "states/all.json",
            "by_country": "states/country/{country_iso2}.json",
            "individual": "states/{iso3166_2}.json",
            "by_type": "states/type/{type-name}.json",
            "types_index": "states/types.json",
            "by_timezone": "states/timezone/{timezone-name}.json",
            "timezones_index": "states/timezones.json",
        },
        "cities": {
            "by_country": "cities/country/{country_iso2}.json",
            "by_state": "cities/state/{state_iso3166_2}.json",
            "by_timezone": "cities/timezone/{timezone-name}.json",
            "batch": "cities/batch/batch-{start_id}-{end_id}.json",
            "batch_index": "cities/batches.json",
        },
        "search": {
            "countries": "search/countries.json",
            "states": "search/states.json",
            "cities": "search/cities.json",
            "combined": "search/combined.json",
        },
    })
}

impl Phase for ApiInfoPhase {
    fn name(&self) -> &'static str {
        "api-info"
    }

    fn generate(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        let info = ApiInfo {
            base_url: ctx.settings.cdn_base_url.as_deref(),
            statistics: ctx.analysis.into(),
            data_analysis: ctx.analysis,
            endpoints: endpoints(),
        };
        ctx.emit(
            report,
            Envelope::new("api_info", &info).map(|env| OutputFile::new("api-info.json", env)),
        )
    }
}
