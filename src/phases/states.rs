use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;

use super::{Phase, PhaseContext, PhaseReport};
use crate::denorm::CountryFacts;
use crate::emit::{Envelope, OutputFile};
use crate::group::{distinct, distinct_sorted, group_by, group_key, sort_by_name};
use crate::model::State;
use crate::model::views::{StateListItem, StateTimezoneItem, StateTypeItem, project};
use crate::sanitize::{safe_filename, timezone_filename};

/// Per-country lists, per-state details, and the type/timezone groups.
pub struct StatesPhase;

#[derive(Debug, Serialize)]
struct TypeEntry<'a> {
    #[serde(rename = "type")]
    state_type: &'a str,
    state_count: usize,
    country_count: usize,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct TimezoneEntry<'a> {
    timezone: &'a str,
    state_count: usize,
    country_count: usize,
    endpoint: String,
}

fn type_path(state_type: &str) -> String {
    format!("states/type/{}.json", safe_filename(Some(state_type), "unknown"))
}

fn timezone_path(timezone: &str) -> String {
    format!("states/timezone/{}.json", timezone_filename(timezone))
}

fn country_count(states: &[&State]) -> usize {
    states
        .iter()
        .filter_map(|s| s.country_id)
        .collect::<HashSet<_>>()
        .len()
}

impl StatesPhase {
    fn by_country(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        let groups: Vec<(i64, Vec<&State>)> = group_by(&ctx.store.states, |s| s.country_id)
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
                format!("states/country/{stem}.json")
            },
            |(country_id, states)| {
                let country = ctx.lookup.country(Some(country_id));
                let items: Vec<StateListItem> = project(&states);
                Ok(Envelope::new("states", &items)?
                    .meta("country_id", country_id)
                    .meta_fields(&CountryFacts::of(country))?
                    .meta_opt("country_code", states[0].country_code.as_deref())
                    .meta("total_states", items.len())
                    .meta(
                        "types",
                        distinct(states.iter().map(|s| s.state_type.as_deref())),
                    )
                    .meta(
                        "timezones",
                        distinct(states.iter().map(|s| s.timezone.as_deref())),
                    ))
            },
        )
    }

    fn details(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        let all: Vec<&State> = ctx.store.states.iter().collect();
        ctx.emit_all(
            report,
            all,
            |state| {
                let stem = safe_filename(state.iso3166_2.as_deref(), &state.id.to_string());
                format!("states/{stem}.json")
            },
            |state| {
                let country = ctx.lookup.country(state.country_id);
                Ok(Envelope::new("state", state)?
                    .meta_fields(&CountryFacts::of(country))?
                    .meta("has_coordinates", state.has_coordinates())
                    .meta("has_timezone", state.has_timezone()))
            },
        )
    }

    fn by_type(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        let groups = group_by(&ctx.store.states, |s| group_key(s.state_type.as_deref()));

        let mut index: Vec<TypeEntry> = groups
            .iter()
            .map(|(&state_type, states)| TypeEntry {
                state_type,
                state_count: states.len(),
                country_count: country_count(states),
                endpoint: type_path(state_type),
            })
            .collect();
        index.sort_by(|a, b| b.state_count.cmp(&a.state_count));

        let groups: Vec<(&str, Vec<&State>)> = groups.into_iter().collect();
        ctx.emit_all(
            report,
            groups,
            |(state_type, _)| type_path(state_type),
            |(state_type, states)| {
                let items: Vec<StateTypeItem> = project(&states);
                Ok(Envelope::new("states_by_type", &items)?
                    .meta("type", state_type)
                    .meta("total_states", items.len())
                    .meta(
                        "countries",
                        distinct_sorted(states.iter().map(|s| s.country_name.as_deref())),
                    )
                    .meta(
                        "timezones",
                        distinct_sorted(states.iter().map(|s| s.timezone.as_deref())),
                    ))
            },
        )?;

        ctx.emit(
            report,
            Envelope::new("state_types_index", &index)
                .map(|env| OutputFile::new("states/types.json", env)),
        )
    }

    fn by_timezone(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        let groups = group_by(&ctx.store.states, |s| group_key(s.timezone.as_deref()));

        // BTreeMap order is already ascending by timezone
        let index: Vec<TimezoneEntry> = groups
            .iter()
            .map(|(&timezone, states)| TimezoneEntry {
                timezone,
                state_count: states.len(),
                country_count: country_count(states),
                endpoint: timezone_path(timezone),
            })
            .collect();

        let groups: Vec<(&str, Vec<&State>)> = groups.into_iter().collect();
        ctx.emit_all(
            report,
            groups,
            |(timezone, _)| timezone_path(timezone),
            |(timezone, states)| {
                let items: Vec<StateTimezoneItem> = project(&states);
                Ok(Envelope::new("states_by_timezone", &items)?
                    .meta("timezone", timezone)
                    .meta("total_states", items.len())
                    .meta(
                        "countries",
                        distinct_sorted(states.iter().map(|s| s.country_name.as_deref())),
                    )
                    .meta(
                        "types",
                        distinct_sorted(states.iter().map(|s| s.state_type.as_deref())),
                    ))
            },
        )?;

        ctx.emit(
            report,
            Envelope::new("state_timezones_index", &index)
                .map(|env| OutputFile::new("states/timezones.json", env)),
        )
    }

    fn all(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        let states = &ctx.store.states;
        let mut sorted: Vec<&State> = states.iter().collect();
        sort_by_name(&mut sorted);
        let items: Vec<StateListItem> = project(&sorted);

        let countries = distinct(states.iter().map(|s| s.country_name.as_deref())).len();
        let types = distinct(states.iter().map(|s| s.state_type.as_deref()));
        let timezones = distinct(states.iter().map(|s| s.timezone.as_deref())).len();

        ctx.emit(
            report,
            Envelope::new("all_states", &items).map(|env| {
                let env = env
                    .meta("total_states", items.len())
                    .meta("countries", countries)
                    .meta("types", types)
                    .meta("timezones", timezones);
                OutputFile::new("states/all.json", env)
            }),
        )
    }
}

impl Phase for StatesPhase {
    fn name(&self) -> &'static str {
        "states"
    }

    fn generate(&self, ctx: &PhaseContext<'_>, report: &mut PhaseReport) -> Result<()> {
        report.records_processed = ctx.store.states.len();

        let orphans = ctx
            .store
            .states
            .iter()
            .filter(|s| ctx.lookup.country(s.country_id).is_none())
            .count();
        if orphans > 0 {
            report.warn(
                ctx.mode(),
                format!("{orphans} states written without country details"),
            );
        }

        self.by_country(ctx, report)?;
        self.details(ctx, report)?;
        self.by_type(ctx, report)?;
        self.by_timezone(ctx, report)?;
        self.all(ctx, report)
    }
}
