//! Fixed-size id batches so a static host can serve "city by id".
//!
//! Cities are sorted by id and cut into runs of `batch_size`. Each run is
//! named after the smallest and largest id it holds; a client finds the
//! right file with a range search over `cities/batches.json`.

use serde::Serialize;

use crate::model::City;

pub const BATCH_DIR: &str = "cities/batch";

/// One contiguous, id-sorted run of cities.
#[derive(Debug)]
pub struct CityBatch<'a> {
    pub start_id: i64,
    pub end_id: i64,
    pub cities: Vec<&'a City>,
}

impl CityBatch<'_> {
    pub fn filename(&self) -> String {
        format!("batch-{}-{}.json", self.start_id, self.end_id)
    }

    /// Path relative to the output root.
    pub fn path(&self) -> String {
        format!("{}/{}", BATCH_DIR, self.filename())
    }

    pub fn entry(&self) -> BatchIndexEntry {
        BatchIndexEntry {
            filename: self.path(),
            start_id: self.start_id,
            end_id: self.end_id,
            count: self.cities.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchIndexEntry {
    pub filename: String,
    pub start_id: i64,
    pub end_id: i64,
    pub count: usize,
}

/// Cut `cities` into id-ordered batches of at most `batch_size`.
///
/// Gaps in the id sequence are fine: a batch covers whatever ids fall
/// between its first and last member.
pub fn plan_batches(cities: &[City], batch_size: usize) -> Vec<CityBatch<'_>> {
    let mut sorted: Vec<&City> = cities.iter().collect();
    sorted.sort_by_key(|city| city.id);

    sorted
        .chunks(batch_size.max(1))
        .filter_map(|chunk| {
            let (first, last) = (chunk.first()?, chunk.last()?);
            Some(CityBatch {
                start_id: first.id,
                end_id: last.id,
                cities: chunk.to_vec(),
            })
        })
        .collect()
}
