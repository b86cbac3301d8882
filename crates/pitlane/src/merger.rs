//! Final dataset: scraped race results outer-joined with pit-stop aggregates
//! on (driver, season, race number).

use std::collections::BTreeMap;

use crate::error::PipelineError;
use crate::store::{CacheStore, StoreError};
use crate::table;
use crate::types::{
    MergedDatasetRow, PitStopAggregate, RaceReportRow, RaceResultRecord,
};

/// Display-name variants found in result tables and the name they stand for.
const CANONICAL_DRIVER_NAMES: &[(&str, &str)] = &[
    ("Carlos Sainz Jr. 2", "Carlos Sainz"),
    ("Carlos Sainz Jr.", "Carlos Sainz"),
    ("Nikita Mazepin [a]", "Nikita Mazepin"),
    ("Nikita Mazepin [b]", "Nikita Mazepin"),
    ("Nikita Mazepin [c]", "Nikita Mazepin"),
    ("Nikita Mazepin [d]", "Nikita Mazepin"),
    ("Nikita Mazepin [e]", "Nikita Mazepin"),
];

/// Position column values that mark the end of the classification proper.
const TABLE_END_MARKERS: &[&str] = &["Source", "Fastest"];

pub fn canonical_driver_name(name: &str) -> &str {
    CANONICAL_DRIVER_NAMES
        .iter()
        .find(|(variant, _)| *variant == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// Drops a footnote appended after a space, e.g. `"26 1"` becomes `"26"`.
pub fn strip_footnote(value: &str) -> &str {
    value.split(' ').next().unwrap_or(value)
}

/// Keeps the rows that precede the first "Source" or "Fastest lap" row.
pub fn truncate_at_table_end(mut rows: Vec<RaceReportRow>) -> Vec<RaceReportRow> {
    let end = rows
        .iter()
        .position(|row| {
            row.position
                .as_deref()
                .is_some_and(|pos| TABLE_END_MARKERS.iter().any(|m| pos.contains(m)))
        })
        .unwrap_or(rows.len());
    rows.truncate(end);
    rows
}

/// Turns a scraped row into a typed result. Rows without a constructor or a
/// numeric driver number are not race results and yield `None`.
pub fn cleanse_row(row: RaceReportRow) -> Option<RaceResultRecord> {
    let constructor = row.constructor?;
    let driver = canonical_driver_name(row.driver.as_deref()?).to_string();

    let driver_number = match row
        .driver_number
        .as_deref()
        .map(strip_footnote)
        .map(str::parse::<i64>)
    {
        Some(Ok(number)) => number,
        other => {
            log::warn!(
                "Dropping {} in {} {}: driver number {:?} is not an integer",
                driver,
                row.season,
                row.race_name,
                other
            );
            return None;
        }
    };

    Some(RaceResultRecord {
        position: row.position.as_deref().map(strip_footnote).map(str::to_string),
        driver_number,
        driver,
        constructor,
        laps: row.laps.as_deref().and_then(|laps| laps.trim().parse().ok()),
        time_or_retired: row.time_or_retired,
        grid: row.grid.as_deref().map(strip_footnote).map(str::to_string),
        points: row
            .points
            .as_deref()
            .and_then(|points| strip_footnote(points.trim()).parse().ok()),
        race_number: row.race_number,
        season: row.season,
        race_name: row.race_name,
    })
}

type JoinKey = (i32, u32, String);

/// Outer join on (season, race number, driver). Output is ordered by that key
/// so identical inputs always give identical output.
pub fn outer_join(
    results: Vec<RaceResultRecord>,
    aggregates: Vec<PitStopAggregate>,
) -> Vec<MergedDatasetRow> {
    let mut groups: BTreeMap<JoinKey, (Vec<RaceResultRecord>, Vec<PitStopAggregate>)> =
        BTreeMap::new();

    for result in results {
        let key = (result.season, result.race_number, result.driver.clone());
        groups.entry(key).or_default().0.push(result);
    }
    for aggregate in aggregates {
        let key = (aggregate.season, aggregate.race_number, aggregate.driver.clone());
        groups.entry(key).or_default().1.push(aggregate);
    }

    let mut rows = Vec::new();
    for ((season, race_number, driver), (results, aggregates)) in groups {
        let results: Vec<Option<RaceResultRecord>> = if results.is_empty() {
            vec![None]
        } else {
            results.into_iter().map(Some).collect()
        };
        let aggregates: Vec<Option<&PitStopAggregate>> = if aggregates.is_empty() {
            vec![None]
        } else {
            aggregates.iter().map(Some).collect()
        };

        for result in &results {
            for aggregate in &aggregates {
                rows.push(MergedDatasetRow {
                    position: result.as_ref().and_then(|r| r.position.clone()),
                    driver_number: result.as_ref().map(|r| r.driver_number),
                    driver: driver.clone(),
                    constructor: result.as_ref().map(|r| r.constructor.clone()),
                    laps: result.as_ref().and_then(|r| r.laps),
                    time_or_retired: result.as_ref().and_then(|r| r.time_or_retired.clone()),
                    grid: result.as_ref().and_then(|r| r.grid.clone()),
                    points: result.as_ref().and_then(|r| r.points),
                    race_number,
                    season,
                    race_name: result.as_ref().map(|r| r.race_name.clone()),
                    driver_id: aggregate.map(|a| a.driver_id.clone()),
                    pit_stop_driver_number: aggregate.map(|a| a.driver_number),
                    pit_stops: aggregate.map(|a| a.pit_stops),
                    median_duration: aggregate.and_then(|a| a.median_duration),
                });
            }
        }
    }
    rows
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub total: usize,
    pub matched: usize,
    pub results_only: usize,
    pub pit_stops_only: usize,
}

impl std::fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} row(s): {} matched, {} results only, {} pit stops only",
            self.total, self.matched, self.results_only, self.pit_stops_only
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedDataset {
    pub rows: Vec<MergedDatasetRow>,
}

impl MergedDataset {
    pub fn to_csv(&self) -> Result<Vec<u8>, StoreError> {
        table::encode(&self.rows, table::COMMA)
    }

    pub fn summary(&self) -> MergeSummary {
        let mut summary = MergeSummary {
            total: self.rows.len(),
            ..Default::default()
        };
        for row in &self.rows {
            match (row.has_result(), row.has_pit_stops()) {
                (true, true) => summary.matched += 1,
                (true, false) => summary.results_only += 1,
                _ => summary.pit_stops_only += 1,
            }
        }
        summary
    }
}

pub struct DatasetMerger<'a, S> {
    store: &'a S,
}

impl<'a, S: CacheStore> DatasetMerger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Every cleansed race result in the `spider/` cache.
    pub fn load_results(&self) -> Result<Vec<RaceResultRecord>, PipelineError> {
        let mut results = Vec::new();
        for key in self.store.list("spider/")? {
            if !key.ends_with(".csv") {
                continue;
            }
            let rows: Vec<RaceReportRow> = self
                .store
                .get_table(&key, table::COMMA)?
                .ok_or_else(|| StoreError::Missing(key.clone()))?;
            let before = rows.len();
            let cleansed: Vec<RaceResultRecord> = truncate_at_table_end(rows)
                .into_iter()
                .filter_map(cleanse_row)
                .collect();
            log::debug!("{}: kept {} of {} row(s)", key, cleansed.len(), before);
            results.extend(cleansed);
        }
        Ok(results)
    }

    /// Every pit-stop aggregate in the `processed/` cache.
    pub fn load_aggregates(&self) -> Result<Vec<PitStopAggregate>, PipelineError> {
        let mut aggregates = Vec::new();
        for key in self.store.list("processed/")? {
            if !key.ends_with(".csv") {
                continue;
            }
            let rows: Vec<PitStopAggregate> = self
                .store
                .get_table(&key, table::COMMA)?
                .ok_or_else(|| StoreError::Missing(key.clone()))?;
            aggregates.extend(rows);
        }
        Ok(aggregates)
    }

    pub fn merge(&self) -> Result<MergedDataset, PipelineError> {
        let results = self.load_results()?;
        let aggregates = self.load_aggregates()?;
        log::info!(
            "Merging {} race result(s) with {} pit-stop aggregate(s)",
            results.len(),
            aggregates.len()
        );

        Ok(MergedDataset {
            rows: outer_join(results, aggregates),
        })
    }
}
