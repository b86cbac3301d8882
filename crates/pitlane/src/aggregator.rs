//! Per-driver pit-stop summaries.

use crate::config::PipelineConfig;
use crate::duration::parse_duration;
use crate::error::PipelineError;
use crate::harvester::{PitStopHarvester, raw_pit_stops_prefix};
use crate::resolver::{DriverDirectory, LookupError};
use crate::scraper::Fetch;
use crate::store::CacheStore;
use crate::table;
use crate::types::{PitStopAggregate, PitStopEvent};

pub fn aggregate_key(season: i32, race_number: u32) -> String {
    format!(
        "processed/{}/pitstops_{}_{}.csv",
        season, season, race_number
    )
}

/// Median of the values, `None` when there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn duration_seconds(event: &PitStopEvent) -> Option<f64> {
    parse_duration(event.duration.as_deref()).unwrap_or_else(|e| {
        log::debug!(
            "Ignoring duration of {} stop {}: {}",
            event.driver_id,
            event.stop,
            e
        );
        None
    })
}

/// Summarizes the pit stops of one race, one row per driver in order of first
/// appearance. Durations that do not parse are left out of the median.
pub fn aggregate_race(
    events: &[PitStopEvent],
    directory: &DriverDirectory,
    season: i32,
    race_number: u32,
) -> Result<Vec<PitStopAggregate>, LookupError> {
    let mut drivers: Vec<&str> = Vec::new();
    for event in events {
        if !drivers.contains(&event.driver_id.as_str()) {
            drivers.push(&event.driver_id);
        }
    }

    drivers
        .into_iter()
        .map(|driver_id| {
            let identity = directory.lookup(driver_id)?;
            let stops: Vec<&PitStopEvent> =
                events.iter().filter(|e| e.driver_id == driver_id).collect();
            let durations: Vec<f64> = stops.iter().filter_map(|e| duration_seconds(e)).collect();

            Ok(PitStopAggregate {
                driver_id: identity.driver_id,
                driver_number: identity.number,
                driver: identity.name,
                pit_stops: stops.len() as u32,
                median_duration: median(&durations),
                season,
                race_number,
            })
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct AggregateStats {
    pub races: usize,
    pub rows: usize,
    /// Races that could not be summarized, with the reason.
    pub failed: Vec<(i32, u32, String)>,
}

impl std::fmt::Display for AggregateStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} race(s) aggregated into {} row(s), {} failed",
            self.races,
            self.rows,
            self.failed.len()
        )
    }
}

pub struct PitStopAggregator<'a, F, S> {
    harvester: PitStopHarvester<'a, F, S>,
    store: &'a S,
    config: &'a PipelineConfig,
    directory: &'a DriverDirectory,
}

impl<'a, F: Fetch, S: CacheStore> PitStopAggregator<'a, F, S> {
    pub fn new(
        fetcher: &'a F,
        store: &'a S,
        config: &'a PipelineConfig,
        directory: &'a DriverDirectory,
    ) -> Self {
        Self {
            harvester: PitStopHarvester::new(fetcher, store, config),
            store,
            config,
            directory,
        }
    }

    /// Harvests and summarizes every race of the configured seasons. Once a
    /// season is done its raw pit-stop tables are removed from the cache.
    pub async fn run(&self) -> Result<AggregateStats, PipelineError> {
        let mut stats = AggregateStats::default();

        for season in self.config.seasons.seasons() {
            for race_number in 1..=self.config.max_races_per_season {
                let events = self
                    .harvester
                    .harvest(season, race_number, true)
                    .await?;
                if events.is_empty() {
                    continue;
                }

                match aggregate_race(&events, self.directory, season, race_number) {
                    Ok(rows) => {
                        self.store.put_table(
                            &aggregate_key(season, race_number),
                            &rows,
                            table::COMMA,
                        )?;
                        stats.races += 1;
                        stats.rows += rows.len();
                    }
                    Err(e) => {
                        log::error!("Season {} race {}: {}", season, race_number, e);
                        stats.failed.push((season, race_number, e.to_string()));
                    }
                }
            }

            let removed = self.store.delete_prefix(&raw_pit_stops_prefix(season))?;
            log::debug!("Season {}: removed {} raw pit-stop table(s)", season, removed);
        }

        log::info!("{}", stats);
        Ok(stats)
    }
}
