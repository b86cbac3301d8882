//! Pit-stop harvesting from the results API.
//!
//! The pit-stop resource of a race is paged by index with no "last page"
//! marker. Pages are requested one after another until a page yields no
//! `<PitStop/>` tag. An error body also yields no tag, so a failing page ends
//! the harvest the same way an exhausted resource does.

use crate::config::{PipelineConfig, SeasonRange};
use crate::error::PipelineError;
use crate::parser::parse_pit_stop_lines;
use crate::scraper::Fetch;
use crate::store::CacheStore;
use crate::table;
use crate::types::PitStopEvent;

pub fn raw_pit_stops_key(season: i32, race_number: u32) -> String {
    format!("pitstops/{}/{}_{}.csv", season, season, race_number)
}

pub fn raw_pit_stops_prefix(season: i32) -> String {
    format!("pitstops/{}/", season)
}

pub fn combined_pit_stops_key(range: &SeasonRange) -> String {
    format!("pitstops_{}.csv", range.cache_label())
}

pub struct PitStopHarvester<'a, F, S> {
    fetcher: &'a F,
    store: &'a S,
    config: &'a PipelineConfig,
}

impl<'a, F: Fetch, S: CacheStore> PitStopHarvester<'a, F, S> {
    pub fn new(fetcher: &'a F, store: &'a S, config: &'a PipelineConfig) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    /// Returns the pit stops of one race, from the cache unless the config asks
    /// for a refresh. Freshly fetched events are cached when `persist` is set
    /// and at least one event was found.
    pub async fn harvest(
        &self,
        season: i32,
        race_number: u32,
        persist: bool,
    ) -> Result<Vec<PitStopEvent>, PipelineError> {
        let key = raw_pit_stops_key(season, race_number);

        if !self.config.refresh
            && let Some(events) = self.store.get_table::<PitStopEvent>(&key, table::SEMICOLON)?
        {
            log::debug!("Using cached pit stops {}", key);
            return Ok(events);
        }

        let mut events = Vec::new();
        let mut page = 1;
        loop {
            let url = self.config.pit_stop_page_url(season, race_number, page);
            let body = self.fetcher.fetch_body(&url).await?;
            let found = parse_pit_stop_lines(&body, season, race_number);
            log::debug!("{}: {} pit stop(s)", url, found.len());

            if found.is_empty() {
                break;
            }
            events.extend(found);
            page += 1;
        }

        log::info!(
            "Season {} race {}: {} pit stop(s) fetched",
            season,
            race_number,
            events.len()
        );

        if persist && !events.is_empty() {
            self.store.put_table(&key, &events, table::SEMICOLON)?;
        }

        Ok(events)
    }

    /// Harvests every race of every configured season, caching each race.
    /// With `combined`, all events are also written to a single range-keyed
    /// table. Returns the number of events seen.
    pub async fn harvest_range(&self, combined: bool) -> Result<usize, PipelineError> {
        let range = &self.config.seasons;
        let mut all = Vec::new();
        let mut total = 0;

        for season in range.seasons() {
            for race_number in 1..=self.config.max_races_per_season {
                let events = self.harvest(season, race_number, true).await?;
                total += events.len();
                if combined {
                    all.extend(events);
                }
            }
        }

        if combined {
            let key = combined_pit_stops_key(range);
            log::info!("Writing {} pit stop(s) to {}", all.len(), key);
            self.store.put_table(&key, &all, table::SEMICOLON)?;
        }

        Ok(total)
    }
}
