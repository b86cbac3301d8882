//! Encyclopedia crawl: season pages to per-race result tables.

use futures::StreamExt;
use futures::stream::FuturesUnordered;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::parser::{parse_race_report, parse_season_report_links};
use crate::scraper::Fetch;
use crate::store::CacheStore;
use crate::table;
use crate::types::{RaceRef, ReportLink};

pub fn results_key(season: i32, race_name: &str) -> String {
    format!("spider/{}/{}.csv", season, race_name)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub seasons: usize,
    pub seasons_failed: usize,
    pub reports_saved: usize,
    pub reports_failed: usize,
    pub rows: usize,
}

impl CrawlStats {
    fn absorb(&mut self, other: CrawlStats) {
        self.seasons += other.seasons;
        self.seasons_failed += other.seasons_failed;
        self.reports_saved += other.reports_saved;
        self.reports_failed += other.reports_failed;
        self.rows += other.rows;
    }
}

impl std::fmt::Display for CrawlStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} season(s) crawled ({} failed), {} report(s) saved ({} failed), {} row(s)",
            self.seasons, self.seasons_failed, self.reports_saved, self.reports_failed, self.rows
        )
    }
}

pub struct SeasonCrawler<'a, F, S> {
    fetcher: &'a F,
    store: &'a S,
    config: &'a PipelineConfig,
}

impl<'a, F: Fetch, S: CacheStore> SeasonCrawler<'a, F, S> {
    pub fn new(fetcher: &'a F, store: &'a S, config: &'a PipelineConfig) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    /// Crawls every configured season. Report pages are fetched concurrently
    /// and a failing page never aborts the rest of the crawl.
    pub async fn crawl(&self) -> CrawlStats {
        let mut futs: FuturesUnordered<_> = self
            .config
            .seasons
            .seasons()
            .map(|season| async move { (season, self.crawl_season(season).await) })
            .collect();

        let mut stats = CrawlStats::default();
        while let Some((season, result)) = futs.next().await {
            match result {
                Ok(season_stats) => {
                    log::info!("Season {}: {}", season, season_stats);
                    stats.absorb(season_stats);
                }
                Err(e) => {
                    log::warn!("Failed to crawl season {}: {}", season, e);
                    stats.seasons_failed += 1;
                }
            }
        }
        stats
    }

    pub async fn crawl_season(&self, season: i32) -> Result<CrawlStats, PipelineError> {
        let url = self.config.season_page_url(season);
        log::info!("Fetching season page {}", url);

        let html = self.fetcher.fetch_page(&url).await?;
        let links: Vec<ReportLink> = parse_season_report_links(&html)?
            .into_iter()
            .map(|(race_number, href)| ReportLink {
                race_number,
                url: self.config.wiki_url(&href),
            })
            .collect();

        log::info!("Season {}: {} race report(s) found", season, links.len());

        let mut futs: FuturesUnordered<_> = links
            .iter()
            .map(|link| async move { (link, self.crawl_report(link).await) })
            .collect();

        let mut stats = CrawlStats {
            seasons: 1,
            ..Default::default()
        };
        while let Some((link, result)) = futs.next().await {
            match result {
                Ok((race, rows)) => {
                    log::debug!("Saved {} ({} rows)", race, rows);
                    stats.reports_saved += 1;
                    stats.rows += rows;
                }
                Err(e) => {
                    log::warn!("Skipping report {}: {}", link.url, e);
                    stats.reports_failed += 1;
                }
            }
        }
        Ok(stats)
    }

    /// Fetches one report page and caches its classification table.
    pub async fn crawl_report(&self, link: &ReportLink) -> Result<(RaceRef, usize), PipelineError> {
        let html = self.fetcher.fetch_page(&link.url).await?;
        let (race, rows) = parse_race_report(&html, link.race_number)?;

        self.store.put_table(
            &results_key(race.season, &race.race_name),
            &rows,
            table::COMMA,
        )?;
        Ok((race, rows.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeasonRange;
    use crate::scraper::stub::StubFetcher;
    use crate::store::MemoryStore;
    use crate::types::RaceReportRow;

    const SEASON_PAGE: &str = r#"<html><body>
        <table class="wikitable sortable">
          <tr><th>Round</th><th>Grand Prix</th><th>Pole position</th><th>Fastest lap</th><th>Winning driver</th><th>Winning constructor</th><th>Report</th></tr>
          <tr><th>1</th><td>Bahrain</td><td>a</td><td>b</td><td>c</td><td>d</td><td><a href="/wiki/2022_Bahrain_Grand_Prix">Report</a></td></tr>
          <tr><th>2</th><td>Saudi Arabia</td><td>a</td><td>b</td><td>c</td><td>d</td><td><a href="/wiki/2022_Saudi_Arabian_Grand_Prix">Report</a></td></tr>
          <tr><th>3</th><td>Australia</td><td>a</td><td>b</td><td>c</td><td>d</td><td><a href="/wiki/2022_Australian_Grand_Prix">Report</a></td></tr>
        </table>
    </body></html>"#;

    fn report(title: &str, class: &str) -> String {
        format!(
            r#"<html><head><title>{title}</title></head><body>
            <table class="{class}">
              <tr><th>Pos.</th><th>No.</th><th>Driver</th><th>Constructor</th><th>Laps</th><th>Time/Retired</th><th>Grid</th><th>Points</th></tr>
              <tr><td>1</td><td>16</td><td>Charles Leclerc</td><td>Ferrari</td><td>57</td><td>1:37:33.584</td><td>1</td><td>26 1</td></tr>
              <tr><td>2</td><td>55</td><td>Carlos Sainz Jr.</td><td>Ferrari</td><td>57</td><td>+5.598</td><td>3</td><td>18</td></tr>
              <tr><td colspan="8">Fastest lap: Charles Leclerc</td></tr>
            </table></body></html>"#
        )
    }

    fn fetcher() -> StubFetcher {
        StubFetcher::new()
            .with_page(
                "https://en.wikipedia.org/wiki/2022_Formula_One_World_Championship",
                SEASON_PAGE,
            )
            .with_page(
                "https://en.wikipedia.org/wiki/2022_Bahrain_Grand_Prix",
                report("2022 Bahrain Grand Prix - Wikipedia", "wikitable sortable"),
            )
            .with_page(
                "https://en.wikipedia.org/wiki/2022_Saudi_Arabian_Grand_Prix",
                // No sortable table: the page is skipped.
                report("2022 Saudi Arabian Grand Prix - Wikipedia", "wikitable"),
            )
    }

    #[tokio::test]
    async fn test_crawl_season_skips_failing_reports() {
        let fetcher = fetcher();
        let store = MemoryStore::new();
        let config = PipelineConfig {
            seasons: SeasonRange::single(2022),
            ..Default::default()
        };

        let stats = SeasonCrawler::new(&fetcher, &store, &config).crawl().await;

        assert_eq!(
            stats,
            CrawlStats {
                seasons: 1,
                seasons_failed: 0,
                reports_saved: 1,
                reports_failed: 2,
                rows: 3,
            }
        );
        assert_eq!(
            store.list("spider/").unwrap(),
            vec!["spider/2022/Bahrain Grand Prix.csv"]
        );

        let rows: Vec<RaceReportRow> = store
            .get_table("spider/2022/Bahrain Grand Prix.csv", table::COMMA)
            .unwrap()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].driver.as_deref(), Some("Charles Leclerc"));
        assert_eq!(rows[0].points.as_deref(), Some("26 1"));
        assert_eq!(rows[0].race_number, 1);
        assert_eq!(rows[0].season, 2022);
        assert_eq!(rows[0].race_name, "Bahrain Grand Prix");
        assert_eq!(rows[2].position.as_deref(), Some("Fastest lap: Charles Leclerc"));
        assert_eq!(rows[2].constructor, None);
    }

    #[tokio::test]
    async fn test_missing_season_page_is_not_fatal() {
        let fetcher = fetcher();
        let store = MemoryStore::new();
        let config = PipelineConfig {
            seasons: SeasonRange::new(2021, 2022).unwrap(),
            ..Default::default()
        };

        let stats = SeasonCrawler::new(&fetcher, &store, &config).crawl().await;

        assert_eq!(stats.seasons, 1);
        assert_eq!(stats.seasons_failed, 1);
        assert_eq!(stats.reports_saved, 1);
    }

    #[tokio::test]
    async fn test_crawl_report_uses_the_title_season() {
        let fetcher = StubFetcher::new().with_page(
            "https://en.wikipedia.org/wiki/70th_Anniversary_Grand_Prix",
            report("70th Anniversary Grand Prix - Wikipedia", "wikitable sortable"),
        );
        let store = MemoryStore::new();
        let config = PipelineConfig::default();
        let crawler = SeasonCrawler::new(&fetcher, &store, &config);

        let link = ReportLink {
            race_number: 5,
            url: "https://en.wikipedia.org/wiki/70th_Anniversary_Grand_Prix".to_string(),
        };
        let (race, rows) = crawler.crawl_report(&link).await.unwrap();

        assert_eq!(race.season, 2020);
        assert_eq!(race.race_number, 5);
        assert_eq!(rows, 3);
        assert!(
            store
                .exists(&results_key(2020, "70th Anniversary Grand Prix"))
                .unwrap()
        );
    }
}
