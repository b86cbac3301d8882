use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// The original dataset covers these seasons.
pub const FIRST_SEASON: i32 = 2012;
pub const LAST_SEASON: i32 = 2023;

/// Race numbers probed per season when harvesting pit stops.
pub const MAX_RACES_PER_SEASON: u32 = 24;

#[derive(Debug, thiserror::Error)]
pub enum SeasonRangeError {
    #[error("Start season ({start}) cannot be after end season ({end})")]
    Inverted { start: i32, end: i32 },
    #[error("Invalid season range '{0}'. Expected START..END, e.g. 2012..2023")]
    Malformed(String),
}

/// Inclusive range of championship seasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeasonRange {
    start: i32,
    end: i32,
}

impl SeasonRange {
    pub fn new(start: i32, end: i32) -> Result<Self, SeasonRangeError> {
        if start > end {
            return Err(SeasonRangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(season: i32) -> Self {
        Self {
            start: season,
            end: season,
        }
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn seasons(&self) -> RangeInclusive<i32> {
        self.start..=self.end
    }

    /// Suffix used by range-keyed cache entries, e.g. `2012_2023`.
    pub fn cache_label(&self) -> String {
        format!("{}_{}", self.start, self.end)
    }
}

impl Default for SeasonRange {
    fn default() -> Self {
        Self {
            start: FIRST_SEASON,
            end: LAST_SEASON,
        }
    }
}

impl FromStr for SeasonRange {
    type Err = SeasonRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SeasonRangeError::Malformed(s.to_string());
        match s.split_once("..") {
            Some((start, end)) => {
                let start = start.trim().parse().map_err(|_| malformed())?;
                let end = end.trim_start_matches('=').trim().parse().map_err(|_| malformed())?;
                Self::new(start, end)
            }
            None => s.trim().parse().map(Self::single).map_err(|_| malformed()),
        }
    }
}

impl Display for SeasonRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Knobs shared by every stage of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub seasons: SeasonRange,
    pub wiki_base_url: String,
    pub api_base_url: String,
    pub max_races_per_season: u32,
    /// Ignore cached pit stops and driver mappings and fetch them again.
    pub refresh: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seasons: SeasonRange::default(),
            wiki_base_url: crate::WIKI_BASE_URL.to_string(),
            api_base_url: crate::API_BASE_URL.to_string(),
            max_races_per_season: MAX_RACES_PER_SEASON,
            refresh: false,
        }
    }
}

impl PipelineConfig {
    pub fn season_page_url(&self, season: i32) -> String {
        format!(
            "{}/wiki/{}_Formula_One_World_Championship",
            self.wiki_base_url.trim_end_matches('/'),
            season
        )
    }

    pub fn pit_stop_page_url(&self, season: i32, race_number: u32, page: u32) -> String {
        format!(
            "{}/{}/{}/pitstops/{}",
            self.api_base_url.trim_end_matches('/'),
            season,
            race_number,
            page
        )
    }

    pub fn driver_list_url(&self, season: i32) -> String {
        format!(
            "{}/{}/drivers",
            self.api_base_url.trim_end_matches('/'),
            season
        )
    }

    pub fn driver_detail_url(&self, driver_id: &str) -> String {
        format!(
            "{}/drivers/{}.json",
            self.api_base_url.trim_end_matches('/'),
            driver_id
        )
    }

    /// Resolves a link found on an encyclopedia page against the site root.
    pub fn wiki_url(&self, href: &str) -> String {
        if href.starts_with("http") {
            href.to_string()
        } else if let Some(rest) = href.strip_prefix("//") {
            format!("https://{}", rest)
        } else {
            format!("{}{}", self.wiki_base_url.trim_end_matches('/'), href)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_range_covers_original_seasons() {
        let range = SeasonRange::default();
        assert_eq!(range.seasons().count(), 12);
        assert_eq!(range.cache_label(), "2012_2023");
        assert_eq!(range.seasons().next(), Some(FIRST_SEASON));
        assert_eq!(range.seasons().last(), Some(LAST_SEASON));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        assert!(matches!(
            SeasonRange::new(2020, 2019),
            Err(SeasonRangeError::Inverted { .. })
        ));
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(
            "2014..2016".parse::<SeasonRange>().unwrap(),
            SeasonRange::new(2014, 2016).unwrap()
        );
        assert_eq!(
            "2014..=2016".parse::<SeasonRange>().unwrap(),
            SeasonRange::new(2014, 2016).unwrap()
        );
        assert_eq!("2021".parse::<SeasonRange>().unwrap(), SeasonRange::single(2021));
        assert!("twenty..2021".parse::<SeasonRange>().is_err());
    }

    #[test]
    fn test_urls() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.season_page_url(2019),
            "https://en.wikipedia.org/wiki/2019_Formula_One_World_Championship"
        );
        assert_eq!(
            config.pit_stop_page_url(2019, 3, 1),
            "https://ergast.com/api/f1/2019/3/pitstops/1"
        );
        assert_eq!(
            config.driver_list_url(2019),
            "https://ergast.com/api/f1/2019/drivers"
        );
        assert_eq!(
            config.driver_detail_url("zhou"),
            "https://ergast.com/api/f1/drivers/zhou.json"
        );
        assert_eq!(
            config.wiki_url("/wiki/2019_Australian_Grand_Prix"),
            "https://en.wikipedia.org/wiki/2019_Australian_Grand_Prix"
        );
    }
}
