use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use crate::types::{PitStopEvent, RaceRef, RaceReportRow, ReportCells, UNASSIGNED_NUMBER};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("No results table found for {0}")]
    MissingTable(String),
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
    #[error("Invalid driver document: {0}")]
    InvalidDocument(String),
}

static RE_TITLE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}").expect("invalid regex: title year"));

static RE_PIT_STOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<PitStop driverId="(\w+)" stop="(\d+)" lap="(\d+)" time="(\d+:\d+:\d+)" duration="([\d:|]+\d+\.\d+)"/>"#,
    )
    .expect("invalid regex: pit stop")
});

static RE_DRIVER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<Driver driverId="(\w+)""#).expect("invalid regex: driver id"));

static RE_PERMANENT_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<PermanentNumber>(\d+)</PermanentNumber>")
        .expect("invalid regex: permanent number")
});

/// Season assumed for report pages whose title carries no year. Only the 70th
/// Anniversary Grand Prix (2020) is titled that way.
pub const UNDATED_TITLE_SEASON: i32 = 2020;

const TITLE_SUFFIX: &str = " - Wikipedia";

/// The two flavours of classification table found on race report pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableClass {
    /// `class="wikitable"`; the first such table is the classification.
    Plain,
    /// `class="wikitable sortable"`; the last such table is the classification.
    Sortable,
}

impl TableClass {
    fn selector(self) -> Selector {
        match self {
            TableClass::Plain => Selector::parse(r#"table[class="wikitable"]"#).unwrap(),
            TableClass::Sortable => {
                Selector::parse(r#"table[class="wikitable sortable"]"#).unwrap()
            }
        }
    }

    fn flipped(self) -> Self {
        match self {
            TableClass::Plain => TableClass::Sortable,
            TableClass::Sortable => TableClass::Plain,
        }
    }
}

/// Which table holds the race classification in a given season. Races named
/// in `exceptions` use the other class.
struct SeasonTableRule {
    season: i32,
    default: TableClass,
    exceptions: &'static [&'static str],
}

const SEASON_TABLE_RULES: &[SeasonTableRule] = &[
    SeasonTableRule {
        season: 2012,
        default: TableClass::Plain,
        exceptions: &["Spanish Grand Prix"],
    },
    SeasonTableRule {
        season: 2013,
        default: TableClass::Plain,
        exceptions: &["Malaysian Grand Prix", "British Grand Prix"],
    },
    SeasonTableRule {
        season: 2014,
        default: TableClass::Sortable,
        exceptions: &[
            "Abu Dhabi Grand Prix",
            "Australian Grand Prix",
            "Austrian Grand Prix",
            "Chinese Grand Prix",
            "German Grand Prix",
            "Hungarian Grand Prix",
            "Malaysian Grand Prix",
            "Russian Grand Prix",
        ],
    },
    SeasonTableRule {
        season: 2015,
        default: TableClass::Plain,
        exceptions: &[],
    },
    SeasonTableRule {
        season: 2016,
        default: TableClass::Plain,
        exceptions: &[],
    },
    SeasonTableRule {
        season: 2017,
        default: TableClass::Plain,
        exceptions: &[
            "Chinese Grand Prix",
            "Bahrain Grand Prix",
            "Spanish Grand Prix",
            "Monaco Grand Prix",
            "Canadian Grand Prix",
            "Azerbaijan Grand Prix",
            "Austrian Grand Prix",
            "British Grand Prix",
        ],
    },
];

/// Resolves the table class holding the classification of `race_name`.
pub fn table_class_for(season: i32, race_name: &str) -> TableClass {
    match SEASON_TABLE_RULES.iter().find(|rule| rule.season == season) {
        Some(rule) if rule.exceptions.contains(&race_name) => rule.default.flipped(),
        Some(rule) => rule.default,
        None => TableClass::Sortable,
    }
}

/// Picks the race classification table out of a report page.
pub fn select_results_table<'a>(
    document: &'a Html,
    season: i32,
    race_name: &str,
) -> Option<ElementRef<'a>> {
    let class = table_class_for(season, race_name);
    let selector = class.selector();
    let mut candidates = document.select(&selector);
    match class {
        TableClass::Plain => candidates.next(),
        TableClass::Sortable => candidates.last(),
    }
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn row_cells<'a>(row: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "td" | "th"))
}

/// Flattens a classification table into rows of eight cell texts, skipping the
/// header row. Empty cells and cells beyond the eighth column are dropped.
pub fn extract_race_rows(table: ElementRef) -> Vec<ReportCells> {
    let row_selector = Selector::parse("tr").unwrap();

    table
        .select(&row_selector)
        .skip(1)
        .map(|row| {
            let mut cells: ReportCells = Default::default();
            for (slot, cell) in cells.iter_mut().zip(row_cells(row)) {
                let text = cell_text(cell);
                if !text.is_empty() {
                    *slot = Some(text);
                }
            }
            cells
        })
        .collect()
}

/// Reads the season and race name from a report page title such as
/// `2019 Australian Grand Prix - Wikipedia`.
pub fn parse_report_title(document: &Html) -> Result<(i32, String), ParseError> {
    let title_selector = Selector::parse("title").unwrap();
    let title = document
        .select(&title_selector)
        .next()
        .map(|elem| elem.text().collect::<String>())
        .ok_or_else(|| ParseError::MissingField("title".to_string()))?;
    let title = title.trim();

    let season = RE_TITLE_YEAR
        .find(title)
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .unwrap_or(UNDATED_TITLE_SEASON);

    let prefix = format!("{} ", season);
    let race_name = title.strip_prefix(&prefix).unwrap_or(title);
    let race_name = race_name.strip_suffix(TITLE_SUFFIX).unwrap_or(race_name);

    Ok((season, race_name.trim().to_string()))
}

/// Parses a whole race report page into scraped rows tagged with `race_number`.
pub fn parse_race_report(
    html: &str,
    race_number: u32,
) -> Result<(RaceRef, Vec<RaceReportRow>), ParseError> {
    let document = Html::parse_document(html);
    let (season, race_name) = parse_report_title(&document)?;
    let race = RaceRef {
        season,
        race_number,
        race_name,
    };

    let table = select_results_table(&document, race.season, &race.race_name)
        .ok_or_else(|| ParseError::MissingTable(race.to_string()))?;

    let rows = extract_race_rows(table)
        .into_iter()
        .map(|cells| RaceReportRow::from_cells(cells, &race))
        .collect();

    Ok((race, rows))
}

/// Finds the season's "Grands Prix" table and returns the report link of every
/// row that has one, numbered from 1 in row order. Rows without a link do not
/// consume a race number.
pub fn parse_season_report_links(html: &str) -> Result<Vec<(u32, String)>, ParseError> {
    let document = Html::parse_document(html);
    let th_selector = Selector::parse("th").unwrap();
    let row_selector = Selector::parse("tr").unwrap();

    let table = document
        .select(&TableClass::Sortable.selector())
        .find(|table| {
            table
                .select(&th_selector)
                .flat_map(|th| th.text())
                .any(|text| text.trim() == "Report")
        })
        .ok_or_else(|| ParseError::MissingTable("season page".to_string()))?;

    let mut links = Vec::new();
    let mut race_number = 1;

    for row in table.select(&row_selector).skip(1) {
        let href = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|cell| cell.value().name() == "td")
            .nth(5)
            .and_then(|cell| {
                cell.children()
                    .filter_map(ElementRef::wrap)
                    .find(|child| child.value().name() == "a")
            })
            .and_then(|a| a.value().attr("href"));

        if let Some(href) = href {
            links.push((race_number, href.to_string()));
            race_number += 1;
        }
    }

    Ok(links)
}

/// Scans one page of the pit-stop resource for `<PitStop .../>` tags.
pub fn parse_pit_stop_lines(body: &str, season: i32, race_number: u32) -> Vec<PitStopEvent> {
    body.lines()
        .filter_map(|line| RE_PIT_STOP.captures(line))
        .filter_map(|caps| {
            Some(PitStopEvent {
                driver_id: caps[1].to_string(),
                stop: caps[2].parse().ok()?,
                lap: caps[3].parse().ok()?,
                time: caps[4].to_string(),
                duration: Some(caps[5].to_string()),
                season,
                race_number,
            })
        })
        .collect()
}

/// Scans a season driver list for driver ids and their permanent numbers.
///
/// The number, when present, sits on the line right after the driver tag; a
/// driver whose next line carries no number gets [`UNASSIGNED_NUMBER`].
pub fn parse_driver_list(body: &str) -> Vec<(String, i32)> {
    let mut drivers = Vec::new();
    let mut pending: Option<String> = None;

    for line in body.lines() {
        match pending.take() {
            None => {
                if let Some(caps) = RE_DRIVER_ID.captures(line) {
                    pending = Some(caps[1].to_string());
                }
            }
            Some(driver_id) => {
                let number = RE_PERMANENT_NUMBER
                    .captures(line)
                    .and_then(|caps| caps[1].parse().ok())
                    .unwrap_or(UNASSIGNED_NUMBER);
                drivers.push((driver_id, number));
            }
        }
    }

    drivers
}

#[derive(Debug, Deserialize)]
struct DriverDocument {
    #[serde(rename = "MRData")]
    mr_data: DriverData,
}

#[derive(Debug, Deserialize)]
struct DriverData {
    #[serde(rename = "DriverTable")]
    driver_table: DriverTable,
}

#[derive(Debug, Deserialize)]
struct DriverTable {
    #[serde(rename = "Drivers")]
    drivers: Vec<DriverName>,
}

/// Name fields exactly as the driver detail document stores them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverName {
    pub given_name: String,
    pub family_name: String,
}

pub fn parse_driver_detail(json: &str) -> Result<DriverName, ParseError> {
    let document: DriverDocument =
        serde_json::from_str(json).map_err(|e| ParseError::InvalidDocument(e.to_string()))?;
    document
        .mr_data
        .driver_table
        .drivers
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::MissingField("Drivers[0]".to_string()))
}
