use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The eight cell texts of one classification row. Cells missing from a short
/// row (e.g. a `colspan` footer) are `None`.
pub type ReportCells = [Option<String>; 8];

/// A race classification row exactly as scraped, one per table row, before any
/// cleansing. This is the shape of the `spider/` cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceReportRow {
    #[serde(rename = "Pos")]
    pub position: Option<String>,
    #[serde(rename = "DriverNumber")]
    pub driver_number: Option<String>,
    #[serde(rename = "Driver")]
    pub driver: Option<String>,
    #[serde(rename = "Constructor")]
    pub constructor: Option<String>,
    #[serde(rename = "Laps")]
    pub laps: Option<String>,
    #[serde(rename = "Time/Retired")]
    pub time_or_retired: Option<String>,
    #[serde(rename = "Grid")]
    pub grid: Option<String>,
    #[serde(rename = "Points")]
    pub points: Option<String>,
    #[serde(rename = "RaceNumber")]
    pub race_number: u32,
    #[serde(rename = "Season")]
    pub season: i32,
    #[serde(rename = "RaceName")]
    pub race_name: String,
}

impl RaceReportRow {
    pub fn from_cells(cells: ReportCells, race: &RaceRef) -> Self {
        let [
            position,
            driver_number,
            driver,
            constructor,
            laps,
            time_or_retired,
            grid,
            points,
        ] = cells;

        Self {
            position,
            driver_number,
            driver,
            constructor,
            laps,
            time_or_retired,
            grid,
            points,
            race_number: race.race_number,
            season: race.season,
            race_name: race.race_name.clone(),
        }
    }
}

/// Identifies one race report page once its title has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceRef {
    pub season: i32,
    pub race_number: u32,
    pub race_name: String,
}

impl Display for RaceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} #{} {}",
            self.season, self.race_number, self.race_name
        )
    }
}

/// A report link discovered on a season page, tagged with its race number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLink {
    pub race_number: u32,
    pub url: String,
}

/// A cleansed race result, ready to be joined.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceResultRecord {
    pub position: Option<String>,
    pub driver_number: i64,
    pub driver: String,
    pub constructor: String,
    pub laps: Option<u32>,
    pub time_or_retired: Option<String>,
    pub grid: Option<String>,
    pub points: Option<f64>,
    pub race_number: u32,
    pub season: i32,
    pub race_name: String,
}

/// One pit stop as published by the results API. The column names are those of
/// the raw `pitstops/` cache files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitStopEvent {
    #[serde(rename = "piloto")]
    pub driver_id: String,
    #[serde(rename = "parada")]
    pub stop: u32,
    #[serde(rename = "vuelta")]
    pub lap: u32,
    #[serde(rename = "hora")]
    pub time: String,
    #[serde(rename = "duracion")]
    pub duration: Option<String>,
    #[serde(rename = "anno")]
    pub season: i32,
    #[serde(rename = "carrera")]
    pub race_number: u32,
}

/// Permanent number used when a driver has none assigned.
pub const UNASSIGNED_NUMBER: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverEntry {
    pub number: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverIdentity {
    pub driver_id: String,
    pub number: i32,
    pub name: String,
}

/// Per-driver pit-stop summary for one race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitStopAggregate {
    #[serde(rename = "driverId")]
    pub driver_id: String,
    #[serde(rename = "DriverNumber")]
    pub driver_number: i32,
    #[serde(rename = "Driver")]
    pub driver: String,
    #[serde(rename = "NPitstops")]
    pub pit_stops: u32,
    #[serde(rename = "MedianPitStopDuration")]
    pub median_duration: Option<f64>,
    #[serde(rename = "Season")]
    pub season: i32,
    #[serde(rename = "RaceNumber")]
    pub race_number: u32,
}

/// Row of the final dataset: a race result, a pit-stop aggregate, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedDatasetRow {
    #[serde(rename = "Pos")]
    pub position: Option<String>,
    #[serde(rename = "DriverNumber")]
    pub driver_number: Option<i64>,
    #[serde(rename = "Driver")]
    pub driver: String,
    #[serde(rename = "Constructor")]
    pub constructor: Option<String>,
    #[serde(rename = "Laps")]
    pub laps: Option<u32>,
    #[serde(rename = "Time/Retired")]
    pub time_or_retired: Option<String>,
    #[serde(rename = "Grid")]
    pub grid: Option<String>,
    #[serde(rename = "Points")]
    pub points: Option<f64>,
    #[serde(rename = "RaceNumber")]
    pub race_number: u32,
    #[serde(rename = "Season")]
    pub season: i32,
    #[serde(rename = "RaceName")]
    pub race_name: Option<String>,
    #[serde(rename = "driverId")]
    pub driver_id: Option<String>,
    #[serde(rename = "PitStopDriverNumber")]
    pub pit_stop_driver_number: Option<i32>,
    #[serde(rename = "NPitstops")]
    pub pit_stops: Option<u32>,
    #[serde(rename = "MedianPitStopDuration")]
    pub median_duration: Option<f64>,
}

impl MergedDatasetRow {
    pub fn has_result(&self) -> bool {
        self.constructor.is_some()
    }

    pub fn has_pit_stops(&self) -> bool {
        self.pit_stops.is_some()
    }
}
