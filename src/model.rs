/// Core data types for the tide table generator.
///
/// This module defines the shared domain model imported by all other modules:
/// raw tide events as delivered by the feeds, the yearly coefficient table,
/// and the day-grouped documents written for the client app.
/// It contains no I/O.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

/// Date format used for coefficient keys and document day keys.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time-of-day format used by both feeds and by the output documents.
pub const TIME_FORMAT: &str = "%H:%M";

/// Hour at which a tide switches from the morning to the evening coefficient.
pub const EVENING_FROM_HOUR: u32 = 12;

// ---------------------------------------------------------------------------
// Port identity
// ---------------------------------------------------------------------------

/// A tide-gauge station as listed by the port directory.
///
/// The legacy feed only knows a port by its code, so the numeric id and
/// coordinates are optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub id: Option<String>,
    pub code: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Port {
    /// A port known only by its code (legacy registry entries).
    pub fn from_code(code: &str) -> Self {
        Port {
            id: None,
            code: code.to_string(),
            name: code.to_string(),
            latitude: None,
            longitude: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw events
// ---------------------------------------------------------------------------

/// One observed tide extremum. Immutable once parsed from a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct TideEvent {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub height_meters: f64,
    /// `None` when the feed carries no high/low indicator.
    pub is_high_tide: Option<bool>,
}

impl TideEvent {
    /// Parses `date` (`YYYY-MM-DD`) and `time` (`HH:MM`) into an event.
    pub fn parse(
        date: &str,
        time: &str,
        height_meters: f64,
        is_high_tide: Option<bool>,
    ) -> Result<Self, TideError> {
        let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
            .map_err(|e| TideError::Parse(format!("invalid date '{}': {}", date, e)))?;
        let time = NaiveTime::parse_from_str(time.trim(), TIME_FORMAT)
            .map_err(|e| TideError::Parse(format!("invalid time '{}': {}", time, e)))?;
        Ok(TideEvent { date, time, height_meters, is_high_tide })
    }
}

// ---------------------------------------------------------------------------
// Coefficients
// ---------------------------------------------------------------------------

/// Semi-monthly tide coefficients keyed by `YYYY-MM-DD`.
///
/// Each entry normally holds `[morning, evening]`. The table is built once
/// per year and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoefficientTable {
    entries: BTreeMap<String, Vec<f64>>,
}

/// On-disk shape of `coefficients.json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CoefficientsFile {
    pub coefficients: CoefficientTable,
}

impl CoefficientTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` to the entry for `key`, creating it if needed.
    pub fn push(&mut self, key: String, value: f64) {
        self.entries.entry(key).or_default().push(value);
    }

    pub fn insert(&mut self, date: NaiveDate, morning: f64, evening: f64) {
        self.entries
            .insert(date.format(DATE_FORMAT).to_string(), vec![morning, evening]);
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.entries.get(key).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<f64>)> {
        self.entries.iter()
    }

    /// Returns the coefficient that applies to a tide on `date` at `time`:
    /// the morning value before noon, the evening value from noon on.
    pub fn coefficient_at(&self, date: NaiveDate, time: NaiveTime) -> Result<f64, TideError> {
        let key = date.format(DATE_FORMAT).to_string();
        let slot = if time.hour() < EVENING_FROM_HOUR { 0 } else { 1 };
        self.entries
            .get(&key)
            .and_then(|values| values.get(slot))
            .copied()
            .ok_or(TideError::MissingCoefficient { date: key, slot })
    }

    /// Real calendar dates of `year` that lack a full morning/evening pair.
    pub fn incomplete_dates(&self, year: i32) -> Vec<NaiveDate> {
        let Some(start) = NaiveDate::from_ymd_opt(year, 1, 1) else {
            return Vec::new();
        };
        start
            .iter_days()
            .take_while(|d| d.year() == year)
            .filter(|d| {
                self.entries
                    .get(&d.format(DATE_FORMAT).to_string())
                    .is_none_or(|v| v.len() != 2)
            })
            .collect()
    }

    /// Loads a table from the `{"coefficients": {...}}` document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, TideError> {
        let file: CoefficientsFile = serde_json::from_slice(bytes)?;
        Ok(file.coefficients)
    }
}

// ---------------------------------------------------------------------------
// Grouped output
// ---------------------------------------------------------------------------

/// A tide event annotated with its coefficient, as written for the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedTide {
    pub meters: f64,
    pub time: String,
    pub coefficient: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_tide: Option<bool>,
}

/// The tides of a single calendar day, keyed by ordinal position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTideGroup {
    pub first_tide: AnnotatedTide,
    pub second_tide: AnnotatedTide,
    pub third_tide: AnnotatedTide,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fourth_tide: Option<AnnotatedTide>,
}

impl DayTideGroup {
    pub fn tide_count(&self) -> usize {
        if self.fourth_tide.is_some() { 4 } else { 3 }
    }
}

/// The persisted artifact for one port and month. Day keys are flattened
/// next to the port metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortMonthDocument {
    pub port_id: Option<String>,
    pub port_code: String,
    pub port_name: String,
    pub month: u32,
    #[serde(flatten)]
    pub days: BTreeMap<NaiveDate, DayTideGroup>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching, grouping or persisting tide data.
#[derive(Debug)]
pub enum TideError {
    /// Non-2xx HTTP response from an upstream endpoint.
    Http { url: String, status: u16 },
    /// The request could not be completed at all.
    Transport(String),
    /// A payload, date, time or number could not be parsed.
    Parse(String),
    /// The payload parsed but violates the structure grouping relies on.
    MalformedFeed(String),
    /// No coefficient for the date (slot 0 = morning, 1 = evening).
    MissingCoefficient { date: String, slot: usize },
    /// One or two events were left over after the last full day.
    IncompleteTrailingGroup { remaining: usize },
    /// The coefficient PDF could not be read.
    Pdf(String),
    /// Invalid configuration.
    Config(String),
    /// Reading or writing a local file failed.
    Io(String),
}

impl std::fmt::Display for TideError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TideError::Http { url, status } => write!(f, "HTTP error: {} for {}", status, url),
            TideError::Transport(msg) => write!(f, "Transport error: {}", msg),
            TideError::Parse(msg) => write!(f, "Parse error: {}", msg),
            TideError::MalformedFeed(msg) => write!(f, "Malformed feed: {}", msg),
            TideError::MissingCoefficient { date, slot } => {
                let half = if *slot == 0 { "morning" } else { "evening" };
                write!(f, "No {} coefficient for {}", half, date)
            }
            TideError::IncompleteTrailingGroup { remaining } => {
                write!(f, "Incomplete trailing group: {} event(s) left over", remaining)
            }
            TideError::Pdf(msg) => write!(f, "PDF error: {}", msg),
            TideError::Config(msg) => write!(f, "Config error: {}", msg),
            TideError::Io(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for TideError {}

impl From<reqwest::Error> for TideError {
    fn from(e: reqwest::Error) -> Self {
        TideError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for TideError {
    fn from(e: serde_json::Error) -> Self {
        TideError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for TideError {
    fn from(e: std::io::Error) -> Self {
        TideError::Io(e.to_string())
    }
}

impl From<toml::de::Error> for TideError {
    fn from(e: toml::de::Error) -> Self {
        TideError::Config(e.to_string())
    }
}

impl From<lopdf::Error> for TideError {
    fn from(e: lopdf::Error) -> Self {
        TideError::Pdf(e.to_string())
    }
}
