/// IHM tide API client
///
/// Parses the two JSON resources of the Hydrographic Institute API: the
/// directory of tide stations and the monthly list of tide extrema for one
/// station.
///
/// Directory: `{"estaciones": {"puertos": [{id, code, puerto, lat, lon}]}}`
/// Tides:     `{"mareas": {"datos": {"marea": [{fecha, hora, altura, tipo}]}}}`

use serde::Deserialize;

use super::{Fetcher, Scalar, render_url};
use crate::model::{Port, TideError, TideEvent};

/// Value of `tipo` that marks a high tide; anything else is a low tide.
pub const HIGH_TIDE_KIND: &str = "pleamar";

// ============================================================================
// IHM API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DirectoryResponse {
    pub estaciones: Stations,
}

#[derive(Debug, Deserialize)]
pub struct Stations {
    pub puertos: Vec<DirectoryEntry>,
}

/// One station of the directory.
#[derive(Debug, Deserialize)]
pub struct DirectoryEntry {
    pub id: Scalar,
    pub code: String,
    #[serde(rename = "puerto")]
    pub name: String,
    pub lat: Scalar,
    pub lon: Scalar,
}

#[derive(Debug, Deserialize)]
pub struct TideResponse {
    pub mareas: Tides,
}

#[derive(Debug, Deserialize)]
pub struct Tides {
    pub datos: TideData,
}

#[derive(Debug, Deserialize)]
pub struct TideData {
    #[serde(default)]
    pub marea: Vec<TideEntry>,
}

/// A single extremum as sent by the API.
#[derive(Debug, Deserialize)]
pub struct TideEntry {
    pub fecha: String, // YYYY-MM-DD
    pub hora: String,  // HH:MM
    pub altura: Scalar,
    pub tipo: String,
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse the station directory into ports.
pub fn parse_port_directory(body: &[u8]) -> Result<Vec<Port>, TideError> {
    let response: DirectoryResponse = serde_json::from_slice(body)?;

    response
        .estaciones
        .puertos
        .into_iter()
        .map(|entry| {
            Ok(Port {
                id: Some(entry.id.as_text()),
                code: entry.code.trim().to_string(),
                name: entry.name.trim().to_string(),
                latitude: Some(entry.lat.as_f64()?),
                longitude: Some(entry.lon.as_f64()?),
            })
        })
        .collect()
}

/// Parse a monthly tide list into events, in feed order.
pub fn parse_tide_response(body: &[u8]) -> Result<Vec<TideEvent>, TideError> {
    let response: TideResponse = serde_json::from_slice(body)?;

    response
        .mareas
        .datos
        .marea
        .iter()
        .map(|entry| {
            let is_high = entry.tipo.trim().eq_ignore_ascii_case(HIGH_TIDE_KIND);
            TideEvent::parse(&entry.fecha, &entry.hora, entry.altura.as_f64()?, Some(is_high))
        })
        .collect()
}

// ============================================================================
// API Client Functions
// ============================================================================

/// Fetch the station directory.
pub fn fetch_port_directory(fetcher: &dyn Fetcher, url: &str) -> Result<Vec<Port>, TideError> {
    let body = fetcher.fetch(url)?;
    parse_port_directory(&body)
}

/// Fetch the tide events of one port and month.
///
/// `template` may use `{port_id}`, `{port_code}`, `{year}` and `{month}`
/// (two digits).
pub fn fetch_month(
    fetcher: &dyn Fetcher,
    template: &str,
    port: &Port,
    year: i32,
    month: u32,
) -> Result<Vec<TideEvent>, TideError> {
    let port_id = port.id.as_deref().ok_or_else(|| {
        TideError::Config(format!("port '{}' has no id for the API feed", port.code))
    })?;
    let url = render_url(
        template,
        &[
            ("port_id", port_id),
            ("port_code", &port.code),
            ("year", &year.to_string()),
            ("month", &format!("{:02}", month)),
        ],
    );
    let body = fetcher.fetch(&url)?;
    parse_tide_response(&body)
}

// ============================================================================
// Tests
// ============================================================================
