/// Legacy per-port JSON feed
///
/// Before the API, the IHM published one file per port and month with two
/// parallel arrays: `hours` (`"YYYY-MM-DD HH:MM"`) and `values` (heights in
/// meters). There is no high/low indicator, so events from this feed carry
/// `is_high_tide: None`.

use serde::Deserialize;

use super::{Fetcher, Scalar, render_url};
use crate::model::{Port, TideError, TideEvent};

#[derive(Debug, Deserialize)]
pub struct LegacyMonth {
    pub hours: Vec<String>,
    pub values: Vec<Scalar>,
}

/// Parse a legacy month file into events, in feed order.
pub fn parse_month(body: &[u8]) -> Result<Vec<TideEvent>, TideError> {
    let month: LegacyMonth = serde_json::from_slice(body)?;

    if month.hours.len() != month.values.len() {
        return Err(TideError::MalformedFeed(format!(
            "{} hours but {} values",
            month.hours.len(),
            month.values.len()
        )));
    }

    month
        .hours
        .iter()
        .zip(&month.values)
        .map(|(stamp, value)| {
            let (date, time) = stamp
                .trim()
                .split_once(' ')
                .ok_or_else(|| TideError::Parse(format!("timestamp '{}' has no time", stamp)))?;
            TideEvent::parse(date, time, value.as_f64()?, None)
        })
        .collect()
}

/// Fetch the events of one port and month.
///
/// `template` may use `{port_code}`, `{year}` and `{month}` (two digits).
pub fn fetch_month(
    fetcher: &dyn Fetcher,
    template: &str,
    port: &Port,
    year: i32,
    month: u32,
) -> Result<Vec<TideEvent>, TideError> {
    let url = render_url(
        template,
        &[
            ("port_code", &port.code),
            ("year", &year.to_string()),
            ("month", &format!("{:02}", month)),
        ],
    );
    let body = fetcher.fetch(&url)?;
    parse_month(&body)
}
