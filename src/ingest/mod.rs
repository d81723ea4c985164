/// Data retrieval from the Hydrographic Institute (IHM).
///
/// Submodules:
/// - `ihm` — the JSON API: port directory and monthly tide lists.
/// - `legacy` — the older per-port JSON files (`hours` / `values`).
///
/// Everything goes through the `Fetcher` trait so the pipelines can run
/// against canned payloads in tests.

pub mod ihm;
pub mod legacy;

use std::time::Duration;

use serde::Deserialize;

use crate::model::TideError;

// ============================================================================
// Fetching
// ============================================================================

/// Fetch the raw bytes behind a URL.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TideError>;
}

/// Blocking HTTP fetcher backed by reqwest.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, TideError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tide_tables/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpFetcher { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TideError> {
        let response = self.client.get(url).send()?;

        if !response.status().is_success() {
            return Err(TideError::Http {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.bytes()?.to_vec())
    }
}

// ============================================================================
// Helpers shared by the feed parsers
// ============================================================================

/// Replaces `{name}` placeholders in a URL template.
///
/// # Example
/// `render_url("{code}_mes_{month}.json", &[("code", "vigo"), ("month", "05")])`
/// gives `"vigo_mes_05.json"`.
pub fn render_url(template: &str, params: &[(&str, &str)]) -> String {
    params.iter().fold(template.to_string(), |url, (name, value)| {
        url.replace(&format!("{{{}}}", name), value)
    })
}

/// A JSON scalar the IHM sends either as a number or as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Result<f64, TideError> {
        match self {
            Scalar::Number(n) => Ok(*n),
            Scalar::Text(s) => s
                .trim()
                .replace(',', ".")
                .parse()
                .map_err(|_| TideError::Parse(format!("'{}' is not a number", s))),
        }
    }

    /// Text form, with integral numbers printed without a fraction.
    pub fn as_text(&self) -> String {
        match self {
            Scalar::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(s) => s.trim().to_string(),
        }
    }
}
