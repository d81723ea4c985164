/// Batch driver: reference data first, then every port × month.
///
/// The coefficient table is fully built before any tide is grouped and only
/// borrowed afterwards. Each port-month is an independent unit of work: a
/// failure is logged and counted, and the batch moves on.

use serde::Serialize;

use crate::analysis::groupings::group_month;
use crate::coefficients::{self, pdf};
use crate::config::{Config, Feed};
use crate::ingest::{Fetcher, ihm, legacy, render_url};
use crate::logging::{self, Source};
use crate::model::{CoefficientTable, Port, TideError, TideEvent};
use crate::output::{self, Sink, COEFFICIENTS_PATH, PORTS_PATH};
use crate::ports;

/// How many incomplete coefficient dates to spell out in the warning.
const INCOMPLETE_DATES_SHOWN: usize = 5;

// ---------------------------------------------------------------------------
// Output shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PortRecord<'a> {
    id: Option<&'a str>,
    code: &'a str,
    name: &'a str,
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Debug, Serialize)]
struct PortsDocument<'a> {
    ports: Vec<PortRecord<'a>>,
}

#[derive(Debug, Serialize)]
struct CoefficientsDocument<'a> {
    coefficients: &'a CoefficientTable,
}

// ---------------------------------------------------------------------------
// Batch results
// ---------------------------------------------------------------------------

/// Outcome counts of a tide batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub written: usize,
    /// `(port_code, month, error message)` for every failed unit.
    pub failures: Vec<(String, u32, String)>,
    /// Events discarded as incomplete trailing groups, across the batch.
    pub dropped_events: usize,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Everything one run needs, borrowed for its duration.
pub struct Pipeline<'a> {
    pub config: &'a Config,
    pub fetcher: &'a dyn Fetcher,
    pub sink: &'a dyn Sink,
    pub year: i32,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, fetcher: &'a dyn Fetcher, sink: &'a dyn Sink) -> Self {
        Pipeline { config, fetcher, sink, year: config.target_year() }
    }

    // -----------------------------------------------------------------------
    // Setup
    // -----------------------------------------------------------------------

    /// The ports to process: the API directory, or the static registry for
    /// the legacy feed.
    pub fn load_ports(&self) -> Result<Vec<Port>, TideError> {
        let ports = match self.config.feed {
            Feed::Api => ihm::fetch_port_directory(self.fetcher, &self.config.urls.port_directory)?,
            Feed::Legacy => ports::legacy_ports(),
        };
        logging::info(Source::Ports, None, &format!("{} ports to process", ports.len()));
        Ok(ports)
    }

    /// Builds the coefficient table from the configured file, or from the
    /// year's PDF.
    pub fn load_coefficients(&self) -> Result<CoefficientTable, TideError> {
        let table = match &self.config.coefficients_file {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .map_err(|e| TideError::Io(format!("{}: {}", path.display(), e)))?;
                CoefficientTable::from_json(&bytes)?
            }
            None => {
                let url = render_url(
                    &self.config.urls.coefficients_pdf,
                    &[("year", &self.year.to_string())],
                );
                let bytes = self.fetcher.fetch(&url)?;
                let grid = pdf::extract_table(&bytes)?;
                coefficients::extract_coefficients(&grid, self.year)?
            }
        };

        let incomplete = table.incomplete_dates(self.year);
        if !incomplete.is_empty() {
            let shown: Vec<String> = incomplete
                .iter()
                .take(INCOMPLETE_DATES_SHOWN)
                .map(|d| d.to_string())
                .collect();
            logging::warn(
                Source::Coefficients,
                None,
                &format!(
                    "{} date(s) of {} lack a morning/evening pair (first: {}); check the table layout",
                    incomplete.len(),
                    self.year,
                    shown.join(", ")
                ),
            );
        }
        logging::info(
            Source::Coefficients,
            None,
            &format!("{} coefficient dates loaded for {}", table.len(), self.year),
        );
        Ok(table)
    }

    /// Writes `ports.json` and `coefficients.json`.
    pub fn write_reference_data(
        &self,
        ports: &[Port],
        coefficients: &CoefficientTable,
    ) -> Result<(), TideError> {
        let document = PortsDocument {
            ports: ports
                .iter()
                .map(|p| PortRecord {
                    id: p.id.as_deref(),
                    code: &p.code,
                    name: &p.name,
                    lat: p.latitude,
                    lng: p.longitude,
                })
                .collect(),
        };
        output::persist_json(self.sink, &document, PORTS_PATH)?;
        output::persist_json(self.sink, &CoefficientsDocument { coefficients }, COEFFICIENTS_PATH)?;
        logging::info(Source::Output, None, "reference data written");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tides
    // -----------------------------------------------------------------------

    fn fetch_events(&self, port: &Port, month: u32) -> Result<Vec<TideEvent>, TideError> {
        match self.config.feed {
            Feed::Api => {
                ihm::fetch_month(self.fetcher, &self.config.urls.api_tides, port, self.year, month)
            }
            Feed::Legacy => legacy::fetch_month(
                self.fetcher,
                &self.config.urls.legacy_tides,
                port,
                self.year,
                month,
            ),
        }
    }

    /// Fetches, groups and persists one port-month. Returns the number of
    /// trailing events that were dropped.
    pub fn process_port_month(
        &self,
        port: &Port,
        month: u32,
        coefficients: &CoefficientTable,
    ) -> Result<usize, TideError> {
        let events = self.fetch_events(port, month)?;
        let grouping = group_month(&events, coefficients, self.config.trailing_policy)?;
        let dropped = grouping.dropped;
        if dropped > 0 {
            logging::warn(
                Source::Tides,
                Some(&port.code),
                &format!("month {:02}: dropped {} trailing event(s)", month, dropped),
            );
        }

        let document = grouping.into_document(port, month);
        output::persist_json(self.sink, &document, &output::tides_path(self.year, &port.code, month))?;
        logging::debug(
            Source::Tides,
            Some(&port.code),
            &format!("month {:02}: {} days written", month, document.days.len()),
        );
        Ok(dropped)
    }

    /// Runs every port × month, isolating failures.
    pub fn run_tides(&self, ports: &[Port], coefficients: &CoefficientTable) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for port in ports {
            for month in 1..=12 {
                summary.total += 1;
                match self.process_port_month(port, month, coefficients) {
                    Ok(dropped) => {
                        summary.written += 1;
                        summary.dropped_events += dropped;
                    }
                    Err(e) => {
                        logging::log_port_month_failure(&port.code, month, &e);
                        summary.failures.push((port.code.clone(), month, e.to_string()));
                    }
                }
            }
        }

        logging::log_batch_summary(
            Source::Tides,
            summary.total,
            summary.written,
            summary.failures.len(),
        );
        summary
    }

    /// Full run: setup (fatal on failure), then the tide batch.
    pub fn run(&self) -> Result<BatchSummary, TideError> {
        logging::info(Source::System, None, &format!("generating tide tables for {}", self.year));
        let ports = self.load_ports()?;
        let coefficients = self.load_coefficients()?;
        self.write_reference_data(&ports, &coefficients)?;
        Ok(self.run_tides(&ports, &coefficients))
    }
}
