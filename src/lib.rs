//! Yearly tide table generator for the IHM harbor stations.
//!
//! Fetches tide extrema and the coefficient table for the year, groups the
//! extrema into days of three or four tides annotated with their
//! coefficient, and writes one JSON document per port and month.

pub mod analysis;
pub mod coefficients;
pub mod config;
pub mod driver;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod output;
pub mod ports;
