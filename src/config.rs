/// Run configuration.
///
/// Read from `tide_tables.toml` (or the file named by `TIDE_TABLES_CONFIG`),
/// then overridden by environment variables, which may come from a `.env`
/// file. Every field has a default, so a missing config file is fine.

use std::path::{Path, PathBuf};

use chrono::Datelike;
use serde::Deserialize;

use crate::analysis::groupings::IncompleteTrailingGroupPolicy;
use crate::logging::LogLevel;
use crate::model::TideError;

pub const DEFAULT_CONFIG_PATH: &str = "tide_tables.toml";

pub const ENV_CONFIG: &str = "TIDE_TABLES_CONFIG";
pub const ENV_YEAR: &str = "TIDE_TABLES_YEAR";
pub const ENV_OUTPUT_DIR: &str = "TIDE_TABLES_OUTPUT_DIR";

/// Which IHM feed serves the tide events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    /// JSON API with a port directory and high/low flags.
    #[default]
    Api,
    /// Per-port `hours`/`values` files addressed by port code.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Urls {
    pub port_directory: String,
    pub api_tides: String,
    pub legacy_tides: String,
    pub coefficients_pdf: String,
}

impl Default for Urls {
    fn default() -> Self {
        Urls {
            port_directory: "https://ideihm.covam.es/api-ihm/getmarea?request=getlist&format=json"
                .to_string(),
            api_tides: "https://ideihm.covam.es/api-ihm/getmarea?request=gettide&id={port_id}&format=json&month={year}{month}"
                .to_string(),
            legacy_tides: "https://armada.defensa.gob.es/ihm/Documentacion/Mareas//json/{year}/{port_code}/{port_code}_mes_{month}.json"
                .to_string(),
            coefficients_pdf: "https://armada.defensa.gob.es/ihm/Documentacion/Mareas/coeficientes/coeficientes_{year}.pdf"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: LogLevel::Info, file: None, timestamps: false }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Target year; the current year when unset.
    pub year: Option<i32>,
    /// Root directory the documents are written under.
    pub output_dir: PathBuf,
    pub feed: Feed,
    pub urls: Urls,
    /// Pre-supplied `coefficients.json`. When set, the PDF is not fetched.
    pub coefficients_file: Option<PathBuf>,
    pub trailing_policy: IncompleteTrailingGroupPolicy,
    pub http_timeout_secs: u64,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            year: None,
            output_dir: PathBuf::from("public"),
            feed: Feed::default(),
            urls: Urls::default(),
            coefficients_file: None,
            trailing_policy: IncompleteTrailingGroupPolicy::default(),
            http_timeout_secs: 30,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, TideError> {
        Ok(toml::from_str(text)?)
    }

    /// The year to generate, falling back to the local current year.
    pub fn target_year(&self) -> i32 {
        self.year.unwrap_or_else(|| chrono::Local::now().year())
    }

    /// Applies overrides from a variable lookup (normally `std::env::var`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), TideError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(year) = lookup(ENV_YEAR) {
            let year = year
                .trim()
                .parse()
                .map_err(|_| TideError::Config(format!("{}='{}' is not a year", ENV_YEAR, year)))?;
            self.year = Some(year);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        Ok(())
    }
}

/// Loads the configuration file if it exists, then applies environment
/// overrides. `.env` is read first when present.
pub fn load_config() -> Result<Config, TideError> {
    dotenv::dotenv().ok();

    let path = std::env::var(ENV_CONFIG).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = load_config_file(Path::new(&path))?;
    config.apply_overrides(|name| std::env::var(name).ok())?;
    Ok(config)
}

/// Reads a config file; a missing file yields the defaults.
pub fn load_config_file(path: &Path) -> Result<Config, TideError> {
    match std::fs::read_to_string(path) {
        Ok(text) => Config::from_toml(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(TideError::Io(format!("{}: {}", path.display(), e))),
    }
}
