use std::process::ExitCode;
use std::time::Duration;

use tide_tables::config;
use tide_tables::driver::Pipeline;
use tide_tables::ingest::HttpFetcher;
use tide_tables::logging::{self, Source};
use tide_tables::output::FsSink;

fn main() -> ExitCode {
    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init_logger(
        config.logging.level,
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );

    let fetcher = match HttpFetcher::new(Duration::from_secs(config.http_timeout_secs)) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            logging::error(Source::System, None, &e.to_string());
            return ExitCode::FAILURE;
        }
    };
    let sink = FsSink::new(&config.output_dir);

    match Pipeline::new(&config, &fetcher, &sink).run() {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            logging::error(Source::System, None, &format!("setup failed: {}", e));
            ExitCode::FAILURE
        }
    }
}
