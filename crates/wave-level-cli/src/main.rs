//! `wave-level` - classify a point against severity regions and report per-level distances

mod config;
mod error;
mod logging;
mod output;
mod settings;

use config::{FileConfig, RunConfig};
use error::CliResult;
use settings::Settings;
use wave_level_lib::QueryCache;

fn main() {
    let settings = Settings::from_cli();
    logging::setup_logging(settings.verbose);

    if let Err(e) = run(&settings) {
        tracing::debug!("Run failed: {e:?}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(settings: &Settings) -> CliResult<()> {
    profiling::scope!("run");

    let file = FileConfig::discover(settings.config.as_deref())?;
    let run = RunConfig::resolve(settings, file)?;
    tracing::debug!("Resolved configuration: {run:?}");

    let cache = QueryCache::new();
    let result = cache.query(&run.geojson_path, run.lon, run.lat, &run.options)?;

    if let Some(path) = &run.output_path {
        output::save_json(path, &result)?;
        tracing::info!("Result saved to {}", path.display());
    }

    println!("{}", output::render_json(&result)?);
    Ok(())
}
