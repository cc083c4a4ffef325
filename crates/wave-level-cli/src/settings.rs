use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
#[clap(after_help = "Examples:
  wave-level --lon -160.5260550 --lat -4.0147083
  wave-level --lon -160.5260550 --lat -4.0147083 --radius 740
  wave-level --lon 199.47 --lat -4.01 --geojson data/wind_level_18z.geojson --output result.json")]
/// Wave Level - Query severity levels and per-level distances for a geographic point
pub struct Settings {
    /// Query longitude in degrees (-180..180 or 0..360)
    #[clap(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Query latitude in degrees (-90..90)
    #[clap(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// GeoJSON file with the severity regions (overrides the config file)
    #[clap(long, value_name = "FILE")]
    pub geojson: Option<PathBuf>,

    /// Search radius in kilometers; farther levels are not reported
    #[clap(long, value_name = "KM")]
    pub radius: Option<f64>,

    /// Boundary tolerance in meters
    #[clap(long, value_name = "METERS")]
    pub threshold: Option<f64>,

    /// Digits kept after the decimal point in distances
    #[clap(long)]
    pub decimal_places: Option<u32>,

    /// TOML configuration file (default: config/config.toml if present)
    #[clap(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the JSON result to this file
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Do not write the result to a file (results are saved by default)
    #[clap(long, conflicts_with_all = ["save", "output"])]
    pub no_save: bool,

    /// Write the result to the configured output directory, even if the config file turns
    /// saving off
    #[clap(long)]
    pub save: bool,

    /// Also report the bearing to each level
    #[clap(long)]
    pub bearing: bool,

    /// Enable debug logging
    #[clap(short, long)]
    pub verbose: bool,
}

impl Settings {
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }
}
