//! TOML configuration file and its merge with command-line settings
//!
//! Precedence is command line, then config file, then built-in defaults.

use crate::error::{CliError, CliResult};
use crate::settings::Settings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use wave_level_lib::{DEFAULT_DECIMAL_PLACES, DEFAULT_DISTANCE_THRESHOLD_M, QueryOptions};

/// Config file used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub data: DataSection,
    pub query: QuerySection,
    pub output: OutputSection,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DataSection {
    pub geojson_path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct QuerySection {
    pub default_radius_km: Option<f64>,
    pub distance_threshold_m: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub decimal_places: Option<u32>,
    pub save_results: Option<bool>,
    pub output_dir: Option<PathBuf>,
}

impl FileConfig {
    /// Parse a config file, resolving relative paths against its directory
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config: FileConfig = toml::from_str(&text)
            .map_err(|e| CliError::Config(format!("cannot parse {}: {e}", path.display())))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.data.geojson_path = config.data.geojson_path.map(|p| base.join(p));
        config.output.output_dir = config.output.output_dir.map(|p| base.join(p));
        Ok(config)
    }

    /// Load the explicit config, or the default one if it exists
    pub fn discover(explicit: Option<&Path>) -> CliResult<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.is_file() {
                    Self::load(default)
                } else {
                    tracing::debug!("No config file at {DEFAULT_CONFIG_PATH}, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Everything a run needs, after merging all sources
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub lon: f64,
    pub lat: f64,
    pub geojson_path: PathBuf,
    pub options: QueryOptions,
    /// Where to write the result, if anywhere
    pub output_path: Option<PathBuf>,
}

impl RunConfig {
    pub fn resolve(settings: &Settings, file: FileConfig) -> CliResult<Self> {
        let geojson_path = settings
            .geojson
            .clone()
            .or(file.data.geojson_path)
            .ok_or_else(|| {
                CliError::Config(
                    "no GeoJSON source: pass --geojson or set data.geojson_path".to_string(),
                )
            })?;

        let options = QueryOptions {
            radius_km: settings.radius.or(file.query.default_radius_km),
            distance_threshold_m: settings
                .threshold
                .or(file.query.distance_threshold_m)
                .unwrap_or(DEFAULT_DISTANCE_THRESHOLD_M),
            decimal_places: settings
                .decimal_places
                .or(file.output.decimal_places)
                .unwrap_or(DEFAULT_DECIMAL_PLACES),
            with_bearing: settings.bearing,
        };

        // Results are saved unless turned off
        let save = if settings.no_save {
            false
        } else {
            settings.save || settings.output.is_some() || file.output.save_results.unwrap_or(true)
        };
        let output_path = save.then(|| {
            settings.output.clone().unwrap_or_else(|| {
                let dir = file.output.output_dir.unwrap_or_else(|| PathBuf::from("."));
                dir.join(default_result_file_name(settings.lon, settings.lat))
            })
        });

        Ok(Self {
            lon: settings.lon,
            lat: settings.lat,
            geojson_path,
            options,
            output_path,
        })
    }
}

/// `query_result_lon{lon}_lat{lat}.json`, with the longitude in the 0..360 convention
///
/// Whole numbers keep their `.0` (`lat-4.0`), so names match the Python tool's output.
pub fn default_result_file_name(lon: f64, lat: f64) -> String {
    let lon = wave_level_lib::utils::normalize_longitude(lon);
    format!("query_result_lon{lon:?}_lat{lat:?}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn settings(args: &[&str]) -> Settings {
        let mut argv = vec!["wave-level", "--lon", "-160.5", "--lat", "-4"];
        argv.extend_from_slice(args);
        Settings::try_parse_from(argv).unwrap()
    }

    const SAMPLE: &str = r#"
        [data]
        geojson_path = "data/levels.geojson"

        [query]
        default_radius_km = 740.0
        distance_threshold_m = 2.0

        [output]
        decimal_places = 2
        save_results = true
        output_dir = "results"
    "#;

    fn write_sample(dir: &Path) -> PathBuf {
        let path = dir.join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig::load(&write_sample(dir.path())).unwrap();

        assert_eq!(
            config.data.geojson_path,
            Some(dir.path().join("data/levels.geojson"))
        );
        assert_eq!(config.output.output_dir, Some(dir.path().join("results")));
        assert_eq!(config.query.default_radius_km, Some(740.0));
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[query]\nradius = 5\n").unwrap();
        assert!(matches!(FileConfig::load(&path), Err(CliError::Config(_))));
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileConfig::discover(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_file_values_used_when_flags_absent() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileConfig::load(&write_sample(dir.path())).unwrap();
        let run = RunConfig::resolve(&settings(&[]), file).unwrap();

        assert_eq!(run.geojson_path, dir.path().join("data/levels.geojson"));
        assert_eq!(run.options.radius_km, Some(740.0));
        assert_eq!(run.options.distance_threshold_m, 2.0);
        assert_eq!(run.options.decimal_places, 2);
        assert_eq!(
            run.output_path,
            Some(dir.path().join("results").join("query_result_lon199.5_lat-4.0.json"))
        );
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileConfig::load(&write_sample(dir.path())).unwrap();
        let run = RunConfig::resolve(
            &settings(&["--geojson", "other.geojson", "--radius", "100", "--decimal-places", "4"]),
            file,
        )
        .unwrap();

        assert_eq!(run.geojson_path, PathBuf::from("other.geojson"));
        assert_eq!(run.options.radius_km, Some(100.0));
        assert_eq!(run.options.decimal_places, 4);
    }

    #[test]
    fn test_no_save_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileConfig::load(&write_sample(dir.path())).unwrap();
        let run = RunConfig::resolve(&settings(&["--no-save"]), file).unwrap();
        assert!(run.output_path.is_none());
    }

    #[test]
    fn test_defaults_without_file() {
        let run = RunConfig::resolve(&settings(&["--geojson", "levels.geojson"]), FileConfig::default())
            .unwrap();

        assert_eq!(run.options, QueryOptions::default());
        // Saving is on by default, into the working directory
        assert_eq!(
            run.output_path,
            Some(PathBuf::from(".").join("query_result_lon199.5_lat-4.0.json"))
        );
    }

    #[test]
    fn test_file_can_disable_saving() {
        let file: FileConfig = toml::from_str(
            r#"
            [data]
            geojson_path = "levels.geojson"
            [output]
            save_results = false
            "#,
        )
        .unwrap();
        let run = RunConfig::resolve(&settings(&[]), file.clone()).unwrap();
        assert!(run.output_path.is_none());

        // An explicit flag still saves
        let run = RunConfig::resolve(&settings(&["--save"]), file).unwrap();
        assert!(run.output_path.is_some());
    }

    #[test]
    fn test_missing_source_fails() {
        let result = RunConfig::resolve(&settings(&[]), FileConfig::default());
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_default_result_file_name() {
        assert_eq!(
            default_result_file_name(-160.5, -4.25),
            "query_result_lon199.5_lat-4.25.json"
        );
        assert_eq!(
            default_result_file_name(15.0, -4.0),
            "query_result_lon15.0_lat-4.0.json"
        );
    }
}
