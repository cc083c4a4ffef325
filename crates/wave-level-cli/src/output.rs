//! Result rendering and persistence.

use crate::error::{CliError, CliResult};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Pretty-printed JSON for the terminal and for saved files
pub fn render_json<T: Serialize>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::Output(e.to_string()))
}

/// Write `value` as pretty JSON to `path`, creating parent directories
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> CliResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = fs::create_dir_all(parent)
    {
        return Err(CliError::Output(format!(
            "Failed to create output directory {}: {}",
            parent.display(),
            e
        )));
    }

    let json = render_json(value)?;
    fs::write(path, json)
        .map_err(|e| CliError::Output(format!("Failed to write {}: {}", path.display(), e)))
}
