//! Output formatting: JSON and YAML.
//!
//! Renders data in the format selected by `--output`.

use std::io::{self, Write};

use omvly_core::{Category, Snapshot};

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Render dispatchers ───────────────────────────────────────────────

/// Render any serde-serializable value in the chosen format.
pub fn render<T>(format: OutputFormat, data: &T) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Render a whole snapshot, or just one of its categories.
pub fn render_snapshot(
    format: OutputFormat,
    snapshot: &Snapshot,
    category: Option<Category>,
) -> Result<String, CliError> {
    match category {
        Some(category) => render(format, &snapshot.category(category)),
        None => render(format, snapshot),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", output.trim_end());
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let out = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(out)
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(data)?)
}
