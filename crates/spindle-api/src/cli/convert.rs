//! `spindle convert`: re-encode a record between JSON and YAML.
//!
//! Works on the record, not the rebuilt workflow, so no repair runs and
//! the output holds exactly what the input held.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use serde_json::json;

use spindle_core::serializer::format::to_text;
use spindle_types::config::{DurableFormat, SerializerConfig};

use super::read_record;

pub fn convert(input: &Path, output: &Path, config: &SerializerConfig, json: bool) -> Result<()> {
    let format = DurableFormat::from_path(output).with_context(|| {
        format!(
            "Cannot tell output format from {}; use .json, .yaml or .yml",
            output.display()
        )
    })?;

    let record = read_record(input, config)?;
    let text = to_text(&record, format, config.pretty)?;
    std::fs::write(output, text).with_context(|| format!("Failed to write {}", output.display()))?;

    if json {
        let out = json!({
            "input": input.display().to_string(),
            "output": output.display().to_string(),
            "format": format.extension(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "  {} Wrote {} ({})",
            style("✓").green(),
            style(output.display()).cyan(),
            format.extension()
        );
    }
    Ok(())
}
