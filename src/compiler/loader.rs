use anyhow::{Context as AnyhowContext, Result, bail};
use crate::migration::MAX_NESTING_DEPTH;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Json,
    Yaml,
}

impl RecordFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Ok(RecordFormat::Json),
            Some("yaml") | Some("yml") => Ok(RecordFormat::Yaml),
            _ => bail!("Unsupported record file extension: {}", path.display()),
        }
    }
}

/// Reads a stored flow version record without interpreting its schema.
pub fn load_record(file_path: &Path) -> Result<Value> {
    let format = RecordFormat::from_path(file_path)?;
    let content = fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read record file {}", file_path.display()))?;

    parse_record(&content, format)
        .with_context(|| format!("Failed to deserialize record from {}", file_path.display()))
}

/// Legacy records nest one object level per chained step, so JSON is parsed
/// without serde_json's recursion limit once its depth is known to be bounded.
pub fn parse_record<T: DeserializeOwned>(content: &str, format: RecordFormat) -> Result<T> {
    match format {
        RecordFormat::Json => {
            check_json_depth(content)?;
            let mut deserializer = serde_json::Deserializer::from_str(content);
            deserializer.disable_recursion_limit();
            let record = T::deserialize(&mut deserializer)?;
            deserializer.end()?;
            Ok(record)
        }
        RecordFormat::Yaml => Ok(serde_yaml::from_str(content)?),
    }
}

/// Scans raw JSON so an over-deep record is rejected before any recursive parse.
fn check_json_depth(content: &str) -> Result<()> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for byte in content.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                if depth > MAX_NESTING_DEPTH {
                    bail!("Record nests deeper than {} levels", MAX_NESTING_DEPTH);
                }
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

pub fn write_record<T: Serialize>(file_path: &Path, record: &T) -> Result<()> {
    let content = match RecordFormat::from_path(file_path)? {
        RecordFormat::Json => serde_json::to_string_pretty(record)?,
        RecordFormat::Yaml => serde_yaml::to_string(record)?,
    };
    fs::write(file_path, content)
        .with_context(|| format!("Failed to write record file {}", file_path.display()))
}
