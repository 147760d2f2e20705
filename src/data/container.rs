//! Stored results containers.
//!
//! A container is anything that can answer "give me the array stored under
//! this key". JSON objects and CSV column files are supported.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Json,
    Csv,
}

impl ContainerFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(ContainerFormat::Json),
            Some("csv") => Ok(ContainerFormat::Csv),
            other => bail!(
                "unsupported results container {}: extension {:?}",
                path.display(),
                other
            ),
        }
    }
}

/// Key-addressable numeric arrays.
pub trait ChannelSource {
    fn format(&self) -> ContainerFormat;

    /// Keys present in the container, sorted.
    fn keys(&self) -> Vec<String>;

    /// `None` when the key is absent; `Some(Err)` when it is present but
    /// cannot be read as a 1-D numeric array.
    fn array(&self, key: &str) -> Option<Result<Vec<f64>>>;
}

// =============================================================================
// JSON
// =============================================================================

pub struct JsonContainer {
    fields: Map<String, Value>,
}

impl JsonContainer {
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).context("invalid JSON results container")?;
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => bail!(
                "results container must be a JSON object, got {}",
                json_kind(&other)
            ),
        }
    }
}

impl ChannelSource for JsonContainer {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Json
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.fields.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn array(&self, key: &str) -> Option<Result<Vec<f64>>> {
        self.fields
            .get(key)
            .map(|v| squeeze(v).with_context(|| format!("key {:?}", key)))
    }
}

/// Flatten a nested numeric array whose axes are all length 1 except at
/// most one. A bare number becomes a one-element vector.
pub fn squeeze(value: &Value) -> Result<Vec<f64>> {
    let mut shape = Vec::new();
    let mut leaf_depth = None;
    let mut out = Vec::new();
    collect(value, 0, &mut shape, &mut leaf_depth, &mut out)?;
    let long_axes = shape.iter().filter(|&&d| d > 1).count();
    if long_axes > 1 {
        bail!("array of shape {:?} cannot be squeezed to 1-D", shape);
    }
    Ok(out)
}

fn collect(
    value: &Value,
    depth: usize,
    shape: &mut Vec<usize>,
    leaf_depth: &mut Option<usize>,
    out: &mut Vec<f64>,
) -> Result<()> {
    match value {
        Value::Number(n) => {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(d) if d != depth => bail!("ragged array"),
                Some(_) => {}
            }
            let x = n
                .as_f64()
                .ok_or_else(|| anyhow!("number {} is not representable as f64", n))?;
            out.push(x);
            Ok(())
        }
        Value::Array(items) => {
            if leaf_depth.is_some_and(|d| depth >= d) {
                bail!("ragged array");
            }
            if shape.len() == depth {
                shape.push(items.len());
            } else if shape[depth] != items.len() {
                bail!("ragged array: expected {} items, got {}", shape[depth], items.len());
            }
            for item in items {
                collect(item, depth + 1, shape, leaf_depth, out)?;
            }
            Ok(())
        }
        other => bail!("expected a number, got {}", json_kind(other)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// CSV
// =============================================================================

/// Header row of channel names followed by numeric rows. Blank lines and
/// `#` comments are skipped.
pub struct CsvContainer {
    columns: BTreeMap<String, Vec<f64>>,
}

impl CsvContainer {
    pub fn parse(text: &str) -> Result<Self> {
        let mut header: Vec<String> = Vec::new();
        let mut data: Vec<Vec<f64>> = Vec::new();

        for (idx, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if header.is_empty() {
                header = trimmed.split(',').map(|s| s.trim().to_string()).collect();
                if header.iter().any(|h| h.is_empty()) {
                    bail!("line {}: empty column name in header", idx + 1);
                }
                data = vec![Vec::new(); header.len()];
                continue;
            }
            let fields: Vec<&str> = trimmed.split(',').collect();
            if fields.len() != header.len() {
                bail!(
                    "line {}: expected {} columns, got {}",
                    idx + 1,
                    header.len(),
                    fields.len()
                );
            }
            for (col, field) in data.iter_mut().zip(fields) {
                let x: f64 = field
                    .trim()
                    .parse()
                    .with_context(|| format!("line {}: bad number {:?}", idx + 1, field.trim()))?;
                if !x.is_finite() {
                    bail!("line {}: non-finite value {:?}", idx + 1, field.trim());
                }
                col.push(x);
            }
        }

        let mut columns = BTreeMap::new();
        for (name, col) in header.into_iter().zip(data) {
            if columns.insert(name.clone(), col).is_some() {
                bail!("duplicate column {:?}", name);
            }
        }
        Ok(Self { columns })
    }
}

impl ChannelSource for CsvContainer {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Csv
    }

    fn keys(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    fn array(&self, key: &str) -> Option<Result<Vec<f64>>> {
        self.columns.get(key).map(|c| Ok(c.clone()))
    }
}

pub fn parse_container(format: ContainerFormat, text: &str) -> Result<Box<dyn ChannelSource>> {
    Ok(match format {
        ContainerFormat::Json => Box::new(JsonContainer::parse(text)?),
        ContainerFormat::Csv => Box::new(CsvContainer::parse(text)?),
    })
}
