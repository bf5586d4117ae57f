//! The `{data, meta}` envelope and its serialization to disk.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::PathBuf;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::{OutputStyle, Settings};

/// Keys rounded to `coordinate_precision` in compact output.
const COORDINATE_KEYS: &[&str] = &["latitude", "longitude"];

/// A payload plus the caller's extra meta fields.
#[derive(Debug, Clone)]
pub struct Envelope {
    kind: String,
    data: Value,
    extra: Map<String, Value>,
}

impl Envelope {
    pub fn new<T: Serialize + ?Sized>(kind: &str, data: &T) -> Result<Self> {
        let data = serde_json::to_value(data)
            .with_context(|| format!("Emit: Failed to serialize {kind} payload"))?;
        Ok(Self {
            kind: kind.to_string(),
            data,
            extra: Map::new(),
        })
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Like [`Envelope::meta`] but leaves the key out when `value` is `None`.
    pub fn meta_opt<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.meta(key, value),
            None => self,
        }
    }

    /// Merge every field of a serializable struct into meta.
    pub fn meta_fields<T: Serialize>(mut self, fields: &T) -> Result<Self> {
        if let Value::Object(map) = serde_json::to_value(fields)
            .with_context(|| format!("Emit: Failed to serialize {} meta", self.kind))?
        {
            self.extra.extend(map);
        }
        Ok(self)
    }

    /// Array length for list payloads, 1 for anything else.
    pub fn count(&self) -> usize {
        match &self.data {
            Value::Array(items) => items.len(),
            _ => 1,
        }
    }

    /// Assemble the final document. The base meta keys always win over extras.
    pub fn into_document(self, generated_at: &str, api_version: &str) -> Value {
        let count = self.count();
        let mut meta = self.extra;
        meta.insert("type".to_string(), Value::String(self.kind));
        meta.insert("count".to_string(), Value::from(count));
        meta.insert(
            "generated_at".to_string(),
            Value::String(generated_at.to_string()),
        );
        meta.insert(
            "api_version".to_string(),
            Value::String(api_version.to_string()),
        );

        let mut document = Map::new();
        document.insert("data".to_string(), self.data);
        document.insert("meta".to_string(), Value::Object(meta));
        Value::Object(document)
    }
}

/// A rendered document waiting to be written.
#[derive(Debug)]
pub struct OutputFile {
    pub path: String,
    pub envelope: Envelope,
}

impl OutputFile {
    pub fn new(path: impl Into<String>, envelope: Envelope) -> Self {
        Self {
            path: path.into(),
            envelope,
        }
    }
}

/// RFC 3339 timestamp for `now`, in UTC.
pub fn timestamp_now() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("Emit: Failed to format generation timestamp")
}

/// Writes envelopes under the output root. Shared read-only by all workers.
#[derive(Debug, Clone)]
pub struct Emitter {
    root: PathBuf,
    style: OutputStyle,
    pretty_threshold: usize,
    precision: u32,
    api_version: String,
    generated_at: String,
}

impl Emitter {
    pub fn new(settings: &Settings, generated_at: String) -> Self {
        Self {
            root: settings.output_dir.clone(),
            style: settings.output_style,
            pretty_threshold: settings.pretty_threshold,
            precision: settings.coordinate_precision,
            api_version: settings.api_version.clone(),
            generated_at,
        }
    }

    fn is_pretty(&self, records: usize) -> bool {
        match self.style {
            OutputStyle::Pretty => true,
            OutputStyle::Compact => false,
            OutputStyle::Auto => records < self.pretty_threshold,
        }
    }

    /// Serialize a document, compacting it unless it is printed verbatim.
    pub fn render(&self, envelope: Envelope) -> Result<Vec<u8>> {
        let pretty = self.is_pretty(envelope.count());
        let mut document = envelope.into_document(&self.generated_at, &self.api_version);
        let bytes = if pretty {
            serde_json::to_vec_pretty(&document)?
        } else {
            compact(&mut document, self.precision);
            serde_json::to_vec(&document)?
        };
        Ok(bytes)
    }

    pub fn write(&self, file: OutputFile) -> Result<()> {
        let full_path = self.root.join(&file.path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Emit: Failed to create {}", parent.display()))?;
        }
        let bytes = self
            .render(file.envelope)
            .with_context(|| format!("Emit: Failed to render {}", file.path))?;
        fs::write(&full_path, bytes)
            .with_context(|| format!("Emit: Failed to write {}", full_path.display()))?;
        tracing::debug!("Emit: wrote {}", file.path);
        Ok(())
    }
}

/// Strip `null`/`""` object values and round coordinates, recursively.
pub fn compact(value: &mut Value, precision: u32) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !is_blank(v));
            for (key, v) in map.iter_mut() {
                if COORDINATE_KEYS.contains(&key.as_str()) {
                    if let Some(rounded) = round_coordinate(v, precision) {
                        *v = rounded;
                    }
                } else {
                    compact(v, precision);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                compact(item, precision);
            }
        }
        _ => {}
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

/// Numeric coordinate rounded half-up, or `None` if the value is not a number.
fn round_coordinate(value: &Value, precision: u32) -> Option<Value> {
    let raw = match value {
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        Value::Number(number) => number.as_f64()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    let factor = 10f64.powi(precision as i32);
    let rounded = (raw * factor + 0.5).floor() / factor;
    Number::from_f64(rounded).map(Value::Number)
}
