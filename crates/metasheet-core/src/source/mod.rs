pub mod builtin;
pub mod exiftool;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ExtractionError;

pub use builtin::ExifReader;
pub use exiftool::ExifTool;

/// Something that can describe a file as a bag of named metadata fields.
pub trait MetadataSource: Send + Sync {
    fn inspect(&self, path: &Path) -> Result<MetadataFields, ExtractionError>;

    /// Short name for log lines.
    fn name(&self) -> &str;
}

/// Which [`MetadataSource`] a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// External `exiftool` process, one invocation per file
    #[default]
    Exiftool,
    /// In-process EXIF reader (images only)
    Builtin,
}

/// Loosely structured metadata keyed by tag name (`DateTimeOriginal`, `Duration`, ...).
/// Nothing is assumed to exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFields(Map<String, Value>);

/// Tool output treats these the way a missing tag is treated.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl MetadataFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw value, even if it is empty or zero.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Value of `key` if it carries something.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| is_present(v))
    }

    /// First present field of `keys`, in order, with the name that matched.
    pub fn first_present<'k>(&self, keys: &[&'k str]) -> Option<(&'k str, &Value)> {
        keys.iter()
            .find_map(|key| self.get(key).map(|value| (*key, value)))
    }

    /// Numeric value of `key`; numeric strings are accepted.
    pub fn number(&self, key: &str) -> Option<f64> {
        as_number(self.raw(key)?)
    }

    /// Parse the JSON printed by the metadata tool: one object, or an array whose
    /// first element is used. Empty output means "nothing known".
    pub fn parse_tool_output(stdout: &[u8]) -> Result<Self, ExtractionError> {
        let text = std::str::from_utf8(stdout)
            .map_err(|e| ExtractionError::Malformed(format!("output is not UTF-8: {}", e)))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: Value =
            serde_json::from_str(text).map_err(|e| ExtractionError::Malformed(e.to_string()))?;

        let first = match value {
            Value::Array(items) => match items.into_iter().next() {
                Some(item) => item,
                None => return Ok(Self::default()),
            },
            other => other,
        };

        match first {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ExtractionError::Malformed(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|f| f.is_finite())
}
