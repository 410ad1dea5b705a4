//! Result types: line items, the column set shared by every view, and the
//! per-run [`Estimate`].
//!
//! A [`LineItem`] keeps the model's JSON object as-is instead of forcing it
//! into a struct. Models drop keys, send `"150"` instead of `150`, or invent
//! extra fields; every view shows what actually came back.

use crate::remote::RemoteFile;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys the prompt asks the model to produce, in display order.
pub const CANONICAL_KEYS: [&str; 5] = ["kategori", "item", "satuan", "estimasi_volume", "catatan"];

/// One estimated quantity entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItem(Map<String, Value>);

impl LineItem {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Raw value for `key`, whatever its JSON type.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Keys in the order the model wrote them.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Work category (`kategori`), e.g. Arsitektur, Struktur, MEP.
    pub fn category(&self) -> Option<&str> {
        self.get("kategori").and_then(Value::as_str)
    }

    pub fn item(&self) -> Option<&str> {
        self.get("item").and_then(Value::as_str)
    }

    /// Unit of measure (`satuan`), e.g. m2, m3, titik.
    pub fn unit(&self) -> Option<&str> {
        self.get("satuan").and_then(Value::as_str)
    }

    /// `estimasi_volume`, only when the model sent a JSON number.
    pub fn estimated_quantity(&self) -> Option<f64> {
        self.get("estimasi_volume").and_then(Value::as_f64)
    }

    pub fn note(&self) -> Option<&str> {
        self.get("catatan").and_then(Value::as_str)
    }

    /// Display text for the cell under `key`.
    pub fn cell_text(&self, key: &str) -> String {
        value_text(self.get(key))
    }
}

/// Human-readable text for a JSON value: strings unquoted, `null`/missing empty,
/// nested values as compact JSON.
pub fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Ordered column set for a list of line items.
///
/// The canonical keys always come first, so an empty estimate still has a
/// header row; any other key appears after them in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns(Vec<String>);

impl Columns {
    pub fn from_items(items: &[LineItem]) -> Self {
        let mut columns: Vec<String> = CANONICAL_KEYS.iter().map(|k| k.to_string()).collect();
        for item in items {
            for key in item.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.to_string());
                }
            }
        }
        Self(columns)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cell texts of `item`, one per column.
    pub fn row(&self, item: &LineItem) -> Vec<String> {
        self.iter().map(|key| item.cell_text(key)).collect()
    }
}

/// Timing and polling figures for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateStats {
    /// Number of status checks issued after the upload.
    pub poll_count: u32,
    pub upload_duration_ms: u64,
    /// Time spent waiting for the file to leave `PROCESSING`.
    pub processing_duration_ms: u64,
    pub generation_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything one estimation run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    /// Parsed bill of quantities, in the model's order.
    pub items: Vec<LineItem>,
    /// The model's reply, verbatim.
    pub raw_text: String,
    /// The uploaded file's final handle.
    pub file: RemoteFile,
    pub stats: EstimateStats,
}

impl Estimate {
    pub fn columns(&self) -> Columns {
        Columns::from_items(&self.items)
    }
}
