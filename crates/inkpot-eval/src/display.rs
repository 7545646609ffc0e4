//! Rich display of cell values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Value;

pub const TEXT_PLAIN: &str = "text/plain";
pub const IMAGE_PNG: &str = "image/png";

/// Formatted representations of one value, keyed by MIME type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MimeBundle(BTreeMap<String, serde_json::Value>);

impl MimeBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bundle holding only `text/plain`.
    pub fn text(text: impl Into<String>) -> Self {
        let mut bundle = Self::new();
        bundle.insert(TEXT_PLAIN, serde_json::Value::String(text.into()));
        bundle
    }

    /// A bundle holding a base64-encoded PNG.
    pub fn png(base64: impl Into<String>) -> Self {
        let mut bundle = Self::new();
        bundle.insert(IMAGE_PNG, serde_json::Value::String(base64.into()));
        bundle
    }

    pub fn insert(&mut self, mime: impl Into<String>, data: serde_json::Value) {
        self.0.insert(mime.into(), data);
    }

    pub fn get(&self, mime: &str) -> Option<&serde_json::Value> {
        self.0.get(mime)
    }

    pub fn plain_text(&self) -> Option<&str> {
        self.get(TEXT_PLAIN).and_then(|data| data.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.0.iter().map(|(mime, data)| (mime.as_str(), data))
    }
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("{0}")]
    Unsupported(String),
}

/// Produces a `MimeBundle` for a cell's value.
pub trait DisplayFormatter<V> {
    fn format(&self, value: &V) -> Result<MimeBundle, FormatError>;
}

/// Formats values as `text/plain` via their `repr`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReprFormatter;

impl DisplayFormatter<Value> for ReprFormatter {
    fn format(&self, value: &Value) -> Result<MimeBundle, FormatError> {
        Ok(MimeBundle::text(value.repr()))
    }
}
