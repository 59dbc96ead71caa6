//! Label encoder mapping class indices to category names.
//!
//! Stored as `label_encoder.json`, either a bare array of class names or an
//! object with a `classes` array. Class `i` of the model's logits decodes to
//! `classes[i]`, matching the order the encoder was fitted with.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("read label encoder {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parse label encoder: {0}")]
    Json(#[from] serde_json::Error),
    #[error("label encoder has no classes")]
    Empty,
    #[error("duplicate class {0:?} in label encoder")]
    Duplicate(String),
    #[error("class index {index} out of range for {len} classes")]
    OutOfRange { index: usize, len: usize },
    #[error("unknown label {0:?}")]
    UnknownLabel(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EncoderFile {
    Classes(Vec<String>),
    Object { classes: Vec<String> },
}

/// Bidirectional class-index ↔ category-name mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Build from an ordered class list. Classes must be non-empty and unique.
    pub fn new(classes: Vec<String>) -> Result<Self, LabelError> {
        if classes.is_empty() {
            return Err(LabelError::Empty);
        }
        let mut seen = HashSet::with_capacity(classes.len());
        for class in &classes {
            if !seen.insert(class.as_str()) {
                return Err(LabelError::Duplicate(class.clone()));
            }
        }
        Ok(Self { classes })
    }

    pub fn from_json_str(json: &str) -> Result<Self, LabelError> {
        let classes = match serde_json::from_str::<EncoderFile>(json)? {
            EncoderFile::Classes(classes) | EncoderFile::Object { classes } => classes,
        };
        Self::new(classes)
    }

    pub fn from_file(path: &Path) -> Result<Self, LabelError> {
        let json = std::fs::read_to_string(path).map_err(|source| LabelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Decode a class index to its category name.
    pub fn inverse_transform(&self, index: usize) -> Result<&str, LabelError> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(LabelError::OutOfRange {
                index,
                len: self.classes.len(),
            })
    }

    /// Encode a category name to its class index.
    pub fn transform(&self, label: &str) -> Result<usize, LabelError> {
        self.classes
            .iter()
            .position(|c| c == label)
            .ok_or_else(|| LabelError::UnknownLabel(label.to_string()))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
