//! Model asset directory: tokenizer, ONNX classifier, label encoder.

use std::path::Path;

use anyhow::Context;
use tracing::{error, info};

use crate::classifier::EmailClassifier;
use crate::labels::LabelEncoder;
use crate::model::OnnxClassifier;

pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const MODEL_FILE: &str = "model.onnx";
pub const LABEL_ENCODER_FILE: &str = "label_encoder.json";

/// Everything needed to turn email text into a category, loaded once per process.
pub type ModelBundle = EmailClassifier<OnnxClassifier>;

impl EmailClassifier<OnnxClassifier> {
    /// Load the three assets from `dir`.
    pub fn load(dir: &Path, max_length: usize) -> anyhow::Result<Self> {
        info!(dir = %dir.display(), "loading tokenizer, model, and label encoder");

        let model = OnnxClassifier::load(
            &dir.join(MODEL_FILE),
            &dir.join(TOKENIZER_FILE),
            max_length,
        )
        .context("loading classifier")?;
        let labels = LabelEncoder::from_file(&dir.join(LABEL_ENCODER_FILE))
            .context("loading label encoder")?;

        let bundle = Self::new(model, labels)?;
        info!(classes = bundle.labels().len(), "all model assets loaded");
        Ok(bundle)
    }

    /// Startup load that never fails the process.
    ///
    /// Any error is logged and yields `None`; callers treat that as a
    /// permanently disabled classifier for the life of the process.
    pub fn try_load(dir: &Path, max_length: usize) -> Option<Self> {
        match Self::load(dir, max_length) {
            Ok(bundle) => Some(bundle),
            Err(e) => {
                error!(dir = %dir.display(), error = %format!("{e:#}"), "CRITICAL: error loading model assets");
                None
            }
        }
    }
}
