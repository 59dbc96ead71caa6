//! ONNX Runtime sequence classifier (DistilBERT-style exports).
//!
//! Expects a graph with `input_ids` and `attention_mask` inputs, an optional
//! `token_type_ids` input, and a `[batch, num_classes]` logits output.

use std::path::Path;

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::classifier::SequenceClassifier;

/// Transformer sequence classifier running on ONNX Runtime.
pub struct OnnxClassifier {
    session: Session,
    tokenizer: Tokenizer,
    num_classes: Option<usize>,
    uses_token_type_ids: bool,
}

impl OnnxClassifier {
    /// Load `model_path` and `tokenizer_path`, truncating inputs to `max_length` tokens.
    pub fn load(model_path: &Path, tokenizer_path: &Path, max_length: usize) -> anyhow::Result<Self> {
        anyhow::ensure!(model_path.exists(), "{model_path:?} not found");
        anyhow::ensure!(tokenizer_path.exists(), "{tokenizer_path:?} not found");

        let session = Session::builder()?.commit_from_file(model_path)?;

        let num_classes = infer_num_classes(session.outputs()[0].dtype());
        let uses_token_type_ids = session
            .inputs()
            .iter()
            .any(|input| input.name() == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("set truncation: {e}"))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            ..Default::default()
        }));

        info!(
            model = %model_path.display(),
            num_classes = ?num_classes,
            max_length,
            "loaded sequence classification model"
        );
        Ok(Self {
            session,
            tokenizer,
            num_classes,
            uses_token_type_ids,
        })
    }
}

impl SequenceClassifier for OnnxClassifier {
    fn logits(&mut self, text: &str) -> anyhow::Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenize: {e}"))?;

        let seq_len = encoding.get_ids().len();
        let shape = [1_i64, seq_len as i64];

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();

        let ids_tensor = Tensor::from_array((shape, input_ids.into_boxed_slice()))?;
        let mask_tensor = Tensor::from_array((shape, attention_mask.into_boxed_slice()))?;

        let outputs = if self.uses_token_type_ids {
            let type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&t| t as i64).collect();
            let type_tensor = Tensor::from_array((shape, type_ids.into_boxed_slice()))?;
            self.session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
                "token_type_ids" => type_tensor,
            ])?
        } else {
            self.session.run(ort::inputs![
                "input_ids" => ids_tensor,
                "attention_mask" => mask_tensor,
            ])?
        };

        // Logits: [1, num_classes].
        let (output_shape, output_data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: &[i64] = output_shape;
        anyhow::ensure!(
            dims.len() == 2 && dims[0] == 1,
            "unexpected logits shape: {dims:?}, expected [1, num_classes]"
        );

        let logits = output_data[..dims[1] as usize].to_vec();
        debug!(seq_len, classes = logits.len(), "forward pass complete");
        Ok(logits)
    }

    fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }
}

/// Class count from the logits output type, when the export fixes it.
fn infer_num_classes(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn model_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("models")
            .join("email-classifier")
    }

    fn load() -> OnnxClassifier {
        let dir = model_dir();
        OnnxClassifier::load(&dir.join("model.onnx"), &dir.join("tokenizer.json"), 512)
            .expect("export the classifier to models/email-classifier/ first")
    }

    #[test]
    #[ignore = "needs models/email-classifier"]
    fn logits_have_one_entry_per_class() {
        let mut clf = load();
        let logits = clf.logits("Invoice due Please pay by Friday").unwrap();
        assert!(!logits.is_empty());
        if let Some(n) = clf.num_classes() {
            assert_eq!(logits.len(), n);
        }
    }

    #[test]
    #[ignore = "needs models/email-classifier"]
    fn near_empty_input_still_classifies() {
        let mut clf = load();
        assert!(!clf.logits(" ").unwrap().is_empty());
    }

    #[test]
    #[ignore = "needs models/email-classifier"]
    fn long_input_is_truncated() {
        let mut clf = load();
        let text = "quarterly budget review ".repeat(2_000);
        assert!(!clf.logits(&text).unwrap().is_empty());
    }

    #[test]
    fn missing_model_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxClassifier::load(
            &dir.path().join("model.onnx"),
            &dir.path().join("tokenizer.json"),
            512,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("model.onnx"));
    }
}
