//! Email classification layer: tokenizer + ONNX sequence classifier + label encoder.

pub mod classifier;
pub mod labels;

pub use classifier::{DynClassifier, EmailClassifier, Prediction, SequenceClassifier, argmax};
pub use labels::{LabelEncoder, LabelError};

#[cfg(feature = "onnx")]
mod bundle;
#[cfg(feature = "onnx")]
mod model;
#[cfg(feature = "onnx")]
pub use bundle::{LABEL_ENCODER_FILE, MODEL_FILE, ModelBundle, TOKENIZER_FILE};
#[cfg(feature = "onnx")]
pub use model::OnnxClassifier;
