//! Logits → class index → category name.
//!
//! [`SequenceClassifier`] is the seam between decoding and the model
//! backend: the ONNX model in production, fixed logits in tests.

use crate::labels::LabelEncoder;

/// A text classifier producing one logit per class.
pub trait SequenceClassifier {
    /// Run a forward pass on `text` and return the per-class logits.
    fn logits(&mut self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Number of classes, when known without running the model.
    fn num_classes(&self) -> Option<usize> {
        None
    }
}

impl<T: SequenceClassifier + ?Sized> SequenceClassifier for Box<T> {
    fn logits(&mut self, text: &str) -> anyhow::Result<Vec<f32>> {
        (**self).logits(text)
    }

    fn num_classes(&self) -> Option<usize> {
        (**self).num_classes()
    }
}

/// Type-erased classifier, for holders that should not carry the backend type.
pub type DynClassifier = Box<dyn SequenceClassifier + Send>;

/// Index of the largest logit.
///
/// Ties resolve to the lowest index and NaN never wins. Returns `None` for an
/// empty slice or one that is all NaN.
pub fn argmax(logits: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in logits.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Outcome of classifying one text.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    pub label: String,
    pub logits: Vec<f32>,
}

/// A model paired with the label encoder it was trained against.
pub struct EmailClassifier<M> {
    model: M,
    labels: LabelEncoder,
}

impl<M: SequenceClassifier> EmailClassifier<M> {
    /// Pair a model with its encoder, rejecting a class-count mismatch when
    /// the model's class count is known up front.
    pub fn new(model: M, labels: LabelEncoder) -> anyhow::Result<Self> {
        if let Some(n) = model.num_classes() {
            anyhow::ensure!(
                n == labels.len(),
                "model has {n} output classes but label encoder has {}",
                labels.len()
            );
        }
        Ok(Self { model, labels })
    }

    /// Classify `text`: forward pass, argmax, inverse transform.
    pub fn predict(&mut self, text: &str) -> anyhow::Result<Prediction> {
        let logits = self.model.logits(text)?;
        let class_index =
            argmax(&logits).ok_or_else(|| anyhow::anyhow!("model returned no usable logits"))?;
        let label = self.labels.inverse_transform(class_index)?.to_string();
        Ok(Prediction {
            class_index,
            label,
            logits,
        })
    }

    pub fn labels(&self) -> &LabelEncoder {
        &self.labels
    }
}

impl<M: SequenceClassifier + Send + 'static> EmailClassifier<M> {
    /// Erase the backend type.
    pub fn boxed(self) -> EmailClassifier<DynClassifier> {
        EmailClassifier {
            model: Box::new(self.model),
            labels: self.labels,
        }
    }
}
