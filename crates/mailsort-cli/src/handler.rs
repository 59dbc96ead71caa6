//! Classify-and-update: the work done for each new email.

use std::sync::{Arc, Mutex};

use anyhow::Context;
use mailsort_ai::{DynClassifier, EmailClassifier, Prediction};
use mailsort_core::{EmailKey, EmailRecord};
use mailsort_store::EmailStore;
use tracing::{error, info, warn};

use crate::event::DocumentCreated;

/// What one invocation did. Only logged; never reported to the trigger caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Classified { key: EmailKey, label: String },
    /// The model bundle failed to load at startup; nothing was attempted.
    ModelUnavailable,
    /// Extraction, inference, or the write failed; nothing was written.
    Failed(String),
}

/// Holds the process-wide classifier (if it loaded) and the email store.
pub struct ClassificationHandler {
    classifier: Option<Mutex<EmailClassifier<DynClassifier>>>,
    store: Arc<dyn EmailStore>,
}

impl ClassificationHandler {
    pub fn new(classifier: Option<EmailClassifier<DynClassifier>>, store: Arc<dyn EmailStore>) -> Self {
        Self {
            classifier: classifier.map(Mutex::new),
            store,
        }
    }

    /// Whether the model bundle loaded.
    pub fn is_ready(&self) -> bool {
        self.classifier.is_some()
    }

    /// Handle a "document created" event. Never fails; see [`Outcome`].
    pub async fn handle(&self, event: &DocumentCreated) -> Outcome {
        let Some(classifier) = &self.classifier else {
            return model_unavailable();
        };

        let result = async {
            let key = EmailKey::from_params(&event.params)?;
            let record = EmailRecord::from_fields(&event.document.fields);
            self.classify_and_update(classifier, key, &record).await
        }
        .await;
        finish(result)
    }

    /// Same as [`handle`](Self::handle) for a record already in hand.
    pub async fn handle_record(&self, key: EmailKey, record: &EmailRecord) -> Outcome {
        let Some(classifier) = &self.classifier else {
            return model_unavailable();
        };
        finish(self.classify_and_update(classifier, key, record).await)
    }

    async fn classify_and_update(
        &self,
        classifier: &Mutex<EmailClassifier<DynClassifier>>,
        key: EmailKey,
        record: &EmailRecord,
    ) -> anyhow::Result<(EmailKey, String)> {
        let text = record.classification_text();
        let prediction = predict(classifier, &text)?;

        info!(
            user_id = %key.user_id,
            email_id = %key.email_id,
            label = %prediction.label,
            "classified email"
        );

        self.store
            .set_category(&key, &prediction.label)
            .await
            .with_context(|| format!("updating {}", key.document_path()))?;
        Ok((key, prediction.label))
    }
}

fn predict(
    classifier: &Mutex<EmailClassifier<DynClassifier>>,
    text: &str,
) -> anyhow::Result<Prediction> {
    // A panicked forward pass leaves no partial state behind; the bundle is
    // still the one loaded at startup.
    let mut classifier = classifier.lock().unwrap_or_else(|e| e.into_inner());
    classifier.predict(text)
}

fn model_unavailable() -> Outcome {
    warn!("model is not loaded, aborting classification");
    Outcome::ModelUnavailable
}

fn finish(result: anyhow::Result<(EmailKey, String)>) -> Outcome {
    match result {
        Ok((key, label)) => Outcome::Classified { key, label },
        Err(e) => {
            let message = format!("{e:#}");
            error!(error = %message, "an error occurred during classification");
            Outcome::Failed(message)
        }
    }
}
