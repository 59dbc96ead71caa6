//! Email records as written by the inbox sync into `users/{userId}/emails/{emailId}`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::document::Value;
use crate::path::PathParams;

/// Trigger path for newly stored emails.
pub const EMAILS_PATH: &str = "users/{userId}/emails/{emailId}";
pub const USER_ID_PARAM: &str = "userId";
pub const EMAIL_ID_PARAM: &str = "emailId";

pub const SUBJECT_FIELD: &str = "subject";
pub const BODY_SNIPPET_FIELD: &str = "bodySnippet";
pub const FROM_FIELD: &str = "from";
pub const RECEIVED_AT_FIELD: &str = "receivedAt";
pub const CATEGORY_FIELD: &str = "category";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("missing path parameter {{{0}}}")]
    MissingParam(&'static str),
}

/// Identifies one email document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmailKey {
    pub user_id: String,
    pub email_id: String,
}

impl EmailKey {
    pub fn new(user_id: impl Into<String>, email_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email_id: email_id.into(),
        }
    }

    /// Build a key from the wildcards captured by [`EMAILS_PATH`].
    pub fn from_params(params: &PathParams) -> Result<Self, EmailError> {
        let user_id = params
            .get(USER_ID_PARAM)
            .ok_or(EmailError::MissingParam(USER_ID_PARAM))?;
        let email_id = params
            .get(EMAIL_ID_PARAM)
            .ok_or(EmailError::MissingParam(EMAIL_ID_PARAM))?;
        Ok(Self::new(user_id, email_id))
    }

    /// Document path relative to the database root.
    pub fn document_path(&self) -> String {
        format!("users/{}/emails/{}", self.user_id, self.email_id)
    }
}

impl fmt::Display for EmailKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.email_id)
    }
}

/// The fields of an email document that classification reads or writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailRecord {
    pub subject: String,
    pub body_snippet: String,
    pub from: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub category: Option<String>,
}

impl EmailRecord {
    pub fn new(subject: impl Into<String>, body_snippet: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body_snippet: body_snippet.into(),
            ..Default::default()
        }
    }

    /// Read a record from document fields.
    ///
    /// Missing or non-string `subject`/`bodySnippet` become empty strings.
    pub fn from_fields(fields: &BTreeMap<String, Value>) -> Self {
        let text = |name: &str| fields.get(name).and_then(Value::as_str).map(str::to_string);

        let received_at = fields.get(RECEIVED_AT_FIELD).and_then(|v| {
            let raw = v.as_timestamp()?;
            match DateTime::parse_from_rfc3339(raw) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(e) => {
                    debug!(raw, error = %e, "ignoring unparseable receivedAt");
                    None
                }
            }
        });

        Self {
            subject: text(SUBJECT_FIELD).unwrap_or_default(),
            body_snippet: text(BODY_SNIPPET_FIELD).unwrap_or_default(),
            from: text(FROM_FIELD),
            received_at,
            category: text(CATEGORY_FIELD),
        }
    }

    /// Inverse of [`EmailRecord::from_fields`], omitting unset optional fields.
    pub fn to_fields(&self) -> BTreeMap<String, Value> {
        let mut fields = BTreeMap::new();
        fields.insert(SUBJECT_FIELD.to_string(), Value::string(&self.subject));
        fields.insert(
            BODY_SNIPPET_FIELD.to_string(),
            Value::string(&self.body_snippet),
        );
        if let Some(from) = &self.from {
            fields.insert(FROM_FIELD.to_string(), Value::string(from));
        }
        if let Some(ts) = &self.received_at {
            fields.insert(
                RECEIVED_AT_FIELD.to_string(),
                Value::TimestampValue(ts.to_rfc3339()),
            );
        }
        if let Some(category) = &self.category {
            fields.insert(CATEGORY_FIELD.to_string(), Value::string(category));
        }
        fields
    }

    /// Model input: subject and snippet joined by one space, untrimmed.
    pub fn classification_text(&self) -> String {
        format!("{} {}", self.subject, self.body_snippet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathTemplate;

    fn fields(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn joins_subject_and_snippet() {
        let record = EmailRecord::new("Invoice due", "Please pay by Friday");
        assert_eq!(
            record.classification_text(),
            "Invoice due Please pay by Friday"
        );
    }

    #[test]
    fn empty_fields_yield_single_space() {
        assert_eq!(EmailRecord::new("", "").classification_text(), " ");
        assert_eq!(EmailRecord::new("Hi", "").classification_text(), "Hi ");
        assert_eq!(EmailRecord::new("", "body").classification_text(), " body");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let record = EmailRecord::from_fields(&BTreeMap::new());
        assert_eq!(record.subject, "");
        assert_eq!(record.body_snippet, "");
        assert!(record.from.is_none());
        assert!(record.category.is_none());
        assert_eq!(record.classification_text(), " ");
    }

    #[test]
    fn non_string_subject_treated_as_absent() {
        let record = EmailRecord::from_fields(&fields(&[
            (SUBJECT_FIELD, Value::IntegerValue("7".into())),
            (BODY_SNIPPET_FIELD, Value::string("hello")),
        ]));
        assert_eq!(record.subject, "");
        assert_eq!(record.body_snippet, "hello");
    }

    #[test]
    fn reads_ingestion_fields() {
        let record = EmailRecord::from_fields(&fields(&[
            (SUBJECT_FIELD, Value::string("Team lunch")),
            (FROM_FIELD, Value::string("Ana <ana@example.com>")),
            (
                RECEIVED_AT_FIELD,
                Value::TimestampValue("2026-03-02T09:15:00.250Z".into()),
            ),
        ]));
        assert_eq!(record.from.as_deref(), Some("Ana <ana@example.com>"));
        let ts = record.received_at.unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-03-02T09:15:00.250+00:00");
    }

    #[test]
    fn bad_timestamp_is_dropped() {
        let record = EmailRecord::from_fields(&fields(&[(
            RECEIVED_AT_FIELD,
            Value::TimestampValue("yesterday".into()),
        )]));
        assert!(record.received_at.is_none());
    }

    #[test]
    fn fields_round_trip_through_document_shape() {
        let mut record = EmailRecord::new("Invoice due", "Please pay by Friday");
        record.category = Some("Finance".into());
        assert_eq!(EmailRecord::from_fields(&record.to_fields()), record);
    }

    #[test]
    fn key_from_trigger_path() {
        let template = PathTemplate::parse(EMAILS_PATH).unwrap();
        let params = template.matches("users/uid-1/emails/18c2f").unwrap();
        let key = EmailKey::from_params(&params).unwrap();
        assert_eq!(key, EmailKey::new("uid-1", "18c2f"));
        assert_eq!(key.document_path(), "users/uid-1/emails/18c2f");
    }

    #[test]
    fn key_requires_both_params() {
        let params: PathParams = [("userId".to_string(), "u".to_string())]
            .into_iter()
            .collect();
        assert_eq!(
            EmailKey::from_params(&params),
            Err(EmailError::MissingParam(EMAIL_ID_PARAM))
        );
    }
}
