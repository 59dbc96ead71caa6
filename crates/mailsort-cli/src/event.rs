//! Firestore "document created" CloudEvents as delivered over HTTP.
//!
//! Binary content mode carries the attributes in `ce-*` headers and the
//! `DocumentEventData` JSON as the body. Structured mode wraps both in one
//! `application/cloudevents+json` envelope with the payload under `data`.

use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use mailsort_core::{Document, DocumentEventData, PathParams, PathTemplate, document_relative_path};
use serde::Deserialize;
use thiserror::Error;

pub const DOCUMENT_CREATED_TYPE: &str = "google.cloud.firestore.document.v1.created";

const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

#[derive(Error, Debug)]
pub enum EventError {
    #[error("ignoring event type {0}")]
    UnsupportedType(String),
    #[error("unsupported content type {0} (configure the trigger for application/json)")]
    UnsupportedContentType(String),
    #[error("event payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event carries no document value")]
    MissingDocument,
    #[error("event names no document path")]
    MissingPath,
    #[error("document {path} does not match trigger path {template}")]
    PathMismatch { path: String, template: String },
}

/// A new document under the trigger path.
#[derive(Debug, Clone)]
pub struct DocumentCreated {
    /// CloudEvent id, for log correlation.
    pub id: Option<String>,
    /// Path relative to the database root.
    pub path: String,
    /// Wildcards captured from `path`.
    pub params: PathParams,
    pub document: Document,
}

/// Attributes that may appear either as `ce-*` headers or envelope fields.
#[derive(Debug, Default, Deserialize)]
struct Attributes {
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    subject: Option<String>,
    document: Option<String>,
}

#[derive(Deserialize)]
struct StructuredEvent {
    #[serde(flatten)]
    attributes: Attributes,
    #[serde(default)]
    data: Option<DocumentEventData>,
}

impl DocumentCreated {
    /// Decode an HTTP delivery and match its document against `template`.
    pub fn from_http(
        headers: &HeaderMap,
        body: &[u8],
        template: &PathTemplate,
    ) -> Result<Self, EventError> {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());

        let (attributes, data) = match content_type.as_deref() {
            Some(STRUCTURED_CONTENT_TYPE) => {
                let event: StructuredEvent = serde_json::from_slice(body)?;
                (event.attributes, event.data)
            }
            None | Some("application/json") => {
                let data: DocumentEventData = serde_json::from_slice(body)?;
                (binary_attributes(headers), Some(data))
            }
            Some(other) => return Err(EventError::UnsupportedContentType(other.to_string())),
        };

        if let Some(t) = &attributes.event_type
            && t != DOCUMENT_CREATED_TYPE
        {
            return Err(EventError::UnsupportedType(t.clone()));
        }

        let document = data
            .and_then(|d| d.value)
            .ok_or(EventError::MissingDocument)?;

        let path = document
            .relative_path()
            .or(attributes.document.as_deref())
            .or(attributes.subject.as_deref())
            .map(document_relative_path)
            .ok_or(EventError::MissingPath)?
            .to_string();

        let params = template
            .matches(&path)
            .ok_or_else(|| EventError::PathMismatch {
                path: path.clone(),
                template: template.to_string(),
            })?;

        Ok(Self {
            id: attributes.id,
            path,
            params,
            document,
        })
    }
}

fn binary_attributes(headers: &HeaderMap) -> Attributes {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Attributes {
        id: get("ce-id"),
        event_type: get("ce-type"),
        subject: get("ce-subject"),
        document: get("ce-document"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use mailsort_core::email::EMAILS_PATH;

    const PAYLOAD: &str = r#"{
        "value": {
            "name": "projects/demo/databases/(default)/documents/users/u1/emails/e1",
            "fields": {
                "subject": {"stringValue": "Invoice due"},
                "bodySnippet": {"stringValue": "Please pay by Friday"}
            }
        }
    }"#;

    fn template() -> PathTemplate {
        PathTemplate::parse(EMAILS_PATH).unwrap()
    }

    fn binary_headers(event_type: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        h.insert("ce-id", HeaderValue::from_static("evt-1"));
        h.insert("ce-type", HeaderValue::from_str(event_type).unwrap());
        h.insert(
            "ce-subject",
            HeaderValue::from_static("documents/users/u1/emails/e1"),
        );
        h
    }

    #[test]
    fn binary_mode_event() {
        let ev = DocumentCreated::from_http(
            &binary_headers(DOCUMENT_CREATED_TYPE),
            PAYLOAD.as_bytes(),
            &template(),
        )
        .unwrap();
        assert_eq!(ev.id.as_deref(), Some("evt-1"));
        assert_eq!(ev.path, "users/u1/emails/e1");
        assert_eq!(ev.params.get("userId"), Some("u1"));
        assert_eq!(ev.params.get("emailId"), Some("e1"));
        assert_eq!(ev.document.fields["subject"].as_str(), Some("Invoice due"));
    }

    #[test]
    fn structured_mode_event() {
        let body = format!(
            r#"{{
                "specversion": "1.0",
                "id": "evt-2",
                "type": "{DOCUMENT_CREATED_TYPE}",
                "source": "//firestore.googleapis.com/projects/demo/databases/(default)",
                "subject": "documents/users/u1/emails/e1",
                "data": {PAYLOAD}
            }}"#
        );
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/cloudevents+json; charset=utf-8"),
        );
        let ev = DocumentCreated::from_http(&headers, body.as_bytes(), &template()).unwrap();
        assert_eq!(ev.id.as_deref(), Some("evt-2"));
        assert_eq!(ev.params.get("emailId"), Some("e1"));
    }

    #[test]
    fn path_falls_back_to_headers() {
        let body = r#"{"value": {"fields": {}}}"#;
        let ev = DocumentCreated::from_http(
            &binary_headers(DOCUMENT_CREATED_TYPE),
            body.as_bytes(),
            &template(),
        )
        .unwrap();
        assert_eq!(ev.path, "users/u1/emails/e1");
        assert!(ev.document.fields.is_empty());
    }

    #[test]
    fn other_event_types_are_ignored() {
        let err = DocumentCreated::from_http(
            &binary_headers("google.cloud.firestore.document.v1.updated"),
            PAYLOAD.as_bytes(),
            &template(),
        )
        .unwrap_err();
        assert!(matches!(err, EventError::UnsupportedType(_)));
    }

    #[test]
    fn protobuf_payload_rejected() {
        let mut headers = binary_headers(DOCUMENT_CREATED_TYPE);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/protobuf"),
        );
        let err = DocumentCreated::from_http(&headers, b"\x0a\x00", &template()).unwrap_err();
        assert!(matches!(err, EventError::UnsupportedContentType(ct) if ct == "application/protobuf"));
    }

    #[test]
    fn document_outside_trigger_path() {
        let body = r#"{"value": {"name": "projects/demo/databases/(default)/documents/users/u1/drafts/d1"}}"#;
        let err = DocumentCreated::from_http(&HeaderMap::new(), body.as_bytes(), &template())
            .unwrap_err();
        assert!(matches!(err, EventError::PathMismatch { path, .. } if path == "users/u1/drafts/d1"));
    }

    #[test]
    fn missing_value_and_bad_json() {
        assert!(matches!(
            DocumentCreated::from_http(&HeaderMap::new(), b"{}", &template()),
            Err(EventError::MissingDocument)
        ));
        assert!(matches!(
            DocumentCreated::from_http(&HeaderMap::new(), b"not json", &template()),
            Err(EventError::Json(_))
        ));
    }
}
