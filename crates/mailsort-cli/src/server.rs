//! HTTP trigger endpoint.
//!
//! Every delivery is acknowledged with `204 No Content` once handled, even
//! when classification failed, so the runtime never redelivers it.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use mailsort_core::PathTemplate;
use serde_json::json;
use tower::limit::ConcurrencyLimitLayer;
use tracing::{debug, info, warn};

use crate::event::{DocumentCreated, EventError};
use crate::handler::{ClassificationHandler, Outcome};

pub struct AppState {
    pub handler: ClassificationHandler,
    pub template: PathTemplate,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // One event at a time per process.
        .route("/", post(receive_event).layer(ConcurrencyLimitLayer::new(1)))
        .route("/healthz", get(health))
        .with_state(state)
}

async fn receive_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    match DocumentCreated::from_http(&headers, &body, &state.template) {
        Ok(event) => {
            debug!(event_id = ?event.id, path = %event.path, "document created");
            if let Outcome::Classified { key, label } = state.handler.handle(&event).await {
                info!(key = %key, label = %label, "category stored");
            }
        }
        Err(EventError::UnsupportedType(t)) => {
            debug!(event_type = %t, "ignoring event");
        }
        Err(e) => {
            warn!(error = %e, "discarding undeliverable event");
        }
    }
    StatusCode::NO_CONTENT
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model_loaded": state.handler.is_ready(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use mailsort_core::email::EMAILS_PATH;
    use mailsort_core::{EmailKey, EmailRecord};
    use mailsort_store::MemoryStore;
    use tower::ServiceExt;

    use crate::event::DOCUMENT_CREATED_TYPE;
    use crate::handler::tests::classifier;

    const PAYLOAD: &str = r#"{
        "value": {
            "name": "projects/demo/databases/(default)/documents/users/u1/emails/e1",
            "fields": {
                "subject": {"stringValue": "Invoice due"},
                "bodySnippet": {"stringValue": "Please pay by Friday"}
            }
        }
    }"#;

    fn app(loaded: bool) -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.insert(
            EmailKey::new("u1", "e1"),
            EmailRecord::new("Invoice due", "Please pay by Friday"),
        );
        let clf = loaded.then(|| classifier(Arc::new(Mutex::new(Vec::new()))));
        let state = Arc::new(AppState {
            handler: ClassificationHandler::new(clf, store.clone()),
            template: PathTemplate::parse(EMAILS_PATH).unwrap(),
        });
        (router(state), store)
    }

    fn event(event_type: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .header("ce-id", "evt-1")
            .header("ce-type", event_type)
            .header("ce-subject", "documents/users/u1/emails/e1")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn category(store: &MemoryStore) -> Option<String> {
        store.record(&EmailKey::new("u1", "e1")).unwrap().category
    }

    #[tokio::test]
    async fn created_event_is_classified() {
        let (app, store) = app(true);
        let resp = app
            .oneshot(event(DOCUMENT_CREATED_TYPE, PAYLOAD))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(category(&store).as_deref(), Some("Finance"));
    }

    #[tokio::test]
    async fn unloaded_model_still_acknowledges() {
        let (app, store) = app(false);
        let resp = app
            .oneshot(event(DOCUMENT_CREATED_TYPE, PAYLOAD))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(category(&store), None);
    }

    #[tokio::test]
    async fn failed_write_still_acknowledges() {
        let (app, store) = app(true);
        store.fail_writes(true);
        let resp = app
            .oneshot(event(DOCUMENT_CREATED_TYPE, PAYLOAD))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(category(&store), None);
    }

    #[tokio::test]
    async fn malformed_and_foreign_events_acknowledged() {
        let (app, store) = app(true);
        let resp = app
            .clone()
            .oneshot(event(DOCUMENT_CREATED_TYPE, "{not json"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app
            .oneshot(event("google.cloud.firestore.document.v1.deleted", PAYLOAD))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(category(&store), None);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn health_reports_model_state() {
        for loaded in [true, false] {
            let (app, _) = app(loaded);
            let resp = app
                .oneshot(
                    Request::builder()
                        .uri("/healthz")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
            let body = resp.into_body().collect().await.unwrap().to_bytes();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["status"], "ok");
            assert_eq!(json["model_loaded"], loaded);
        }
    }
}
