//! Firestore REST v1 client for email documents.
//!
//! Writes are partial updates guarded by `updateMask.fieldPaths` so only the
//! named fields change, and by `currentDocument.exists=true` so a deleted
//! email is reported instead of silently recreated.

use std::time::{Duration, Instant};

use mailsort_core::email::CATEGORY_FIELD;
use mailsort_core::{Document, EmailKey, EmailRecord, Value};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{EmailStore, StoreError};

pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_DATABASE: &str = "(default)";

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Connection settings for one Firestore database.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database_id: String,
    /// `host:port` of a local emulator; switches to plain HTTP without auth.
    pub emulator_host: Option<String>,
    /// Fixed OAuth access token; overrides the metadata server.
    pub access_token: Option<String>,
    /// Token endpoint used by [`TokenSource::Metadata`].
    pub metadata_url: String,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: DEFAULT_DATABASE.to_string(),
            emulator_host: None,
            access_token: None,
            metadata_url: METADATA_TOKEN_URL.to_string(),
        }
    }

    fn base_url(&self) -> String {
        match &self.emulator_host {
            Some(host) => format!("http://{}/v1", host.trim_end_matches('/')),
            None => FIRESTORE_BASE_URL.to_string(),
        }
    }

    fn token_source(&self) -> TokenSource {
        match (&self.access_token, &self.emulator_host) {
            (Some(token), _) => TokenSource::Static(token.clone()),
            (None, Some(_)) => TokenSource::None,
            (None, None) => TokenSource::Metadata,
        }
    }
}

/// Where request credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// No `Authorization` header (emulator).
    None,
    Static(String),
    /// The runtime's metadata server, cached until shortly before expiry.
    Metadata,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

/// Firestore REST client scoped to one database.
pub struct FirestoreClient {
    client: reqwest::Client,
    base_url: String,
    database_path: String,
    tokens: TokenSource,
    metadata_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl FirestoreClient {
    pub fn new(config: FirestoreConfig) -> Self {
        let base_url = config.base_url();
        let tokens = config.token_source();
        info!(
            base_url = %base_url,
            project = %config.project_id,
            database = %config.database_id,
            "firestore client configured"
        );
        Self {
            client: reqwest::Client::new(),
            base_url,
            database_path: format!(
                "projects/{}/databases/{}",
                config.project_id, config.database_id
            ),
            tokens,
            metadata_url: config.metadata_url,
            cached: Mutex::new(None),
        }
    }

    /// Replace the token source chosen from the config.
    pub fn with_tokens(mut self, tokens: TokenSource) -> Self {
        self.tokens = tokens;
        self
    }

    /// Full REST URL of an email document.
    pub fn document_url(&self, key: &EmailKey) -> String {
        format!(
            "{}/{}/documents/{}",
            self.base_url,
            self.database_path,
            key.document_path()
        )
    }

    pub fn token_source(&self) -> &TokenSource {
        &self.tokens
    }

    async fn bearer(&self) -> Result<Option<String>, StoreError> {
        match &self.tokens {
            TokenSource::None => Ok(None),
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::Metadata => {
                let mut cached = self.cached.lock().await;
                if let Some(c) = cached.as_ref()
                    && Instant::now() < c.refresh_at
                {
                    return Ok(Some(c.token.clone()));
                }
                let fresh = self.fetch_metadata_token().await?;
                let token = fresh.token.clone();
                *cached = Some(fresh);
                Ok(Some(token))
            }
        }
    }

    async fn fetch_metadata_token(&self) -> Result<CachedToken, StoreError> {
        debug!("fetching access token from metadata server");
        let resp = self
            .client
            .get(&self.metadata_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let token: MetadataToken = resp.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        Ok(CachedToken {
            token: token.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }

    async fn authorize(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        Ok(match self.bearer().await? {
            Some(token) => req.bearer_auth(token),
            None => req,
        })
    }
}

#[async_trait::async_trait]
impl EmailStore for FirestoreClient {
    async fn get(&self, key: &EmailKey) -> Result<Option<EmailRecord>, StoreError> {
        let url = self.document_url(key);
        debug!(url = %url, "fetching email document");

        let resp = self.authorize(self.client.get(&url)).await?.send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp).await?;
        let doc: Document = resp.json().await?;
        Ok(Some(EmailRecord::from_fields(&doc.fields)))
    }

    async fn set_category(&self, key: &EmailKey, category: &str) -> Result<(), StoreError> {
        let url = self.document_url(key);
        let body = Document::with_fields([(CATEGORY_FIELD.to_string(), Value::string(category))]);

        let req = self
            .client
            .patch(&url)
            .query(&[
                ("updateMask.fieldPaths", CATEGORY_FIELD),
                ("currentDocument.exists", "true"),
            ])
            .json(&body);
        let resp = self.authorize(req).await?.send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(key.document_path()));
        }
        check_status(resp).await?;

        debug!(key = %key, category, "category written");
        Ok(())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Server {
        status: status.as_u16(),
        body,
    })
}
