//! HTTP client for a document search index exposing the usual
//! `indexes/{uid}/documents` and `indexes/{uid}/search` endpoints.

use std::time::Duration;

use serde::Deserialize;

use crate::{
    projector::IndexDocument,
    search::{IndexError, IndexSettings, SearchHits, SearchIndex, SearchRequest},
};

const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Connection settings for [`HttpSearchIndex`]. Deserializable so callers
/// can embed it in their own configuration files.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Base URL of the index server, e.g. `http://127.0.0.1:7700`.
    pub url: String,
    /// Index uid the listing documents live in.
    pub index_uid: String,
    /// Bearer token, when the server requires one.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "IndexConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl IndexConfig {
    pub fn new(url: impl Into<String>, index_uid: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            index_uid: index_uid.into(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Read settings from `DYNAFIELD_INDEX_URL`, `DYNAFIELD_INDEX_UID`
    /// (default `listings`) and `DYNAFIELD_INDEX_KEY`. Returns `None` when
    /// no URL is configured.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("DYNAFIELD_INDEX_URL").ok()?;
        let index_uid = std::env::var("DYNAFIELD_INDEX_UID").unwrap_or_else(|_| "listings".to_string());
        let api_key = std::env::var("DYNAFIELD_INDEX_KEY").ok();
        Some(Self {
            url,
            index_uid,
            api_key,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    const fn default_timeout_secs() -> u64 {
        DEFAULT_TIMEOUT_SECS
    }
}

/// Reqwest-backed [`SearchIndex`] implementation.
#[derive(Debug, Clone)]
pub struct HttpSearchIndex {
    http: reqwest::Client,
    config: IndexConfig,
}

impl HttpSearchIndex {
    pub fn new(config: IndexConfig) -> Result<Self, IndexError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/indexes/{}/documents",
            self.config.url.trim_end_matches('/'),
            self.config.index_uid
        )
    }

    fn search_url(&self) -> String {
        format!(
            "{}/indexes/{}/search",
            self.config.url.trim_end_matches('/'),
            self.config.index_uid
        )
    }

    fn settings_url(&self) -> String {
        format!(
            "{}/indexes/{}/settings",
            self.config.url.trim_end_matches('/'),
            self.config.index_uid
        )
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, IndexError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(IndexError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl SearchIndex for HttpSearchIndex {
    async fn add_or_update(&self, document: &IndexDocument) -> Result<(), IndexError> {
        let response = self
            .authorize(self.http.post(self.documents_url()))
            .json(&[document])
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn delete_by_id(&self, listing_id: i64) -> Result<(), IndexError> {
        let url = format!("{}/{listing_id}", self.documents_url());
        let response = self.authorize(self.http.delete(url)).send().await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchHits, IndexError> {
        let response = self
            .authorize(self.http.post(self.search_url()))
            .json(request)
            .send()
            .await?;
        let response = Self::expect_success(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|err| IndexError::Decode {
            message: err.to_string(),
        })
    }

    async fn configure(&self, settings: &IndexSettings) -> Result<(), IndexError> {
        let response = self
            .authorize(self.http.patch(self.settings_url()))
            .json(settings)
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }
}
