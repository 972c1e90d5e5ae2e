//! Clients for the embedding / similarity-search microservice.
//!
//! - [`IndexingClient`] pushes a finished document to `POST {endpoint}/embed`
//! - [`SimilarityClient`] queries `POST {endpoint}/search` for related documents
//!
//! Both talk JSON over plain HTTP to a service on the local network.

use std::collections::HashMap;
use std::time::Duration;

use lexrisk_shared::{DocumentType, Identity, IndexingConfig, LexRiskError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// User-Agent string for indexing requests.
const USER_AGENT: &str = concat!("LexRisk/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Metadata stored next to an embedded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub filename: String,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
}

#[derive(Debug, Serialize)]
struct EmbedPayload<'a> {
    user_id: &'a str,
    text: &'a str,
    metadata: &'a IndexMetadata,
}

#[derive(Debug, Serialize)]
struct SearchPayload<'a> {
    user_id: &'a str,
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    matches: Vec<SimilarMatch>,
}

/// One hit returned by the similarity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarMatch {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// IndexingClient
// ---------------------------------------------------------------------------

/// Sends analyzed documents to the embedding service.
#[derive(Debug, Clone)]
pub struct IndexingClient {
    client: Client,
    embed_url: Url,
}

impl IndexingClient {
    pub fn new(config: &IndexingConfig) -> Result<Self> {
        let base = config.endpoint_url()?;
        Ok(Self {
            client: build_client(config)?,
            embed_url: service_url(&base, "embed")?,
        })
    }

    /// Push `text` for `identity`. Any non-2xx status is an error.
    #[instrument(skip_all, fields(user = %identity, filename = %metadata.filename))]
    pub async fn send(
        &self,
        identity: &Identity,
        text: &str,
        metadata: &IndexMetadata,
    ) -> Result<()> {
        let payload = EmbedPayload {
            user_id: identity.as_str(),
            text,
            metadata,
        };

        let response = self
            .client
            .post(self.embed_url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| LexRiskError::Indexing(format!("{}: {e}", self.embed_url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LexRiskError::Indexing(format!(
                "embedding service returned status {}",
                status.as_u16()
            )));
        }

        debug!(chars = text.chars().count(), "document indexed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SimilarityClient
// ---------------------------------------------------------------------------

/// Finds previously indexed documents similar to a query.
#[derive(Debug, Clone)]
pub struct SimilarityClient {
    client: Client,
    search_url: Url,
}

impl SimilarityClient {
    pub fn new(config: &IndexingConfig) -> Result<Self> {
        let base = config.endpoint_url()?;
        Ok(Self {
            client: build_client(config)?,
            search_url: service_url(&base, "search")?,
        })
    }

    /// Return matches in the order the service ranked them.
    #[instrument(skip_all, fields(user = %identity))]
    pub async fn search(&self, identity: &Identity, query: &str) -> Result<Vec<SimilarMatch>> {
        let payload = SearchPayload {
            user_id: identity.as_str(),
            query,
        };

        let response = self
            .client
            .post(self.search_url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| LexRiskError::Indexing(format!("{}: {e}", self.search_url)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LexRiskError::Indexing(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            let preview: String = body.chars().take(200).collect();
            return Err(LexRiskError::Indexing(format!(
                "search service returned {}: {preview}",
                status.as_u16()
            )));
        }

        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| LexRiskError::Indexing(format!("invalid search response: {e}")))?;

        debug!(matches = parsed.matches.len(), "similarity search complete");
        Ok(parsed.matches)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build_client(config: &IndexingConfig) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| LexRiskError::Indexing(format!("failed to build HTTP client: {e}")))
}

/// Resolve `route` under `base`, keeping any path prefix on the base.
fn service_url(base: &Url, route: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(route)
        .map_err(|e| LexRiskError::config(format!("invalid indexing route '{route}': {e}")))
}
