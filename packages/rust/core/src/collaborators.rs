//! Seams between the orchestrator and its external services.
//!
//! The orchestrator only ever talks to these traits, so tests can swap in
//! scripted fakes for the reasoning and indexing services.

use async_trait::async_trait;
use lexrisk_indexing::{IndexMetadata, IndexingClient};
use lexrisk_reasoning::ReasoningClient;
use lexrisk_shared::{Identity, Result};

/// Analyzes one chunk of text and returns the model's answer.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn analyze(&self, chunk: &str) -> Result<String>;
}

#[async_trait]
impl Reasoner for ReasoningClient {
    async fn analyze(&self, chunk: &str) -> Result<String> {
        ReasoningClient::analyze(self, chunk).await
    }
}

/// Receives finished documents for similarity search.
#[async_trait]
pub trait Indexer: Send + Sync {
    async fn index(&self, identity: &Identity, text: &str, metadata: &IndexMetadata)
    -> Result<()>;
}

#[async_trait]
impl Indexer for IndexingClient {
    async fn index(
        &self,
        identity: &Identity,
        text: &str,
        metadata: &IndexMetadata,
    ) -> Result<()> {
        self.send(identity, text, metadata).await
    }
}
