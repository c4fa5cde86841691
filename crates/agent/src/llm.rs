use anyhow::Result;
use async_trait::async_trait;

/// Language-model seam for the conversational reply itself. The turn
/// protocol (classification, routing, state, observability) is deterministic
/// and never depends on this trait.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn respond(&self, context: &str, message: &str) -> Result<String>;
}
