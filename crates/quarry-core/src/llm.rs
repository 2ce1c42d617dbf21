//! Language model collaborator.

use anyhow::Result;
use async_trait::async_trait;

/// Temperature used for every call the core makes. Low values keep the
/// action format parseable.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// An opaque text-completion oracle.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt`. Network, auth, and quota problems are errors.
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;
}
