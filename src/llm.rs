//! OpenAI-compatible chat completions client.
//!
//! Sends the prompt as a single user message and returns
//! `choices[0].message.content`. Any endpoint that speaks the chat
//! completions shape works (OpenAI, Zhipu, vLLM, llama.cpp server, ...).

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use quarry_core::llm::LanguageModel;

use crate::config::LlmConfig;
use crate::http::JsonPost;

pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    if !config.is_enabled() {
        return Ok(Arc::new(DisabledModel));
    }
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(ChatClient::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String> {
        bail!("language model provider is disabled")
    }
}

pub struct ChatClient {
    url: String,
    model: String,
    api_key: Option<String>,
    max_retries: u32,
    client: reqwest::Client,
}

impl ChatClient {
    /// The API key is read from `api_key_env` now; a missing key is only an
    /// error once a request is made.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            url: config.url.clone(),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok(),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl LanguageModel for ChatClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": temperature,
        });
        let json = JsonPost {
            client: &self.client,
            url: &self.url,
            bearer: self.api_key.as_deref(),
            body: &body,
            max_retries: self.max_retries,
            service: "Chat",
        }
        .send()
        .await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid chat response: missing choices[0].message.content"))
}
