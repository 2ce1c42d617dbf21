//! HTTP API tests against a live server built from fake collaborators.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use quarry::config::{parse_config, Config};
use quarry::server::serve;
use quarry::services::{Parts, Services};
use quarry_core::cache::memory::InMemoryCacheStore;
use quarry_core::cache::{AnswerCache, DEFAULT_TTL};
use quarry_core::index::{IndexStats, KeywordIndex, VectorIndex};
use quarry_core::llm::LanguageModel;
use quarry_core::models::{RetrievedItem, SourceKind};

// ─── Fakes ──────────────────────────────────────────────────────────

struct FixedVector;

#[async_trait]
impl VectorIndex for FixedVector {
    async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<RetrievedItem>> {
        Ok([
            "Paris is the capital of France.",
            "France is in western Europe.",
        ]
        .iter()
        .take(top_k)
        .enumerate()
        .map(|(i, c)| RetrievedItem::new(*c, 0.9 - i as f64 * 0.1, SourceKind::Vector))
        .collect())
    }
}

struct DownVector;

#[async_trait]
impl VectorIndex for DownVector {
    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<RetrievedItem>> {
        Err(anyhow!("connection refused"))
    }
}

struct FixedKeyword;

#[async_trait]
impl KeywordIndex for FixedKeyword {
    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<RetrievedItem>> {
        Ok(vec![RetrievedItem::new(
            "The Eiffel Tower is in Paris.",
            7.5,
            SourceKind::Keyword,
        )])
    }

    async fn healthy(&self) -> bool {
        true
    }
}

struct Rows(u64);

#[async_trait]
impl IndexStats for Rows {
    async fn row_count(&self) -> Result<u64> {
        Ok(self.0)
    }
}

/// Answers synthesis prompts directly; in the agent loop, calls the
/// calculator once and then finishes.
struct RoutingModel {
    calls: AtomicUsize,
}

#[async_trait]
impl LanguageModel for RoutingModel {
    async fn complete(&self, prompt: &str, _temperature: f32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.starts_with("Answer the question using only the context") {
            Ok("Paris.".to_string())
        } else if prompt.contains("Observation: Result:") {
            Ok("I now know the answer.\nFinal Answer: 4".to_string())
        } else {
            Ok("I should compute.\nAction: calculator\nAction Input: 2 + 2".to_string())
        }
    }
}

// ─── Harness ────────────────────────────────────────────────────────

fn test_config() -> Config {
    parse_config(
        r#"
[db]
path = "/unused/quarry.sqlite"

[llm]
provider = "disabled"
"#,
    )
    .unwrap()
}

struct TestServer {
    base: String,
    model: Arc<RoutingModel>,
    client: reqwest::Client,
}

async fn start(vector: Arc<dyn VectorIndex>) -> TestServer {
    let model = Arc::new(RoutingModel {
        calls: AtomicUsize::new(0),
    });
    let cache = AnswerCache::connect(Arc::new(InMemoryCacheStore::new()), DEFAULT_TTL).await;
    let services = Services::from_parts(
        test_config(),
        Parts {
            vector,
            keyword: Some(Arc::new(FixedKeyword)),
            stats: Arc::new(Rows(42)),
            model: model.clone(),
            cache,
        },
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(serve(Arc::new(services), listener));
    wait_for_server(port).await;

    TestServer {
        base: format!("http://127.0.0.1:{}", port),
        model,
        client: reqwest::Client::new(),
    }
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Server did not become ready within 5 seconds");
}

impl TestServer {
    async fn post(&self, path: &str, body: serde_json::Value) -> (u16, serde_json::Value) {
        let resp = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn get(&self, path: &str) -> (u16, serde_json::Value) {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let srv = start(Arc::new(FixedVector)).await;
    let (status, body) = srv.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_chat_then_cached() {
    let srv = start(Arc::new(FixedVector)).await;

    let (status, body) = srv
        .post("/chat", serde_json::json!({"question": "What is the capital of France?"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["answer"], "Paris.");
    assert_eq!(body["cached"], false);

    let (_, again) = srv
        .post("/chat", serde_json::json!({"question": "What is the capital of France?"}))
        .await;
    assert_eq!(again["answer"], "Paris.");
    assert_eq!(again["cached"], true);
    assert_eq!(srv.model.calls.load(Ordering::SeqCst), 1);

    let (_, stats) = srv.get("/cache/stats").await;
    assert_eq!(stats["enabled"], true);
    assert_eq!(stats["entries"], 1);
}

#[tokio::test]
async fn test_chat_empty_question_is_bad_request() {
    let srv = start(Arc::new(FixedVector)).await;
    let (status, body) = srv.post("/chat", serde_json::json!({"question": "   "})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_chat_vector_down_is_503() {
    let srv = start(Arc::new(DownVector)).await;
    let (status, body) = srv.post("/chat", serde_json::json!({"question": "anything"})).await;
    assert_eq!(status, 503);
    assert_eq!(body["error"]["code"], "collaborator_unavailable");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("vector index"));
    assert_eq!(srv.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_retrieve_fuses_both_indexes() {
    let srv = start(Arc::new(FixedVector)).await;
    let (status, body) = srv
        .post("/retrieve", serde_json::json!({"question": "paris", "top_k": 3}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["found"], true);
    let context = body["context"].as_str().unwrap();
    assert!(context.starts_with("[Passage 1] Paris is the capital of France."));
    assert!(context.contains("The Eiffel Tower is in Paris."));
    assert!(context.contains("[Passage 3]"));
}

#[tokio::test]
async fn test_retrieve_vector_only() {
    let srv = start(Arc::new(FixedVector)).await;
    let (_, body) = srv
        .post(
            "/retrieve",
            serde_json::json!({"question": "paris", "top_k": 3, "use_hybrid": false}),
        )
        .await;
    let context = body["context"].as_str().unwrap();
    assert!(!context.contains("Eiffel"));
}

#[tokio::test]
async fn test_agent_chat_uses_calculator() {
    let srv = start(Arc::new(FixedVector)).await;
    let (status, body) = srv
        .post("/agent/chat", serde_json::json!({"question": "What is 2 + 2?"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["answer"], "4");
    assert_eq!(body["tool_call_count"], 1);
    assert_eq!(body["steps"][0]["tool_name"], "calculator");
    assert_eq!(body["steps"][0]["observation"], "Result: 4");
}

#[tokio::test]
async fn test_agent_chat_iteration_limit() {
    let srv = start(Arc::new(FixedVector)).await;
    let (status, body) = srv
        .post(
            "/agent/chat",
            serde_json::json!({"question": "What is 2 + 2?", "max_iterations": 1}),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], false);
    assert_eq!(body["tool_call_count"], 1);
    assert!(body["error"].is_string());

    let (status, _) = srv
        .post(
            "/agent/chat",
            serde_json::json!({"question": "x", "max_iterations": 0}),
        )
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_agent_rejects_iterations_above_cap() {
    let srv = start(Arc::new(FixedVector)).await;
    let (status, body) = srv
        .post(
            "/agent/chat",
            serde_json::json!({"question": "x", "max_iterations": 1_000_000}),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = srv
        .post(
            "/agent/chat",
            serde_json::json!({"question": "What is 2 + 2?", "max_iterations": 10}),
        )
        .await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_agent_tools() {
    let srv = start(Arc::new(FixedVector)).await;
    let (status, body) = srv.get("/agent/tools").await;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 5);
    let names: Vec<&str> = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "knowledge_search",
            "calculator",
            "current_time",
            "current_date",
            "document_count"
        ]
    );
}

#[tokio::test]
async fn test_cache_delete_and_clear() {
    let srv = start(Arc::new(FixedVector)).await;
    for q in ["first question", "second question"] {
        srv.post("/chat", serde_json::json!({"question": q})).await;
    }

    let (_, deleted) = srv
        .post("/cache/delete", serde_json::json!({"question": "first question"}))
        .await;
    assert_eq!(deleted["deleted"], true);

    let (_, missing) = srv
        .post(
            "/cache/delete",
            serde_json::json!({"question": "second question", "context": "not the context"}),
        )
        .await;
    assert_eq!(missing["deleted"], false);

    let resp = srv
        .client
        .delete(format!("{}/cache", srv.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 1);

    let (_, stats) = srv.get("/cache/stats").await;
    assert_eq!(stats["entries"], 0);
}

#[tokio::test]
async fn test_stats() {
    let srv = start(Arc::new(FixedVector)).await;
    let (status, body) = srv.get("/stats").await;
    assert_eq!(status, 200);
    assert_eq!(body["row_count"], 42);
}
