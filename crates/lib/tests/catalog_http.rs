//! Integration test: model listings against a local stand-in for OpenRouter and Ollama.
//! Does not require network access, a real Ollama, or an OpenRouter key.

use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use lib::catalog::{FetchError, ModelCatalog, ModelSource, OllamaClient, OpenRouterClient};
use lib::config::Config;
use serde_json::{json, Value};
use std::sync::Arc;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

fn directory() -> Value {
    json!({
        "data": [
            { "id": "openai/gpt-4o", "name": "GPT-4o" },
            { "id": "google/gemini-pro" },
            { "id": "anthropic/Claude-3-haiku" },
            { "id": "meta-llama/llama-3-8b-instruct" },
            { "id": "stability/sdxl" }
        ]
    })
}

async fn openrouter_models(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if auth != "Bearer sk-test" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "missing or invalid key" })),
        );
    }
    (StatusCode::OK, Json(directory()))
}

async fn ollama_tags() -> Json<Value> {
    Json(json!({
        "models": [
            { "name": "qwen3:8b", "size": 5 },
            { "name": "llama3.2:latest", "size": 2 }
        ]
    }))
}

fn fake_providers() -> Router {
    Router::new()
        .route("/api/v1/models", get(openrouter_models))
        .route("/api/tags", get(ollama_tags))
}

#[tokio::test]
async fn openrouter_listing_is_filtered_and_sorted() {
    let base = spawn_server(fake_providers()).await;
    let client = OpenRouterClient::new(Some(format!("{}/api/v1/", base)), Some("sk-test".into()));
    let models = client.list_models().await.expect("list models");
    assert_eq!(
        models,
        vec![
            "anthropic/Claude-3-haiku",
            "meta-llama/llama-3-8b-instruct",
            "openai/gpt-4o",
        ]
    );
}

#[tokio::test]
async fn openrouter_rejection_is_an_api_error() {
    let base = spawn_server(fake_providers()).await;
    let client = OpenRouterClient::new(Some(format!("{}/api/v1", base)), Some("wrong".into()));
    let err = client.list_models().await.unwrap_err();
    assert!(matches!(err, FetchError::Api { .. }));
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn ollama_listing_is_sorted() {
    let base = spawn_server(fake_providers()).await;
    let client = OllamaClient::new(Some(base));
    assert_eq!(
        client.list_models().await.expect("list models"),
        vec!["llama3.2:latest", "qwen3:8b"]
    );
}

#[tokio::test]
async fn unreachable_catalogs_degrade_to_empty_lists() {
    let dead = format!("http://127.0.0.1:{}", free_port());
    let catalog = ModelCatalog::new(
        Arc::new(OpenRouterClient::new(Some(dead.clone()), Some("sk-test".into()))),
        Arc::new(OllamaClient::new(Some(dead))),
    );
    assert!(catalog.list_remote_models().await.is_empty());
    assert!(catalog.list_local_models().await.is_empty());
    let warnings = catalog.take_warnings().await;
    assert_eq!(warnings.len(), 2);
    assert_eq!(catalog.remote_choices().await, vec!["openai/gpt-4o-mini"]);
}

#[tokio::test]
async fn catalog_from_config_reads_both_sources() {
    let app = Router::new()
        .route("/api/v1/models", get(|| async { Json(directory()) }))
        .route("/api/tags", get(ollama_tags));
    let base = spawn_server(app).await;

    let mut config = Config::default();
    config.providers.openrouter.base_url = format!("{}/api/v1", base);
    config.providers.ollama.base_url = base;
    let catalog = ModelCatalog::from_config(&config);

    let remote = catalog.remote_choices().await;
    assert_eq!(remote[0], "openai/gpt-4o-mini");
    assert_eq!(remote.len(), 4);
    assert_eq!(
        catalog.list_local_models().await,
        vec!["llama3.2:latest", "qwen3:8b"]
    );
    assert!(catalog.take_warnings().await.is_empty());
}
