//! Integration test: the HTTP gateway builder starts the gateway process itself and restarts
//! it after every routing config rewrite, so a new selection is what the gateway serves.
//!
//! The "gateway" is this test binary re-run through a small shell launcher: it reads the
//! `--config-file` it was given and answers inferences with the routed provider and model.
#![cfg(unix)]

use axum::routing::{get, post};
use axum::{Json, Router};
use lib::app::{AppError, ChatApp};
use lib::gateway::{GatewayLaunch, GatewaySettings, HttpGatewayBuilder, InitError, STORAGE_URL_ENV};
use lib::routing::{FileSink, ProviderKind, ProviderSelection, RoutingConfig};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

const PORT_ENV: &str = "SWITCHBOARD_FAKE_GATEWAY_PORT";
const CONFIG_ENV: &str = "SWITCHBOARD_FAKE_GATEWAY_CONFIG";

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("switchboard-process-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

/// Shell script standing in for the gateway executable. Called as
/// `sh launcher --config-file <path>`, it re-runs this binary's `fake_gateway_process` test.
fn write_launcher(dir: &Path, port: u16) -> PathBuf {
    let exe = std::env::current_exe().expect("test binary path");
    let script = format!(
        "#!/bin/sh\nexport {}={}\nexport {}=\"$2\"\nexec '{}' fake_gateway_process --exact --ignored --nocapture\n",
        PORT_ENV,
        port,
        CONFIG_ENV,
        exe.display()
    );
    let path = dir.join("gateway.sh");
    std::fs::write(&path, script).expect("write launcher");
    path
}

/// Serves /ping like ClickHouse.
async fn spawn_storage() -> String {
    let app = Router::new().route("/ping", get(|| async { "Ok.\n" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}/tensorzero", addr)
}

/// Launch settings that run `script` through `sh`.
fn settings(port: u16, storage_url: String, config_path: PathBuf, script: PathBuf) -> GatewaySettings {
    GatewaySettings {
        gateway_url: format!("http://127.0.0.1:{}", port),
        storage_url,
        config_path,
        launch: Some(GatewayLaunch {
            command: PathBuf::from("sh"),
            args: vec![script.display().to_string()],
            startup_timeout: Duration::from_secs(30),
        }),
    }
}

/// Gateway body when this binary is started by the launcher; a no-op otherwise.
#[tokio::test]
#[ignore = "started as a child process by the launcher"]
async fn fake_gateway_process() {
    let (Ok(port), Ok(config_path)) = (std::env::var(PORT_ENV), std::env::var(CONFIG_ENV)) else {
        return;
    };
    std::env::var(STORAGE_URL_ENV).expect("storage url in environment");
    let text = std::fs::read_to_string(&config_path).expect("routing config");
    let routing = RoutingConfig::from_toml(&text).expect("parse routing config");
    let function = routing.chat_function().expect("chat function").to_string();
    let provider = routing.provider_for(&function).expect("provider").clone();
    let label = format!("[{} {}]", provider.kind, provider.model_name);

    let app = Router::new()
        .route("/health", get(|| async { Json(json!({ "gateway": "ok" })) }))
        .route(
            "/inference",
            post(move |Json(body): Json<Value>| {
                let label = label.clone();
                async move {
                    let last = body["input"]["messages"]
                        .as_array()
                        .and_then(|m| m.last())
                        .and_then(|m| m["content"].as_str())
                        .unwrap_or("")
                        .to_string();
                    Json(json!({
                        "inference_id": "inf-1",
                        "episode_id": body["episode_id"].as_str().unwrap_or("ep-1"),
                        "content": [{ "type": "text", "text": format!("{} {}", label, last) }]
                    }))
                }
            }),
        );
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .expect("bind gateway port");
    axum::serve(listener, app).await.expect("serve");
}

#[tokio::test]
async fn rebuild_after_rewrite_serves_new_routing() {
    let storage = spawn_storage().await;
    let port = free_port();
    let dir = temp_dir();
    let launcher = write_launcher(&dir, port);
    let path = dir.join("tensorzero.toml");

    let mut app = ChatApp::new(
        Box::new(HttpGatewayBuilder),
        settings(port, storage, path.clone(), launcher),
        Box::new(FileSink::new(&path)),
        "",
    );

    app.select(ProviderSelection::new(ProviderKind::Ollama, "qwen3:8b").unwrap())
        .await
        .expect("first gateway starts");
    assert_eq!(
        app.submit("Hi").await.expect("first turn").content,
        "[openai qwen3:8b] Hi"
    );

    app.select(ProviderSelection::new(ProviderKind::OpenRouter, "openai/gpt-4o").unwrap())
        .await
        .expect("gateway restarts");
    assert_eq!(
        app.submit("Again").await.expect("second turn").content,
        "[openrouter openai/gpt-4o] Again"
    );
    assert_eq!(app.session().episode_id(), Some("ep-1"));
    assert_eq!(app.session().transcript().len(), 4);

    drop(app);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn gateway_that_exits_at_startup_halts_the_app() {
    let storage = spawn_storage().await;
    let dir = temp_dir();
    let launcher = dir.join("gateway.sh");
    std::fs::write(&launcher, "echo 'bad config' >&2\nexit 2\n").unwrap();
    let path = dir.join("tensorzero.toml");

    let mut app = ChatApp::new(
        Box::new(HttpGatewayBuilder),
        settings(free_port(), storage, path.clone(), launcher),
        Box::new(FileSink::new(&path)),
        "",
    );
    let err = app
        .select(ProviderSelection::new(ProviderKind::Ollama, "qwen3:8b").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Init(InitError::GatewayExited { .. })));
    assert!(app.halted().is_some());
    let _ = std::fs::remove_dir_all(&dir);
}
