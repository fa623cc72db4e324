//! Inference gateway client boundary.
//!
//! A gateway is built from the generated routing config plus its storage URL and exposes
//! a single `infer` call. `HttpGateway` talks to a TensorZero gateway over HTTP; when a
//! launch command is configured it also owns the gateway process, so every rebuild
//! restarts the server on the freshly written routing config.

mod client;
mod process;
mod protocol;

pub use client::{HttpGateway, HttpGatewayBuilder};
pub use process::{GatewayProcess, STORAGE_URL_ENV};
pub use protocol::{
    ContentBlock, InferenceInput, InferenceRequest, InferenceResponse, InputMessage, Role, Usage,
};

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// What a gateway is constructed from.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Gateway HTTP base URL (e.g. http://localhost:3000).
    pub gateway_url: String,
    /// Backing store URL (ClickHouse HTTP interface, credentials allowed).
    pub storage_url: String,
    /// Routing config the gateway serves.
    pub config_path: PathBuf,
    /// Start the gateway ourselves. `None` attaches to one already listening at `gateway_url`.
    pub launch: Option<GatewayLaunch>,
}

/// How to start the gateway process.
#[derive(Debug, Clone)]
pub struct GatewayLaunch {
    /// Executable, e.g. `gateway` from the TensorZero release.
    pub command: PathBuf,
    /// Arguments placed before `--config-file <path>`.
    pub args: Vec<String>,
    /// How long to wait for `/health` after starting.
    pub startup_timeout: Duration,
}

/// Gateway construction failed; the session cannot proceed.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("reading routing config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing routing config {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("routing config {} defines no chat function", .path.display())]
    NoChatFunction { path: PathBuf },
    #[error("invalid {what} url {url:?}: {message}")]
    InvalidUrl {
        what: &'static str,
        url: String,
        message: String,
    },
    #[error("storage unreachable at {url}: {message}")]
    StorageUnreachable { url: String, message: String },
    #[error("gateway unreachable at {url}: {message}")]
    GatewayUnreachable { url: String, message: String },
    #[error("starting gateway {}: {source}", .command.display())]
    Spawn {
        command: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("gateway {} exited during startup ({status})", .command.display())]
    GatewayExited { command: PathBuf, status: String },
}

/// A single inference call failed (transport or gateway error).
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gateway returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Built gateway: one function to call, one operation.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Function name from the routing config the gateway was built with.
    fn function_name(&self) -> &str;

    async fn infer(&self, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError>;

    /// Release whatever the gateway owns. Called before a rebuild replaces it.
    async fn shutdown(&mut self) {}
}

/// Builds a gateway from settings; called again after every routing config rewrite.
#[async_trait]
pub trait GatewayBuilder: Send + Sync {
    async fn build(&self, settings: &GatewaySettings) -> Result<Box<dyn Gateway>, InitError>;
}
