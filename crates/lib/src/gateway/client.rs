//! HTTP client for a TensorZero gateway: startup checks, process ownership, and `POST /inference`.

use async_trait::async_trait;
use reqwest::Url;
use std::path::Path;
use std::time::{Duration, Instant};

use super::{
    Gateway, GatewayBuilder, GatewayLaunch, GatewayProcess, GatewaySettings, InferenceError,
    InferenceRequest, InferenceResponse, InitError,
};
use crate::routing::RoutingConfig;

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(100);
const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Gateway reached over HTTP. Built only after the routing config, storage, and gateway all check out.
pub struct HttpGateway {
    base_url: String,
    function_name: String,
    client: reqwest::Client,
    process: Option<GatewayProcess>,
}

impl HttpGateway {
    /// Read the routing config, ping the storage, start the gateway when `settings.launch`
    /// is set, and wait for its health endpoint.
    pub async fn build(settings: &GatewaySettings) -> Result<Self, InitError> {
        let routing = load_routing_config(&settings.config_path)?;
        let function_name = routing
            .chat_function()
            .ok_or_else(|| InitError::NoChatFunction {
                path: settings.config_path.clone(),
            })?
            .to_string();
        if let Some(provider) = routing.provider_for(&function_name) {
            log::debug!(
                "gateway: function {} routes to {} model {}",
                function_name,
                provider.kind,
                provider.model_name
            );
        }

        let client = reqwest::Client::new();
        ping_storage(&client, &settings.storage_url).await?;

        let base_url = settings.gateway_url.trim_end_matches('/').to_string();
        let process = match &settings.launch {
            Some(launch) => Some(start_gateway(&client, &base_url, launch, settings).await?),
            None => {
                check_health(&client, &base_url).await?;
                None
            }
        };

        log::info!(
            "gateway ready at {} (function {}, config {})",
            base_url,
            function_name,
            settings.config_path.display()
        );
        Ok(Self {
            base_url,
            function_name,
            client,
            process,
        })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    fn function_name(&self) -> &str {
        &self.function_name
    }

    /// POST /inference, non-streaming.
    async fn infer(&self, request: &InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let url = format!("{}/inference", self.base_url);
        let res = self.client.post(&url).json(request).send().await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(InferenceError::Api { status, body });
        }
        let data: InferenceResponse = res.json().await?;
        Ok(data)
    }

    async fn shutdown(&mut self) {
        if let Some(process) = self.process.take() {
            process.stop().await;
        }
    }
}

/// Builds `HttpGateway`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpGatewayBuilder;

#[async_trait]
impl GatewayBuilder for HttpGatewayBuilder {
    async fn build(&self, settings: &GatewaySettings) -> Result<Box<dyn Gateway>, InitError> {
        Ok(Box::new(HttpGateway::build(settings).await?))
    }
}

fn load_routing_config(path: &Path) -> Result<RoutingConfig, InitError> {
    let text = std::fs::read_to_string(path).map_err(|source| InitError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    RoutingConfig::from_toml(&text).map_err(|source| InitError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// URL with credentials removed, for messages.
fn redacted(url: &Url) -> String {
    let mut shown = url.clone();
    let _ = shown.set_username("");
    let _ = shown.set_password(None);
    shown.to_string()
}

/// GET /ping on the storage's HTTP interface (ClickHouse answers "Ok.").
async fn ping_storage(client: &reqwest::Client, storage_url: &str) -> Result<(), InitError> {
    let url = Url::parse(storage_url.trim()).map_err(|e| InitError::InvalidUrl {
        what: "storage",
        url: storage_url.to_string(),
        message: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(InitError::InvalidUrl {
            what: "storage",
            url: redacted(&url),
            message: format!("unsupported scheme {}", url.scheme()),
        });
    }
    let mut ping = url.clone();
    ping.set_path("/ping");
    ping.set_query(None);
    let _ = ping.set_username("");
    let _ = ping.set_password(None);

    let unreachable = |message: String| InitError::StorageUnreachable {
        url: redacted(&url),
        message,
    };
    let res = client
        .get(ping)
        .send()
        .await
        .map_err(|e| unreachable(e.to_string()))?;
    if !res.status().is_success() {
        return Err(unreachable(format!("ping returned {}", res.status())));
    }
    log::debug!("gateway: storage at {} is up", redacted(&url));
    Ok(())
}

/// Start the gateway on the current routing config and poll /health until it answers.
/// The process is killed if it never becomes healthy.
async fn start_gateway(
    client: &reqwest::Client,
    base_url: &str,
    launch: &GatewayLaunch,
    settings: &GatewaySettings,
) -> Result<GatewayProcess, InitError> {
    let mut process = GatewayProcess::spawn(launch, &settings.config_path, &settings.storage_url)?;
    let started = Instant::now();
    loop {
        process.check_running()?;
        let err = match check_health(client, base_url).await {
            Ok(()) => return Ok(process),
            Err(e @ InitError::InvalidUrl { .. }) => {
                process.stop().await;
                return Err(e);
            }
            Err(e) => e,
        };
        if started.elapsed() >= launch.startup_timeout {
            process.stop().await;
            log::warn!("gateway not healthy after {:?}: {}", launch.startup_timeout, err);
            return Err(err);
        }
        tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// GET /health on the gateway.
async fn check_health(client: &reqwest::Client, base_url: &str) -> Result<(), InitError> {
    let url = format!("{}/health", base_url);
    Url::parse(&url).map_err(|e| InitError::InvalidUrl {
        what: "gateway",
        url: base_url.to_string(),
        message: e.to_string(),
    })?;
    let unreachable = |message: String| InitError::GatewayUnreachable {
        url: base_url.to_string(),
        message,
    };
    let res = client
        .get(&url)
        .timeout(HEALTH_REQUEST_TIMEOUT)
        .send()
        .await
        .map_err(|e| unreachable(e.to_string()))?;
    if !res.status().is_success() {
        return Err(unreachable(format!("health returned {}", res.status())));
    }
    Ok(())
}
