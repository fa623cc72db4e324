//! Model catalog: selectable model ids per provider.
//!
//! Lists come from the OpenRouter model directory and the local Ollama tag list.
//! Successful results are cached per provider for a TTL (checked on read, no timer).
//! Fetch failures never reach the caller: they degrade to an empty list plus a warning.

mod ollama;
mod openrouter;

pub use ollama::{OllamaClient, OllamaModel};
pub use openrouter::{is_chat_model, OpenRouterClient, CHAT_MODEL_KEYWORDS};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

use crate::config::{self, Config};
use crate::routing::ProviderKind;

/// OpenRouter model offered even when the directory omits it.
pub const DEFAULT_REMOTE_MODEL: &str = "openai/gpt-4o-mini";

const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{provider} request failed: {source}")]
    Request {
        provider: ProviderKind,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} api error: {message}")]
    Api {
        provider: ProviderKind,
        message: String,
    },
}

impl FetchError {
    pub(crate) fn request(provider: ProviderKind, source: reqwest::Error) -> Self {
        FetchError::Request { provider, source }
    }
}

/// A provider's model listing.
#[async_trait]
pub trait ModelSource: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Selectable model ids, already filtered and sorted.
    async fn list_models(&self) -> Result<Vec<String>, FetchError>;
}

struct CachedList {
    models: Vec<String>,
    fetched_at: Instant,
}

/// Cached, failure-tolerant view over the remote and local model sources.
pub struct ModelCatalog {
    remote: Arc<dyn ModelSource>,
    local: Arc<dyn ModelSource>,
    default_remote_model: String,
    ttl: Duration,
    cache: RwLock<HashMap<ProviderKind, CachedList>>,
    warnings: Mutex<Vec<String>>,
}

impl ModelCatalog {
    pub fn new(remote: Arc<dyn ModelSource>, local: Arc<dyn ModelSource>) -> Self {
        Self {
            remote,
            local,
            default_remote_model: DEFAULT_REMOTE_MODEL.to_string(),
            ttl: DEFAULT_TTL,
            cache: RwLock::new(HashMap::new()),
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Catalog over the real OpenRouter and Ollama endpoints from config.
    pub fn from_config(config: &Config) -> Self {
        let remote = OpenRouterClient::new(
            Some(config.providers.openrouter.base_url.clone()),
            config::resolve_openrouter_api_key(config),
        );
        let local = OllamaClient::new(Some(config.providers.ollama.base_url.clone()));
        Self::new(Arc::new(remote), Arc::new(local))
            .with_ttl(config.catalog.cache_ttl())
            .with_default_remote_model(config.providers.openrouter.default_model.clone())
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_default_remote_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.default_remote_model = model.trim().to_string();
        }
        self
    }

    pub fn default_remote_model(&self) -> &str {
        &self.default_remote_model
    }

    /// Chat-capable OpenRouter models, sorted. Empty on failure (see `take_warnings`).
    pub async fn list_remote_models(&self) -> Vec<String> {
        self.list(self.remote.as_ref()).await
    }

    /// Local Ollama models, sorted. Empty on failure (see `take_warnings`).
    pub async fn list_local_models(&self) -> Vec<String> {
        self.list(self.local.as_ref()).await
    }

    /// Remote models with the default model inserted first when the directory omits it.
    pub async fn remote_choices(&self) -> Vec<String> {
        let mut models = self.list_remote_models().await;
        if !models.iter().any(|m| m == &self.default_remote_model) {
            models.insert(0, self.default_remote_model.clone());
        }
        models
    }

    /// Selectable models for a provider (remote list includes the default model).
    pub async fn models_for(&self, provider: ProviderKind) -> Vec<String> {
        match provider {
            ProviderKind::OpenRouter => self.remote_choices().await,
            ProviderKind::Ollama => self.list_local_models().await,
        }
    }

    /// Drop all cached lists so the next read refetches.
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }

    /// Warnings recorded by failed fetches since the last call.
    pub async fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.lock().await)
    }

    async fn list(&self, source: &dyn ModelSource) -> Vec<String> {
        let provider = source.provider();
        if let Some(cached) = self.cache.read().await.get(&provider) {
            if cached.fetched_at.elapsed() < self.ttl {
                log::debug!("catalog: {} models served from cache", provider);
                return cached.models.clone();
            }
        }

        match source.list_models().await {
            Ok(models) => {
                log::debug!("catalog: fetched {} {} models", models.len(), provider);
                self.cache.write().await.insert(
                    provider,
                    CachedList {
                        models: models.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                models
            }
            Err(e) => {
                log::warn!("catalog: {}", e);
                self.warnings.lock().await.push(fetch_warning(provider, &e));
                Vec::new()
            }
        }
    }
}

fn fetch_warning(provider: ProviderKind, err: &FetchError) -> String {
    match provider {
        ProviderKind::OpenRouter => format!("Error fetching models from OpenRouter: {}", err),
        ProviderKind::Ollama => format!(
            "Could not connect to Ollama. Make sure Ollama is running. Error: {}",
            err
        ),
    }
}
