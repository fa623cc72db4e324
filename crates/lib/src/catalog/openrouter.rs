//! OpenRouter model directory (https://openrouter.ai/api/v1/models).

use async_trait::async_trait;
use serde::Deserialize;

use super::{FetchError, ModelSource};
use crate::routing::ProviderKind;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Substrings (lowercase) that mark a directory entry as a chat model.
pub const CHAT_MODEL_KEYWORDS: [&str; 5] = ["chat", "gpt", "llama", "mistral", "claude"];

/// Client for the OpenRouter model listing.
#[derive(Clone)]
pub struct OpenRouterClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// GET /models: every model id in the directory, unfiltered.
    pub async fn model_ids(&self) -> Result<Vec<String>, FetchError> {
        let url = format!("{}/models", self.base_url);
        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        } else {
            log::debug!("openrouter: no API key configured, listing models anonymously");
        }
        let res = req
            .send()
            .await
            .map_err(|e| FetchError::request(ProviderKind::OpenRouter, e))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                provider: ProviderKind::OpenRouter,
                message: format!("{} {}", status, body),
            });
        }
        let data: ModelsResponse = res
            .json()
            .await
            .map_err(|e| FetchError::request(ProviderKind::OpenRouter, e))?;
        Ok(data.data.into_iter().filter_map(|m| m.id).collect())
    }
}

/// True when the id contains one of the chat keywords (case-insensitive).
pub fn is_chat_model(id: &str) -> bool {
    let id = id.to_lowercase();
    CHAT_MODEL_KEYWORDS.iter().any(|k| id.contains(k))
}

#[async_trait]
impl ModelSource for OpenRouterClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    /// Chat-capable model ids, sorted.
    async fn list_models(&self) -> Result<Vec<String>, FetchError> {
        let mut ids: Vec<String> = self
            .model_ids()
            .await?
            .into_iter()
            .filter(|id| is_chat_model(id))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(default)]
    id: Option<String>,
}
