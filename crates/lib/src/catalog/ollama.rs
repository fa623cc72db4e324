//! Ollama tag listing (http://localhost:11434 by default).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{FetchError, ModelSource};
use crate::routing::ProviderKind;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Client for the Ollama HTTP API (model listing only; chat goes through the gateway).
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /api/tags: list locally available models.
    pub async fn tags(&self) -> Result<Vec<OllamaModel>, FetchError> {
        let url = format!("{}/api/tags", self.base_url);
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::request(ProviderKind::Ollama, e))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                provider: ProviderKind::Ollama,
                message: format!("{} {}", status, body),
            });
        }
        let data: TagsResponse = res
            .json()
            .await
            .map_err(|e| FetchError::request(ProviderKind::Ollama, e))?;
        Ok(data.models.unwrap_or_default())
    }
}

#[async_trait]
impl ModelSource for OllamaClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    /// Model names, sorted. No filtering: everything pulled locally is selectable.
    async fn list_models(&self) -> Result<Vec<String>, FetchError> {
        let mut names: Vec<String> = self.tags().await?.into_iter().map(|m| m.name).collect();
        names.sort();
        Ok(names)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaModel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Option<Vec<OllamaModel>>,
}
