//! Gateway routing config: provider selection -> TOML with one function, one model, one variant.
//!
//! The file is regenerated on every selection change and fully overwritten; the gateway
//! client re-reads it when it is rebuilt. Emission is pure (`emit`); persistence goes
//! through a `ConfigSink` so it can be exercised without a filesystem.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Function name the chat front-end calls.
pub const FUNCTION_NAME: &str = "chat_app";
/// Sole variant of the chat function.
pub const VARIANT_NAME: &str = "default_variant";
/// OpenAI-compatible endpoint of the local Ollama server, as seen by the gateway.
pub const LOCAL_API_BASE: &str = "http://localhost:11434/v1";

const HEADER: &str = "# Generated by switchboard. Overwritten on every model selection.\n\n";

/// Backing inference source a routing entry dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Hosted API aggregator.
    OpenRouter,
    /// Locally hosted model server.
    Ollama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenRouter, ProviderKind::Ollama];

    /// Lowercase identifier used in config and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Human-facing name.
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "OpenRouter",
            ProviderKind::Ollama => "Ollama",
        }
    }

    /// Provider `type` tag understood by the gateway.
    pub fn type_tag(self) -> &'static str {
        match self {
            ProviderKind::OpenRouter => "openrouter",
            // Ollama is reached through the gateway's generic OpenAI-compatible provider.
            ProviderKind::Ollama => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openrouter" | "open_router" | "remote" => Ok(ProviderKind::OpenRouter),
            "ollama" | "local" => Ok(ProviderKind::Ollama),
            other => Err(format!(
                "unknown provider: {} (expected \"openrouter\" or \"ollama\")",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("model id must not be empty")]
    EmptyModel,
}

/// Provider plus model id. The model id is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelection {
    provider: ProviderKind,
    model_id: String,
}

impl ProviderSelection {
    pub fn new(provider: ProviderKind, model_id: impl Into<String>) -> Result<Self, SelectionError> {
        let model_id = model_id.into();
        if model_id.trim().is_empty() {
            return Err(SelectionError::EmptyModel);
        }
        Ok(Self { provider, model_id })
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl fmt::Display for ProviderSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.provider, self.model_id)
    }
}

/// Parsed or emitted routing config (the subset of the gateway's TOML schema we produce).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionConfig>,
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub variants: BTreeMap<String, VariantConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub weight: f64,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub routing: Vec<String>,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// One model entry with its single provider.
struct ModelRoute {
    model_key: &'static str,
    provider_key: &'static str,
    provider: ProviderConfig,
}

fn openrouter_route(model_id: &str) -> ModelRoute {
    ModelRoute {
        model_key: "openrouter_model",
        provider_key: "openrouter_provider",
        provider: ProviderConfig {
            kind: ProviderKind::OpenRouter.type_tag().to_string(),
            model_name: model_id.to_string(),
            api_base: None,
        },
    }
}

fn ollama_route(model_id: &str) -> ModelRoute {
    ModelRoute {
        model_key: "ollama_model",
        provider_key: "ollama_provider",
        provider: ProviderConfig {
            kind: ProviderKind::Ollama.type_tag().to_string(),
            model_name: model_id.to_string(),
            api_base: Some(LOCAL_API_BASE.to_string()),
        },
    }
}

/// Build the routing config for a selection: function `chat_app` (chat) with one
/// `chat_completion` variant at weight 1.0, routed to one model with one provider.
pub fn emit(selection: &ProviderSelection) -> RoutingConfig {
    let route = match selection.provider() {
        ProviderKind::OpenRouter => openrouter_route(selection.model_id()),
        ProviderKind::Ollama => ollama_route(selection.model_id()),
    };

    let mut variants = BTreeMap::new();
    variants.insert(
        VARIANT_NAME.to_string(),
        VariantConfig {
            kind: "chat_completion".to_string(),
            weight: 1.0,
            model: route.model_key.to_string(),
        },
    );
    let mut functions = BTreeMap::new();
    functions.insert(
        FUNCTION_NAME.to_string(),
        FunctionConfig {
            kind: "chat".to_string(),
            variants,
        },
    );

    let mut providers = BTreeMap::new();
    providers.insert(route.provider_key.to_string(), route.provider);
    let mut models = BTreeMap::new();
    models.insert(
        route.model_key.to_string(),
        ModelConfig {
            routing: vec![route.provider_key.to_string()],
            providers,
        },
    );

    RoutingConfig { functions, models }
}

impl RoutingConfig {
    /// Render as TOML with a generated-file header.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        let body = toml::to_string_pretty(self)?;
        Ok(format!("{}{}", HEADER, body))
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Name of the chat function to call: `chat_app` when present, otherwise the first chat function.
    pub fn chat_function(&self) -> Option<&str> {
        if self
            .functions
            .get(FUNCTION_NAME)
            .is_some_and(|f| f.kind == "chat")
        {
            return Some(FUNCTION_NAME);
        }
        self.functions
            .iter()
            .find(|(_, f)| f.kind == "chat")
            .map(|(name, _)| name.as_str())
    }

    /// Provider block the given function ultimately dispatches to (first variant, first route).
    pub fn provider_for(&self, function: &str) -> Option<&ProviderConfig> {
        let variant = self.functions.get(function)?.variants.values().next()?;
        let model = self.models.get(&variant.model)?;
        let provider_key = model.routing.first()?;
        model.providers.get(provider_key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigWriteError {
    #[error("serializing routing config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("writing routing config to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination for rendered routing config text. Each write replaces the previous content.
pub trait ConfigSink {
    fn write_config(&mut self, text: &str) -> Result<(), ConfigWriteError>;
}

/// In-memory sink.
impl ConfigSink for String {
    fn write_config(&mut self, text: &str) -> Result<(), ConfigWriteError> {
        self.clear();
        self.push_str(text);
        Ok(())
    }
}

/// Sink that overwrites a file on disk, creating parent directories as needed.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSink for FileSink {
    fn write_config(&mut self, text: &str) -> Result<(), ConfigWriteError> {
        let io_err = |source| ConfigWriteError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&self.path, text).map_err(io_err)?;
        log::info!("wrote routing config to {}", self.path.display());
        Ok(())
    }
}

/// Emit the routing config for `selection` and write it to `sink`.
pub fn write_routing_config(
    sink: &mut dyn ConfigSink,
    selection: &ProviderSelection,
) -> Result<RoutingConfig, ConfigWriteError> {
    let config = emit(selection);
    let text = config.to_toml()?;
    sink.write_config(&text)?;
    log::debug!("routing config emitted for {}", selection);
    Ok(config)
}
