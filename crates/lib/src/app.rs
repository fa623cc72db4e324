//! Chat front-end state: selection -> routing config -> gateway -> turns.
//!
//! `ChatApp` is the explicit state of one user session. Changing the selection rewrites the
//! routing config and rebuilds the gateway; a config write or gateway build failure halts the
//! app. Submitting a message runs one inference and records its outcome in the transcript,
//! whether it succeeded or not.

use crate::catalog::ModelCatalog;
use crate::gateway::{Gateway, GatewayBuilder, GatewaySettings, InitError};
use crate::routing::{self, ConfigSink, ConfigWriteError, ProviderKind, ProviderSelection, SelectionError};
use crate::session::{ConversationSession, SessionError, Turn};

/// Shown with gateway init failures.
pub const INIT_HINT: &str = "Make sure ClickHouse and the gateway are running and OPENROUTER_API_KEY is set.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    ConfigWrite(#[from] ConfigWriteError),
    #[error("initializing gateway: {0}")]
    Init(#[from] InitError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("no model selected")]
    NoSelection,
    #[error("session halted: {0}")]
    Halted(String),
}

/// Why a model could not be chosen for a provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChooseError {
    #[error("No Ollama models found. Please ensure Ollama is running and models are downloaded.")]
    NoLocalModels,
    #[error("model {model} is not offered by {provider}")]
    UnknownModel {
        provider: ProviderKind,
        model: String,
    },
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Pick a model from the provider's catalog: the requested one if offered, otherwise
/// the default remote model (OpenRouter) or the first local model (Ollama).
pub async fn choose_model(
    catalog: &ModelCatalog,
    provider: ProviderKind,
    requested: Option<&str>,
) -> Result<ProviderSelection, ChooseError> {
    let models = catalog.models_for(provider).await;
    if provider == ProviderKind::Ollama && models.is_empty() {
        return Err(ChooseError::NoLocalModels);
    }
    let model = match requested.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) if models.iter().any(|x| x == m) => m.to_string(),
        Some(m) => {
            return Err(ChooseError::UnknownModel {
                provider,
                model: m.to_string(),
            })
        }
        None => match provider {
            ProviderKind::OpenRouter => catalog.default_remote_model().to_string(),
            ProviderKind::Ollama => models[0].clone(),
        },
    };
    Ok(ProviderSelection::new(provider, model)?)
}

/// One user session.
pub struct ChatApp {
    builder: Box<dyn GatewayBuilder>,
    settings: GatewaySettings,
    sink: Box<dyn ConfigSink + Send>,
    selection: Option<ProviderSelection>,
    gateway: Option<Box<dyn Gateway>>,
    session: ConversationSession,
    halted: Option<String>,
}

impl ChatApp {
    pub fn new(
        builder: Box<dyn GatewayBuilder>,
        settings: GatewaySettings,
        sink: Box<dyn ConfigSink + Send>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            builder,
            settings,
            sink,
            selection: None,
            gateway: None,
            session: ConversationSession::new(system_prompt),
            halted: None,
        }
    }

    pub fn selection(&self) -> Option<&ProviderSelection> {
        self.selection.as_ref()
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Reason the app stopped accepting input, if it did.
    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    pub fn set_system_prompt(&mut self, text: impl Into<String>) {
        self.session.set_system_prompt(text);
    }

    /// Rewrite the routing config for `selection`, then rebuild the gateway from it.
    /// The transcript and episode carry over.
    pub async fn select(&mut self, selection: ProviderSelection) -> Result<(), AppError> {
        self.ensure_running()?;

        if let Err(e) = routing::write_routing_config(&mut *self.sink, &selection) {
            return Err(self.halt(e.into()));
        }
        // The old gateway serves the old routing; never keep it past a rewrite.
        if let Some(mut old) = self.gateway.take() {
            old.shutdown().await;
        }
        match self.builder.build(&self.settings).await {
            Ok(gateway) => {
                log::info!("selected {}", selection);
                self.gateway = Some(gateway);
                self.selection = Some(selection);
                Ok(())
            }
            Err(e) => Err(self.halt(e.into())),
        }
    }

    /// Send one user message and return the assistant turn it produced.
    pub async fn submit(&mut self, text: &str) -> Result<&Turn, AppError> {
        self.ensure_running()?;
        let gateway = self.gateway.as_ref().ok_or(AppError::NoSelection)?;

        self.session.append_user_turn(text)?;
        let request = self.session.build_request(gateway.function_name());
        let result = gateway.infer(&request).await;
        if let Err(e) = &result {
            log::warn!("inference failed: {}", e);
        }
        Ok(self.session.apply_response(result))
    }

    fn ensure_running(&self) -> Result<(), AppError> {
        match &self.halted {
            Some(reason) => Err(AppError::Halted(reason.clone())),
            None => Ok(()),
        }
    }

    fn halt(&mut self, err: AppError) -> AppError {
        log::error!("{}", err);
        self.halted = Some(err.to_string());
        err
    }
}
