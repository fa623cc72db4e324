//! Conversation session: transcript, system prompt, and episode continuity.
//!
//! The session assembles each outgoing inference request from the transcript and applies
//! the gateway's answer. The system prompt is merged into the outgoing copy of the first
//! user turn only; stored turns keep the user's text as typed. The episode id is adopted
//! from the first response that carries one and never changes afterwards.

use crate::gateway::{InferenceError, InferenceInput, InferenceRequest, InferenceResponse, InputMessage};

pub use crate::gateway::Role;

/// Assistant text used when a response has no text block.
pub const FALLBACK_REPLY: &str = "Sorry, I couldn't get a response from the model.";

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No turns yet.
    Empty,
    /// At least one turn.
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("message must not be empty")]
    EmptyMessage,
}

/// One user's conversation: ordered turns, active system prompt, and write-once episode id.
#[derive(Debug, Clone, Default)]
pub struct ConversationSession {
    transcript: Vec<Turn>,
    episode_id: Option<String>,
    system_prompt: String,
}

impl ConversationSession {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            transcript: Vec::new(),
            episode_id: None,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.transcript.is_empty() {
            SessionPhase::Empty
        } else {
            SessionPhase::Active
        }
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn episode_id(&self) -> Option<&str> {
        self.episode_id.as_deref()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Replace the system prompt; applies from the next `build_request`.
    pub fn set_system_prompt(&mut self, text: impl Into<String>) {
        self.system_prompt = text.into();
    }

    pub fn append_user_turn(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        self.transcript.push(Turn::user(text));
        Ok(())
    }

    /// One message per turn, in order. The first user turn's outgoing content is prefixed
    /// with the system prompt (when set) on every request, not only the first one.
    pub fn build_request(&self, function_name: &str) -> InferenceRequest {
        let first_user = if self.system_prompt.is_empty() {
            None
        } else {
            self.transcript.iter().position(|t| t.role == Role::User)
        };

        let messages = self
            .transcript
            .iter()
            .enumerate()
            .map(|(i, turn)| {
                let content = if Some(i) == first_user {
                    format!("{}\n\n{}", self.system_prompt, turn.content)
                } else {
                    turn.content.clone()
                };
                InputMessage {
                    role: turn.role,
                    content,
                }
            })
            .collect();

        InferenceRequest {
            function_name: function_name.to_string(),
            input: InferenceInput { messages },
            episode_id: self.episode_id.clone(),
        }
    }

    /// Append the assistant turn for a gateway result. Failures become a visible
    /// assistant message and leave the episode id untouched.
    pub fn apply_response(&mut self, result: Result<InferenceResponse, InferenceError>) -> &Turn {
        let reply = match result {
            Ok(response) => {
                if self.episode_id.is_none() {
                    if let Some(id) = response.episode() {
                        log::debug!("session: episode {}", id);
                        self.episode_id = Some(id.to_string());
                    }
                }
                response
                    .first_text()
                    .map(str::to_string)
                    .unwrap_or_else(|| FALLBACK_REPLY.to_string())
            }
            Err(e) => format!("An error occurred: {}", e),
        };
        self.transcript.push(Turn::assistant(reply));
        &self.transcript[self.transcript.len() - 1]
    }
}
