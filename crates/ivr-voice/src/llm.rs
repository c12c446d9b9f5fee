//! Chat-completion dispatch.
//!
//! [`LlmDispatcher::query`] turns a session history into exactly one
//! completion request and always comes back with something to say: any
//! backend failure is logged and replaced by a fixed apology.

use crate::config::LlmConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use ivr_types::{Role, Turn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Spoken in place of a reply when the completion backend fails.
pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't process your request.";

/// Role of a message in a chat-completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<Role> for ChatRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Caller => Self::User,
            Role::Assistant => Self::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Builds the outbound message list: the system prompt, then every turn in
/// the order it was recorded.
pub fn build_messages(system_prompt: &str, history: &[Turn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::new(ChatRole::System, system_prompt));
    messages.extend(
        history
            .iter()
            .map(|turn| ChatMessage::new(turn.role().into(), turn.text())),
    );
    messages
}

/// A hosted model that completes a conversation.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Sends one completion request and returns the generated text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, VoiceError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `chat/completions` client (Mistral by default).
#[derive(Debug, Clone)]
pub struct HttpCompletionBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpCompletionBackend {
    pub fn new(config: &LlmConfig) -> Result<Self, VoiceError> {
        if config.endpoint.is_empty() {
            return Err(VoiceError::Config("llm.endpoint is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, VoiceError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::Decode(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(VoiceError::EmptyCompletion)
    }
}

/// Issues one completion per call and downgrades every failure to a fallback
/// reply.
#[derive(Clone)]
pub struct LlmDispatcher {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
    fallback: String,
}

impl LlmDispatcher {
    pub fn new(backend: Arc<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            fallback: FALLBACK_REPLY.to_string(),
        }
    }

    /// Replaces the fallback reply. Blank text is ignored so the reply can
    /// never be empty.
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        let fallback = fallback.into();
        if !fallback.trim().is_empty() {
            self.fallback = fallback;
        }
        self
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Sends the request and reports failures as errors.
    pub async fn try_query(
        &self,
        system_prompt: &str,
        history: &[Turn],
    ) -> Result<String, VoiceError> {
        let messages = build_messages(system_prompt, history);
        debug!(messages = messages.len(), "dispatching completion request");

        let text = tokio::time::timeout(self.timeout, self.backend.complete(&messages))
            .await
            .map_err(|_| VoiceError::Timeout(self.timeout))??;

        if text.trim().is_empty() {
            return Err(VoiceError::EmptyCompletion);
        }
        Ok(text)
    }

    /// Returns the generated reply, or the fallback reply if the backend
    /// failed in any way. The result is never empty.
    pub async fn query(&self, system_prompt: &str, history: &[Turn]) -> String {
        match self.try_query(system_prompt, history).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "completion failed, speaking fallback reply");
                self.fallback.clone()
            }
        }
    }
}
