use std::sync::Arc;
use std::time::Duration;

use snafu::{ResultExt, Snafu};

use super::model::resolve_model_id;
use super::provider::{
    CompletionRequest, FailureKind, LlmProvider, ProviderError, ProviderMessage,
};

/// Persona directive prepended to every request. Never shown or stored in a conversation.
pub const SYSTEM_INSTRUCTION: &str = "Be a compassionate listener and emotional support. \
Acknowledge my feelings, ask thoughtful questions to help me reflect, and offer occasional \
advice only when helpful. Keep the tone casual and responses short like a real conversation. \
Check in on how I'm feeling every now and then, and offer breathing exercises if the \
conversation dies down or I have nothing to say.";

/// Reply shown in place of an assistant answer when the provider call fails.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error while processing your request.";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GatewayError {
    #[snafu(display("no provider configured: {reason}"))]
    NotConfigured {
        stage: &'static str,
        reason: String,
    },
    #[snafu(display("provider request timed out after {timeout:?}"))]
    TimedOut {
        stage: &'static str,
        timeout: Duration,
    },
    #[snafu(display("provider call failed on `{stage}`, {source}"))]
    Provider {
        stage: &'static str,
        source: ProviderError,
    },
}

impl GatewayError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotConfigured { .. } => FailureKind::NotConfigured,
            Self::TimedOut { .. } => FailureKind::Timeout,
            Self::Provider { source, .. } => source.kind(),
        }
    }
}

/// Display text of a settled gateway call.
pub trait GatewayReply {
    /// The reply text, or [`FALLBACK_REPLY`] when the call failed.
    fn text_or_fallback(self) -> String;
}

impl GatewayReply for GatewayResult<String> {
    fn text_or_fallback(self) -> String {
        self.unwrap_or_else(|_| FALLBACK_REPLY.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    pub request_timeout: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Boundary between conversation history and one provider call.
#[derive(Clone)]
pub struct MessageGateway {
    provider: Result<Arc<dyn LlmProvider>, String>,
    instruction: String,
    options: GatewayOptions,
}

impl MessageGateway {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider: Ok(provider),
            instruction: SYSTEM_INSTRUCTION.to_string(),
            options: GatewayOptions::default(),
        }
    }

    /// Gateway whose every call fails with `NotConfigured`, e.g. when no credential was found.
    pub fn unconfigured(reason: impl Into<String>) -> Self {
        Self {
            provider: Err(reason.into()),
            instruction: SYSTEM_INSTRUCTION.to_string(),
            options: GatewayOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GatewayOptions) -> Self {
        self.options = options;
        self
    }

    /// Appends caller text after the fixed instruction; blank text is ignored.
    pub fn with_extra_instruction(mut self, extra: &str) -> Self {
        let extra = extra.trim();
        if !extra.is_empty() {
            self.instruction = format!("{}\n\n{}", self.instruction, extra);
        }
        self
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_ref().ok().map(|provider| provider.name())
    }

    /// Builds the exact message list sent upstream: the instruction followed by `history`.
    pub fn build_messages(&self, history: &[ProviderMessage]) -> Vec<ProviderMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ProviderMessage::system(self.instruction.clone()));
        messages.extend(history.iter().cloned());
        messages
    }

    pub async fn complete(
        &self,
        history: &[ProviderMessage],
        model_id: &str,
    ) -> GatewayResult<String> {
        let provider = match &self.provider {
            Ok(provider) => Arc::clone(provider),
            Err(reason) => {
                tracing::error!(reason = %reason, "gateway called without a configured provider");
                return NotConfiguredSnafu {
                    stage: "gateway-complete",
                    reason: reason.clone(),
                }
                .fail();
            }
        };

        let model_id = resolve_model_id(model_id);
        let mut request = CompletionRequest::new(model_id.clone(), self.build_messages(history));
        if let Some(temperature) = self.options.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.options.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let timeout = self.options.request_timeout;
        let outcome = match tokio::time::timeout(timeout, provider.complete(request)).await {
            Ok(result) => result.context(ProviderSnafu {
                stage: "gateway-complete",
            }),
            Err(_) => TimedOutSnafu {
                stage: "gateway-timeout",
                timeout,
            }
            .fail(),
        };

        if let Err(error) = &outcome {
            tracing::error!(
                provider_id = %provider.id(),
                model_id = %model_id,
                kind = %error.kind(),
                error = %error,
                "gateway call failed"
            );
        }

        outcome
    }
}
