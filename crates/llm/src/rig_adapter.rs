use rig::OneOrMany;
use rig::completion::{
    AssistantContent, CompletionError, CompletionModel, Message as RigMessage,
};
use rig::prelude::CompletionClient;
use rig::providers::openai;
use snafu::{ResultExt, ensure};

use super::provider::{
    BoxFuture, CompletionRequest, CompletionsFailedSnafu, EmptyMessageSetSnafu, HttpClientSnafu,
    LlmProvider, MissingApiKeySnafu, ProviderConfig, ProviderMessage, ProviderResult, Role,
};

pub const OPENAI_PROVIDER_ID: &str = "openai";
pub const GROQ_PROVIDER_ID: &str = "groq";
pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
pub const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1";

/// rig's errors for a response whose first choice carries no text.
const EMPTY_CHOICE_ERRORS: [&str; 2] = [
    "Response contained no choices",
    "Response contained no message or tool call (empty)",
];

/// OpenAI-compatible provider backed by rig's client.
pub struct RigProviderAdapter {
    config: ProviderConfig,
    name: &'static str,
}

impl RigProviderAdapter {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-adapter-new",
                provider_id: config.provider_id.clone(),
            }
        );

        let name = match config.provider_id.as_str() {
            GROQ_PROVIDER_ID => "Groq",
            _ => "OpenAI",
        };

        Ok(Self { config, name })
    }

    /// Chat Completions client; Groq only serves `/chat/completions` as a stable surface.
    fn build_client(config: &ProviderConfig) -> ProviderResult<openai::CompletionsClient> {
        let mut builder = openai::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder
            .build()
            .map(|client| client.completions_api())
            .context(HttpClientSnafu {
                stage: "build-client",
            })
    }

    fn to_rig_message(message: &ProviderMessage) -> Option<RigMessage> {
        match message.role {
            Role::System => None,
            Role::User => Some(RigMessage::user(message.content.clone())),
            Role::Assistant => Some(RigMessage::assistant(message.content.clone())),
        }
    }

    /// Rig exposes a single preamble field, so system-role messages are folded into it
    /// in order while user/assistant turns are sent as chat messages.
    fn merged_preamble(messages: &[ProviderMessage]) -> Option<String> {
        let parts = messages
            .iter()
            .filter(|message| matches!(message.role, Role::System))
            .map(|message| message.content.trim())
            .filter(|content| !content.is_empty())
            .collect::<Vec<_>>();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// First textual part of the returned choice; a reply without text is an empty string.
    fn first_text(choice: &OneOrMany<AssistantContent>) -> String {
        choice
            .iter()
            .find_map(|content| match content {
                AssistantContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    async fn run_completion(
        config: &ProviderConfig,
        request: CompletionRequest,
    ) -> ProviderResult<String> {
        let client = Self::build_client(config)?;
        let model = client.completion_model(request.model_id.clone());

        let mut messages = request
            .messages
            .iter()
            .filter_map(Self::to_rig_message)
            .collect::<Vec<_>>();

        let Some(prompt) = messages.pop() else {
            tracing::warn!(
                provider_id = %config.provider_id,
                model_id = %request.model_id,
                total_message_count = request.messages.len(),
                "cannot send completion because no user/assistant messages remain"
            );
            return EmptyMessageSetSnafu {
                stage: "run-completion-filter-messages",
                model_id: request.model_id,
            }
            .fail();
        };

        let mut builder = model.completion_request(prompt).messages(messages);

        if let Some(preamble) = Self::merged_preamble(&request.messages) {
            builder = builder.preamble(preamble);
        }

        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature);
        }

        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(CompletionError::ResponseError(message))
                if EMPTY_CHOICE_ERRORS.contains(&message.as_str()) =>
            {
                tracing::debug!(
                    provider_id = %config.provider_id,
                    model_id = %request.model_id,
                    "provider returned no text, treating as empty reply"
                );
                return Ok(String::new());
            }
            Err(source) => {
                return Err(source).context(CompletionsFailedSnafu {
                    stage: "send-completion",
                });
            }
        };

        Ok(Self::first_text(&response.choice))
    }
}

impl LlmProvider for RigProviderAdapter {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn name(&self) -> &str {
        self.name
    }

    fn complete<'a>(&'a self, request: CompletionRequest) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move {
            tracing::debug!(
                provider_id = %self.config.provider_id,
                model_id = %request.model_id,
                message_count = request.messages.len(),
                "sending completion request"
            );
            Self::run_completion(&self.config, request).await
        })
    }
}
