use std::sync::Arc;

mod gateway;
mod model;
mod provider;
mod rig_adapter;

pub use gateway::{
    DEFAULT_REQUEST_TIMEOUT, FALLBACK_REPLY, GatewayError, GatewayOptions, GatewayReply,
    GatewayResult, MessageGateway, SYSTEM_INSTRUCTION,
};
pub use model::{
    DEFAULT_GATEWAY_MODEL, DEFAULT_PREFERENCE_MODEL, Model, find_model, resolve_model_id,
    selectable_models,
};
pub use provider::{
    BoxFuture, CompletionRequest, FailureKind, LlmProvider, ProviderConfig, ProviderError,
    ProviderMessage, ProviderResult, Role,
};
pub use rig_adapter::{
    GROQ_ENDPOINT, GROQ_PROVIDER_ID, OPENAI_ENDPOINT, OPENAI_PROVIDER_ID, RigProviderAdapter,
};

/// Provider used when the caller does not name one.
pub const DEFAULT_PROVIDER_ID: &str = GROQ_PROVIDER_ID;

/// Default endpoint for a known provider id.
pub fn default_endpoint(provider_id: &str) -> Option<&'static str> {
    match provider_id {
        GROQ_PROVIDER_ID => Some(GROQ_ENDPOINT),
        OPENAI_PROVIDER_ID | "rig-openai" => Some(OPENAI_ENDPOINT),
        _ => None,
    }
}

pub fn create_provider(mut config: ProviderConfig) -> ProviderResult<Arc<dyn LlmProvider>> {
    if config.provider_id.trim().is_empty() {
        config.provider_id = DEFAULT_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        "openai" | "rig-openai" | "groq" => {
            if config.provider_id == "rig-openai" {
                config.provider_id = OPENAI_PROVIDER_ID.to_string();
            }
            if config.endpoint.is_empty()
                && let Some(endpoint) = default_endpoint(&config.provider_id)
            {
                config.endpoint = endpoint.to_string();
            }
            Ok(Arc::new(RigProviderAdapter::new(config)?))
        }
        _ => Err(ProviderError::UnsupportedProvider {
            stage: "create-provider",
            provider_id: config.provider_id,
        }),
    }
}
