use std::fmt;
use std::future::Future;
use std::pin::Pin;

use rig::completion::CompletionError;
use rig::http_client::Error as HttpError;
use snafu::Snafu;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub api_key: String,
    pub endpoint: String,
}

impl ProviderConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            endpoint: endpoint.into().trim().to_string(),
        }
    }
}

/// Message author as the provider sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
}

impl ProviderMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// One non-streamed chat completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model_id: String,
    pub messages: Vec<ProviderMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl CompletionRequest {
    pub fn new(model_id: impl Into<String>, messages: Vec<ProviderMessage>) -> Self {
        Self {
            model_id: model_id.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Coarse failure classes callers can react to without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    NotConfigured,
    InvalidRequest,
    Timeout,
    Auth,
    RateLimit,
    MalformedResponse,
    Transport,
    Provider,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotConfigured => "not-configured",
            Self::InvalidRequest => "invalid-request",
            Self::Timeout => "timeout",
            Self::Auth => "auth",
            Self::RateLimit => "rate-limit",
            Self::MalformedResponse => "malformed-response",
            Self::Transport => "transport",
            Self::Provider => "provider",
        }
    }

    /// Classification from an HTTP status; `None` for statuses that are not failures.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 | 403 => Some(Self::Auth),
            429 => Some(Self::RateLimit),
            408 | 504 => Some(Self::Timeout),
            400..=599 => Some(Self::Provider),
            _ => None,
        }
    }

    /// Last-resort classification from an error text with no status attached.
    pub fn from_error_text(text: &str) -> Self {
        let lowered = text.to_ascii_lowercase();
        let mentions = |needles: &[&str]| needles.iter().any(|needle| lowered.contains(needle));

        if mentions(&[
            "unauthorized",
            "forbidden",
            "invalid api key",
            "invalid_api_key",
            "authentication",
        ]) {
            Self::Auth
        } else if mentions(&["rate limit", "rate_limit", "too many requests"]) {
            Self::RateLimit
        } else if mentions(&["timed out", "timeout"]) {
            Self::Timeout
        } else if mentions(&["error sending request", "connection", "dns", "tls"]) {
            Self::Transport
        } else {
            Self::Provider
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("missing API key for provider '{provider_id}'"))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("provider '{provider_id}' is not supported"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("completion request for model '{model_id}' has no user or assistant turns"))]
    EmptyMessageSet {
        stage: &'static str,
        model_id: String,
    },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: HttpError,
    },
    #[snafu(display("completions failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: CompletionError,
    },
}

impl ProviderError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingApiKey { .. } | Self::UnsupportedProvider { .. } => {
                FailureKind::NotConfigured
            }
            Self::EmptyMessageSet { .. } => FailureKind::InvalidRequest,
            Self::HttpClient { source, .. } => http_failure(source),
            Self::CompletionsFailed { source, .. } => match source {
                CompletionError::HttpError(source) => http_failure(source),
                CompletionError::JsonError(_) | CompletionError::ResponseError(_) => {
                    FailureKind::MalformedResponse
                }
                other => FailureKind::from_error_text(&other.to_string()),
            },
        }
    }
}

/// A status-bearing error is classified by its status; anything else is a transport
/// failure unless its text says otherwise.
fn http_failure(error: &HttpError) -> FailureKind {
    let status = match error {
        HttpError::InvalidStatusCode(status)
        | HttpError::InvalidStatusCodeWithMessage(status, _) => {
            FailureKind::from_status(status.as_u16())
        }
        _ => None,
    };

    status.unwrap_or_else(|| match FailureKind::from_error_text(&error.to_string()) {
        FailureKind::Provider => FailureKind::Transport,
        kind => kind,
    })
}

pub trait LlmProvider: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    /// Sends the full message list and resolves with the first textual reply.
    fn complete<'a>(&'a self, request: CompletionRequest) -> BoxFuture<'a, ProviderResult<String>>;
}
