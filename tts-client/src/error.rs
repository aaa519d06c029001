use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TtsError {
    #[error(
        "API key not found for {provider}. Set {env_var} environment variable or add to config."
    )]
    MissingApiKey { provider: String, env_var: String },

    #[error("Provider not available: {0}")]
    ProviderUnavailable(String),

    #[error("Rate limit exceeded{}", .retry_after.map(|s| format!(". Retry after {} seconds", s)).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    #[error("Server overloaded (HTTP 503): {message}")]
    ServerOverloaded { message: String },

    #[error("API error{}: {message}", status_code.map(|c| format!(" (HTTP {})", c)).unwrap_or_default())]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend returned no audio payload")]
    EmptyAudio,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Process error: {0}")]
    Process(String),
}

impl TtsError {
    /// Default classification used by retry loops: anything not known to be
    /// permanent is worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::MissingApiKey { .. }
            | Self::ProviderUnavailable(_)
            | Self::EmptyAudio
            | Self::InvalidInput(_)
            | Self::Config(_) => false,
            Self::ApiError {
                status_code: Some(code),
                ..
            } => !(400..500).contains(code) || *code == 408 || *code == 429,
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, TtsError>;
