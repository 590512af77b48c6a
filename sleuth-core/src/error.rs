//! Error types for the Sleuth research core.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering LLM providers, capability ports, configuration, and sessions.

/// Top-level error type for the Sleuth core library.
#[derive(Debug, thiserror::Error)]
pub enum SleuthError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

/// Failure of a capability port call (text generation or search).
///
/// A malformed response is routed exactly like a transport failure: every
/// stage maps both onto the same fallback path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("call exceeded its {timeout_secs}s deadline")]
    Timeout { timeout_secs: u64 },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("malformed response: {message}")]
    MalformedResponse { message: String },
}

impl ServiceError {
    pub fn transport(message: impl Into<String>) -> Self {
        ServiceError::Transport {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        ServiceError::MalformedResponse {
            message: message.into(),
        }
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::Transport { .. }
                | ServiceError::Timeout { .. }
                | ServiceError::RateLimited { .. }
        )
    }
}

impl From<LlmError> for ServiceError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ResponseParse { message } => ServiceError::MalformedResponse { message },
            LlmError::Timeout { timeout_secs } => ServiceError::Timeout { timeout_secs },
            LlmError::RateLimited { retry_after_secs } => {
                ServiceError::RateLimited { retry_after_secs }
            }
            other => ServiceError::Transport {
                message: other.to_string(),
            },
        }
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from the session control surface.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Research topic must not be empty")]
    InvalidTopic,

    #[error("Expected {expected} answers, got {got}")]
    AnswerCountMismatch { expected: usize, got: usize },

    #[error("Answer {index} is empty")]
    EmptyAnswer { index: usize },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("A research run is already in progress for this session")]
    AlreadyBusy,

    #[error("Research was cancelled")]
    Cancelled,

    #[error("No active session; call start_session first")]
    NoActiveSession,
}

/// A type alias for results using the top-level `SleuthError`.
pub type Result<T> = std::result::Result<T, SleuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = SleuthError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_session() {
        let err = SleuthError::Session(SessionError::AnswerCountMismatch {
            expected: 5,
            got: 3,
        });
        assert_eq!(err.to_string(), "Session error: Expected 5 answers, got 3");
    }

    #[test]
    fn test_llm_parse_error_maps_to_malformed() {
        let err: ServiceError = LlmError::ResponseParse {
            message: "No choices in response".into(),
        }
        .into();
        assert_eq!(err, ServiceError::malformed("No choices in response"));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_llm_transport_errors_map_to_transport() {
        let err: ServiceError = LlmError::Connection {
            message: "refused".into(),
        }
        .into();
        assert!(matches!(err, ServiceError::Transport { .. }));
        assert!(err.is_transient());

        let err: ServiceError = LlmError::RateLimited {
            retry_after_secs: 5,
        }
        .into();
        assert_eq!(
            err,
            ServiceError::RateLimited {
                retry_after_secs: 5
            }
        );
        assert!(err.is_transient());

        let err: ServiceError = LlmError::Timeout { timeout_secs: 30 }.into();
        assert_eq!(err, ServiceError::Timeout { timeout_secs: 30 });
    }
}
