// Session and locale error types
use thiserror::Error;

/// Errors raised by the session guard, route gate and locale sync.
///
/// `Clone` so a single identity-check outcome can be handed to every caller
/// that joined the in-flight request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Login failed: {0}")]
    LoginError(String),

    #[error("Failed to get CSRF token: {0}")]
    CsrfTokenError(String),

    #[error("Failed to update language: {0}")]
    LocaleUpdateError(String),

    #[error("Transient network failure: {0}")]
    TransientNetworkFailure(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SessionError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        SessionError::Unauthorized(message.into())
    }

    pub fn login(message: impl Into<String>) -> Self {
        SessionError::LoginError(message.into())
    }

    pub fn csrf(message: impl Into<String>) -> Self {
        SessionError::CsrfTokenError(message.into())
    }

    pub fn locale_update(message: impl Into<String>) -> Self {
        SessionError::LocaleUpdateError(message.into())
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::Unauthorized(_) => "UNAUTHORIZED",
            SessionError::LoginError(_) => "LOGIN_ERROR",
            SessionError::CsrfTokenError(_) => "CSRF_TOKEN_ERROR",
            SessionError::LocaleUpdateError(_) => "LOCALE_UPDATE_ERROR",
            SessionError::TransientNetworkFailure(_) => "TRANSIENT_NETWORK_FAILURE",
            SessionError::Http(_) => "HTTP_ERROR",
            SessionError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Reclassify a failed check that a prior login signal excuses.
    pub fn into_transient(self) -> Self {
        match self {
            SessionError::TransientNetworkFailure(_) => self,
            other => SessionError::TransientNetworkFailure(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(error: reqwest::Error) -> Self {
        SessionError::Http(error.to_string())
    }
}

impl From<std::io::Error> for SessionError {
    fn from(error: std::io::Error) -> Self {
        SessionError::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(error: serde_json::Error) -> Self {
        SessionError::Storage(error.to_string())
    }
}

impl From<url::ParseError> for SessionError {
    fn from(error: url::ParseError) -> Self {
        SessionError::Http(format!("invalid URL: {}", error))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
