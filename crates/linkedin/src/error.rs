use thiserror::Error;

use crate::identity::ResolutionFailure;

pub type Result<T, E = LinkedinError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LinkedinError {
    /// Login demanded an extra verification step (captcha, pin, ...).
    #[error("authentication challenge: {0}")]
    AuthenticationChallenge(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("session expired")]
    SessionExpired,
    #[error("authentication failed with status {status}")]
    AuthFailure { status: u16 },
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("rate limited (status {status})")]
    RateLimited { status: u16 },
    #[error("service unavailable (status {status})")]
    ServiceUnavailable { status: u16 },
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error(transparent)]
    ResolutionExhausted(#[from] Box<ResolutionFailure>),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("request timed out")]
    Timeout,
    #[error("http error: {0}")]
    Http(reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for LinkedinError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LinkedinError::Timeout
        } else {
            LinkedinError::Http(err)
        }
    }
}

impl From<ResolutionFailure> for LinkedinError {
    fn from(failure: ResolutionFailure) -> Self {
        LinkedinError::ResolutionExhausted(Box::new(failure))
    }
}

impl LinkedinError {
    /// Build the error for a non-success response whose status the caller
    /// has no dedicated mapping for.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 => LinkedinError::Unauthorized,
            429 => LinkedinError::RateLimited { status },
            503 => LinkedinError::ServiceUnavailable { status },
            _ => LinkedinError::Api {
                status,
                message: message.into(),
            },
        }
    }

    /// Errors that are surfaced to the caller and never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationChallenge(_) | Self::AuthFailure { .. } | Self::NotAuthenticated
        )
    }

    /// Check if this error requires logging in again.
    pub fn requires_relogin(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::SessionExpired)
    }

    /// Check if this error is transient and may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::ServiceUnavailable { .. } | Self::Timeout
        )
    }

    /// Whether a retry (possibly preceded by a fresh login) can succeed.
    pub fn is_recoverable(&self) -> bool {
        self.requires_relogin() || self.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            LinkedinError::from_status(401, "x"),
            LinkedinError::Unauthorized
        ));
        assert!(matches!(
            LinkedinError::from_status(429, "x"),
            LinkedinError::RateLimited { status: 429 }
        ));
        assert!(matches!(
            LinkedinError::from_status(999, "blocked"),
            LinkedinError::Api { status: 999, .. }
        ));
    }

    #[test]
    fn test_classification() {
        assert!(LinkedinError::AuthenticationChallenge("CHALLENGE".into()).is_fatal());
        assert!(!LinkedinError::AuthenticationChallenge("CHALLENGE".into()).requires_relogin());
        assert!(LinkedinError::SessionExpired.requires_relogin());
        assert!(LinkedinError::Unauthorized.requires_relogin());
        assert!(LinkedinError::Timeout.is_transient());
        assert!(!LinkedinError::Unauthorized.is_transient());
    }
}
