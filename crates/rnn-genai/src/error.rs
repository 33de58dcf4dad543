//! Error types for rnn-genai

use thiserror::Error;

/// Errors produced by the service clients.
#[derive(Error, Debug)]
pub enum GenAiError {
    /// Missing API key or invalid client settings
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection failed, timed out, or the request could not be sent
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response from the remote service
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenAiError {
    /// Whether a retry of the same request could plausibly succeed.
    ///
    /// Client errors other than rate limiting (HTTP 429) and request timeouts
    /// (HTTP 408) are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            GenAiError::Network(_) | GenAiError::Parse(_) | GenAiError::Json(_) => true,
            GenAiError::Api { status, .. } => {
                *status >= 500 || *status == 429 || *status == 408
            }
            GenAiError::Config(_) => false,
        }
    }
}

impl From<reqwest::Error> for GenAiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GenAiError::Parse(err.to_string())
        } else {
            GenAiError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_transient() {
        let err = GenAiError::Api {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert!(err.is_transient());
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_rate_limit_is_transient_but_auth_is_not() {
        let limited = GenAiError::Api {
            status: 429,
            message: "slow down".to_string(),
        };
        let unauthorized = GenAiError::Api {
            status: 401,
            message: "bad key".to_string(),
        };
        assert!(limited.is_transient());
        assert!(!unauthorized.is_transient());
        assert!(!GenAiError::Config("OPENAI_API_KEY not set".into()).is_transient());
    }
}
