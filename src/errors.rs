//! # Error Types Module
//!
//! Structured errors for the VK API client and configuration loading.
//! Storage and orchestration code uses `anyhow` with context instead.

use thiserror::Error;

/// Errors raised while talking to the VK API or its long-poll server
#[derive(Debug, Error)]
pub enum VkError {
    /// Network or HTTP-level failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// VK answered with an `error` envelope
    #[error("VK API error {code}: {message}")]
    Api { code: i64, message: String },

    /// Response body could not be decoded into the expected shape
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Response decoded but did not contain what the method promises
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl VkError {
    /// True for failures that happened below the API layer (network, HTTP status, body)
    pub fn is_transport(&self) -> bool {
        matches!(self, VkError::Transport(_) | VkError::Decode(_))
    }
}

/// Errors raised while reading configuration from the environment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration key \"{key}\"")]
    Missing { key: String },

    #[error("Invalid value \"{value}\" for configuration key \"{key}\"")]
    Invalid { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_formatting() {
        let api_error = VkError::Api {
            code: 5,
            message: "User authorization failed".to_string(),
        };
        assert_eq!(
            api_error.to_string(),
            "VK API error 5: User authorization failed"
        );

        let missing = ConfigError::Missing {
            key: "VK_GROUP_TOKEN".to_string(),
        };
        assert_eq!(
            missing.to_string(),
            "Missing required configuration key \"VK_GROUP_TOKEN\""
        );
    }

    #[test]
    fn test_transport_classification() {
        let decode = VkError::Decode(serde_json::from_str::<i32>("nope").unwrap_err());
        assert!(decode.is_transport());

        let api = VkError::Api {
            code: 6,
            message: "Too many requests per second".to_string(),
        };
        assert!(!api.is_transport());
    }
}
