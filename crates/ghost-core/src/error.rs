//! Error Types

use thiserror::Error;

/// Result type alias for ghost operations
pub type Result<T> = std::result::Result<T, GhostError>;

/// Ghost error types
///
/// Tool-not-found and human refusal are deliberately absent: both travel back
/// to the backend as ordinary [`ToolCallResult`](crate::tool::ToolCallResult)s.
#[derive(Error, Debug)]
pub enum GhostError {
    /// One or more tool providers failed to come up
    #[error("Tool bootstrap failed at provider '{provider}': {message} ({failed} provider(s) failed)")]
    Bootstrap {
        provider: String,
        message: String,
        failed: usize,
    },

    /// Tool provider process could not be launched
    #[error("Failed to launch tool provider '{provider}': {message}")]
    ToolLaunch { provider: String, message: String },

    /// Protocol handshake was rejected or broke off
    #[error("Failed to initialize tool provider '{provider}': {message}")]
    Handshake { provider: String, message: String },

    /// Protocol handshake did not finish in time
    #[error("Tool provider '{provider}' did not finish its handshake within {secs}s")]
    HandshakeTimeout { provider: String, secs: u64 },

    /// Tool listing failed after a successful handshake
    #[error("Failed to list tools of provider '{provider}': {message}")]
    ToolListing { provider: String, message: String },

    /// Transport failure while calling a tool
    #[error("Tool '{tool}' failed: {message}")]
    ToolTransport { tool: String, message: String },

    /// Backend sent tool arguments that do not decode
    #[error("Tool '{tool}': bad args: {message}")]
    MalformedArguments { tool: String, message: String },

    /// LLM backend returned an error
    #[error("Provider error: {0}")]
    Provider(String),

    /// LLM backend unreachable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Reading from the human failed
    #[error("Error reading user input: {0}")]
    HumanInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parse error (e.g. backend reply shape)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl GhostError {
    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Bootstrap { provider, failed, .. } => format!(
                "Could not start the configured tools ('{provider}' and {} other(s) failed).",
                failed.saturating_sub(1)
            ),
            Self::ToolLaunch { provider, .. }
            | Self::Handshake { provider, .. }
            | Self::HandshakeTimeout { provider, .. }
            | Self::ToolListing { provider, .. } => {
                format!("The tool provider '{provider}' could not be started.")
            }
            Self::ToolTransport { tool, .. } => format!("The tool '{tool}' stopped responding."),
            Self::MalformedArguments { tool, .. } => {
                format!("The model sent unreadable arguments for '{tool}'.")
            }
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::Config(msg) => format!("Configuration problem: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for GhostError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_message_names_provider() {
        let err = GhostError::Bootstrap {
            provider: "fs".into(),
            message: "handshake".into(),
            failed: 3,
        };
        assert!(err.to_string().contains("'fs'"));
        assert!(err.user_message().contains("2 other"));
    }
}
