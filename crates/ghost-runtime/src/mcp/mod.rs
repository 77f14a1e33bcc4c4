//! Process-backed tool providers.
//!
//! Each configured provider is a child process speaking JSON-RPC over its
//! stdin/stdout. [`McpLauncher`] starts one and completes the handshake;
//! [`McpClient`] is the live handle the registry routes calls to.

pub mod client;
pub mod error;
pub mod protocol;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use ghost_core::{
    GhostError, Result, ToolCallResult, ToolDescriptor, ToolLauncher, ToolProvider,
    ToolProviderConfig,
};

pub use client::McpClient;
pub use error::McpError;

/// How long a provider gets to finish `initialize`
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Starts tool-provider processes
#[derive(Clone, Debug)]
pub struct McpLauncher {
    handshake_timeout: Duration,
}

impl Default for McpLauncher {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl McpLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

#[async_trait]
impl ToolLauncher for McpLauncher {
    async fn start(&self, config: &ToolProviderConfig) -> Result<Arc<dyn ToolProvider>> {
        let client = McpClient::spawn(config).map_err(|e| GhostError::ToolLaunch {
            provider: config.name.clone(),
            message: e.to_string(),
        })?;

        match tokio::time::timeout(self.handshake_timeout, client.initialize()).await {
            Ok(Ok(_)) => Ok(Arc::new(client)),
            Ok(Err(e)) => {
                client.shutdown().await;
                Err(GhostError::Handshake {
                    provider: config.name.clone(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                client.shutdown().await;
                Err(GhostError::HandshakeTimeout {
                    provider: config.name.clone(),
                    secs: self.handshake_timeout.as_secs(),
                })
            }
        }
    }
}

#[async_trait]
impl ToolProvider for McpClient {
    fn name(&self) -> &str {
        McpClient::name(self)
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        self.fetch_tools()
            .await
            .map_err(|e| GhostError::ToolListing {
                provider: self.name().to_string(),
                message: e.to_string(),
            })
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ToolCallResult> {
        let result = self
            .invoke_tool(name, arguments)
            .await
            .map_err(|e| GhostError::ToolTransport {
                tool: name.to_string(),
                message: e.to_string(),
            })?;

        Ok(ToolCallResult {
            success: !result.is_error,
            content: result.content,
            refused: false,
        })
    }

    async fn close(&self) {
        self.shutdown().await;
    }
}
