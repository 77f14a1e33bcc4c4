//! # ghost-runtime
//!
//! Process and network side of ghost.
//!
//! ## Tool providers
//!
//! - **[`mcp`]**: child processes speaking JSON-RPC over stdio
//!
//! ## Backends
//!
//! - **OpenAI chat** (`openaichat`): chat completions, history resent each turn
//! - **OpenAI responses** (`openairesponse`): server-side history via `previous_response_id`
//! - **Gemini** (`gemini`): `generateContent` with function declarations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ghost_runtime::{McpLauncher, build_provider};
//!
//! let runtime = ghost_core::bootstrap(&config.mcps, Arc::new(McpLauncher::new()), progress).await?;
//! let backend = build_provider(llm_config);
//! backend.converse(&prompt, &model, &runtime.tools, &gateway).await?;
//! ```

pub mod gemini;
pub mod http;
pub mod mcp;
pub mod openai_chat;
pub mod openai_response;

use async_trait::async_trait;

use ghost_core::{
    BackendKind, ChatOutcome, InvocationGateway, LlmConfig, LlmProvider, Prompt, Result,
    ToolDescriptor,
};

pub use gemini::GeminiProvider;
pub use mcp::{McpClient, McpLauncher};
pub use openai_chat::OpenAiChatProvider;
pub use openai_response::OpenAiResponseProvider;

/// Every supported backend, one variant per API type
pub enum Backend {
    OpenAiChat(OpenAiChatProvider),
    OpenAiResponse(OpenAiResponseProvider),
    Gemini(GeminiProvider),
}

impl Backend {
    fn inner(&self) -> &dyn LlmProvider {
        match self {
            Self::OpenAiChat(p) => p,
            Self::OpenAiResponse(p) => p,
            Self::Gemini(p) => p,
        }
    }
}

/// Construct the backend a configuration entry declares
pub fn build_provider(config: &LlmConfig) -> Backend {
    tracing::debug!(name = %config.name, api_type = %config.api_type, "Building LLM backend");
    match config.api_type {
        BackendKind::OpenAiChat => Backend::OpenAiChat(OpenAiChatProvider::new(config)),
        BackendKind::OpenAiResponse => Backend::OpenAiResponse(OpenAiResponseProvider::new(config)),
        BackendKind::Gemini => Backend::Gemini(GeminiProvider::new(config)),
    }
}

#[async_trait]
impl LlmProvider for Backend {
    fn api_type(&self) -> BackendKind {
        self.inner().api_type()
    }

    async fn converse(
        &self,
        prompt: &Prompt,
        model: &str,
        tools: &[ToolDescriptor],
        gateway: &InvocationGateway,
    ) -> Result<ChatOutcome> {
        self.inner().converse(prompt, model, tools, gateway).await
    }
}
