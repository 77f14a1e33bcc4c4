//! LLM Provider Strategy Pattern
//!
//! Defines the capability every conversational backend implements, plus the
//! one-exchange [`TurnBackend`] seam the shared conversation engine drives.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ghost_core::provider::{LlmProvider, Prompt};
//!
//! let backend = ghost_runtime::build_provider(&config)?;
//! let outcome = backend
//!     .converse(&Prompt::user("hello"), "gpt-4o", &tools, &gateway)
//!     .await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GhostError, Result};
use crate::gateway::InvocationGateway;
use crate::tool::{ToolCallRequest, ToolDescriptor};

/// Declared API type of a backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Request/response chat completions, history resent every turn
    #[serde(rename = "openaichat")]
    OpenAiChat,
    /// Stateful responses API, history kept server-side
    #[serde(rename = "openairesponse")]
    OpenAiResponse,
    /// Turn-based chat with function declarations
    #[serde(rename = "gemini")]
    Gemini,
}

impl BackendKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAiChat => "openaichat",
            Self::OpenAiResponse => "openairesponse",
            Self::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = GhostError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openaichat" => Ok(Self::OpenAiChat),
            "openairesponse" => Ok(Self::OpenAiResponse),
            "gemini" => Ok(Self::Gemini),
            other => Err(GhostError::Config(format!("unsupported LLM type: {other}"))),
        }
    }
}

/// One configured backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name used to pick this backend on the command line
    pub name: String,

    pub api_type: BackendKind,

    /// Empty means "use the vendor's environment variable"
    #[serde(default)]
    pub api_key: String,

    /// Base URL override
    #[serde(default)]
    pub host: String,

    /// Default model identifier
    #[serde(default)]
    pub model: String,
}

/// Pick the backend named `name`, or the first one when no name is given
pub fn select_llm<'a>(configs: &'a [LlmConfig], name: Option<&str>) -> Result<&'a LlmConfig> {
    let found = match name.filter(|n| !n.is_empty()) {
        Some(wanted) => configs.iter().find(|c| c.name == wanted),
        None => configs.first(),
    };
    found.ok_or_else(|| {
        GhostError::Config(match name {
            Some(wanted) if !wanted.is_empty() => format!("no LLM configuration named '{wanted}'"),
            _ => "no LLM configuration found".into(),
        })
    })
}

/// Opening content of a session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Prompt {
    /// Standing instructions, sent the way each backend expects
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            system: None,
            user: text.into(),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Summary of a finished session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatOutcome {
    /// Last text the backend produced
    pub final_text: String,
    /// Turns recorded in the session
    pub turns: usize,
    /// Tool calls answered
    pub tool_calls: usize,
}

/// A tool result addressed back to the call that asked for it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolOutput {
    pub call_id: Option<String>,
    pub name: String,
    pub text: String,
}

/// What the engine sends in one exchange
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnInput {
    Human(String),
    ToolResults(Vec<ToolOutput>),
}

/// Backend reply: final text, or tool calls (possibly with interim text)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BackendReply {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    /// Token a stateful backend assigned to this reply
    pub continuation: Option<String>,
}

impl BackendReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            ..Default::default()
        }
    }

    /// Names of the requested tools, in request order
    pub fn tool_names(&self) -> Vec<&str> {
        self.tool_calls.iter().map(|c| c.name.as_str()).collect()
    }
}

/// One exchange with a backend, holding whatever per-backend state it needs
#[async_trait]
pub trait TurnBackend: Send {
    async fn send(&mut self, input: TurnInput) -> Result<BackendReply>;
}

/// Strategy trait for conversational backends
///
/// `converse` runs the whole session: each backend owns how tool results
/// are resubmitted and whether history is resent or implied by a token.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Backend kind tag, used for configuration only
    fn api_type(&self) -> BackendKind;

    async fn converse(
        &self,
        prompt: &Prompt,
        model: &str,
        tools: &[ToolDescriptor],
        gateway: &InvocationGateway,
    ) -> Result<ChatOutcome>;
}
