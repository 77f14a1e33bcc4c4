//! # ghost-core
//!
//! Backend-neutral core of ghost: bootstrap external tool providers, gate
//! every tool call behind human confirmation, and drive the chat loop for
//! any conversational backend.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   registry   ┌───────────────────┐
//! │  Bootstrap   │─────────────►│ InvocationGateway │◄── tool calls ──┐
//! └──────┬───────┘              └───────────────────┘                 │
//!        │ ToolLauncher                                     ┌─────────┴──────────┐
//!        ▼                                                  │ ConversationEngine │
//! ┌──────────────┐                                          └─────────┬──────────┘
//! │ ToolProvider │ (one per external process)                         │ TurnBackend
//! └──────────────┘                                          ┌─────────▼──────────┐
//!                                                           │    LlmProvider     │
//!                                                           └────────────────────┘
//! ```
//!
//! Process and network code lives in `ghost-runtime`; this crate only
//! defines the seams and the logic between them.

pub mod bootstrap;
pub mod console;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

pub use bootstrap::{BootstrapProgress, ToolRuntime, bootstrap};
pub use console::{HumanConsole, Notice};
pub use engine::ConversationEngine;
pub use error::{GhostError, Result};
pub use gateway::InvocationGateway;
pub use message::{Turn, TurnRole};
pub use provider::{
    BackendKind, BackendReply, ChatOutcome, LlmConfig, LlmProvider, Prompt, ToolOutput,
    TurnBackend, TurnInput,
};
pub use session::ConversationState;
pub use tool::{
    InputSchema, SchemaType, SubSchema, ToolCallRequest, ToolCallResult, ToolContent,
    ToolDescriptor, ToolLauncher, ToolProvider, ToolProviderConfig, ToolRegistry,
};
