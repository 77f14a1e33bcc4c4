//! Tool Invocation Gateway
//!
//! Every tool call the backend requests passes through here: the human
//! confirms, the name is resolved against the registry, the owning provider
//! is called. Refusal and unknown names come back as ordinary results so the
//! backend always gets a reply to each call it made.

use std::sync::Arc;

use crate::console::{HumanConsole, Notice};
use crate::error::Result;
use crate::tool::{ToolCallRequest, ToolCallResult, ToolRegistry};

/// Results longer than this many words are excerpted for display
const SUMMARY_WORD_THRESHOLD: usize = 20;
/// Words kept from each end of an excerpted result
const SUMMARY_EDGE_WORDS: usize = 10;

pub struct InvocationGateway {
    registry: Arc<ToolRegistry>,
    console: Arc<dyn HumanConsole>,
}

impl InvocationGateway {
    pub fn new(registry: Arc<ToolRegistry>, console: Arc<dyn HumanConsole>) -> Self {
        Self { registry, console }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn console(&self) -> &dyn HumanConsole {
        self.console.as_ref()
    }

    /// Confirm, resolve and invoke one tool call
    ///
    /// Only a transport failure of the owning provider is an error.
    pub async fn invoke(&self, call: &ToolCallRequest) -> Result<ToolCallResult> {
        let arguments =
            serde_json::to_string_pretty(&serde_json::Value::Object(call.arguments.clone()))?;

        self.console.show(Notice::ToolCallPending {
            name: call.name.clone(),
            arguments,
        });
        let answer = self
            .console
            .read_line("Press Enter to continue, or type anything else to refuse:")
            .await?;

        if !answer.is_empty() {
            tracing::info!(tool = %call.name, "Tool call refused by user");
            return Ok(ToolCallResult::refused());
        }

        let Some(provider) = self.registry.resolve(&call.name) else {
            tracing::warn!(tool = %call.name, "Tool not found in any provider");
            return Ok(ToolCallResult::not_found());
        };

        tracing::debug!(tool = %call.name, provider = provider.name(), "Invoking tool");
        let result = provider.call_tool(&call.name, &call.arguments).await?;

        let text = result.text_payload();
        tracing::debug!(tool = %call.name, success = result.success, result = %text, "Tool result");
        self.console
            .show(Notice::ToolOutput(summarize_for_display(text)));

        Ok(result)
    }
}

/// Human-facing excerpt of a tool result; never fed back to the model
pub fn summarize_for_display(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let body = if words.len() <= SUMMARY_WORD_THRESHOLD {
        text.to_string()
    } else {
        format!(
            "{} ... {}",
            words[..SUMMARY_EDGE_WORDS].join(" "),
            words[words.len() - SUMMARY_EDGE_WORDS..].join(" ")
        )
    };
    format!(
        "Tool result (char len: {}, word count: {}): {}",
        text.chars().count(),
        words.len(),
        body
    )
}
