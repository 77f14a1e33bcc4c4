//! OpenAI Chat Completions backend
//!
//! Stateless on the server: the whole message history is resent with every
//! request. Tool results go back as `tool` messages keyed by `tool_call_id`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use ghost_core::{
    BackendKind, BackendReply, ChatOutcome, ConversationEngine, GhostError, InvocationGateway,
    LlmConfig, LlmProvider, Prompt, Result, ToolCallRequest, ToolDescriptor, TurnBackend,
    TurnInput,
};

use crate::http::{resolve_api_key, resolve_base_url, send_json};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub struct OpenAiChatProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiChatProvider {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: resolve_base_url(&config.host, DEFAULT_BASE_URL),
            api_key: resolve_api_key(&config.api_key, API_KEY_ENV),
        }
    }

    /// Tool declarations in the chat-completions `tools` shape
    pub fn chat_tools(tools: &[ToolDescriptor]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema.to_value(),
                    }
                })
            })
            .collect()
    }

    async fn complete(&self, body: &Value) -> Result<ChatCompletion> {
        let request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body);
        send_json(request).await
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: FunctionCall,
}

fn function_kind() -> String {
    "function".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Per-session history for one chat
struct ChatSession<'a> {
    provider: &'a OpenAiChatProvider,
    model: String,
    tools: Vec<Value>,
    messages: Vec<Value>,
}

impl<'a> ChatSession<'a> {
    fn new(provider: &'a OpenAiChatProvider, prompt: &Prompt, model: &str, tools: &[ToolDescriptor]) -> Self {
        let mut messages = Vec::new();
        if let Some(system) = &prompt.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        Self {
            provider,
            model: model.to_string(),
            tools: OpenAiChatProvider::chat_tools(tools),
            messages,
        }
    }

    fn append_input(&mut self, input: TurnInput) {
        match input {
            TurnInput::Human(text) => self.messages.push(json!({ "role": "user", "content": text })),
            TurnInput::ToolResults(outputs) => {
                for output in outputs {
                    self.messages.push(json!({
                        "role": "tool",
                        "tool_call_id": output.call_id.unwrap_or_default(),
                        "content": output.text,
                    }));
                }
            }
        }
    }

    fn request_body(&self) -> Value {
        let mut body = json!({ "model": self.model, "messages": self.messages });
        if !self.tools.is_empty() {
            body["tools"] = Value::Array(self.tools.clone());
        }
        body
    }
}

#[async_trait]
impl<'a> TurnBackend for ChatSession<'a> {
    async fn send(&mut self, input: TurnInput) -> Result<BackendReply> {
        self.append_input(input);

        let completion = self.provider.complete(&self.request_body()).await?;
        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| GhostError::Provider("no choices".into()))?;

        let text = message.content.unwrap_or_default();
        let mut assistant = json!({ "role": "assistant", "content": text });
        if !message.tool_calls.is_empty() {
            assistant["tool_calls"] = serde_json::to_value(&message.tool_calls)?;
        }
        self.messages.push(assistant);

        let tool_calls = message
            .tool_calls
            .into_iter()
            .map(|call| {
                let arguments =
                    ToolCallRequest::parse_arguments(&call.function.name, &call.function.arguments)?;
                Ok(ToolCallRequest::new(call.function.name, arguments).with_id(call.id))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BackendReply {
            text,
            tool_calls,
            continuation: None,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiChatProvider {
    fn api_type(&self) -> BackendKind {
        BackendKind::OpenAiChat
    }

    async fn converse(
        &self,
        prompt: &Prompt,
        model: &str,
        tools: &[ToolDescriptor],
        gateway: &InvocationGateway,
    ) -> Result<ChatOutcome> {
        let mut session = ChatSession::new(self, prompt, model, tools);
        ConversationEngine::new(gateway)
            .run(&mut session, &prompt.user, model)
            .await
    }
}
