//! OpenAI Responses backend
//!
//! Stateful on the server: each request names the previous response through
//! `previous_response_id`, so only the new input is sent. Tool results go
//! back as `function_call_output` items correlated by `call_id`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use ghost_core::{
    BackendKind, BackendReply, ChatOutcome, ConversationEngine, GhostError, InvocationGateway,
    LlmConfig, LlmProvider, Prompt, Result, ToolCallRequest, ToolDescriptor, TurnBackend,
    TurnInput,
};

use crate::http::{resolve_api_key, resolve_base_url, send_json};
use crate::openai_chat::{API_KEY_ENV, DEFAULT_BASE_URL};

pub struct OpenAiResponseProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiResponseProvider {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: resolve_base_url(&config.host, DEFAULT_BASE_URL),
            api_key: resolve_api_key(&config.api_key, API_KEY_ENV),
        }
    }

    /// Tool declarations in the flat responses-API shape
    pub fn response_tools(tools: &[ToolDescriptor]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema.to_value(),
                    "strict": false,
                })
            })
            .collect()
    }

    async fn create(&self, body: &Value) -> Result<ResponseObject> {
        let request = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body);
        send_json(request).await
    }
}

#[derive(Debug, Deserialize)]
struct ResponseObject {
    id: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    Message {
        #[serde(default)]
        content: Vec<MessageContent>,
    },
    FunctionCall {
        call_id: String,
        name: String,
        #[serde(default)]
        arguments: String,
    },
    Reasoning {},
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Per-session continuation state
struct ResponseSession<'a> {
    provider: &'a OpenAiResponseProvider,
    model: String,
    tools: Vec<Value>,
    instructions: Option<String>,
    previous_response_id: Option<String>,
}

impl<'a> ResponseSession<'a> {
    fn new(
        provider: &'a OpenAiResponseProvider,
        prompt: &Prompt,
        model: &str,
        tools: &[ToolDescriptor],
    ) -> Self {
        Self {
            provider,
            model: model.to_string(),
            tools: OpenAiResponseProvider::response_tools(tools),
            instructions: prompt.system.clone(),
            previous_response_id: None,
        }
    }

    fn request_body(&self, input: TurnInput) -> Value {
        let input = match input {
            TurnInput::Human(text) => Value::String(text),
            TurnInput::ToolResults(outputs) => Value::Array(
                outputs
                    .into_iter()
                    .map(|o| {
                        json!({
                            "type": "function_call_output",
                            "call_id": o.call_id.unwrap_or_default(),
                            "output": o.text,
                        })
                    })
                    .collect(),
            ),
        };

        let mut body = json!({
            "model": self.model,
            "input": input,
            "store": true,
        });
        if !self.tools.is_empty() {
            body["tools"] = Value::Array(self.tools.clone());
        }
        if let Some(previous) = &self.previous_response_id {
            body["previous_response_id"] = json!(previous);
        }
        if let Some(instructions) = &self.instructions {
            body["instructions"] = json!(instructions);
        }
        body
    }
}

fn parse_reply(response: ResponseObject) -> Result<BackendReply> {
    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();

    for item in response.output {
        match item {
            OutputItem::Message { content } => texts.extend(
                content
                    .into_iter()
                    .filter(|c| c.kind == "output_text")
                    .map(|c| c.text),
            ),
            OutputItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => {
                let arguments = ToolCallRequest::parse_arguments(&name, &arguments)?;
                tool_calls.push(ToolCallRequest::new(name, arguments).with_id(call_id));
            }
            OutputItem::Reasoning {} => tracing::trace!("Skipping reasoning item"),
            OutputItem::Unknown => {
                return Err(GhostError::Parse(format!(
                    "unhandled output item in response {}",
                    response.id
                )));
            }
        }
    }

    if tool_calls.is_empty() && response.status != "completed" {
        tracing::warn!(status = %response.status, id = %response.id, "Response did not complete");
    }

    Ok(BackendReply {
        text: texts.join("\n"),
        tool_calls,
        continuation: Some(response.id),
    })
}

#[async_trait]
impl<'a> TurnBackend for ResponseSession<'a> {
    async fn send(&mut self, input: TurnInput) -> Result<BackendReply> {
        let body = self.request_body(input);
        let response = self.provider.create(&body).await?;
        self.previous_response_id = Some(response.id.clone());
        parse_reply(response)
    }
}

#[async_trait]
impl LlmProvider for OpenAiResponseProvider {
    fn api_type(&self) -> BackendKind {
        BackendKind::OpenAiResponse
    }

    async fn converse(
        &self,
        prompt: &Prompt,
        model: &str,
        tools: &[ToolDescriptor],
        gateway: &InvocationGateway,
    ) -> Result<ChatOutcome> {
        let mut session = ResponseSession::new(self, prompt, model, tools);
        ConversationEngine::new(gateway)
            .run(&mut session, &prompt.user, model)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghost_core::ToolOutput;

    fn provider() -> OpenAiResponseProvider {
        OpenAiResponseProvider::new(&LlmConfig {
            name: "test".into(),
            api_type: BackendKind::OpenAiResponse,
            api_key: "sk-test".into(),
            host: "http://localhost:1234/v1/".into(),
            model: "gpt-4.1".into(),
        })
    }

    #[test]
    fn test_first_request_has_no_continuation() {
        let provider = provider();
        let session = ResponseSession::new(&provider, &Prompt::user("hi"), "gpt-4.1", &[]);

        let body = session.request_body(TurnInput::Human("hi".into()));
        assert_eq!(body["input"], "hi");
        assert_eq!(body["store"], true);
        assert!(body.get("previous_response_id").is_none());
        assert_eq!(provider.base_url, "http://localhost:1234/v1");
    }

    #[test]
    fn test_tool_results_continue_previous_response() {
        let provider = provider();
        let mut session = ResponseSession::new(
            &provider,
            &Prompt::user("hi").with_system("terse"),
            "gpt-4.1",
            &[],
        );
        session.previous_response_id = Some("resp_1".into());

        let body = session.request_body(TurnInput::ToolResults(vec![ToolOutput {
            call_id: Some("fc_1".into()),
            name: "ls".into(),
            text: "a.txt".into(),
        }]));
        assert_eq!(body["previous_response_id"], "resp_1");
        assert_eq!(body["instructions"], "terse");
        assert_eq!(body["input"][0]["type"], "function_call_output");
        assert_eq!(body["input"][0]["call_id"], "fc_1");
    }

    #[test]
    fn test_parse_reply_collects_calls_and_token() {
        let response: ResponseObject = serde_json::from_value(json!({
            "id": "resp_2",
            "status": "completed",
            "output": [
                {"type": "reasoning", "id": "rs_1", "summary": []},
                {"type": "message", "content": [{"type": "output_text", "text": "Looking."}]},
                {"type": "function_call", "call_id": "fc_2", "name": "ls", "arguments": "{}"}
            ]
        }))
        .unwrap();

        let reply = parse_reply(response).unwrap();
        assert_eq!(reply.text, "Looking.");
        assert_eq!(reply.continuation.as_deref(), Some("resp_2"));
        assert_eq!(reply.tool_calls[0].id.as_deref(), Some("fc_2"));
    }

    #[test]
    fn test_unknown_output_is_an_error() {
        let response: ResponseObject = serde_json::from_value(json!({
            "id": "resp_3",
            "status": "completed",
            "output": [{"type": "web_search_call", "id": "ws_1"}]
        }))
        .unwrap();

        assert!(matches!(parse_reply(response), Err(GhostError::Parse(_))));
    }

    #[test]
    fn test_malformed_arguments_are_an_error() {
        let response: ResponseObject = serde_json::from_value(json!({
            "id": "resp_4",
            "status": "completed",
            "output": [{"type": "function_call", "call_id": "fc", "name": "ls", "arguments": "{oops"}]
        }))
        .unwrap();

        assert!(matches!(
            parse_reply(response),
            Err(GhostError::MalformedArguments { .. })
        ));
    }
}
