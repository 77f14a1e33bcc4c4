//! Gemini backend
//!
//! Turn-based `generateContent` API. History is resent as `contents`; the
//! model's own turn is appended verbatim so function calls keep their
//! thought signatures. Tool schemas use Gemini's upper-case OpenAPI subset.

use std::collections::HashSet;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use ghost_core::{
    BackendKind, BackendReply, ChatOutcome, ConversationEngine, GhostError, InputSchema,
    InvocationGateway, LlmConfig, LlmProvider, Prompt, Result, SchemaType, SubSchema,
    ToolCallRequest, ToolDescriptor, TurnBackend, TurnInput,
};

use crate::http::{resolve_api_key, resolve_base_url, send_json};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Gemini function-declaration schema
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeminiSchema {
    /// Upper-case type name (OBJECT, ARRAY, STRING, ...)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, GeminiSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<GeminiSchema>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

/// Translate a tool input schema into Gemini's format
///
/// Keywords outside the shared subset are dropped; Gemini rejects them. A
/// type union becomes its first non-null type, marked nullable when the
/// union allows `null`.
pub fn to_gemini_schema(schema: &InputSchema) -> GeminiSchema {
    let schema_type = schema.schema_type.as_ref();
    GeminiSchema {
        schema_type: schema_type
            .and_then(SchemaType::primary)
            .map(str::to_uppercase),
        description: schema.description.clone(),
        nullable: schema_type
            .filter(|t| matches!(t, SchemaType::Union(_)) && t.is_nullable())
            .map(|_| true),
        properties: schema.properties.as_ref().map(|props| {
            props
                .iter()
                .map(|(name, prop)| (name.clone(), sub_schema(prop)))
                .collect()
        }),
        items: schema.items.as_ref().map(|i| Box::new(sub_schema(i))),
        required: schema.required.clone(),
        enum_values: schema.enum_values.as_ref().map(|values| {
            values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        }),
    }
}

/// Raw subschemas carry no usable structure; only a description survives
fn sub_schema(schema: &SubSchema) -> GeminiSchema {
    match schema {
        SubSchema::Schema(schema) => to_gemini_schema(schema),
        SubSchema::Raw(raw) => GeminiSchema {
            description: raw
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            ..GeminiSchema::default()
        },
    }
}

/// Inverse of [`to_gemini_schema`]
pub fn from_gemini_schema(schema: &GeminiSchema) -> InputSchema {
    let schema_type = schema.schema_type.as_ref().map(|t| {
        let name = t.to_lowercase();
        if schema.nullable == Some(true) {
            SchemaType::Union(vec![name, "null".into()])
        } else {
            SchemaType::Single(name)
        }
    });
    InputSchema {
        schema_type,
        description: schema.description.clone(),
        properties: schema.properties.as_ref().map(|props| {
            props
                .iter()
                .map(|(name, prop)| (name.clone(), from_gemini_schema(prop).into()))
                .collect()
        }),
        items: schema.items.as_ref().map(|i| from_gemini_schema(i).into()),
        required: schema.required.clone(),
        enum_values: schema
            .enum_values
            .as_ref()
            .map(|values| values.iter().cloned().map(Value::String).collect()),
        extra: serde_json::Map::new(),
    }
}

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: resolve_base_url(&config.host, DEFAULT_BASE_URL),
            api_key: resolve_api_key(&config.api_key, API_KEY_ENV),
        }
    }

    /// A single `tools` entry holding every function declaration
    pub fn gemini_tools(tools: &[ToolDescriptor]) -> Result<Vec<Value>> {
        if tools.is_empty() {
            return Ok(Vec::new());
        }

        let declarations = tools
            .iter()
            .map(|t| {
                let mut declaration = json!({ "name": t.name, "description": t.description });
                let has_properties = t
                    .input_schema
                    .properties
                    .as_ref()
                    .is_some_and(|p| !p.is_empty());
                if has_properties {
                    declaration["parameters"] =
                        serde_json::to_value(to_gemini_schema(&t.input_schema))?;
                }
                Ok(declaration)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(vec![json!({ "functionDeclarations": declarations })])
    }

    async fn generate(&self, model: &str, body: &Value) -> Result<GenerateContentResponse> {
        let request = self
            .client
            .post(format!("{}/models/{model}:generateContent", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .json(body);
        send_json(request).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentParts {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: serde_json::Map<String, Value>,
}

/// Per-session history for one chat
struct GeminiSession<'a> {
    provider: &'a GeminiProvider,
    model: String,
    tools: Vec<Value>,
    system: Option<String>,
    contents: Vec<Value>,
    /// Call ids made up locally; never echoed back to the backend
    generated_ids: HashSet<String>,
}

impl<'a> GeminiSession<'a> {
    fn new(
        provider: &'a GeminiProvider,
        prompt: &Prompt,
        model: &str,
        tools: &[ToolDescriptor],
    ) -> Result<Self> {
        Ok(Self {
            provider,
            model: model.to_string(),
            tools: GeminiProvider::gemini_tools(tools)?,
            system: prompt.system.clone(),
            contents: Vec::new(),
            generated_ids: HashSet::new(),
        })
    }

    fn append_input(&mut self, input: TurnInput) {
        let parts: Vec<Value> = match input {
            TurnInput::Human(text) => vec![json!({ "text": text })],
            TurnInput::ToolResults(outputs) => outputs
                .into_iter()
                .map(|output| {
                    let mut response = json!({
                        "name": output.name,
                        "response": { "output": output.text },
                    });
                    if let Some(id) = output.call_id.filter(|id| !self.generated_ids.contains(id)) {
                        response["id"] = json!(id);
                    }
                    json!({ "functionResponse": response })
                })
                .collect(),
        };
        self.contents.push(json!({ "role": "user", "parts": parts }));
    }

    fn request_body(&self) -> Value {
        let mut body = json!({ "contents": self.contents });
        if !self.tools.is_empty() {
            body["tools"] = Value::Array(self.tools.clone());
        }
        if let Some(system) = &self.system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }

    /// Record the model turn and pull out its text and function calls
    fn accept_candidate(&mut self, candidate: Candidate) -> Result<BackendReply> {
        let Some(content) = candidate.content else {
            return Err(GhostError::Provider(format!(
                "candidate has no content (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        };
        let parsed: ContentParts = serde_json::from_value(content.clone())?;
        self.contents.push(content);

        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();
        for part in parsed.parts {
            if let Some(call) = part.function_call {
                let id = call.id.unwrap_or_else(|| {
                    let id = uuid::Uuid::new_v4().to_string();
                    self.generated_ids.insert(id.clone());
                    id
                });
                tool_calls.push(ToolCallRequest::new(call.name, call.args).with_id(id));
            } else if let Some(text) = part.text.filter(|_| !part.thought) {
                texts.push(text);
            }
        }

        Ok(BackendReply {
            text: texts.join(""),
            tool_calls,
            continuation: None,
        })
    }
}

#[async_trait]
impl<'a> TurnBackend for GeminiSession<'a> {
    async fn send(&mut self, input: TurnInput) -> Result<BackendReply> {
        self.append_input(input);

        let response = self
            .provider
            .generate(&self.model, &self.request_body())
            .await?;
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| GhostError::Provider("no candidates".into()))?;
        self.accept_candidate(candidate)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn api_type(&self) -> BackendKind {
        BackendKind::Gemini
    }

    async fn converse(
        &self,
        prompt: &Prompt,
        model: &str,
        tools: &[ToolDescriptor],
        gateway: &InvocationGateway,
    ) -> Result<ChatOutcome> {
        let mut session = GeminiSession::new(self, prompt, model, tools)?;
        ConversationEngine::new(gateway)
            .run(&mut session, &prompt.user, model)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghost_core::ToolOutput;

    fn provider() -> GeminiProvider {
        GeminiProvider::new(&LlmConfig {
            name: "gemini".into(),
            api_type: BackendKind::Gemini,
            api_key: "key".into(),
            host: String::new(),
            model: "gemini-2.5-flash".into(),
        })
    }

    fn nested_schema() -> InputSchema {
        InputSchema::object()
            .with_property("path", InputSchema::primitive("string", "Target file"))
            .with_property(
                "options",
                InputSchema {
                    description: Some("Write options".into()),
                    ..InputSchema::object()
                }
                .with_property("append", InputSchema::primitive("boolean", "Append mode"))
                .with_property(
                    "tags",
                    InputSchema {
                        items: Some(InputSchema::primitive("string", "Tag").into()),
                        ..InputSchema::primitive("array", "Tags")
                    },
                ),
            )
            .with_required(&["path", "options"])
    }

    #[test]
    fn test_schema_round_trip_keeps_nesting_and_required() {
        let schema = nested_schema();
        let gemini = to_gemini_schema(&schema);

        assert_eq!(gemini.schema_type.as_deref(), Some("OBJECT"));
        let options = &gemini.properties.as_ref().unwrap()["options"];
        assert_eq!(options.schema_type.as_deref(), Some("OBJECT"));
        assert_eq!(
            options.properties.as_ref().unwrap()["tags"]
                .items
                .as_ref()
                .unwrap()
                .schema_type
                .as_deref(),
            Some("STRING")
        );

        assert_eq!(from_gemini_schema(&gemini), schema);
    }

    #[test]
    fn test_schema_unions_and_raw_subschemas() {
        let schema: InputSchema = serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "limit": {"type": ["null", "integer"], "description": "Max hits"},
                "filter": {"description": "Free-form filter", "anyOf": [{"type": "string"}]},
                "strict": true
            },
            "required": ["query"]
        }))
        .unwrap();
        let gemini = to_gemini_schema(&schema);
        let props = gemini.properties.as_ref().unwrap();

        let names: Vec<_> = props.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["query", "limit", "filter", "strict"]);
        assert_eq!(props["limit"].schema_type.as_deref(), Some("INTEGER"));
        assert_eq!(props["limit"].nullable, Some(true));
        assert_eq!(props["query"].nullable, None);
        assert_eq!(props["filter"].description.as_deref(), Some("Free-form filter"));
        assert_eq!(props["strict"], GeminiSchema::default());

        let back = from_gemini_schema(&props["limit"]);
        assert_eq!(
            back.schema_type,
            Some(SchemaType::Union(vec!["integer".into(), "null".into()]))
        );
    }

    #[test]
    fn test_parameterless_tools_omit_parameters() {
        let tools = vec![
            ToolDescriptor {
                name: "now".into(),
                description: "Current time".into(),
                input_schema: InputSchema::object(),
            },
            ToolDescriptor {
                name: "write".into(),
                description: "Write a file".into(),
                input_schema: nested_schema(),
            },
        ];

        let declared = GeminiProvider::gemini_tools(&tools).unwrap();
        let functions = &declared[0]["functionDeclarations"];
        assert!(functions[0].get("parameters").is_none());
        assert_eq!(functions[1]["parameters"]["type"], "OBJECT");
        assert_eq!(functions[1]["parameters"]["required"][1], "options");
    }

    #[test]
    fn test_generated_call_ids_are_not_sent_back() {
        let provider = provider();
        let mut session =
            GeminiSession::new(&provider, &Prompt::user("hi").with_system("terse"), "m", &[])
                .unwrap();
        session.append_input(TurnInput::Human("hi".into()));

        let candidate: Candidate = serde_json::from_value(json!({
            "content": {
                "role": "model",
                "parts": [
                    {"text": "Checking."},
                    {"functionCall": {"name": "ls", "args": {"dir": "."}}},
                    {"functionCall": {"id": "srv-1", "name": "cat", "args": {}}}
                ]
            },
            "finishReason": "STOP"
        }))
        .unwrap();
        let reply = session.accept_candidate(candidate).unwrap();
        assert_eq!(reply.text, "Checking.");
        assert_eq!(reply.tool_calls.len(), 2);

        let outputs = reply
            .tool_calls
            .iter()
            .map(|call| ToolOutput {
                call_id: call.id.clone(),
                name: call.name.clone(),
                text: "ok".into(),
            })
            .collect();
        session.append_input(TurnInput::ToolResults(outputs));

        let body = session.request_body();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "terse");
        assert_eq!(body["contents"][1]["role"], "model");
        let parts = &body["contents"][2]["parts"];
        assert!(parts[0]["functionResponse"].get("id").is_none());
        assert_eq!(parts[1]["functionResponse"]["id"], "srv-1");
        assert_eq!(parts[1]["functionResponse"]["response"]["output"], "ok");
    }

    #[test]
    fn test_candidate_without_content_is_an_error() {
        let provider = provider();
        let mut session = GeminiSession::new(&provider, &Prompt::user("hi"), "m", &[]).unwrap();
        let candidate: Candidate =
            serde_json::from_value(json!({ "finishReason": "SAFETY" })).unwrap();

        assert!(matches!(
            session.accept_candidate(candidate),
            Err(GhostError::Provider(_))
        ));
    }
}
