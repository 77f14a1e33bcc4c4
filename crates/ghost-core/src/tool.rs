//! Tool System
//!
//! Vocabulary shared by tool providers, the invocation gateway and the
//! backend adapters. Tools live in external provider processes; this module
//! only describes them and routes names to the provider that serves them.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;

/// JSON Schema `type`: one name or a union such as `["integer", "null"]`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(String),
    Union(Vec<String>),
}

impl SchemaType {
    /// First type name other than `null`
    pub fn primary(&self) -> Option<&str> {
        match self {
            Self::Single(name) => Some(name.as_str()),
            Self::Union(names) => names.iter().map(String::as_str).find(|n| *n != "null"),
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Single(name) => name == "null",
            Self::Union(names) => names.iter().any(|n| n == "null"),
        }
    }
}

impl From<&str> for SchemaType {
    fn from(name: &str) -> Self {
        Self::Single(name.to_string())
    }
}

/// Nested schema of a property or array element
///
/// Boolean schemas and objects whose keywords do not fit [`InputSchema`]
/// are kept as raw JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubSchema {
    Schema(Box<InputSchema>),
    Raw(Value),
}

impl SubSchema {
    pub fn as_schema(&self) -> Option<&InputSchema> {
        match self {
            Self::Schema(schema) => Some(schema),
            Self::Raw(_) => None,
        }
    }
}

impl From<InputSchema> for SubSchema {
    fn from(schema: InputSchema) -> Self {
        Self::Schema(Box::new(schema))
    }
}

/// Structural input schema of a tool
///
/// Mirrors the subset of JSON Schema every backend understands. Anything
/// else a provider publishes is kept in `extra` so JSON-schema-native
/// backends receive the schema unchanged. Property order is the order the
/// provider published.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    /// JSON Schema type (object, array, string, number, integer, boolean)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Nested properties (object schemas)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, SubSchema>>,

    /// Element schema (array schemas)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<SubSchema>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Enum of allowed values
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    /// Remaining JSON Schema keywords, passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl InputSchema {
    /// Empty object schema, used for tools that take no arguments
    pub fn object() -> Self {
        Self {
            schema_type: Some("object".into()),
            properties: Some(IndexMap::new()),
            ..Default::default()
        }
    }

    /// Primitive schema of the given type
    pub fn primitive(schema_type: &str, description: impl Into<String>) -> Self {
        Self {
            schema_type: Some(schema_type.into()),
            description: Some(description.into()),
            ..Default::default()
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, schema: impl Into<SubSchema>) -> Self {
        self.properties
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), schema.into());
        self
    }

    pub fn with_required(mut self, names: &[&str]) -> Self {
        self.required = names.iter().map(|n| (*n).to_string()).collect();
        self
    }

    /// Parse a published schema
    ///
    /// An object whose top-level keywords do not fit the typed fields is
    /// kept whole in `extra`; a non-object becomes an empty object schema.
    pub fn from_value(raw: Value) -> Self {
        let Value::Object(map) = raw else {
            return Self::object();
        };
        serde_json::from_value(Value::Object(map.clone())).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Keeping tool schema as raw JSON");
            Self {
                extra: map,
                ..Default::default()
            }
        })
    }

    /// Render as a plain JSON value (what chat-style backends expect)
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
    }
}

fn published_schema<'de, D>(deserializer: D) -> std::result::Result<InputSchema, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(InputSchema::from_value)
}

/// Published description of one callable tool
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique tool identifier within the registry
    pub name: String,

    /// Human-readable description (shown to the LLM)
    #[serde(default)]
    pub description: String,

    #[serde(default = "InputSchema::object", deserialize_with = "published_schema")]
    pub input_schema: InputSchema,
}

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Backend call identifier, used to correlate results
    #[serde(default)]
    pub id: Option<String>,

    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs; validated only by the provider
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Decode a backend's JSON-encoded argument string
    ///
    /// An empty string means "no arguments"; anything that is not a JSON
    /// object is a [`GhostError::MalformedArguments`](crate::GhostError::MalformedArguments).
    pub fn parse_arguments(
        tool: &str,
        raw: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>> {
        if raw.trim().is_empty() {
            return Ok(serde_json::Map::new());
        }
        serde_json::from_str(raw).map_err(|e| crate::GhostError::MalformedArguments {
            tool: tool.to_string(),
            message: e.to_string(),
        })
    }
}

/// One content item of a tool result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: serde_json::Value,
    },
    #[serde(other)]
    Unsupported,
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Whether the provider reported success
    pub success: bool,

    pub content: Vec<ToolContent>,

    /// Set when the human refused the call; no provider was contacted
    #[serde(default)]
    pub refused: bool,
}

pub const REFUSED_TEXT: &str = "User refused tool call";
pub const NOT_FOUND_TEXT: &str = "Error: tool not found in any tool provider";

impl ToolCallResult {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            success: true,
            content: vec![ToolContent::Text {
                text: output.into(),
            }],
            refused: false,
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::text(output)
        }
    }

    pub fn refused() -> Self {
        Self {
            refused: true,
            ..Self::text(REFUSED_TEXT)
        }
    }

    pub fn not_found() -> Self {
        Self::text(NOT_FOUND_TEXT)
    }

    /// First textual content item, the authoritative payload
    pub fn text_payload(&self) -> &str {
        self.content
            .iter()
            .find_map(|c| match c {
                ToolContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or("")
    }
}

/// Launch settings of one tool provider process
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProviderConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// `KEY=VALUE` entries added to the process environment
    #[serde(default)]
    pub env: Vec<String>,
}

impl ToolProviderConfig {
    /// Environment entries split into pairs; entries without `=` are skipped
    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter().filter_map(|entry| entry.split_once('='))
    }
}

/// Live connection to one tool provider
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Provider name from its configuration
    fn name(&self) -> &str;

    /// Tools the provider currently advertises
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Call a tool; blocks until the provider replies or the transport fails
    async fn call_tool(
        &self,
        name: &str,
        arguments: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ToolCallResult>;

    /// Close the connection. Idempotent; never fails.
    async fn close(&self);
}

/// Starts providers and completes their protocol handshake
#[async_trait]
pub trait ToolLauncher: Send + Sync {
    async fn start(&self, config: &ToolProviderConfig) -> Result<Arc<dyn ToolProvider>>;
}

/// Registry mapping tool names to the provider that serves them
#[derive(Default)]
pub struct ToolRegistry {
    routes: HashMap<String, Arc<dyn ToolProvider>>,
    descriptors: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider's tools
    ///
    /// A name already present is re-pointed at `provider` (last write wins);
    /// the earlier descriptor stays in [`descriptors`](Self::descriptors).
    pub fn register(&mut self, provider: &Arc<dyn ToolProvider>, tools: Vec<ToolDescriptor>) {
        for tool in tools {
            if let Some(previous) = self.routes.insert(tool.name.clone(), Arc::clone(provider)) {
                tracing::warn!(
                    tool = %tool.name,
                    previous = previous.name(),
                    current = provider.name(),
                    "Tool name collision, later provider wins"
                );
            }
            self.descriptors.push(tool);
        }
    }

    /// Provider serving `name`
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn ToolProvider>> {
        self.routes.get(name).cloned()
    }

    /// Every published descriptor, in registration order
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }

    /// Number of routable tool names
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
