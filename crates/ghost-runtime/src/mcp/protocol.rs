//! JSON-RPC 2.0 message types for the tool-provider protocol.
//!
//! Frames are single-line JSON objects separated by `\n`:
//!
//! - **Requests**: client → provider (`initialize`, `tools/list`, `tools/call`)
//! - **Responses**: provider → client (result or error)
//! - **Notifications**: either direction, no `id` (`notifications/initialized`)

use serde::{Deserialize, Serialize};

use ghost_core::{ToolContent, ToolDescriptor};

/// Protocol revision announced during `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const CLIENT_NAME: &str = "ghost";

/// JSON-RPC request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC notification (no response expected)
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
}

/// JSON-RPC error object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Outgoing response to a provider-initiated request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponseOut {
    pub jsonrpc: &'static str,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Classification of an incoming frame
#[derive(Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// Reply to one of our requests (has `id`, no `method`)
    Response(u64),
    /// Request from the provider (has `id` + `method`), e.g. `ping`
    IncomingRequest,
    /// Notification (has `method`, no `id`), e.g. log messages
    Notification,
}

/// Classify a frame by inspecting its `id` and `method` fields.
pub fn classify_message(json: &serde_json::Value) -> MessageKind {
    let id = json.get("id").filter(|v| !v.is_null());
    let has_method = json.get("method").and_then(|v| v.as_str()).is_some();

    match (id, has_method) {
        (Some(_), true) => MessageKind::IncomingRequest,
        (Some(id), false) => id
            .as_u64()
            .map_or(MessageKind::Notification, MessageKind::Response),
        _ => MessageKind::Notification,
    }
}

/// `initialize` params
pub fn initialize_params() -> serde_json::Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": CLIENT_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

/// `initialize` result (only the fields we log)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub protocol_version: String,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// `tools/list` result page
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListToolsResult {
    pub tools: Vec<ToolDescriptor>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// `tools/call` result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,
    #[serde(default)]
    pub is_error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_response() {
        let json = serde_json::json!({"jsonrpc": "2.0", "id": 7, "result": {}});
        assert_eq!(classify_message(&json), MessageKind::Response(7));
    }

    #[test]
    fn classify_incoming_request() {
        let json = serde_json::json!({"jsonrpc": "2.0", "id": "a", "method": "ping"});
        assert_eq!(classify_message(&json), MessageKind::IncomingRequest);
    }

    #[test]
    fn classify_notification() {
        let json = serde_json::json!({"method": "notifications/message", "params": {}});
        assert_eq!(classify_message(&json), MessageKind::Notification);
    }

    #[test]
    fn request_serialization_omits_empty_params() {
        let req = JsonRpcRequest::new(3, "tools/list", None);
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#
        );
    }

    #[test]
    fn list_tools_accepts_any_valid_schema() {
        let page: ListToolsResult = serde_json::from_value(serde_json::json!({
            "tools": [
                {
                    "name": "search",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"limit": {"type": ["integer", "null"]}}
                    }
                },
                {
                    "name": "store",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"value": true}
                    }
                }
            ],
            "nextCursor": "next"
        }))
        .unwrap();

        assert_eq!(page.tools.len(), 2);
        assert_eq!(page.next_cursor.as_deref(), Some("next"));
        let search = page.tools[0].input_schema.properties.as_ref().unwrap();
        assert_eq!(
            search["limit"].as_schema().unwrap().schema_type,
            Some(ghost_core::SchemaType::Union(vec!["integer".into(), "null".into()]))
        );
        assert_eq!(
            page.tools[1].input_schema.to_value()["properties"]["value"],
            serde_json::json!(true)
        );
    }

    #[test]
    fn call_result_maps_error_flag() {
        let result: CallToolResult = serde_json::from_value(serde_json::json!({
            "content": [{"type": "text", "text": "denied"}],
            "isError": true
        }))
        .unwrap();
        assert!(result.is_error);
        assert_eq!(result.content.len(), 1);
    }

    #[test]
    fn list_result_reads_descriptors() {
        let page: ListToolsResult = serde_json::from_value(serde_json::json!({
            "tools": [{
                "name": "read_file",
                "description": "Read a file",
                "inputSchema": {
                    "type": "object",
                    "properties": {"path": {"type": "string"}},
                    "required": ["path"]
                }
            }],
            "nextCursor": "p2"
        }))
        .unwrap();
        assert_eq!(page.tools[0].input_schema.required, vec!["path"]);
        assert_eq!(page.next_cursor.as_deref(), Some("p2"));
    }
}
