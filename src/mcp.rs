//! JSON-RPC 2.0 plumbing for the MCP tool surface, with stdio and SSE
//! transports. Both transports feed the same [`Dispatcher`].

use std::{
    collections::BTreeMap,
    convert::Infallible,
    io::{self, BufRead, BufReader, BufWriter, Write},
    net::SocketAddr,
    sync::Arc,
};

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::resources::Resource;
use crate::tools::Tool;

pub type McpResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Deserialize, Debug, Clone)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<serde_json::Value>,
    pub method: String,
    pub params: Option<serde_json::Value>,
}

#[derive(Serialize, Debug, Clone)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    pub result: serde_json::Value,
}

#[derive(Serialize, Debug, Clone)]
pub struct JsonRpcError {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    pub error: ErrorObject,
}

#[derive(Serialize, Debug, Clone)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

#[derive(Serialize, Clone)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

#[derive(Serialize, Clone)]
pub struct McpResourceInfo {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[derive(Serialize, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "expensedb".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: Some("Personal expense tracker over MCP".to_string()),
        }
    }
}

/// Routes JSON-RPC requests to registered tools and resources. Registration
/// happens once at startup; dispatch is read-only afterwards, so the maps
/// need no locking.
pub struct Dispatcher {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    resources: BTreeMap<String, Arc<dyn Resource>>,
    server_info: ServerInfo,
}

impl Dispatcher {
    pub fn new(server_info: ServerInfo) -> Self {
        Self {
            tools: BTreeMap::new(),
            resources: BTreeMap::new(),
            server_info,
        }
    }

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.definition().name;
        self.tools.insert(name, tool);
        self
    }

    pub fn register_resource(&mut self, resource: Arc<dyn Resource>) -> &mut Self {
        let uri = resource.definition().uri;
        self.resources.insert(uri, resource);
        self
    }

    /// Parses one raw JSON-RPC message and dispatches it. Malformed JSON
    /// yields a -32700 error object instead of failing the transport.
    pub fn dispatch_line(&self, raw: &str) -> serde_json::Value {
        match serde_json::from_str::<JsonRpcRequest>(raw) {
            Ok(request) => self.dispatch(request),
            Err(e) => error_value(
                serde_json::Value::Null,
                -32700,
                "Parse error",
                Some(serde_json::json!({"details": e.to_string()})),
            ),
        }
    }

    pub fn dispatch(&self, request: JsonRpcRequest) -> serde_json::Value {
        let id = request.id.unwrap_or(serde_json::Value::Null);
        if request.jsonrpc != "2.0" {
            return error_value(id, -32600, "Invalid Request: jsonrpc must be '2.0'", None);
        }
        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params),
            "resources/list" => self.handle_resources_list(id),
            "resources/read" => self.handle_resources_read(id, request.params),
            _ => error_value(id, -32601, "Method not found", None),
        }
    }

    fn handle_initialize(&self, id: serde_json::Value) -> serde_json::Value {
        let result = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {}, "resources": {} },
            "serverInfo": {
                "name": self.server_info.name,
                "version": self.server_info.version,
                "description": self.server_info.description
            }
        });
        success_value(id, result)
    }

    fn handle_tools_list(&self, id: serde_json::Value) -> serde_json::Value {
        let tools: Vec<McpTool> = self.tools.values().map(|tool| tool.definition()).collect();
        success_value(id, serde_json::json!({ "tools": tools }))
    }

    fn handle_tools_call(
        &self,
        id: serde_json::Value,
        params: Option<serde_json::Value>,
    ) -> serde_json::Value {
        let params = match params {
            Some(params) => params,
            None => return error_value(id, -32602, "Missing parameters", None),
        };
        let tool_name = match params.get("name").and_then(|v| v.as_str()) {
            Some(name) => name,
            None => return error_value(id, -32602, "Missing tool name", None),
        };
        let tool = match self.tools.get(tool_name) {
            Some(tool) => tool,
            None => {
                return error_value(
                    id,
                    -32602,
                    "Unknown tool",
                    Some(serde_json::json!({"tool": tool_name})),
                )
            }
        };
        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));
        match tool.execute(arguments) {
            Ok(value) => success_value(id, wrap_tool_result(value)),
            Err(e) => {
                warn!(tool = tool_name, error = %e, "tool execution failed");
                error_value(
                    id,
                    -32603,
                    "Tool execution failed",
                    Some(serde_json::json!({"error": e.to_string()})),
                )
            }
        }
    }

    fn handle_resources_list(&self, id: serde_json::Value) -> serde_json::Value {
        let resources: Vec<McpResourceInfo> =
            self.resources.values().map(|r| r.definition()).collect();
        success_value(id, serde_json::json!({ "resources": resources }))
    }

    fn handle_resources_read(
        &self,
        id: serde_json::Value,
        params: Option<serde_json::Value>,
    ) -> serde_json::Value {
        let uri = match params.as_ref().and_then(|p| p.get("uri")).and_then(|v| v.as_str()) {
            Some(uri) => uri,
            None => return error_value(id, -32602, "Missing resource uri", None),
        };
        let resource = match self.resources.get(uri) {
            Some(resource) => resource,
            None => {
                return error_value(
                    id,
                    -32602,
                    "Unknown resource",
                    Some(serde_json::json!({"uri": uri})),
                )
            }
        };
        match resource.read() {
            Ok(text) => {
                let info = resource.definition();
                success_value(
                    id,
                    serde_json::json!({
                        "contents": [{
                            "uri": info.uri,
                            "mimeType": info.mime_type,
                            "text": text
                        }]
                    }),
                )
            }
            Err(e) => {
                warn!(uri, error = %e, "resource read failed");
                error_value(
                    id,
                    -32603,
                    "Resource read failed",
                    Some(serde_json::json!({"error": e.to_string()})),
                )
            }
        }
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

/// MCP tool results carry a content envelope; the structured result object is
/// kept alongside it so typed clients do not have to re-parse the text block.
fn wrap_tool_result(value: serde_json::Value) -> serde_json::Value {
    let text = value.to_string();
    serde_json::json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": value
    })
}

fn success_value(id: serde_json::Value, result: serde_json::Value) -> serde_json::Value {
    serde_json::json!(JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result,
    })
}

fn error_value(
    id: serde_json::Value,
    code: i32,
    message: &str,
    data: Option<serde_json::Value>,
) -> serde_json::Value {
    serde_json::json!(JsonRpcError {
        jsonrpc: "2.0".to_string(),
        id,
        error: ErrorObject {
            code,
            message: message.to_string(),
            data,
        },
    })
}

/// Line-delimited JSON-RPC over stdin/stdout. Logging goes to stderr so the
/// protocol channel stays clean.
pub struct StdioServer {
    dispatcher: Dispatcher,
}

impl StdioServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn run(&self) -> McpResult<()> {
        let mut reader = BufReader::new(io::stdin());
        let mut writer = BufWriter::new(io::stdout());
        let mut line = String::new();
        while reader.read_line(&mut line)? > 0 {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                let response = self.dispatcher.dispatch_line(trimmed);
                writeln!(writer, "{}", response)?;
                writer.flush()?;
            }
            line.clear();
        }
        Ok(())
    }
}

struct SseState {
    dispatcher: Arc<Dispatcher>,
    tx: broadcast::Sender<String>,
}

/// HTTP transport: JSON-RPC requests arrive on POST /message and responses
/// are returned directly as well as broadcast to GET /sse subscribers.
pub struct SseServer {
    dispatcher: Arc<Dispatcher>,
    addr: SocketAddr,
}

impl SseServer {
    pub fn new(dispatcher: Dispatcher, addr: SocketAddr) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            addr,
        }
    }

    pub async fn run(self) -> McpResult<()> {
        let (tx, _rx) = broadcast::channel::<String>(100);
        let state = Arc::new(SseState {
            dispatcher: self.dispatcher,
            tx,
        });

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .route("/", get(root_handler))
            .route("/sse", get(sse_handler))
            .route("/message", post(message_handler))
            .with_state(state)
            .layer(cors);

        info!(addr = %self.addr, "MCP server listening");
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn root_handler(State(state): State<Arc<SseState>>) -> impl IntoResponse {
    let info = state.dispatcher.server_info();
    Json(serde_json::json!({
        "name": info.name,
        "version": info.version,
        "description": info.description,
        "transport": "sse",
        "endpoints": {
            "sse": "/sse",
            "message": "/message"
        }
    }))
}

async fn sse_handler(
    State(state): State<Arc<SseState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.tx.subscribe();
    let stream = BroadcastStream::new(rx).map(|result| match result {
        Ok(msg) => Ok(Event::default().data(msg)),
        Err(_) => Ok(Event::default().data("{\"error\": \"stream error\"}")),
    });
    Sse::new(stream)
}

async fn message_handler(
    State(state): State<Arc<SseState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let fallback_id = request.id.clone().unwrap_or(serde_json::Value::Null);

    // Stores are synchronous; keep them off the async worker threads.
    let response = match tokio::task::spawn_blocking(move || dispatcher.dispatch(request)).await {
        Ok(value) => value,
        Err(e) => error_value(
            fallback_id,
            -32603,
            "Tool execution panicked",
            Some(serde_json::json!({"error": e.to_string()})),
        ),
    };

    let _ = state.tx.send(response.to_string());
    (StatusCode::OK, Json(response))
}
