//! MCP Server implementation
//!
//! JSON-RPC dispatch plus two transports: newline-delimited JSON on stdio and
//! `POST /mcp` over HTTP.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::Result;
use crate::gmail::client::GmailClient;
use crate::mcp::tools::ToolHandler;
use crate::mcp::types::*;

/// MCP Server info
const SERVER_NAME: &str = "gmail-bridge";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// MCP Server for Gmail
pub struct McpServer {
    /// Tool handler
    tool_handler: ToolHandler,

    /// Whether the client sent `notifications/initialized`
    initialized: AtomicBool,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(gmail_client: Arc<GmailClient>) -> Self {
        Self {
            tool_handler: ToolHandler::new(gmail_client),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }

    /// Run the server on stdio until stdin closes
    pub async fn run_stdio(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        tracing::info!("MCP server listening on stdio");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_message(&line).await {
                let mut response_str = serde_json::to_string(&response)?;
                response_str.push('\n');
                stdout.write_all(response_str.as_bytes()).await?;
                stdout.flush().await?;
            }
        }

        tracing::info!("stdin closed, shutting down");
        Ok(())
    }

    /// Router exposing the server at `POST /mcp`
    pub fn router(self: Arc<Self>) -> Router {
        Router::new().route("/mcp", post(http_handler)).with_state(self)
    }

    /// Run the server over HTTP
    pub async fn run_http(self: Arc<Self>, port: u16) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("MCP server listening on http://{}/mcp", listener.local_addr()?);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Handle an incoming JSON-RPC message; notifications yield no response
    pub async fn handle_message(&self, message: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!("Unparseable JSON-RPC message: {}", e);
                return Some(JsonRpcResponse::error(None, JsonRpcError::parse_error(e.to_string())));
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_request(format!("Unsupported jsonrpc version '{}'", request.jsonrpc)),
            ));
        }

        if request.is_notification() {
            self.handle_notification(&request);
            return None;
        }

        let id = request.id.clone();
        let outcome = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(),
            methods::PING => Ok(serde_json::json!({})),
            methods::LIST_TOOLS => self.handle_list_tools(),
            methods::CALL_TOOL => self.handle_call_tool(&request).await,
            _ => Err(JsonRpcError::method_not_found(&request.method)),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        if request.method == methods::INITIALIZED {
            self.initialized.store(true, Ordering::Relaxed);
            tracing::info!("MCP client initialized");
        } else {
            tracing::debug!("Ignoring notification {}", request.method);
        }
    }

    /// Handle initialize request
    fn handle_initialize(&self) -> std::result::Result<Value, JsonRpcError> {
        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {}),
            },
        };

        to_result(result)
    }

    /// Handle list tools request
    fn handle_list_tools(&self) -> std::result::Result<Value, JsonRpcError> {
        to_result(ListToolsResult {
            tools: self.tool_handler.list_tools(),
        })
    }

    /// Handle call tool request; tool failures are results, not protocol errors
    async fn handle_call_tool(&self, request: &JsonRpcRequest) -> std::result::Result<Value, JsonRpcError> {
        let params = request
            .params
            .clone()
            .ok_or_else(|| JsonRpcError::invalid_params("Missing tool parameters"))?;
        let params: CallToolParams = serde_json::from_value(params)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid tool parameters: {}", e)))?;

        let result = self.tool_handler.call_tool(&params.name, params.arguments).await;
        to_result(result)
    }
}

fn to_result<T: serde::Serialize>(value: T) -> std::result::Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

async fn http_handler(State(server): State<Arc<McpServer>>, body: String) -> axum::response::Response {
    match server.handle_message(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Authenticator, FileCredentialStore, TokenManager};
    use crate::config::OAuthClient;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    fn server(dir: &std::path::Path) -> McpServer {
        let store = Arc::new(FileCredentialStore::new(dir.join("token.json")));
        let oauth = OAuthClient {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            auth_uri: "http://127.0.0.1:9/auth".to_string(),
            token_uri: "http://127.0.0.1:9/token".to_string(),
        };
        let manager = TokenManager::new(oauth, vec![], store);
        let client = GmailClient::new(Arc::new(Authenticator::OAuth(manager)), "http://127.0.0.1:9");
        McpServer::new(Arc::new(client))
    }

    async fn call(server: &McpServer, request: Value) -> Value {
        let response = server.handle_message(&request.to_string()).await.unwrap();
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_handshake() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());

        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": MCP_VERSION,
                "clientInfo": {"name": "test", "version": "1.0"},
                "capabilities": {}
            }}),
        )
        .await;
        assert_eq!(response["result"]["protocolVersion"], MCP_VERSION);
        assert_eq!(response["result"]["serverInfo"]["name"], SERVER_NAME);
        assert!(response["result"]["capabilities"]["tools"].is_object());

        let ack = server
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(ack.is_none());
        assert!(server.is_initialized());
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());

        let response = serde_json::to_value(server.handle_message("{not json").await.unwrap()).unwrap();
        assert_eq!(response["error"]["code"], -32700);
        assert!(response["id"].is_null());

        let response = call(&server, json!({"jsonrpc": "2.0", "id": "a", "method": "resources/list"})).await;
        assert_eq!(response["error"]["code"], -32601);
        assert_eq!(response["id"], "a");

        let response = call(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call"})).await;
        assert_eq!(response["error"]["code"], -32602);

        let response = call(&server, json!({"jsonrpc": "1.0", "id": 3, "method": "ping"})).await;
        assert_eq!(response["error"]["code"], -32600);

        // A null id is answered, not treated as a notification
        let response = call(&server, json!({"jsonrpc": "2.0", "id": null, "method": "ping"})).await;
        assert!(response["id"].is_null());
        assert!(response["result"].is_object());
    }

    #[tokio::test]
    async fn test_tool_failure_is_result() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(dir.path());

        let response = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"name": "nope"}}),
        )
        .await;
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
    }

    #[tokio::test]
    async fn test_http_transport() {
        let dir = tempfile::tempdir().unwrap();
        let app = Arc::new(server(dir.path())).router();

        let response = app
            .clone()
            .oneshot(
                Request::post("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 4);

        let response = app
            .oneshot(
                Request::post("/mcp")
                    .body(Body::from(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
