//! MCP Tool definitions and handlers
//!
//! Four tools wrap the Gmail client. Input schemas are generated from the
//! argument types; results are returned as pretty-printed JSON text.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{McpError, Result};
use crate::gmail::client::GmailClient;
use crate::gmail::mime::SendRequest;
use crate::gmail::query::SearchFilter;
use crate::mcp::types::{CallToolResult, Tool};

pub const GET_MESSAGES: &str = "get_gmail_messages";
pub const SEND_MESSAGE: &str = "send_gmail_message";
pub const AUTH_STATUS: &str = "get_gmail_auth_status";
pub const SEARCH_MESSAGES: &str = "search_gmail_messages";

/// Arguments of `get_gmail_messages`
#[derive(Debug, Default, Deserialize, JsonSchema)]
struct GetMessagesArgs {
    /// Gmail search query, e.g. `is:unread newer_than:2d`
    #[serde(default)]
    query: Option<String>,

    /// Maximum number of messages to return (1-500, default 10)
    #[serde(default)]
    max_results: Option<u32>,
}

/// `get_gmail_auth_status` takes no arguments
#[derive(Debug, Default, Deserialize, JsonSchema)]
struct NoArgs {}

/// Tool handler
pub struct ToolHandler {
    gmail_client: Arc<GmailClient>,
}

impl ToolHandler {
    /// Create a new tool handler
    pub fn new(gmail_client: Arc<GmailClient>) -> Self {
        Self { gmail_client }
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<Tool> {
        vec![
            tool_def::<GetMessagesArgs>(
                GET_MESSAGES,
                "Lists Gmail messages, newest first, optionally filtered by a Gmail search query",
            ),
            tool_def::<SendRequest>(SEND_MESSAGE, "Sends a plain-text email"),
            tool_def::<NoArgs>(
                AUTH_STATUS,
                "Reports whether the server holds a usable Gmail credential",
            ),
            tool_def::<SearchFilter>(
                SEARCH_MESSAGES,
                "Searches Gmail messages by sender, subject, attachment, read state and age",
            ),
        ]
    }

    /// Call a tool by name
    pub async fn call_tool(&self, name: &str, args: Value) -> CallToolResult {
        tracing::debug!("Calling tool {}", name);

        let outcome = match name {
            GET_MESSAGES => self.handle_get_messages(args).await,
            SEND_MESSAGE => self.handle_send_message(args).await,
            AUTH_STATUS => self.handle_auth_status().await,
            SEARCH_MESSAGES => self.handle_search_messages(args).await,
            _ => Err(McpError::UnknownTool {
                name: name.to_string(),
            }
            .into()),
        };

        match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Tool {} failed: {}", name, e);
                CallToolResult::error(e.to_string())
            }
        }
    }

    // ==================== Tool Handlers ====================

    async fn handle_get_messages(&self, args: Value) -> Result<CallToolResult> {
        let args: GetMessagesArgs = parse_args(args)?;
        let messages = self
            .gmail_client
            .list_messages(args.query.as_deref().unwrap_or(""), args.max_results)
            .await?;
        json_result(&messages)
    }

    async fn handle_send_message(&self, args: Value) -> Result<CallToolResult> {
        let request: SendRequest = parse_args(args)?;
        let receipt = self.gmail_client.send_message(&request).await?;
        json_result(&receipt)
    }

    async fn handle_auth_status(&self) -> Result<CallToolResult> {
        json_result(&self.gmail_client.auth_status().await)
    }

    async fn handle_search_messages(&self, args: Value) -> Result<CallToolResult> {
        let filter: SearchFilter = parse_args(args)?;
        let messages = self.gmail_client.search_messages(&filter).await?;
        json_result(&messages)
    }
}

/// Deserialize tool arguments; a missing argument object counts as empty
fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| {
        McpError::InvalidArguments {
            message: e.to_string(),
        }
        .into()
    })
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult> {
    Ok(CallToolResult::text(serde_json::to_string_pretty(value)?))
}

// ==================== Schema Definitions ====================

fn tool_def<T: JsonSchema>(name: &str, description: &str) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema: input_schema::<T>(),
    }
}

fn input_schema<T: JsonSchema>() -> Value {
    let mut schema = serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| json!({"type": "object"}));

    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
        object
            .entry("properties")
            .or_insert_with(|| json!({}));
    }
    schema
}
